//! Error taxonomy for the sign-and-commit workflow
//!
//! Remote bindings report [`RemoteError`]; the session classifies it into a
//! [`SignError`] whose [`SignError::user_message`] is what the container shows.

use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

pub const TIMEOUT_MESSAGE: &str = "The signing service timed out. Please try again.";
pub const BAD_PASSWORD_MESSAGE: &str = "The certificate PIN is incorrect.";
pub const GENERIC_FAILURE_MESSAGE: &str = "The document could not be signed.";
pub const MISSING_CERTIFICATE_MESSAGE: &str = "A certificate is required.";
pub const MISSING_PDF_MESSAGE: &str = "The PDF document is required.";
pub const REJECTED_MESSAGE: &str = "The signing service rejected the request.";
pub const TRANSPORT_MESSAGE: &str = "Could not reach the server. Check your connection.";
pub const COMMIT_FAILED_MESSAGE: &str =
    "The document was signed but could not be saved to the document store. Do not sign it again.";

/// Error reported by a remote service binding
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RemoteError {
    /// The server answered with a non-success status
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// The request never produced a usable response
    #[error("Transport error: {0}")]
    Transport(String),
}

impl RemoteError {
    pub fn status(status: u16, body: impl Into<String>) -> Self {
        RemoteError::Status {
            status,
            body: body.into(),
        }
    }
}

/// Field-level validation annotations, keyed by field name
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldErrors(BTreeMap<&'static str, String>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: &'static str, message: impl Into<String>) {
        self.0.insert(field, message.into());
    }

    pub fn remove(&mut self, field: &str) {
        self.0.remove(field);
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn fields(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.0.keys().copied()
    }

    pub fn messages(&self) -> impl Iterator<Item = &str> {
        self.0.values().map(String::as_str)
    }

    /// `Ok(())` when no field has an error
    pub fn into_result(self) -> Result<(), FieldErrors> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fields: Vec<&str> = self.fields().collect();
        write!(f, "{}", fields.join(", "))
    }
}

/// 4xx responses from the gateway
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectionKind {
    MissingCertificate,
    MissingPdf,
    Other(String),
}

/// 5xx responses from the gateway
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    Timeout,
    BadCertificatePassword,
    Unspecified(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignError {
    #[error("Validation failed: {0}")]
    Validation(FieldErrors),

    #[error("Request rejected: {0:?}")]
    Rejected(RejectionKind),

    #[error("Remote processing failed: {0:?}")]
    Failed(FailureKind),

    #[error("Transport error: {0}")]
    Transport(String),

    /// The gateway signed the document, then storing or flagging it failed
    #[error("Signed document could not be stored: {0}")]
    Commit(String),

    #[error("A signing session is already active")]
    Busy,

    #[error("Unknown document: {0}")]
    UnknownDocument(String),

    #[error("Operation requires an administrator")]
    Forbidden,
}

impl SignError {
    /// Classify a remote failure by status class and body content
    pub fn from_remote(err: RemoteError) -> Self {
        match err {
            RemoteError::Transport(msg) => SignError::Transport(msg),
            RemoteError::Status { status, body } if (400..500).contains(&status) => {
                SignError::Rejected(classify_rejection(&body))
            }
            RemoteError::Status { status, body } if status >= 500 => {
                SignError::Failed(classify_failure(&body))
            }
            // 1xx/3xx/2xx reaching here means the binding could not use the response
            RemoteError::Status { status, body } => {
                SignError::Transport(format!("unexpected HTTP {}: {}", status, body))
            }
        }
    }

    /// Message for the person at the screen
    pub fn user_message(&self) -> String {
        match self {
            SignError::Validation(fields) => format!("Required fields are missing: {}", fields),
            SignError::Rejected(RejectionKind::MissingCertificate) => {
                MISSING_CERTIFICATE_MESSAGE.to_string()
            }
            SignError::Rejected(RejectionKind::MissingPdf) => MISSING_PDF_MESSAGE.to_string(),
            SignError::Rejected(RejectionKind::Other(_)) => REJECTED_MESSAGE.to_string(),
            SignError::Failed(FailureKind::Timeout) => TIMEOUT_MESSAGE.to_string(),
            SignError::Failed(FailureKind::BadCertificatePassword) => {
                BAD_PASSWORD_MESSAGE.to_string()
            }
            SignError::Failed(FailureKind::Unspecified(_)) => GENERIC_FAILURE_MESSAGE.to_string(),
            SignError::Transport(_) => TRANSPORT_MESSAGE.to_string(),
            SignError::Commit(_) => COMMIT_FAILED_MESSAGE.to_string(),
            SignError::Busy => "Finish or cancel the current signature first.".to_string(),
            SignError::UnknownDocument(id) => format!("Document {} is not in the list.", id),
            SignError::Forbidden => "Only administrators can do this.".to_string(),
        }
    }
}

impl From<RemoteError> for SignError {
    fn from(err: RemoteError) -> Self {
        SignError::from_remote(err)
    }
}

impl From<FieldErrors> for SignError {
    fn from(fields: FieldErrors) -> Self {
        SignError::Validation(fields)
    }
}

/// The gateway reports missing multipart parts by field name
fn classify_rejection(body: &str) -> RejectionKind {
    if body.contains("certificateFile") {
        RejectionKind::MissingCertificate
    } else if body.contains("pdfFile") {
        RejectionKind::MissingPdf
    } else {
        RejectionKind::Other(body.to_string())
    }
}

fn classify_failure(body: &str) -> FailureKind {
    let lower = body.to_lowercase();
    if lower.contains("timeout") {
        FailureKind::Timeout
    } else if lower.contains("contraseña incorrecta") || lower.contains("incorrect password") {
        FailureKind::BadCertificatePassword
    } else {
        FailureKind::Unspecified(body.to_string())
    }
}
