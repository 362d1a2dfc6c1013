//! Self-service account flows
//!
//! Registration (followed by email verification), password recovery through
//! an emailed validation PIN, and uploading the PKCS#12 certificate kept on
//! the user's profile. Every flow validates its form first; an invalid form
//! never reaches the [`AccountService`].

use lazy_static::lazy_static;
use regex::Regex;
use std::fmt;
use thiserror::Error;

use crate::auth::server_message;
use crate::error::{FieldErrors, RemoteError, TRANSPORT_MESSAGE};
use crate::remote::AccountService;
use crate::types::{Certificate, Pin};

pub const ACCOUNT_FAILURE_MESSAGE: &str = "The server could not complete the request.";
pub const INVALID_PIN_MESSAGE: &str = "The validation PIN is not valid.";

lazy_static! {
    static ref EMAIL_PATTERN: Regex =
        Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").unwrap();
    static ref ID_NUMBER_PATTERN: Regex = Regex::new(r"^[0-9]{10}$").unwrap();
    static ref NAME_PATTERN: Regex = Regex::new(r"^[\p{L}\s]+$").unwrap();
}

#[derive(Debug, Error)]
pub enum AccountError {
    #[error("Validation failed: {0}")]
    Validation(FieldErrors),

    /// The server refused the request; carries its message
    #[error("Request rejected: {0}")]
    Rejected(String),

    #[error(transparent)]
    Remote(RemoteError),
}

impl AccountError {
    pub fn user_message(&self) -> String {
        match self {
            AccountError::Validation(fields) => fields.messages().collect::<Vec<_>>().join(" "),
            AccountError::Rejected(message) => message.clone(),
            AccountError::Remote(RemoteError::Transport(_)) => TRANSPORT_MESSAGE.to_string(),
            AccountError::Remote(_) => ACCOUNT_FAILURE_MESSAGE.to_string(),
        }
    }
}

fn account_failure(err: RemoteError) -> AccountError {
    match err {
        RemoteError::Status { status, body } if (400..500).contains(&status) => {
            AccountError::Rejected(server_message(&body))
        }
        other => {
            tracing::error!("Account request failed: {}", other);
            AccountError::Remote(other)
        }
    }
}

fn check_email(errors: &mut FieldErrors, email: &str) {
    if email.trim().is_empty() {
        errors.add("email", "The email address is required.");
    } else if !EMAIL_PATTERN.is_match(email.trim()) {
        errors.add("email", "The email address is not valid.");
    }
}

/// The sign-up form as typed
#[derive(Clone, Default)]
pub struct Registration {
    /// National identity number (cédula)
    pub id_number: String,
    pub name: String,
    pub user_name: String,
    pub email: String,
    pub email_confirmation: String,
    pub password: String,
    pub password_confirmation: String,
}

impl fmt::Debug for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration")
            .field("user_name", &self.user_name)
            .field("email", &self.email)
            .finish_non_exhaustive()
    }
}

/// A validated registration, ready to send
#[derive(Clone, PartialEq, Eq)]
pub struct NewAccount {
    pub id_number: String,
    pub name: String,
    pub user_name: String,
    pub email: String,
    pub password: String,
}

impl fmt::Debug for NewAccount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NewAccount")
            .field("user_name", &self.user_name)
            .field("email", &self.email)
            .finish_non_exhaustive()
    }
}

impl Registration {
    /// Check every field, reporting all problems at once
    pub fn validate(&self) -> Result<NewAccount, FieldErrors> {
        let mut errors = FieldErrors::new();

        let id_number = self.id_number.trim();
        if id_number.is_empty() {
            errors.add("id_number", "The identity number is required.");
        } else if !ID_NUMBER_PATTERN.is_match(id_number) {
            errors.add("id_number", "The identity number must have 10 digits.");
        }

        let name = self.name.trim();
        if name.is_empty() {
            errors.add("name", "The name is required.");
        } else if !NAME_PATTERN.is_match(name) {
            errors.add("name", "The name may only contain letters.");
        }

        if self.user_name.trim().is_empty() {
            errors.add("user_name", "The user name is required.");
        }

        check_email(&mut errors, &self.email);
        if self.email.trim() != self.email_confirmation.trim() {
            errors.add("email_confirmation", "The email addresses do not match.");
        }

        if self.password.is_empty() {
            errors.add("password", "The password is required.");
        }
        if self.password != self.password_confirmation {
            errors.add("password_confirmation", "The passwords do not match.");
        }

        errors.into_result()?;
        Ok(NewAccount {
            id_number: id_number.to_string(),
            name: name.to_string(),
            user_name: self.user_name.trim().to_string(),
            email: self.email.trim().to_string(),
            password: self.password.clone(),
        })
    }
}

/// Choosing a new password with the PIN received by email
#[derive(Clone, Default)]
pub struct PasswordReset {
    pub email: String,
    pub pin: String,
    pub new_password: String,
    pub confirmation: String,
}

impl fmt::Debug for PasswordReset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PasswordReset")
            .field("email", &self.email)
            .finish_non_exhaustive()
    }
}

impl PasswordReset {
    pub fn validate(&self) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::new();
        check_email(&mut errors, &self.email);
        if self.pin.trim().is_empty() {
            errors.add("pin", "The validation PIN is required.");
        }
        if self.new_password.is_empty() {
            errors.add("new_password", "The new password is required.");
        }
        if self.new_password != self.confirmation {
            errors.add("confirmation", "The passwords do not match.");
        }
        errors.into_result()
    }
}

/// A certificate to keep on a user's profile
#[derive(Debug, Clone, Default)]
pub struct CertificateUpload {
    pub user_id: String,
    pub certificate: Option<Certificate>,
    pub pin: Pin,
}

impl CertificateUpload {
    pub fn validate(&self) -> Result<(&Certificate, &Pin), FieldErrors> {
        let mut errors = FieldErrors::new();
        if self.user_id.trim().is_empty() {
            errors.add("user_id", "The user is required.");
        }
        if self.certificate.is_none() {
            errors.add("certificate", "A certificate is required.");
        }
        if self.pin.is_empty() {
            errors.add("pin", "The certificate PIN is required.");
        }
        match (&self.certificate, errors.is_empty()) {
            (Some(certificate), true) => Ok((certificate, &self.pin)),
            _ => Err(errors),
        }
    }
}

/// Create the account; the server then emails a verification code
pub async fn register(
    service: &dyn AccountService,
    form: &Registration,
) -> Result<NewAccount, AccountError> {
    let account = form.validate().map_err(AccountError::Validation)?;

    tracing::info!(email = %account.email, "Registering account");
    service.register(&account).await.map_err(account_failure)?;
    Ok(account)
}

/// Confirm the address with the code the server emailed
pub async fn verify_email(
    service: &dyn AccountService,
    email: &str,
    code: &str,
) -> Result<(), AccountError> {
    let mut errors = FieldErrors::new();
    check_email(&mut errors, email);
    if code.trim().is_empty() {
        errors.add("code", "The verification code is required.");
    }
    errors.into_result().map_err(AccountError::Validation)?;

    tracing::info!(email = %email.trim(), "Verifying email");
    service
        .verify_email(email.trim(), code.trim())
        .await
        .map_err(account_failure)
}

/// Ask the server to email a password validation PIN
pub async fn request_password_reset(
    service: &dyn AccountService,
    email: &str,
) -> Result<(), AccountError> {
    let mut errors = FieldErrors::new();
    check_email(&mut errors, email);
    errors.into_result().map_err(AccountError::Validation)?;

    tracing::info!(email = %email.trim(), "Requesting password validation PIN");
    service
        .send_pin_validation(email.trim())
        .await
        .map_err(account_failure)
}

/// Check the emailed PIN, then set the new password
pub async fn reset_password(
    service: &dyn AccountService,
    reset: &PasswordReset,
) -> Result<(), AccountError> {
    reset.validate().map_err(AccountError::Validation)?;
    let email = reset.email.trim();
    let pin = reset.pin.trim();

    let valid = service
        .verify_pin(email, pin)
        .await
        .map_err(account_failure)?;
    if !valid {
        tracing::info!(email = %email, "Validation PIN refused");
        return Err(AccountError::Rejected(INVALID_PIN_MESSAGE.to_string()));
    }

    tracing::info!(email = %email, "Changing password");
    service
        .change_password(email, pin, &reset.new_password)
        .await
        .map_err(account_failure)
}

pub async fn upload_certificate(
    service: &dyn AccountService,
    upload: &CertificateUpload,
) -> Result<(), AccountError> {
    let (certificate, pin) = upload.validate().map_err(AccountError::Validation)?;

    tracing::info!(
        user = %upload.user_id,
        file = %certificate.file_name,
        "Uploading certificate"
    );
    service
        .upload_certificate(upload.user_id.trim(), certificate, pin)
        .await
        .map_err(account_failure)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeAccounts {
        calls: Mutex<Vec<String>>,
        valid_pin: bool,
        failure: Option<RemoteError>,
    }

    impl FakeAccounts {
        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        fn record(&self, call: String) -> Result<(), RemoteError> {
            self.calls.lock().unwrap().push(call);
            match &self.failure {
                Some(err) => Err(err.clone()),
                None => Ok(()),
            }
        }
    }

    #[async_trait]
    impl AccountService for FakeAccounts {
        async fn register(&self, account: &NewAccount) -> Result<(), RemoteError> {
            self.record(format!("register:{}", account.email))
        }

        async fn verify_email(&self, email: &str, code: &str) -> Result<(), RemoteError> {
            self.record(format!("verify:{}:{}", email, code))
        }

        async fn send_pin_validation(&self, email: &str) -> Result<(), RemoteError> {
            self.record(format!("send-pin:{}", email))
        }

        async fn verify_pin(&self, email: &str, code: &str) -> Result<bool, RemoteError> {
            self.record(format!("verify-pin:{}:{}", email, code))?;
            Ok(self.valid_pin)
        }

        async fn change_password(
            &self,
            email: &str,
            pin: &str,
            _new_password: &str,
        ) -> Result<(), RemoteError> {
            self.record(format!("change-password:{}:{}", email, pin))
        }

        async fn upload_certificate(
            &self,
            user_id: &str,
            certificate: &Certificate,
            _pin: &Pin,
        ) -> Result<(), RemoteError> {
            self.record(format!("certificate:{}:{}", user_id, certificate.file_name))
        }
    }

    fn registration() -> Registration {
        Registration {
            id_number: "1712345678".into(),
            name: "Ana María Núñez".into(),
            user_name: "anan".into(),
            email: "ana@firmador.ec".into(),
            email_confirmation: "ana@firmador.ec".into(),
            password: "s3creta".into(),
            password_confirmation: "s3creta".into(),
        }
    }

    #[test]
    fn test_registration_reports_every_problem() {
        let form = Registration {
            id_number: "17123".into(),
            name: "R2D2".into(),
            email: "ana@".into(),
            email_confirmation: "ana@firmador.ec".into(),
            password: "a".into(),
            password_confirmation: "b".into(),
            ..Registration::default()
        };

        let errors = form.validate().unwrap_err();
        let fields: Vec<&str> = errors.fields().collect();
        assert_eq!(
            fields,
            vec![
                "email",
                "email_confirmation",
                "id_number",
                "name",
                "password_confirmation",
                "user_name"
            ]
        );
        assert_eq!(
            errors.get("id_number"),
            Some("The identity number must have 10 digits.")
        );
    }

    #[test]
    fn test_registration_trims_and_accepts_accents() {
        let mut form = registration();
        form.email = " ana@firmador.ec ".into();
        let account = form.validate().unwrap();
        assert_eq!(account.email, "ana@firmador.ec");
        assert_eq!(account.name, "Ana María Núñez");
    }

    #[test]
    fn test_secrets_not_in_debug() {
        let shown = format!("{:?} {:?}", registration(), registration().validate().unwrap());
        assert!(!shown.contains("s3creta"));

        let reset = PasswordReset {
            email: "ana@firmador.ec".into(),
            pin: "4321".into(),
            new_password: "nueva".into(),
            confirmation: "nueva".into(),
        };
        assert!(!format!("{:?}", reset).contains("nueva"));
    }

    #[tokio::test]
    async fn test_invalid_registration_never_calls_service() {
        let service = FakeAccounts::default();
        let err = register(&service, &Registration::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AccountError::Validation(_)));
        assert!(service.calls().is_empty());

        register(&service, &registration()).await.unwrap();
        assert_eq!(service.calls(), vec!["register:ana@firmador.ec"]);
    }

    #[tokio::test]
    async fn test_rejection_carries_server_message() {
        let service = FakeAccounts {
            failure: Some(RemoteError::status(
                400,
                r#"{"message":"El correo ya está registrado"}"#,
            )),
            ..FakeAccounts::default()
        };
        let err = register(&service, &registration()).await.unwrap_err();
        assert!(matches!(err, AccountError::Rejected(ref m) if m == "El correo ya está registrado"));
        assert_eq!(err.user_message(), "El correo ya está registrado");

        let service = FakeAccounts {
            failure: Some(RemoteError::status(500, "Request timeout")),
            ..FakeAccounts::default()
        };
        let err = verify_email(&service, "ana@firmador.ec", "123456")
            .await
            .unwrap_err();
        assert_eq!(err.user_message(), ACCOUNT_FAILURE_MESSAGE);
    }

    #[tokio::test]
    async fn test_verify_email_requires_code() {
        let service = FakeAccounts::default();
        let err = verify_email(&service, "ana@firmador.ec", " ")
            .await
            .unwrap_err();
        assert!(matches!(err, AccountError::Validation(ref f) if f.contains("code")));
        assert_eq!(err.user_message(), "The verification code is required.");

        verify_email(&service, "ana@firmador.ec", " 123456 ")
            .await
            .unwrap();
        assert_eq!(service.calls(), vec!["verify:ana@firmador.ec:123456"]);
    }

    #[tokio::test]
    async fn test_password_reset_checks_pin_first() {
        let reset = PasswordReset {
            email: "ana@firmador.ec".into(),
            pin: "0000".into(),
            new_password: "nueva".into(),
            confirmation: "nueva".into(),
        };

        let service = FakeAccounts::default();
        request_password_reset(&service, "ana@firmador.ec")
            .await
            .unwrap();
        let err = reset_password(&service, &reset).await.unwrap_err();
        assert_eq!(err.user_message(), INVALID_PIN_MESSAGE);
        assert_eq!(
            service.calls(),
            vec!["send-pin:ana@firmador.ec", "verify-pin:ana@firmador.ec:0000"]
        );

        let service = FakeAccounts {
            valid_pin: true,
            ..FakeAccounts::default()
        };
        reset_password(&service, &reset).await.unwrap();
        assert_eq!(
            service.calls(),
            vec![
                "verify-pin:ana@firmador.ec:0000",
                "change-password:ana@firmador.ec:0000"
            ]
        );
    }

    #[tokio::test]
    async fn test_password_reset_confirmation_must_match() {
        let service = FakeAccounts::default();
        let reset = PasswordReset {
            email: "ana@firmador.ec".into(),
            pin: "4321".into(),
            new_password: "nueva".into(),
            confirmation: "otra".into(),
        };
        let err = reset_password(&service, &reset).await.unwrap_err();
        assert!(matches!(err, AccountError::Validation(ref f) if f.contains("confirmation")));
        assert!(service.calls().is_empty());
    }

    #[tokio::test]
    async fn test_certificate_upload_needs_file_and_pin() {
        let service = FakeAccounts::default();
        let mut upload = CertificateUpload {
            user_id: "42".into(),
            ..CertificateUpload::default()
        };

        let err = upload_certificate(&service, &upload).await.unwrap_err();
        match err {
            AccountError::Validation(fields) => {
                assert_eq!(fields.fields().collect::<Vec<_>>(), vec!["certificate", "pin"])
            }
            other => panic!("unexpected error: {:?}", other),
        }

        upload.certificate = Some(Certificate::new("firma.p12", vec![0x30]));
        upload.pin = Pin::new("1234");
        upload_certificate(&service, &upload).await.unwrap();
        assert_eq!(service.calls(), vec!["certificate:42:firma.p12"]);
    }
}
