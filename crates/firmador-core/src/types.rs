//! Domain types shared by the session controller, the reconciler and the
//! remote bindings

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Workflow status of a document waiting for the recipient's signature
pub const SENT_STATUS: &str = "Enviado";

/// Workflow status applied locally once a document has been rejected
pub const REJECTED_STATUS: &str = "Rechazado";

/// A document as listed by the document store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub id: String,
    pub title: String,
    pub url: String,
    #[serde(default)]
    pub is_signed: bool,
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub expiration: String,
    #[serde(rename = "statusDocument", default)]
    pub status: String,
}

impl Document {
    /// True when the document is still waiting for a signature
    pub fn is_awaiting_signature(&self) -> bool {
        !self.is_signed && self.status == SENT_STATUS
    }

    /// Submission date, if the server sent one we can read
    pub fn submitted_on(&self) -> Option<NaiveDate> {
        parse_server_date(&self.date)
    }

    /// Expiration date, if the server sent one we can read
    pub fn expires_on(&self) -> Option<NaiveDate> {
        parse_server_date(&self.expiration)
    }

    /// Whether the expiration date lies strictly before `today`
    ///
    /// Documents without a readable expiration never expire.
    pub fn is_expired(&self, today: NaiveDate) -> bool {
        self.expires_on().map(|d| d < today).unwrap_or(false)
    }
}

/// Parse the date formats the document store is known to emit
fn parse_server_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.date_naive());
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(dt.date());
    }
    if let Ok(d) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Some(d);
    }
    NaiveDate::parse_from_str(raw, "%d/%m/%Y").ok()
}

/// Which documents a listing covers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListScope {
    /// Every document in the store (administrators)
    All,
    /// Documents addressed to one recipient
    Owner(String),
}

/// Role of the authenticated user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    User,
}

impl Role {
    /// Map the numeric role returned by the login endpoint
    pub fn from_code(code: i64) -> Self {
        if code == 1 {
            Role::Admin
        } else {
            Role::User
        }
    }

    pub fn is_admin(self) -> bool {
        self == Role::Admin
    }
}

/// PKCS#12 certificate container supplied by the signer
#[derive(Clone, PartialEq, Eq)]
pub struct Certificate {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl Certificate {
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            bytes,
        }
    }
}

impl fmt::Debug for Certificate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Certificate")
            .field("file_name", &self.file_name)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// Certificate PIN. Never printed, never persisted.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Pin(String);

impl Pin {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The raw PIN, for the request that carries it to the gateway
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Pin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Pin(***)")
    }
}

/// Everything the gateway needs to sign one document
///
/// Every field is required, so a request cannot exist without a certificate,
/// a PIN and the PDF bytes.
#[derive(Debug, Clone)]
pub struct SignRequest {
    pub document_id: String,
    pub certificate: Certificate,
    pub pin: Pin,
    pub pdf: Vec<u8>,
    pub reason: String,
    pub location: String,
    /// Zero-based page index as currently rendered
    pub page: u32,
    /// Placement in gateway coordinates (Y up from the page bottom)
    pub x: f64,
    pub y: f64,
}

/// Signed PDF bytes returned by the gateway
#[derive(Clone, PartialEq, Eq)]
pub struct SignedArtifact(pub Vec<u8>);

impl SignedArtifact {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for SignedArtifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SignedArtifact({} bytes)", self.0.len())
    }
}

/// Successful gateway response
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignOutcome {
    /// The gateway returned the signed PDF; the caller must commit it
    Signed(SignedArtifact),
    /// The gateway already stored the result and returned a confirmation
    Processed(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(status: &str, signed: bool) -> Document {
        Document {
            id: "A".into(),
            title: "Contrato".into(),
            url: "https://store/a.pdf".into(),
            is_signed: signed,
            date: "2024-05-01".into(),
            expiration: "2024-06-01T00:00:00".into(),
            status: status.into(),
        }
    }

    #[test]
    fn test_document_wire_names() {
        let json = r#"{
            "id": "42",
            "title": "Acta",
            "url": "https://store/42.pdf",
            "isSigned": false,
            "date": "2024-05-01",
            "expiration": "2024-05-31",
            "statusDocument": "Enviado"
        }"#;
        let parsed: Document = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.id, "42");
        assert!(!parsed.is_signed);
        assert_eq!(parsed.status, SENT_STATUS);
        assert!(parsed.is_awaiting_signature());
    }

    #[test]
    fn test_awaiting_signature_requires_sent_status() {
        assert!(doc(SENT_STATUS, false).is_awaiting_signature());
        assert!(!doc(SENT_STATUS, true).is_awaiting_signature());
        assert!(!doc("Borrador", false).is_awaiting_signature());
    }

    #[test]
    fn test_server_dates() {
        let d = doc(SENT_STATUS, false);
        assert_eq!(d.submitted_on(), NaiveDate::from_ymd_opt(2024, 5, 1));
        assert_eq!(d.expires_on(), NaiveDate::from_ymd_opt(2024, 6, 1));
        assert_eq!(
            parse_server_date("2024-06-01T10:00:00Z"),
            NaiveDate::from_ymd_opt(2024, 6, 1)
        );
        assert_eq!(
            parse_server_date("15/03/2024"),
            NaiveDate::from_ymd_opt(2024, 3, 15)
        );
        assert_eq!(parse_server_date("pronto"), None);
    }

    #[test]
    fn test_expiry() {
        let d = doc(SENT_STATUS, false);
        assert!(!d.is_expired(NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()));
        assert!(d.is_expired(NaiveDate::from_ymd_opt(2024, 6, 2).unwrap()));

        let mut undated = d.clone();
        undated.expiration.clear();
        assert!(!undated.is_expired(NaiveDate::from_ymd_opt(2099, 1, 1).unwrap()));
    }

    #[test]
    fn test_role_codes() {
        assert_eq!(Role::from_code(1), Role::Admin);
        assert_eq!(Role::from_code(0), Role::User);
        assert_eq!(Role::from_code(2), Role::User);
    }

    #[test]
    fn test_secrets_not_in_debug() {
        let pin = Pin::new("1234");
        assert_eq!(format!("{:?}", pin), "Pin(***)");

        let cert = Certificate::new("firma.p12", vec![1, 2, 3]);
        let shown = format!("{:?}", cert);
        assert!(shown.contains("firma.p12"));
        assert!(!shown.contains("[1, 2, 3]"));
    }
}
