//! Contracts of the remote services the workflow consumes
//!
//! The core never performs I/O itself. Containers pass implementations of
//! these traits (HTTP bindings in production, in-memory fakes in tests).

use async_trait::async_trait;

use crate::account::NewAccount;
use crate::auth::{Credentials, SessionState};
use crate::error::RemoteError;
use crate::types::{
    Certificate, Document, ListScope, Pin, SignOutcome, SignRequest, SignedArtifact,
};

/// Fetches a document's PDF bytes from its source URL
#[async_trait]
pub trait DocumentFetcher: Send + Sync {
    async fn fetch_document_bytes(&self, url: &str) -> Result<Vec<u8>, RemoteError>;
}

/// The remote service that performs cryptographic PDF signing
#[async_trait]
pub trait SigningGateway: Send + Sync {
    async fn sign_document(&self, request: &SignRequest) -> Result<SignOutcome, RemoteError>;

    async fn reject_document(&self, document_id: &str, reason: &str) -> Result<(), RemoteError>;
}

/// The remote service that lists documents and tracks their sign status
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn list_documents(&self, scope: &ListScope) -> Result<Vec<Document>, RemoteError>;

    /// Replace the stored file with the signed PDF
    async fn commit_signed(
        &self,
        document_id: &str,
        artifact: &SignedArtifact,
    ) -> Result<(), RemoteError>;

    async fn mark_signed(&self, document_id: &str) -> Result<(), RemoteError>;

    async fn delete_document(&self, document_id: &str) -> Result<(), RemoteError>;

    async fn resend_notification(&self, document_id: &str) -> Result<(), RemoteError>;
}

/// The remote authentication service
#[async_trait]
pub trait Authenticator: Send + Sync {
    async fn login(&self, credentials: &Credentials) -> Result<SessionState, RemoteError>;

    /// Exchange a one-time link token for the recipient's session
    async fn login_with_token(&self, token: &str) -> Result<SessionState, RemoteError>;
}

/// Self-service account operations of the authentication service
#[async_trait]
pub trait AccountService: Send + Sync {
    async fn register(&self, account: &NewAccount) -> Result<(), RemoteError>;

    async fn verify_email(&self, email: &str, code: &str) -> Result<(), RemoteError>;

    /// Email a password validation PIN to `email`
    async fn send_pin_validation(&self, email: &str) -> Result<(), RemoteError>;

    /// `Ok(false)` when the server answered but refused the PIN
    async fn verify_pin(&self, email: &str, code: &str) -> Result<bool, RemoteError>;

    async fn change_password(
        &self,
        email: &str,
        pin: &str,
        new_password: &str,
    ) -> Result<(), RemoteError>;

    async fn upload_certificate(
        &self,
        user_id: &str,
        certificate: &Certificate,
        pin: &Pin,
    ) -> Result<(), RemoteError>;
}
