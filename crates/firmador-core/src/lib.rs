//! Firmador - Document Sign-and-Commit Workflow
//!
//! Container-agnostic core of the Firmador signing front end. A container
//! (CLI, WASM page, desktop shell) drives these pieces:
//!
//! - [`reconciler::DocumentBoard`] owns the document collection and hands out
//!   one [`session::SignSession`] at a time
//! - [`session::SignSession`] loads the PDF, collects the certificate, PIN and
//!   placement, and runs sign → commit → mark-signed against the remote traits
//! - [`coords`] and [`drag`] turn a dragged marker into gateway coordinates
//!
//! Account self-service (registration, password recovery, certificate upload)
//! lives in [`account`]. All network access goes through the traits in
//! [`remote`].

pub mod account;
pub mod auth;
pub mod coords;
pub mod drag;
pub mod error;
pub mod pagination;
pub mod pdf;
pub mod reconciler;
pub mod remote;
pub mod session;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use account::{
    register, request_password_reset, reset_password, upload_certificate, verify_email,
    AccountError, CertificateUpload, NewAccount, PasswordReset, Registration,
};
pub use auth::{login, login_with_token, Credentials, LoginError, SessionState, StateError};
pub use coords::{map_to_gateway, unmap_from_gateway, MappingConstants};
pub use drag::{DragTracker, Offset};
pub use error::{FailureKind, FieldErrors, RejectionKind, RemoteError, SignError};
pub use pagination::{PageSummary, Paginator};
pub use pdf::{LoadedPdf, PdfError};
pub use reconciler::{DocumentBoard, View};
pub use remote::{
    AccountService, Authenticator, DocumentFetcher, DocumentStore, SigningGateway,
};
pub use session::{
    NoopProgress, PlacementMapping, Preview, PreviewGuard, ProgressSink, SessionOutcome,
    SessionPhase, SessionTicket, SignProgress, SignSession,
};
pub use types::{
    Certificate, Document, ListScope, Pin, Role, SignOutcome, SignRequest, SignedArtifact,
};
