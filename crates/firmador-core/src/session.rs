//! Sign session controller
//!
//! One [`SignSession`] drives a single attempt to sign or reject one
//! document, from fetching its PDF to a terminal [`SessionOutcome`]:
//!
//! ```text
//! Idle --load--> Ready --submit--> Validating --ok--> Submitting --> Succeeded
//!                  ^                    |                   |
//!                  +------ errors ------+                   +------> Failed
//!
//! Idle/Ready/Failed --begin_rejection--> Rejecting --reject--> (outcome Rejected)
//! ```
//!
//! The session never mutates the document collection. It reports its outcome
//! and the [`DocumentBoard`](crate::reconciler::DocumentBoard) applies it.

use std::fmt;
use std::sync::Arc;

use crate::coords::{map_to_gateway, MappingConstants};
use crate::drag::{DragTracker, Offset};
use crate::error::{FieldErrors, RemoteError, SignError};
use crate::pdf::LoadedPdf;
use crate::remote::{DocumentFetcher, DocumentStore, SigningGateway};
use crate::types::{Certificate, Document, Pin, SignOutcome, SignRequest};

/// Identifies one signing session handed out by the board
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionTicket(pub(crate) u64);

impl fmt::Display for SessionTicket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session-{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// Waiting for the PDF bytes
    Idle,
    /// PDF loaded, collecting inputs
    Ready,
    Validating,
    Submitting,
    Succeeded,
    Failed,
    /// Collecting a rejection reason instead of signing
    Rejecting,
}

/// Terminal result reported to the board
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionOutcome {
    Signed,
    Failed(SignError),
    Rejected,
    Cancelled,
}

/// Progress of a submission, for a status line next to the form
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignProgress {
    Signing,
    Committing,
    Completed,
    Failed,
    /// Signed by the gateway but not stored
    CommitFailed,
}

impl SignProgress {
    pub fn label(self) -> &'static str {
        match self {
            SignProgress::Signing => "Signing in progress",
            SignProgress::Committing => "Processing in the document store",
            SignProgress::Completed => "Completed",
            SignProgress::Failed => "Failed",
            SignProgress::CommitFailed => "Signed, but saving to the document store failed",
        }
    }
}

/// Receives submission progress without blocking the submission
pub trait ProgressSink: Send + Sync {
    fn report(&self, progress: SignProgress);
}

impl<F> ProgressSink for F
where
    F: Fn(SignProgress) + Send + Sync,
{
    fn report(&self, progress: SignProgress) {
        self(progress)
    }
}

/// Discards progress
pub struct NoopProgress;

impl ProgressSink for NoopProgress {
    fn report(&self, _progress: SignProgress) {}
}

/// Local rendering resource created from the fetched bytes (an object URL in
/// a browser, a temp file in a terminal)
pub trait Preview: Send + Sync {
    /// Make the bytes viewable; returns a handle such as a URL or path
    fn open(&self, bytes: &[u8]) -> Result<String, String>;

    fn release(&self, handle: &str);
}

/// Releases its preview handle exactly once, when dropped
pub struct PreviewGuard {
    preview: Arc<dyn Preview>,
    handle: String,
}

impl PreviewGuard {
    pub fn handle(&self) -> &str {
        &self.handle
    }
}

impl Drop for PreviewGuard {
    fn drop(&mut self) {
        tracing::debug!(handle = %self.handle, "Releasing preview");
        self.preview.release(&self.handle);
    }
}

impl fmt::Debug for PreviewGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PreviewGuard")
            .field("handle", &self.handle)
            .finish()
    }
}

/// How the marker offset becomes gateway coordinates
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PlacementMapping {
    /// Fixed viewer constants
    Fixed(MappingConstants),
    /// Flip around the current page's MediaBox
    PageGeometry { margin_x: f64 },
}

impl Default for PlacementMapping {
    fn default() -> Self {
        PlacementMapping::Fixed(MappingConstants::default())
    }
}

pub struct SignSession {
    ticket: SessionTicket,
    document: Document,
    phase: SessionPhase,
    pdf: Option<LoadedPdf>,
    preview: Option<Arc<dyn Preview>>,
    preview_guard: Option<PreviewGuard>,
    mapping: PlacementMapping,

    certificate: Option<Certificate>,
    pin: Pin,
    reason: String,
    location: String,
    page: u32,
    drag: DragTracker,
    field_errors: FieldErrors,

    rejection_reason: String,
    rejection_error: Option<String>,
    last_error: Option<SignError>,
}

impl fmt::Debug for SignSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignSession")
            .field("ticket", &self.ticket)
            .field("document", &self.document.id)
            .field("phase", &self.phase)
            .field("page", &self.page)
            .finish_non_exhaustive()
    }
}

impl SignSession {
    pub fn new(ticket: SessionTicket, document: Document) -> Self {
        Self {
            ticket,
            document,
            phase: SessionPhase::Idle,
            pdf: None,
            preview: None,
            preview_guard: None,
            mapping: PlacementMapping::default(),
            certificate: None,
            pin: Pin::default(),
            reason: String::new(),
            location: String::new(),
            page: 0,
            drag: DragTracker::new(),
            field_errors: FieldErrors::new(),
            rejection_reason: String::new(),
            rejection_error: None,
            last_error: None,
        }
    }

    pub fn with_preview(mut self, preview: Arc<dyn Preview>) -> Self {
        self.preview = Some(preview);
        self
    }

    pub fn with_mapping(mut self, mapping: PlacementMapping) -> Self {
        self.mapping = mapping;
        self
    }

    pub fn ticket(&self) -> SessionTicket {
        self.ticket
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn field_errors(&self) -> &FieldErrors {
        &self.field_errors
    }

    pub fn last_error(&self) -> Option<&SignError> {
        self.last_error.as_ref()
    }

    pub fn rejection_error(&self) -> Option<&str> {
        self.rejection_error.as_deref()
    }

    pub fn preview_handle(&self) -> Option<&str> {
        self.preview_guard.as_ref().map(PreviewGuard::handle)
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn page_count(&self) -> u32 {
        self.pdf.as_ref().map(LoadedPdf::page_count).unwrap_or(0)
    }

    /// Fetch the document's PDF and move to `Ready`
    ///
    /// Any previous preview is released and the marker returns to the origin.
    /// On failure the session stays `Idle`.
    pub async fn load(&mut self, fetcher: &dyn DocumentFetcher) -> Result<(), SignError> {
        if !matches!(self.phase, SessionPhase::Idle | SessionPhase::Ready) {
            return Err(phase_error("loading", self.phase));
        }

        self.preview_guard = None;
        self.pdf = None;
        self.page = 0;
        self.drag.reset();
        self.phase = SessionPhase::Idle;

        tracing::info!(document = %self.document.id, "Fetching document");
        let bytes = fetcher
            .fetch_document_bytes(&self.document.url)
            .await
            .map_err(|e| {
                tracing::error!(document = %self.document.id, "Fetch failed: {}", e);
                SignError::Transport(e.to_string())
            })?;

        let pdf = LoadedPdf::from_bytes(bytes).map_err(|e| {
            tracing::error!(document = %self.document.id, "Unusable PDF: {}", e);
            SignError::Transport(e.to_string())
        })?;

        if let Some(preview) = &self.preview {
            match preview.open(pdf.bytes()) {
                Ok(handle) => {
                    self.preview_guard = Some(PreviewGuard {
                        preview: Arc::clone(preview),
                        handle,
                    });
                }
                Err(e) => tracing::warn!("Preview unavailable: {}", e),
            }
        }

        tracing::info!(
            document = %self.document.id,
            pages = pdf.page_count(),
            "Document ready"
        );
        self.pdf = Some(pdf);
        self.phase = SessionPhase::Ready;
        Ok(())
    }

    pub fn set_certificate(&mut self, certificate: Certificate) {
        self.certificate = Some(certificate);
        self.field_errors.remove("certificate");
    }

    pub fn set_pin(&mut self, pin: Pin) {
        if pin.is_empty() {
            self.field_errors.add("pin", PIN_REQUIRED);
        } else {
            self.field_errors.remove("pin");
        }
        self.pin = pin;
    }

    pub fn set_reason(&mut self, reason: impl Into<String>) {
        self.reason = reason.into();
    }

    pub fn set_location(&mut self, location: impl Into<String>) {
        self.location = location.into();
    }

    /// Follow the viewer's page navigation, clamped to the document
    pub fn set_page(&mut self, page: u32) {
        self.page = page.min(self.page_count().saturating_sub(1));
    }

    pub fn drag(&mut self) -> &mut DragTracker {
        &mut self.drag
    }

    /// Gateway coordinates of the marker's settled position
    pub fn placement(&self) -> (f64, f64) {
        let Offset { x, y } = self.drag.settled();
        map_to_gateway(x, y, self.mapping_constants())
    }

    fn mapping_constants(&self) -> MappingConstants {
        match self.mapping {
            PlacementMapping::Fixed(constants) => constants,
            PlacementMapping::PageGeometry { margin_x } => self
                .pdf
                .as_ref()
                .and_then(|pdf| pdf.page_media_box(self.page).ok())
                .map(|mb| MappingConstants::for_media_box(mb, margin_x))
                .unwrap_or_default(),
        }
    }

    /// Build the request, or report every missing required input
    pub fn validate(&self) -> Result<SignRequest, FieldErrors> {
        let mut errors = FieldErrors::new();
        if self.pin.is_empty() {
            errors.add("pin", PIN_REQUIRED);
        }
        if self.certificate.is_none() {
            errors.add("certificate", "A certificate is required.");
        }
        if self.pdf.is_none() {
            errors.add("pdf", "The document has not finished loading.");
        }

        match (&self.certificate, &self.pdf, errors.is_empty()) {
            (Some(certificate), Some(pdf), true) => {
                let (x, y) = self.placement();
                Ok(SignRequest {
                    document_id: self.document.id.clone(),
                    certificate: certificate.clone(),
                    pin: self.pin.clone(),
                    pdf: pdf.bytes().to_vec(),
                    reason: self.reason.clone(),
                    location: self.location.clone(),
                    page: self.page,
                    x,
                    y,
                })
            }
            _ => Err(errors),
        }
    }

    /// Validate, sign, commit and mark the document signed
    ///
    /// `Err` means validation failed: the session is back in `Ready` with
    /// field errors and no remote was called. `Ok` carries the terminal
    /// outcome; remote failures are classified into
    /// [`SessionOutcome::Failed`]. There is no retry.
    pub async fn submit(
        &mut self,
        gateway: &dyn SigningGateway,
        store: &dyn DocumentStore,
        progress: &dyn ProgressSink,
    ) -> Result<SessionOutcome, FieldErrors> {
        if !matches!(self.phase, SessionPhase::Idle | SessionPhase::Ready) {
            let mut errors = FieldErrors::new();
            errors.add("phase", format!("Cannot sign while {:?}", self.phase));
            return Err(errors);
        }

        self.phase = SessionPhase::Validating;
        let request = match self.validate() {
            Ok(request) => request,
            Err(errors) => {
                tracing::info!(
                    document = %self.document.id,
                    fields = %errors,
                    "Sign request incomplete"
                );
                self.field_errors = errors.clone();
                self.phase = if self.pdf.is_some() {
                    SessionPhase::Ready
                } else {
                    SessionPhase::Idle
                };
                return Err(errors);
            }
        };
        self.field_errors = FieldErrors::new();

        self.phase = SessionPhase::Submitting;
        tracing::info!(
            document = %request.document_id,
            page = request.page,
            x = request.x,
            y = request.y,
            "Submitting document for signature"
        );

        match commit(request, gateway, store, progress).await {
            Ok(()) => {
                tracing::info!(document = %self.document.id, "Document signed");
                self.phase = SessionPhase::Succeeded;
                progress.report(SignProgress::Completed);
                Ok(SessionOutcome::Signed)
            }
            Err(err) => {
                tracing::error!(document = %self.document.id, "Signing failed: {}", err);
                self.phase = SessionPhase::Failed;
                progress.report(match err {
                    SignError::Commit(_) => SignProgress::CommitFailed,
                    _ => SignProgress::Failed,
                });
                self.last_error = Some(err.clone());
                Ok(SessionOutcome::Failed(err))
            }
        }
    }

    /// Switch to collecting a rejection reason
    pub fn begin_rejection(&mut self) -> bool {
        if matches!(
            self.phase,
            SessionPhase::Idle | SessionPhase::Ready | SessionPhase::Failed
        ) {
            self.phase = SessionPhase::Rejecting;
            self.rejection_error = None;
            true
        } else {
            false
        }
    }

    pub fn cancel_rejection(&mut self) {
        if self.phase == SessionPhase::Rejecting {
            self.phase = if self.pdf.is_some() {
                SessionPhase::Ready
            } else {
                SessionPhase::Idle
            };
            self.rejection_error = None;
        }
    }

    pub fn set_rejection_reason(&mut self, reason: impl Into<String>) {
        self.rejection_reason = reason.into();
    }

    /// Send the rejection. On failure the session stays in `Rejecting` with
    /// an inline error.
    pub async fn reject(
        &mut self,
        gateway: &dyn SigningGateway,
    ) -> Result<SessionOutcome, SignError> {
        if self.phase != SessionPhase::Rejecting {
            return Err(phase_error("rejecting", self.phase));
        }
        if self.rejection_reason.trim().is_empty() {
            let mut errors = FieldErrors::new();
            errors.add("reason", "The rejection reason is required.");
            self.rejection_error = Some(SignError::Validation(errors.clone()).user_message());
            return Err(SignError::Validation(errors));
        }

        tracing::info!(document = %self.document.id, "Rejecting document");
        match gateway
            .reject_document(&self.document.id, &self.rejection_reason)
            .await
        {
            Ok(()) => {
                self.rejection_error = None;
                Ok(SessionOutcome::Rejected)
            }
            Err(e) => {
                tracing::error!(document = %self.document.id, "Rejection failed: {}", e);
                let err = SignError::from_remote(e);
                self.rejection_error = Some(err.user_message());
                Err(err)
            }
        }
    }

    /// The user closed the signer without finishing
    pub fn cancel(&self) -> SessionOutcome {
        SessionOutcome::Cancelled
    }
}

const PIN_REQUIRED: &str = "The certificate PIN is required.";

fn phase_error(action: &str, phase: SessionPhase) -> SignError {
    let mut errors = FieldErrors::new();
    errors.add("phase", format!("Cannot start {} while {:?}", action, phase));
    SignError::Validation(errors)
}

/// Sign, then persist the result, then flip the store's signed flag
///
/// Takes the request by value so it is dropped when this returns, whatever
/// the outcome.
async fn commit(
    request: SignRequest,
    gateway: &dyn SigningGateway,
    store: &dyn DocumentStore,
    progress: &dyn ProgressSink,
) -> Result<(), SignError> {
    progress.report(SignProgress::Signing);
    let outcome = gateway.sign_document(&request).await?;

    match outcome {
        SignOutcome::Signed(artifact) => {
            progress.report(SignProgress::Committing);
            tracing::info!(
                document = %request.document_id,
                bytes = artifact.as_bytes().len(),
                "Uploading signed document"
            );
            store
                .commit_signed(&request.document_id, &artifact)
                .await
                .map_err(commit_failure)?;
        }
        SignOutcome::Processed(message) => {
            tracing::info!(document = %request.document_id, "Gateway processed: {}", message);
        }
    }

    store
        .mark_signed(&request.document_id)
        .await
        .map_err(commit_failure)?;
    Ok(())
}

/// Past the gateway the document is already signed, so store failures are
/// never classified as signing failures
fn commit_failure(err: RemoteError) -> SignError {
    SignError::Commit(err.to_string())
}
