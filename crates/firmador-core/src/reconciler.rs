//! List/session reconciler
//!
//! [`DocumentBoard`] is the single owner of the in-memory document
//! collection. It hands out at most one [`SignSession`] at a time and applies
//! that session's outcome once, after the remote side confirmed it. Every
//! mutation takes `&mut self`, so readers only ever see a fully applied
//! update.

use crate::auth::SessionState;
use crate::error::SignError;
use crate::pagination::{PageSummary, Paginator, DEFAULT_PAGE_SIZE};
use crate::remote::DocumentStore;
use crate::session::{SessionOutcome, SessionTicket, SignSession};
use crate::types::{Document, ListScope, REJECTED_STATUS};

/// What the container should be showing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    List,
    Signing(SessionTicket),
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct ActiveSession {
    ticket: SessionTicket,
    document_id: String,
}

#[derive(Debug)]
pub struct DocumentBoard {
    documents: Vec<Document>,
    scope: ListScope,
    is_admin: bool,
    active: Option<ActiveSession>,
    last_ticket: u64,
    paginator: Paginator,
}

impl DocumentBoard {
    pub fn new(state: &SessionState) -> Self {
        Self {
            documents: Vec::new(),
            scope: state.scope(),
            is_admin: state.is_admin(),
            active: None,
            last_ticket: 0,
            paginator: Paginator::new(DEFAULT_PAGE_SIZE),
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.paginator = Paginator::new(page_size);
        self
    }

    pub fn scope(&self) -> &ListScope {
        &self.scope
    }

    pub fn is_admin(&self) -> bool {
        self.is_admin
    }

    pub fn view(&self) -> View {
        match &self.active {
            Some(active) => View::Signing(active.ticket),
            None => View::List,
        }
    }

    /// The whole collection, unfiltered
    pub fn documents(&self) -> &[Document] {
        &self.documents
    }

    pub fn find(&self, id: &str) -> Option<&Document> {
        self.documents.iter().find(|d| d.id == id)
    }

    /// Replace the collection with the store's listing for this board's scope
    ///
    /// On failure the collection is left as it was.
    pub async fn refresh(&mut self, store: &dyn DocumentStore) -> Result<usize, SignError> {
        let documents = store.list_documents(&self.scope).await.map_err(|e| {
            tracing::error!("Listing documents failed: {}", e);
            SignError::from_remote(e)
        })?;

        tracing::info!(count = documents.len(), "Documents loaded");
        self.documents = documents;
        self.clamp_page();
        Ok(self.documents.len())
    }

    /// Documents this user should see: all of them for administrators,
    /// otherwise only the ones still awaiting a signature
    pub fn filtered(&self) -> Vec<&Document> {
        self.documents
            .iter()
            .filter(|d| self.is_admin || d.is_awaiting_signature())
            .collect()
    }

    /// The current page of [`filtered`](Self::filtered)
    pub fn visible(&self) -> Vec<&Document> {
        let filtered = self.filtered();
        let range = self.paginator.range(filtered.len());
        filtered[range].to_vec()
    }

    pub fn page(&self) -> usize {
        self.paginator.page()
    }

    pub fn page_count(&self) -> usize {
        self.paginator.page_count(self.filtered_len())
    }

    pub fn next_page(&mut self) -> bool {
        let total = self.filtered_len();
        self.paginator.next(total)
    }

    pub fn previous_page(&mut self) -> bool {
        self.paginator.previous()
    }

    pub fn set_page(&mut self, page: usize) {
        let total = self.filtered_len();
        self.paginator.set_page(page, total);
    }

    pub fn page_summary(&self) -> PageSummary {
        self.paginator.summary(self.filtered_len())
    }

    /// Open a signing session for one document
    ///
    /// Only one session may be active; the previous one has to complete or
    /// be cancelled first.
    pub fn select_for_signing(&mut self, id: &str) -> Result<SignSession, SignError> {
        if self.active.is_some() {
            return Err(SignError::Busy);
        }
        let document = self
            .find(id)
            .cloned()
            .ok_or_else(|| SignError::UnknownDocument(id.to_string()))?;

        self.last_ticket += 1;
        let ticket = SessionTicket(self.last_ticket);
        self.active = Some(ActiveSession {
            ticket,
            document_id: document.id.clone(),
        });

        tracing::info!(document = %document.id, %ticket, "Signing session opened");
        Ok(SignSession::new(ticket, document))
    }

    /// Apply a session's outcome and return to the list
    ///
    /// Returns false, changing nothing, when `ticket` is not the active
    /// session (already completed, cancelled, or never issued).
    pub fn complete(&mut self, ticket: SessionTicket, outcome: &SessionOutcome) -> bool {
        let active = match &self.active {
            Some(active) if active.ticket == ticket => active.document_id.clone(),
            _ => {
                tracing::debug!(%ticket, "Ignoring stale session completion");
                return false;
            }
        };
        self.active = None;

        match outcome {
            SessionOutcome::Signed => {
                if let Some(doc) = self.documents.iter_mut().find(|d| d.id == active) {
                    doc.is_signed = true;
                }
                tracing::info!(document = %active, "Document marked signed");
            }
            SessionOutcome::Rejected => {
                if let Some(doc) = self.documents.iter_mut().find(|d| d.id == active) {
                    doc.status = REJECTED_STATUS.to_string();
                }
                tracing::info!(document = %active, "Document rejected");
            }
            SessionOutcome::Failed(err) => {
                tracing::warn!(document = %active, "Signing session failed: {}", err);
            }
            SessionOutcome::Cancelled => {
                tracing::info!(document = %active, "Signing session cancelled");
            }
        }

        self.clamp_page();
        true
    }

    /// Close whatever session is open, as if the user cancelled it
    pub fn cancel_active(&mut self) -> bool {
        match self.active.as_ref().map(|a| a.ticket) {
            Some(ticket) => self.complete(ticket, &SessionOutcome::Cancelled),
            None => false,
        }
    }

    /// Delete a document remotely, then drop it from the collection
    pub async fn delete(&mut self, store: &dyn DocumentStore, id: &str) -> Result<(), SignError> {
        self.check_admin_action(id)?;
        if self.active.as_ref().is_some_and(|a| a.document_id == id) {
            return Err(SignError::Busy);
        }

        store.delete_document(id).await.map_err(|e| {
            tracing::error!(document = %id, "Delete failed: {}", e);
            SignError::from_remote(e)
        })?;

        self.documents.retain(|d| d.id != id);
        self.clamp_page();
        tracing::info!(document = %id, "Document deleted");
        Ok(())
    }

    /// Ask the store to email the recipient again; the collection is untouched
    pub async fn resend(&self, store: &dyn DocumentStore, id: &str) -> Result<(), SignError> {
        self.check_admin_action(id)?;

        store.resend_notification(id).await.map_err(|e| {
            tracing::error!(document = %id, "Resend failed: {}", e);
            SignError::from_remote(e)
        })?;

        tracing::info!(document = %id, "Notification resent");
        Ok(())
    }

    fn check_admin_action(&self, id: &str) -> Result<(), SignError> {
        if !self.is_admin {
            return Err(SignError::Forbidden);
        }
        if self.find(id).is_none() {
            return Err(SignError::UnknownDocument(id.to_string()));
        }
        Ok(())
    }

    fn filtered_len(&self) -> usize {
        self.documents
            .iter()
            .filter(|d| self.is_admin || d.is_awaiting_signature())
            .count()
    }

    fn clamp_page(&mut self) {
        let total = self.filtered_len();
        self.paginator.clamp(total);
    }
}
