//! In-memory fakes of the remote traits for unit tests

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::error::RemoteError;
use crate::pdf::sample_pdf;
use crate::remote::{DocumentFetcher, DocumentStore, SigningGateway};
use crate::session::Preview;
use crate::types::{Document, ListScope, SignOutcome, SignRequest, SignedArtifact, SENT_STATUS};

pub(crate) fn document(id: &str) -> Document {
    Document {
        id: id.to_string(),
        title: format!("Documento {}", id),
        url: format!("https://store.test/{}.pdf", id),
        is_signed: false,
        date: "2024-05-01".to_string(),
        expiration: "2024-06-01".to_string(),
        status: SENT_STATUS.to_string(),
    }
}

pub(crate) fn documents(count: usize) -> Vec<Document> {
    (0..count).map(|i| document(&format!("D{}", i))).collect()
}

pub(crate) struct FakeFetcher {
    result: Result<Vec<u8>, RemoteError>,
    pub calls: AtomicUsize,
}

impl FakeFetcher {
    pub fn pdf(media_boxes: &[[i64; 4]]) -> Self {
        Self::returning(Ok(sample_pdf(media_boxes)))
    }

    pub fn returning(result: Result<Vec<u8>, RemoteError>) -> Self {
        Self {
            result,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl DocumentFetcher for FakeFetcher {
    async fn fetch_document_bytes(&self, _url: &str) -> Result<Vec<u8>, RemoteError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.result.clone()
    }
}

pub(crate) struct FakeGateway {
    sign: Result<SignOutcome, RemoteError>,
    reject: Result<(), RemoteError>,
    pub sign_calls: AtomicUsize,
    pub reject_calls: AtomicUsize,
    pub last_request: Mutex<Option<SignRequest>>,
}

impl FakeGateway {
    pub fn signing(artifact: &[u8]) -> Self {
        Self::new(Ok(SignOutcome::Signed(SignedArtifact(artifact.to_vec()))))
    }

    pub fn new(sign: Result<SignOutcome, RemoteError>) -> Self {
        Self {
            sign,
            reject: Ok(()),
            sign_calls: AtomicUsize::new(0),
            reject_calls: AtomicUsize::new(0),
            last_request: Mutex::new(None),
        }
    }

    pub fn failing_reject(mut self, err: RemoteError) -> Self {
        self.reject = Err(err);
        self
    }

    pub fn sign_count(&self) -> usize {
        self.sign_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SigningGateway for FakeGateway {
    async fn sign_document(&self, request: &SignRequest) -> Result<SignOutcome, RemoteError> {
        self.sign_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_request.lock().unwrap() = Some(request.clone());
        self.sign.clone()
    }

    async fn reject_document(&self, _document_id: &str, _reason: &str) -> Result<(), RemoteError> {
        self.reject_calls.fetch_add(1, Ordering::SeqCst);
        self.reject.clone()
    }
}

/// Records every call as `"<op>:<id>"`
#[derive(Default)]
pub(crate) struct FakeStore {
    pub listing: Mutex<Vec<Document>>,
    pub calls: Mutex<Vec<String>>,
    pub failing: Mutex<Option<(&'static str, RemoteError)>>,
}

impl FakeStore {
    pub fn with_documents(docs: Vec<Document>) -> Self {
        let store = Self::default();
        *store.listing.lock().unwrap() = docs;
        store
    }

    /// Make every call to `op` fail with `err`
    pub fn fail_on(self, op: &'static str, err: RemoteError) -> Self {
        *self.failing.lock().unwrap() = Some((op, err));
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, op: &'static str, id: &str) -> Result<(), RemoteError> {
        self.calls.lock().unwrap().push(format!("{}:{}", op, id));
        match &*self.failing.lock().unwrap() {
            Some((failing, err)) if *failing == op => Err(err.clone()),
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl DocumentStore for FakeStore {
    async fn list_documents(&self, scope: &ListScope) -> Result<Vec<Document>, RemoteError> {
        let label = match scope {
            ListScope::All => "*".to_string(),
            ListScope::Owner(email) => email.clone(),
        };
        self.record("list", &label)?;
        Ok(self.listing.lock().unwrap().clone())
    }

    async fn commit_signed(
        &self,
        document_id: &str,
        _artifact: &SignedArtifact,
    ) -> Result<(), RemoteError> {
        self.record("commit", document_id)
    }

    async fn mark_signed(&self, document_id: &str) -> Result<(), RemoteError> {
        self.record("mark", document_id)
    }

    async fn delete_document(&self, document_id: &str) -> Result<(), RemoteError> {
        self.record("delete", document_id)
    }

    async fn resend_notification(&self, document_id: &str) -> Result<(), RemoteError> {
        self.record("resend", document_id)
    }
}

/// Hands out `preview-N` handles and remembers releases
#[derive(Default)]
pub(crate) struct RecordingPreview {
    next: AtomicUsize,
    pub released: Mutex<Vec<String>>,
}

impl RecordingPreview {
    pub fn released(&self) -> Vec<String> {
        self.released.lock().unwrap().clone()
    }
}

impl Preview for RecordingPreview {
    fn open(&self, _bytes: &[u8]) -> Result<String, String> {
        let n = self.next.fetch_add(1, Ordering::SeqCst);
        Ok(format!("preview-{}", n))
    }

    fn release(&self, handle: &str) {
        self.released.lock().unwrap().push(handle.to_string());
    }
}
