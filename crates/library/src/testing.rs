//! Shared fixtures for service tests.

use crate::{AppState, Context};
use docshelf_client::Session;
use docshelf_client::backend::MockBackend;
use docshelf_ocr::MockRecognizer;
use docshelf_storage::backend::MockBackend as MockStorage;
use std::sync::Arc;

pub(crate) const PASSWORD: &str = "secret1";

/// A context wired to in-memory collaborators, with the concrete mocks kept
/// around so tests can inspect them and inject failures.
pub(crate) struct TestBed {
    pub backend: Arc<MockBackend>,
    pub storage: Arc<MockStorage>,
    pub ctx: Context,
}

impl TestBed {
    pub fn new() -> Self {
        Self::with_recognizer(MockRecognizer::returning("Scanned receipt total 42"))
    }

    pub fn with_recognizer(recognizer: MockRecognizer) -> Self {
        let backend = Arc::new(MockBackend::default());
        let storage = Arc::new(MockStorage::default());
        let ctx = Context::new(backend.clone(), storage.clone(), Arc::new(recognizer)).unwrap();
        Self { backend, storage, ctx }
    }

    /// Register an account and return a fresh session for it.
    pub async fn session(&self, email: &str) -> Session {
        use docshelf_client::AuthService;

        self.backend.add_user(email, PASSWORD).await;
        self.backend.sign_in(email, PASSWORD).await.unwrap()
    }
}

pub(crate) async fn signed_in(bed: &TestBed, email: &str) -> AppState {
    bed.backend.add_user(email, PASSWORD).await;
    let mut state = AppState::default();
    state.sign_in(&bed.ctx, email, PASSWORD).await.unwrap();
    state
}

/// A minimal PDF with one page and one line of text.
pub(crate) fn pdf(text: &str) -> Vec<u8> {
    let content = format!("BT /F1 12 Tf 72 712 Td ({text}) Tj ET");
    let mut out = b"%PDF-1.4\n1 0 obj\n<< /Type /Page /Contents 2 0 R >>\nendobj\n".to_vec();
    out.extend_from_slice(format!("2 0 obj\n<< /Length {} >>\nstream\n", content.len()).as_bytes());
    out.extend_from_slice(content.as_bytes());
    out.extend_from_slice(b"\nendstream\nendobj\ntrailer\n<< /Root 1 0 R >>\n%%EOF\n");
    out
}

/// PNG signature followed by filler; enough to pass content sniffing.
pub(crate) fn png() -> Vec<u8> {
    let mut out = vec![0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];
    out.extend_from_slice(&[0; 24]);
    out
}
