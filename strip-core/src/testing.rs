//! Testing utilities for the continuity core.
//!
//! This module provides deterministic stand-ins for every external
//! collaborator, plus a `TestHarness` that wires them to an in-memory store
//! so full admission/registration/advance scenarios run without network.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::{DeliveryError, ProviderError, ProviderResult, StoreError, StoreResult};
use crate::provider::{
    ImageGenerator, Mailer, ObjectStore, OutgoingEmail, RenderRequest, RenderedImage,
    TextGenerator, TextRequest,
};

/// A text generator that returns scripted responses in order.
#[derive(Default)]
pub struct ScriptedText {
    responses: Mutex<VecDeque<ProviderResult<String>>>,
    requests: Mutex<Vec<TextRequest>>,
}

impl ScriptedText {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful response.
    pub fn queue(&self, text: impl Into<String>) {
        self.responses.lock().unwrap().push_back(Ok(text.into()));
    }

    /// Queue a provider failure.
    pub fn queue_error(&self, error: ProviderError) {
        self.responses.lock().unwrap().push_back(Err(error));
    }

    /// Every request seen so far, in order.
    pub fn requests(&self) -> Vec<TextRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl TextGenerator for ScriptedText {
    async fn generate(&self, request: TextRequest) -> ProviderResult<String> {
        self.requests.lock().unwrap().push(request);
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| {
                Err(ProviderError::Unusable(
                    "no scripted text response".to_string(),
                ))
            })
    }
}

/// An image generator that returns scripted images in order.
#[derive(Default)]
pub struct ScriptedImage {
    responses: Mutex<VecDeque<ProviderResult<RenderedImage>>>,
    requests: Mutex<Vec<RenderRequest>>,
}

impl ScriptedImage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a small PNG-ish payload.
    pub fn queue_image(&self) {
        self.responses.lock().unwrap().push_back(Ok(RenderedImage {
            bytes: vec![0x89, 0x50, 0x4e, 0x47],
            content_type: "image/png".to_string(),
        }));
    }

    /// Queue a provider failure.
    pub fn queue_error(&self, error: ProviderError) {
        self.responses.lock().unwrap().push_back(Err(error));
    }

    /// Every render request seen so far, in order.
    pub fn requests(&self) -> Vec<RenderRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ImageGenerator for ScriptedImage {
    async fn render(&self, request: RenderRequest) -> ProviderResult<RenderedImage> {
        self.requests.lock().unwrap().push(request);
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| {
                Err(ProviderError::Unusable(
                    "no scripted image response".to_string(),
                ))
            })
    }
}

/// In-memory object store with a fake public base URL.
pub struct MemoryBucket {
    base_url: String,
    objects: Mutex<HashMap<String, (Vec<u8>, String)>>,
    fetched: Mutex<Vec<String>>,
    fail_gets: Mutex<bool>,
}

impl MemoryBucket {
    pub fn new() -> Self {
        Self {
            base_url: "https://cdn.test".to_string(),
            objects: Mutex::new(HashMap::new()),
            fetched: Mutex::new(Vec::new()),
            fail_gets: Mutex::new(false),
        }
    }

    /// URLs fetched via `get`, in order.
    pub fn fetched(&self) -> Vec<String> {
        self.fetched.lock().unwrap().clone()
    }

    /// Number of objects stored.
    pub fn object_count(&self) -> usize {
        self.objects.lock().unwrap().len()
    }

    /// Make subsequent `get` calls fail, simulating an unreachable artifact.
    pub fn fail_gets(&self) {
        *self.fail_gets.lock().unwrap() = true;
    }
}

impl Default for MemoryBucket {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ObjectStore for MemoryBucket {
    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> StoreResult<String> {
        let url = format!("{}/{}", self.base_url, key);
        self.objects
            .lock()
            .unwrap()
            .insert(url.clone(), (bytes, content_type.to_string()));
        Ok(url)
    }

    async fn get(&self, url: &str) -> StoreResult<(Vec<u8>, String)> {
        self.fetched.lock().unwrap().push(url.to_string());
        if *self.fail_gets.lock().unwrap() {
            return Err(StoreError::Unavailable {
                reason: "scripted fetch failure".to_string(),
            });
        }
        self.objects
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .ok_or_else(|| StoreError::Unavailable {
                reason: format!("no object at {url}"),
            })
    }
}

/// A mailer that records every message instead of delivering it.
#[derive(Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<OutgoingEmail>>,
    fail: Mutex<bool>,
}

impl RecordingMailer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent sends fail.
    pub fn fail_sends(&self) {
        *self.fail.lock().unwrap() = true;
    }

    /// Every message handed to the mailer, in order.
    pub fn sent(&self) -> Vec<OutgoingEmail> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, email: OutgoingEmail) -> Result<String, DeliveryError> {
        if *self.fail.lock().unwrap() {
            return Err(DeliveryError::Api {
                status: 500,
                message: "scripted delivery failure".to_string(),
            });
        }
        let mut sent = self.sent.lock().unwrap();
        sent.push(email);
        Ok(format!("delivery-{}", sent.len()))
    }
}

pub use harness::TestHarness;

mod harness {
    use std::sync::Arc;

    use super::{MemoryBucket, RecordingMailer, ScriptedImage, ScriptedText};
    use crate::engine::ContinuityEngine;
    use crate::gate::AdmissionGate;
    use crate::notify::Dispatcher;
    use crate::register::{Registrar, RegistrarPolicy};
    use crate::store::MemoryStore;
    use crate::token::UnsubSigner;

    /// Test harness wiring scripted collaborators to an in-memory store.
    pub struct TestHarness {
        pub store: Arc<MemoryStore>,
        pub text: Arc<ScriptedText>,
        pub image: Arc<ScriptedImage>,
        pub bucket: Arc<MemoryBucket>,
        pub mailer: Arc<RecordingMailer>,
        pub signer: UnsubSigner,
        pub gate: AdmissionGate,
        pub registrar: Registrar,
        pub engine: Arc<ContinuityEngine>,
    }

    impl TestHarness {
        /// Create a harness with the registration kickoff disabled, so tests
        /// drive every cycle explicitly.
        pub fn new() -> Self {
            let store = Arc::new(MemoryStore::new());
            let text = Arc::new(ScriptedText::new());
            let image = Arc::new(ScriptedImage::new());
            let bucket = Arc::new(MemoryBucket::new());
            let mailer = Arc::new(RecordingMailer::new());
            let signer = UnsubSigner::new("test-secret");

            let dispatcher = Dispatcher::new(
                mailer.clone(),
                signer.clone(),
                "https://strip.test",
            );
            let engine = Arc::new(ContinuityEngine::new(
                store.clone(),
                store.clone(),
                text.clone(),
                image.clone(),
                bucket.clone(),
                dispatcher,
            ));
            let gate = AdmissionGate::new(store.clone(), text.clone());
            let registrar = Registrar::new(
                store.clone(),
                Some(engine.clone()),
                RegistrarPolicy {
                    kickoff_first_episode: false,
                    ..RegistrarPolicy::default()
                },
            );

            Self {
                store,
                text,
                image,
                bucket,
                mailer,
                signer,
                gate,
                registrar,
                engine,
            }
        }

        /// Queue a passing policy judgment followed by a generated title,
        /// the responses one fresh admission consumes.
        pub fn queue_admission(&self, title: &str) {
            self.text.queue(r#"{"is_valid": true, "reason": null}"#);
            self.text.queue(format!("{{\"title\": \"{title}\"}}"));
        }

        /// Queue the responses one successful cycle consumes: a panel
        /// direction and a rendered image.
        pub fn queue_cycle(&self, direction: &str) {
            self.text.queue(direction);
            self.image.queue_image();
        }
    }

    impl Default for TestHarness {
        fn default() -> Self {
            Self::new()
        }
    }
}
