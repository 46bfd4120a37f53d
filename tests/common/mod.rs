#![allow(dead_code)]

use bytes::Bytes;
use chrono::Utc;
use futures::future::BoxFuture;
use parking_lot::Mutex;
use ping_lifecycle::config::LifecycleSettings;
use ping_lifecycle::domain::PingMetadata;
use ping_lifecycle::{Configuration, PendingPing, PingUploader, UploadOutcome, UploadRequest};
use std::collections::VecDeque;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use uuid::Uuid;

/// Uploader fake that replays scripted outcomes and records every request.
/// Once the script runs out every upload succeeds.
#[derive(Default)]
pub struct ScriptedUploader {
    script: Mutex<VecDeque<UploadOutcome>>,
    requests: Mutex<Vec<UploadRequest>>,
    delay: Option<Duration>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptedUploader {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_script(outcomes: Vec<UploadOutcome>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(outcomes.into()),
            ..Self::default()
        })
    }

    pub fn with_delay(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            delay: Some(delay),
            ..Self::default()
        })
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().len()
    }

    pub fn requests(&self) -> Vec<UploadRequest> {
        self.requests.lock().clone()
    }

    pub fn uploaded_ids(&self) -> Vec<Uuid> {
        self.requests.lock().iter().map(|r| r.document_id).collect()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

impl PingUploader for ScriptedUploader {
    fn upload(&self, request: UploadRequest) -> BoxFuture<'_, UploadOutcome> {
        Box::pin(async move {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            self.requests.lock().push(request);

            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }

            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            self.script
                .lock()
                .pop_front()
                .unwrap_or(UploadOutcome::Success)
        })
    }
}

pub fn configuration(uploader: Arc<ScriptedUploader>) -> Configuration {
    Configuration::builder("org.example.app", uploader)
        .server_endpoint("https://collector.example.com")
        .user_agent("ping-lifecycle-tests/1.0")
        .build()
        .unwrap()
}

pub fn lifecycle_settings(storage_path: &Path) -> LifecycleSettings {
    LifecycleSettings {
        storage_path: storage_path.to_path_buf(),
        compress_uploads: false,
        ..LifecycleSettings::default()
    }
}

pub fn pending_ping(document_type: &str) -> PendingPing {
    pending_ping_with_tag(document_type, None)
}

pub fn pending_ping_with_tag(document_type: &str, tag: Option<&str>) -> PendingPing {
    let id = Uuid::new_v4();
    PendingPing::new(
        id,
        document_type,
        Bytes::from(format!(r#"{{"ping_info":{{"document_id":"{id}"}}}}"#)),
        Utc::now(),
        PingMetadata {
            server_endpoint: "https://collector.example.com/".to_string(),
            path: format!("/submit/org-example-app/{document_type}/1/{id}"),
            user_agent: "ping-lifecycle-tests/1.0".to_string(),
            channel: None,
            ping_tag: tag.map(str::to_string),
        },
    )
}

/// Polls `condition` until it holds or `timeout` passes.
pub async fn wait_until(timeout: Duration, condition: impl Fn() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    condition()
}
