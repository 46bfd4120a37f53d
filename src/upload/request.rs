use crate::config::SDK_NAME;
use crate::debug::{DEBUG_TAG_HEADER, DebugController};
use crate::domain::PendingPing;
use bytes::Bytes;
use chrono::Utc;
use flate2::Compression;
use flate2::write::GzEncoder;
use std::collections::BTreeMap;
use std::io::Write;
use uuid::Uuid;

/// One upload attempt for a pending ping. Built fresh for every attempt and
/// never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadRequest {
    pub document_id: Uuid,
    pub url: String,
    pub headers: BTreeMap<String, String>,
    pub body: Bytes,
}

impl UploadRequest {
    pub fn from_ping(ping: &PendingPing, debug: &DebugController<'_>, compress: bool) -> Self {
        let metadata = ping.metadata();
        let mut headers = BTreeMap::new();

        headers.insert(
            "Content-Type".to_string(),
            "application/json; charset=utf-8".to_string(),
        );
        headers.insert("Date".to_string(), Utc::now().to_rfc2822());
        headers.insert("User-Agent".to_string(), metadata.user_agent.clone());
        headers.insert("X-Client-Type".to_string(), SDK_NAME.to_string());
        headers.insert("X-Client-Version".to_string(), crate::VERSION.to_string());

        if let Some(tag) = debug.tag_for(ping) {
            headers.insert(DEBUG_TAG_HEADER.to_string(), tag.to_string());
        }

        let body = if compress {
            match gzip(ping.payload()) {
                Ok(compressed) => {
                    headers.insert("Content-Encoding".to_string(), "gzip".to_string());
                    Bytes::from(compressed)
                }
                Err(e) => {
                    tracing::warn!("Failed to compress ping {}, sending uncompressed: {e}", ping.id());
                    ping.payload().clone()
                }
            }
        } else {
            ping.payload().clone()
        };

        Self {
            document_id: ping.id(),
            url: metadata.url(),
            headers,
            body,
        }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }

    pub fn is_compressed(&self) -> bool {
        self.header("Content-Encoding") == Some("gzip")
    }
}

fn gzip(data: &[u8]) -> Result<Vec<u8>, std::io::Error> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    encoder.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Configuration;
    use crate::domain::PingMetadata;
    use crate::upload::{PingUploader, UploadOutcome};
    use flate2::read::GzDecoder;
    use futures::future::BoxFuture;
    use std::io::Read;
    use std::sync::Arc;

    struct NoopUploader;

    impl PingUploader for NoopUploader {
        fn upload(&self, _request: UploadRequest) -> BoxFuture<'_, UploadOutcome> {
            Box::pin(async { UploadOutcome::Success })
        }
    }

    fn ping(tag: Option<&str>) -> PendingPing {
        PendingPing::new(
            Uuid::new_v4(),
            "metrics",
            Bytes::from_static(br#"{"metrics":{}}"#),
            Utc::now(),
            PingMetadata {
                server_endpoint: "https://collector.example.com/".into(),
                path: "/submit/app/metrics/1/abc".into(),
                user_agent: "stamped-agent/1.0".into(),
                channel: None,
                ping_tag: tag.map(str::to_string),
            },
        )
    }

    fn config(tag: Option<&str>) -> Configuration {
        let mut builder = Configuration::builder("app", Arc::new(NoopUploader))
            .user_agent("current-agent/2.0");
        if let Some(tag) = tag {
            builder = builder.ping_tag(tag);
        }
        builder.build().unwrap()
    }

    #[test]
    fn test_headers_and_url() {
        let config = config(None);
        let request = UploadRequest::from_ping(&ping(None), &DebugController::new(&config), false);

        assert_eq!(request.url, "https://collector.example.com/submit/app/metrics/1/abc");
        assert_eq!(request.header("User-Agent"), Some("stamped-agent/1.0"));
        assert_eq!(request.header("X-Client-Type"), Some(SDK_NAME));
        assert_eq!(
            request.header("Content-Type"),
            Some("application/json; charset=utf-8")
        );
        assert!(request.header("Date").is_some());
        assert!(request.header(DEBUG_TAG_HEADER).is_none());
        assert_eq!(request.body, Bytes::from_static(br#"{"metrics":{}}"#));
    }

    #[test]
    fn test_configured_tag_applies_to_untagged_ping() {
        let config = config(Some("live-tag"));
        let request = UploadRequest::from_ping(&ping(None), &DebugController::new(&config), false);
        assert_eq!(request.header(DEBUG_TAG_HEADER), Some("live-tag"));
    }

    #[test]
    fn test_stamped_tag_wins() {
        let config = config(Some("live-tag"));
        let request = UploadRequest::from_ping(
            &ping(Some("stamped-tag")),
            &DebugController::new(&config),
            false,
        );
        assert_eq!(request.header(DEBUG_TAG_HEADER), Some("stamped-tag"));
    }

    #[test]
    fn test_gzip_body() {
        let config = config(None);
        let source = ping(None);
        let request = UploadRequest::from_ping(&source, &DebugController::new(&config), true);

        assert!(request.is_compressed());
        let mut decoded = Vec::new();
        GzDecoder::new(&request.body[..])
            .read_to_end(&mut decoded)
            .unwrap();
        assert_eq!(&decoded[..], &source.payload()[..]);
    }
}
