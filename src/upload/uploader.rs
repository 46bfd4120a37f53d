use super::{UploadOutcome, UploadRequest};
use futures::future::BoxFuture;

/// The transport seam. Implementations perform the actual network call and
/// classify the result; the core never opens sockets itself.
///
/// The scheduler bounds every call with its upload timeout and may drop the
/// returned future on shutdown, so implementations must not rely on being
/// polled to completion.
pub trait PingUploader: Send + Sync {
    fn upload(&self, request: UploadRequest) -> BoxFuture<'_, UploadOutcome>;
}
