//! The installation's client id, persisted next to the pending pings.

use super::{StorageDirectory, StorageError};
use uuid::Uuid;

/// Reserved key. It is not a UUID, so the pending queue never mistakes it
/// for a ping record.
pub const CLIENT_ID_KEY: &str = "client_info_client_id";

/// Returns the stored client id, generating and persisting a fresh one when
/// none exists or the stored bytes are unreadable.
pub async fn load_or_create_client_id<S: StorageDirectory>(store: &S) -> Result<Uuid, StorageError> {
    if let Some(bytes) = store.get(CLIENT_ID_KEY).await? {
        match std::str::from_utf8(&bytes).ok().map(Uuid::parse_str) {
            Some(Ok(id)) => return Ok(id),
            _ => tracing::warn!("Stored client id is unreadable, generating a new one"),
        }
    }

    let id = Uuid::new_v4();
    store.put(CLIENT_ID_KEY, id.to_string().into_bytes()).await?;
    tracing::info!("Generated new client id {id}");
    Ok(id)
}
