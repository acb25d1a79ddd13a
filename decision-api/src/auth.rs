//! Bouncer authentication by API key.
//!
//! Keys are random 32-byte values shown once at creation; only their SHA-256
//! digest is stored.

use crate::error::{ApiError, Result};
use crate::storage::{Bouncer, IdentityResolver};
use axum::http::HeaderMap;
use rand::RngCore;
use sha2::{Digest, Sha256};

/// Header carrying the bouncer API key.
pub const API_KEY_HEADER: &str = "x-api-key";

/// Generate a new API key (hex encoded).
pub fn generate_api_key() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Digest under which an API key is stored.
pub fn hash_api_key(api_key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(api_key.as_bytes());
    hex::encode(hasher.finalize())
}

/// Resolve the bouncer behind a request.
///
/// A missing header, a non-UTF-8 value or an unknown key are all
/// [`ApiError::Auth`]. Store failures propagate as store errors.
pub async fn authenticate(resolver: &dyn IdentityResolver, headers: &HeaderMap) -> Result<Bouncer> {
    let api_key = headers
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .ok_or(ApiError::Auth)?;

    match resolver.resolve_api_key(api_key).await? {
        Some(bouncer) => Ok(bouncer),
        None => {
            tracing::debug!("rejected unknown api key");
            Err(ApiError::Auth)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::SqliteStore;
    use axum::http::HeaderValue;

    #[test]
    fn generated_keys_are_unique_hex() {
        let a = generate_api_key();
        let b = generate_api_key();
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }

    #[test]
    fn hash_is_deterministic() {
        assert_eq!(hash_api_key("k"), hash_api_key("k"));
        assert_ne!(hash_api_key("k"), hash_api_key("l"));
        assert_ne!(hash_api_key("k"), "k");
    }

    #[tokio::test]
    async fn authenticate_known_key() {
        let store = SqliteStore::in_memory().await.unwrap();
        let bouncer = store.create_bouncer("fw-1", "good-key").await.unwrap();

        let mut headers = HeaderMap::new();
        headers.insert(API_KEY_HEADER, HeaderValue::from_static("good-key"));

        let resolved = authenticate(&store, &headers).await.unwrap();
        assert_eq!(resolved.id, bouncer.id);
    }

    #[tokio::test]
    async fn authenticate_rejects_missing_and_unknown_keys() {
        let store = SqliteStore::in_memory().await.unwrap();
        store.create_bouncer("fw-1", "good-key").await.unwrap();

        let empty = HeaderMap::new();
        assert!(matches!(
            authenticate(&store, &empty).await,
            Err(ApiError::Auth)
        ));

        let mut wrong = HeaderMap::new();
        wrong.insert(API_KEY_HEADER, HeaderValue::from_static("bad-key"));
        assert!(matches!(
            authenticate(&store, &wrong).await,
            Err(ApiError::Auth)
        ));
    }
}
