use ember_types::PlayerIdentity;
use thiserror::Error;
use uuid::Uuid;

/// Errors from the external identity provider (§6: "out of scope").
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("identity token was rejected: {0}")]
    Rejected(String),
    #[error("identity provider is unreachable")]
    Unavailable,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// The identity provider collaborator named by §6. The real implementation
/// (OAuth endpoints, session-server round trips) is out of scope; this
/// trait is the seam C3 calls through at handshake and pre-expiry refresh.
pub trait AuthClient: Send + Sync {
    fn verify(&self, identity_token: &[u8]) -> Result<PlayerIdentity, AuthError>;
    fn refresh(&self, refresh_token: &str) -> Result<TokenPair, AuthError>;
}

/// Accepts any non-empty token and mints an identity from it, standing in
/// for a real session-server round trip when no identity provider is
/// configured. Only a placeholder for the out-of-scope external
/// `AuthClient` — never a substitute for real verification.
#[derive(Debug, Default, Clone, Copy)]
pub struct OfflineAuthClient;

impl AuthClient for OfflineAuthClient {
    fn verify(&self, identity_token: &[u8]) -> Result<PlayerIdentity, AuthError> {
        if identity_token.is_empty() {
            return Err(AuthError::Rejected("empty identity token".into()));
        }
        let uuid = offline_uuid(identity_token);
        Ok(PlayerIdentity::new(uuid, format!("player-{}", &uuid.simple().to_string()[..8])))
    }

    fn refresh(&self, _refresh_token: &str) -> Result<TokenPair, AuthError> {
        Err(AuthError::Unavailable)
    }
}

fn offline_uuid(seed: &[u8]) -> Uuid {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};
    let mut hasher = DefaultHasher::new();
    seed.hash(&mut hasher);
    let h1 = hasher.finish();
    seed.len().hash(&mut hasher);
    let h2 = hasher.finish();
    let mut bytes = [0u8; 16];
    bytes[..8].copy_from_slice(&h1.to_be_bytes());
    bytes[8..].copy_from_slice(&h2.to_be_bytes());
    bytes[6] = (bytes[6] & 0x0f) | 0x30;
    bytes[8] = (bytes[8] & 0x3f) | 0x80;
    Uuid::from_bytes(bytes)
}

/// Change-event kind emitted by the asset loader (§6), mirroring
/// `ember_assets`'s `UpdateKind` without depending on the wire type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetChangeKind {
    Init,
    AddOrUpdate,
    Remove,
}

/// `(asset_type, kind, id_set)` change events consumed by the asset-sync
/// engine (§4.6, §6). The loader that produces these — reading asset
/// definitions off disk or a remote source — is out of scope; this trait is
/// only the seam `ember-assets` generators are driven through.
pub trait AssetLoader: Send + Sync {
    fn poll_changes(&self) -> Vec<(String, AssetChangeKind, Vec<String>)>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopAssetLoader;

impl AssetLoader for NoopAssetLoader {
    fn poll_changes(&self) -> Vec<(String, AssetChangeKind, Vec<String>)> {
        Vec::new()
    }
}

/// Read-only deployment parameters collaborator (§6): day/night lengths,
/// keep-alive intervals, max packet sizes, VarInt string bounds. In this
/// crate these already live on `ServerConfig`/`WorldConfig`; the trait exists
/// so a future out-of-process config service can be swapped in without
/// touching C3/C5 call sites.
pub trait ConfigStore: Send + Sync {
    fn keepalive_interval_millis(&self) -> u64;
    fn keepalive_grace_millis(&self) -> u64;
}

/// Delivers already-authorized mutation requests (commands, admin actions)
/// to the owning world's executor. Out of scope (§6) — authorization and
/// command parsing happen upstream of this seam; `ember-server` only needs
/// the shape so `WorldCommand` has a place to grow a `Dispatch` variant.
pub trait CommandDispatcher: Send + Sync {
    fn dispatch(&self, world: &str, command_line: &str);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offline_auth_rejects_empty_token() {
        let err = OfflineAuthClient.verify(&[]).unwrap_err();
        assert_eq!(err, AuthError::Rejected("empty identity token".into()));
    }

    #[test]
    fn offline_auth_is_deterministic_for_the_same_token() {
        let a = OfflineAuthClient.verify(b"token-a").unwrap();
        let b = OfflineAuthClient.verify(b"token-a").unwrap();
        assert_eq!(a.uuid, b.uuid);
    }
}
