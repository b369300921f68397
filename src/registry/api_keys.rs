use base64::Engine;
use chrono::Utc;
use rand::Rng;
use sha2::{Digest, Sha256};

use crate::error::{EngineError, EngineResult};
use crate::models::api_key::ApiKey;
use crate::store::{now_str, Store, TS_FORMAT};

const PLAINTEXT_PREFIX: &str = "rl_";
/// 18 random bytes -> 24 base64url characters, >= 128 bits of entropy.
const TOKEN_BYTES: usize = 18;

fn fingerprint(plaintext: &str) -> String {
    hex::encode(Sha256::digest(plaintext.as_bytes()))
}

fn generate_plaintext() -> String {
    let mut rng = rand::rng();
    let bytes: Vec<u8> = (0..TOKEN_BYTES).map(|_| rng.random()).collect();
    format!("{PLAINTEXT_PREFIX}{}", base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes))
}

fn validate_name(name: &str) -> EngineResult<()> {
    if name.is_empty() || name.chars().count() > 100 {
        return Err(EngineError::ValidationError(
            "name must be non-empty and at most 100 characters".into(),
        ));
    }
    Ok(())
}

fn validate_limit_window(limit: u32, window_seconds: u64) -> EngineResult<()> {
    if limit < 1 {
        return Err(EngineError::ValidationError("limit must be >= 1".into()));
    }
    if window_seconds < 1 {
        return Err(EngineError::ValidationError("window_seconds must be >= 1".into()));
    }
    Ok(())
}

fn validate_expires_at(expires_at: Option<&str>) -> EngineResult<()> {
    if let Some(ts) = expires_at {
        let parsed = chrono::NaiveDateTime::parse_from_str(ts, TS_FORMAT)
            .map_err(|_| EngineError::ValidationError("expires_at is not a valid timestamp".into()))?;
        if parsed <= Utc::now().naive_utc() {
            return Err(EngineError::ValidationError("expires_at must be strictly in the future".into()));
        }
    }
    Ok(())
}

/// Business-logic wrapper over `store::api_keys`: owns fingerprinting,
/// plaintext generation, and admin-facing validation (spec.md §4.3). The
/// store itself never sees a plaintext key.
pub struct ApiKeyRegistry<'a> {
    store: &'a Store,
}

impl<'a> ApiKeyRegistry<'a> {
    pub fn new(store: &'a Store) -> Self {
        Self { store }
    }

    pub fn create(
        &self,
        name: &str,
        limit: u32,
        window_seconds: u64,
        expires_at: Option<&str>,
        metadata: &str,
    ) -> EngineResult<(ApiKey, String)> {
        validate_name(name)?;
        validate_limit_window(limit, window_seconds)?;
        validate_expires_at(expires_at)?;

        let mut plaintext = generate_plaintext();
        let mut fp = fingerprint(&plaintext);
        // Astronomically unlikely, but the fingerprint is unique across all
        // keys including inactive ones (spec.md §3) — retry on collision.
        while self.store.fingerprint_exists(&fp)? {
            plaintext = generate_plaintext();
            fp = fingerprint(&plaintext);
        }

        let record = self.store.insert_api_key(&fp, name, limit, window_seconds, expires_at, metadata)?;
        Ok((record, plaintext))
    }

    pub fn lookup(&self, plaintext: &str) -> EngineResult<Option<ApiKey>> {
        let fp = fingerprint(plaintext);
        Ok(self.store.lookup_api_key_by_fingerprint(&fp)?)
    }

    pub fn get_by_id(&self, id: i64) -> EngineResult<ApiKey> {
        self.store
            .get_api_key_by_id(id)?
            .ok_or_else(|| EngineError::NotFound(format!("api key {id}")))
    }

    pub fn list(&self, limit: i64, offset: i64) -> EngineResult<Vec<ApiKey>> {
        Ok(self.store.list_api_keys(limit, offset)?)
    }

    pub fn rotate(&self, id: i64) -> EngineResult<(ApiKey, String)> {
        self.get_by_id(id)?;
        let mut plaintext = generate_plaintext();
        let mut fp = fingerprint(&plaintext);
        while self.store.fingerprint_exists(&fp)? {
            plaintext = generate_plaintext();
            fp = fingerprint(&plaintext);
        }
        self.store.rotate_api_key(id, &fp)?;
        let record = self.get_by_id(id)?;
        Ok((record, plaintext))
    }

    pub fn deactivate(&self, id: i64) -> EngineResult<()> {
        self.get_by_id(id)?;
        Ok(self.store.deactivate_api_key(id)?)
    }

    pub fn delete(&self, id: i64) -> EngineResult<()> {
        self.get_by_id(id)?;
        Ok(self.store.delete_api_key(id)?)
    }

    pub fn count_active(&self) -> EngineResult<i64> {
        Ok(self.store.count_active_api_keys()?)
    }

    pub fn is_expired(key: &ApiKey) -> bool {
        match &key.expires_at {
            Some(ts) => ts.as_str() <= now_str().as_str(),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> Store {
        Store::new(":memory:").unwrap()
    }

    #[test]
    fn rotate_invalidates_old_plaintext_keeps_id() {
        let store = store();
        let registry = ApiKeyRegistry::new(&store);
        let (created, old_plain) = registry.create("svc-a", 100, 60, None, "{}").unwrap();

        let (rotated, new_plain) = registry.rotate(created.id).unwrap();
        assert_eq!(rotated.id, created.id);

        assert!(registry.lookup(&old_plain).unwrap().is_none());
        let found = registry.lookup(&new_plain).unwrap().unwrap();
        assert_eq!(found.id, created.id);
    }

    #[test]
    fn create_rejects_empty_name() {
        let store = store();
        let registry = ApiKeyRegistry::new(&store);
        let err = registry.create("", 10, 60, None, "{}").unwrap_err();
        assert!(matches!(err, EngineError::ValidationError(_)));
    }

    #[test]
    fn create_rejects_past_expiry() {
        let store = store();
        let registry = ApiKeyRegistry::new(&store);
        let err = registry
            .create("svc-b", 10, 60, Some("2000-01-01 00:00:00"), "{}")
            .unwrap_err();
        assert!(matches!(err, EngineError::ValidationError(_)));
    }

    #[test]
    fn plaintext_never_shares_store_rows() {
        let store = store();
        let registry = ApiKeyRegistry::new(&store);
        let mut plaintexts = Vec::new();
        for i in 0..10 {
            let (_, plain) = registry.create(&format!("svc-{i}"), 10, 60, None, "{}").unwrap();
            plaintexts.push(plain);
        }
        for key in registry.list(100, 0).unwrap() {
            for plain in &plaintexts {
                assert_ne!(key.key_fingerprint, *plain);
                assert!(!key.key_fingerprint.starts_with(PLAINTEXT_PREFIX));
            }
        }
    }
}
