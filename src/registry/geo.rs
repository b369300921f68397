use crate::error::{EngineError, EngineResult};
use crate::store::Store;

/// Thin validation wrapper over `store::geo` (C5, spec.md §4.5).
pub struct GeoBlockRegistry<'a> {
    store: &'a Store,
}

fn validate_code(code: &str) -> EngineResult<()> {
    if code.chars().count() != 2 || !code.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(EngineError::ValidationError(
            "country code must be a 2-letter ISO-3166-1 alpha-2 code".into(),
        ));
    }
    Ok(())
}

impl<'a> GeoBlockRegistry<'a> {
    pub fn new(store: &'a Store) -> Self {
        Self { store }
    }

    pub fn is_enabled(&self) -> EngineResult<bool> {
        Ok(self.store.geo_is_enabled()?)
    }

    pub fn set_enabled(&self, enabled: bool) -> EngineResult<()> {
        Ok(self.store.geo_set_enabled(enabled)?)
    }

    pub fn is_blocked(&self, code: &str) -> EngineResult<bool> {
        Ok(self.store.geo_is_blocked(code)?)
    }

    pub fn add(&self, code: &str, name: Option<&str>) -> EngineResult<()> {
        validate_code(code)?;
        Ok(self.store.geo_add(code, name)?)
    }

    pub fn remove(&self, code: &str) -> EngineResult<()> {
        Ok(self.store.geo_remove(code)?)
    }

    pub fn list(&self) -> EngineResult<Vec<(String, Option<String>)>> {
        Ok(self.store.geo_list()?)
    }

    pub fn replace_all(&self, entries: &[(String, Option<String>)]) -> EngineResult<()> {
        for (code, _) in entries {
            validate_code(code)?;
        }
        Ok(self.store.geo_replace_all(entries)?)
    }
}
