use crate::error::{EngineError, EngineResult};
use crate::models::ban::Ban;
use crate::store::Store;

/// Thin admin wrapper over `store::bans` (C2, spec.md §4.2). The hot-path
/// ban check (`is_banned`) and the abuse detector's auto-ban creation go
/// straight through `Store` — this registry exists for the admin CRUD
/// surface only (create/list/get/remove, §6).
pub struct BanRegistry<'a> {
    store: &'a Store,
}

impl<'a> BanRegistry<'a> {
    pub fn new(store: &'a Store) -> Self {
        Self { store }
    }

    pub fn create(&self, identifier: &str, reason: &str, duration_seconds: Option<i64>) -> EngineResult<Ban> {
        if identifier.is_empty() {
            return Err(EngineError::ValidationError("identifier must not be empty".into()));
        }
        if reason.is_empty() {
            return Err(EngineError::ValidationError("reason must not be empty".into()));
        }
        Ok(self.store.create_ban(identifier, reason, duration_seconds, "admin")?)
    }

    pub fn get(&self, identifier: &str) -> EngineResult<Ban> {
        self.store
            .is_banned(identifier)?
            .ok_or_else(|| EngineError::NotFound(format!("active ban for {identifier}")))
    }

    pub fn list(&self, limit: i64, offset: i64) -> EngineResult<Vec<Ban>> {
        Ok(self.store.list_active_bans(limit, offset)?)
    }

    pub fn remove(&self, id: i64) -> EngineResult<()> {
        Ok(self.store.remove_ban(id)?)
    }

    pub fn remove_all(&self, identifier: &str) -> EngineResult<usize> {
        Ok(self.store.remove_all_bans(identifier)?)
    }
}
