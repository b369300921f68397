pub mod free_asn;
pub mod privacy;
pub mod reputation_score;

use async_trait::async_trait;

use crate::models::reputation::ProviderResult;

/// Capability set every reputation provider adapter implements
/// (spec.md §4.8). Lower `priority()` is consulted earlier.
#[async_trait]
pub trait ReputationProvider: Send + Sync {
    fn name(&self) -> &'static str;
    fn priority(&self) -> u32;
    fn is_enabled(&self) -> bool;

    /// Swallows its own errors — a misbehaving provider returns `None`
    /// rather than propagating a failure into the pipeline (spec.md §7).
    async fn check(&self, address: &str) -> Option<ProviderResult>;
}

/// Builds the static, priority-sorted provider list (spec.md §9's
/// redesign note: no dynamic runtime registry). Disabled adapters stay in
/// the list but are filtered by `is_enabled()` at call time.
pub fn build_registry(
    timeout_ms: u64,
    privacy_api_token: Option<String>,
    reputation_api_key: Option<String>,
) -> Vec<Box<dyn ReputationProvider>> {
    let mut providers: Vec<Box<dyn ReputationProvider>> = vec![
        Box::new(free_asn::FreeAsnProvider::new(timeout_ms)),
        Box::new(privacy::PrivacyProvider::new(timeout_ms, privacy_api_token)),
        Box::new(reputation_score::ReputationScoreProvider::new(timeout_ms, reputation_api_key)),
    ];
    providers.sort_by_key(|p| p.priority());
    providers
}
