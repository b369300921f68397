/// Effective configuration for a single counter check (spec.md §4.1).
#[derive(Debug, Clone, Copy)]
pub struct CounterConfig {
    pub limit: u32,
    pub window_seconds: u64,
    pub sliding: bool,
}

/// Result of `CounterStore::check`.
#[derive(Debug, Clone, Copy)]
pub struct CounterResult {
    pub allowed: bool,
    pub remaining: u32,
    pub reset_at: i64,
    pub limit: u32,
    pub window_seconds: u64,
}
