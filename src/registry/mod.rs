pub mod api_keys;
pub mod bans;
pub mod geo;
pub mod request_log;
