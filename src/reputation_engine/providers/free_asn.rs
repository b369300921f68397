use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use crate::models::reputation::ProviderResult;

use super::ReputationProvider;

/// ip-api.com's free-tier response shape. `as` is `"AS<digits> <org>"`.
#[derive(Debug, Deserialize)]
struct FreeAsnResponse {
    status: String,
    #[serde(rename = "as", default)]
    asn_field: Option<String>,
    #[serde(default)]
    org: Option<String>,
    #[serde(default)]
    isp: Option<String>,
    #[serde(rename = "countryCode", default)]
    country: Option<String>,
}

fn parse_asn(field: &str) -> Option<u32> {
    field.strip_prefix("AS")?.split_whitespace().next()?.parse().ok()
}

/// Free ASN-only lookup (spec.md §4.8). Always enabled — the ASN
/// heuristic layer (C9 step 5) depends on it regardless of which paid
/// providers are configured.
pub struct FreeAsnProvider {
    client: reqwest::Client,
}

impl FreeAsnProvider {
    pub fn new(timeout_ms: u64) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(timeout_ms))
            .build()
            .expect("failed to build free-asn HTTP client");
        Self { client }
    }
}

#[async_trait]
impl ReputationProvider for FreeAsnProvider {
    fn name(&self) -> &'static str {
        "free_asn"
    }

    fn priority(&self) -> u32 {
        1
    }

    fn is_enabled(&self) -> bool {
        true
    }

    async fn check(&self, address: &str) -> Option<ProviderResult> {
        let url = format!("http://ip-api.com/json/{address}?fields=status,as,org,isp,countryCode");
        let resp = self.client.get(&url).send().await.ok()?;
        if !resp.status().is_success() {
            return None;
        }
        let body: FreeAsnResponse = resp.json().await.ok()?;
        if body.status != "success" {
            return None;
        }
        let asn = body.asn_field.as_deref().and_then(parse_asn);
        let asn_org = body.org.or(body.isp);

        Some(ProviderResult {
            address: address.to_string(),
            is_proxy: false,
            is_vpn: false,
            is_tor: false,
            is_hosting: false,
            confidence: 75,
            asn,
            asn_org,
            country: body.country,
            raw: body.asn_field.unwrap_or_default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_asn_field() {
        assert_eq!(parse_asn("AS16509 Amazon.com, Inc."), Some(16509));
        assert_eq!(parse_asn("garbage"), None);
    }
}
