use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use crate::models::reputation::ProviderResult;

use super::ReputationProvider;

#[derive(Debug, Deserialize)]
struct PrivacyFlags {
    #[serde(default)]
    vpn: bool,
    #[serde(default)]
    proxy: bool,
    #[serde(default)]
    tor: bool,
    #[serde(default)]
    relay: bool,
    #[serde(default)]
    hosting: bool,
}

#[derive(Debug, Deserialize)]
struct PrivacyResponse {
    privacy: PrivacyFlags,
    #[serde(default)]
    asn: Option<u32>,
    #[serde(rename = "asn_name", default)]
    asn_org: Option<String>,
    #[serde(default)]
    country: Option<String>,
}

/// Privacy-detection provider (spec.md §4.8). Requires an API token;
/// disabled when none is configured.
pub struct PrivacyProvider {
    client: reqwest::Client,
    api_token: Option<String>,
}

impl PrivacyProvider {
    pub fn new(timeout_ms: u64, api_token: Option<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(timeout_ms))
            .build()
            .expect("failed to build privacy-provider HTTP client");
        Self { client, api_token }
    }
}

#[async_trait]
impl ReputationProvider for PrivacyProvider {
    fn name(&self) -> &'static str {
        "privacy"
    }

    fn priority(&self) -> u32 {
        5
    }

    fn is_enabled(&self) -> bool {
        self.api_token.is_some()
    }

    async fn check(&self, address: &str) -> Option<ProviderResult> {
        let token = self.api_token.as_ref()?;
        let url = format!("https://privacy.example.com/api/v1/{address}");
        let resp = self
            .client
            .get(&url)
            .header("Authorization", format!("Bearer {token}"))
            .send()
            .await
            .ok()?;
        if !resp.status().is_success() {
            return None;
        }
        let raw = resp.text().await.ok()?;
        let body: PrivacyResponse = serde_json::from_str(&raw).ok()?;

        Some(ProviderResult {
            address: address.to_string(),
            is_proxy: body.privacy.proxy || body.privacy.relay,
            is_vpn: body.privacy.vpn,
            is_tor: body.privacy.tor,
            is_hosting: body.privacy.hosting,
            confidence: 90,
            asn: body.asn,
            asn_org: body.asn_org,
            country: body.country,
            raw,
        })
    }
}
