use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use crate::models::reputation::ProviderResult;

use super::ReputationProvider;

#[derive(Debug, Deserialize)]
struct ScoreResponse {
    #[serde(rename = "usageType", default)]
    usage_type: String,
    #[serde(rename = "abuseConfidenceScore", default)]
    abuse_confidence_score: u8,
    #[serde(default)]
    asn: Option<u32>,
    #[serde(rename = "isp", default)]
    asn_org: Option<String>,
    #[serde(rename = "countryCode", default)]
    country: Option<String>,
}

fn usage_type_hosting(usage_type: &str) -> bool {
    let t = usage_type.to_ascii_lowercase();
    t.contains("hosting") || t.contains("data center") || t.contains("datacenter")
}

fn usage_type_vpn_or_proxy(usage_type: &str) -> (bool, bool) {
    let t = usage_type.to_ascii_lowercase();
    (t.contains("vpn"), t.contains("proxy") || t.contains("tor exit"))
}

/// Abuse-score reputation provider (spec.md §4.8). Requires an API key;
/// disabled when none is configured.
pub struct ReputationScoreProvider {
    client: reqwest::Client,
    api_key: Option<String>,
}

impl ReputationScoreProvider {
    pub fn new(timeout_ms: u64, api_key: Option<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(timeout_ms))
            .build()
            .expect("failed to build reputation-score HTTP client");
        Self { client, api_key }
    }
}

#[async_trait]
impl ReputationProvider for ReputationScoreProvider {
    fn name(&self) -> &'static str {
        "reputation_score"
    }

    fn priority(&self) -> u32 {
        8
    }

    fn is_enabled(&self) -> bool {
        self.api_key.is_some()
    }

    async fn check(&self, address: &str) -> Option<ProviderResult> {
        let key = self.api_key.as_ref()?;
        let url = "https://reputation.example.com/api/v2/check";
        let resp = self
            .client
            .get(url)
            .query(&[("ipAddress", address)])
            .header("Key", key)
            .send()
            .await
            .ok()?;
        if !resp.status().is_success() {
            return None;
        }
        let raw = resp.text().await.ok()?;
        let body: ScoreResponse = serde_json::from_str(&raw).ok()?;

        let is_hosting = usage_type_hosting(&body.usage_type);
        let (is_vpn, is_proxy) = usage_type_vpn_or_proxy(&body.usage_type);
        let confidence = (body.abuse_confidence_score as u32 + 50).min(100) as u8;

        Some(ProviderResult {
            address: address.to_string(),
            is_proxy,
            is_vpn,
            is_tor: false,
            is_hosting,
            confidence,
            asn: body.asn,
            asn_org: body.asn_org,
            country: body.country,
            raw,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn confidence_caps_at_100() {
        let score: u32 = 90;
        assert_eq!((score + 50).min(100), 100);
    }

    #[test]
    fn usage_type_detects_hosting() {
        assert!(usage_type_hosting("Data Center/Web Hosting/Transit"));
        assert!(!usage_type_hosting("Commercial"));
    }
}
