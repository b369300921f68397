use std::sync::Arc;

use chrono::{Duration as ChronoDuration, Utc};
use tracing::{debug, warn};

use crate::models::reputation::{AsnRecord, Classification, ClassificationType, ManualBlockKind, ReputationSource};
use crate::store::Store;

use super::asn::{AsnClassifier, AsnType};
use super::cidr::ipv4_in_cidr;
use super::providers::ReputationProvider;

/// `Classify(address, bypass_cache) -> Classification` (C9, spec.md §4.9):
/// cache -> manual block (address, then CIDR) -> Tor -> ASN heuristic ->
/// providers -> fallback. Write-through caches the result with TTL
/// `ip_ttl_seconds`.
pub struct ReputationEngine {
    store: Arc<Store>,
    providers: Vec<Box<dyn ReputationProvider>>,
    asn_classifier: AsnClassifier,
    ip_ttl_seconds: i64,
    asn_ttl_seconds: i64,
    tor_detection_enabled: bool,
}

impl ReputationEngine {
    pub fn new(
        store: Arc<Store>,
        providers: Vec<Box<dyn ReputationProvider>>,
        ip_ttl_seconds: i64,
        asn_ttl_seconds: i64,
        tor_detection_enabled: bool,
    ) -> Self {
        Self {
            store,
            providers,
            asn_classifier: AsnClassifier::new(),
            ip_ttl_seconds,
            asn_ttl_seconds,
            tor_detection_enabled,
        }
    }

    pub async fn classify(&self, address: &str, bypass_cache: bool) -> Classification {
        let _ = self.store.increment_stat("reputation_check", 1);

        if !bypass_cache {
            if let Ok(Some(record)) = self.store.get_reputation(address) {
                let _ = self.store.increment_stat("reputation_cache_hit", 1);
                let mut classification = Classification::from(&record);
                classification.source = ReputationSource::Cache;
                return classification;
            }
        }

        let classification = self.classify_uncached(address).await;
        self.write_through(address, &classification);
        self.log_decision(&classification);
        classification
    }

    async fn classify_uncached(&self, address: &str) -> Classification {
        if let Ok(Some(block)) = self.store.get_manual_block(address, ManualBlockKind::Address) {
            return Classification {
                address: address.to_string(),
                classification: ClassificationType::Proxy,
                confidence: 100,
                reason: format!("Manually blocked: {}", block.reason),
                source: ReputationSource::Manual,
                asn: None,
                asn_org: None,
                country: None,
            };
        }

        if let Ok(cidr_blocks) = self.store.active_cidr_blocks() {
            for block in cidr_blocks {
                if ipv4_in_cidr(address, &block.identifier) {
                    return Classification {
                        address: address.to_string(),
                        classification: ClassificationType::Proxy,
                        confidence: 100,
                        reason: format!("Manually blocked: {}", block.reason),
                        source: ReputationSource::Manual,
                        asn: None,
                        asn_org: None,
                        country: None,
                    };
                }
            }
        }

        if self.tor_detection_enabled {
            if let Ok(true) = self.store.is_tor_exit(address) {
                return Classification {
                    address: address.to_string(),
                    classification: ClassificationType::Tor,
                    confidence: 100,
                    reason: "Address present in Tor bulk exit list".to_string(),
                    source: ReputationSource::TorList,
                    asn: None,
                    asn_org: None,
                    country: None,
                };
            }
        }

        if let Some(classification) = self.classify_by_asn(address).await {
            return classification;
        }

        if let Some(classification) = self.classify_by_providers(address).await {
            return classification;
        }

        Classification {
            address: address.to_string(),
            classification: ClassificationType::Unknown,
            confidence: 30,
            reason: "No positive indicator from any source".to_string(),
            source: ReputationSource::Heuristic,
            asn: None,
            asn_org: None,
            country: None,
        }
    }

    async fn classify_by_asn(&self, address: &str) -> Option<Classification> {
        let free_asn = self.providers.iter().find(|p| p.name() == "free_asn")?;
        let result = free_asn.check(address).await?;
        let asn = result.asn?;

        if let Ok(Some(block)) = self.store.get_manual_block(&asn.to_string(), ManualBlockKind::Asn) {
            return Some(Classification {
                address: address.to_string(),
                classification: ClassificationType::Proxy,
                confidence: 100,
                reason: format!("Manually blocked ASN {asn}: {}", block.reason),
                source: ReputationSource::Manual,
                asn: Some(asn),
                asn_org: result.asn_org.clone(),
                country: result.country.clone(),
            });
        }

        let asn_type = self.asn_classifier.classify(asn);
        self.cache_asn(asn, &result.asn_org, asn_type, result.country.clone());

        let classification = match asn_type {
            AsnType::Hosting => Some((ClassificationType::Hosting, 85, "Known hosting-provider ASN".to_string())),
            AsnType::Vpn => Some((ClassificationType::Vpn, 85, "Known VPN-provider ASN".to_string())),
            AsnType::Unknown => Some((
                ClassificationType::Residential,
                60,
                "No hosting/VPN ASN match; tentative residential".to_string(),
            )),
        }?;

        Some(Classification {
            address: address.to_string(),
            classification: classification.0,
            confidence: classification.1,
            reason: classification.2,
            source: ReputationSource::Heuristic,
            asn: Some(asn),
            asn_org: result.asn_org,
            country: result.country,
        })
    }

    fn cache_asn(&self, asn: u32, org_name: &Option<String>, asn_type: AsnType, country: Option<String>) {
        let expires_at = (Utc::now() + ChronoDuration::seconds(self.asn_ttl_seconds))
            .format(crate::store::TS_FORMAT)
            .to_string();
        let rec = AsnRecord {
            asn,
            org_name: org_name.clone().unwrap_or_default(),
            is_hosting: matches!(asn_type, AsnType::Hosting),
            is_vpn: matches!(asn_type, AsnType::Vpn),
            country,
            expires_at,
        };
        if let Err(e) = self.store.upsert_asn(&rec) {
            warn!(error = %e, "failed to cache asn record");
        }
    }

    async fn classify_by_providers(&self, address: &str) -> Option<Classification> {
        for provider in &self.providers {
            if !provider.is_enabled() {
                continue;
            }

            let cached = self.store.get_provider_cached(address, provider.name()).ok().flatten();
            let result = if let Some(cached) = cached {
                match serde_json::from_str(&cached.raw_response) {
                    Ok(r) => r,
                    Err(_) => provider.check(address).await?,
                }
            } else {
                let result = provider.check(address).await?;
                if let Ok(raw) = serde_json::to_string(&result) {
                    let expires_at = (Utc::now() + ChronoDuration::seconds(self.ip_ttl_seconds))
                        .format(crate::store::TS_FORMAT)
                        .to_string();
                    let _ = self.store.set_provider_cached(address, provider.name(), &raw, &expires_at);
                }
                result
            };

            if result.has_positive_indicator() {
                let classification = result.dominant_type();
                return Some(Classification {
                    address: address.to_string(),
                    classification,
                    confidence: result.confidence,
                    reason: format!("Flagged by provider '{}'", provider.name()),
                    source: ReputationSource::Provider,
                    asn: result.asn,
                    asn_org: result.asn_org,
                    country: result.country,
                });
            }
        }
        None
    }

    fn write_through(&self, address: &str, classification: &Classification) {
        let checked_at = crate::store::now_str();
        let expires_at = (Utc::now() + ChronoDuration::seconds(self.ip_ttl_seconds))
            .format(crate::store::TS_FORMAT)
            .to_string();
        let record = classification.to_record(checked_at, expires_at);
        if let Err(e) = self.store.upsert_reputation(&record) {
            warn!(error = %e, "failed to write through reputation cache");
        }
        let stat = format!("classification_{}", classification_stat_suffix(classification));
        let _ = self.store.increment_stat(&stat, 1);
    }

    fn log_decision(&self, classification: &Classification) {
        let suspicious = !matches!(classification.classification, ClassificationType::Residential | ClassificationType::Unknown);
        if suspicious {
            warn!(
                address = %classification.address,
                classification = classification_stat_suffix(classification),
                confidence = classification.confidence,
                source = classification.source.as_str(),
                "reputation classification"
            );
        } else {
            debug!(
                address = %classification.address,
                classification = classification_stat_suffix(classification),
                confidence = classification.confidence,
                source = classification.source.as_str(),
                "reputation classification"
            );
        }
    }
}

fn classification_stat_suffix(c: &Classification) -> &'static str {
    match c.classification {
        ClassificationType::Tor => "tor",
        ClassificationType::Vpn => "vpn",
        ClassificationType::Proxy => "proxy",
        ClassificationType::Hosting => "hosting",
        ClassificationType::Residential => "residential",
        ClassificationType::Unknown => "unknown",
    }
}
