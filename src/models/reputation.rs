use serde::{Deserialize, Serialize};

/// Discriminator for which layer of the pipeline produced a classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReputationSource {
    Cache,
    Heuristic,
    Provider,
    Manual,
    TorList,
}

impl ReputationSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReputationSource::Cache => "cache",
            ReputationSource::Heuristic => "heuristic",
            ReputationSource::Provider => "provider",
            ReputationSource::Manual => "manual",
            ReputationSource::TorList => "tor_list",
        }
    }
}

impl std::str::FromStr for ReputationSource {
    type Err = ();
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "cache" => ReputationSource::Cache,
            "heuristic" => ReputationSource::Heuristic,
            "provider" => ReputationSource::Provider,
            "manual" => ReputationSource::Manual,
            "tor_list" => ReputationSource::TorList,
            _ => return Err(()),
        })
    }
}

/// The collapsed five-way (plus unknown) reputation tag. Exactly one of
/// these is true in a given `Classification`; the rest are carried as
/// independent bits on the persisted record for forward-compat (spec §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassificationType {
    Tor,
    Vpn,
    Proxy,
    Hosting,
    Residential,
    Unknown,
}

/// A persisted reputation record, keyed by address.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReputationRecord {
    pub address: String,
    pub is_proxy: bool,
    pub is_vpn: bool,
    pub is_tor: bool,
    pub is_hosting: bool,
    pub is_residential: bool,
    pub confidence: u8,
    pub reason: String,
    pub source: ReputationSource,
    pub asn: Option<u32>,
    pub asn_org: Option<String>,
    pub country: Option<String>,
    pub checked_at: String,
    pub expires_at: String,
}

/// The output of `ReputationEngine::classify` — mirrors `ReputationRecord`
/// but always carries exactly one true classification-type bit via
/// `classification`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Classification {
    pub address: String,
    pub classification: ClassificationType,
    pub confidence: u8,
    pub reason: String,
    pub source: ReputationSource,
    pub asn: Option<u32>,
    pub asn_org: Option<String>,
    pub country: Option<String>,
}

impl Classification {
    pub fn is_proxy(&self) -> bool {
        matches!(self.classification, ClassificationType::Proxy)
    }
    pub fn is_vpn(&self) -> bool {
        matches!(self.classification, ClassificationType::Vpn)
    }
    pub fn is_tor(&self) -> bool {
        matches!(self.classification, ClassificationType::Tor)
    }
    pub fn is_hosting(&self) -> bool {
        matches!(self.classification, ClassificationType::Hosting)
    }
    pub fn is_residential(&self) -> bool {
        matches!(self.classification, ClassificationType::Residential)
    }

    pub fn to_record(&self, checked_at: String, expires_at: String) -> ReputationRecord {
        ReputationRecord {
            address: self.address.clone(),
            is_proxy: self.is_proxy(),
            is_vpn: self.is_vpn(),
            is_tor: self.is_tor(),
            is_hosting: self.is_hosting(),
            is_residential: self.is_residential(),
            confidence: self.confidence,
            reason: self.reason.clone(),
            source: self.source,
            asn: self.asn,
            asn_org: self.asn_org.clone(),
            country: self.country.clone(),
            checked_at,
            expires_at,
        }
    }
}

impl From<&ReputationRecord> for Classification {
    fn from(r: &ReputationRecord) -> Self {
        let classification = if r.is_tor {
            ClassificationType::Tor
        } else if r.is_vpn {
            ClassificationType::Vpn
        } else if r.is_proxy {
            ClassificationType::Proxy
        } else if r.is_hosting {
            ClassificationType::Hosting
        } else if r.is_residential {
            ClassificationType::Residential
        } else {
            ClassificationType::Unknown
        };
        Classification {
            address: r.address.clone(),
            classification,
            confidence: r.confidence,
            reason: r.reason.clone(),
            source: r.source,
            asn: r.asn,
            asn_org: r.asn_org.clone(),
            country: r.country.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AsnRecord {
    pub asn: u32,
    pub org_name: String,
    pub is_hosting: bool,
    pub is_vpn: bool,
    pub country: Option<String>,
    pub expires_at: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ManualBlockKind {
    Address,
    Asn,
    Cidr,
}

impl ManualBlockKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ManualBlockKind::Address => "address",
            ManualBlockKind::Asn => "asn",
            ManualBlockKind::Cidr => "cidr",
        }
    }
}

impl std::str::FromStr for ManualBlockKind {
    type Err = ();
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "address" => ManualBlockKind::Address,
            "asn" => ManualBlockKind::Asn,
            "cidr" => ManualBlockKind::Cidr,
            _ => return Err(()),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManualBlockEntry {
    pub id: i64,
    pub identifier: String,
    pub kind: ManualBlockKind,
    pub reason: String,
    pub blocked_by: String,
    pub blocked_at: String,
    pub expires_at: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TorExitEntry {
    pub address: String,
    pub first_seen: String,
    pub last_seen: String,
    pub is_exit: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderCacheEntry {
    pub address: String,
    pub provider_name: String,
    pub raw_response: String,
    pub expires_at: String,
}

/// Normalized result from a `ReputationProvider::check` call (spec §4.8).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderResult {
    pub address: String,
    pub is_proxy: bool,
    pub is_vpn: bool,
    pub is_tor: bool,
    pub is_hosting: bool,
    pub confidence: u8,
    pub asn: Option<u32>,
    pub asn_org: Option<String>,
    pub country: Option<String>,
    pub raw: String,
}

impl ProviderResult {
    pub fn has_positive_indicator(&self) -> bool {
        self.is_proxy || self.is_vpn || self.is_tor || self.is_hosting
    }

    /// Tor wins over VPN over Proxy over Hosting (spec §4.9 step 6).
    pub fn dominant_type(&self) -> ClassificationType {
        if self.is_tor {
            ClassificationType::Tor
        } else if self.is_vpn {
            ClassificationType::Vpn
        } else if self.is_proxy {
            ClassificationType::Proxy
        } else if self.is_hosting {
            ClassificationType::Hosting
        } else {
            ClassificationType::Unknown
        }
    }
}
