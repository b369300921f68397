use std::fmt;

/// The key under which rate limits, bans, and request-log rows are tracked.
///
/// The admission pipeline collapses an envelope to exactly one of these:
/// the resolved API-key id if a bearer token was supplied and validated,
/// otherwise the client network address.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Identifier {
    NetworkAddress(String),
    ApiKeyId(String),
}

impl Identifier {
    pub fn value(&self) -> &str {
        match self {
            Identifier::NetworkAddress(v) => v,
            Identifier::ApiKeyId(v) => v,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Identifier::NetworkAddress(_) => "network-address",
            Identifier::ApiKeyId(_) => "api-key-id",
        }
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind(), self.value())
    }
}
