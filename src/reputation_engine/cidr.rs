use std::net::IpAddr;
use std::str::FromStr;

use ipnet::IpNet;

/// Whether `address` (a literal IPv4 dotted-quad) falls inside `cidr`
/// (`a.b.c.d/N`, 0 <= N <= 32). Any parse failure is "not a member"
/// (spec.md §4.9).
pub fn ipv4_in_cidr(address: &str, cidr: &str) -> bool {
    let addr = match IpAddr::from_str(address) {
        Ok(a) => a,
        Err(_) => return false,
    };
    match cidr.parse::<IpNet>() {
        Ok(net) => net.contains(&addr),
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_address_is_member_of_slash_32() {
        assert!(ipv4_in_cidr("203.0.113.7", "203.0.113.7/32"));
        assert!(!ipv4_in_cidr("203.0.113.8", "203.0.113.7/32"));
    }

    #[test]
    fn everything_is_member_of_slash_0() {
        assert!(ipv4_in_cidr("1.2.3.4", "0.0.0.0/0"));
        assert!(ipv4_in_cidr("255.255.255.255", "0.0.0.0/0"));
    }

    #[test]
    fn slash_24_matches_any_last_octet() {
        for last in [0u8, 1, 128, 255] {
            let addr = format!("203.0.113.{last}");
            assert!(ipv4_in_cidr(&addr, "203.0.113.0/24"));
        }
        assert!(!ipv4_in_cidr("203.0.114.1", "203.0.113.0/24"));
    }

    #[test]
    fn invalid_input_never_matches() {
        assert!(!ipv4_in_cidr("not-an-ip", "203.0.113.0/24"));
        assert!(!ipv4_in_cidr("203.0.113.7", "203.0.113.0/33"));
        assert!(!ipv4_in_cidr("203.0.113.7", "garbage"));
    }
}
