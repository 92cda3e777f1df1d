use std::net::Ipv4Addr;

/// The default multicast address this workspace falls back to when a
/// configured address doesn't clear [`is_whitelisted`].
pub const DEFAULT_MULTICAST_IP: Ipv4Addr = Ipv4Addr::new(224, 0, 0, 3);

/// Checks a candidate multicast IPv4 address against the curated set of
/// addresses this workspace is willing to join.
///
/// Transcribed from the original implementation's `_mcIPAdd` table (itself a
/// curated subset of IANA's "Local Network Control Block" and a handful of
/// AD-HOC block ranges, see
/// <https://www.iana.org/assignments/multicast-addresses/multicast-addresses.xhtml>).
/// Every address here has octets 224.0.*; nothing outside 224.0.0.0/8
/// clears this check.
pub fn is_whitelisted(ip: Ipv4Addr) -> bool {
    let [o1, o2, o3, o4] = ip.octets();
    if o1 != 224 || o2 != 0 {
        return false;
    }
    match o3 {
        0 => matches!(o4, 3 | 26 | 255) || (69..=100).contains(&o4) || (122..=149).contains(&o4) || (151..=250).contains(&o4),
        2 => o4 == 0 || (18..=63).contains(&o4),
        6 => (145..=191).contains(&o4),
        12 => (136..=255).contains(&o4),
        17 => (128..=255).contains(&o4),
        20 => (208..=255).contains(&o4),
        21 => (128..=255).contains(&o4),
        23 => (182..=191).contains(&o4),
        245 => true,
        _ => false,
    }
}

/// Validates `ip`, falling back to [`DEFAULT_MULTICAST_IP`] with a warning
/// when it isn't whitelisted. `MCCACHE_MULTICAST_IP` is the one piece of
/// config this workspace refuses to take on faith (spec.md §4.2, §6).
pub fn validate_or_fallback(ip: Ipv4Addr) -> Ipv4Addr {
    if is_whitelisted(ip) {
        ip
    } else {
        tracing::warn!(
            requested = %ip,
            fallback = %DEFAULT_MULTICAST_IP,
            "multicast address is not in the curated whitelist, falling back"
        );
        DEFAULT_MULTICAST_IP
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_the_documented_examples() {
        for addr in [
            "224.0.0.3",
            "224.0.0.26",
            "224.0.0.255",
            "224.0.0.80",
            "224.0.0.130",
            "224.0.0.200",
            "224.0.2.0",
            "224.0.2.40",
            "224.0.6.150",
            "224.0.12.200",
            "224.0.17.200",
            "224.0.20.220",
            "224.0.21.200",
            "224.0.23.185",
            "224.0.245.7",
        ] {
            let ip: Ipv4Addr = addr.parse().unwrap();
            assert!(is_whitelisted(ip), "{addr} should be whitelisted");
        }
    }

    #[test]
    fn rejects_addresses_outside_the_curated_ranges() {
        for addr in ["224.0.0.4", "224.0.2.64", "224.0.6.144", "239.255.255.250", "192.168.1.1"] {
            let ip: Ipv4Addr = addr.parse().unwrap();
            assert!(!is_whitelisted(ip), "{addr} should not be whitelisted");
        }
    }

    #[test]
    fn non_whitelisted_address_falls_back_to_default() {
        let bogus: Ipv4Addr = "239.1.1.1".parse().unwrap();
        assert_eq!(validate_or_fallback(bogus), DEFAULT_MULTICAST_IP);
    }

    #[test]
    fn whitelisted_address_passes_through() {
        let addr: Ipv4Addr = "224.0.12.200".parse().unwrap();
        assert_eq!(validate_or_fallback(addr), addr);
    }
}
