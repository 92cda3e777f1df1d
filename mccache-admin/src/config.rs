use std::env;
use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;
use std::time::Duration;

use mccache_transport::{validate_or_fallback, DEFAULT_MULTICAST_IP};
use tracing::warn;

use crate::posture::CoherencePosture;

/// Log line format, `MCCACHE_LOG_FORMAT` (spec.md §6). The original exposes
/// this as a free-form template string fed to `logging.Formatter`; this
/// rendition narrows it to the two shapes `tracing_subscriber::fmt` actually
/// supports out of the box — compact text for a terminal, JSON for anything
/// that forwards logs onward.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum LogFormat {
    Text,
    Json,
}

impl LogFormat {
    fn parse(raw: &str) -> Option<Self> {
        match raw.to_ascii_lowercase().as_str() {
            "json" => Some(LogFormat::Json),
            "text" | "plain" => Some(LogFormat::Text),
            _ => None,
        }
    }
}

/// Default housekeeper cadence slots, `MCCACHE_SLOTS` (spec.md §4.6, §6):
/// very frequent, frequent, normal, slow, very slow.
pub const DEFAULT_SLOTS_SECS: [u64; 5] = [5, 8, 13, 21, 55];

/// Parsed `MCCACHE_*` configuration (spec.md §6). Built once at process
/// start by [`Config::from_env`] and handed to `mccache-core`'s coordinator;
/// nothing in this workspace mutates it afterwards.
#[derive(Clone, Debug)]
pub struct Config {
    pub log_format: LogFormat,
    pub debug_log: Option<PathBuf>,
    pub house_keeping_slots: Vec<Duration>,
    pub mtu: usize,
    pub ttl: Duration,
    pub posture: CoherencePosture,
    pub max_size: usize,
    pub mc_hops: u32,
    pub mc_group: IpAddr,
    pub mc_port: u16,
}

impl Default for Config {
    fn default() -> Self {
        let posture = CoherencePosture::default();
        Config {
            log_format: LogFormat::Text,
            debug_log: None,
            house_keeping_slots: DEFAULT_SLOTS_SECS.iter().copied().map(Duration::from_secs).collect(),
            mtu: 1472,
            ttl: Duration::from_secs(900),
            posture,
            max_size: posture.default_max_size(),
            mc_hops: 1,
            mc_group: IpAddr::V4(DEFAULT_MULTICAST_IP),
            mc_port: 4000,
        }
    }
}

impl Config {
    /// Reads the `MCCACHE_*` environment variables, falling back to spec
    /// defaults for anything absent or malformed. Malformed values are a
    /// **configuration error** (spec.md §7 kind 1): logged at warning,
    /// defaults applied, startup continues — nothing here is fatal.
    pub fn from_env() -> Self {
        let mut config = Config::default();

        if let Ok(raw) = env::var("MCCACHE_LOG_FORMAT") {
            match LogFormat::parse(&raw) {
                Some(fmt) => config.log_format = fmt,
                None => warn!(value = %raw, "MCCACHE_LOG_FORMAT not recognised, keeping default"),
            }
        }

        if let Ok(raw) = env::var("MCCACHE_DEBUG_FILE") {
            config.debug_log = Some(PathBuf::from(raw));
        }

        if let Ok(raw) = env::var("MCCACHE_SLOTS") {
            match parse_slots(&raw) {
                Some(slots) => config.house_keeping_slots = slots,
                None => warn!(value = %raw, "MCCACHE_SLOTS not a comma-separated list of seconds, keeping default"),
            }
        }

        if let Ok(raw) = env::var("MCCACHE_MTU") {
            match raw.parse() {
                Ok(mtu) => config.mtu = mtu,
                Err(_) => warn!(value = %raw, "MCCACHE_MTU is not an integer, keeping default"),
            }
        }

        if let Ok(raw) = env::var("MCCACHE_TTL") {
            match raw.parse() {
                Ok(secs) => config.ttl = Duration::from_secs(secs),
                Err(_) => warn!(value = %raw, "MCCACHE_TTL is not an integer, keeping default"),
            }
        }

        // MCCACHE_MAXSIZE is read before MCCACHE_LEVEL applies the
        // posture-implied default, so an explicit override always wins
        // regardless of env var ordering (spec.md §6).
        let maxsize_override: Option<usize> = env::var("MCCACHE_MAXSIZE").ok().and_then(|raw| match raw.parse() {
            Ok(size) => Some(size),
            Err(_) => {
                warn!(value = %raw, "MCCACHE_MAXSIZE is not an integer, keeping default");
                None
            }
        });

        if let Ok(raw) = env::var("MCCACHE_LEVEL") {
            match raw.parse::<i32>().ok().and_then(CoherencePosture::from_level) {
                Some(posture) => {
                    config.posture = posture;
                    config.max_size = posture.default_max_size();
                }
                None => warn!(value = %raw, "MCCACHE_LEVEL is not one of 3/5/7, keeping default posture"),
            }
        }

        if let Some(size) = maxsize_override {
            config.max_size = size;
        }

        if let Ok(raw) = env::var("MCCACHE_MULTICAST_HOPS") {
            match raw.parse() {
                Ok(hops) => config.mc_hops = hops,
                Err(_) => warn!(value = %raw, "MCCACHE_MULTICAST_HOPS is not an integer, keeping default"),
            }
        }

        if let Ok(raw) = env::var("MCCACHE_MULTICAST_IP") {
            apply_multicast_ip(&mut config, &raw);
        }

        config
    }
}

fn parse_slots(raw: &str) -> Option<Vec<Duration>> {
    let mut slots = Vec::new();
    for part in raw.split(',') {
        let secs: u64 = part.trim().parse().ok()?;
        slots.push(Duration::from_secs(secs));
    }
    if slots.is_empty() {
        None
    } else {
        Some(slots)
    }
}

/// `addr` or `addr:port` (spec.md §6); the address half is validated against
/// the curated whitelist, falling back to [`DEFAULT_MULTICAST_IP`] with a
/// warning on either a parse failure or a non-whitelisted address.
fn apply_multicast_ip(config: &mut Config, raw: &str) {
    let (ip_part, port_part) = match raw.split_once(':') {
        Some((ip, port)) => (ip, Some(port)),
        None => (raw, None),
    };

    match ip_part.parse::<Ipv4Addr>() {
        Ok(ip) => config.mc_group = IpAddr::V4(validate_or_fallback(ip)),
        Err(_) => {
            warn!(value = %ip_part, "MCCACHE_MULTICAST_IP address is not a valid IPv4 literal, falling back");
            config.mc_group = IpAddr::V4(DEFAULT_MULTICAST_IP);
        }
    }

    if let Some(port_raw) = port_part {
        match port_raw.parse() {
            Ok(port) => config.mc_port = port,
            Err(_) => warn!(value = %port_raw, "MCCACHE_MULTICAST_IP port is not an integer, keeping default port"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let config = Config::default();
        assert_eq!(config.mtu, 1472);
        assert_eq!(config.ttl, Duration::from_secs(900));
        assert_eq!(config.mc_port, 4000);
        assert_eq!(config.mc_hops, 1);
        assert_eq!(config.posture, CoherencePosture::Neutral);
        assert_eq!(config.max_size, 2048);
        assert_eq!(config.house_keeping_slots.len(), 5);
    }

    #[test]
    fn multicast_ip_without_port_keeps_default_port() {
        let mut config = Config::default();
        apply_multicast_ip(&mut config, "224.0.0.26");
        assert_eq!(config.mc_group, IpAddr::V4("224.0.0.26".parse().unwrap()));
        assert_eq!(config.mc_port, 4000);
    }

    #[test]
    fn multicast_ip_with_port_overrides_both() {
        let mut config = Config::default();
        apply_multicast_ip(&mut config, "224.0.2.40:5000");
        assert_eq!(config.mc_group, IpAddr::V4("224.0.2.40".parse().unwrap()));
        assert_eq!(config.mc_port, 5000);
    }

    #[test]
    fn non_whitelisted_multicast_ip_falls_back() {
        let mut config = Config::default();
        apply_multicast_ip(&mut config, "239.1.1.1:5000");
        assert_eq!(config.mc_group, IpAddr::V4(DEFAULT_MULTICAST_IP));
        assert_eq!(config.mc_port, 5000);
    }

    #[test]
    fn garbage_multicast_ip_falls_back_to_default_group_and_port() {
        let mut config = Config::default();
        apply_multicast_ip(&mut config, "not-an-ip");
        assert_eq!(config.mc_group, IpAddr::V4(DEFAULT_MULTICAST_IP));
    }

    #[test]
    fn maxsize_override_wins_over_posture_default() {
        env::remove_var("MCCACHE_MAXSIZE");
        env::remove_var("MCCACHE_LEVEL");
        env::set_var("MCCACHE_LEVEL", "3");
        env::set_var("MCCACHE_MAXSIZE", "42");
        let config = Config::from_env();
        assert_eq!(config.posture, CoherencePosture::Pessimistic);
        assert_eq!(config.max_size, 42);
        env::remove_var("MCCACHE_LEVEL");
        env::remove_var("MCCACHE_MAXSIZE");
    }

    #[test]
    fn slots_parse_from_comma_separated_seconds() {
        assert_eq!(
            parse_slots("1,2,3"),
            Some(vec![Duration::from_secs(1), Duration::from_secs(2), Duration::from_secs(3)])
        );
        assert_eq!(parse_slots(""), None);
        assert_eq!(parse_slots("a,b"), None);
    }
}
