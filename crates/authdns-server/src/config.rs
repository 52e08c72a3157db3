//! Process configuration, read once from the environment at boot

use std::env;

use authdns_core::{DnsError, DnsResult};

/// Immutable server configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub zones_folder: String,
    pub dns_port: u16,
    pub http_port: u16,
    pub cluster_port: u16,
    pub api_token: String,
    pub replication_quorum_ratio: f64,
    pub replication_timeout_ms: u64,
    /// Every known node except self, as `host:port` peer RPC addresses
    pub peers: Vec<String>,
}

impl Config {
    pub fn from_env() -> DnsResult<Config> {
        Ok(Config {
            zones_folder: env::var("AUTHDNS_ZONES_FOLDER").unwrap_or_else(|_| "zones".into()),
            dns_port: parse_var("AUTHDNS_DNS_PORT", 5053)?,
            http_port: parse_var("AUTHDNS_HTTP_PORT", 8080)?,
            cluster_port: parse_var("AUTHDNS_CLUSTER_PORT", 5300)?,
            api_token: env::var("AUTHDNS_API_TOKEN")
                .map_err(|_| DnsError::config("AUTHDNS_API_TOKEN must be set"))?,
            replication_quorum_ratio: parse_var("AUTHDNS_QUORUM_RATIO", 0.5)?,
            replication_timeout_ms: parse_var("AUTHDNS_REPLICATION_TIMEOUT_MS", 2_000)?,
            peers: env::var("AUTHDNS_PEERS")
                .map(|raw| {
                    raw.split(',')
                        .map(str::trim)
                        .filter(|peer| !peer.is_empty())
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default(),
        })
    }
}

fn parse_var<T: std::str::FromStr>(key: &str, default: T) -> DnsResult<T> {
    match env::var(key) {
        Ok(raw) => raw
            .parse()
            .map_err(|_| DnsError::config(format!("{key} has an invalid value: {raw:?}"))),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_var_falls_back_to_default() {
        assert_eq!(parse_var::<u16>("AUTHDNS_TEST_UNSET_PORT", 5053).unwrap(), 5053);
    }

    #[test]
    fn parse_var_rejects_garbage() {
        env::set_var("AUTHDNS_TEST_BAD_PORT", "not-a-port");
        assert!(parse_var::<u16>("AUTHDNS_TEST_BAD_PORT", 0).is_err());
        env::remove_var("AUTHDNS_TEST_BAD_PORT");
    }
}
