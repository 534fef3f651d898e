use std::env;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Result, bail};

use crate::sync_store::DEFAULT_COLLECTION;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Demo,
    Firebase,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FeedConfig {
    pub source: SourceKind,
    pub collection: String,
    pub firebase_url: Option<String>,
    pub firebase_auth: Option<String>,
    pub demo_tick: Duration,
    pub demo_fail_after: Option<u32>,
    pub log_file: Option<PathBuf>,
}

impl FeedConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key lookup. `LEADERBOARD_SOURCE` is `demo`, `firebase`
    /// or `auto` (firebase when a database URL is set).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let non_empty = |key: &str| {
            lookup(key)
                .map(|val| val.trim().to_string())
                .filter(|val| !val.is_empty())
        };

        let firebase_url = non_empty("FIREBASE_DB_URL").map(|url| url.trim_end_matches('/').to_string());
        let firebase_auth = non_empty("FIREBASE_AUTH");
        let source = match non_empty("LEADERBOARD_SOURCE")
            .unwrap_or_else(|| "auto".to_string())
            .to_lowercase()
            .as_str()
        {
            "demo" | "fake" => SourceKind::Demo,
            "firebase" => {
                if firebase_url.is_none() {
                    bail!("FIREBASE_DB_URL is required when LEADERBOARD_SOURCE=firebase");
                }
                SourceKind::Firebase
            }
            "auto" => {
                if firebase_url.is_some() {
                    SourceKind::Firebase
                } else {
                    SourceKind::Demo
                }
            }
            other => bail!("unknown LEADERBOARD_SOURCE {other:?} (expected demo, firebase or auto)"),
        };

        let collection = non_empty("LEADERBOARD_COLLECTION")
            .map(|val| val.trim_matches('/').to_string())
            .filter(|val| !val.is_empty())
            .unwrap_or_else(|| DEFAULT_COLLECTION.to_string());

        let demo_tick = Duration::from_millis(
            non_empty("DEMO_TICK_MS")
                .and_then(|val| val.parse::<u64>().ok())
                .unwrap_or(1200)
                .clamp(200, 10_000),
        );
        let demo_fail_after = non_empty("DEMO_FAIL_AFTER")
            .and_then(|val| val.parse::<u32>().ok())
            .filter(|ticks| *ticks > 0);
        let log_file = non_empty("LEADERBOARD_LOG").map(PathBuf::from);

        Ok(Self {
            source,
            collection,
            firebase_url,
            firebase_auth,
            demo_tick,
            demo_fail_after,
            log_file,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(pairs: &[(&str, &str)]) -> Result<FeedConfig> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        FeedConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_to_demo_teams() {
        let cfg = config(&[]).unwrap();
        assert_eq!(cfg.source, SourceKind::Demo);
        assert_eq!(cfg.collection, "teams");
        assert_eq!(cfg.demo_tick, Duration::from_millis(1200));
        assert_eq!(cfg.demo_fail_after, None);
    }

    #[test]
    fn auto_picks_firebase_when_url_is_set() {
        let cfg = config(&[("FIREBASE_DB_URL", "https://x.firebaseio.com/")]).unwrap();
        assert_eq!(cfg.source, SourceKind::Firebase);
        assert_eq!(cfg.firebase_url.as_deref(), Some("https://x.firebaseio.com"));
    }

    #[test]
    fn firebase_without_url_is_rejected() {
        assert!(config(&[("LEADERBOARD_SOURCE", "firebase")]).is_err());
        assert!(config(&[("LEADERBOARD_SOURCE", "carrier-pigeon")]).is_err());
    }

    #[test]
    fn demo_tick_is_clamped() {
        let cfg = config(&[("DEMO_TICK_MS", "5")]).unwrap();
        assert_eq!(cfg.demo_tick, Duration::from_millis(200));
        let cfg = config(&[("DEMO_TICK_MS", "junk"), ("DEMO_FAIL_AFTER", "0")]).unwrap();
        assert_eq!(cfg.demo_tick, Duration::from_millis(1200));
        assert_eq!(cfg.demo_fail_after, None);
    }
}
