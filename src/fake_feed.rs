use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use rand::Rng;
use serde_json::{Map, Value, json};
use tracing::{debug, info};

use crate::feed::{FeedSink, Subscription, SubscriptionSource};
use crate::sync_store::DEFAULT_COLLECTION;

const MAX_DEMO_TEAMS: usize = 24;

const JOINING_NAMES: &[&str] = &[
    "Harbour Herons",
    "Quarry Quails",
    "Lantern Lynx",
    "Mill Street Magpies",
    "Orchard Otters",
    "Cinder Crows",
    "Tidewater Terns",
    "Granite Geckos",
];

#[derive(Debug, Clone)]
struct DemoTeam {
    key: String,
    name: String,
    overall: f64,
}

/// Local stand-in for the remote feed: drifts scores, lets new teams join and
/// can be told to fail after a number of ticks.
#[derive(Debug, Clone)]
pub struct DemoSource {
    tick: Duration,
    fail_after: Option<u32>,
}

impl DemoSource {
    pub fn new(tick: Duration) -> Self {
        Self {
            tick,
            fail_after: None,
        }
    }

    pub fn with_fail_after(mut self, ticks: Option<u32>) -> Self {
        self.fail_after = ticks;
        self
    }
}

impl SubscriptionSource for DemoSource {
    fn subscribe(&self, collection: &str, sink: FeedSink) -> Result<Subscription> {
        let handle = sink.handle();
        let tick = self.tick;
        let fail_after = self.fail_after;
        let teams = if collection == DEFAULT_COLLECTION {
            seed_teams()
        } else {
            Vec::new()
        };
        info!(collection, "demo feed starting");
        thread::Builder::new()
            .name("demo-feed".to_string())
            .spawn(move || run_demo(sink, teams, tick, fail_after))
            .context("failed to spawn demo feed thread")?;
        Ok(handle)
    }
}

fn run_demo(sink: FeedSink, mut teams: Vec<DemoTeam>, tick: Duration, fail_after: Option<u32>) {
    let mut rng = rand::thread_rng();
    if !sink.snapshot(collection_value(&teams)) {
        return;
    }

    let mut ticks = 0u32;
    let mut joined = 0usize;
    loop {
        thread::sleep(tick);
        if sink.is_cancelled() {
            debug!("demo feed cancelled");
            return;
        }
        ticks = ticks.saturating_add(1);

        if fail_after.is_some_and(|limit| ticks >= limit) {
            let _ = sink.error("permission-denied");
            return;
        }
        if teams.is_empty() {
            continue;
        }

        let idx = rng.gen_range(0..teams.len());
        let bump = f64::from(rng.gen_range(-3i32..=6));
        teams[idx].overall = (teams[idx].overall + bump).max(0.0);

        if teams.len() < MAX_DEMO_TEAMS && joined < JOINING_NAMES.len() && rng.gen_bool(0.08) {
            let floor = teams
                .iter()
                .map(|t| t.overall)
                .fold(f64::INFINITY, f64::min);
            teams.push(DemoTeam {
                key: format!("t{:02}", teams.len() + 1),
                name: JOINING_NAMES[joined].to_string(),
                overall: floor.max(0.0),
            });
            joined += 1;
        }

        if !sink.snapshot(collection_value(&teams)) {
            return;
        }
    }
}

fn collection_value(teams: &[DemoTeam]) -> Option<Value> {
    if teams.is_empty() {
        return None;
    }
    let mut map = Map::new();
    for team in teams {
        map.insert(
            team.key.clone(),
            json!({ "teamName": team.name, "overall": team.overall }),
        );
    }
    // One record without a score, the way half-written rows show up remotely.
    map.insert("t99".to_string(), json!({ "teamName": "Unscored XI" }));
    Some(Value::Object(map))
}

fn seed_teams() -> Vec<DemoTeam> {
    [
        ("Falcons", 50.0),
        ("Eagles", 80.0),
        ("Hawks", 80.0),
        ("Kestrels", 64.5),
        ("Ospreys", 71.0),
        ("Harriers", 42.0),
        ("Merlins", 58.0),
        ("Kites", 35.5),
    ]
    .into_iter()
    .enumerate()
    .map(|(idx, (name, overall))| DemoTeam {
        key: format!("t{:02}", idx + 1),
        name: name.to_string(),
        overall,
    })
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::FeedEvent;
    use crate::standings::build_standings;
    use std::sync::mpsc;

    #[test]
    fn first_snapshot_ranks_seed_teams_and_skips_unscored_row() {
        let (tx, rx) = mpsc::channel();
        let source = DemoSource::new(Duration::from_secs(60));
        let handle = source
            .subscribe(DEFAULT_COLLECTION, FeedSink::new(1, tx))
            .unwrap();
        let msg = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        handle.unsubscribe();

        let FeedEvent::Snapshot(data) = msg.event else {
            panic!("expected a snapshot");
        };
        let standings = build_standings(data.as_ref());
        assert_eq!(standings.entries.len(), 8);
        assert_eq!(standings.rejected.len(), 1);
        assert_eq!(standings.entries[0].record.team_name, "Eagles");
        assert_eq!(standings.entries[1].record.team_name, "Hawks");
    }

    #[test]
    fn unknown_collection_is_empty() {
        let (tx, rx) = mpsc::channel();
        let source = DemoSource::new(Duration::from_secs(60));
        let _handle = source.subscribe("players", FeedSink::new(1, tx)).unwrap();
        let msg = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(msg.event, FeedEvent::Snapshot(None));
    }

    #[test]
    fn fails_after_configured_ticks() {
        let (tx, rx) = mpsc::channel();
        let source = DemoSource::new(Duration::from_millis(10)).with_fail_after(Some(2));
        let _handle = source
            .subscribe(DEFAULT_COLLECTION, FeedSink::new(1, tx))
            .unwrap();
        let last = rx
            .iter()
            .take_while(|msg| !matches!(msg.event, FeedEvent::Error(_)))
            .count();
        assert_eq!(last, 2);
    }
}
