use serde_json::json;

use leaderboard_terminal::feed::ManualSource;
use leaderboard_terminal::rank_view::RankView;
use leaderboard_terminal::sync_store::SyncStore;

fn scenario_a_snapshot() -> serde_json::Value {
    json!({
        "A": {"teamName": "Falcons", "overall": 50},
        "B": {"teamName": "Eagles", "overall": 80},
        "C": {"teamName": "Hawks", "overall": 80}
    })
}

fn summary(view: &RankView, store: &SyncStore<ManualSource>) -> Vec<(String, usize, f64)> {
    view.current_view(store)
        .entries
        .into_iter()
        .map(|e| (e.record.id, e.rank, e.record.overall))
        .collect()
}

#[test]
fn scenario_a_ties_follow_key_order() {
    let mut store = SyncStore::new(ManualSource::new());
    store.start();
    store.source().push_snapshot(Some(scenario_a_snapshot()));
    store.pump();

    let view = RankView::new();
    assert_eq!(
        summary(&view, &store),
        vec![
            ("B".to_string(), 1, 80.0),
            ("C".to_string(), 2, 80.0),
            ("A".to_string(), 3, 50.0),
        ]
    );
}

#[test]
fn scenario_b_search_keeps_canonical_rank() {
    let mut store = SyncStore::new(ManualSource::new());
    store.start();
    store.source().push_snapshot(Some(scenario_a_snapshot()));
    store.pump();

    let mut view = RankView::new();
    view.set_search_term("eagle");
    assert_eq!(summary(&view, &store), vec![("B".to_string(), 1, 80.0)]);

    view.set_search_term("FALC");
    assert_eq!(summary(&view, &store), vec![("A".to_string(), 3, 50.0)]);
}

#[test]
fn scenario_c_null_snapshot_is_confirmed_empty() {
    let mut store = SyncStore::new(ManualSource::new());
    store.start();
    assert!(RankView::new().current_view(&store).loading);

    store.source().push_snapshot(None);
    store.pump();

    let frame = RankView::new().current_view(&store);
    assert!(frame.entries.is_empty());
    assert!(!frame.loading);
    assert_eq!(frame.error_message, None);
}

#[test]
fn scenario_d_error_before_any_snapshot() {
    let mut store = SyncStore::new(ManualSource::new());
    store.start();
    store.source().push_error("permission-denied");
    store.pump();

    let frame = RankView::new().current_view(&store);
    assert!(frame.entries.is_empty());
    assert!(!frame.loading);
    assert_eq!(frame.error_message.as_deref(), Some("permission-denied"));
}

#[test]
fn error_keeps_last_good_data_marked_stale() {
    let mut store = SyncStore::new(ManualSource::new());
    store.start();
    store.source().push_snapshot(Some(scenario_a_snapshot()));
    store.pump();
    store.source().push_error("network down");
    store.pump();

    let frame = RankView::new().current_view(&store);
    assert_eq!(frame.entries.len(), 3);
    assert!(frame.stale);
    assert_eq!(frame.error_message.as_deref(), Some("network down"));
    assert!(!store.is_subscribed());

    store.start();
    assert!(store.is_loading());
    assert_eq!(store.error(), Some("network down"));
    store.source().push_snapshot(Some(json!({"Z": {"teamName": "Zephyrs", "overall": 1}})));
    store.pump();

    let frame = RankView::new().current_view(&store);
    assert_eq!(frame.entries.len(), 1);
    assert!(!frame.stale);
    assert_eq!(frame.error_message, None);
}

#[test]
fn lifecycle_calls_are_idempotent() {
    let mut store = SyncStore::new(ManualSource::new());
    store.stop();
    store.start();
    store.start();
    assert_eq!(store.source().subscribe_count(), 1);
    assert_eq!(store.source().last_collection().as_deref(), Some("teams"));

    store.stop();
    store.stop();
    assert_eq!(store.source().active_count(), 0);
    assert!(!store.is_subscribed());

    store.start();
    assert_eq!(store.source().subscribe_count(), 2);
    assert_eq!(store.source().active_count(), 1);
}

#[test]
fn nothing_queued_before_stop_is_applied() {
    let mut store = SyncStore::new(ManualSource::new());
    store.start();
    store.source().push_snapshot(Some(scenario_a_snapshot()));
    store.stop();

    assert!(!store.source().push_snapshot(None));
    assert_eq!(store.pump(), 0);
    assert!(store.entries().is_empty());
}

#[test]
fn each_snapshot_replaces_the_whole_sequence() {
    let mut store = SyncStore::new(ManualSource::new());
    store.start();
    store.source().push_snapshot(Some(scenario_a_snapshot()));
    store.source().push_snapshot(Some(json!({
        "C": {"teamName": "Hawks", "overall": 10},
        "D": {"teamName": "Doves", "overall": 20}
    })));
    assert_eq!(store.pump(), 2);

    let held = store.snapshot();
    let ids: Vec<&str> = held.iter().map(|e| e.record.id.as_str()).collect();
    assert_eq!(ids, vec!["D", "C"]);

    store.source().push_snapshot(None);
    store.pump();
    assert_eq!(held.len(), 2);
    assert!(store.entries().is_empty());
}

#[test]
fn malformed_record_does_not_blank_the_board() {
    let mut store = SyncStore::new(ManualSource::new());
    store.start();
    store.source().push_snapshot(Some(json!({
        "A": {"teamName": "Falcons", "overall": 50},
        "B": {"overall": 99},
        "C": {"teamName": "Hawks", "overall": 60}
    })));
    store.pump();

    let ranks: Vec<(String, usize)> = store
        .entries()
        .iter()
        .map(|e| (e.record.team_name.clone(), e.rank))
        .collect();
    assert_eq!(
        ranks,
        vec![("Hawks".to_string(), 1), ("Falcons".to_string(), 2)]
    );
    assert_eq!(store.error(), None);
}

#[test]
fn custom_collection_name_is_subscribed() {
    let mut store = SyncStore::with_collection(ManualSource::new(), "league/teams");
    store.start();
    assert_eq!(
        store.source().last_collection().as_deref(),
        Some("league/teams")
    );
}
