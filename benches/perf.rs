use criterion::{Criterion, criterion_group, criterion_main};
use serde_json::{Map, Value, json};
use std::hint::black_box;

use leaderboard_terminal::feed::ManualSource;
use leaderboard_terminal::rank_view::RankView;
use leaderboard_terminal::standings::build_standings;
use leaderboard_terminal::sync_store::SyncStore;

fn sample_collection(teams: usize) -> Value {
    let mut map = Map::new();
    for idx in 0..teams {
        map.insert(
            format!("-N{idx:07}"),
            json!({
                "teamName": format!("Team {idx} {}", if idx % 3 == 0 { "Falcons" } else { "Rovers" }),
                "overall": ((idx * 7919) % 1000) as f64 / 4.0,
            }),
        );
    }
    Value::Object(map)
}

fn bench_build_standings(c: &mut Criterion) {
    let raw = sample_collection(5_000);
    c.bench_function("build_standings_5k", |b| {
        b.iter(|| {
            let standings = build_standings(black_box(Some(&raw)));
            black_box(standings.entries.len());
        })
    });
}

fn bench_filter(c: &mut Criterion) {
    let raw = sample_collection(5_000);
    let entries = build_standings(Some(&raw)).entries;
    let mut view = RankView::new();
    view.set_search_term("falc");
    c.bench_function("filter_5k", |b| {
        b.iter(|| {
            let out = view.filter(black_box(&entries));
            black_box(out.len());
        })
    });
}

fn bench_store_round(c: &mut Criterion) {
    let raw = sample_collection(1_000);
    let mut store = SyncStore::new(ManualSource::new());
    store.start();
    let view = RankView::new();
    c.bench_function("store_snapshot_and_view_1k", |b| {
        b.iter(|| {
            store.source().push_snapshot(Some(raw.clone()));
            store.pump();
            let frame = view.current_view(&store);
            black_box(frame.entries.len());
        })
    });
}

criterion_group!(benches, bench_build_standings, bench_filter, bench_store_round);
criterion_main!(benches);
