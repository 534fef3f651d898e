use crate::feed::SubscriptionSource;
use crate::standings::RankedEntry;
use crate::sync_store::SyncStore;

/// Everything the presentation layer needs for one render pass.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewFrame {
    pub entries: Vec<RankedEntry>,
    pub loading: bool,
    pub error_message: Option<String>,
    pub stale: bool,
    /// Number of ranked teams before filtering.
    pub total: usize,
}

impl ViewFrame {
    pub fn is_filtered(&self) -> bool {
        self.entries.len() != self.total
    }
}

/// Search filter over a store's ranked sequence. Holds no copy of the data.
#[derive(Debug, Clone, Default)]
pub struct RankView {
    term: String,
    needle: String,
}

impl RankView {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_search_term(&mut self, term: impl Into<String>) {
        self.term = term.into();
        self.needle = self.term.to_lowercase();
    }

    pub fn search_term(&self) -> &str {
        &self.term
    }

    pub fn matches(&self, entry: &RankedEntry) -> bool {
        self.needle.is_empty() || entry.record.team_name.to_lowercase().contains(&self.needle)
    }

    /// Filter `entries` without touching their ranks.
    pub fn filter(&self, entries: &[RankedEntry]) -> Vec<RankedEntry> {
        entries
            .iter()
            .filter(|entry| self.matches(entry))
            .cloned()
            .collect()
    }

    pub fn current_view<S: SubscriptionSource>(&self, store: &SyncStore<S>) -> ViewFrame {
        let all = store.snapshot();
        ViewFrame {
            entries: self.filter(&all),
            loading: store.is_loading(),
            error_message: store.error().map(str::to_string),
            stale: store.is_stale(),
            total: all.len(),
        }
    }
}
