use std::collections::VecDeque;

use crate::feed::SubscriptionSource;
use crate::rank_view::RankView;
use crate::sync_store::SyncStore;

const MAX_LOGS: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Search,
}

/// Front-end state. The ranked data itself lives in the [`SyncStore`].
#[derive(Debug, Clone)]
pub struct AppState {
    pub view: RankView,
    pub input_mode: InputMode,
    pub search_input: String,
    pub selected: usize,
    pub logs: VecDeque<String>,
    pub help_overlay: bool,
    pub source_label: String,
    last_seen_sync: Option<u64>,
    last_seen_skipped: usize,
    last_seen_error: Option<String>,
}

impl AppState {
    pub fn new(source_label: impl Into<String>) -> Self {
        Self {
            view: RankView::new(),
            input_mode: InputMode::Normal,
            search_input: String::new(),
            selected: 0,
            logs: VecDeque::with_capacity(MAX_LOGS),
            help_overlay: false,
            source_label: source_label.into(),
            last_seen_sync: None,
            last_seen_skipped: 0,
            last_seen_error: None,
        }
    }

    pub fn push_log(&mut self, msg: impl Into<String>) {
        self.logs.push_back(msg.into());
        while self.logs.len() > MAX_LOGS {
            self.logs.pop_front();
        }
    }

    pub fn begin_search(&mut self) {
        self.input_mode = InputMode::Search;
    }

    pub fn finish_search(&mut self) {
        self.input_mode = InputMode::Normal;
    }

    pub fn cancel_search(&mut self) {
        self.input_mode = InputMode::Normal;
        self.search_input.clear();
        self.sync_search_term();
    }

    pub fn push_search_char(&mut self, c: char) {
        self.search_input.push(c);
        self.sync_search_term();
    }

    pub fn pop_search_char(&mut self) {
        self.search_input.pop();
        self.sync_search_term();
    }

    fn sync_search_term(&mut self) {
        self.view.set_search_term(self.search_input.clone());
        self.selected = 0;
    }

    pub fn select_next(&mut self, total: usize) {
        if total == 0 {
            self.selected = 0;
            return;
        }
        self.selected = (self.selected + 1) % total;
    }

    pub fn select_prev(&mut self, total: usize) {
        if total == 0 {
            self.selected = 0;
            return;
        }
        if self.selected == 0 {
            self.selected = total - 1;
        } else {
            self.selected -= 1;
        }
    }

    pub fn clamp_selection(&mut self, total: usize) {
        if total == 0 {
            self.selected = 0;
        } else if self.selected >= total {
            self.selected = total - 1;
        }
    }

    /// Write console lines for syncs and errors the store picked up since the
    /// last call.
    pub fn observe<S: SubscriptionSource>(&mut self, store: &SyncStore<S>) {
        if let Some(info) = store.last_sync()
            && self.last_seen_sync != Some(info.sequence)
        {
            if self.last_seen_sync.is_none() {
                self.push_log(format!(
                    "[INFO] First sync: {} teams from {}",
                    info.records,
                    store.collection()
                ));
            }
            if info.skipped > 0 && info.skipped != self.last_seen_skipped {
                self.push_log(format!(
                    "[WARN] Skipped {} malformed record(s)",
                    info.skipped
                ));
            }
            self.last_seen_skipped = info.skipped;
            self.last_seen_sync = Some(info.sequence);
        }

        let error = store.error().map(str::to_string);
        if error != self.last_seen_error {
            if let Some(message) = &error {
                self.push_log(format!("[WARN] Feed error: {message}"));
            }
            self.last_seen_error = error;
        }
    }
}
