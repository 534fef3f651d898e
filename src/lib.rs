pub mod config;
pub mod fake_feed;
pub mod feed;
pub mod firebase_feed;
pub mod http_client;
pub mod rank_view;
pub mod standings;
pub mod state;
pub mod sync_store;
