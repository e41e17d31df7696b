pub mod activity_log;
pub mod auto_persisting;
pub mod booking_store;
pub mod config;
pub mod dependencies;
pub mod dirs;
pub mod event_bus;
pub mod id;
pub mod model;
pub mod photo_store;
pub mod random;
pub mod tagger;
pub mod upload_queue;
