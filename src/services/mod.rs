pub mod config_loader;
pub mod locale;
pub mod ranking;
pub mod reveal_engine;
pub mod reveal_log;
pub mod snapshot_parser;
