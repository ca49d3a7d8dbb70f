pub mod config;
pub mod get;
pub mod preview;
pub mod rebuild;
pub mod reference;
pub mod search;
pub mod stats;
pub mod suggest;
pub mod watch;
