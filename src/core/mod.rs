pub mod config;
pub mod grid;
pub mod hardware;
pub mod harness;
pub mod record;
pub mod registry;
pub mod runtime;
pub mod stats;
pub mod trial;
