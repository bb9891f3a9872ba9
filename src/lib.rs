//! Translation management: a key namespace tree, a language forest and
//! per-language values, mutated through a single command processor and read
//! through query/export projections.

pub mod catalog;
pub mod client;
pub mod command;
pub mod config;
pub mod db;
pub mod error;
pub mod metrics;
pub mod model;
pub mod query;
pub mod retry;
pub mod server;
pub mod store;
