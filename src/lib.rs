pub mod aggregate;
pub mod api_client;
pub mod config;
pub mod ensemble;
pub mod error;
pub mod injury_features;
pub mod predict;
pub mod reconcile;
pub mod reference;
pub mod roster_fetch;
pub mod stats_fetch;
