pub mod config;
pub mod constants;
pub mod error;
pub mod fetch;
pub mod geography;
pub mod logging;
pub mod mmwr;
pub mod output;
pub mod pipeline;
pub mod population;
pub mod reconcile;
pub mod sources;
pub mod summary;
pub mod types;
