pub mod audit;
pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod matcher;
pub mod pipeline;
pub mod propagate;
pub mod reconcile;
pub mod review;
pub mod scanner;
pub mod store;
