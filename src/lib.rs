// Core infrastructure modules
pub mod config;
pub mod core;
pub mod logging;

// Feature-specific modules
pub mod auth;
pub mod history;
pub mod input;
pub mod repl;
pub mod results_grid;
pub mod safety;
pub mod translator;
