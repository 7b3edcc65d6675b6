pub mod browser;
pub mod clock;
pub mod config;
pub mod dialogs;
pub mod error;
pub mod http_client;
pub mod operator;
pub mod orchestrator;
pub mod reachability;
pub mod selectors;
pub mod services;
pub mod session;
pub mod simulation;
