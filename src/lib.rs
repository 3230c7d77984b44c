// Public API - the runner for end-to-end use, the components for embedding
pub mod runner;

pub mod cleanup;
pub mod error;
pub mod orchestrator;
pub mod resolve;
pub mod results;
pub mod schedule;
pub mod service;
pub mod settings;
pub mod state;
pub mod telemetry;
pub mod upload;

// Internal modules
mod config;
mod paging;

#[cfg(test)]
mod testing;
