// Library exports for minigram
// This allows integration tests and external code to use minigram modules

pub mod app;
pub mod backend;
pub mod config;
pub mod db;
pub mod error;
pub mod extractors;
pub mod routes;
pub mod state;
