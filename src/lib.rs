pub mod config;
pub mod executor;
pub mod manifest;
pub mod planner;
pub mod report;
pub mod runner;
