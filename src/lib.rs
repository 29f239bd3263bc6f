pub mod account;
pub mod config;
pub mod credentials;
pub mod download;
pub mod error;
pub mod flows;
pub mod locate;
pub mod orchestrator;
pub mod portal;
pub mod report;
pub mod retry;
