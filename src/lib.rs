pub mod app;
pub mod cli;
pub mod config;
pub mod customer;
pub mod dates;
pub mod grouping;
pub mod reminders;
pub mod search;
pub mod sorting;
pub mod storage;

pub use config::{AppConfig, ConfigLoader, ConfigPaths};
