pub mod adb;
pub mod bugreport;
pub mod collector;
pub mod config;
pub mod error;
pub mod flags;
pub mod logging;
pub mod models;
pub mod scenario;
