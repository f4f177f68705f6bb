pub mod locator;
pub mod pull;
pub mod runner;
