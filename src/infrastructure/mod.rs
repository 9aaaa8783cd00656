pub mod config;
pub mod logging;
pub mod messaging;
pub mod repositories;
