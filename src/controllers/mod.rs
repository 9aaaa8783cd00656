pub mod cli;
pub mod worker;

pub use cli::{Args, CliController, Command};
pub use worker::WorkerController;
