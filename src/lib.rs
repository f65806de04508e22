pub mod driver;
pub mod error;
pub mod invocation;
pub mod parser;
pub mod report;
pub mod runner;
pub mod server;
pub mod utils;

// Re-export common items
pub use error::{ActionFailure, RunnerError};
pub use invocation::{InvocationRequest, InvocationResponse, Invoker};
pub use runner::{RunOutcome, SuiteScheduler};
