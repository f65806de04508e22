pub mod actions;
pub mod context;
pub mod events;
pub mod executor;
pub mod scheduler;
pub mod state;
pub mod step_log;
pub mod suite;
pub mod visual;

#[cfg(test)]
pub(crate) mod testing;

pub use actions::{ActionExecutor, WaitOptions};
pub use context::ScenarioContext;
pub use events::*;
pub use executor::DeclaredScenario;
pub use scheduler::{BudgetSignal, Deadline, RunOutcome, SuiteScheduler, TimeBudget, Unbounded};
pub use state::*;
pub use step_log::{Keyword, StepLog, StepRecord, StepStatus};
pub use suite::{Scenario, Suite, SuiteCatalog, SuiteSource};
pub use visual::{DiffResult, ExecutionEnvironment, ScreenshotDiffEngine, DEFAULT_THRESHOLD};
