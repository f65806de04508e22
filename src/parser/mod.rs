pub mod types;
pub mod yaml;

pub use types::{ScenarioDef, StepCommand, SuiteFile};
pub use yaml::{parse_suite_content, parse_suite_file};
