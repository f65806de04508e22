pub mod json;
pub mod junit;
pub mod local;
pub mod model;
pub mod service;

pub use local::LocalReportService;
pub use model::{ReportStatus, ScenarioUpload, UploadModel};
pub use service::{HttpReportService, ReportScope, ReportService};
