//! Output module: the transformation service and persisted artifacts.

mod gateway;
mod report;

pub use gateway::{
    status_error, strip_code_fence, HttpTransformGateway, TransformGateway,
    ANALYSIS_INSTRUCTION, DOCUMENTATION_INSTRUCTION,
};
pub use report::{ReportWriter, WrittenArtifacts, DOCUMENTATION_DIR, GRAPH_FILE, REPORT_FILE};
