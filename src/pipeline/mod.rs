pub mod ingest;
pub mod state;

pub use ingest::{validate_image, ImageInfo};
pub use state::{PipelineRun, PipelineStage, RunOutcome, RunReport};
