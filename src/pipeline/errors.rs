use thiserror::Error;

use crate::utils::table_naming::TableNameError;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum PipelineError {
    #[error("Pipeline has no statements to render")]
    EmptyPipeline,

    #[error("Output name '{0}' is already used by an earlier statement in this pipeline")]
    DuplicateOutputName(String),

    #[error("Invalid statement output name: {0}")]
    InvalidOutputName(#[from] TableNameError),

    #[error("Statement index {index} out of range for a pipeline of {len} statements")]
    StepOutOfRange { index: usize, len: usize },
}
