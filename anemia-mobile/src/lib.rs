//! C ABI for embedding the anemia pipeline in a host application.
//!
//! The host loads a pipeline once with [`anemia_pipeline_load`], calls
//! [`anemia_predict`] per submission and renders the verdict itself.

use std::io;
use std::os::raw::c_int;
use std::path::{Path, PathBuf};

use anemia_core::{PipelineError, ValidationError};

pub mod ffi;
pub use ffi::*;

/// Status codes returned by [`anemia_predict`].
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnemiaStatus {
    Ok = 0,
    InvalidArgument = 1,
    ArtifactNotFound = 2,
    ArtifactUnreadable = 3,
    ArtifactCorrupt = 4,
    DegenerateScaler = 5,
    WrongArity = 6,
    Incomplete = 7,
    OutOfDomain = 8,
    ScalingFailed = 9,
    PredictionFailed = 10,
    InconsistentArtifact = 11,
}

impl AnemiaStatus {
    pub fn code(self) -> c_int {
        self as c_int
    }
}

impl From<&PipelineError> for AnemiaStatus {
    fn from(err: &PipelineError) -> Self {
        match err {
            PipelineError::ArtifactNotFound { .. } => AnemiaStatus::ArtifactNotFound,
            PipelineError::ArtifactUnreadable { .. } => AnemiaStatus::ArtifactUnreadable,
            PipelineError::ArtifactCorrupt { .. } => AnemiaStatus::ArtifactCorrupt,
            PipelineError::DegenerateScaler { .. } => AnemiaStatus::DegenerateScaler,
            PipelineError::InconsistentArtifact { .. } => AnemiaStatus::InconsistentArtifact,
            PipelineError::Validation(ValidationError::WrongArity { .. }) => AnemiaStatus::WrongArity,
            PipelineError::Validation(ValidationError::Incomplete { .. }) => AnemiaStatus::Incomplete,
            PipelineError::Validation(ValidationError::OutOfDomain { .. }) => AnemiaStatus::OutOfDomain,
            PipelineError::Scaling(_) => AnemiaStatus::ScalingFailed,
            PipelineError::Prediction(_) => AnemiaStatus::PredictionFailed,
        }
    }
}

/// Write the demo scaler and classifier into `out_dir`, creating it if needed.
pub fn demo_artifacts(out_dir: &Path) -> io::Result<(PathBuf, PathBuf)> {
    std::fs::create_dir_all(out_dir)?;
    anemia_core::demo::write_demo_artifacts(out_dir)
}
