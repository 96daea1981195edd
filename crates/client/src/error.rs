//! Error types for the client engine

use geocanvas_cloud::CloudError;
use geocanvas_core::FeatureId;
use thiserror::Error;

use crate::upload::JobStage;

/// Failures of an upload / processing job
#[derive(Error, Debug)]
pub enum JobError {
    #[error("No file or URL selected")]
    NoInput,

    #[error("File is {size} bytes; the limit is {limit} bytes")]
    FileTooLarge { size: u64, limit: u64 },

    #[error("No uploaded image to classify")]
    NoUploadToClassify,

    #[error("No uploaded image to export")]
    NoUploadToExport,

    #[error("Unknown job: {0}")]
    UnknownJob(String),

    #[error("Job {uuid} is {stage:?}; expected {expected:?}")]
    WrongStage {
        uuid: String,
        stage: JobStage,
        expected: JobStage,
    },

    #[error(transparent)]
    Remote(#[from] CloudError),

    #[error("Processing timed out after {attempts} attempts")]
    TimedOut { attempts: u32 },

    #[error("Job cancelled")]
    Cancelled,
}

/// Failures of the vector edit session
#[derive(Error, Debug)]
pub enum SessionError {
    #[error(transparent)]
    Core(#[from] geocanvas_core::Error),

    #[error("No feature is open in the property editor")]
    NotEditing,

    #[error("Feature {0} not found")]
    UnknownFeature(FeatureId),

    #[error(transparent)]
    Export(#[from] ExportError),
}

/// Failures of GeoJSON export
#[derive(Error, Debug)]
pub enum ExportError {
    #[error("No features to export")]
    Empty,

    #[error(transparent)]
    Codec(#[from] geocanvas_core::Error),
}

pub type JobResult<T> = std::result::Result<T, JobError>;
pub type SessionResult<T> = std::result::Result<T, SessionError>;
