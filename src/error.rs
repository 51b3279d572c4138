use std::path::PathBuf;
use thiserror::Error;

/// Setup and transport errors for the recorder.
///
/// Runtime sensor/logging failures are handled locally (dropped sample,
/// degraded session) and never surface through this type; these variants
/// cover the things that can go wrong while bringing a component up.
#[derive(Error, Debug)]
pub enum RecorderError {
    #[error("button source unavailable: {0}")]
    ButtonInit(String),

    #[error("failed to open GPS port {path}: {source}")]
    GpsOpen {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, RecorderError>;
