// SPDX-License-Identifier: GPL-3.0-only

//! Error types for the frame pipeline
//!
//! Every error that can reach the call bridge maps onto one [`ErrorCode`], the
//! small fixed code set the bridge reports back to its caller together with a
//! human-readable message.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Result type alias using PipelineError
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Error codes surfaced to the call bridge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Required plane arguments are missing
    NoPlanes,
    /// Malformed arguments (dimensions, pixel strides)
    InvalidArgs,
    /// A plane or stride is too small for the declared geometry
    OutOfBounds,
    /// Canonical frame dimensions do not match the requested output
    DimensionMismatch,
    /// The colour conversion backend failed
    ConversionFailed,
    /// The inference engine rejected the frame
    SubmitFailed,
    /// Catch-all for engine-reported failures
    PoseError,
}

impl ErrorCode {
    /// Wire representation of the code
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::NoPlanes => "NO_PLANES",
            ErrorCode::InvalidArgs => "INVALID_ARGS",
            ErrorCode::OutOfBounds => "OUT_OF_BOUNDS",
            ErrorCode::DimensionMismatch => "DIMENSION_MISMATCH",
            ErrorCode::ConversionFailed => "CONVERSION_FAILED",
            ErrorCode::SubmitFailed => "SUBMIT_FAILED",
            ErrorCode::PoseError => "POSE_ERROR",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which input plane an error refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaneKind {
    Luma,
    /// Interleaved chroma plane (2-plane input)
    Chroma,
    /// First separate chroma plane (3-plane input)
    ChromaA,
    /// Second separate chroma plane (3-plane input)
    ChromaB,
}

impl fmt::Display for PlaneKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlaneKind::Luma => write!(f, "luma"),
            PlaneKind::Chroma => write!(f, "chroma"),
            PlaneKind::ChromaA => write!(f, "chroma A"),
            PlaneKind::ChromaB => write!(f, "chroma B"),
        }
    }
}

/// Plane normalization errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NormalizeError {
    /// Dimensions or pixel strides are not acceptable
    InvalidArgs(String),
    /// Row stride too small for one row of samples
    StrideTooSmall {
        plane: PlaneKind,
        row_stride: usize,
        required: usize,
    },
    /// Plane data shorter than the declared geometry needs
    OutOfBounds {
        plane: PlaneKind,
        required: usize,
        actual: usize,
    },
}

/// Format conversion errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConvertError {
    /// Canonical frame does not have the requested dimensions
    DimensionMismatch {
        frame: (u32, u32),
        requested: (u32, u32),
    },
    /// Backend failure (GPU device lost, mapping failed, ...)
    ConversionFailed(String),
}

/// Inference engine errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// `submit` before `configure`
    NotConfigured,
    /// Engine could not be set up (model missing, invalid options, runtime failure)
    InitFailed(String),
    /// The engine refused the request
    Rejected(String),
    /// Timestamp lower than the previously accepted one
    TimestampRegression { last_ms: i64, timestamp_ms: i64 },
    /// The engine has been closed
    Closed,
    /// Detection itself failed (delivered asynchronously)
    Detection(String),
}

/// Main pipeline error type
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineError {
    /// Luma or first chroma plane missing
    NoPlanes,
    /// Malformed ingest arguments
    InvalidArgs(String),
    Normalize(NormalizeError),
    Convert(ConvertError),
    /// Per-frame submission failure
    Submit(EngineError),
    /// Engine initialization failed; unrecoverable for this pipeline
    EngineInit(String),
}

impl PipelineError {
    /// Bridge error code for this error
    pub fn code(&self) -> ErrorCode {
        match self {
            PipelineError::NoPlanes => ErrorCode::NoPlanes,
            PipelineError::InvalidArgs(_) => ErrorCode::InvalidArgs,
            PipelineError::Normalize(NormalizeError::InvalidArgs(_)) => ErrorCode::InvalidArgs,
            PipelineError::Normalize(_) => ErrorCode::OutOfBounds,
            PipelineError::Convert(ConvertError::DimensionMismatch { .. }) => {
                ErrorCode::DimensionMismatch
            }
            PipelineError::Convert(ConvertError::ConversionFailed(_)) => {
                ErrorCode::ConversionFailed
            }
            PipelineError::Submit(EngineError::Detection(_)) => ErrorCode::PoseError,
            PipelineError::Submit(_) => ErrorCode::SubmitFailed,
            PipelineError::EngineInit(_) => ErrorCode::PoseError,
        }
    }

    /// Whether the pipeline can no longer process frames
    pub fn is_fatal(&self) -> bool {
        matches!(self, PipelineError::EngineInit(_))
    }
}

impl fmt::Display for NormalizeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NormalizeError::InvalidArgs(msg) => write!(f, "Invalid arguments: {}", msg),
            NormalizeError::StrideTooSmall {
                plane,
                row_stride,
                required,
            } => write!(
                f,
                "{} row stride {} is smaller than one row ({} bytes)",
                plane, row_stride, required
            ),
            NormalizeError::OutOfBounds {
                plane,
                required,
                actual,
            } => write!(
                f,
                "{} plane has {} bytes, {} required",
                plane, actual, required
            ),
        }
    }
}

impl fmt::Display for ConvertError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConvertError::DimensionMismatch { frame, requested } => write!(
                f,
                "Frame is {}x{}, conversion requested {}x{}",
                frame.0, frame.1, requested.0, requested.1
            ),
            ConvertError::ConversionFailed(msg) => write!(f, "Conversion failed: {}", msg),
        }
    }
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::NotConfigured => write!(f, "Inference engine is not configured"),
            EngineError::InitFailed(msg) => write!(f, "Engine initialization failed: {}", msg),
            EngineError::Rejected(msg) => write!(f, "Engine rejected frame: {}", msg),
            EngineError::TimestampRegression {
                last_ms,
                timestamp_ms,
            } => write!(
                f,
                "Timestamp {} ms is older than last submitted {} ms",
                timestamp_ms, last_ms
            ),
            EngineError::Closed => write!(f, "Inference engine is closed"),
            EngineError::Detection(msg) => write!(f, "Detection failed: {}", msg),
        }
    }
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineError::NoPlanes => write!(f, "Missing YUV planes"),
            PipelineError::InvalidArgs(msg) => write!(f, "Missing/invalid args: {}", msg),
            PipelineError::Normalize(e) => write!(f, "{}", e),
            PipelineError::Convert(e) => write!(f, "{}", e),
            PipelineError::Submit(e) => write!(f, "{}", e),
            PipelineError::EngineInit(msg) => {
                write!(f, "Pose engine initialization failed: {}", msg)
            }
        }
    }
}

/// Configuration file errors
#[derive(Debug)]
pub enum ConfigError {
    /// Reading or writing the file failed
    Io(std::io::Error),
    /// The file is not valid configuration JSON
    Parse(serde_json::Error),
    /// No configuration directory on this platform
    NoConfigDir,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "Config I/O error: {}", e),
            ConfigError::Parse(e) => write!(f, "Invalid config: {}", e),
            ConfigError::NoConfigDir => write!(f, "No configuration directory available"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io(e) => Some(e),
            ConfigError::Parse(e) => Some(e),
            ConfigError::NoConfigDir => None,
        }
    }
}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        ConfigError::Io(err)
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(err: serde_json::Error) -> Self {
        ConfigError::Parse(err)
    }
}

impl std::error::Error for NormalizeError {}
impl std::error::Error for ConvertError {}
impl std::error::Error for EngineError {}

impl std::error::Error for PipelineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PipelineError::Normalize(e) => Some(e),
            PipelineError::Convert(e) => Some(e),
            PipelineError::Submit(e) => Some(e),
            _ => None,
        }
    }
}

impl From<NormalizeError> for PipelineError {
    fn from(err: NormalizeError) -> Self {
        PipelineError::Normalize(err)
    }
}

impl From<ConvertError> for PipelineError {
    fn from(err: ConvertError) -> Self {
        PipelineError::Convert(err)
    }
}

impl From<EngineError> for PipelineError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::InitFailed(msg) => PipelineError::EngineInit(msg),
            other => PipelineError::Submit(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(PipelineError::NoPlanes.code(), ErrorCode::NoPlanes);
        assert_eq!(
            PipelineError::from(NormalizeError::OutOfBounds {
                plane: PlaneKind::Luma,
                required: 16,
                actual: 8,
            })
            .code(),
            ErrorCode::OutOfBounds
        );
        assert_eq!(
            PipelineError::from(NormalizeError::StrideTooSmall {
                plane: PlaneKind::ChromaA,
                row_stride: 1,
                required: 2,
            })
            .code(),
            ErrorCode::OutOfBounds
        );
        assert_eq!(
            PipelineError::from(EngineError::NotConfigured).code(),
            ErrorCode::SubmitFailed
        );
        assert_eq!(
            PipelineError::from(ConvertError::ConversionFailed("lost".into())).code(),
            ErrorCode::ConversionFailed
        );
    }

    #[test]
    fn test_engine_init_is_fatal() {
        let err = PipelineError::from(EngineError::InitFailed("no model".into()));
        assert!(err.is_fatal());
        assert!(!PipelineError::NoPlanes.is_fatal());
    }

    #[test]
    fn test_code_wire_names() {
        let json = serde_json::to_string(&ErrorCode::DimensionMismatch).unwrap();
        assert_eq!(json, "\"DIMENSION_MISMATCH\"");
        assert_eq!(ErrorCode::PoseError.to_string(), "POSE_ERROR");
    }
}
