//! Closed set of results a single frame transfer can produce.
//!
//! Numeric codes match the ones virtual-camera capture plugins return over
//! the native boundary:
//!
//! | Code | Outcome | Severity |
//! |------|---------|----------|
//! | 0    | `Success` | silent |
//! | 1    | `FrameSkip` | warning |
//! | 2    | `CaptureInactive` | warning |
//! | 100  | `UnsupportedGraphicsDevice` | error |
//! | 101  | `ParameterError` | error |
//! | 102  | `ResolutionTooLarge` | error |
//! | 103  | `UnsupportedTextureFormat` | error |
//! | 104  | `ReadTextureFailed` | error |
//! | 200  | `InvalidInstance` | error |

use serde::{Deserialize, Serialize};

// MARK: - TransferOutcome

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferOutcome {
    Success,
    FrameSkip,
    CaptureInactive,
    UnsupportedGraphicsDevice,
    ParameterError,
    ResolutionTooLarge,
    UnsupportedTextureFormat,
    ReadTextureFailed,
    InvalidInstance,
}

impl TransferOutcome {
    pub const ALL: [Self; 9] = [
        Self::Success,
        Self::FrameSkip,
        Self::CaptureInactive,
        Self::UnsupportedGraphicsDevice,
        Self::ParameterError,
        Self::ResolutionTooLarge,
        Self::UnsupportedTextureFormat,
        Self::ReadTextureFailed,
        Self::InvalidInstance,
    ];

    pub fn code(&self) -> i32 {
        match self {
            Self::Success => 0,
            Self::FrameSkip => 1,
            Self::CaptureInactive => 2,
            Self::UnsupportedGraphicsDevice => 100,
            Self::ParameterError => 101,
            Self::ResolutionTooLarge => 102,
            Self::UnsupportedTextureFormat => 103,
            Self::ReadTextureFailed => 104,
            Self::InvalidInstance => 200,
        }
    }

    /// Decode a native result code. Codes outside the known set are a
    /// contract violation by the transport and read as `ParameterError`.
    pub fn from_code(code: i32) -> Self {
        Self::ALL
            .into_iter()
            .find(|outcome| outcome.code() == code)
            .unwrap_or(Self::ParameterError)
    }

    pub fn severity(&self) -> Severity {
        match self {
            Self::Success => Severity::Silent,
            Self::FrameSkip | Self::CaptureInactive => Severity::Warning,
            Self::UnsupportedGraphicsDevice
            | Self::ParameterError
            | Self::ResolutionTooLarge
            | Self::UnsupportedTextureFormat
            | Self::ReadTextureFailed
            | Self::InvalidInstance => Severity::Error,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }

    /// Diagnostic text for logs.
    pub fn message(&self) -> &'static str {
        match self {
            Self::Success => "Frame delivered",
            Self::FrameSkip => {
                "Capture device did skip a frame read, capture frame rate will not match render frame rate"
            }
            Self::CaptureInactive => "Capture device is inactive",
            Self::UnsupportedGraphicsDevice => "Unsupported graphics device (frame comes from a backend the capture transport cannot read)",
            Self::ParameterError => "Input parameter error",
            Self::ResolutionTooLarge => "Render resolution is too large to send to capture device",
            Self::UnsupportedTextureFormat => {
                "Render texture format is unsupported (only basic non-HDR (RGBA8) and HDR (FP16 RGBA) formats are supported)"
            }
            Self::ReadTextureFailed => "Error while reading texture image data",
            Self::InvalidInstance => "Invalid capture instance",
        }
    }
}

impl std::fmt::Display for TransferOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.message())
    }
}

// MARK: - Severity

/// How the status reporter surfaces an outcome. None of these stop rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Severity {
    Silent,
    Warning,
    Error,
}
