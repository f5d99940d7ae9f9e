use thiserror::Error;

#[derive(Error, Debug)]
pub enum CapBridgeError {
    #[error("Failed to parse settings: {0}")]
    SettingsParse(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failure to map a frame's pixel memory for reading.
///
/// Never surfaced to the renderer directly: the transfer operation folds it
/// into `TransferOutcome::ReadTextureFailed`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReadError {
    #[error("Frame memory is not mapped for CPU reads")]
    NotMapped,

    #[error("Graphics device lost while reading frame: {reason}")]
    DeviceLost { reason: String },
}
