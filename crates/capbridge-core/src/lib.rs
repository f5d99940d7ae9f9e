pub mod config;
pub mod errors;
pub mod frame;
pub mod outcome;
pub mod types;

pub use config::{CaptureSettings, TransferConfig};
pub use errors::{CapBridgeError, ReadError};
pub use frame::{FrameDescriptor, FrameMemory};
pub use outcome::{Severity, TransferOutcome};
pub use types::*;
