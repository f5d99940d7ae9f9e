//! The per-frame transfer operation.
//!
//! Checks run in a fixed order and the first failing one decides the outcome:
//!
//! 1. handle not open                  → `InvalidInstance` (no wait)
//! 2. pixel format not RGBA8 / RGBA16F → `UnsupportedTextureFormat`
//! 3. frame larger than channel max    → `ResolutionTooLarge`
//! 4. malformed descriptor             → `ParameterError`
//! 5. frame from a foreign backend     → `UnsupportedGraphicsDevice`
//! 6. pixel memory cannot be read      → `ReadTextureFailed`
//! 7. no consumer attached             → `CaptureInactive` (nothing transformed)
//! 8. transform, then hand off to the transport, which waits at most
//!    `timeout` and answers `Success`, `FrameSkip` or `CaptureInactive`.

use capbridge_core::{FrameDescriptor, TransferConfig, TransferOutcome};
use capbridge_transform::TransformError;
use tracing::{debug, trace};

use crate::{DeviceHandle, SendOptions};

/// Send one frame through `handle`. Never panics, never blocks past
/// `config.timeout`.
pub fn send_frame(
    handle: &DeviceHandle,
    frame: &FrameDescriptor<'_>,
    config: &TransferConfig,
) -> TransferOutcome {
    let Some(instance) = handle.instance() else {
        return TransferOutcome::InvalidInstance;
    };
    let transport = handle.transport();
    let Some(caps) = transport.channel_caps(instance) else {
        return TransferOutcome::InvalidInstance;
    };

    if !frame.format.is_supported() {
        return TransferOutcome::UnsupportedTextureFormat;
    }
    if !frame.resolution().fits_within(caps.max_resolution) {
        return TransferOutcome::ResolutionTooLarge;
    }
    if !frame.is_well_formed() {
        return TransferOutcome::ParameterError;
    }
    if frame.backend != caps.backend {
        return TransferOutcome::UnsupportedGraphicsDevice;
    }

    let pixels = match frame.memory.map_read() {
        Ok(pixels) => pixels,
        Err(e) => {
            debug!("Frame read failed: {}", e);
            return TransferOutcome::ReadTextureFailed;
        }
    };
    let required = frame.required_len().unwrap_or(usize::MAX);
    if pixels.len() < required {
        debug!("Frame memory holds {} bytes, {} required", pixels.len(), required);
        return TransferOutcome::ReadTextureFailed;
    }

    let Some(negotiated) = caps.negotiated else {
        return TransferOutcome::CaptureInactive;
    };

    let prepared = match capbridge_transform::prepare(frame, pixels, Some(negotiated), config) {
        Ok(prepared) => prepared,
        Err(e) => {
            debug!("Frame transform failed: {}", e);
            return match e {
                TransformError::UnsupportedFormat(_) => TransferOutcome::UnsupportedTextureFormat,
                TransformError::Malformed { .. } => TransferOutcome::ParameterError,
                TransformError::Truncated { .. } => TransferOutcome::ReadTextureFailed,
            };
        }
    };

    trace!(
        "Sending {} frame ({:?}, linear={}, double_buffering={})",
        prepared.resolution(),
        prepared.format,
        prepared.color_space.is_linear(),
        config.double_buffering
    );

    transport.send_frame(instance, &prepared, &SendOptions::from(config))
}
