//! capbridge-transform: Frame Transform Stage.
//!
//! Turns the renderer's frame into exactly what the capture channel is handed:
//!
//! ```text
//! mapped frame bytes (row_pitch, format)
//!   │  ResizeMode::LinearResize and size ≠ negotiated size
//!   ▼
//! bilinear resample → tight buffer at negotiated size
//!   │  MirrorMode::MirrorHorizontally
//!   ▼
//! per-row pixel reversal
//!   │
//!   ▼
//! PreparedFrame { pixels: Cow<[u8]>, color_space, .. }
//! ```
//!
//! No I/O and no retained state. When nothing has to change and the source
//! rows are tightly packed the renderer's bytes are borrowed, not copied.

use std::borrow::Cow;

use capbridge_core::{
    ColorSpace, FrameDescriptor, MirrorMode, PixelFormat, ResizeMode, Resolution, TransferConfig,
};
use thiserror::Error;
use tracing::trace;

mod mirror;
mod resize;

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransformError {
    #[error("Pixel format {0:?} cannot be transformed")]
    UnsupportedFormat(PixelFormat),

    #[error("Malformed frame: {reason}")]
    Malformed { reason: String },

    #[error("Frame memory holds {actual} bytes, {expected} required")]
    Truncated { expected: usize, actual: usize },
}

// ── Plan ──────────────────────────────────────────────────────────────────────

/// What the stage will do to a frame of a given size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransformPlan {
    pub output: Resolution,
    pub resize: bool,
    pub mirror: bool,
}

impl TransformPlan {
    /// `target` is the consumer's negotiated size, if a consumer is attached.
    pub fn new(
        source: Resolution,
        target: Option<Resolution>,
        resize: ResizeMode,
        mirror: MirrorMode,
    ) -> Self {
        let output = match (resize, target) {
            (ResizeMode::LinearResize, Some(target)) if !target.is_empty() => target,
            _ => source,
        };
        Self {
            output,
            resize: output != source,
            mirror: mirror == MirrorMode::MirrorHorizontally,
        }
    }

    pub fn is_passthrough(&self) -> bool {
        !self.resize && !self.mirror
    }
}

// ── PreparedFrame ─────────────────────────────────────────────────────────────

/// Outgoing frame: tightly packed pixels plus the tags the consumer needs.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedFrame<'a> {
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    pub color_space: ColorSpace,
    pub pixels: Cow<'a, [u8]>,
}

impl PreparedFrame<'_> {
    pub fn resolution(&self) -> Resolution {
        Resolution::new(self.width, self.height)
    }

    pub fn row_bytes(&self) -> usize {
        self.width as usize * self.format.bytes_per_pixel()
    }

    /// True when the renderer's memory is lent through unchanged.
    pub fn is_borrowed(&self) -> bool {
        matches!(self.pixels, Cow::Borrowed(_))
    }
}

// ── prepare ───────────────────────────────────────────────────────────────────

/// Derive the outgoing frame for one transfer call.
///
/// `pixels` is the already-mapped memory of `frame`; `target` is the size the
/// consumer negotiated (ignored unless `config.resize` is `LinearResize`).
pub fn prepare<'a>(
    frame: &FrameDescriptor<'_>,
    pixels: &'a [u8],
    target: Option<Resolution>,
    config: &TransferConfig,
) -> Result<PreparedFrame<'a>, TransformError> {
    if !frame.format.is_supported() {
        return Err(TransformError::UnsupportedFormat(frame.format));
    }
    if !frame.is_well_formed() {
        return Err(TransformError::Malformed {
            reason: format!(
                "{}x{} with row pitch {} ({} bytes per row needed)",
                frame.width,
                frame.height,
                frame.row_pitch,
                frame.row_bytes()
            ),
        });
    }
    let Some(expected) = frame.required_len() else {
        return Err(TransformError::Malformed {
            reason: format!("row pitch {} overflows the address space", frame.row_pitch),
        });
    };
    if pixels.len() < expected {
        return Err(TransformError::Truncated { expected, actual: pixels.len() });
    }

    let plan = TransformPlan::new(frame.resolution(), target, config.resize, config.mirror);
    let bpp = frame.format.bytes_per_pixel();
    let tight = frame.row_pitch == frame.row_bytes();

    let mut out: Cow<'a, [u8]> = if plan.resize {
        trace!(
            "Resampling {} → {} ({:?})",
            frame.resolution(),
            plan.output,
            frame.format
        );
        let resized = match frame.format {
            PixelFormat::Rgba8 => resize::bilinear::<resize::Unorm8>(
                pixels,
                frame.width,
                frame.height,
                frame.row_pitch,
                plan.output.width,
                plan.output.height,
            ),
            PixelFormat::Rgba16Float => resize::bilinear::<resize::Half>(
                pixels,
                frame.width,
                frame.height,
                frame.row_pitch,
                plan.output.width,
                plan.output.height,
            ),
            other => return Err(TransformError::UnsupportedFormat(other)),
        };
        Cow::Owned(resized)
    } else if tight {
        Cow::Borrowed(&pixels[..expected])
    } else {
        Cow::Owned(repack(pixels, frame.row_pitch, frame.row_bytes(), frame.height))
    };

    if plan.mirror {
        mirror::mirror_rows(out.to_mut(), plan.output.width, bpp);
    }

    Ok(PreparedFrame {
        width: plan.output.width,
        height: plan.output.height,
        format: frame.format,
        color_space: config.color_space,
        pixels: out,
    })
}

/// Drop row padding.
fn repack(pixels: &[u8], row_pitch: usize, row_bytes: usize, height: u32) -> Vec<u8> {
    let mut out = Vec::with_capacity(row_bytes * height as usize);
    for y in 0..height as usize {
        let start = y * row_pitch;
        out.extend_from_slice(&pixels[start..start + row_bytes]);
    }
    out
}

// ── Tests ─────────────────────────────────────────────────────────────────────
