//! Non-owning frame view handed over by the renderer for one transfer call.

use crate::errors::ReadError;
use crate::types::{GraphicsBackend, PixelFormat, Resolution};

// MARK: - FrameMemory

/// Pixel memory owned by the renderer.
///
/// Implementations backed by GPU textures map (or read back) the texture on
/// demand; CPU buffers just lend their bytes.
pub trait FrameMemory {
    fn map_read(&self) -> Result<&[u8], ReadError>;
}

impl FrameMemory for &[u8] {
    fn map_read(&self) -> Result<&[u8], ReadError> {
        Ok(*self)
    }
}

impl FrameMemory for Vec<u8> {
    fn map_read(&self) -> Result<&[u8], ReadError> {
        Ok(self.as_slice())
    }
}

impl FrameMemory for bytes::Bytes {
    fn map_read(&self) -> Result<&[u8], ReadError> {
        Ok(self.as_ref())
    }
}

// MARK: - FrameDescriptor

/// Transient view over one rendered frame.
///
/// Borrowed for the duration of a single transfer call and never retained.
#[derive(Clone, Copy)]
pub struct FrameDescriptor<'a> {
    pub width: u32,
    pub height: u32,
    /// Bytes between the starts of two consecutive rows.
    pub row_pitch: usize,
    pub format: PixelFormat,
    pub backend: GraphicsBackend,
    pub memory: &'a dyn FrameMemory,
}

impl<'a> FrameDescriptor<'a> {
    /// Describe a tightly packed frame (`row_pitch == width * bpp`).
    pub fn new(
        width: u32,
        height: u32,
        format: PixelFormat,
        backend: GraphicsBackend,
        memory: &'a dyn FrameMemory,
    ) -> Self {
        Self {
            width,
            height,
            row_pitch: width as usize * format.bytes_per_pixel(),
            format,
            backend,
            memory,
        }
    }

    pub fn with_row_pitch(mut self, row_pitch: usize) -> Self {
        self.row_pitch = row_pitch;
        self
    }

    pub fn resolution(&self) -> Resolution {
        Resolution::new(self.width, self.height)
    }

    /// Bytes of actual pixel data in one row, excluding padding.
    pub fn row_bytes(&self) -> usize {
        self.width as usize * self.format.bytes_per_pixel()
    }

    /// Minimum length the mapped memory must have, or `None` if it does not
    /// fit in `usize`.
    pub fn required_len(&self) -> Option<usize> {
        if self.height == 0 {
            return Some(0);
        }
        self.row_pitch
            .checked_mul(self.height as usize - 1)?
            .checked_add(self.row_bytes())
    }

    /// Structural sanity: non-empty, a row pitch that can hold a row, and an
    /// addressable total size.
    pub fn is_well_formed(&self) -> bool {
        self.width > 0
            && self.height > 0
            && self.row_pitch >= self.row_bytes()
            && self.required_len().is_some()
    }
}

impl std::fmt::Debug for FrameDescriptor<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameDescriptor")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("row_pitch", &self.row_pitch)
            .field("format", &self.format)
            .field("backend", &self.backend)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tight_descriptor_lengths() {
        let pixels = vec![0u8; 4 * 3 * 2];
        let desc = FrameDescriptor::new(4, 2, PixelFormat::Rgba16Float, GraphicsBackend::Direct3D11, &pixels);
        assert_eq!(desc.row_bytes(), 32);
        assert_eq!(desc.required_len(), Some(64));
        assert!(desc.is_well_formed());
    }

    #[test]
    fn padded_rows_need_less_than_full_pitch_on_last_row() {
        let pixels = vec![0u8; 0];
        let desc = FrameDescriptor::new(3, 2, PixelFormat::Rgba8, GraphicsBackend::Direct3D11, &pixels)
            .with_row_pitch(16);
        assert_eq!(desc.required_len(), Some(16 + 12));
    }

    #[test]
    fn short_pitch_is_malformed() {
        let pixels = vec![0u8; 64];
        let desc = FrameDescriptor::new(4, 4, PixelFormat::Rgba8, GraphicsBackend::Direct3D11, &pixels)
            .with_row_pitch(8);
        assert!(!desc.is_well_formed());
    }

    #[test]
    fn unaddressable_pitch_is_malformed() {
        let pixels = vec![0u8; 16];
        let desc = FrameDescriptor::new(2, 2, PixelFormat::Rgba8, GraphicsBackend::Direct3D11, &pixels)
            .with_row_pitch(usize::MAX);
        assert_eq!(desc.required_len(), None);
        assert!(!desc.is_well_formed());

        let single_row = FrameDescriptor::new(2, 1, PixelFormat::Rgba8, GraphicsBackend::Direct3D11, &pixels)
            .with_row_pitch(usize::MAX);
        assert_eq!(single_row.required_len(), Some(8));
    }
}
