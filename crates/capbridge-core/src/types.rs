use serde::{Deserialize, Serialize};

// MARK: - CaptureDevice

/// Number of capture channels a virtual-camera driver exposes by default.
pub const DEFAULT_CHANNEL_COUNT: u32 = 10;

/// Channel selection as the configuration surface stores it.
///
/// Serialised as a plain integer: `-1` means "closed", `0..=9` picks a
/// channel. Any other negative value is folded into `Closed`. Indices above
/// the transport's channel count are kept as-is and rejected at open time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "i32", into = "i32")]
pub enum CaptureDevice {
    #[default]
    Closed,
    Index(u32),
}

impl CaptureDevice {
    pub fn is_closed(&self) -> bool {
        matches!(self, Self::Closed)
    }

    pub fn index(&self) -> Option<u32> {
        match self {
            Self::Closed => None,
            Self::Index(idx) => Some(*idx),
        }
    }
}

impl From<i32> for CaptureDevice {
    fn from(raw: i32) -> Self {
        u32::try_from(raw).map(Self::Index).unwrap_or(Self::Closed)
    }
}

impl From<CaptureDevice> for i32 {
    fn from(device: CaptureDevice) -> Self {
        match device {
            CaptureDevice::Closed => -1,
            CaptureDevice::Index(idx) => i32::try_from(idx).unwrap_or(i32::MAX),
        }
    }
}

impl std::fmt::Display for CaptureDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Closed => write!(f, "closed"),
            Self::Index(idx) => write!(f, "device {}", idx + 1),
        }
    }
}

// MARK: - Resolution

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub const HD: Self = Self { width: 1280, height: 720 };
    pub const FHD: Self = Self { width: 1920, height: 1080 };
    pub const UHD: Self = Self { width: 3840, height: 2160 };

    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn total_pixels(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// True when both dimensions are within `max`.
    pub fn fits_within(&self, max: Resolution) -> bool {
        self.width <= max.width && self.height <= max.height
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

impl std::fmt::Display for Resolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}×{}", self.width, self.height)
    }
}

// MARK: - PixelFormat

/// Pixel layout of a rendered frame.
///
/// Only [`PixelFormat::Rgba8`] (non-HDR) and [`PixelFormat::Rgba16Float`]
/// (HDR, half-float) can be delivered; the others exist because renderers
/// hand them to us and we must reject them with a defined outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PixelFormat {
    Rgba8,
    Rgba16Float,
    Bgra8,
    Rgb10A2,
    R8,
}

impl PixelFormat {
    pub fn bytes_per_pixel(&self) -> usize {
        match self {
            Self::Rgba8 | Self::Bgra8 | Self::Rgb10A2 => 4,
            Self::Rgba16Float => 8,
            Self::R8 => 1,
        }
    }

    pub fn is_supported(&self) -> bool {
        matches!(self, Self::Rgba8 | Self::Rgba16Float)
    }

    pub fn is_hdr(&self) -> bool {
        matches!(self, Self::Rgba16Float | Self::Rgb10A2)
    }
}

// MARK: - GraphicsBackend

/// Graphics API that owns the frame's memory on the renderer side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GraphicsBackend {
    Direct3D11,
    Direct3D12,
    Vulkan,
    OpenGl,
    Metal,
}

impl std::fmt::Display for GraphicsBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Direct3D11 => write!(f, "D3D11"),
            Self::Direct3D12 => write!(f, "D3D12"),
            Self::Vulkan => write!(f, "Vulkan"),
            Self::OpenGl => write!(f, "OpenGL"),
            Self::Metal => write!(f, "Metal"),
        }
    }
}

// MARK: - ColorSpace

/// Renderer's active color space at the moment of transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorSpace {
    Linear,
    #[default]
    Gamma,
}

impl ColorSpace {
    pub fn is_linear(&self) -> bool {
        matches!(self, Self::Linear)
    }
}

// MARK: - ResizeMode / MirrorMode

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResizeMode {
    #[default]
    Disabled,
    LinearResize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MirrorMode {
    #[default]
    Disabled,
    MirrorHorizontally,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capture_device_from_raw() {
        assert_eq!(CaptureDevice::from(-1), CaptureDevice::Closed);
        assert_eq!(CaptureDevice::from(-7), CaptureDevice::Closed);
        assert_eq!(CaptureDevice::from(3), CaptureDevice::Index(3));
        assert_eq!(i32::from(CaptureDevice::Closed), -1);
        assert_eq!(i32::from(CaptureDevice::Index(9)), 9);
    }

    #[test]
    fn capture_device_serde_as_integer() {
        let dev: CaptureDevice = serde_json::from_str("2").expect("integer device");
        assert_eq!(dev, CaptureDevice::Index(2));
        assert_eq!(serde_json::to_string(&CaptureDevice::Closed).unwrap(), "-1");
    }

    #[test]
    fn only_two_formats_supported() {
        let supported: Vec<_> = [
            PixelFormat::Rgba8,
            PixelFormat::Rgba16Float,
            PixelFormat::Bgra8,
            PixelFormat::Rgb10A2,
            PixelFormat::R8,
        ]
        .into_iter()
        .filter(PixelFormat::is_supported)
        .collect();
        assert_eq!(supported, vec![PixelFormat::Rgba8, PixelFormat::Rgba16Float]);
    }

    #[test]
    fn resolution_fits_within() {
        assert!(Resolution::FHD.fits_within(Resolution::UHD));
        assert!(!Resolution::new(4096, 2160).fits_within(Resolution::UHD));
        assert!(Resolution::new(0, 10).is_empty());
    }
}
