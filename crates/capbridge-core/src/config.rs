use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::errors::CapBridgeError;
use crate::types::{CaptureDevice, ColorSpace, MirrorMode, ResizeMode};

pub const DEFAULT_TIMEOUT_MS: u32 = 1_000;
pub const MAX_TIMEOUT_MS: u32 = 60_000;
pub const MIN_FRAME_RATE: u32 = 1;
pub const MAX_FRAME_RATE: u32 = 120;

// MARK: - TransferConfig

/// Parameters of one transfer call. Built fresh every frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferConfig {
    /// Upper bound on the wait for the consumer to accept the frame.
    pub timeout: Duration,
    pub resize: ResizeMode,
    pub mirror: MirrorMode,
    pub double_buffering: bool,
    pub color_space: ColorSpace,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS as u64),
            resize: ResizeMode::Disabled,
            mirror: MirrorMode::Disabled,
            double_buffering: false,
            color_space: ColorSpace::Gamma,
        }
    }
}

// MARK: - CaptureSettings

/// Capture configuration surface, read once per frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureSettings {
    #[serde(alias = "captureDevice")]
    pub capture_device: CaptureDevice,
    #[serde(alias = "resizeMode")]
    pub resize_mode: ResizeMode,
    #[serde(alias = "mirrorMode")]
    pub mirror_mode: MirrorMode,
    #[serde(alias = "timeoutMs", alias = "timeout")]
    pub timeout_ms: u32,
    #[serde(alias = "doubleBuffering")]
    pub double_buffering: bool,
    #[serde(alias = "enableVSync", alias = "enableVsync")]
    pub enable_vsync: bool,
    #[serde(alias = "targetFrameRate")]
    pub target_frame_rate: u32,
    #[serde(alias = "hideWarnings")]
    pub hide_warnings: bool,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            capture_device: CaptureDevice::Closed,
            resize_mode: ResizeMode::Disabled,
            mirror_mode: MirrorMode::Disabled,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            double_buffering: false,
            enable_vsync: false,
            target_frame_rate: 60,
            hide_warnings: false,
        }
    }
}

impl CaptureSettings {
    /// Parse settings from JSON; out-of-range values are clamped.
    pub fn from_json(json: &str) -> Result<Self, CapBridgeError> {
        let settings: Self = serde_json::from_str(json)?;
        Ok(settings.clamped())
    }

    /// Load settings from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, CapBridgeError> {
        let json = std::fs::read_to_string(path.as_ref())?;
        Self::from_json(&json)
    }

    /// Clamp numeric fields into their supported ranges.
    pub fn clamped(mut self) -> Self {
        self.timeout_ms = self.timeout_ms.min(MAX_TIMEOUT_MS);
        self.target_frame_rate = self.target_frame_rate.clamp(MIN_FRAME_RATE, MAX_FRAME_RATE);
        self
    }

    /// Apply `CAPBRIDGE_*` environment overrides.
    pub fn apply_env(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary key lookup. Unparsable values are
    /// ignored with a warning.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = lookup("CAPBRIDGE_CHANNEL") {
            match raw.trim().parse::<i32>() {
                Ok(n) => self.capture_device = CaptureDevice::from(n),
                Err(_) => warn!("Ignoring CAPBRIDGE_CHANNEL={:?} (not an integer)", raw),
            }
        }
        if let Some(raw) = lookup("CAPBRIDGE_TIMEOUT_MS") {
            match raw.trim().parse::<u32>() {
                Ok(ms) => self.timeout_ms = ms,
                Err(_) => warn!("Ignoring CAPBRIDGE_TIMEOUT_MS={:?} (not a number)", raw),
            }
        }
        if let Some(raw) = lookup("CAPBRIDGE_FPS") {
            match raw.trim().parse::<u32>() {
                Ok(fps) => self.target_frame_rate = fps,
                Err(_) => warn!("Ignoring CAPBRIDGE_FPS={:?} (not a number)", raw),
            }
        }
        if let Some(flag) = lookup("CAPBRIDGE_DOUBLE_BUFFERING").and_then(|raw| parse_flag(&raw)) {
            self.double_buffering = flag;
        }
        if let Some(flag) = lookup("CAPBRIDGE_HIDE_WARNINGS").and_then(|raw| parse_flag(&raw)) {
            self.hide_warnings = flag;
        }
        if let Some(flag) = lookup("CAPBRIDGE_VSYNC").and_then(|raw| parse_flag(&raw)) {
            self.enable_vsync = flag;
        }
        if let Some(raw) = lookup("CAPBRIDGE_MIRROR") {
            match raw.trim() {
                "mirror_horizontally" | "horizontal" => self.mirror_mode = MirrorMode::MirrorHorizontally,
                "disabled" => self.mirror_mode = MirrorMode::Disabled,
                other => match parse_flag(other) {
                    Some(true) => self.mirror_mode = MirrorMode::MirrorHorizontally,
                    Some(false) => self.mirror_mode = MirrorMode::Disabled,
                    None => {}
                },
            }
        }
        if let Some(raw) = lookup("CAPBRIDGE_RESIZE") {
            match raw.trim() {
                "linear_resize" | "linear" => self.resize_mode = ResizeMode::LinearResize,
                "disabled" => self.resize_mode = ResizeMode::Disabled,
                other => match parse_flag(other) {
                    Some(true) => self.resize_mode = ResizeMode::LinearResize,
                    Some(false) => self.resize_mode = ResizeMode::Disabled,
                    None => {}
                },
            }
        }
        *self = self.clone().clamped();
    }

    /// A channel is selected.
    pub fn is_active(&self) -> bool {
        !self.capture_device.is_closed()
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms as u64)
    }

    /// Render pacing interval. `None` when vsync drives presentation.
    pub fn frame_interval(&self) -> Option<Duration> {
        if self.enable_vsync {
            return None;
        }
        let fps = self.target_frame_rate.clamp(MIN_FRAME_RATE, MAX_FRAME_RATE);
        Some(Duration::from_micros(1_000_000 / fps as u64))
    }

    /// Per-call transfer parameters for a frame rendered in `color_space`.
    pub fn transfer_config(&self, color_space: ColorSpace) -> TransferConfig {
        TransferConfig {
            timeout: self.timeout(),
            resize: self.resize_mode,
            mirror: self.mirror_mode,
            double_buffering: self.double_buffering,
            color_space,
        }
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        other => {
            warn!("Ignoring unrecognised flag value {:?}", other);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::io::Write;

    use super::*;

    #[test]
    fn deserializes_camel_case_fields() {
        let json = r#"{
            "captureDevice": 2,
            "resizeMode": "linear_resize",
            "mirrorMode": "mirror_horizontally",
            "timeout": 250,
            "doubleBuffering": true,
            "enableVSync": true,
            "targetFrameRate": 30,
            "hideWarnings": true
        }"#;

        let cfg = CaptureSettings::from_json(json).expect("valid camelCase settings");
        assert_eq!(cfg.capture_device, CaptureDevice::Index(2));
        assert_eq!(cfg.resize_mode, ResizeMode::LinearResize);
        assert_eq!(cfg.mirror_mode, MirrorMode::MirrorHorizontally);
        assert_eq!(cfg.timeout_ms, 250);
        assert!(cfg.double_buffering);
        assert!(cfg.enable_vsync);
        assert_eq!(cfg.target_frame_rate, 30);
        assert!(cfg.hide_warnings);
    }

    #[test]
    fn missing_fields_take_defaults() {
        let cfg = CaptureSettings::from_json(r#"{"capture_device": 0}"#).expect("partial settings");
        assert_eq!(cfg.capture_device, CaptureDevice::Index(0));
        assert_eq!(cfg.timeout_ms, DEFAULT_TIMEOUT_MS);
        assert_eq!(cfg.target_frame_rate, 60);
        assert!(cfg.is_active());
        assert!(!CaptureSettings::default().is_active());
    }

    #[test]
    fn out_of_range_values_are_clamped() {
        let cfg = CaptureSettings::from_json(r#"{"target_frame_rate": 500, "timeout_ms": 999999}"#)
            .expect("settings");
        assert_eq!(cfg.target_frame_rate, MAX_FRAME_RATE);
        assert_eq!(cfg.timeout_ms, MAX_TIMEOUT_MS);

        let cfg = CaptureSettings::from_json(r#"{"target_frame_rate": 0}"#).expect("settings");
        assert_eq!(cfg.target_frame_rate, MIN_FRAME_RATE);
    }

    #[test]
    fn vsync_disables_pacing_interval() {
        let mut cfg = CaptureSettings { target_frame_rate: 50, ..Default::default() };
        assert_eq!(cfg.frame_interval(), Some(Duration::from_millis(20)));
        cfg.enable_vsync = true;
        assert_eq!(cfg.frame_interval(), None);
    }

    #[test]
    fn env_style_overrides() {
        let vars: HashMap<&str, &str> = [
            ("CAPBRIDGE_CHANNEL", "4"),
            ("CAPBRIDGE_TIMEOUT_MS", "15"),
            ("CAPBRIDGE_DOUBLE_BUFFERING", "yes"),
            ("CAPBRIDGE_MIRROR", "1"),
            ("CAPBRIDGE_RESIZE", "linear"),
            ("CAPBRIDGE_FPS", "not-a-number"),
        ]
        .into_iter()
        .collect();

        let mut cfg = CaptureSettings::default();
        cfg.apply_overrides(|key| vars.get(key).map(|v| v.to_string()));

        assert_eq!(cfg.capture_device, CaptureDevice::Index(4));
        assert_eq!(cfg.timeout_ms, 15);
        assert!(cfg.double_buffering);
        assert_eq!(cfg.mirror_mode, MirrorMode::MirrorHorizontally);
        assert_eq!(cfg.resize_mode, ResizeMode::LinearResize);
        assert_eq!(cfg.target_frame_rate, 60);
    }

    #[test]
    fn transfer_config_carries_color_space() {
        let cfg = CaptureSettings { timeout_ms: 40, double_buffering: true, ..Default::default() };
        let tc = cfg.transfer_config(ColorSpace::Linear);
        assert_eq!(tc.timeout, Duration::from_millis(40));
        assert!(tc.double_buffering);
        assert!(tc.color_space.is_linear());
    }

    #[test]
    fn loads_settings_file() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        write!(file, r#"{{"captureDevice": 1, "hideWarnings": true}}"#).expect("write settings");

        let cfg = CaptureSettings::load(file.path()).expect("load settings");
        assert_eq!(cfg.capture_device, CaptureDevice::Index(1));
        assert!(cfg.hide_warnings);
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = CaptureSettings::load("/nonexistent/capbridge.json").unwrap_err();
        assert!(matches!(err, CapBridgeError::Io(_)));
    }
}
