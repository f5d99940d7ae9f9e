//! `CaptureSession`: the renderer-facing glue around one device handle.
//!
//! # Lifecycle
//!
//! ```text
//! 1. CaptureSession::setup(transport, settings)   opens the selected channel
//! 2. session.render(&frame, color_space)          once per rendered frame
//!       └─ transform → transfer → report, returns the outcome
//! 3. session.apply_settings(new)                  re-opens if the channel changed
//! 4. session.cleanup() / drop                     closes the channel
//! ```

use std::sync::Arc;
use std::time::Duration;

use capbridge_core::{CaptureSettings, ColorSpace, FrameDescriptor, TransferOutcome};
use tracing::{debug, info};

use crate::{CaptureTransport, DeviceHandle, StatusReporter, TransferStats};

pub struct CaptureSession {
    transport: Arc<dyn CaptureTransport>,
    settings: CaptureSettings,
    handle: DeviceHandle,
    reporter: StatusReporter,
}

impl CaptureSession {
    pub fn setup(transport: Arc<dyn CaptureTransport>, settings: CaptureSettings) -> Self {
        let settings = settings.clamped();
        info!(
            "Capture setup: {} @ {} fps (vsync={}, timeout={}ms, double_buffering={})",
            settings.capture_device,
            settings.target_frame_rate,
            settings.enable_vsync,
            settings.timeout_ms,
            settings.double_buffering
        );
        let handle = DeviceHandle::open(transport.clone(), settings.capture_device);
        let reporter = StatusReporter::new(settings.hide_warnings);
        Self { transport, settings, handle, reporter }
    }

    /// Swap in new settings. A different channel selection closes the current
    /// handle and opens a fresh one; everything else applies from the next frame.
    pub fn apply_settings(&mut self, settings: CaptureSettings) {
        let settings = settings.clamped();
        if settings.capture_device != self.settings.capture_device {
            debug!(
                "Capture channel change: {} → {}",
                self.settings.capture_device, settings.capture_device
            );
            self.handle.close();
            self.handle = DeviceHandle::open(self.transport.clone(), settings.capture_device);
        }
        self.reporter.set_hide_warnings(settings.hide_warnings);
        self.settings = settings;
    }

    /// A channel is selected. Inactive sessions are not rendered into.
    pub fn is_active(&self) -> bool {
        self.settings.is_active()
    }

    /// Deliver one rendered frame.
    ///
    /// Returns `None` when no channel is selected (nothing attempted),
    /// otherwise the transfer outcome after it has been reported.
    pub fn render(&mut self, frame: &FrameDescriptor<'_>, color_space: ColorSpace) -> Option<TransferOutcome> {
        if !self.is_active() {
            return None;
        }
        let config = self.settings.transfer_config(color_space);
        let outcome = self.handle.send(frame, &config);
        self.reporter.report(outcome);
        Some(outcome)
    }

    /// Close the channel. The session stays usable only through
    /// [`apply_settings`](Self::apply_settings) with a new channel.
    pub fn cleanup(&mut self) {
        self.handle.close();
    }

    pub fn settings(&self) -> &CaptureSettings {
        &self.settings
    }

    pub fn handle(&self) -> &DeviceHandle {
        &self.handle
    }

    pub fn stats(&self) -> &TransferStats {
        self.reporter.stats()
    }

    pub fn reset_stats(&mut self) {
        self.reporter.reset_stats();
    }

    /// Render pacing hint; `None` when vsync paces presentation.
    pub fn frame_interval(&self) -> Option<Duration> {
        self.settings.frame_interval()
    }
}
