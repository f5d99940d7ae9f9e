//! capbridge-transport: frame hand-off to a virtual-camera consumer.
//!
//! # Architecture
//!
//! ```text
//! renderer (once per frame)
//!   │  CaptureSession::render(frame, color_space)
//!   ▼
//! DeviceHandle ── transfer::send_frame ──► capbridge-transform::prepare
//!   │                                          │
//!   │  CaptureTransport::send_frame ◄──────────┘
//!   ▼
//! consumer boundary (LoopbackTransport, or a native driver adapter)
//!   │
//!   ▼
//! TransferOutcome ──► StatusReporter (silent / warn / error)
//! ```
//!
//! Nothing in the per-frame path returns `Err` or blocks longer than the
//! configured timeout; every result is a [`TransferOutcome`].

use std::time::Duration;

use capbridge_core::config::MAX_TIMEOUT_MS;
use capbridge_core::{
    GraphicsBackend, MirrorMode, ResizeMode, Resolution, TransferConfig, TransferOutcome,
};
use capbridge_transform::PreparedFrame;

pub mod handle;
pub mod loopback;
pub mod report;
pub mod session;
pub mod transfer;

pub use handle::{DeviceHandle, HandleState, OpenFailure};
pub use loopback::{DeliveredFrame, FrameGuard, LoopbackConfig, LoopbackConsumer, LoopbackTransport};
pub use report::{StatusReporter, TransferStats};
pub use session::CaptureSession;
pub use transfer::send_frame;

// MARK: - InstanceId

/// Opaque reference to one acquired channel, issued by the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InstanceId(u64);

impl InstanceId {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn get(&self) -> u64 {
        self.0
    }
}

// MARK: - ChannelCaps

/// What the channel behind an instance accepts right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelCaps {
    /// Largest frame the channel can carry.
    pub max_resolution: Resolution,
    /// Size the attached consumer expects. `None` means no consumer is
    /// attached, and the transfer answers `CaptureInactive` without
    /// preparing the frame.
    pub negotiated: Option<Resolution>,
    /// The only graphics backend the transport can read frames from.
    pub backend: GraphicsBackend,
}

// MARK: - SendOptions

/// Upper bound on any wait at the consumer boundary.
pub const MAX_WAIT: Duration = Duration::from_millis(MAX_TIMEOUT_MS as u64);

/// Per-call parameters forwarded across the consumer boundary.
///
/// `resize` and `mirror` describe how the frame was prepared; the pixels
/// handed to the transport already have them applied. `timeout` never
/// exceeds [`MAX_WAIT`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SendOptions {
    pub timeout: Duration,
    pub double_buffering: bool,
    pub resize: ResizeMode,
    pub mirror: MirrorMode,
}

impl From<&TransferConfig> for SendOptions {
    fn from(config: &TransferConfig) -> Self {
        Self {
            timeout: config.timeout.min(MAX_WAIT),
            double_buffering: config.double_buffering,
            resize: config.resize,
            mirror: config.mirror,
        }
    }
}

// MARK: - CaptureTransport trait

/// Consumer boundary: the three operations a virtual-camera driver exposes,
/// plus a capability query.
///
/// Implementations:
/// - [`LoopbackTransport`]: in-process consumer with single/double buffer slots
/// - native driver adapters (shared memory / kernel driver), out of tree
pub trait CaptureTransport: Send + Sync {
    /// Acquire `channel`. `None` means the channel cannot be acquired.
    fn create(&self, channel: u32) -> Option<InstanceId>;

    /// Release an instance. Unknown instances are ignored.
    fn destroy(&self, instance: InstanceId);

    /// Capabilities of the channel behind `instance`; `None` if unknown.
    fn channel_caps(&self, instance: InstanceId) -> Option<ChannelCaps>;

    /// Hand one prepared frame to the consumer, waiting at most
    /// `options.timeout` for it to become ready.
    fn send_frame(
        &self,
        instance: InstanceId,
        frame: &PreparedFrame<'_>,
        options: &SendOptions,
    ) -> TransferOutcome;
}
