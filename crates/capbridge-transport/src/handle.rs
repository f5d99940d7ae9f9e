//! Device handle: owns one acquired capture channel.
//!
//! ```text
//! Unopened ──open ok──► Open(channel) ──close / drop──► Closed
//!    │                                                   ▲
//!    └──────────────────close / drop─────────────────────┘
//! ```
//!
//! `Closed` is terminal. Selecting another channel means closing this handle
//! and opening a new one.

use std::sync::Arc;

use capbridge_core::{CaptureDevice, FrameDescriptor, TransferConfig, TransferOutcome};
use tracing::{debug, info, warn};

use crate::{transfer, CaptureTransport, InstanceId};

// ── State ─────────────────────────────────────────────────────────────────────

/// Why a handle never reached `Open`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenFailure {
    /// The "closed" sentinel was selected; nothing was acquired.
    NoChannelSelected,
    /// The transport refused the channel (out of range, driver missing, ...).
    AcquisitionFailed { channel: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleState {
    Unopened(OpenFailure),
    Open { channel: u32 },
    Closed,
}

// ── DeviceHandle ──────────────────────────────────────────────────────────────

/// Scoped owner of one transport instance. Released exactly once, on
/// [`close`](Self::close) or on drop, whichever comes first.
///
/// Not meant for concurrent use: keep it on the render thread.
pub struct DeviceHandle {
    transport: Arc<dyn CaptureTransport>,
    instance: Option<InstanceId>,
    state: HandleState,
}

impl DeviceHandle {
    /// Acquire `device` from `transport`.
    ///
    /// Never fails outright: if the channel cannot be acquired the handle is
    /// left `Unopened` and every send reports `InvalidInstance`.
    pub fn open(transport: Arc<dyn CaptureTransport>, device: CaptureDevice) -> Self {
        let Some(channel) = device.index() else {
            debug!("DeviceHandle::open: no channel selected");
            return Self {
                transport,
                instance: None,
                state: HandleState::Unopened(OpenFailure::NoChannelSelected),
            };
        };

        match transport.create(channel) {
            Some(instance) => {
                info!("Channel[{}] opened (instance {})", channel, instance.get());
                Self { transport, instance: Some(instance), state: HandleState::Open { channel } }
            }
            None => {
                warn!("Channel[{}] could not be acquired", channel);
                Self {
                    transport,
                    instance: None,
                    state: HandleState::Unopened(OpenFailure::AcquisitionFailed { channel }),
                }
            }
        }
    }

    /// Release the channel. Safe to call any number of times.
    pub fn close(&mut self) {
        if let Some(instance) = self.instance.take() {
            self.transport.destroy(instance);
            if let HandleState::Open { channel } = self.state {
                info!("Channel[{}] closed", channel);
            }
        }
        self.state = HandleState::Closed;
    }

    /// Transfer one frame through this handle.
    pub fn send(&self, frame: &FrameDescriptor<'_>, config: &TransferConfig) -> TransferOutcome {
        transfer::send_frame(self, frame, config)
    }

    pub fn state(&self) -> HandleState {
        self.state
    }

    pub fn is_open(&self) -> bool {
        matches!(self.state, HandleState::Open { .. })
    }

    pub fn channel(&self) -> Option<u32> {
        match self.state {
            HandleState::Open { channel } => Some(channel),
            _ => None,
        }
    }

    pub(crate) fn instance(&self) -> Option<InstanceId> {
        self.instance
    }

    pub(crate) fn transport(&self) -> &dyn CaptureTransport {
        self.transport.as_ref()
    }
}

impl Drop for DeviceHandle {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for DeviceHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceHandle")
            .field("instance", &self.instance)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{LoopbackConfig, LoopbackTransport};

    fn transport() -> Arc<LoopbackTransport> {
        Arc::new(LoopbackTransport::new(LoopbackConfig::default()))
    }

    #[test]
    fn open_valid_channel() {
        let t = transport();
        let handle = DeviceHandle::open(t.clone(), CaptureDevice::Index(3));
        assert_eq!(handle.state(), HandleState::Open { channel: 3 });
        assert_eq!(handle.channel(), Some(3));
        assert_eq!(t.open_instances(), 1);
    }

    #[test]
    fn sentinel_never_touches_transport() {
        let t = transport();
        let handle = DeviceHandle::open(t.clone(), CaptureDevice::Closed);
        assert_eq!(handle.state(), HandleState::Unopened(OpenFailure::NoChannelSelected));
        assert_eq!(t.open_instances(), 0);
    }

    #[test]
    fn out_of_range_channel_is_unopened() {
        let handle = DeviceHandle::open(transport(), CaptureDevice::Index(42));
        assert_eq!(
            handle.state(),
            HandleState::Unopened(OpenFailure::AcquisitionFailed { channel: 42 })
        );
        assert!(!handle.is_open());
    }

    #[test]
    fn close_is_idempotent_and_releases_once() {
        let t = transport();
        let mut handle = DeviceHandle::open(t.clone(), CaptureDevice::Index(0));
        handle.close();
        handle.close();
        assert_eq!(handle.state(), HandleState::Closed);
        assert_eq!(t.open_instances(), 0);
        assert_eq!(t.destroyed_instances(), 1);

        let mut never = DeviceHandle::open(t.clone(), CaptureDevice::Closed);
        never.close();
        assert_eq!(never.state(), HandleState::Closed);
        assert_eq!(t.destroyed_instances(), 1);
    }

    #[test]
    fn drop_releases_instance() {
        let t = transport();
        {
            let _handle = DeviceHandle::open(t.clone(), CaptureDevice::Index(1));
            assert_eq!(t.open_instances(), 1);
        }
        assert_eq!(t.open_instances(), 0);
        assert_eq!(t.destroyed_instances(), 1);
    }
}
