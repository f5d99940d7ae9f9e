//! In-process loopback implementation of the consumer boundary.
//!
//! Models what a virtual-camera driver does with shared memory: every channel
//! owns two frame slots guarded by one mutex + condvar, and at most one
//! consumer reads from them.
//!
//! # Slot discipline
//!
//! ```text
//! single buffering:  producer ─► slot 0 ─► consumer       (wait until slot 0 Free)
//! double buffering:  producer ─► slot n ─► consumer       (n alternates 0,1,0,1…
//!                                                          after each delivery)
//!
//! Free ──write──► Ready ──acquire──► Reading ──guard drop──► Free
//! ```
//!
//! The consumer always takes the oldest `Ready` slot, so frames come out in
//! the order they were produced and never more than two are buffered.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use capbridge_core::{
    ColorSpace, GraphicsBackend, MirrorMode, PixelFormat, ResizeMode, Resolution, TransferOutcome,
    DEFAULT_CHANNEL_COUNT,
};
use capbridge_transform::PreparedFrame;
use parking_lot::{Condvar, Mutex};
use tracing::{debug, info, trace};

use crate::{CaptureTransport, ChannelCaps, InstanceId, SendOptions, MAX_WAIT};

/// Deadline `timeout` from now, capped at [`MAX_WAIT`].
fn deadline_after(timeout: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(timeout.min(MAX_WAIT)).unwrap_or(now)
}

// ── Configuration ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct LoopbackConfig {
    pub channel_count: u32,
    pub max_resolution: Resolution,
    /// Backend frames must come from.
    pub backend: GraphicsBackend,
}

impl Default for LoopbackConfig {
    fn default() -> Self {
        Self {
            channel_count: DEFAULT_CHANNEL_COUNT,
            max_resolution: Resolution::UHD,
            backend: GraphicsBackend::Direct3D11,
        }
    }
}

// ── DeliveredFrame ────────────────────────────────────────────────────────────

/// A frame as the consumer sees it.
#[derive(Debug, Clone, PartialEq)]
pub struct DeliveredFrame {
    /// Delivery sequence number on this channel, starting at 1.
    pub seq: u64,
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    pub color_space: ColorSpace,
    pub resize: ResizeMode,
    pub mirror: MirrorMode,
    pub pixels: Bytes,
}

impl DeliveredFrame {
    pub fn resolution(&self) -> Resolution {
        Resolution::new(self.width, self.height)
    }

    /// Bytes of pixel `(x, y)`.
    pub fn pixel(&self, x: u32, y: u32) -> &[u8] {
        let bpp = self.format.bytes_per_pixel();
        let offset = (y as usize * self.width as usize + x as usize) * bpp;
        &self.pixels[offset..offset + bpp]
    }
}

// ── Shared channel state ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SlotState {
    Free,
    Ready,
    Reading,
}

#[derive(Debug)]
struct Slot {
    state: SlotState,
    frame: Option<DeliveredFrame>,
}

impl Slot {
    const fn empty() -> Self {
        Self { state: SlotState::Free, frame: None }
    }
}

#[derive(Debug, Clone, Copy)]
struct ConsumerInfo {
    id: u64,
    resolution: Resolution,
}

#[derive(Debug)]
struct ChannelState {
    consumer: Option<ConsumerInfo>,
    slots: [Slot; 2],
    /// Slot the next double-buffered write goes to.
    next_slot: usize,
    seq: u64,
}

impl ChannelState {
    fn new() -> Self {
        Self { consumer: None, slots: [Slot::empty(), Slot::empty()], next_slot: 0, seq: 0 }
    }

    fn oldest_ready(&self) -> Option<usize> {
        (0..self.slots.len())
            .filter(|&i| self.slots[i].state == SlotState::Ready)
            .min_by_key(|&i| self.slots[i].frame.as_ref().map_or(u64::MAX, |f| f.seq))
    }

    fn clear_slots(&mut self) {
        for slot in &mut self.slots {
            *slot = Slot::empty();
        }
        self.next_slot = 0;
    }
}

#[derive(Debug)]
struct ChannelShared {
    index: u32,
    state: Mutex<ChannelState>,
    cond: Condvar,
}

// ── LoopbackTransport ─────────────────────────────────────────────────────────

/// Loopback consumer boundary. Share it behind an `Arc` between the render
/// side (via [`DeviceHandle`](crate::DeviceHandle)) and consumer threads.
#[derive(Debug)]
pub struct LoopbackTransport {
    config: LoopbackConfig,
    channels: Vec<Arc<ChannelShared>>,
    instances: Mutex<HashMap<InstanceId, u32>>,
    next_id: AtomicU64,
    destroyed: AtomicU64,
}

impl LoopbackTransport {
    pub fn new(config: LoopbackConfig) -> Self {
        let channels = (0..config.channel_count)
            .map(|index| {
                Arc::new(ChannelShared {
                    index,
                    state: Mutex::new(ChannelState::new()),
                    cond: Condvar::new(),
                })
            })
            .collect();
        Self {
            config,
            channels,
            instances: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            destroyed: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> &LoopbackConfig {
        &self.config
    }

    /// Attach the consumer of `channel`, expecting frames of `resolution`.
    ///
    /// Returns `None` if the channel does not exist or already has a consumer.
    pub fn attach_consumer(&self, channel: u32, resolution: Resolution) -> Option<LoopbackConsumer> {
        let shared = self.channels.get(channel as usize)?.clone();
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        {
            let mut st = shared.state.lock();
            if st.consumer.is_some() {
                debug!("Channel[{}] already has a consumer", channel);
                return None;
            }
            st.consumer = Some(ConsumerInfo { id, resolution });
            st.clear_slots();
        }
        shared.cond.notify_all();
        info!("Channel[{}] consumer attached ({})", channel, resolution);
        Some(LoopbackConsumer { shared, id })
    }

    /// Instances created and not yet destroyed.
    pub fn open_instances(&self) -> usize {
        self.instances.lock().len()
    }

    /// Total successful `destroy` calls.
    pub fn destroyed_instances(&self) -> u64 {
        self.destroyed.load(Ordering::Relaxed)
    }

    fn channel_of(&self, instance: InstanceId) -> Option<&Arc<ChannelShared>> {
        let channel = *self.instances.lock().get(&instance)?;
        self.channels.get(channel as usize)
    }
}

impl CaptureTransport for LoopbackTransport {
    fn create(&self, channel: u32) -> Option<InstanceId> {
        if channel >= self.config.channel_count {
            return None;
        }
        let instance = InstanceId::new(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.instances.lock().insert(instance, channel);
        Some(instance)
    }

    fn destroy(&self, instance: InstanceId) {
        if self.instances.lock().remove(&instance).is_some() {
            self.destroyed.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn channel_caps(&self, instance: InstanceId) -> Option<ChannelCaps> {
        let shared = self.channel_of(instance)?;
        let negotiated = shared.state.lock().consumer.map(|c| c.resolution);
        Some(ChannelCaps {
            max_resolution: self.config.max_resolution,
            negotiated,
            backend: self.config.backend,
        })
    }

    fn send_frame(
        &self,
        instance: InstanceId,
        frame: &PreparedFrame<'_>,
        options: &SendOptions,
    ) -> TransferOutcome {
        let Some(shared) = self.channel_of(instance) else {
            return TransferOutcome::InvalidInstance;
        };
        let deadline = deadline_after(options.timeout);

        let mut st = shared.state.lock();
        let target = if options.double_buffering { st.next_slot } else { 0 };

        loop {
            if st.consumer.is_none() {
                return TransferOutcome::CaptureInactive;
            }
            if st.slots[target].state == SlotState::Free {
                break;
            }
            if shared.cond.wait_until(&mut st, deadline).timed_out() {
                if st.consumer.is_none() {
                    return TransferOutcome::CaptureInactive;
                }
                if st.slots[target].state != SlotState::Free {
                    trace!("Channel[{}] slot {} still busy after {:?}", shared.index, target, options.timeout);
                    return TransferOutcome::FrameSkip;
                }
                break;
            }
        }

        st.seq += 1;
        let seq = st.seq;
        st.slots[target] = Slot {
            state: SlotState::Ready,
            frame: Some(DeliveredFrame {
                seq,
                width: frame.width,
                height: frame.height,
                format: frame.format,
                color_space: frame.color_space,
                resize: options.resize,
                mirror: options.mirror,
                pixels: Bytes::copy_from_slice(&frame.pixels),
            }),
        };
        if options.double_buffering {
            st.next_slot = 1 - target;
        }
        drop(st);
        shared.cond.notify_all();

        trace!("Channel[{}] frame {} → slot {}", shared.index, seq, target);
        TransferOutcome::Success
    }
}

// ── LoopbackConsumer ──────────────────────────────────────────────────────────

/// Reading end of one channel. Detaches on drop.
#[derive(Debug)]
pub struct LoopbackConsumer {
    shared: Arc<ChannelShared>,
    id: u64,
}

impl LoopbackConsumer {
    pub fn channel(&self) -> u32 {
        self.shared.index
    }

    /// Wait up to `timeout` (at most [`MAX_WAIT`]) for the oldest ready frame
    /// and hold its slot until the returned guard is dropped.
    pub fn acquire(&self, timeout: Duration) -> Option<FrameGuard> {
        let deadline = deadline_after(timeout);
        let mut st = self.shared.state.lock();
        loop {
            let ready = st
                .oldest_ready()
                .and_then(|slot| st.slots[slot].frame.clone().map(|frame| (slot, frame)));
            if let Some((slot, frame)) = ready {
                st.slots[slot].state = SlotState::Reading;
                return Some(FrameGuard { shared: self.shared.clone(), consumer: self.id, slot, frame });
            }
            if self.shared.cond.wait_until(&mut st, deadline).timed_out() {
                return None;
            }
        }
    }

    /// Acquire and immediately release the next frame.
    pub fn receive(&self, timeout: Duration) -> Option<DeliveredFrame> {
        self.acquire(timeout).map(FrameGuard::into_frame)
    }

    /// Change the resolution this consumer expects from the next frame on.
    pub fn set_resolution(&self, resolution: Resolution) {
        let mut st = self.shared.state.lock();
        if let Some(consumer) = st.consumer.as_mut().filter(|c| c.id == self.id) {
            consumer.resolution = resolution;
        }
    }
}

impl Drop for LoopbackConsumer {
    fn drop(&mut self) {
        {
            let mut st = self.shared.state.lock();
            if st.consumer.is_some_and(|c| c.id == self.id) {
                st.consumer = None;
                st.clear_slots();
            }
        }
        self.shared.cond.notify_all();
        info!("Channel[{}] consumer detached", self.shared.index);
    }
}

// ── FrameGuard ────────────────────────────────────────────────────────────────

/// A slot held in the `Reading` state. The producer cannot write into it
/// until the guard is dropped.
#[derive(Debug)]
pub struct FrameGuard {
    shared: Arc<ChannelShared>,
    consumer: u64,
    slot: usize,
    frame: DeliveredFrame,
}

impl FrameGuard {
    pub fn frame(&self) -> &DeliveredFrame {
        &self.frame
    }

    pub fn into_frame(self) -> DeliveredFrame {
        self.frame.clone()
    }
}

impl Drop for FrameGuard {
    fn drop(&mut self) {
        {
            let mut st = self.shared.state.lock();
            let still_ours = st.consumer.is_some_and(|c| c.id == self.consumer);
            let slot = &mut st.slots[self.slot];
            if still_ours && slot.state == SlotState::Reading {
                *slot = Slot::empty();
            }
        }
        self.shared.cond.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use std::borrow::Cow;

    use super::*;

    fn prepared(value: u8) -> PreparedFrame<'static> {
        PreparedFrame {
            width: 1,
            height: 1,
            format: PixelFormat::Rgba8,
            color_space: ColorSpace::Gamma,
            pixels: Cow::Owned(vec![value; 4]),
        }
    }

    fn options(double_buffering: bool, timeout_ms: u64) -> SendOptions {
        SendOptions {
            timeout: Duration::from_millis(timeout_ms),
            double_buffering,
            resize: ResizeMode::Disabled,
            mirror: MirrorMode::Disabled,
        }
    }

    #[test]
    fn create_rejects_unknown_channels() {
        let t = LoopbackTransport::new(LoopbackConfig { channel_count: 2, ..Default::default() });
        assert!(t.create(1).is_some());
        assert!(t.create(2).is_none());
    }

    #[test]
    fn single_consumer_per_channel() {
        let t = LoopbackTransport::new(LoopbackConfig::default());
        let first = t.attach_consumer(0, Resolution::HD).expect("first consumer");
        assert!(t.attach_consumer(0, Resolution::HD).is_none());
        drop(first);
        assert!(t.attach_consumer(0, Resolution::HD).is_some());
    }

    #[test]
    fn caps_report_negotiated_size() {
        let t = LoopbackTransport::new(LoopbackConfig::default());
        let id = t.create(0).expect("instance");
        assert_eq!(t.channel_caps(id).expect("caps").negotiated, None);
        let consumer = t.attach_consumer(0, Resolution::HD).expect("consumer");
        assert_eq!(t.channel_caps(id).expect("caps").negotiated, Some(Resolution::HD));
        consumer.set_resolution(Resolution::FHD);
        assert_eq!(t.channel_caps(id).expect("caps").negotiated, Some(Resolution::FHD));
    }

    #[test]
    fn single_buffer_waits_for_consumption() {
        let t = LoopbackTransport::new(LoopbackConfig::default());
        let id = t.create(0).expect("instance");
        let consumer = t.attach_consumer(0, Resolution::HD).expect("consumer");

        assert_eq!(t.send_frame(id, &prepared(1), &options(false, 0)), TransferOutcome::Success);
        assert_eq!(t.send_frame(id, &prepared(2), &options(false, 0)), TransferOutcome::FrameSkip);

        let frame = consumer.receive(Duration::ZERO).expect("frame 1");
        assert_eq!(frame.pixels.as_ref(), &[1, 1, 1, 1]);
        assert_eq!(t.send_frame(id, &prepared(3), &options(false, 0)), TransferOutcome::Success);
        assert_eq!(consumer.receive(Duration::ZERO).expect("frame 3").seq, 2);
    }

    #[test]
    fn double_buffer_keeps_order_and_holds_two_frames() {
        let t = LoopbackTransport::new(LoopbackConfig::default());
        let id = t.create(0).expect("instance");
        let consumer = t.attach_consumer(0, Resolution::HD).expect("consumer");

        assert_eq!(t.send_frame(id, &prepared(1), &options(true, 0)), TransferOutcome::Success);
        assert_eq!(t.send_frame(id, &prepared(2), &options(true, 0)), TransferOutcome::Success);
        assert_eq!(t.send_frame(id, &prepared(3), &options(true, 0)), TransferOutcome::FrameSkip);

        let a = consumer.receive(Duration::ZERO).expect("first");
        let b = consumer.receive(Duration::ZERO).expect("second");
        assert_eq!((a.pixels[0], b.pixels[0]), (1, 2));
        assert!(consumer.receive(Duration::ZERO).is_none());
    }

    #[test]
    fn held_slot_blocks_single_but_not_double_buffering() {
        let t = LoopbackTransport::new(LoopbackConfig::default());
        let id = t.create(0).expect("instance");
        let consumer = t.attach_consumer(0, Resolution::HD).expect("consumer");

        assert_eq!(t.send_frame(id, &prepared(1), &options(true, 0)), TransferOutcome::Success);
        let guard = consumer.acquire(Duration::ZERO).expect("reading slot 0");
        assert_eq!(guard.frame().seq, 1);

        assert_eq!(t.send_frame(id, &prepared(2), &options(false, 0)), TransferOutcome::FrameSkip);
        assert_eq!(t.send_frame(id, &prepared(2), &options(true, 0)), TransferOutcome::Success);
        drop(guard);
        assert_eq!(consumer.receive(Duration::ZERO).expect("second").pixels[0], 2);
    }

    #[test]
    fn detaching_consumer_makes_channel_inactive() {
        let t = LoopbackTransport::new(LoopbackConfig::default());
        let id = t.create(0).expect("instance");
        let consumer = t.attach_consumer(0, Resolution::HD).expect("consumer");
        assert_eq!(t.send_frame(id, &prepared(1), &options(false, 0)), TransferOutcome::Success);
        drop(consumer);
        assert_eq!(t.send_frame(id, &prepared(2), &options(false, 0)), TransferOutcome::CaptureInactive);
    }

    #[test]
    fn unbounded_timeouts_do_not_overflow() {
        let t = LoopbackTransport::new(LoopbackConfig::default());
        let id = t.create(0).expect("instance");
        let unbounded = SendOptions { timeout: Duration::MAX, ..options(false, 0) };
        assert_eq!(t.send_frame(id, &prepared(1), &unbounded), TransferOutcome::CaptureInactive);

        let consumer = t.attach_consumer(0, Resolution::HD).expect("consumer");
        assert_eq!(t.send_frame(id, &prepared(2), &unbounded), TransferOutcome::Success);
        assert_eq!(consumer.receive(Duration::MAX).expect("frame").pixels[0], 2);
    }

    #[test]
    fn deadline_is_capped() {
        let before = Instant::now();
        let deadline = deadline_after(Duration::MAX);
        assert!(deadline <= Instant::now() + MAX_WAIT);
        assert!(deadline >= before);
    }

    #[test]
    fn destroyed_instance_is_invalid() {
        let t = LoopbackTransport::new(LoopbackConfig::default());
        let id = t.create(0).expect("instance");
        t.destroy(id);
        t.destroy(id);
        assert_eq!(t.destroyed_instances(), 1);
        assert_eq!(t.send_frame(id, &prepared(1), &options(false, 0)), TransferOutcome::InvalidInstance);
    }
}
