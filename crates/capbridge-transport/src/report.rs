//! Status reporter: turns transfer outcomes into log lines and counters.
//!
//! | Severity | Outcomes | Surfaced |
//! |----------|----------|----------|
//! | silent   | `Success` | never |
//! | warning  | `FrameSkip`, `CaptureInactive` | unless `hide_warnings` |
//! | error    | the six error kinds | always |
//!
//! Reporting never changes what the renderer does next.

use capbridge_core::{Severity, TransferOutcome};
use tracing::{error, warn};

// ── TransferStats ─────────────────────────────────────────────────────────────

/// Running outcome counters for one capture session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransferStats {
    pub frames: u64,
    pub delivered: u64,
    pub skipped: u64,
    pub inactive: u64,
    pub errors: u64,
    pub last_outcome: Option<TransferOutcome>,
}

impl TransferStats {
    pub fn record(&mut self, outcome: TransferOutcome) {
        self.frames += 1;
        match outcome {
            TransferOutcome::Success => self.delivered += 1,
            TransferOutcome::FrameSkip => self.skipped += 1,
            TransferOutcome::CaptureInactive => self.inactive += 1,
            _ => self.errors += 1,
        }
        self.last_outcome = Some(outcome);
    }

    /// Fraction of frames that reached the consumer.
    pub fn delivery_ratio(&self) -> f64 {
        if self.frames == 0 {
            return 0.0;
        }
        self.delivered as f64 / self.frames as f64
    }
}

// ── StatusReporter ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct StatusReporter {
    hide_warnings: bool,
    stats: TransferStats,
}

impl StatusReporter {
    pub fn new(hide_warnings: bool) -> Self {
        Self { hide_warnings, stats: TransferStats::default() }
    }

    pub fn set_hide_warnings(&mut self, hide: bool) {
        self.hide_warnings = hide;
    }

    /// Record `outcome` and log it according to its severity.
    ///
    /// Returns `true` if a message was emitted.
    pub fn report(&mut self, outcome: TransferOutcome) -> bool {
        self.stats.record(outcome);
        match outcome.severity() {
            Severity::Silent => false,
            Severity::Warning if self.hide_warnings => false,
            Severity::Warning => {
                warn!("[CapBridge] {}", outcome.message());
                true
            }
            Severity::Error => {
                error!("[CapBridge] {} (code {})", outcome.message(), outcome.code());
                true
            }
        }
    }

    pub fn stats(&self) -> &TransferStats {
        &self.stats
    }

    pub fn reset_stats(&mut self) {
        self.stats = TransferStats::default();
    }
}
