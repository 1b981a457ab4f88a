use crate::room::RoomState;
use crate::time::EpochMs;

pub const MINUTES_PER_DAY: f64 = 24.0 * 60.0;

/// Virtual in-game clock derived from a shared real-time anchor.
///
/// Every peer computes the same reading from the replicated anchor keys
/// (`clockAnchorMs`, `clockAnchorMinutes`, `clockScale`) and its own wall
/// clock, so nothing is sent per tick. Drift between peers is bounded by
/// their wall-clock skew.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GameClock {
    pub anchor_ms: EpochMs,
    /// Total game minutes elapsed at `anchor_ms` (day 0 starts at minute 0).
    pub anchor_minutes: f64,
    /// Game seconds per real second.
    pub scale: f64,
}

impl GameClock {
    pub fn new(anchor_ms: EpochMs, anchor_minutes: f64, scale: f64) -> Self {
        Self {
            anchor_ms,
            anchor_minutes,
            scale,
        }
    }

    pub fn from_room(room: &RoomState) -> Self {
        Self::new(
            room.clock_anchor_ms,
            room.clock_anchor_minutes,
            room.clock_scale,
        )
    }

    /// Total game minutes at `now`.
    pub fn total_minutes(&self, now: EpochMs) -> f64 {
        let elapsed_ms = now as f64 - self.anchor_ms as f64;
        self.anchor_minutes + elapsed_ms / 1000.0 * self.scale / 60.0
    }

    /// Zero-based in-game day index.
    pub fn day_index(&self, now: EpochMs) -> u64 {
        (self.total_minutes(now) / MINUTES_PER_DAY).floor().max(0.0) as u64
    }

    /// Minutes after midnight, in `[0, 1440)`.
    pub fn minute_of_day(&self, now: EpochMs) -> f64 {
        self.total_minutes(now).rem_euclid(MINUTES_PER_DAY)
    }

    /// `(hours, minutes)` for display.
    pub fn hh_mm(&self, now: EpochMs) -> (u32, u32) {
        let m = self.minute_of_day(now).floor() as u32;
        (m / 60, m % 60)
    }

    /// Real milliseconds until the clock next reads `minute`.
    /// `None` when the clock is stopped.
    pub fn ms_until_minute(&self, now: EpochMs, minute: f64) -> Option<u64> {
        if self.scale <= 0.0 {
            return None;
        }
        let ahead = (minute - self.minute_of_day(now)).rem_euclid(MINUTES_PER_DAY);
        let real_ms = ahead * 60.0 / self.scale * 1000.0;
        Some(real_ms.ceil() as u64)
    }

    /// Whether the current minute of day lies in `[start, end)`, wrapping
    /// past midnight when `end < start`.
    pub fn within(&self, now: EpochMs, start: f64, end: f64) -> bool {
        let m = self.minute_of_day(now);
        if start <= end {
            m >= start && m < end
        } else {
            m >= start || m < end
        }
    }
}
