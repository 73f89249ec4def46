// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (c) 2021 Takashi Sakamoto

use super::*;

/// The number of recent frame durations to estimate real frame rate of LTC input.
pub const LTC_DURATION_WINDOW: usize = 16;

/// The pull factor at nominal speed.
pub const NOMINAL_PULL_FACTOR: u16 = 1000;

/// Phase of tracking LTC input.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum LtcInputPhase {
    /// No boundary of time code frame arrives yet.
    Idle,
    Tracking,
}

impl Default for LtcInputPhase {
    fn default() -> Self {
        Self::Idle
    }
}

/// Tracker of LTC input. The boundaries of time code frame are notified by MTC messages, while
/// the time code and the offset are read at audio period interrupt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LtcInputTracker {
    phase: LtcInputPhase,
    time_code: TimeCode,
    start_sample: u64,
    pull_factor: u16,
    durations: [u64; LTC_DURATION_WINDOW],
    duration_sum: u64,
    duration_count: u64,
    prev_arrival: Option<u64>,
    changed: bool,
}

impl Default for LtcInputTracker {
    fn default() -> Self {
        Self {
            phase: Default::default(),
            time_code: Default::default(),
            start_sample: 0,
            pull_factor: NOMINAL_PULL_FACTOR,
            durations: [0; LTC_DURATION_WINDOW],
            duration_sum: 0,
            duration_count: 0,
            prev_arrival: None,
            changed: false,
        }
    }
}

impl LtcInputTracker {
    pub fn phase(&self) -> LtcInputPhase {
        self.phase
    }

    /// The time code at the last audio period interrupt.
    pub fn time_code(&self) -> TimeCode {
        self.time_code
    }

    /// The absolute frame at which the time code started.
    pub fn start_sample(&self) -> u64 {
        self.start_sample
    }

    /// Real speed of LTC input against nominal speed, per mille.
    pub fn pull_factor(&self) -> u16 {
        self.pull_factor
    }

    /// Whether any boundary of frame arrives since the last audio period interrupt.
    pub fn is_changed(&self) -> bool {
        self.changed
    }

    /// Record the boundary of time code frame, with the real time in nanoseconds.
    pub fn on_frame_boundary_detected(&mut self, now_ns: u64) {
        if let Some(prev) = self.prev_arrival {
            let pos = (self.duration_count % LTC_DURATION_WINDOW as u64) as usize;
            let duration = now_ns.saturating_sub(prev);
            self.duration_sum -= self.durations[pos];
            self.durations[pos] = duration;
            self.duration_sum += duration;
            self.duration_count += 1;
        }
        self.prev_arrival = Some(now_ns);
        self.changed = true;
        self.phase = LtcInputPhase::Tracking;
    }

    /// Estimate pull factor from average duration of recent frames.
    pub fn estimate_pull_factor(&self, fps: u32) -> u16 {
        let count = self.duration_count.min(LTC_DURATION_WINDOW as u64);
        if count == 0 || fps == 0 {
            return NOMINAL_PULL_FACTOR;
        }

        let avg_us = self.duration_sum / count / 1000;
        if avg_us == 0 {
            return NOMINAL_PULL_FACTOR;
        }

        let fps = fps as u64;
        let real_fps_1k = 1_000_000_000 / avg_us;
        let pull_factor = (real_fps_1k + fps / 2) / fps;
        pull_factor.min(u16::MAX as u64) as u16
    }

    /// Publish the time code of LTC input at audio period interrupt, if any boundary of frame
    /// arrived.
    pub fn on_period_elapsed<R: HdspeRegisterIo>(
        &mut self,
        io: &R,
        frame_count: u64,
        speed_factor: u32,
        changed: &mut ChangedControls,
    ) {
        if !self.changed {
            return;
        }

        let (tc, fields) = HdspeTcoProtocol::read_ltc(io);
        let fps = fields.ltc_rate.fps();

        // The offset in register is counted at single speed.
        let offset = fields.ltc_offset as u64 * speed_factor as u64;

        // The time code in register is for the frame before the interrupt, as long as running
        // forward.
        self.time_code = tc.increment(fps, fields.ltc_drop_frame);
        self.start_sample = frame_count.saturating_sub(offset);
        self.changed = false;
        changed.insert(ControlId::LtcIn);

        let pull_factor = self.estimate_pull_factor(fps);
        if pull_factor != self.pull_factor {
            self.pull_factor = pull_factor;
            changed.insert(ControlId::LtcInPullFactor);
        }

        debug!(
            time_code = %self.time_code,
            start_sample = self.start_sample,
            pull_factor = self.pull_factor,
        );
    }
}

#[cfg(test)]
mod test {
    use {super::*, crate::sim::*};

    fn feed(tracker: &mut LtcInputTracker, start_ns: u64, duration_ns: u64, count: usize) -> u64 {
        let mut now = start_ns;
        (0..count).for_each(|_| {
            now += duration_ns;
            tracker.on_frame_boundary_detected(now);
        });
        now
    }

    #[test]
    fn pull_factor_empty_history() {
        let tracker = LtcInputTracker::default();
        assert_eq!(tracker.phase(), LtcInputPhase::Idle);
        [24, 25, 30].iter().for_each(|&fps| {
            assert_eq!(tracker.estimate_pull_factor(fps), NOMINAL_PULL_FACTOR);
        });

        // The first arrival gives no duration.
        let mut tracker = LtcInputTracker::default();
        tracker.on_frame_boundary_detected(1_000_000_000);
        assert_eq!(tracker.phase(), LtcInputPhase::Tracking);
        assert_eq!(tracker.estimate_pull_factor(25), NOMINAL_PULL_FACTOR);
    }

    #[test]
    fn pull_factor_nominal() {
        [24, 25, 30].iter().for_each(|&fps| {
            let mut tracker = LtcInputTracker::default();
            let duration = 1_000_000_000 / fps as u64;
            feed(&mut tracker, 5_000_000_000, duration, LTC_DURATION_WINDOW * 2);
            assert_eq!(tracker.estimate_pull_factor(fps), 1000, "fps {}", fps);
        });

        // A few durations are enough.
        let mut tracker = LtcInputTracker::default();
        feed(&mut tracker, 0, 40_000_000, 4);
        assert_eq!(tracker.estimate_pull_factor(25), 1000);
    }

    #[test]
    fn pull_factor_ntsc() {
        [24, 25, 30].iter().for_each(|&fps| {
            let mut tracker = LtcInputTracker::default();
            // 0.1% longer.
            let duration = 1_001_000_000 / fps as u64;
            feed(&mut tracker, 5_000_000_000, duration, LTC_DURATION_WINDOW * 2);
            assert_eq!(tracker.estimate_pull_factor(fps), 999, "fps {}", fps);
        });
    }

    #[test]
    fn pull_factor_follows_recent_durations() {
        let mut tracker = LtcInputTracker::default();
        let now = feed(&mut tracker, 0, 41_000_000, LTC_DURATION_WINDOW);
        assert_eq!(tracker.estimate_pull_factor(25), 976);

        // The window is filled by new durations.
        feed(&mut tracker, now, 40_000_000, LTC_DURATION_WINDOW);
        assert_eq!(tracker.estimate_pull_factor(25), 1000);
    }

    #[test]
    fn publish_at_period() {
        let sim = SimulatedHdspe::new(IoType::Aio, true);
        sim.set_ltc_input(
            TimeCode::compose(1, 0, 59, 29),
            LtcFrameRate::Fps30,
            true,
            100,
        );

        let mut tracker = LtcInputTracker::default();
        let mut changed = ChangedControls::default();

        // Nothing to do without any boundary.
        tracker.on_period_elapsed(&sim, 10000, 1, &mut changed);
        assert_eq!(changed, ChangedControls::default());
        assert_eq!(tracker.time_code(), TimeCode::default());

        tracker.on_frame_boundary_detected(1_000_000_000);
        tracker.on_period_elapsed(&sim, 10000, 2, &mut changed);
        assert_eq!(tracker.time_code(), TimeCode::compose(1, 1, 0, 2));
        assert_eq!(tracker.start_sample(), 9800);
        assert!(changed.contains(ControlId::LtcIn));
        assert!(!changed.contains(ControlId::LtcInPullFactor));
        assert!(!tracker.is_changed());

        let mut changed = ChangedControls::default();
        tracker.on_period_elapsed(&sim, 10032, 2, &mut changed);
        assert_eq!(changed, ChangedControls::default());
    }

    #[test]
    fn publish_pull_factor_change() {
        let sim = SimulatedHdspe::new(IoType::Madi, true);
        sim.set_ltc_input(TimeCode::compose(0, 0, 0, 0), LtcFrameRate::Fps25, false, 0);

        let mut tracker = LtcInputTracker::default();
        feed(&mut tracker, 0, 40_040_000, 3);

        let mut changed = ChangedControls::default();
        tracker.on_period_elapsed(&sim, 4096, 1, &mut changed);
        assert_eq!(tracker.pull_factor(), 999);
        assert!(changed.contains(ControlId::LtcInPullFactor));
    }
}
