// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (c) 2021 Takashi Sakamoto

use super::*;

/// The target of request to start LTC output immediately.
pub const LTC_OUT_NOW: i64 = -1;

const NANOS_PER_SEC: u64 = 1_000_000_000;
const SECS_PER_DAY: i64 = 24 * 60 * 60;

/// Request to start LTC output.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct LtcOutRequest {
    /// The time code to start. [`TimeCode::WALL_CLOCK`] means time of real time clock.
    pub time_code: TimeCode,
    /// The absolute frame at which the time code starts, or [`LTC_OUT_NOW`]. For the time code
    /// of real time clock, the offset in seconds against UTC instead.
    pub target: i64,
}

/// Parameters to schedule LTC output at audio period interrupt.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct LtcScheduleParams {
    /// The absolute frame at the interrupt.
    pub current_sample: u64,
    pub period_size: u32,
    pub speed_factor: u32,
    pub base_rate: TcoBaseRate,
    pub ltc_rate: LtcFrameRate,
    pub drop_frame: bool,
    /// The real time in nanoseconds since the epoch.
    pub now_ns: u64,
}

/// The result of scheduling. Any position is counted at single speed.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ScheduledLtc {
    /// The time code adjusted to the start frame.
    pub time_code: TimeCode,
    /// The frame at which the time code starts.
    pub start_sample: i64,
    /// The number of time code frames added to the requested one.
    pub compensated_frames: i64,
    /// The number of frames for hardware to wait after the next interrupt.
    pub offset: i64,
}

fn wall_clock_time_code(now_ns: u64, utc_offset: i64) -> TimeCode {
    let secs = (now_ns / NANOS_PER_SEC) as i64 + utc_offset;
    let tod = secs.rem_euclid(SECS_PER_DAY);
    TimeCode::compose(
        (tod / 3600) as u8,
        ((tod / 60) % 60) as u8,
        (tod % 60) as u8,
        0,
    )
}

/// Compute the time code and offset to start LTC output. Hardware picks them up at the next
/// audio period interrupt, thus the start frame is moved by whole time code frames into the
/// range from two periods after the current frame, within one time code frame.
pub fn schedule_ltc(request: &LtcOutRequest, params: &LtcScheduleParams) -> ScheduledLtc {
    let speed = params.speed_factor.max(1) as i64;
    let fps = params.ltc_rate.fps();
    let scale = params.ltc_rate.scale();
    let sample_rate = params.base_rate.hz() as i64;

    let current = params.current_sample as i64 / speed;
    let period = params.period_size as i64 / speed;
    let frame_size = sample_rate * 1000 / (fps * scale) as i64;

    let (time_code, start_sample) = if request.time_code.is_wall_clock() {
        let subsec = (params.now_ns % NANOS_PER_SEC) as i64;
        let tc = wall_clock_time_code(params.now_ns, request.target);
        (tc, current - subsec / (NANOS_PER_SEC as i64 / sample_rate))
    } else if request.target < 0 {
        (request.time_code, current)
    } else {
        (request.time_code, request.target / speed)
    };

    let lower = current + 2 * period;
    let compensated_frames = if start_sample >= lower + frame_size {
        -((start_sample - lower) / frame_size)
    } else if start_sample < lower {
        (lower - start_sample + frame_size - 1) / frame_size
    } else {
        0
    };
    let start_sample = start_sample + compensated_frames * frame_size;

    // The time code is the same after a whole day.
    let day = frames_per_day(fps, params.drop_frame);
    let mut frames = compensated_frames.rem_euclid(day);
    if frames > day / 2 {
        frames -= day;
    }
    let time_code = time_code.add_frames(frames as i32, fps, params.drop_frame);

    let latency = HdspeTcoProtocol::ltc_startup_latency(params.ltc_rate, params.base_rate);
    let offset = start_sample - (current + period) - latency as i64;

    ScheduledLtc {
        time_code,
        start_sample,
        compensated_frames,
        offset,
    }
}

/// Scheduler of LTC output. The request is written to registers at audio period interrupt,
/// then cleared at the next interrupt after hardware picked it up.
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct LtcOutputScheduler {
    pending: Option<LtcOutRequest>,
    armed: bool,
    last_scheduled: Option<ScheduledLtc>,
}

impl LtcOutputScheduler {
    /// Queue the request, replacing the previous one if not consumed yet. [`TimeCode::NONE`]
    /// cancels it.
    pub fn request(&mut self, request: LtcOutRequest) {
        if request.time_code.is_none() {
            self.pending = None;
        } else {
            self.pending = Some(request);
        }
        debug!(pending = ?self.pending);
    }

    pub fn pending(&self) -> Option<LtcOutRequest> {
        self.pending
    }

    /// Whether the request is written and waits for the next interrupt.
    pub fn is_armed(&self) -> bool {
        self.armed
    }

    pub fn last_scheduled(&self) -> Option<ScheduledLtc> {
        self.last_scheduled
    }

    pub fn on_period_elapsed<R: HdspeRegisterIo>(
        &mut self,
        io: &mut R,
        regs: &mut [u32; TCO_QUADLET_COUNT],
        config: &mut TcoConfig,
        params: &LtcScheduleParams,
        changed: &mut ChangedControls,
    ) {
        if self.armed {
            // Hardware picked up the time code at this interrupt.
            HdspeTcoProtocol::reset_timecode(io, regs[1]);
            self.armed = false;
            debug!("LTC output set request is cleared");
        }

        if let Some(request) = self.pending.take() {
            let scheduled = schedule_ltc(&request, params);
            debug!(
                time_code = %scheduled.time_code,
                start_sample = scheduled.start_sample,
                compensated_frames = scheduled.compensated_frames,
                offset = scheduled.offset,
            );

            if scheduled.offset < 0 || scheduled.offset > TCO_OFFSET_MAX as i64 {
                warn!(
                    offset = scheduled.offset,
                    "LTC output offset out of range 0..={}", TCO_OFFSET_MAX
                );
            }

            HdspeTcoProtocol::write_timecode(io, scheduled.time_code, scheduled.offset as i32, regs[1]);
            self.armed = true;

            HdspeTcoProtocol::write_ltc_run(io, true, &mut regs[2]);
            config.ltc_run = true;
            changed.insert(ControlId::LtcRun);

            self.last_scheduled = Some(scheduled);
        }
    }

    /// Stop running time code, and discard any request.
    pub fn terminate<R: HdspeRegisterIo>(
        &mut self,
        io: &mut R,
        regs: &mut [u32; TCO_QUADLET_COUNT],
        config: &mut TcoConfig,
    ) {
        HdspeTcoProtocol::write_ltc_run(io, false, &mut regs[2]);
        config.ltc_run = false;
        HdspeTcoProtocol::reset_timecode(io, regs[1]);
        self.armed = false;
        self.pending = None;
    }
}
