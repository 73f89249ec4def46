// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (c) 2021 Takashi Sakamoto

use super::*;

const SYNC_SOURCES: [TcoSyncSource; 3] = [
    TcoSyncSource::WordClock,
    TcoSyncSource::Video,
    TcoSyncSource::Ltc,
];

const PULLS: [TcoPull; 5] = [
    TcoPull::None,
    TcoPull::Up,
    TcoPull::Down,
    TcoPull::UpFour,
    TcoPull::DownFour,
];

const WCK_CONVERSIONS: [WordClockConversion; 3] = [
    WordClockConversion::Identical,
    WordClockConversion::From441To480,
    WordClockConversion::From480To441,
];

const WCK_OUT_SPEEDS: [WordClockSpeed; 3] = [
    WordClockSpeed::Single,
    WordClockSpeed::Double,
    WordClockSpeed::Quadruple,
];

/// The number of entries for sample rate; 44.1 kHz, 48.0 kHz, and from application.
pub const TCO_SAMPLE_RATE_COUNT: usize = 3;

/// Parameter of TCO module to be configured. The index is for the list of enumerated items.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum TcoParam {
    SyncSource(usize),
    /// The index of [`LtcFormat::ALL`].
    LtcFormat(usize),
    SampleRate(usize),
    Pull(usize),
    WordClockConversion(usize),
    Term75r(bool),
    WordClockOutSpeed(usize),
    LtcRun(bool),
    LtcFlywheel(bool),
}

fn select<T: Copy>(entries: &[T], index: usize, label: &str) -> Result<T, Error> {
    entries.get(index).copied().ok_or_else(|| {
        let msg = format!(
            "Invalid index {} for {}, should be less than {}",
            index,
            label,
            entries.len()
        );
        warn!("{}", msg);
        Error::new(ErrorKind::Inval, &msg)
    })
}

/// Registers and configuration saved at suspend.
#[derive(Default, Debug, Copy, Clone, PartialEq, Eq)]
pub struct TcoSavedState {
    pub config: TcoConfig,
    pub regs: [u32; TCO_QUADLET_COUNT],
}

/// Snapshot of TCO module.
#[derive(Default, Debug, Copy, Clone, PartialEq, Eq)]
pub struct TcoSnapshot {
    pub config: TcoConfig,
    /// The status at the last poll.
    pub status: TcoStatus,
    pub ltc_in: TimeCode,
    pub ltc_in_start_sample: u64,
    pub ltc_in_pull_factor: u16,
    pub ltc_out_pending: Option<LtcOutRequest>,
    /// Whether the request of LTC output is written and waits for hardware.
    pub ltc_set: bool,
    pub ltc_out_last: Option<ScheduledLtc>,
    /// The absolute frame at the last audio period interrupt.
    pub ltc_time: u64,
}

/// State of TCO module.
#[derive(Debug)]
pub struct TcoState {
    config: TcoConfig,
    regs: [u32; TCO_QUADLET_COUNT],
    status: TcoStatus,
    input: LtcInputTracker,
    output: LtcOutputScheduler,
    ltc_time: u64,
}

impl TcoState {
    /// Write initial settings, then read status including firmware version.
    pub fn new<R: HdspeRegisterIo>(io: &mut R) -> Self {
        let mut state = Self {
            config: Default::default(),
            regs: Default::default(),
            status: Default::default(),
            input: Default::default(),
            output: Default::default(),
            ltc_time: 0,
        };

        state.write_config(io);
        HdspeTcoProtocol::cache_wholly(io, &mut state.status);
        info!(fw_version = state.status.fw_version, "TCO module is detected");

        state
    }

    pub fn config(&self) -> &TcoConfig {
        &self.config
    }

    pub fn status(&self) -> &TcoStatus {
        &self.status
    }

    pub fn input(&self) -> &LtcInputTracker {
        &self.input
    }

    pub fn output(&self) -> &LtcOutputScheduler {
        &self.output
    }

    pub fn ltc_time(&self) -> u64 {
        self.ltc_time
    }

    fn write_config<R: HdspeRegisterIo>(&mut self, io: &mut R) {
        let raw = HdspeTcoProtocol::update_wholly(io, &self.config);
        self.regs.copy_from_slice(&raw);
        debug!(config = ?self.config, regs = ?self.regs);
    }

    /// Write the whole configuration if it differs from the current one.
    pub fn update_config<R: HdspeRegisterIo>(&mut self, io: &mut R, config: TcoConfig) -> bool {
        if config == self.config {
            false
        } else {
            self.config = config;
            self.write_config(io);
            true
        }
    }

    /// Apply the parameter after checking range. The base frequency of card is used for the
    /// sample rate from application.
    pub fn set_param<R: HdspeRegisterIo>(
        &mut self,
        io: &mut R,
        param: TcoParam,
        card_base: ClkBaseFreq,
    ) -> Result<bool, Error> {
        let mut config = self.config;

        match param {
            TcoParam::SyncSource(index) => {
                config.sync_source = select(&SYNC_SOURCES, index, "sync source")?;
            }
            TcoParam::LtcFormat(index) => {
                let format = select(&LtcFormat::ALL, index, "LTC format")?;
                let (rate, drop_frame) = format.parts();
                config.ltc_rate = rate;
                config.ltc_drop_frame = drop_frame;
            }
            TcoParam::SampleRate(index) => {
                let base = TcoBaseRate::from_card(card_base);
                let rates = [
                    TcoSampleRate::R44100,
                    TcoSampleRate::R48000,
                    TcoSampleRate::FromApp(base),
                ];
                config.sample_rate = select(&rates, index, "sample rate")?;
            }
            TcoParam::Pull(index) => {
                config.pull = select(&PULLS, index, "pull")?;
            }
            TcoParam::WordClockConversion(index) => {
                config.wck_conversion = select(&WCK_CONVERSIONS, index, "word clock conversion")?;
            }
            TcoParam::Term75r(term) => config.term_75r = term,
            TcoParam::WordClockOutSpeed(index) => {
                config.wck_out_speed = select(&WCK_OUT_SPEEDS, index, "word clock output speed")?;
            }
            TcoParam::LtcRun(run) => config.ltc_run = run,
            TcoParam::LtcFlywheel(flywheel) => config.ltc_flywheel = flywheel,
        }

        Ok(self.update_config(io, config))
    }

    /// Rewrite the bit for base rate when following the rate of card.
    pub fn follow_card_rate<R: HdspeRegisterIo>(&mut self, io: &mut R, card_base: ClkBaseFreq) -> bool {
        let base = TcoBaseRate::from_card(card_base);
        match self.config.sample_rate {
            TcoSampleRate::FromApp(rate) if rate != base => {
                self.config.sample_rate = TcoSampleRate::FromApp(base);
                HdspeTcoProtocol::write_base_rate(io, base, &mut self.regs[2]);
                debug!(rate = ?base, "TCO follows the rate of card");
                true
            }
            _ => false,
        }
    }

    pub fn request_ltc_out(&mut self, request: LtcOutRequest) {
        self.output.request(request);
    }

    pub fn on_frame_boundary(&mut self, now_ns: u64) {
        self.input.on_frame_boundary_detected(now_ns);
    }

    /// Process at audio period interrupt; LTC input at first, then LTC output.
    pub fn period_elapsed<R: HdspeRegisterIo>(
        &mut self,
        io: &mut R,
        frame_count: u64,
        period_size: u32,
        speed_factor: u32,
        now_ns: u64,
        changed: &mut ChangedControls,
    ) {
        self.ltc_time = frame_count;

        self.input
            .on_period_elapsed(io, frame_count, speed_factor, changed);

        let params = LtcScheduleParams {
            current_sample: frame_count,
            period_size,
            speed_factor,
            base_rate: HdspeTcoProtocol::base_rate(self.regs[2]),
            ltc_rate: self.config.ltc_rate,
            drop_frame: self.config.ltc_drop_frame,
            now_ns,
        };
        self.output
            .on_period_elapsed(io, &mut self.regs, &mut self.config, &params, changed);
    }

    /// Read status, then detect change of each field.
    pub fn poll_status<R: HdspeRegisterIo>(&mut self, io: &R, changed: &mut ChangedControls) {
        let mut status = TcoStatus::default();
        HdspeTcoProtocol::cache_wholly(io, &mut status);

        let prev = &self.status.fields;
        let curr = &status.fields;
        [
            (prev.ltc_valid != curr.ltc_valid, ControlId::LtcInValid),
            (prev.ltc_rate != curr.ltc_rate, ControlId::LtcInFrameRate),
            (prev.ltc_drop_frame != curr.ltc_drop_frame, ControlId::LtcInDropFrame),
            (prev.video != curr.video, ControlId::VideoFormat),
            (prev.wck_valid != curr.wck_valid, ControlId::WordClockValid),
            (prev.wck_speed != curr.wck_speed, ControlId::WordClockSpeed),
            (prev.lock != curr.lock, ControlId::TcoLock),
            (self.status.video_fps != status.video_fps, ControlId::VideoFrameRate),
        ]
        .iter()
        .filter(|(diff, _)| *diff)
        .for_each(|&(_, id)| {
            debug!(control = ?id, "TCO status changed");
            changed.insert(id);
        });

        self.status = status;
    }

    /// Stop time code and clear any request.
    pub fn terminate<R: HdspeRegisterIo>(&mut self, io: &mut R) {
        self.output
            .terminate(io, &mut self.regs, &mut self.config);
    }

    pub fn save(&self) -> TcoSavedState {
        TcoSavedState {
            config: self.config,
            regs: self.regs,
        }
    }

    /// Rewrite the saved registers verbatim.
    pub fn restore<R: HdspeRegisterIo>(&mut self, io: &mut R, saved: &TcoSavedState) {
        self.config = saved.config;
        self.regs = saved.regs;
        self.regs
            .iter()
            .enumerate()
            .for_each(|(n, &quad)| HdspeTcoProtocol::write_quadlet(io, n, quad));
    }

    pub fn snapshot(&self) -> TcoSnapshot {
        TcoSnapshot {
            config: self.config,
            status: self.status,
            ltc_in: self.input.time_code(),
            ltc_in_start_sample: self.input.start_sample(),
            ltc_in_pull_factor: self.input.pull_factor(),
            ltc_out_pending: self.output.pending(),
            ltc_set: self.output.is_armed(),
            ltc_out_last: self.output.last_scheduled(),
            ltc_time: self.ltc_time,
        }
    }
}
