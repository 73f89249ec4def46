// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (c) 2021 Takashi Sakamoto
mod card;
mod frame_counter;
mod ltc_input;
mod ltc_output;
mod runtime;
mod tco;

pub mod sim;

pub use {
    card::*, frame_counter::*, hdspe_protocols as protocols, ltc_input::*, ltc_output::*,
    runtime::*, tco::*,
};

use {
    protocols::{card::*, ltc::*, mtc::*, tco::*, *},
    runtime_core::{Error, ErrorKind},
    std::time::{SystemTime, UNIX_EPOCH},
    tracing::{debug, debug_span, info, warn},
};

/// Identifier of control whose value is changed by hardware or interrupt processing.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ControlId {
    /// The time code of LTC input.
    LtcIn,
    LtcInPullFactor,
    LtcInValid,
    LtcInFrameRate,
    LtcInDropFrame,
    TcoLock,
    VideoFormat,
    VideoFrameRate,
    WordClockValid,
    WordClockSpeed,
    /// Whether LTC output runs.
    LtcRun,
}

impl ControlId {
    pub const ALL: [Self; 11] = [
        Self::LtcIn,
        Self::LtcInPullFactor,
        Self::LtcInValid,
        Self::LtcInFrameRate,
        Self::LtcInDropFrame,
        Self::TcoLock,
        Self::VideoFormat,
        Self::VideoFrameRate,
        Self::WordClockValid,
        Self::WordClockSpeed,
        Self::LtcRun,
    ];

    fn flag(&self) -> u16 {
        1 << (*self as u16)
    }
}

/// The set of changed controls, collected under lock and notified after unlock.
#[derive(Default, Debug, Copy, Clone, PartialEq, Eq)]
pub struct ChangedControls(u16);

impl ChangedControls {
    pub fn insert(&mut self, id: ControlId) {
        self.0 |= id.flag();
    }

    pub fn contains(&self, id: ControlId) -> bool {
        self.0 & id.flag() > 0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = ControlId> {
        let changed = *self;
        (0..ControlId::ALL.len())
            .map(|i| ControlId::ALL[i])
            .filter(move |id| changed.contains(*id))
    }
}

/// Source of real time.
pub trait RealTimeClock {
    /// Nanoseconds since the epoch.
    fn now_ns(&self) -> u64;
}

/// Receiver of notification for changed control.
pub trait NotificationSink {
    fn notify_changed(&self, id: ControlId);
}

/// The real time clock of system.
#[derive(Default, Debug, Copy, Clone)]
pub struct SystemClock;

impl RealTimeClock for SystemClock {
    fn now_ns(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|duration| duration.as_nanos() as u64)
            .unwrap_or_default()
    }
}
