// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (c) 2021 Takashi Sakamoto

//! Register level simulator of the card, fake clock, and recorder of notification. They are
//! used by the service program and tests.

use {
    super::*,
    parking_lot::Mutex,
    std::sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};

const DEFAULT_FW_VERSION: u8 = 11;

#[derive(Debug)]
struct SimulatedRegisters {
    io_type: IoType,
    tco: bool,
    control: u32,
    irq_pending: bool,
    position: u32,
    tco_read: [u32; TCO_QUADLET_COUNT],
    tco_write: [u32; TCO_QUADLET_COUNT],
    writes: Option<Vec<(usize, u32)>>,
    ltc_in: Option<SimulatedLtcInput>,
}

#[derive(Debug, Copy, Clone)]
struct SimulatedLtcInput {
    time_code: TimeCode,
    rate: LtcFrameRate,
    drop_frame: bool,
    elapsed: u32,
}

impl SimulatedRegisters {
    fn control(&self) -> HdspeControl {
        let mut control = HdspeControl::default();
        HdspeCardProtocol::deserialize_quadlets(&mut control, &[self.control]);
        control
    }

    fn card_status(&self) -> Vec<u32> {
        let status = HdspeCardStatus {
            audio_irq_pending: self.irq_pending,
            buf_ptr: ((self.position & (HW_POINTER_SPAN - 1)) >> 4) as u16,
            tco_detect_status0: self.tco && (self.io_type == IoType::Madi || self.io_type == IoType::Aes),
            tco_detect_status2: self.tco && self.io_type.is_raio(),
        };
        HdspeCardProtocol::serialize_quadlets(&status)
    }

    fn update_ltc_status(&mut self) {
        if let Some(ltc) = &self.ltc_in {
            let mut fields = decode_status_fields(self.tco_read[1]);
            fields.ltc_valid = true;
            fields.ltc_rate = ltc.rate;
            fields.ltc_drop_frame = ltc.drop_frame;
            fields.ltc_offset = (ltc.elapsed as u16) & TCO_OFFSET_MAX;
            self.tco_read[0] = ltc.time_code.0;
            self.tco_read[1] = encode_status_fields(&fields);
        }
    }
}

/// Simulator of registers in the card. The handle is shared between threads.
#[derive(Debug, Clone)]
pub struct SimulatedHdspe(Arc<Mutex<SimulatedRegisters>>);

impl SimulatedHdspe {
    pub fn new(io_type: IoType, tco: bool) -> Self {
        Self::build(io_type, tco, None)
    }

    /// The same as [`Self::new`], additionally recording written quadlets.
    pub fn with_write_log(io_type: IoType, tco: bool) -> Self {
        Self::build(io_type, tco, Some(Vec::new()))
    }

    fn build(io_type: IoType, tco: bool, writes: Option<Vec<(usize, u32)>>) -> Self {
        let status = TcoStatus {
            fw_version: DEFAULT_FW_VERSION,
            ..Default::default()
        };
        let raw = HdspeTcoProtocol::serialize_quadlets(&status);
        let mut tco_read = [0; TCO_QUADLET_COUNT];
        tco_read.copy_from_slice(&raw);

        let regs = SimulatedRegisters {
            io_type,
            tco,
            control: 0,
            irq_pending: false,
            position: 0,
            tco_read,
            tco_write: [0; TCO_QUADLET_COUNT],
            writes,
            ltc_in: None,
        };
        Self(Arc::new(Mutex::new(regs)))
    }

    /// Set the time code of LTC input, counted from the number of frames since it started.
    pub fn set_ltc_input(&self, time_code: TimeCode, rate: LtcFrameRate, drop_frame: bool, offset: u16) {
        let mut regs = self.0.lock();
        regs.ltc_in = Some(SimulatedLtcInput {
            time_code,
            rate,
            drop_frame,
            elapsed: offset as u32,
        });
        regs.update_ltc_status();
    }

    /// Replace whole TCO status.
    pub fn set_tco_status(&self, status: &TcoStatus) {
        let raw = HdspeTcoProtocol::serialize_quadlets(status);
        self.0.lock().tco_read.copy_from_slice(&raw);
    }

    /// Move the hardware pointer by one period and raise interrupt if enabled. Return the time
    /// codes of LTC input which started in the period, with the number of frames elapsed since
    /// then, counted at single speed.
    pub fn advance_period(&self) -> Vec<(TimeCode, u32)> {
        let mut regs = self.0.lock();
        let control = regs.control();
        let io_type = regs.io_type;
        let period_size = HdspeCardProtocol::period_size(control.latency, io_type);

        if !control.start {
            return Vec::new();
        }

        regs.position = (regs.position + period_size) % HW_POINTER_SPAN;
        if control.audio_irq_enable {
            regs.irq_pending = true;
        }

        let mut boundaries = Vec::new();
        let speed = control.rate.speed().factor();
        let base = TcoBaseRate::from_card(control.rate.base());
        if let Some(ltc) = &mut regs.ltc_in {
            let frame_size = base.hz() * 1000 / (ltc.rate.fps() * ltc.rate.scale());
            ltc.elapsed += period_size / speed;
            while ltc.elapsed >= frame_size {
                ltc.elapsed -= frame_size;
                ltc.time_code = ltc.time_code.increment(ltc.rate.fps(), ltc.drop_frame);
                boundaries.push((ltc.time_code, ltc.elapsed));
            }
        }
        regs.update_ltc_status();

        boundaries
    }

    pub fn is_irq_pending(&self) -> bool {
        self.0.lock().irq_pending
    }

    /// The value of control register.
    pub fn control(&self) -> u32 {
        self.0.lock().control
    }

    /// The last values written to TCO control quadlets.
    pub fn tco_control(&self) -> [u32; TCO_QUADLET_COUNT] {
        self.0.lock().tco_write
    }

    /// Take the log of written quadlets. It is empty unless recording.
    pub fn take_writes(&self) -> Vec<(usize, u32)> {
        self.0
            .lock()
            .writes
            .as_mut()
            .map(std::mem::take)
            .unwrap_or_default()
    }
}

impl HdspeRegisterIo for SimulatedHdspe {
    fn read_quadlet(&self, offset: usize) -> u32 {
        let regs = self.0.lock();
        match offset {
            STATUS0_OFFSET => regs.card_status()[0],
            STATUS2_OFFSET => regs.card_status()[1],
            _ if regs.tco
                && offset >= TCO_READ_OFFSET
                && offset < TCO_READ_OFFSET + 4 * TCO_QUADLET_COUNT =>
            {
                regs.tco_read[(offset - TCO_READ_OFFSET) / 4]
            }
            _ => 0,
        }
    }

    fn write_quadlet(&mut self, offset: usize, value: u32) {
        let mut regs = self.0.lock();
        if let Some(writes) = &mut regs.writes {
            writes.push((offset, value));
        }
        match offset {
            CONTROL_OFFSET => regs.control = value,
            IRQ_CONFIRM_OFFSET => regs.irq_pending = false,
            _ if regs.tco
                && offset >= TCO_WRITE_OFFSET
                && offset < TCO_WRITE_OFFSET + 4 * TCO_QUADLET_COUNT =>
            {
                regs.tco_write[(offset - TCO_WRITE_OFFSET) / 4] = value;
            }
            _ => (),
        }
    }
}

/// Clock to be advanced manually.
#[derive(Default, Debug, Clone)]
pub struct SimulatedClock(Arc<AtomicU64>);

impl SimulatedClock {
    pub fn new(now_ns: u64) -> Self {
        Self(Arc::new(AtomicU64::new(now_ns)))
    }

    pub fn advance(&self, ns: u64) {
        self.0.fetch_add(ns, Ordering::SeqCst);
    }
}

impl RealTimeClock for SimulatedClock {
    fn now_ns(&self) -> u64 {
        self.0.load(Ordering::SeqCst)
    }
}

/// Recorder of notification.
#[derive(Default, Debug, Clone)]
pub struct RecordingNotifier(Arc<Mutex<Vec<ControlId>>>);

impl RecordingNotifier {
    pub fn take(&self) -> Vec<ControlId> {
        std::mem::take(&mut *self.0.lock())
    }
}

impl NotificationSink for RecordingNotifier {
    fn notify_changed(&self, id: ControlId) {
        self.0.lock().push(id);
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn tco_detection_bits() {
        [
            (IoType::Madi, 0x08000000, 0),
            (IoType::Aes, 0x08000000, 0),
            (IoType::MadiFace, 0, 0),
            (IoType::RayDat, 0, 0x00000008),
            (IoType::Aio, 0, 0x00000008),
            (IoType::AioPro, 0, 0x00000008),
        ]
        .iter()
        .for_each(|&(io_type, status0, status2)| {
            let sim = SimulatedHdspe::new(io_type, true);
            assert_eq!(sim.read_quadlet(STATUS0_OFFSET), status0);
            assert_eq!(sim.read_quadlet(STATUS2_OFFSET), status2);

            let sim = SimulatedHdspe::new(io_type, false);
            assert_eq!(sim.read_quadlet(STATUS0_OFFSET), 0);
            assert_eq!(sim.read_quadlet(STATUS2_OFFSET), 0);
        });
    }

    #[test]
    fn period_and_irq() {
        let mut sim = SimulatedHdspe::with_write_log(IoType::Madi, true);
        let control = HdspeControl {
            start: true,
            latency: 2,
            audio_irq_enable: true,
            rate: ClkNominalRate::R48000,
        };
        HdspeCardProtocol::update_wholly(&mut sim, &control);

        sim.advance_period();
        assert!(sim.is_irq_pending());
        let mut status = HdspeCardStatus::default();
        HdspeCardProtocol::cache_wholly(&sim, &mut status);
        assert_eq!(status.hw_pointer(), 256);

        HdspeCardProtocol::confirm_audio_irq(&mut sim);
        assert!(!sim.is_irq_pending());
        assert_eq!(
            sim.take_writes(),
            vec![(CONTROL_OFFSET, 0x000000e5), (IRQ_CONFIRM_OFFSET, 0)]
        );
    }

    #[test]
    fn write_log_off_by_default() {
        let mut sim = SimulatedHdspe::new(IoType::Madi, true);
        let control = HdspeControl {
            start: true,
            ..Default::default()
        };
        HdspeCardProtocol::update_wholly(&mut sim, &control);
        HdspeCardProtocol::confirm_audio_irq(&mut sim);
        assert!(sim.take_writes().is_empty());
        assert_eq!(sim.control() & 0x00000001, 0x00000001);
    }

    #[test]
    fn ltc_input_runs() {
        let mut sim = SimulatedHdspe::new(IoType::Aio, true);
        let control = HdspeControl {
            start: true,
            latency: 1,
            audio_irq_enable: true,
            rate: ClkNominalRate::R48000,
        };
        HdspeCardProtocol::update_wholly(&mut sim, &control);
        sim.set_ltc_input(TimeCode::compose(0, 0, 0, 24), LtcFrameRate::Fps25, false, 1900);

        // 1920 frames per time code frame, 128 frames per period.
        let boundaries = sim.advance_period();
        assert_eq!(boundaries, vec![(TimeCode::compose(0, 0, 1, 0), 108)]);

        let (tc, fields) = HdspeTcoProtocol::read_ltc(&sim);
        assert_eq!(tc, TimeCode::compose(0, 0, 1, 0));
        assert_eq!(fields.ltc_offset, 108);
        assert!(fields.ltc_valid);

        assert!(sim.advance_period().is_empty());
    }
}
