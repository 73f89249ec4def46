// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (c) 2021 Takashi Sakamoto

use {super::*, parking_lot::Mutex};

/// The latency code at initialization.
const INITIAL_LATENCY: u8 = 6;

/// Registers saved at suspend.
#[derive(Default, Debug, Copy, Clone, PartialEq, Eq)]
pub struct SavedRegisters {
    pub control: HdspeControl,
    pub tco: Option<TcoSavedState>,
}

/// Snapshot of the card.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct CardSnapshot {
    pub io_type: IoType,
    pub running: bool,
    pub rate: ClkNominalRate,
    pub period_size: u32,
    pub frame_count: u64,
    pub irq_count: u64,
    /// None when TCO module is absent.
    pub tco: Option<TcoSnapshot>,
}

#[derive(Debug)]
struct CardState<R: HdspeRegisterIo> {
    io: R,
    io_type: IoType,
    control: HdspeControl,
    counter: FrameCounter,
    irq_count: u64,
    tco: Option<TcoState>,
}

impl<R: HdspeRegisterIo> CardState<R> {
    fn write_control(&mut self) {
        HdspeCardProtocol::update_wholly(&mut self.io, &self.control);
        debug!(control = ?self.control);
    }

    fn tco_mut(&mut self) -> Result<(&mut TcoState, &mut R), Error> {
        match &mut self.tco {
            Some(tco) => Ok((tco, &mut self.io)),
            None => Err(Error::new(ErrorKind::Nxio, "TCO module is not detected")),
        }
    }
}

/// The aggregate of state for the card. Any operation is done under one lock, and the
/// notification of changed controls is delivered after unlock.
#[derive(Debug)]
pub struct HdspeCard<R, C, N>
where
    R: HdspeRegisterIo,
    C: RealTimeClock,
    N: NotificationSink,
{
    state: Mutex<CardState<R>>,
    clock: C,
    notifier: N,
}

impl<R, C, N> HdspeCard<R, C, N>
where
    R: HdspeRegisterIo,
    C: RealTimeClock,
    N: NotificationSink,
{
    /// Initialize the card, and TCO module if detected.
    pub fn new(mut io: R, io_type: IoType, clock: C, notifier: N) -> Self {
        let _enter = debug_span!("init").entered();

        let mut status = HdspeCardStatus::default();
        HdspeCardProtocol::cache_wholly(&io, &mut status);

        let tco = if status.tco_present(io_type) {
            Some(TcoState::new(&mut io))
        } else {
            debug!(?io_type, "TCO module is not detected");
            None
        };

        let control = HdspeControl {
            latency: INITIAL_LATENCY,
            ..Default::default()
        };
        let period_size = HdspeCardProtocol::period_size(control.latency, io_type);
        let hw_buffer_size = HdspeCardProtocol::hw_buffer_size(period_size, io_type);

        let mut state = CardState {
            io,
            io_type,
            control,
            counter: FrameCounter::new(period_size, hw_buffer_size),
            irq_count: 0,
            tco,
        };
        state.write_control();

        Self {
            state: Mutex::new(state),
            clock,
            notifier,
        }
    }

    fn notify(&self, changed: ChangedControls) {
        changed
            .iter()
            .for_each(|id| self.notifier.notify_changed(id));
    }

    pub fn io_type(&self) -> IoType {
        self.state.lock().io_type
    }

    pub fn has_tco(&self) -> bool {
        self.state.lock().tco.is_some()
    }

    /// Process the interrupt. Return false when no audio interrupt is pending.
    pub fn on_audio_interrupt(&self) -> bool {
        let _enter = debug_span!("interrupt").entered();

        let now_ns = self.clock.now_ns();
        let mut changed = ChangedControls::default();

        {
            let mut guard = self.state.lock();
            let state = &mut *guard;

            let mut status = HdspeCardStatus::default();
            HdspeCardProtocol::cache_wholly(&state.io, &mut status);
            if !status.audio_irq_pending {
                return false;
            }

            HdspeCardProtocol::confirm_audio_irq(&mut state.io);
            state.irq_count += 1;

            state.counter.update(status.hw_pointer());
            let frame_count = state.counter.current();
            let period_size = state.counter.period_size();
            let speed_factor = state.control.rate.speed().factor();

            if let Some(tco) = &mut state.tco {
                tco.period_elapsed(
                    &mut state.io,
                    frame_count,
                    period_size,
                    speed_factor,
                    now_ns,
                    &mut changed,
                );
            }
        }

        self.notify(changed);

        true
    }

    /// Process MIDI time code message from TCO module. Return whether it is at the boundary of
    /// time code frame.
    pub fn on_mtc_message(&self, buf: &[u8]) -> bool {
        let boundary = MtcMessage::parse(buf)
            .map(|msg| msg.is_frame_boundary())
            .unwrap_or_default();

        if boundary {
            let now_ns = self.clock.now_ns();
            if let Some(tco) = &mut self.state.lock().tco {
                tco.on_frame_boundary(now_ns);
            }
        }

        boundary
    }

    /// Start audio engine and interrupts.
    pub fn start(&self) {
        let mut state = self.state.lock();
        state.control.start = true;
        state.control.audio_irq_enable = true;
        state.write_control();
    }

    pub fn stop(&self) {
        let mut state = self.state.lock();
        state.control.start = false;
        state.control.audio_irq_enable = false;
        state.write_control();
    }

    pub fn is_running(&self) -> bool {
        self.state.lock().control.start
    }

    /// Change the number of frames per period. It is not allowed while running.
    pub fn set_period_size(&self, period_size: u32) -> Result<(), Error> {
        let mut state = self.state.lock();

        if state.control.start {
            let msg = "Period size is not changed while audio interrupts are running";
            warn!("{}", msg);
            return Err(Error::new(ErrorKind::Busy, msg));
        }

        let io_type = state.io_type;
        let latency = HdspeCardProtocol::latency_code(period_size, io_type).ok_or_else(|| {
            let msg = format!("Period size {} is not supported by {:?}", period_size, io_type);
            warn!("{}", msg);
            Error::new(ErrorKind::Inval, &msg)
        })?;

        state.control.latency = latency;
        state.write_control();

        let hw_buffer_size = HdspeCardProtocol::hw_buffer_size(period_size, io_type);
        state.counter.set_period_size(period_size, hw_buffer_size);

        Ok(())
    }

    pub fn period_size(&self) -> u32 {
        self.state.lock().counter.period_size()
    }

    /// Change the rate of internal sampling clock while stopped. TCO module follows it when
    /// configured.
    pub fn set_clock_rate(&self, rate: ClkNominalRate) -> Result<bool, Error> {
        let mut guard = self.state.lock();
        let state = &mut *guard;

        if state.control.rate == rate {
            return Ok(false);
        }

        if state.control.start {
            let msg = "Clock rate is not changed while audio interrupts are running";
            warn!("{}", msg);
            return Err(Error::new(ErrorKind::Busy, msg));
        }

        state.control.rate = rate;
        state.write_control();

        if let Some(tco) = &mut state.tco {
            tco.follow_card_rate(&mut state.io, rate.base());
        }

        Ok(true)
    }

    pub fn clock_rate(&self) -> ClkNominalRate {
        self.state.lock().control.rate
    }

    pub fn frame_count(&self) -> u64 {
        self.state.lock().counter.current()
    }

    pub fn hw_pointer(&self) -> u16 {
        self.state.lock().counter.hw_pointer_now()
    }

    /// Configure TCO module.
    pub fn set_tco_param(&self, param: TcoParam) -> Result<bool, Error> {
        let _enter = debug_span!("config").entered();

        let mut state = self.state.lock();
        let card_base = state.control.rate.base();
        let (tco, io) = state.tco_mut()?;
        tco.set_param(io, param, card_base)
    }

    /// Queue the request to start LTC output at the next audio period interrupt.
    pub fn request_ltc_out(&self, time_code: TimeCode, target: i64) -> Result<(), Error> {
        let mut state = self.state.lock();
        let (tco, _) = state.tco_mut()?;
        tco.request_ltc_out(LtcOutRequest { time_code, target });
        Ok(())
    }

    /// The same as [`Self::request_ltc_out`] with the time code in 64 bit layout.
    pub fn request_ltc_out_ltc64(&self, val: u64, target: i64) -> Result<(), Error> {
        self.request_ltc_out(TimeCode::from_ltc64(val), target)
    }

    /// The time code of LTC input in 64 bit layout.
    pub fn ltc_in_ltc64(&self) -> Result<u64, Error> {
        let mut state = self.state.lock();
        let (tco, _) = state.tco_mut()?;
        Ok(tco.input().time_code().to_ltc64())
    }

    /// Read status of TCO module and notify changed fields.
    pub fn poll_status(&self) {
        let mut changed = ChangedControls::default();
        {
            let mut guard = self.state.lock();
            let state = &mut *guard;
            if let Some(tco) = &mut state.tco {
                tco.poll_status(&state.io, &mut changed);
            }
        }
        self.notify(changed);
    }

    pub fn snapshot(&self) -> CardSnapshot {
        let state = self.state.lock();
        CardSnapshot {
            io_type: state.io_type,
            running: state.control.start,
            rate: state.control.rate,
            period_size: state.counter.period_size(),
            frame_count: state.counter.current(),
            irq_count: state.irq_count,
            tco: state.tco.as_ref().map(|tco| tco.snapshot()),
        }
    }

    pub fn save_registers(&self) -> SavedRegisters {
        let state = self.state.lock();
        SavedRegisters {
            control: state.control,
            tco: state.tco.as_ref().map(|tco| tco.save()),
        }
    }

    /// Rewrite saved registers to hardware.
    pub fn restore_registers(&self, saved: &SavedRegisters) {
        let mut guard = self.state.lock();
        let state = &mut *guard;

        state.control = saved.control;
        state.write_control();

        let period_size = HdspeCardProtocol::period_size(state.control.latency, state.io_type);
        let hw_buffer_size = HdspeCardProtocol::hw_buffer_size(period_size, state.io_type);
        state.counter.set_period_size(period_size, hw_buffer_size);

        if let (Some(tco), Some(saved)) = (&mut state.tco, &saved.tco) {
            tco.restore(&mut state.io, saved);
        }
    }

    /// Stop time code output and audio interrupts.
    pub fn terminate(&self) {
        let mut guard = self.state.lock();
        let state = &mut *guard;

        if let Some(tco) = &mut state.tco {
            tco.terminate(&mut state.io);
        }

        if state.control.start {
            state.control.start = false;
            state.control.audio_irq_enable = false;
            state.write_control();
        }
    }
}

impl<R, C, N> Drop for HdspeCard<R, C, N>
where
    R: HdspeRegisterIo,
    C: RealTimeClock,
    N: NotificationSink,
{
    fn drop(&mut self) {
        self.terminate();
    }
}
