// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (c) 2021 Takashi Sakamoto

use {
    super::{sim::*, *},
    runtime_core::{LogLevel, RuntimeOperation},
    std::{
        sync::{
            atomic::{AtomicBool, Ordering},
            mpsc, Arc,
        },
        thread,
        time::Duration,
    },
    tracing::Level,
};

enum Event {
    /// Audio period elapsed in hardware.
    Period,
    Timer,
    Shutdown,
}

const PERIOD_DISPATCHER_NAME: &str = "period event dispatcher";

const NANOS_PER_SEC: u64 = 1_000_000_000;

/// The number of periods between polls of TCO status.
const STATUS_POLL_PERIODS: u32 = 16;

/// Parameters for the session against simulated card.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HdspeTcoParams {
    pub io_type: IoType,
    /// Whether TCO module is attached.
    pub tco: bool,
    /// The rate of sampling clock in Hz.
    pub rate: u32,
    pub period_size: u32,
    pub ltc_format: LtcFormat,
    /// The number of periods to process.
    pub periods: u32,
    /// Whether to wait for real duration of each period.
    pub realtime: bool,
    /// The time code of LTC input at the start.
    pub ltc_in: Option<TimeCode>,
    pub ltc_out: Option<LtcOutRequest>,
}

impl Default for HdspeTcoParams {
    fn default() -> Self {
        Self {
            io_type: Default::default(),
            tco: true,
            rate: 48000,
            period_size: 1024,
            ltc_format: LtcFormat::Fps25,
            periods: 64,
            realtime: false,
            ltc_in: None,
            ltc_out: None,
        }
    }
}

/// Notification sink to log changed controls.
#[derive(Default, Debug)]
pub struct LoggingNotifier;

impl NotificationSink for LoggingNotifier {
    fn notify_changed(&self, id: ControlId) {
        debug!(control = ?id, "changed");
    }
}

pub struct HdspeTcoRuntime {
    sim: SimulatedHdspe,
    clock: SimulatedClock,
    card: HdspeCard<SimulatedHdspe, SimulatedClock, LoggingNotifier>,
    params: HdspeTcoParams,
    rx: mpsc::Receiver<Event>,
    tx: mpsc::SyncSender<Event>,
    stopped: Arc<AtomicBool>,
    dispatchers: Vec<thread::JoinHandle<()>>,
    period_ns: u64,
    boundary_count: u64,
}

impl RuntimeOperation<HdspeTcoParams> for HdspeTcoRuntime {
    fn new(params: HdspeTcoParams, log_level: Option<LogLevel>) -> Result<Self, Error> {
        if let Some(level) = log_level {
            let fmt_level = match level {
                LogLevel::Debug => Level::DEBUG,
            };
            tracing_subscriber::fmt().with_max_level(fmt_level).init();
        }

        let rate = ClkNominalRate::from_hz(params.rate).ok_or_else(|| {
            let msg = format!("Sampling rate {} is not supported", params.rate);
            Error::new(ErrorKind::Inval, &msg)
        })?;

        let sim = SimulatedHdspe::new(params.io_type, params.tco);
        let clock = SimulatedClock::new(SystemClock.now_ns());
        let card = HdspeCard::new(sim.clone(), params.io_type, clock.clone(), LoggingNotifier);

        card.set_clock_rate(rate)?;
        card.set_period_size(params.period_size)?;

        if card.has_tco() {
            let index = LtcFormat::ALL
                .iter()
                .position(|format| *format == params.ltc_format)
                .unwrap_or_default();
            card.set_tco_param(TcoParam::LtcFormat(index))?;
            // Follow the rate of card.
            card.set_tco_param(TcoParam::SampleRate(TCO_SAMPLE_RATE_COUNT - 1))?;

            if let Some(time_code) = params.ltc_in {
                let (ltc_rate, drop_frame) = params.ltc_format.parts();
                sim.set_ltc_input(time_code, ltc_rate, drop_frame, 0);
            }
        }

        let period_ns = params.period_size as u64 * NANOS_PER_SEC / params.rate as u64;

        // Use uni-directional channel for communication to child threads.
        let (tx, rx) = mpsc::sync_channel(32);

        Ok(Self {
            sim,
            clock,
            card,
            params,
            rx,
            tx,
            stopped: Default::default(),
            dispatchers: Vec::new(),
            period_ns,
            boundary_count: 0,
        })
    }

    fn listen(&mut self) -> Result<(), Error> {
        if let Some(request) = self.params.ltc_out {
            self.card
                .request_ltc_out(request.time_code, request.target)?;
        }

        self.card.start();
        self.launch_period_dispatcher()?;

        Ok(())
    }

    fn run(&mut self) -> Result<(), Error> {
        let enter = debug_span!("event").entered();
        loop {
            match self.rx.recv() {
                Ok(Event::Period) => {
                    let _enter = debug_span!("period").entered();
                    self.period_elapsed();
                }
                Ok(Event::Timer) => {
                    let _enter = debug_span!("timer").entered();
                    self.card.poll_status();
                }
                Ok(Event::Shutdown) | Err(_) => break,
            }
        }
        enter.exit();

        self.card.terminate();
        self.report();

        Ok(())
    }
}

impl Drop for HdspeTcoRuntime {
    fn drop(&mut self) {
        // At first, stop dispatchers to avoid queueing new events.
        self.stopped.store(true, Ordering::SeqCst);

        // Next, consume all events in queue to release blocked thread for sender.
        for _ in self.rx.try_iter() {}

        // Finally finish the threads.
        self.dispatchers.drain(..).for_each(|handle| {
            let _ = handle.join();
        });
    }
}

impl HdspeTcoRuntime {
    fn launch_period_dispatcher(&mut self) -> Result<(), Error> {
        let tx = self.tx.clone();
        let stopped = self.stopped.clone();

        let periods = self.params.periods;
        let realtime = self.params.realtime;
        let period_ns = self.period_ns;

        let handle = thread::Builder::new()
            .name(PERIOD_DISPATCHER_NAME.to_string())
            .spawn(move || {
                for i in 0..periods {
                    if stopped.load(Ordering::SeqCst) {
                        return;
                    }
                    if realtime {
                        thread::sleep(Duration::from_nanos(period_ns));
                    }
                    if tx.send(Event::Period).is_err() {
                        return;
                    }
                    if (i + 1) % STATUS_POLL_PERIODS == 0 && tx.send(Event::Timer).is_err() {
                        return;
                    }
                }
                let _ = tx.send(Event::Shutdown);
            })
            .map_err(|e| {
                let msg = format!("Fail to launch {}: {}", PERIOD_DISPATCHER_NAME, e);
                Error::new(ErrorKind::Failed, &msg)
            })?;

        self.dispatchers.push(handle);

        Ok(())
    }

    /// Move the simulated card by one period. The clock is advanced to each boundary of LTC
    /// frame to deliver MTC message, then to the end of period for the interrupt.
    fn period_elapsed(&mut self) {
        let boundaries = self.sim.advance_period();

        let rate = self.params.rate as u64;
        let speed_factor = self.card.clock_rate().speed().factor() as u64;
        let mut elapsed_ns = 0;

        for (time_code, frames) in boundaries {
            let since_ns = frames as u64 * NANOS_PER_SEC * speed_factor / rate;
            let at_ns = self.period_ns.saturating_sub(since_ns).max(elapsed_ns);
            self.clock.advance(at_ns - elapsed_ns);
            elapsed_ns = at_ns;

            let msg = self.quarter_frame(&time_code);
            self.card.on_mtc_message(&msg);
        }

        self.clock.advance(self.period_ns - elapsed_ns);
        self.card.on_audio_interrupt();
    }

    /// Quarter frame message for piece 0 and 4 alternately, at the boundary of frame.
    fn quarter_frame(&mut self, time_code: &TimeCode) -> [u8; 2] {
        let (_, minutes, _, frames) = time_code.decompose();
        let msg = if self.boundary_count % 2 == 0 {
            [0xf1, frames & 0x0f]
        } else {
            [0xf1, 0x40 | (minutes & 0x0f)]
        };
        debug!(time_code = %time_code, piece = msg[1] >> 4, "MTC quarter frame");
        self.boundary_count += 1;
        msg
    }

    fn report(&self) {
        let snapshot = self.card.snapshot();
        println!(
            "{:?}: {} Hz, {} frames per period, {} interrupts, frame count {}",
            snapshot.io_type,
            snapshot.rate.hz(),
            snapshot.period_size,
            snapshot.irq_count,
            snapshot.frame_count
        );

        match &snapshot.tco {
            Some(tco) => {
                println!(
                    "TCO firmware {}: LTC in {} started at {}, pull factor {}",
                    tco.status.fw_version, tco.ltc_in, tco.ltc_in_start_sample, tco.ltc_in_pull_factor
                );
                if let Some(scheduled) = &tco.ltc_out_last {
                    println!(
                        "LTC out {} started at {}, offset {}",
                        scheduled.time_code, scheduled.start_sample, scheduled.offset
                    );
                }
            }
            None => println!("TCO module is not detected"),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn session_with_ltc() {
        let params = HdspeTcoParams {
            io_type: IoType::Madi,
            rate: 48000,
            period_size: 1024,
            periods: 40,
            ltc_in: Some(TimeCode::compose(10, 0, 0, 0)),
            ltc_out: Some(LtcOutRequest {
                time_code: TimeCode::compose(1, 0, 0, 0),
                target: LTC_OUT_NOW,
            }),
            ..Default::default()
        };
        let mut runtime = HdspeTcoRuntime::new(params, None).unwrap();
        runtime.listen().unwrap();
        runtime.run().unwrap();

        let snapshot = runtime.card.snapshot();
        assert_eq!(snapshot.irq_count, 40);
        assert_eq!(snapshot.frame_count, 40 * 1024);
        assert!(!snapshot.running);

        let tco = snapshot.tco.unwrap();
        // 40960 frames in 21 time code frames at 25 fps.
        assert_eq!(tco.ltc_in, TimeCode::compose(10, 0, 0, 22));
        assert_eq!(tco.ltc_in_pull_factor, 1000);
        assert_eq!(
            tco.ltc_out_last.map(|s| s.time_code),
            Some(TimeCode::compose(1, 0, 0, 2))
        );
        // Terminated.
        assert!(!tco.config.ltc_run);
    }

    #[test]
    fn long_session_retains_no_write() {
        let params = HdspeTcoParams {
            io_type: IoType::Aio,
            period_size: 64,
            periods: 2000,
            ltc_in: Some(TimeCode::compose(0, 0, 0, 0)),
            ..Default::default()
        };
        let mut runtime = HdspeTcoRuntime::new(params, None).unwrap();
        runtime.listen().unwrap();
        runtime.run().unwrap();

        assert_eq!(runtime.card.snapshot().irq_count, 2000);
        assert!(runtime.sim.take_writes().is_empty());
    }

    #[test]
    fn session_without_tco() {
        let params = HdspeTcoParams {
            io_type: IoType::Aes,
            tco: false,
            periods: 4,
            ltc_out: Some(LtcOutRequest {
                time_code: TimeCode::compose(1, 0, 0, 0),
                target: LTC_OUT_NOW,
            }),
            ..Default::default()
        };
        let mut runtime = HdspeTcoRuntime::new(params, None).unwrap();
        let err = runtime.listen().unwrap_err();
        assert!(err.is(ErrorKind::Nxio));
    }

    #[test]
    fn unsupported_params() {
        let params = HdspeTcoParams {
            rate: 22050,
            ..Default::default()
        };
        let err = HdspeTcoRuntime::new(params, None).err().unwrap();
        assert!(err.is(ErrorKind::Inval));

        let params = HdspeTcoParams {
            io_type: IoType::Aio,
            period_size: 8192,
            ..Default::default()
        };
        let err = HdspeTcoRuntime::new(params, None).err().unwrap();
        assert!(err.is(ErrorKind::Inval));
    }
}
