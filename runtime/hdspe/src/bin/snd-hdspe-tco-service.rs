// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (c) 2022 Takashi Sakamoto

use {
    clap::{Parser, ValueEnum},
    hdspe_runtime::{protocols::ltc::*, protocols::IoType, *},
    runtime_core::{cmdline::*, LogLevel},
};

struct HdspeTcoServiceCmd;

#[derive(Parser)]
#[clap(name = "snd-hdspe-tco-service")]
struct Arguments {
    /// The type of IO interface in the simulated card.
    #[clap(long, value_enum, default_value_t = ArgIoType::Aio)]
    io_type: ArgIoType,

    /// Simulate the card without Time Code Option module.
    #[clap(long)]
    no_tco: bool,

    /// The rate of sampling clock in Hz.
    #[clap(long, default_value_t = 48000)]
    rate: u32,

    /// The number of frames per period.
    #[clap(long, default_value_t = 1024)]
    period_size: u32,

    /// The format of LTC input and output.
    #[clap(long, value_enum, default_value_t = ArgLtcFormat::Fps25)]
    ltc_format: ArgLtcFormat,

    /// The number of periods to process.
    #[clap(long, default_value_t = 64)]
    periods: u32,

    /// Wait for real duration of each period.
    #[clap(long)]
    realtime: bool,

    /// The time code of LTC input at the start, as hh:mm:ss:ff.
    #[clap(long)]
    ltc_in: Option<TimeCode>,

    /// The time code to start LTC output, as hh:mm:ss:ff, or "wallclock" for real time clock.
    #[clap(long, value_parser = parse_ltc_out)]
    ltc_out: Option<TimeCode>,

    /// The frame to start LTC output, or -1 to start at the next period. For "wallclock", the
    /// offset against UTC in seconds.
    #[clap(long, default_value_t = LTC_OUT_NOW, allow_hyphen_values = true)]
    ltc_out_target: i64,

    /// The level to debug runtime, disabled as a default.
    #[clap(long, short, value_enum)]
    log_level: Option<LogLevel>,
}

#[derive(ValueEnum, Copy, Clone, Debug, PartialEq, Eq)]
enum ArgIoType {
    Madi,
    Madiface,
    Aes,
    Raydat,
    Aio,
    AioPro,
}

impl From<ArgIoType> for IoType {
    fn from(io_type: ArgIoType) -> Self {
        match io_type {
            ArgIoType::Madi => Self::Madi,
            ArgIoType::Madiface => Self::MadiFace,
            ArgIoType::Aes => Self::Aes,
            ArgIoType::Raydat => Self::RayDat,
            ArgIoType::Aio => Self::Aio,
            ArgIoType::AioPro => Self::AioPro,
        }
    }
}

#[derive(ValueEnum, Copy, Clone, Debug, PartialEq, Eq)]
enum ArgLtcFormat {
    #[value(name = "24")]
    Fps24,
    #[value(name = "25")]
    Fps25,
    #[value(name = "29.97")]
    Fps2997,
    #[value(name = "29.97df")]
    Fps2997Df,
    #[value(name = "30")]
    Fps30,
    #[value(name = "30df")]
    Fps30Df,
}

impl From<ArgLtcFormat> for LtcFormat {
    fn from(format: ArgLtcFormat) -> Self {
        match format {
            ArgLtcFormat::Fps24 => Self::Fps24,
            ArgLtcFormat::Fps25 => Self::Fps25,
            ArgLtcFormat::Fps2997 => Self::Fps2997,
            ArgLtcFormat::Fps2997Df => Self::Fps2997Df,
            ArgLtcFormat::Fps30 => Self::Fps30,
            ArgLtcFormat::Fps30Df => Self::Fps30Df,
        }
    }
}

fn parse_ltc_out(literal: &str) -> Result<TimeCode, String> {
    if literal == "wallclock" {
        Ok(TimeCode::WALL_CLOCK)
    } else {
        literal.parse()
    }
}

impl ServiceCmd<Arguments, HdspeTcoParams, HdspeTcoRuntime> for HdspeTcoServiceCmd {
    fn params(args: &Arguments) -> (HdspeTcoParams, Option<LogLevel>) {
        let params = HdspeTcoParams {
            io_type: args.io_type.into(),
            tco: !args.no_tco,
            rate: args.rate,
            period_size: args.period_size,
            ltc_format: args.ltc_format.into(),
            periods: args.periods,
            realtime: args.realtime,
            ltc_in: args.ltc_in,
            ltc_out: args.ltc_out.map(|time_code| LtcOutRequest {
                time_code,
                target: args.ltc_out_target,
            }),
        };
        (params, args.log_level)
    }
}

fn main() {
    HdspeTcoServiceCmd::run()
}
