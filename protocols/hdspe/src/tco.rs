// SPDX-License-Identifier: LGPL-3.0-or-later
// Copyright (c) 2021 Takashi Sakamoto

//! Protocol about Time Code Option (TCO) module.
//!
//! The module has four status quadlets in read-side address space and four control quadlets in
//! write-side address space. The most significant bit of each byte is used by hardware for
//! synchronization, thus any written value is masked.

use super::{ltc::*, *};

/// Unique protocol for TCO module.
#[derive(Default, Debug)]
pub struct HdspeTcoProtocol;

pub const TCO_WRITE_OFFSET: usize = 128;
pub const TCO_READ_OFFSET: usize = 256;
pub const TCO_QUADLET_COUNT: usize = 4;

/// The mask for value written to control quadlets.
pub const TCO_WRITE_MASK: u32 = 0x7f7f7f7f;

// For status and control quadlet 1.
const TCO1_LOCK_MASK: u32 = 0x00000001;
const TCO1_WCK_RANGE_MASK: u32 = 0x00000006;
const TCO1_WCK_RANGE_SHIFT: usize = 1;
const TCO1_LTC_INPUT_VALID_MASK: u32 = 0x00000008;
const TCO1_WCK_INPUT_VALID_MASK: u32 = 0x00000010;
const TCO1_VIDEO_FORMAT_MASK: u32 = 0x00000060;
const TCO1_VIDEO_FORMAT_NTSC_FLAG: u32 = 0x00000020;
const TCO1_VIDEO_FORMAT_PAL_FLAG: u32 = 0x00000040;
const TCO1_SET_TC_MASK: u32 = 0x00000100;
const TCO1_DROP_FRAME_MASK: u32 = 0x00000200;
const TCO1_LTC_FORMAT_MASK: u32 = 0x00000c00;
const TCO1_LTC_FORMAT_SHIFT: usize = 10;
const TCO1_QFRAME_NUMBER_MASK: u32 = 0x00003000;
const TCO1_QFRAME_NUMBER_SHIFT: usize = 12;
const TCO1_NEW_QFRAME_MASK: u32 = 0x00004000;
const TCO1_OFFSET_LOW_MASK: u32 = 0x007f0000;
const TCO1_OFFSET_HIGH_MASK: u32 = 0x7f000000;
const TCO1_OFFSET_SHIFT: usize = 16;

// For control quadlet 2.
const TCO2_TC_RUN_MASK: u32 = 0x00010000;
const TCO2_WCK_IO_RATIO_MASK: u32 = 0x00060000;
const TCO2_WCK_IO_RATIO_SHIFT: usize = 17;
const TCO2_FLYWHEEL_MASK: u32 = 0x00400000;
const TCO2_SET_01_4_MASK: u32 = 0x01000000;
const TCO2_PULL_DOWN_MASK: u32 = 0x02000000;
const TCO2_PULL_UP_MASK: u32 = 0x04000000;
const TCO2_SET_FREQ_MASK: u32 = 0x08000000;
const TCO2_TERM_75R_MASK: u32 = 0x10000000;
const TCO2_INPUT_MASK: u32 = 0x60000000;
const TCO2_INPUT_SHIFT: usize = 29;
const TCO2_FREQ_FROM_APP_MASK: u32 = 0x80000000;

// For status quadlet 2.
const TCO2_FS_PERIOD_LOW_MASK: u32 = 0x0000007f;
const TCO2_FS_PERIOD_HIGH_MASK: u32 = 0x00007f00;
const TCO2_VIDEO_FPS_MASK: u32 = 0x78000000;
const TCO2_VIDEO_FPS_SHIFT: usize = 27;

// For status quadlet 3.
const TCO3_VERSION_MASK: u32 = 0x7f000000;
const TCO3_VERSION_SHIFT: usize = 24;

/// The maximum value of sample offset.
pub const TCO_OFFSET_MAX: u16 = 0x3fff;

/// Speed of word clock.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum WordClockSpeed {
    Single,
    Double,
    Quadruple,
    /// Code 3, not defined by hardware.
    Reserved,
}

impl Default for WordClockSpeed {
    fn default() -> Self {
        Self::Single
    }
}

fn serialize_wck_speed(speed: &WordClockSpeed, quad: &mut u32) {
    let code = match speed {
        WordClockSpeed::Single => 0,
        WordClockSpeed::Double => 1,
        WordClockSpeed::Quadruple => 2,
        WordClockSpeed::Reserved => 3,
    };
    *quad &= !TCO1_WCK_RANGE_MASK;
    *quad |= code << TCO1_WCK_RANGE_SHIFT;
}

fn deserialize_wck_speed(speed: &mut WordClockSpeed, quad: &u32) {
    *speed = match (*quad & TCO1_WCK_RANGE_MASK) >> TCO1_WCK_RANGE_SHIFT {
        0 => WordClockSpeed::Single,
        1 => WordClockSpeed::Double,
        2 => WordClockSpeed::Quadruple,
        _ => WordClockSpeed::Reserved,
    };
}

/// Format of video input.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum VideoFormat {
    NoVideo,
    Ntsc,
    Pal,
    /// Both flags are set, not defined by hardware.
    Reserved,
}

impl Default for VideoFormat {
    fn default() -> Self {
        Self::NoVideo
    }
}

fn serialize_video_format(format: &VideoFormat, quad: &mut u32) {
    *quad &= !TCO1_VIDEO_FORMAT_MASK;
    *quad |= match format {
        VideoFormat::NoVideo => 0,
        VideoFormat::Ntsc => TCO1_VIDEO_FORMAT_NTSC_FLAG,
        VideoFormat::Pal => TCO1_VIDEO_FORMAT_PAL_FLAG,
        VideoFormat::Reserved => TCO1_VIDEO_FORMAT_MASK,
    };
}

fn deserialize_video_format(format: &mut VideoFormat, quad: &u32) {
    *format = match *quad & TCO1_VIDEO_FORMAT_MASK {
        0 => VideoFormat::NoVideo,
        TCO1_VIDEO_FORMAT_NTSC_FLAG => VideoFormat::Ntsc,
        TCO1_VIDEO_FORMAT_PAL_FLAG => VideoFormat::Pal,
        _ => VideoFormat::Reserved,
    };
}

fn serialize_ltc_format(rate: &LtcFrameRate, drop_frame: bool, quad: &mut u32) {
    *quad &= !(TCO1_LTC_FORMAT_MASK | TCO1_DROP_FRAME_MASK);
    *quad |= rate.code() << TCO1_LTC_FORMAT_SHIFT;
    if drop_frame {
        *quad |= TCO1_DROP_FRAME_MASK;
    }
}

fn deserialize_ltc_format(rate: &mut LtcFrameRate, drop_frame: &mut bool, quad: &u32) {
    let code = (*quad & TCO1_LTC_FORMAT_MASK) >> TCO1_LTC_FORMAT_SHIFT;
    if let Some(r) = LtcFrameRate::from_code(code) {
        *rate = r;
    }
    *drop_frame = *quad & TCO1_DROP_FRAME_MASK > 0;
}

/// Frame rate of video input detected by firmware version 11 or later.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum VideoFrameRate {
    NoLock,
    F2398,
    F24,
    F25,
    F2997,
    F30,
    F4795,
    F48,
    F50,
    F5994,
    F60,
    Reserved(u8),
}

impl Default for VideoFrameRate {
    fn default() -> Self {
        Self::NoLock
    }
}

impl VideoFrameRate {
    fn code(&self) -> u8 {
        match self {
            Self::NoLock => 0,
            Self::F2398 => 1,
            Self::F24 => 2,
            Self::F25 => 3,
            Self::F2997 => 4,
            Self::F30 => 5,
            Self::F4795 => 6,
            Self::F48 => 7,
            Self::F50 => 8,
            Self::F5994 => 9,
            Self::F60 => 10,
            Self::Reserved(code) => *code,
        }
    }

    fn from_code(code: u8) -> Self {
        match code {
            0 => Self::NoLock,
            1 => Self::F2398,
            2 => Self::F24,
            3 => Self::F25,
            4 => Self::F2997,
            5 => Self::F30,
            6 => Self::F4795,
            7 => Self::F48,
            8 => Self::F50,
            9 => Self::F5994,
            10 => Self::F60,
            _ => Self::Reserved(code),
        }
    }
}

/// Fields in status quadlet 1.
#[derive(Default, Debug, Copy, Clone, PartialEq, Eq)]
pub struct TcoStatusFields {
    /// Whether TCO is locked to the sync source.
    pub lock: bool,
    /// The speed of word clock input.
    pub wck_speed: WordClockSpeed,
    pub ltc_valid: bool,
    pub wck_valid: bool,
    pub video: VideoFormat,
    /// The echo of request to set time code.
    pub set_tc: bool,
    pub ltc_drop_frame: bool,
    pub ltc_rate: LtcFrameRate,
    pub quarter_frame: u8,
    pub new_quarter_frame: bool,
    /// The number of frames since the current time code started.
    pub ltc_offset: u16,
}

fn serialize_offset(offset: u16, quad: &mut u32) {
    let offset = (offset & TCO_OFFSET_MAX) as u32;
    let spread = ((offset & 0x3f80) << 1) | (offset & 0x007f);
    *quad &= !(TCO1_OFFSET_LOW_MASK | TCO1_OFFSET_HIGH_MASK);
    *quad |= spread << TCO1_OFFSET_SHIFT;
}

fn deserialize_offset(offset: &mut u16, quad: &u32) {
    // The offset comes in two groups of 7 bits.
    *offset = (((*quad >> 16) & 0x007f) | ((*quad >> 17) & 0x3f80)) as u16;
}

/// Decode fields in status quadlet 1.
pub fn decode_status_fields(quad: u32) -> TcoStatusFields {
    let mut fields = TcoStatusFields::default();

    fields.lock = quad & TCO1_LOCK_MASK > 0;
    deserialize_wck_speed(&mut fields.wck_speed, &quad);
    fields.ltc_valid = quad & TCO1_LTC_INPUT_VALID_MASK > 0;
    fields.wck_valid = quad & TCO1_WCK_INPUT_VALID_MASK > 0;
    deserialize_video_format(&mut fields.video, &quad);
    fields.set_tc = quad & TCO1_SET_TC_MASK > 0;
    deserialize_ltc_format(&mut fields.ltc_rate, &mut fields.ltc_drop_frame, &quad);
    fields.quarter_frame = ((quad & TCO1_QFRAME_NUMBER_MASK) >> TCO1_QFRAME_NUMBER_SHIFT) as u8;
    fields.new_quarter_frame = quad & TCO1_NEW_QFRAME_MASK > 0;
    deserialize_offset(&mut fields.ltc_offset, &quad);

    fields
}

/// Encode fields into quadlet 1.
pub fn encode_status_fields(fields: &TcoStatusFields) -> u32 {
    let mut quad = 0;

    if fields.lock {
        quad |= TCO1_LOCK_MASK;
    }
    serialize_wck_speed(&fields.wck_speed, &mut quad);
    if fields.ltc_valid {
        quad |= TCO1_LTC_INPUT_VALID_MASK;
    }
    if fields.wck_valid {
        quad |= TCO1_WCK_INPUT_VALID_MASK;
    }
    serialize_video_format(&fields.video, &mut quad);
    if fields.set_tc {
        quad |= TCO1_SET_TC_MASK;
    }
    serialize_ltc_format(&fields.ltc_rate, fields.ltc_drop_frame, &mut quad);
    quad |= ((fields.quarter_frame as u32) << TCO1_QFRAME_NUMBER_SHIFT) & TCO1_QFRAME_NUMBER_MASK;
    if fields.new_quarter_frame {
        quad |= TCO1_NEW_QFRAME_MASK;
    }
    serialize_offset(fields.ltc_offset, &mut quad);

    quad & TCO_WRITE_MASK
}

/// Status of TCO module.
#[derive(Default, Debug, Copy, Clone, PartialEq, Eq)]
pub struct TcoStatus {
    /// The time code of LTC input.
    pub ltc: TimeCode,
    pub fields: TcoStatusFields,
    /// The period of word clock counted at 25 MHz, as 16 sample sliding sum.
    pub fs_period_counter: u16,
    pub video_fps: VideoFrameRate,
    pub fw_version: u8,
}

impl HdspeQuadletsSerialize<TcoStatus> for HdspeTcoProtocol {
    fn serialize_quadlets(params: &TcoStatus) -> Vec<u32> {
        let period = params.fs_period_counter as u32;
        let mut quad2 = ((period << 1) & TCO2_FS_PERIOD_HIGH_MASK) | (period & TCO2_FS_PERIOD_LOW_MASK);
        quad2 |= ((params.video_fps.code() as u32) << TCO2_VIDEO_FPS_SHIFT) & TCO2_VIDEO_FPS_MASK;

        let quad3 = ((params.fw_version as u32) << TCO3_VERSION_SHIFT) & TCO3_VERSION_MASK;

        vec![
            params.ltc.0,
            encode_status_fields(&params.fields),
            quad2,
            quad3,
        ]
    }
}

impl HdspeQuadletsDeserialize<TcoStatus> for HdspeTcoProtocol {
    fn deserialize_quadlets(params: &mut TcoStatus, raw: &[u32]) {
        assert!(raw.len() >= TCO_QUADLET_COUNT);

        params.ltc = TimeCode(raw[0]);
        params.fields = decode_status_fields(raw[1]);
        params.fs_period_counter = ((raw[2] & TCO2_FS_PERIOD_LOW_MASK)
            | ((raw[2] & TCO2_FS_PERIOD_HIGH_MASK) >> 1)) as u16;
        params.video_fps =
            VideoFrameRate::from_code(((raw[2] & TCO2_VIDEO_FPS_MASK) >> TCO2_VIDEO_FPS_SHIFT) as u8);
        params.fw_version = ((raw[3] & TCO3_VERSION_MASK) >> TCO3_VERSION_SHIFT) as u8;
    }
}

impl HdspeCacheableParamsOperation<TcoStatus> for HdspeTcoProtocol {
    fn cache_wholly<R: HdspeRegisterIo>(io: &R, params: &mut TcoStatus) {
        let raw: Vec<u32> = (0..TCO_QUADLET_COUNT)
            .map(|n| Self::read_quadlet(io, n))
            .collect();
        Self::deserialize_quadlets(params, &raw);
    }
}

/// Source of synchronization for TCO module.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum TcoSyncSource {
    WordClock,
    Video,
    Ltc,
}

impl Default for TcoSyncSource {
    fn default() -> Self {
        Self::WordClock
    }
}

fn serialize_sync_source(src: &TcoSyncSource, quad: &mut u32) {
    let code = match src {
        TcoSyncSource::WordClock => 0,
        TcoSyncSource::Video => 1,
        TcoSyncSource::Ltc => 2,
    };
    *quad &= !TCO2_INPUT_MASK;
    *quad |= code << TCO2_INPUT_SHIFT;
}

fn deserialize_sync_source(src: &mut TcoSyncSource, quad: &u32) {
    match (*quad & TCO2_INPUT_MASK) >> TCO2_INPUT_SHIFT {
        0 => *src = TcoSyncSource::WordClock,
        1 => *src = TcoSyncSource::Video,
        2 => *src = TcoSyncSource::Ltc,
        _ => (),
    }
}

/// Base rate of sampling clock in TCO module.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum TcoBaseRate {
    R44100,
    R48000,
}

impl Default for TcoBaseRate {
    fn default() -> Self {
        Self::R44100
    }
}

impl TcoBaseRate {
    pub fn hz(&self) -> u32 {
        match self {
            Self::R44100 => 44100,
            Self::R48000 => 48000,
        }
    }

    /// The rate which follows base frequency of the card. 32.0 kHz is out of support by TCO.
    pub fn from_card(base: ClkBaseFreq) -> Self {
        match base {
            ClkBaseFreq::R48000 => Self::R48000,
            ClkBaseFreq::R32000 | ClkBaseFreq::R44100 => Self::R44100,
        }
    }
}

/// Sample rate of TCO module.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum TcoSampleRate {
    R44100,
    R48000,
    /// Following the base frequency of the card, currently at the rate.
    FromApp(TcoBaseRate),
}

impl Default for TcoSampleRate {
    fn default() -> Self {
        Self::R44100
    }
}

impl TcoSampleRate {
    /// The base rate actually used by TCO module.
    pub fn base_rate(&self) -> TcoBaseRate {
        match self {
            Self::R44100 => TcoBaseRate::R44100,
            Self::R48000 => TcoBaseRate::R48000,
            Self::FromApp(rate) => *rate,
        }
    }
}

fn serialize_sample_rate(rate: &TcoSampleRate, quad: &mut u32) {
    *quad &= !(TCO2_SET_FREQ_MASK | TCO2_FREQ_FROM_APP_MASK);
    if rate.base_rate() == TcoBaseRate::R48000 {
        *quad |= TCO2_SET_FREQ_MASK;
    }
    if let TcoSampleRate::FromApp(_) = rate {
        *quad |= TCO2_FREQ_FROM_APP_MASK;
    }
}

fn deserialize_sample_rate(rate: &mut TcoSampleRate, quad: &u32) {
    let base = if *quad & TCO2_SET_FREQ_MASK > 0 {
        TcoBaseRate::R48000
    } else {
        TcoBaseRate::R44100
    };
    *rate = if *quad & TCO2_FREQ_FROM_APP_MASK > 0 {
        TcoSampleRate::FromApp(base)
    } else {
        match base {
            TcoBaseRate::R44100 => TcoSampleRate::R44100,
            TcoBaseRate::R48000 => TcoSampleRate::R48000,
        }
    };
}

/// Pull up or down of sampling clock.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum TcoPull {
    None,
    /// +0.1%.
    Up,
    /// -0.1%.
    Down,
    /// +4%.
    UpFour,
    /// -4%.
    DownFour,
}

impl Default for TcoPull {
    fn default() -> Self {
        Self::None
    }
}

fn serialize_pull(pull: &TcoPull, quad: &mut u32) {
    *quad &= !(TCO2_SET_01_4_MASK | TCO2_PULL_DOWN_MASK | TCO2_PULL_UP_MASK);
    *quad |= match pull {
        TcoPull::None => 0,
        TcoPull::Up => TCO2_PULL_UP_MASK,
        TcoPull::Down => TCO2_PULL_DOWN_MASK,
        TcoPull::UpFour => TCO2_PULL_UP_MASK | TCO2_SET_01_4_MASK,
        TcoPull::DownFour => TCO2_PULL_DOWN_MASK | TCO2_SET_01_4_MASK,
    };
}

fn deserialize_pull(pull: &mut TcoPull, quad: &u32) {
    let four = *quad & TCO2_SET_01_4_MASK > 0;
    *pull = if *quad & TCO2_PULL_UP_MASK > 0 {
        if four {
            TcoPull::UpFour
        } else {
            TcoPull::Up
        }
    } else if *quad & TCO2_PULL_DOWN_MASK > 0 {
        if four {
            TcoPull::DownFour
        } else {
            TcoPull::Down
        }
    } else {
        TcoPull::None
    };
}

/// Conversion of word clock between input and output.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum WordClockConversion {
    /// 1:1.
    Identical,
    /// 44.1 kHz to 48.0 kHz.
    From441To480,
    /// 48.0 kHz to 44.1 kHz.
    From480To441,
}

impl Default for WordClockConversion {
    fn default() -> Self {
        Self::Identical
    }
}

fn serialize_wck_conversion(conv: &WordClockConversion, quad: &mut u32) {
    let code = match conv {
        WordClockConversion::Identical => 0,
        WordClockConversion::From441To480 => 1,
        WordClockConversion::From480To441 => 2,
    };
    *quad &= !TCO2_WCK_IO_RATIO_MASK;
    *quad |= code << TCO2_WCK_IO_RATIO_SHIFT;
}

fn deserialize_wck_conversion(conv: &mut WordClockConversion, quad: &u32) {
    match (*quad & TCO2_WCK_IO_RATIO_MASK) >> TCO2_WCK_IO_RATIO_SHIFT {
        0 => *conv = WordClockConversion::Identical,
        1 => *conv = WordClockConversion::From441To480,
        2 => *conv = WordClockConversion::From480To441,
        _ => (),
    }
}

/// Configuration of TCO module.
#[derive(Default, Debug, Copy, Clone, PartialEq, Eq)]
pub struct TcoConfig {
    pub sync_source: TcoSyncSource,
    /// The frame rate of LTC output.
    pub ltc_rate: LtcFrameRate,
    /// Whether LTC output is in drop frame format.
    pub ltc_drop_frame: bool,
    pub sample_rate: TcoSampleRate,
    pub pull: TcoPull,
    pub wck_conversion: WordClockConversion,
    /// Whether to terminate word clock input by 75 Ohm.
    pub term_75r: bool,
    /// The speed of word clock output.
    pub wck_out_speed: WordClockSpeed,
    /// Whether to run LTC output.
    pub ltc_run: bool,
    pub ltc_flywheel: bool,
}

impl HdspeQuadletsSerialize<TcoConfig> for HdspeTcoProtocol {
    fn serialize_quadlets(params: &TcoConfig) -> Vec<u32> {
        let mut quad1 = 0;
        serialize_wck_speed(&params.wck_out_speed, &mut quad1);
        serialize_ltc_format(&params.ltc_rate, params.ltc_drop_frame, &mut quad1);

        let mut quad2 = 0;
        serialize_sync_source(&params.sync_source, &mut quad2);
        serialize_wck_conversion(&params.wck_conversion, &mut quad2);
        serialize_sample_rate(&params.sample_rate, &mut quad2);
        if params.term_75r {
            quad2 |= TCO2_TERM_75R_MASK;
        }
        serialize_pull(&params.pull, &mut quad2);
        if params.ltc_run {
            quad2 |= TCO2_TC_RUN_MASK;
        }
        if params.ltc_flywheel {
            quad2 |= TCO2_FLYWHEEL_MASK;
        }

        vec![0, quad1, quad2, 0]
    }
}

impl HdspeQuadletsDeserialize<TcoConfig> for HdspeTcoProtocol {
    fn deserialize_quadlets(params: &mut TcoConfig, raw: &[u32]) {
        assert!(raw.len() >= TCO_QUADLET_COUNT);

        let quad1 = raw[1];
        deserialize_wck_speed(&mut params.wck_out_speed, &quad1);
        deserialize_ltc_format(&mut params.ltc_rate, &mut params.ltc_drop_frame, &quad1);

        let quad2 = raw[2];
        deserialize_sync_source(&mut params.sync_source, &quad2);
        deserialize_wck_conversion(&mut params.wck_conversion, &quad2);
        deserialize_sample_rate(&mut params.sample_rate, &quad2);
        params.term_75r = quad2 & TCO2_TERM_75R_MASK > 0;
        deserialize_pull(&mut params.pull, &quad2);
        params.ltc_run = quad2 & TCO2_TC_RUN_MASK > 0;
        params.ltc_flywheel = quad2 & TCO2_FLYWHEEL_MASK > 0;
    }
}

impl HdspeWhollyUpdatableParamsOperation<TcoConfig> for HdspeTcoProtocol {
    fn update_wholly<R: HdspeRegisterIo>(io: &mut R, params: &TcoConfig) -> Vec<u32> {
        let raw = Self::serialize_quadlets(params);
        raw.iter()
            .enumerate()
            .for_each(|(n, &quad)| Self::write_quadlet(io, n, quad));
        raw
    }
}

impl HdspeTcoProtocol {
    pub fn read_quadlet<R: HdspeRegisterIo>(io: &R, n: usize) -> u32 {
        io.read_quadlet(TCO_READ_OFFSET + 4 * n)
    }

    pub fn write_quadlet<R: HdspeRegisterIo>(io: &mut R, n: usize, quad: u32) {
        io.write_quadlet(TCO_WRITE_OFFSET + 4 * n, quad & TCO_WRITE_MASK);
    }

    /// Read the time code of LTC input and the fields of status quadlet 1 coherently.
    pub fn read_ltc<R: HdspeRegisterIo>(io: &R) -> (TimeCode, TcoStatusFields) {
        let tc = Self::read_quadlet(io, 0);
        let mut quad1 = Self::read_quadlet(io, 1);
        let ltc = Self::read_quadlet(io, 0);
        if ltc != tc {
            // The time code changed while reading quadlet 1.
            quad1 = Self::read_quadlet(io, 1);
        }
        (TimeCode(ltc), decode_status_fields(quad1))
    }

    /// Request hardware to start the time code after the number of frames since the next audio
    /// period interrupt.
    pub fn write_timecode<R: HdspeRegisterIo>(io: &mut R, tc: TimeCode, offset: i32, quad1: u32) {
        let mut quad = quad1 & 0x0000ffff;
        serialize_offset(offset as u16, &mut quad);
        quad |= TCO1_SET_TC_MASK;

        Self::write_quadlet(io, 0, tc.0);
        Self::write_quadlet(io, 1, quad);
    }

    /// Clear the request and the offset after hardware picked them up.
    pub fn reset_timecode<R: HdspeRegisterIo>(io: &mut R, quad1: u32) {
        Self::write_quadlet(io, 1, quad1 & 0x0000ffff & !TCO1_SET_TC_MASK);
    }

    /// Set or clear the bit to run time code in cached quadlet 2, then write it.
    pub fn write_ltc_run<R: HdspeRegisterIo>(io: &mut R, run: bool, quad2: &mut u32) {
        if run {
            *quad2 |= TCO2_TC_RUN_MASK;
        } else {
            *quad2 &= !TCO2_TC_RUN_MASK;
        }
        Self::write_quadlet(io, 2, *quad2);
    }

    /// Set or clear the bit for 48.0 kHz in cached quadlet 2, then write it.
    pub fn write_base_rate<R: HdspeRegisterIo>(io: &mut R, rate: TcoBaseRate, quad2: &mut u32) {
        *quad2 &= !TCO2_SET_FREQ_MASK;
        if rate == TcoBaseRate::R48000 {
            *quad2 |= TCO2_SET_FREQ_MASK;
        }
        Self::write_quadlet(io, 2, *quad2);
    }

    /// The base rate selected in cached quadlet 2.
    pub fn base_rate(quad2: u32) -> TcoBaseRate {
        if quad2 & TCO2_SET_FREQ_MASK > 0 {
            TcoBaseRate::R48000
        } else {
            TcoBaseRate::R44100
        }
    }

    /// The number of frames which hardware requires to start LTC output, measured in single
    /// speed.
    pub fn ltc_startup_latency(rate: LtcFrameRate, base: TcoBaseRate) -> u32 {
        match (rate, base) {
            (LtcFrameRate::Fps24, TcoBaseRate::R44100) => 13,
            (LtcFrameRate::Fps24, TcoBaseRate::R48000) => 16,
            (LtcFrameRate::Fps25, TcoBaseRate::R44100) => 15,
            (LtcFrameRate::Fps25, TcoBaseRate::R48000) => 16,
            (LtcFrameRate::Fps2997, TcoBaseRate::R44100) => 13,
            (LtcFrameRate::Fps2997, TcoBaseRate::R48000) => 14,
            (LtcFrameRate::Fps30, TcoBaseRate::R44100) => 13,
            (LtcFrameRate::Fps30, TcoBaseRate::R48000) => 14,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn status_fields_serdes() {
        [
            0x00000000, 0xffffffff, 0x7f7f7f7f, 0x80808080, 0x12345678, 0x5a5a5a5a, 0xa5a5a5a5,
            0x0040007f, 0x7f000c00, 0x3c7e0a55,
        ]
        .iter()
        .for_each(|&quad| {
            let fields = decode_status_fields(quad);
            assert_eq!(encode_status_fields(&fields), quad & TCO_WRITE_MASK, "{:08x}", quad);
        });

        // Walk all of bits as well.
        (0..32).for_each(|i| {
            let quad = 1u32 << i;
            let fields = decode_status_fields(quad);
            assert_eq!(encode_status_fields(&fields), quad & TCO_WRITE_MASK);
        });
    }

    #[test]
    fn status_fields_decode() {
        let fields = decode_status_fields(0x02052a5f);
        assert_eq!(fields.lock, true);
        assert_eq!(fields.wck_speed, WordClockSpeed::Reserved);
        assert_eq!(fields.ltc_valid, true);
        assert_eq!(fields.wck_valid, true);
        assert_eq!(fields.video, VideoFormat::Pal);
        assert_eq!(fields.set_tc, false);
        assert_eq!(fields.ltc_drop_frame, true);
        assert_eq!(fields.ltc_rate, LtcFrameRate::Fps2997);
        assert_eq!(fields.quarter_frame, 2);
        assert_eq!(fields.new_quarter_frame, false);
        assert_eq!(fields.ltc_offset, 0x0105);
    }

    #[test]
    fn status_serdes() {
        let raw = [0x01020304, 0x00000409, 0x28007f7f, 0x0b000000];
        let mut status = TcoStatus::default();
        HdspeTcoProtocol::deserialize_quadlets(&mut status, &raw);
        assert_eq!(status.ltc, TimeCode::compose(1, 2, 3, 4));
        assert_eq!(status.fields.ltc_rate, LtcFrameRate::Fps25);
        assert_eq!(status.fs_period_counter, 0x3fff);
        assert_eq!(status.video_fps, VideoFrameRate::F30);
        assert_eq!(status.fw_version, 11);
        assert_eq!(HdspeTcoProtocol::serialize_quadlets(&status), raw.to_vec());
    }

    #[test]
    fn config_serdes() {
        let params = TcoConfig {
            sync_source: TcoSyncSource::Ltc,
            ltc_rate: LtcFrameRate::Fps30,
            ltc_drop_frame: true,
            sample_rate: TcoSampleRate::FromApp(TcoBaseRate::R48000),
            pull: TcoPull::DownFour,
            wck_conversion: WordClockConversion::From480To441,
            term_75r: true,
            wck_out_speed: WordClockSpeed::Quadruple,
            ltc_run: true,
            ltc_flywheel: false,
        };
        let raw = HdspeTcoProtocol::serialize_quadlets(&params);
        assert_eq!(raw, vec![0, 0x00000e04, 0xdb050000, 0]);

        let mut p = TcoConfig::default();
        HdspeTcoProtocol::deserialize_quadlets(&mut p, &raw);
        assert_eq!(params, p);

        let raw = HdspeTcoProtocol::serialize_quadlets(&TcoConfig::default());
        assert_eq!(raw, vec![0; 4]);
    }

    #[test]
    fn pull_serdes() {
        [
            (TcoPull::None, 0x00000000),
            (TcoPull::Up, 0x04000000),
            (TcoPull::Down, 0x02000000),
            (TcoPull::UpFour, 0x05000000),
            (TcoPull::DownFour, 0x03000000),
        ]
        .iter()
        .for_each(|&(pull, expected)| {
            let mut quad = 0;
            serialize_pull(&pull, &mut quad);
            assert_eq!(quad, expected);
            let mut p = TcoPull::default();
            deserialize_pull(&mut p, &quad);
            assert_eq!(p, pull);
        });
    }

    #[derive(Default)]
    struct Registers {
        read: Vec<u32>,
        written: Vec<(usize, u32)>,
    }

    impl HdspeRegisterIo for Registers {
        fn read_quadlet(&self, offset: usize) -> u32 {
            let n = (offset - TCO_READ_OFFSET) / 4;
            self.read[n]
        }

        fn write_quadlet(&mut self, offset: usize, value: u32) {
            self.written.push((offset, value));
        }
    }

    #[test]
    fn timecode_writes() {
        let mut regs = Registers::default();
        let tc = TimeCode::compose(10, 20, 30, 12);

        HdspeTcoProtocol::write_timecode(&mut regs, tc, 0x0181, 0x0bad0e04);
        assert_eq!(
            regs.written,
            vec![(TCO_WRITE_OFFSET, 0x10203012), (TCO_WRITE_OFFSET + 4, 0x03010f04)]
        );

        regs.written.clear();
        HdspeTcoProtocol::reset_timecode(&mut regs, 0x03010f04);
        assert_eq!(regs.written, vec![(TCO_WRITE_OFFSET + 4, 0x00000e04)]);

        regs.written.clear();
        let mut quad2 = 0x80000000;
        HdspeTcoProtocol::write_ltc_run(&mut regs, true, &mut quad2);
        assert_eq!(quad2, 0x80010000);
        assert_eq!(regs.written, vec![(TCO_WRITE_OFFSET + 8, 0x00010000)]);
    }

    #[test]
    fn ltc_read() {
        let regs = Registers {
            read: vec![0x01000000, 0x00050000, 0, 0],
            ..Default::default()
        };
        let (tc, fields) = HdspeTcoProtocol::read_ltc(&regs);
        assert_eq!(tc, TimeCode::compose(1, 0, 0, 0));
        assert_eq!(fields.ltc_offset, 5);
    }

    #[test]
    fn startup_latency() {
        assert_eq!(
            HdspeTcoProtocol::ltc_startup_latency(LtcFrameRate::Fps24, TcoBaseRate::R48000),
            16
        );
        assert_eq!(
            HdspeTcoProtocol::ltc_startup_latency(LtcFrameRate::Fps25, TcoBaseRate::R44100),
            15
        );
        assert_eq!(
            HdspeTcoProtocol::ltc_startup_latency(LtcFrameRate::Fps2997, TcoBaseRate::R44100),
            13
        );
    }
}
