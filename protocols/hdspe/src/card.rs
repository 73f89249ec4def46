// SPDX-License-Identifier: LGPL-3.0-or-later
// Copyright (c) 2021 Takashi Sakamoto

//! Protocol about control and status registers of the card itself.

use super::*;

/// Unique protocol for control and status registers of the card.
#[derive(Default, Debug)]
pub struct HdspeCardProtocol;

// Read-side address space.
pub const STATUS0_OFFSET: usize = 0;
pub const STATUS2_OFFSET: usize = 192;

// Write-side address space.
pub const CONTROL_OFFSET: usize = 64;
pub const IRQ_CONFIRM_OFFSET: usize = 96;

// For control register.
const CTL_START_MASK: u32 = 0x00000001;
const CTL_LATENCY_MASK: u32 = 0x0000000e;
const CTL_LATENCY_SHIFT: usize = 1;
const CTL_AUDIO_IRQ_ENABLE_MASK: u32 = 0x00000020;
const CTL_FREQ_MASK: u32 = 0x000000c0;
const CTL_FREQ_32000_FLAG: u32 = 0x00000040;
const CTL_FREQ_44100_FLAG: u32 = 0x00000080;
const CTL_FREQ_48000_FLAG: u32 = 0x000000c0;
const CTL_DOUBLE_SPEED_MASK: u32 = 0x00000100;
const CTL_QUAD_SPEED_MASK: u32 = 0x80000000;

// For status register 0.
const STATUS0_AUDIO_IRQ_PENDING_MASK: u32 = 0x00000001;
const STATUS0_BUF_PTR_MASK: u32 = 0x0000ffc0;
const STATUS0_BUF_PTR_SHIFT: usize = 6;
const STATUS0_TCO_DETECT_MASK: u32 = 0x08000000;

// For status register 2.
const STATUS2_TCO_DETECT_MASK: u32 = 0x00000008;

/// The maximum value of latency code.
pub const LATENCY_CODE_MAX: u8 = 7;

/// The number of frames in which the hardware pointer wraps around.
pub const HW_POINTER_SPAN: u32 = (1 << 16) / 4;

/// Parameters in control register which the core cares about.
#[derive(Default, Debug, Copy, Clone, PartialEq, Eq)]
pub struct HdspeControl {
    /// Whether to start audio engine.
    pub start: bool,
    /// The code of latency, between 0 and 7.
    pub latency: u8,
    /// Whether to generate interrupt per period.
    pub audio_irq_enable: bool,
    /// The nominal rate of internal sampling clock.
    pub rate: ClkNominalRate,
}

fn serialize_base_freq(freq: &ClkBaseFreq, quad: &mut u32) {
    *quad &= !CTL_FREQ_MASK;
    *quad |= match freq {
        ClkBaseFreq::R32000 => CTL_FREQ_32000_FLAG,
        ClkBaseFreq::R44100 => CTL_FREQ_44100_FLAG,
        ClkBaseFreq::R48000 => CTL_FREQ_48000_FLAG,
    };
}

fn deserialize_base_freq(freq: &mut ClkBaseFreq, quad: &u32) {
    match *quad & CTL_FREQ_MASK {
        CTL_FREQ_32000_FLAG => *freq = ClkBaseFreq::R32000,
        CTL_FREQ_44100_FLAG => *freq = ClkBaseFreq::R44100,
        CTL_FREQ_48000_FLAG => *freq = ClkBaseFreq::R48000,
        // The frequency bits are never cleared by the driver.
        _ => (),
    }
}

fn serialize_speed(speed: &ClkSpeed, quad: &mut u32) {
    *quad &= !(CTL_DOUBLE_SPEED_MASK | CTL_QUAD_SPEED_MASK);
    *quad |= match speed {
        ClkSpeed::Single => 0,
        ClkSpeed::Double => CTL_DOUBLE_SPEED_MASK,
        ClkSpeed::Quadruple => CTL_QUAD_SPEED_MASK,
    };
}

fn deserialize_speed(speed: &mut ClkSpeed, quad: &u32) {
    *speed = if *quad & CTL_QUAD_SPEED_MASK > 0 {
        ClkSpeed::Quadruple
    } else if *quad & CTL_DOUBLE_SPEED_MASK > 0 {
        ClkSpeed::Double
    } else {
        ClkSpeed::Single
    };
}

impl HdspeQuadletsSerialize<HdspeControl> for HdspeCardProtocol {
    fn serialize_quadlets(params: &HdspeControl) -> Vec<u32> {
        let mut quad = 0;

        if params.start {
            quad |= CTL_START_MASK;
        }

        quad |= ((params.latency.min(LATENCY_CODE_MAX) as u32) << CTL_LATENCY_SHIFT)
            & CTL_LATENCY_MASK;

        if params.audio_irq_enable {
            quad |= CTL_AUDIO_IRQ_ENABLE_MASK;
        }

        serialize_base_freq(&params.rate.base(), &mut quad);
        serialize_speed(&params.rate.speed(), &mut quad);

        vec![quad]
    }
}

impl HdspeQuadletsDeserialize<HdspeControl> for HdspeCardProtocol {
    fn deserialize_quadlets(params: &mut HdspeControl, raw: &[u32]) {
        assert!(raw.len() >= 1);

        let quad = raw[0];

        params.start = quad & CTL_START_MASK > 0;
        params.latency = ((quad & CTL_LATENCY_MASK) >> CTL_LATENCY_SHIFT) as u8;
        params.audio_irq_enable = quad & CTL_AUDIO_IRQ_ENABLE_MASK > 0;

        let mut base = params.rate.base();
        let mut speed = params.rate.speed();
        deserialize_base_freq(&mut base, &quad);
        deserialize_speed(&mut speed, &quad);
        params.rate = ClkNominalRate::from_parts(base, speed);
    }
}

impl HdspeWhollyUpdatableParamsOperation<HdspeControl> for HdspeCardProtocol {
    fn update_wholly<R: HdspeRegisterIo>(io: &mut R, params: &HdspeControl) -> Vec<u32> {
        let raw = Self::serialize_quadlets(params);
        io.write_quadlet(CONTROL_OFFSET, raw[0]);
        raw
    }
}

/// Status of the card read from status registers 0 and 2.
#[derive(Default, Debug, Copy, Clone, PartialEq, Eq)]
pub struct HdspeCardStatus {
    /// Whether the interrupt of audio period is pending.
    pub audio_irq_pending: bool,
    /// The position of buffer in unit of 64 bytes.
    pub buf_ptr: u16,
    /// The bit to detect TCO module in status register 0, used by MADI and AES.
    pub tco_detect_status0: bool,
    /// The bit to detect TCO module in status register 2, used by RayDAT, AIO and AIO Pro.
    pub tco_detect_status2: bool,
}

impl HdspeCardStatus {
    /// The position of hardware pointer in unit of frame, wrapping around every
    /// [`HW_POINTER_SPAN`].
    pub fn hw_pointer(&self) -> u16 {
        (self.buf_ptr << 4) & (HW_POINTER_SPAN - 1) as u16
    }

    /// Whether TCO module is attached to the card of the type. MADIface has no slot for it.
    pub fn tco_present(&self, io_type: IoType) -> bool {
        match io_type {
            IoType::Madi | IoType::Aes => self.tco_detect_status0,
            IoType::RayDat | IoType::Aio | IoType::AioPro => self.tco_detect_status2,
            IoType::MadiFace => false,
        }
    }
}

impl HdspeQuadletsSerialize<HdspeCardStatus> for HdspeCardProtocol {
    fn serialize_quadlets(params: &HdspeCardStatus) -> Vec<u32> {
        let mut status0 = ((params.buf_ptr as u32) << STATUS0_BUF_PTR_SHIFT) & STATUS0_BUF_PTR_MASK;
        if params.audio_irq_pending {
            status0 |= STATUS0_AUDIO_IRQ_PENDING_MASK;
        }
        if params.tco_detect_status0 {
            status0 |= STATUS0_TCO_DETECT_MASK;
        }

        let mut status2 = 0;
        if params.tco_detect_status2 {
            status2 |= STATUS2_TCO_DETECT_MASK;
        }

        vec![status0, status2]
    }
}

impl HdspeQuadletsDeserialize<HdspeCardStatus> for HdspeCardProtocol {
    fn deserialize_quadlets(params: &mut HdspeCardStatus, raw: &[u32]) {
        assert!(raw.len() >= 2);

        let status0 = raw[0];
        params.audio_irq_pending = status0 & STATUS0_AUDIO_IRQ_PENDING_MASK > 0;
        params.buf_ptr = ((status0 & STATUS0_BUF_PTR_MASK) >> STATUS0_BUF_PTR_SHIFT) as u16;
        params.tco_detect_status0 = status0 & STATUS0_TCO_DETECT_MASK > 0;

        let status2 = raw[1];
        params.tco_detect_status2 = status2 & STATUS2_TCO_DETECT_MASK > 0;
    }
}

impl HdspeCacheableParamsOperation<HdspeCardStatus> for HdspeCardProtocol {
    fn cache_wholly<R: HdspeRegisterIo>(io: &R, params: &mut HdspeCardStatus) {
        let raw = [
            io.read_quadlet(STATUS0_OFFSET),
            io.read_quadlet(STATUS2_OFFSET),
        ];
        Self::deserialize_quadlets(params, &raw);
    }
}

impl HdspeCardProtocol {
    /// Acknowledge the pending interrupt of audio period.
    pub fn confirm_audio_irq<R: HdspeRegisterIo>(io: &mut R) {
        io.write_quadlet(IRQ_CONFIRM_OFFSET, 0);
    }

    /// The number of frames per period for the latency code.
    pub fn period_size(latency: u8, io_type: IoType) -> u32 {
        if latency >= LATENCY_CODE_MAX {
            if io_type.is_raio() {
                32
            } else {
                8192
            }
        } else {
            64 << latency
        }
    }

    /// The latency code for the number of frames per period, if the card supports it.
    pub fn latency_code(period_size: u32, io_type: IoType) -> Option<u8> {
        (0..=LATENCY_CODE_MAX).find(|&latency| Self::period_size(latency, io_type) == period_size)
    }

    /// The number of frames in hardware buffer.
    pub fn hw_buffer_size(period_size: u32, io_type: IoType) -> u32 {
        if io_type.is_raio() {
            HW_POINTER_SPAN
        } else {
            2 * period_size
        }
    }
}
