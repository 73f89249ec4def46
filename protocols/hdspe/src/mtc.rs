// SPDX-License-Identifier: LGPL-3.0-or-later
// Copyright (c) 2021 Takashi Sakamoto

//! MIDI Time Code (MTC) messages delivered by TCO module.

const SYSEX_START: u8 = 0xf0;
const SYSEX_END: u8 = 0xf7;
const QUARTER_FRAME: u8 = 0xf1;

// Universal real time, all devices, MTC, full message.
const FULL_FRAME_HEADER: [u8; 5] = [SYSEX_START, 0x7f, 0x7f, 0x01, 0x01];
const FULL_FRAME_SIZE: usize = 10;

const HOURS_MASK: u8 = 0x1f;
const RATE_MASK: u8 = 0x60;
const RATE_SHIFT: usize = 5;

/// Message of MIDI time code.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum MtcMessage {
    /// Full time code in system exclusive message.
    FullFrame {
        /// The code of frame rate; 0 for 24, 1 for 25, 2 for 29.97 drop frame, 3 for 30.
        rate: u8,
        hours: u8,
        minutes: u8,
        seconds: u8,
        frames: u8,
    },
    /// Quarter frame message.
    QuarterFrame {
        /// The number of piece, between 0 and 7.
        piece: u8,
        /// The nibble of time code.
        value: u8,
    },
}

impl MtcMessage {
    /// Parse the message. Any message unrelated to time code is rejected.
    pub fn parse(buf: &[u8]) -> Option<Self> {
        if buf.len() == FULL_FRAME_SIZE
            && buf[..FULL_FRAME_HEADER.len()] == FULL_FRAME_HEADER
            && buf[FULL_FRAME_SIZE - 1] == SYSEX_END
        {
            Some(Self::FullFrame {
                rate: (buf[5] & RATE_MASK) >> RATE_SHIFT,
                hours: buf[5] & HOURS_MASK,
                minutes: buf[6],
                seconds: buf[7],
                frames: buf[8],
            })
        } else if buf.len() == 2 && buf[0] == QUARTER_FRAME && buf[1] < 0x80 {
            Some(Self::QuarterFrame {
                piece: buf[1] >> 4,
                value: buf[1] & 0x0f,
            })
        } else {
            None
        }
    }

    /// Whether the message is sent at the boundary of time code frame. The quarter frame
    /// messages for piece 0 and 4 are at the boundary.
    pub fn is_frame_boundary(&self) -> bool {
        match self {
            Self::FullFrame { .. } => true,
            Self::QuarterFrame { piece, .. } => *piece == 0 || *piece == 4,
        }
    }
}
