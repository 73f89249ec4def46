// SPDX-License-Identifier: LGPL-3.0-or-later
// Copyright (c) 2021 Takashi Sakamoto

//! Linear Time Code (LTC) packed in quadlet of TCO registers, and arithmetic on it.
//!
//! The quadlet includes four BCD fields; frames in byte 0, seconds in byte 1, minutes in byte 2,
//! and hours in byte 3. The most significant bit of each byte is used by hardware for
//! synchronization, thus ignored.

const FRAMES_MASK: u32 = 0x0000003f;
const SECONDS_MASK: u32 = 0x00007f00;
const MINUTES_MASK: u32 = 0x007f0000;
const HOURS_MASK: u32 = 0x3f000000;

const FRAMES_SHIFT: usize = 0;
const SECONDS_SHIFT: usize = 8;
const MINUTES_SHIFT: usize = 16;
const HOURS_SHIFT: usize = 24;

/// Frame rate of LTC.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum LtcFrameRate {
    Fps24,
    Fps25,
    /// 29.97 frames per second, NTSC.
    Fps2997,
    Fps30,
}

impl Default for LtcFrameRate {
    fn default() -> Self {
        Self::Fps24
    }
}

impl LtcFrameRate {
    pub const ALL: [Self; 4] = [Self::Fps24, Self::Fps25, Self::Fps2997, Self::Fps30];

    /// The nominal number of frames per second.
    pub fn fps(&self) -> u32 {
        match self {
            Self::Fps24 => 24,
            Self::Fps25 => 25,
            Self::Fps2997 => 30,
            Self::Fps30 => 30,
        }
    }

    /// The scale of real frame rate against nominal one, per mille.
    pub fn scale(&self) -> u32 {
        match self {
            Self::Fps24 => 1000,
            Self::Fps25 => 1000,
            Self::Fps2997 => 999,
            Self::Fps30 => 1000,
        }
    }

    /// The code in TCO registers.
    pub fn code(&self) -> u32 {
        match self {
            Self::Fps24 => 0,
            Self::Fps25 => 1,
            Self::Fps2997 => 2,
            Self::Fps30 => 3,
        }
    }

    pub fn from_code(code: u32) -> Option<Self> {
        Self::ALL.iter().find(|rate| rate.code() == code).copied()
    }
}

/// Format of LTC as combination of frame rate and drop frame flag.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum LtcFormat {
    Fps24,
    Fps25,
    Fps2997,
    Fps2997Df,
    Fps30,
    Fps30Df,
}

impl Default for LtcFormat {
    fn default() -> Self {
        Self::Fps24
    }
}

impl LtcFormat {
    pub const ALL: [Self; 6] = [
        Self::Fps24,
        Self::Fps25,
        Self::Fps2997,
        Self::Fps2997Df,
        Self::Fps30,
        Self::Fps30Df,
    ];

    /// The format for the pair of frame rate and drop frame flag. The flag is ignored for 24
    /// and 25 frames per second.
    pub fn from_parts(rate: LtcFrameRate, drop_frame: bool) -> Self {
        match (rate, drop_frame) {
            (LtcFrameRate::Fps24, _) => Self::Fps24,
            (LtcFrameRate::Fps25, _) => Self::Fps25,
            (LtcFrameRate::Fps2997, false) => Self::Fps2997,
            (LtcFrameRate::Fps2997, true) => Self::Fps2997Df,
            (LtcFrameRate::Fps30, false) => Self::Fps30,
            (LtcFrameRate::Fps30, true) => Self::Fps30Df,
        }
    }

    pub fn parts(&self) -> (LtcFrameRate, bool) {
        match self {
            Self::Fps24 => (LtcFrameRate::Fps24, false),
            Self::Fps25 => (LtcFrameRate::Fps25, false),
            Self::Fps2997 => (LtcFrameRate::Fps2997, false),
            Self::Fps2997Df => (LtcFrameRate::Fps2997, true),
            Self::Fps30 => (LtcFrameRate::Fps30, false),
            Self::Fps30Df => (LtcFrameRate::Fps30, true),
        }
    }
}

/// Time code packed in quadlet.
#[derive(Default, Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct TimeCode(pub u32);

impl std::fmt::Display for TimeCode {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let (h, m, s, frames) = self.decompose();
        write!(f, "{:02}:{:02}:{:02}:{:02}", h, m, s, frames)
    }
}

impl std::str::FromStr for TimeCode {
    type Err = String;

    /// Parse the string formatted as "hh:mm:ss:ff".
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let fields = s
            .split(':')
            .map(|field| field.parse::<u8>())
            .collect::<Result<Vec<u8>, _>>()
            .map_err(|e| format!("Invalid time code '{}': {}", s, e))?;

        match fields[..] {
            [hours, minutes, seconds, frames]
                if hours < 24 && minutes < 60 && seconds < 60 && frames < 30 =>
            {
                Ok(Self::compose(hours, minutes, seconds, frames))
            }
            _ => Err(format!("Invalid time code '{}', expected hh:mm:ss:ff", s)),
        }
    }
}

fn to_bcd(val: u32) -> u32 {
    ((val / 10) << 4) | (val % 10)
}

fn from_bcd(bcd: u32) -> u32 {
    (bcd >> 4) * 10 + (bcd & 0x0f)
}

// At the first second of each minute except for multiples of 10, frames 0 and 1 are skipped.
const DF_FRAMES_PER_MINUTE: i64 = 30 * 60 - 2;
const DF_FRAMES_PER_TEN_MINUTES_FIRST: i64 = 30 * 60;
const DF_FRAMES_PER_TEN_MINUTES: i64 = DF_FRAMES_PER_TEN_MINUTES_FIRST + 9 * DF_FRAMES_PER_MINUTE;

fn is_drop_frame_rate(fps: u32, drop_frame: bool) -> bool {
    drop_frame && fps == 30
}

fn is_dropped(minutes: u32, seconds: u32, frames: u32, fps: u32, drop_frame: bool) -> bool {
    is_drop_frame_rate(fps, drop_frame) && seconds == 0 && frames < 2 && minutes % 10 > 0
}

/// The number of time code frames in a day.
pub fn frames_per_day(fps: u32, drop_frame: bool) -> i64 {
    if is_drop_frame_rate(fps, drop_frame) {
        DF_FRAMES_PER_TEN_MINUTES * 6 * 24
    } else {
        fps as i64 * 24 * 60 * 60
    }
}

impl TimeCode {
    /// No time code is pending.
    pub const NONE: Self = Self(0xffffffff);

    /// All of value bits are set. The time code means current time of real time clock.
    pub const WALL_CLOCK: Self = Self(0x3f7f7f3f);

    pub const VALUE_MASK: u32 = HOURS_MASK | MINUTES_MASK | SECONDS_MASK | FRAMES_MASK;

    pub fn compose(hours: u8, minutes: u8, seconds: u8, frames: u8) -> Self {
        let mut quad = 0;
        quad |= (to_bcd(hours as u32) << HOURS_SHIFT) & HOURS_MASK;
        quad |= (to_bcd(minutes as u32) << MINUTES_SHIFT) & MINUTES_MASK;
        quad |= (to_bcd(seconds as u32) << SECONDS_SHIFT) & SECONDS_MASK;
        quad |= (to_bcd(frames as u32) << FRAMES_SHIFT) & FRAMES_MASK;
        Self(quad)
    }

    /// Hours, minutes, seconds and frames.
    pub fn decompose(&self) -> (u8, u8, u8, u8) {
        (
            from_bcd((self.0 & HOURS_MASK) >> HOURS_SHIFT) as u8,
            from_bcd((self.0 & MINUTES_MASK) >> MINUTES_SHIFT) as u8,
            from_bcd((self.0 & SECONDS_MASK) >> SECONDS_SHIFT) as u8,
            from_bcd((self.0 & FRAMES_MASK) >> FRAMES_SHIFT) as u8,
        )
    }

    pub fn is_none(&self) -> bool {
        *self == Self::NONE
    }

    pub fn is_wall_clock(&self) -> bool {
        self.0 & Self::VALUE_MASK == Self::VALUE_MASK
    }

    fn step_forward(h: &mut u32, m: &mut u32, s: &mut u32, f: &mut u32, fps: u32) {
        *f += 1;
        if *f < fps {
            return;
        }
        *f = 0;
        *s += 1;
        if *s < 60 {
            return;
        }
        *s = 0;
        *m += 1;
        if *m < 60 {
            return;
        }
        *m = 0;
        *h += 1;
        if *h >= 24 {
            *h = 0;
        }
    }

    fn step_backward(h: &mut u32, m: &mut u32, s: &mut u32, f: &mut u32, fps: u32) {
        if *f > 0 {
            *f = (*f - 1).min(fps - 1);
            return;
        }
        *f = fps - 1;
        if *s > 0 {
            *s -= 1;
            return;
        }
        *s = 59;
        if *m > 0 {
            *m -= 1;
            return;
        }
        *m = 59;
        *h = if *h > 0 { *h - 1 } else { 23 };
    }

    fn step<F>(&self, fps: u32, drop_frame: bool, stepper: F) -> Self
    where
        F: Fn(&mut u32, &mut u32, &mut u32, &mut u32, u32),
    {
        let fps = fps.max(1);
        let (h, m, s, f) = self.decompose();
        let (mut h, mut m, mut s, mut f) = (h as u32, m as u32, s as u32, f as u32);

        loop {
            stepper(&mut h, &mut m, &mut s, &mut f, fps);
            if !is_dropped(m, s, f, fps, drop_frame) {
                break;
            }
        }

        Self::compose(h as u8, m as u8, s as u8, f as u8)
    }

    /// The next time code. It rolls over at 24 hours.
    pub fn increment(&self, fps: u32, drop_frame: bool) -> Self {
        self.step(fps, drop_frame, Self::step_forward)
    }

    /// The previous time code. It rolls back at 0 hour.
    pub fn decrement(&self, fps: u32, drop_frame: bool) -> Self {
        self.step(fps, drop_frame, Self::step_backward)
    }

    /// The number of frames since 00:00:00:00.
    pub fn to_frame_number(&self, fps: u32, drop_frame: bool) -> i64 {
        let fps = fps.max(1);
        let (h, m, s, f) = self.decompose();
        let minutes = h as i64 * 60 + m as i64;
        let seconds = s as i64;
        let frames = (f as u32).min(fps - 1) as i64;

        if is_drop_frame_rate(fps, drop_frame) {
            let tens = minutes / 10;
            let units = minutes % 10;
            let within = if units == 0 {
                seconds * 30 + frames
            } else {
                // The first two frames of the minute are skipped.
                let frames = if seconds == 0 { frames.max(2) } else { frames };
                DF_FRAMES_PER_TEN_MINUTES_FIRST
                    + (units - 1) * DF_FRAMES_PER_MINUTE
                    + seconds * 30
                    + frames
                    - 2
            };
            tens * DF_FRAMES_PER_TEN_MINUTES + within
        } else {
            (minutes * 60 + seconds) * fps as i64 + frames
        }
    }

    /// The time code at the number of frames since 00:00:00:00. It wraps at 24 hours.
    pub fn from_frame_number(number: i64, fps: u32, drop_frame: bool) -> Self {
        let fps = fps.max(1);
        let number = number.rem_euclid(frames_per_day(fps, drop_frame));

        let (minutes, seconds, frames) = if is_drop_frame_rate(fps, drop_frame) {
            let tens = number / DF_FRAMES_PER_TEN_MINUTES;
            let within = number % DF_FRAMES_PER_TEN_MINUTES;
            if within < DF_FRAMES_PER_TEN_MINUTES_FIRST {
                (tens * 10, within / 30, within % 30)
            } else {
                let rest = within - DF_FRAMES_PER_TEN_MINUTES_FIRST;
                let units = 1 + rest / DF_FRAMES_PER_MINUTE;
                let pos = rest % DF_FRAMES_PER_MINUTE + 2;
                (tens * 10 + units, pos / 30, pos % 30)
            }
        } else {
            let fps = fps as i64;
            (number / fps / 60, (number / fps) % 60, number % fps)
        };

        Self::compose(
            (minutes / 60) as u8,
            (minutes % 60) as u8,
            seconds as u8,
            frames as u8,
        )
    }

    /// The time code after the number of frames, or before it if negative.
    pub fn add_frames(&self, frames: i32, fps: u32, drop_frame: bool) -> Self {
        let number = self.to_frame_number(fps, drop_frame) + frames as i64;
        Self::from_frame_number(number, fps, drop_frame)
    }

    /// Spread each nibble into the lower half of each byte in 64 bit layout used by ALSA
    /// control. User bits in the upper half are zero.
    pub fn to_ltc64(&self) -> u64 {
        (0..8).fold(0u64, |val, i| {
            let nibble = ((self.0 >> (i * 4)) & 0x0f) as u64;
            val | (nibble << (i * 8))
        })
    }

    /// Gather the lower half of each byte in 64 bit layout, discarding user bits.
    pub fn from_ltc64(val: u64) -> Self {
        let quad = (0..8).fold(0u32, |quad, i| {
            let nibble = ((val >> (i * 8)) & 0x0f) as u32;
            quad | (nibble << (i * 4))
        });
        Self(quad)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn compose_decompose() {
        let tc = TimeCode::compose(23, 59, 58, 29);
        assert_eq!(tc.0, 0x23595829);
        assert_eq!(tc.decompose(), (23, 59, 58, 29));

        // The sync bits are ignored.
        let tc = TimeCode(0x80808080 | 0x01020304);
        assert_eq!(tc.decompose(), (1, 2, 3, 4));

        assert!(TimeCode::WALL_CLOCK.is_wall_clock());
        assert!(TimeCode::NONE.is_none());
        assert!(!TimeCode::compose(12, 0, 0, 0).is_wall_clock());
        assert_eq!(TimeCode::compose(1, 2, 3, 4).to_string(), "01:02:03:04");
    }

    #[test]
    fn parse_string() {
        assert_eq!("01:02:03:04".parse(), Ok(TimeCode::compose(1, 2, 3, 4)));
        assert_eq!("23:59:59:29".parse(), Ok(TimeCode::compose(23, 59, 59, 29)));
        assert!("24:00:00:00".parse::<TimeCode>().is_err());
        assert!("00:00:00:30".parse::<TimeCode>().is_err());
        assert!("00:00:00".parse::<TimeCode>().is_err());
        assert!("aa:00:00:00".parse::<TimeCode>().is_err());
    }

    #[test]
    fn increment_rollover() {
        let tc = TimeCode::compose(23, 59, 59, 23);
        assert_eq!(tc.increment(24, false), TimeCode::compose(0, 0, 0, 0));

        let tc = TimeCode::compose(23, 59, 59, 24);
        assert_eq!(tc.increment(25, false), TimeCode::compose(0, 0, 0, 0));

        let tc = TimeCode::compose(0, 0, 0, 0);
        assert_eq!(tc.decrement(30, false), TimeCode::compose(23, 59, 59, 29));

        let tc = TimeCode::compose(10, 59, 59, 29);
        assert_eq!(tc.increment(30, false), TimeCode::compose(11, 0, 0, 0));
    }

    #[test]
    fn drop_frame_minute() {
        let tc = TimeCode::compose(0, 0, 59, 29);
        assert_eq!(tc.increment(30, true), TimeCode::compose(0, 1, 0, 2));
        assert_eq!(tc.increment(30, false), TimeCode::compose(0, 1, 0, 0));

        // No frame is skipped at minutes divisible by 10.
        (0..24).for_each(|hours| {
            [0, 10, 20, 30, 40, 50].iter().for_each(|&minutes| {
                let (h, m) = if minutes == 0 {
                    ((hours + 23) % 24, 59)
                } else {
                    (hours, minutes - 1)
                };
                let tc = TimeCode::compose(h, m, 59, 29);
                let next = TimeCode::compose(hours, minutes, 0, 0);
                assert_eq!(tc.increment(30, true), next, "{}", tc);
                assert_eq!(next.decrement(30, true), tc, "{}", next);
            });
        });

        // Frames 00 and 01 are skipped at the other minutes.
        [(0, 1), (0, 9), (0, 11), (5, 25), (12, 39), (23, 59)]
            .iter()
            .for_each(|&(hours, minutes)| {
                let tc = TimeCode::compose(hours, minutes - 1, 59, 29);
                let next = TimeCode::compose(hours, minutes, 0, 2);
                assert_eq!(tc.increment(30, true), next, "{}", tc);
                assert_eq!(next.decrement(30, true), tc, "{}", next);
                assert_eq!(tc.add_frames(1, 30, true), next, "{}", tc);
                assert_eq!(next.add_frames(-1, 30, true), tc, "{}", next);
            });

        let tc = TimeCode::compose(0, 9, 59, 29);
        assert_eq!(tc.increment(30, true), TimeCode::compose(0, 10, 0, 0));

        let tc = TimeCode::compose(0, 1, 0, 2);
        assert_eq!(tc.decrement(30, true), TimeCode::compose(0, 0, 59, 29));

        // Only for 30 frames base.
        let tc = TimeCode::compose(0, 0, 59, 24);
        assert_eq!(tc.increment(25, true), TimeCode::compose(0, 1, 0, 0));
    }

    #[test]
    fn add_frames_both_direction() {
        let tc = TimeCode::compose(1, 0, 0, 0);
        assert_eq!(tc.add_frames(50, 25, false), TimeCode::compose(1, 0, 2, 0));
        assert_eq!(tc.add_frames(-1, 25, false), TimeCode::compose(0, 59, 59, 24));
        assert_eq!(tc.add_frames(0, 25, false), tc);

        // The first minute has 1800 frames, the others have 1798 frames.
        let tc = TimeCode::compose(0, 0, 0, 0);
        assert_eq!(tc.add_frames(1800, 30, true), TimeCode::compose(0, 1, 0, 2));
        assert_eq!(
            TimeCode::compose(0, 1, 0, 2).add_frames(-1800, 30, true),
            TimeCode::compose(0, 0, 0, 0)
        );

        // Ten minutes in drop frame has 17982 frames.
        assert_eq!(tc.add_frames(17982, 30, true), TimeCode::compose(0, 10, 0, 0));
    }

    #[test]
    fn add_frames_as_steps() {
        [(24, false), (25, false), (30, false), (30, true)]
            .iter()
            .for_each(|&(fps, drop_frame)| {
                [
                    TimeCode::compose(0, 0, 0, 0),
                    TimeCode::compose(0, 8, 59, 20),
                    TimeCode::compose(23, 59, 30, 0),
                ]
                .iter()
                .for_each(|&start| {
                    let mut forward = start;
                    let mut backward = start;
                    (1..=2000).for_each(|i| {
                        forward = forward.increment(fps, drop_frame);
                        backward = backward.decrement(fps, drop_frame);
                        assert_eq!(start.add_frames(i, fps, drop_frame), forward);
                        assert_eq!(start.add_frames(-i, fps, drop_frame), backward);
                    });
                });
            });
    }

    #[test]
    fn add_frames_far() {
        // Twelve hours in each rate.
        [(24, false), (25, false), (30, false), (30, true)]
            .iter()
            .for_each(|&(fps, drop_frame)| {
                let half_day = (frames_per_day(fps, drop_frame) / 2) as i32;
                let tc = TimeCode::compose(1, 0, 0, 0);
                assert_eq!(tc.add_frames(half_day, fps, drop_frame), TimeCode::compose(13, 0, 0, 0));
                assert_eq!(tc.add_frames(-half_day, fps, drop_frame), TimeCode::compose(13, 0, 0, 0));
                assert_eq!(tc.add_frames(2 * half_day, fps, drop_frame), tc);
            });
        assert_eq!(frames_per_day(30, true), 17982 * 6 * 24);

        let tc = TimeCode::compose(0, 0, 0, 0);
        assert_eq!(tc.add_frames(-1, 30, true), TimeCode::compose(23, 59, 59, 29));

        // The cost is independent of the distance.
        let now = std::time::Instant::now();
        (0..1000).for_each(|_| {
            let _ = tc.add_frames(i32::MAX, 30, true);
            let _ = tc.add_frames(i32::MIN, 25, false);
        });
        assert!(now.elapsed() < std::time::Duration::from_secs(1));
    }

    #[test]
    fn frame_number() {
        let tc = TimeCode::compose(0, 1, 0, 2);
        assert_eq!(tc.to_frame_number(30, true), 1800);
        assert_eq!(tc.to_frame_number(30, false), 1802);
        assert_eq!(TimeCode::from_frame_number(1800, 30, true), tc);

        let tc = TimeCode::compose(0, 10, 0, 0);
        assert_eq!(tc.to_frame_number(30, true), 17982);
        assert_eq!(TimeCode::from_frame_number(17982, 30, true), tc);

        let tc = TimeCode::compose(10, 20, 30, 12);
        assert_eq!(tc.to_frame_number(25, false), (37230 * 25 + 12) as i64);
        assert_eq!(TimeCode::from_frame_number(-1, 24, false), TimeCode::compose(23, 59, 59, 23));
    }

    #[test]
    fn ltc64_layout() {
        let tc = TimeCode(0x12345678);
        assert_eq!(tc.to_ltc64(), 0x0102030405060708);
        assert_eq!(TimeCode::from_ltc64(0xf1f2f3f4f5f6f7f8), tc);
    }

    #[test]
    fn format_parts() {
        LtcFormat::ALL.iter().for_each(|fmt| {
            let (rate, drop_frame) = fmt.parts();
            assert_eq!(*fmt, LtcFormat::from_parts(rate, drop_frame));
        });
        assert_eq!(LtcFormat::from_parts(LtcFrameRate::Fps25, true), LtcFormat::Fps25);

        LtcFrameRate::ALL.iter().for_each(|rate| {
            assert_eq!(Some(*rate), LtcFrameRate::from_code(rate.code()));
        });
        assert_eq!(LtcFrameRate::Fps2997.scale(), 999);
        assert_eq!(LtcFrameRate::Fps2997.fps(), 30);
    }
}
