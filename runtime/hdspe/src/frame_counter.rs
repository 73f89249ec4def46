// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (c) 2021 Takashi Sakamoto

use {super::*, protocols::card::HW_POINTER_SPAN};

/// Absolute position of sample frame, extended from the hardware pointer which wraps around
/// every 16384 frames.
///
/// The value is monotonic as long as it is updated at least once per the span of wrap around.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameCounter {
    last_hw_pointer: u16,
    wrap_count: u64,
    value: u64,
    period_size: u32,
    hw_buffer_size: u32,
}

impl FrameCounter {
    pub fn new(period_size: u32, hw_buffer_size: u32) -> Self {
        Self {
            last_hw_pointer: 0,
            wrap_count: 0,
            value: 0,
            period_size,
            hw_buffer_size,
        }
    }

    /// Both sizes should be power of two.
    pub fn set_period_size(&mut self, period_size: u32, hw_buffer_size: u32) {
        self.period_size = period_size;
        self.hw_buffer_size = hw_buffer_size;
    }

    pub fn period_size(&self) -> u32 {
        self.period_size
    }

    pub fn hw_buffer_size(&self) -> u32 {
        self.hw_buffer_size
    }

    /// Update by the hardware pointer in unit of frame.
    pub fn update(&mut self, hw_pointer: u16) {
        let hw_pointer = hw_pointer & (HW_POINTER_SPAN - 1) as u16;
        if hw_pointer < self.last_hw_pointer {
            self.wrap_count += 1;
        }
        self.last_hw_pointer = hw_pointer;

        // Aligned to the boundary of period.
        self.value = self.wrap_count * HW_POINTER_SPAN as u64
            + (hw_pointer as u32 & !(self.period_size - 1)) as u64;
    }

    /// The current absolute position of frame.
    pub fn current(&self) -> u64 {
        self.value
    }

    /// The hardware pointer at the last update, within the hardware buffer.
    pub fn hw_pointer_now(&self) -> u16 {
        self.last_hw_pointer & (self.hw_buffer_size - 1) as u16
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn counter_monotonic() {
        [32, 64, 256, 1024, 4096].iter().for_each(|&period_size| {
            let mut counter = FrameCounter::new(period_size, HW_POINTER_SPAN);
            let mut position = 0u64;
            let mut prev = counter.current();

            (0..2000).for_each(|_| {
                position += period_size as u64;
                counter.update((position % HW_POINTER_SPAN as u64) as u16);
                let curr = counter.current();
                assert!(curr >= prev);
                assert_eq!(curr - prev, period_size as u64);
                assert_eq!(curr, position);
                prev = curr;
            });
        });
    }

    #[test]
    fn counter_irregular_steps() {
        let mut counter = FrameCounter::new(64, HW_POINTER_SPAN);
        let mut position = 0u64;

        [100u64, 16000, 5, 16383, 1, 9000, 12000, 64].iter().for_each(|&step| {
            let prev = counter.current();
            position += step;
            counter.update((position % HW_POINTER_SPAN as u64) as u16);
            assert!(counter.current() >= prev);
            assert_eq!(counter.current(), position & !63);
        });
    }

    #[test]
    fn counter_aligned_to_period() {
        let mut counter = FrameCounter::new(512, 1024);
        counter.update(600);
        assert_eq!(counter.current(), 512);
        assert_eq!(counter.hw_pointer_now(), 600);

        counter.update(1100);
        assert_eq!(counter.current(), 1024);
        assert_eq!(counter.hw_pointer_now(), 76);

        counter.update(16);
        assert_eq!(counter.current(), 16384);
    }
}
