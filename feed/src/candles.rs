//! Chart candle buffer.
//!
//! Holds the most recent candles of the chart key, ordered by open time. Live
//! updates replace the candle with the same open time; history fills in only
//! the candles the live stream has not delivered yet.

use std::collections::VecDeque;

use tickstream_sdk::Kline;

/// Bounded, open-time ordered candle buffer.
#[derive(Debug, Clone)]
pub struct CandleBuffer {
    capacity: usize,
    candles: VecDeque<Kline>,
}

impl CandleBuffer {
    /// Creates an empty buffer holding at most `capacity` candles.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            candles: VecDeque::with_capacity(capacity),
        }
    }

    /// Applies a live candle update.
    pub fn apply(&mut self, kline: Kline) {
        match self.candles.back() {
            Some(last) if last.open_time == kline.open_time => {
                self.candles.pop_back();
                self.candles.push_back(kline);
            }
            Some(last) if last.open_time > kline.open_time => {
                match self
                    .candles
                    .binary_search_by_key(&kline.open_time, |c| c.open_time)
                {
                    Ok(index) => {
                        if let Some(candle) = self.candles.get_mut(index) {
                            *candle = kline;
                        }
                    }
                    Err(index) => self.candles.insert(index, kline),
                }
            }
            _ => self.candles.push_back(kline),
        }
        self.trim();
    }

    /// Merges historical candles. Candles already present are kept.
    pub fn load_history(&mut self, history: impl IntoIterator<Item = Kline>) {
        for kline in history {
            if let Err(index) = self
                .candles
                .binary_search_by_key(&kline.open_time, |c| c.open_time)
            {
                self.candles.insert(index, kline);
            }
        }
        self.trim();
    }

    /// Removes every candle.
    pub fn clear(&mut self) {
        self.candles.clear();
    }

    /// Returns the newest candle.
    #[must_use]
    pub fn latest(&self) -> Option<&Kline> {
        self.candles.back()
    }

    /// Returns the candles, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &Kline> {
        self.candles.iter()
    }

    /// Returns the number of candles.
    #[must_use]
    pub fn len(&self) -> usize {
        self.candles.len()
    }

    /// Returns true if the buffer holds no candles.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }

    /// Returns the capacity.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    fn trim(&mut self) {
        while self.candles.len() > self.capacity {
            self.candles.pop_front();
        }
    }
}
