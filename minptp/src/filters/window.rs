use core::time::Duration;

use super::{Filter, SlidingWindow};
use crate::time::{Time, TIME_ZERO};

/// Moving average over the last `2^order` samples.
///
/// `N` is the largest window the filter can hold. Order 0 passes samples
/// through unchanged. While the window fills up, the average covers the
/// samples seen so far.
#[derive(Debug, Clone)]
pub struct BoxcarFilter<const N: usize> {
    order: u32,
    window: SlidingWindow<N>,
}

impl<const N: usize> BoxcarFilter<N> {
    /// A filter averaging `2^order` samples, or as many as fit in `N`
    pub fn new(order: u32) -> Self {
        let mut filter = Self {
            order: 0,
            window: SlidingWindow::new(),
        };
        filter.set_order(order);
        filter
    }

    /// Change the window to `2^order` samples.
    ///
    /// Orders whose window does not fit in `N` are ignored.
    pub fn set_order(&mut self, order: u32) {
        if matches!(1usize.checked_shl(order), Some(len) if len <= N) {
            self.order = order;
        } else {
            log::warn!("boxcar order {} does not fit a window of {}", order, N);
        }
    }

    /// Current order of the filter
    pub fn order(&self) -> u32 {
        self.order
    }
}

impl<const N: usize> Filter for BoxcarFilter<N> {
    fn reset(&mut self) {
        self.window.reset();
    }

    fn update(&mut self, next: Time, _elapsed: Duration) -> Option<Time> {
        self.window.push(next);

        let (sum, count) = self
            .window
            .recent(1 << self.order)
            .fold((TIME_ZERO, 0u32), |(sum, count), sample| (sum + sample, count + 1));
        Some(sum / count)
    }
}

/// Median of the last `order` samples, with an odd `order`.
///
/// `N` is the largest window the filter can hold. Order 1 passes samples
/// through unchanged. While the window fills up, the median covers the
/// samples seen so far, taking the lower one of the middle two for an even
/// count.
#[derive(Debug, Clone)]
pub struct MedianFilter<const N: usize> {
    order: usize,
    window: SlidingWindow<N>,
}

impl<const N: usize> MedianFilter<N> {
    /// A filter over `order` samples, rounded up to an odd number
    pub fn new(order: usize) -> Self {
        let mut filter = Self {
            order: 1,
            window: SlidingWindow::new(),
        };
        filter.set_order(order);
        filter
    }

    /// Change the window to `order` samples, rounded up to an odd number.
    ///
    /// Orders that do not fit in `N` are ignored.
    pub fn set_order(&mut self, order: usize) {
        let order = order | 1;
        if order <= N {
            self.order = order;
        } else {
            log::warn!("median order {} does not fit a window of {}", order, N);
        }
    }

    /// Current order of the filter
    pub fn order(&self) -> usize {
        self.order
    }
}

impl<const N: usize> Filter for MedianFilter<N> {
    fn reset(&mut self) {
        self.window.reset();
    }

    fn update(&mut self, next: Time, _elapsed: Duration) -> Option<Time> {
        self.window.push(next);

        let mut sorted = [TIME_ZERO; N];
        let mut count = 0;
        for (slot, sample) in sorted.iter_mut().zip(self.window.recent(self.order)) {
            *slot = sample;
            count += 1;
        }

        let sorted = &mut sorted[..count];
        sorted.sort_unstable();
        sorted.get(count.saturating_sub(1) / 2).copied()
    }
}
