//! Post-processing of measured offsets and steering of a local clock
//!
//! A [`Filter`] smooths or rejects individual offset samples, and a
//! [`TrackingController`] turns the result into rate and step adjustments of
//! a [`TrackingClock`]. The controller also implements
//! [`Callback`](`crate::Callback`), so it can be registered with a
//! [`Client`](`crate::Client`) directly.

mod reject;
mod tracking;
mod window;

use core::time::Duration;

pub use reject::AmplitudeReject;
pub use tracking::{TrackingClock, TrackingCoeff, TrackingController};
pub use window::{BoxcarFilter, MedianFilter};

use crate::time::{Time, TIME_ZERO};

/// A filter for a stream of time offsets.
///
/// Filters chain: the output of one is the input of the next, and a sample
/// rejected anywhere is not passed on.
pub trait Filter {
    /// Forget all previous samples
    fn reset(&mut self);

    /// Feed the next sample, taken `elapsed` after the previous one.
    ///
    /// Returns the filtered value, or `None` when the sample is rejected.
    fn update(&mut self, next: Time, elapsed: Duration) -> Option<Time>;
}

/// Run `next` through every filter of `chain` in order
pub fn update_chain(chain: &mut [&mut dyn Filter], next: Time, elapsed: Duration) -> Option<Time> {
    chain
        .iter_mut()
        .try_fold(next, |sample, filter| filter.update(sample, elapsed))
}

/// The last `N` samples, oldest first once full
#[derive(Debug, Clone)]
struct SlidingWindow<const N: usize> {
    samples: [Time; N],
    next: usize,
    filled: usize,
}

impl<const N: usize> SlidingWindow<N> {
    const fn new() -> Self {
        Self {
            samples: [TIME_ZERO; N],
            next: 0,
            filled: 0,
        }
    }

    fn push(&mut self, sample: Time) {
        self.samples[self.next] = sample;
        self.next = (self.next + 1) % N;
        self.filled = (self.filled + 1).min(N);
    }

    /// The most recent `count` samples, fewer while the window fills up
    fn recent(&self, count: usize) -> impl Iterator<Item = Time> + '_ {
        let count = count.min(self.filled);
        (N - count..N).map(move |age| self.samples[(self.next + age) % N])
    }

    fn reset(&mut self) {
        self.next = 0;
        self.filled = 0;
    }
}
