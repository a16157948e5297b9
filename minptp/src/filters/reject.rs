use core::time::Duration;

use super::Filter;
use crate::time::{Time, ONE_DAY, ONE_NANOSECOND, TIME_ZERO};

// Fixed point unit of the filter weights
const WEIGHT_ONE: u32 = 1 << 16;

// sqrt(pi/2) in units of 2^-14, the ratio between the standard deviation of a
// normal distribution and its mean absolute deviation
const SQRT_HALF_PI: u32 = 20534;
const SQRT_HALF_PI_ONE: u32 = 1 << 14;

// Samples further than this many deviations from the mean are outliers
const REJECT_SIGMAS: u32 = 6;

/// Outlier rejection based on a running estimate of mean and standard
/// deviation of the input.
///
/// Both estimates are exponential averages with time constant `tau`.
/// Samples more than six standard deviations from the mean are rejected,
/// but still update the estimates so a persistent step is accepted after a
/// while.
#[derive(Debug, Clone)]
pub struct AmplitudeReject {
    mean: Time,
    sigma: Time,
    min_sigma: Time,
    tau: Duration,
}

impl AmplitudeReject {
    /// A filter that forgets with time constant `tau`
    pub fn new(tau: Duration) -> Self {
        Self {
            mean: TIME_ZERO,
            sigma: ONE_DAY,
            min_sigma: ONE_NANOSECOND,
            tau,
        }
    }

    /// Estimated mean of the input
    pub fn mean(&self) -> Time {
        self.mean
    }

    /// Estimated standard deviation of the input
    pub fn sigma(&self) -> Time {
        self.sigma
    }

    /// Start from a known standard deviation, e.g. that of an earlier run
    pub fn set_sigma(&mut self, sigma: Time) {
        self.sigma = sigma.max(self.min_sigma).min(ONE_DAY);
    }

    /// Lower bound for the estimated standard deviation
    pub fn set_min_sigma(&mut self, min_sigma: Time) {
        self.min_sigma = min_sigma;
        self.sigma = self.sigma.max(min_sigma);
    }

    /// Change the time constant of the estimates
    pub fn set_tau(&mut self, tau: Duration) {
        self.tau = tau;
    }

    /// Weight of a sample taken `elapsed` after the previous one, in units
    /// of [`WEIGHT_ONE`]
    fn weight(&self, elapsed: Duration) -> u32 {
        let tau = self.tau.as_micros().max(1);
        let elapsed = elapsed.min(self.tau / 2).as_micros();
        (elapsed * WEIGHT_ONE as u128 / tau) as u32
    }
}

impl Filter for AmplitudeReject {
    fn reset(&mut self) {
        self.mean = TIME_ZERO;
        self.sigma = ONE_DAY;
    }

    fn update(&mut self, next: Time, elapsed: Duration) -> Option<Time> {
        let weight = self.weight(elapsed);
        let diff = next - self.mean;
        self.mean += diff * weight / WEIGHT_ONE;

        let deviation = diff.abs() * SQRT_HALF_PI / SQRT_HALF_PI_ONE;
        let sigma = self.sigma + (deviation - self.sigma) * weight / WEIGHT_ONE;
        self.sigma = sigma.max(self.min_sigma).min(ONE_DAY);

        if diff.abs() < self.sigma * REJECT_SIGMAS {
            Some(next)
        } else {
            log::debug!("rejected outlier {} (sigma {})", next, self.sigma);
            None
        }
    }
}
