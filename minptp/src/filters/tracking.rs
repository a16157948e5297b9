use core::cell::RefCell;

use crate::{
    measurement::{Callback, Measurement, MeasurementKind},
    time::{Time, ONE_SECOND, SUBNS_PER_MSEC},
};

const NSEC_PER_SEC: i128 = 1_000_000_000;

// Offsets beyond this are stepped instead of slewed
const MAX_FINE: Time = Time::from_secs(2);

/// A local clock that can be stepped and slewed.
///
/// The rate unit is up to the implementation, see
/// [`TrackingCoeff::new`] for how it enters the loop gains.
pub trait TrackingClock {
    /// Step the clock by `amount`, forward for positive values.
    ///
    /// Returns the part of the step the clock could not apply.
    fn clock_adjust(&mut self, amount: Time) -> Time;

    /// Run the clock `offset` units faster than its free running rate.
    ///
    /// Zero is the free running rate.
    fn clock_rate(&mut self, offset: i64);
}

/// Gains of the tracking loop, for a given clock and time constant.
///
/// The loop is a proportional-integral filter following Stephens and
/// Thomas, "Controlled-root formulation for digital phase-locked loops"
/// (IEEE Transactions on Aerospace and Electronic Systems, 1995). All gains
/// are fixed point numbers scaled by 2^[`SCALE`](`Self::SCALE`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackingCoeff {
    kp: u64,
    ki: u64,
    ymax: u64,
}

impl TrackingCoeff {
    /// Fixed point scale of the gains, suited to time constants from a few
    /// seconds to an hour
    pub const SCALE: u32 = 60;

    /// Gains for a damping ratio of 0.707.
    ///
    /// `ref_scale` is the effect of one unit of
    /// [`TrackingClock::clock_rate`]: held for one second, it moves the
    /// clock by `ref_scale` seconds. It should be below 1e-10. `tau` is the
    /// time constant in seconds, around 5 is typical.
    pub fn new(ref_scale: f64, tau: f64) -> Self {
        Self::with_damping(ref_scale, tau, 0.707)
    }

    /// Gains for an explicit damping ratio
    pub fn with_damping(ref_scale: f64, tau: f64, damping: f64) -> Self {
        let alpha = 0.25 / (damping * damping);
        let k1 = 1.273239545 / (tau * (1.0 + alpha));
        let k2 = alpha * k1 * k1;

        // one second of offset is SUBNS_PER_SEC units, the loop assumes one
        // update per second and the output has to go from cycles to radians
        let gain = (SUBNS_PER_MSEC as f64 * 1e3) * 1e9 * ref_scale
            / core::f64::consts::TAU
            / (1u64 << Self::SCALE) as f64;

        Self {
            kp: round(k1 / gain),
            ki: round(k2 / gain),
            // slew at most 10 ms per second
            ymax: round(0.010 / ref_scale),
        }
    }

    /// Whether the gains are large enough to not drown in rounding errors
    pub fn ok(&self) -> bool {
        self.kp > 7 && self.ki > 7
    }
}

/// Round to the nearest integer, out of range values become zero
fn round(value: f64) -> u64 {
    if value >= 0.0 && value < u64::MAX as f64 {
        (value + 0.5) as u64
    } else {
        0
    }
}

/// Steers a [`TrackingClock`] towards a reference.
///
/// Feed it every measured offset through [`update`](`Self::update`), or
/// register it as [`Callback`] wrapped in a [`RefCell`] to follow the sync
/// measurements of a [`Client`](`crate::Client`).
#[derive(Debug)]
pub struct TrackingController<C: TrackingClock> {
    clock: C,
    coeff: TrackingCoeff,
    last_rcvd: Option<Time>,
    accum: i128,
}

impl<C: TrackingClock> TrackingController<C> {
    /// Start tracking with `clock` free running
    pub fn new(clock: C, coeff: TrackingCoeff) -> Self {
        let mut controller = Self {
            clock,
            coeff,
            last_rcvd: None,
            accum: 0,
        };
        controller.reconfigure(coeff);
        controller.reset();
        controller
    }

    /// Switch to other loop gains, keeping the current rate
    pub fn reconfigure(&mut self, coeff: TrackingCoeff) {
        if !coeff.ok() {
            log::error!("bad tracking loop configuration: {:?}", coeff);
        }
        self.coeff = coeff;
    }

    /// Forget the loop state and let the clock run free
    pub fn reset(&mut self) {
        self.clock.clock_rate(0);
        self.accum = 0;
    }

    /// The steered clock
    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// The steered clock
    pub fn clock_mut(&mut self) -> &mut C {
        &mut self.clock
    }

    /// Process a measured offset.
    ///
    /// `rx_time` is the local receive time of the measurement, `delta` the
    /// reference time minus the local time. Offsets over two seconds step
    /// the clock, smaller ones adjust its rate.
    pub fn update(&mut self, rx_time: Time, delta: Time) {
        let elapsed = self
            .last_rcvd
            .map_or(ONE_SECOND, |last| (rx_time - last).abs().min(ONE_SECOND));
        self.last_rcvd = Some(rx_time);

        let mut input = delta;
        if delta.abs() > MAX_FINE {
            log::info!("stepping clock by {}", delta);
            self.reset();
            input = self.clock.clock_adjust(delta);
            self.last_rcvd = Some(rx_time + delta);
        }

        self.filter(elapsed.delta_nsec(), input.delta_subns());
    }

    fn filter(&mut self, elapsed_nsec: i64, delta_subns: i64) {
        let max_delta = 100 * SUBNS_PER_MSEC as i128;
        let delta = (delta_subns as i128).clamp(-max_delta, max_delta);

        // The output is a rate held until the next update, so the integral
        // gain scales with the update interval and the proportional gain
        // does not.
        let delta_i = delta
            .saturating_mul(self.coeff.ki as i128)
            .saturating_mul(elapsed_nsec as i128);
        let delta_p = delta
            .saturating_mul(self.coeff.kp as i128)
            .saturating_mul(NSEC_PER_SEC);

        let limit = (self.coeff.ymax as i128) << TrackingCoeff::SCALE;
        self.accum = self.accum.saturating_add(delta_i).clamp(-limit, limit);

        let output = self.accum.saturating_add(delta_p) >> TrackingCoeff::SCALE;
        let output = output.clamp(i64::MIN as i128, i64::MAX as i128) as i64;
        log::trace!(
            "tracking: delta {} subns, accumulator {}, rate {}",
            delta_subns,
            self.accum >> TrackingCoeff::SCALE,
            output
        );
        self.clock.clock_rate(output);
    }
}

impl<C: TrackingClock> Callback for RefCell<TrackingController<C>> {
    fn ptp_ready(&self, measurement: &Measurement) {
        if measurement.kind != MeasurementKind::Sync {
            return;
        }

        match self.try_borrow_mut() {
            Ok(mut controller) => {
                controller.update(measurement.t2, -measurement.offset_from_master())
            }
            Err(_) => log::error!("tracking controller is busy, dropping measurement"),
        }
    }
}
