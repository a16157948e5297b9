use super::Measurement;
use crate::datastructures::{common::PortIdentity, messages::Header};

/// Default number of exchanges tracked at the same time
pub const CACHE_SIZE: usize = 4;

/// Ring buffer of the most recent exchanges.
///
/// [`push`](`Self::push`) always succeeds: once the ring is full it recycles
/// the oldest slot, complete or not. Lookups scan linearly, which is fine for
/// the handful of slots this is meant for.
#[derive(Debug, Clone)]
pub struct MeasurementCache<const N: usize = CACHE_SIZE> {
    slots: [Measurement; N],
    next: usize,
    len: usize,
    dropped: u32,
}

impl<const N: usize> MeasurementCache<N> {
    const NONZERO: () = assert!(N > 0, "a measurement cache needs at least one slot");

    /// Create an empty cache
    pub fn new() -> Self {
        #[allow(clippy::let_unit_value)]
        let () = Self::NONZERO;

        Self {
            slots: [Measurement::default(); N],
            next: 0,
            len: 0,
            dropped: 0,
        }
    }

    /// Claim the next slot for an exchange started by `header`
    pub fn push(&mut self, header: &Header) -> &mut Measurement {
        let index = self.next;
        self.next = (self.next + 1) % N;

        if self.len < N {
            self.len += 1;
        } else if !self.slots[index].done() {
            self.dropped = self.dropped.wrapping_add(1);
        }

        let slot = &mut self.slots[index];
        slot.reset(header);
        slot
    }

    /// The exchange continued by `header`, if any
    pub fn find(&self, header: &Header, port: &PortIdentity) -> Option<&Measurement> {
        self.slots[..self.len]
            .iter()
            .find(|slot| slot.matches(header, port))
    }

    /// The exchange continued by `header`, if any
    pub fn find_mut(&mut self, header: &Header, port: &PortIdentity) -> Option<&mut Measurement> {
        self.slots[..self.len]
            .iter_mut()
            .find(|slot| slot.matches(header, port))
    }

    /// Forget every tracked exchange
    pub fn clear(&mut self) {
        self.slots = [Measurement::default(); N];
        self.next = 0;
        self.len = 0;
    }

    /// Number of unfinished exchanges that were recycled by [`push`](`Self::push`)
    pub fn dropped_count(&self) -> u32 {
        self.dropped
    }
}

impl<const N: usize> Default for MeasurementCache<N> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{datastructures::common::ClockIdentity, time::Time};

    fn header(sequence_id: u16) -> Header {
        Header {
            sequence_id,
            source_port_identity: PortIdentity {
                clock_identity: ClockIdentity([2; 8]),
                port_number: 1,
            },
            ..Default::default()
        }
    }

    fn port() -> PortIdentity {
        header(0).source_port_identity
    }

    #[test]
    fn oldest_slot_is_recycled() {
        let mut cache = MeasurementCache::<2>::new();

        cache.push(&header(1));
        cache.push(&header(2));
        assert!(cache.find(&header(1), &port()).is_some());
        assert!(cache.find(&header(2), &port()).is_some());

        cache.push(&header(3));
        assert!(cache.find(&header(1), &port()).is_none());
        assert!(cache.find(&header(2), &port()).is_some());
        assert!(cache.find(&header(3), &port()).is_some());
        assert_eq!(cache.dropped_count(), 1);
    }

    #[test]
    fn finished_slots_are_not_counted() {
        let mut cache = MeasurementCache::<1>::new();

        let slot = cache.push(&header(1));
        slot.t1 = Time::from_nanos(1);
        slot.t2 = Time::from_nanos(2);
        slot.t3 = Time::from_nanos(3);
        slot.t4 = Time::from_nanos(4);

        cache.push(&header(2));
        assert_eq!(cache.dropped_count(), 0);

        cache.push(&header(3));
        assert_eq!(cache.dropped_count(), 1);
    }

    #[test]
    fn updates_through_find_mut() {
        let mut cache = MeasurementCache::<CACHE_SIZE>::new();
        cache.push(&header(10)).t1 = Time::from_nanos(5);

        let slot = cache.find_mut(&header(10), &port()).unwrap();
        slot.t2 = Time::from_nanos(6);

        let slot = cache.find(&header(10), &port()).unwrap();
        assert_eq!(slot.t1, Time::from_nanos(5));
        assert_eq!(slot.t2, Time::from_nanos(6));
    }

    #[test]
    fn clear_forgets_everything() {
        let mut cache: MeasurementCache = MeasurementCache::new();
        cache.push(&header(1));
        cache.push(&header(2));
        cache.clear();

        assert!(cache.find(&header(1), &port()).is_none());
        assert!(cache.find(&header(2), &port()).is_none());

        // a blank slot never matches, even for an all-zero header
        assert!(cache.find(&Header::default(), &PortIdentity::default()).is_none());
    }
}
