#[derive(Clone, Debug, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub(crate) struct SequenceIdGenerator {
    current: u16,
}

impl SequenceIdGenerator {
    pub(crate) fn new() -> Self {
        SequenceIdGenerator { current: 0 }
    }

    pub(crate) fn generate(&mut self) -> u16 {
        self.current = self.current.wrapping_add(1);
        self.current
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wraps_around() {
        let mut ids = SequenceIdGenerator::new();
        assert_eq!(ids.generate(), 1);
        assert_eq!(ids.generate(), 2);

        ids.current = u16::MAX;
        assert_eq!(ids.generate(), 0);
        assert_eq!(ids.generate(), 1);
    }
}
