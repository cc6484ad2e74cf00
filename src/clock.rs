//! # Summary
//!
//! Lamport logical clock. Buyers forward the clock once per request and
//! broadcast the new value; everyone else merges what they observe.

/// Monotone logical clock. Never decreases through any operation.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct LamportClock {
    value: u64,

    /// Last value handed out by `stamp`
    stamped: u64,
}

impl LamportClock {
    pub fn new(value: u64) -> Self {
        LamportClock { value, stamped: 0 }
    }

    pub fn value(&self) -> u64 {
        self.value
    }

    /// Advances the clock by one and returns the new value.
    pub fn forward(&mut self) -> u64 {
        self.value += 1;
        self.value
    }

    /// Merges a value observed from another peer.
    pub fn adjust(&mut self, observed: u64) {
        self.value = std::cmp::max(self.value, observed);
    }

    /// Merges `observed` and returns a value no previous stamp has returned.
    pub fn stamp(&mut self, observed: u64) -> u64 {
        self.adjust(observed);
        if self.value <= self.stamped {
            self.forward();
        }
        self.stamped = self.value;
        self.value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forward_returns_incremented_value() {
        let mut clock = LamportClock::default();
        assert_eq!(clock.forward(), 1);
        assert_eq!(clock.forward(), 2);
        assert_eq!(clock.value(), 2);
    }

    #[test]
    fn adjust_never_moves_backwards() {
        let mut clock = LamportClock::new(7);
        clock.adjust(3);
        assert_eq!(clock.value(), 7);
        clock.adjust(11);
        assert_eq!(clock.value(), 11);
    }

    #[test]
    fn value_is_max_of_forwards_and_observations() {
        let mut clock = LamportClock::default();
        let mut expected = 0;
        let mut previous = 0;
        for (i, observed) in [4u64, 0, 9, 2, 2, 15, 1].iter().enumerate() {
            if i % 2 == 0 {
                clock.adjust(*observed);
                expected = std::cmp::max(expected, *observed);
            } else {
                expected += 1;
                assert_eq!(clock.forward(), expected);
            }
            assert!(clock.value() >= previous);
            assert_eq!(clock.value(), expected);
            previous = clock.value();
        }
    }

    #[test]
    fn stamps_are_unique_for_repeated_observations() {
        let mut clock = LamportClock::default();
        assert_eq!(clock.stamp(5), 5);
        assert_eq!(clock.stamp(5), 6);
        assert_eq!(clock.stamp(3), 7);
        assert_eq!(clock.stamp(20), 20);
    }

    #[test]
    fn first_stamp_of_zero_is_positive() {
        let mut clock = LamportClock::default();
        assert_eq!(clock.stamp(0), 1);
    }
}
