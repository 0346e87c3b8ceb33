//! Packet-number staleness filter.
//!
//! The sequencer holds the single "last accepted" packet number shared by the
//! send path and the receive task. A candidate is accepted when it is not
//! smaller than the tracked value and then becomes the tracked value; equal
//! numbers are accepted, so duplicates pass and only strictly older packets
//! are rejected.
//!
//! Each accept is one atomic compare-and-swap loop, so a concurrent send and
//! receive cannot lose an update.

use std::sync::atomic::{AtomicI64, Ordering};

use crate::types::PacketNumber;
use crate::{LinkError, Result};

/// Last-writer-wins-by-number filter over a shared atomic counter.
#[derive(Debug, Default)]
pub struct Sequencer {
    last: AtomicI64,
}

impl Sequencer {
    /// Start tracking from 0.
    pub fn new() -> Self {
        Self::starting_at(0)
    }

    pub fn starting_at(number: PacketNumber) -> Self {
        Self { last: AtomicI64::new(number) }
    }

    /// Accept `candidate` if it is not older than the tracked value.
    ///
    /// Returns `false` without touching the tracked value otherwise.
    pub fn accept(&self, candidate: PacketNumber) -> bool {
        self.check(candidate).is_ok()
    }

    /// Like [`accept`](Self::accept), reporting the rejection as
    /// [`LinkError::StalePacket`].
    pub fn check(&self, candidate: PacketNumber) -> Result<()> {
        self.last
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |last| {
                (candidate >= last).then_some(candidate)
            })
            .map(|_| ())
            .map_err(|last| LinkError::StalePacket { number: candidate, last })
    }

    /// The tracked packet number.
    pub fn current(&self) -> PacketNumber {
        self.last.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::sync::Arc;

    #[test]
    fn accepts_equal_or_newer_numbers() {
        let sequencer = Sequencer::new();
        let pattern: Vec<bool> = [5, 3, 7, 7, 2, 10].iter().map(|n| sequencer.accept(*n)).collect();

        assert_eq!(pattern, vec![true, false, true, true, false, true]);
        assert_eq!(sequencer.current(), 10);
    }

    #[test]
    fn starts_at_zero() {
        let sequencer = Sequencer::new();
        assert_eq!(sequencer.current(), 0);
        assert!(sequencer.accept(0));
        assert!(!sequencer.accept(-1));
    }

    #[test]
    fn rejection_reports_tracked_value() {
        let sequencer = Sequencer::starting_at(100);
        let err = sequencer.check(42).unwrap_err();
        assert!(matches!(err, LinkError::StalePacket { number: 42, last: 100 }));
        assert_eq!(sequencer.current(), 100);
    }

    #[test]
    fn concurrent_accepts_keep_the_maximum() {
        let sequencer = Arc::new(Sequencer::new());

        let handles: Vec<_> = (0..8)
            .map(|thread| {
                let sequencer = Arc::clone(&sequencer);
                std::thread::spawn(move || {
                    for step in 0..1000 {
                        sequencer.accept(step * 8 + thread);
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(sequencer.current(), 999 * 8 + 7);
    }

    proptest! {
        #[test]
        fn accepted_numbers_never_decrease(numbers in prop::collection::vec(any::<i64>(), 0..64)) {
            let sequencer = Sequencer::new();
            let mut reference = 0i64;

            for number in numbers {
                let accepted = sequencer.accept(number);
                prop_assert_eq!(accepted, number >= reference);
                if accepted {
                    reference = number;
                }
                prop_assert_eq!(sequencer.current(), reference);
            }
        }
    }
}
