//! The sampling/debug bitfield carried on a [`crate::SpanContext`] and on the
//! wire via the `x-b3-flags`/`x-b3-sampled` headers.

/// Forces the span to be recorded regardless of the sampler's decision.
pub const DEBUG: u64 = 1 << 0;
/// Indicates that `SAMPLED` carries a meaningful value (as opposed to "not
/// yet decided").
pub const SAMPLING_SET: u64 = 1 << 1;
/// The span (and its trace) should be recorded.
pub const SAMPLED: u64 = 1 << 2;
/// The span has no parent: it is the root of its trace.
pub const IS_ROOT: u64 = 1 << 3;

/// A tristate view of the `sampled`/`sampling_set` bits.
///
/// - Both clear: the sampling decision has not been made yet (a sampler may
///   still run).
/// - `sampling_set` set, `sampled` clear: the decision was made and was
///   "don't sample".
/// - `sampled` set: the decision was made and was "sample".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sampled {
    /// No decision has been recorded yet.
    Unknown,
    /// The span was explicitly marked not sampled.
    No,
    /// The span was explicitly marked sampled.
    Yes,
}

impl Sampled {
    /// Reads the sampled tristate out of a raw flags value.
    pub fn from_flags(flags: u64) -> Self {
        if flags & SAMPLED != 0 {
            Sampled::Yes
        } else if flags & SAMPLING_SET != 0 {
            Sampled::No
        } else {
            Sampled::Unknown
        }
    }

    /// Returns `true` only when the decision is known to be "sample".
    pub fn is_yes(self) -> bool {
        matches!(self, Sampled::Yes)
    }

    /// Folds the tristate back into the `sampled`/`sampling_set` bits of a
    /// flags value, leaving the other bits untouched.
    pub fn apply(self, flags: u64) -> u64 {
        let cleared = flags & !(SAMPLED | SAMPLING_SET);
        match self {
            Sampled::Unknown => cleared,
            Sampled::No => cleared | SAMPLING_SET,
            Sampled::Yes => cleared | SAMPLING_SET | SAMPLED,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_when_neither_bit_set() {
        assert_eq!(Sampled::from_flags(0), Sampled::Unknown);
    }

    #[test]
    fn no_when_only_sampling_set() {
        assert_eq!(Sampled::from_flags(SAMPLING_SET), Sampled::No);
    }

    #[test]
    fn yes_when_sampled_bit_set() {
        assert_eq!(Sampled::from_flags(SAMPLED), Sampled::Yes);
        // sampled implies sampling_set semantically even if caller forgot it
        assert_eq!(Sampled::from_flags(SAMPLED | SAMPLING_SET), Sampled::Yes);
    }

    #[test]
    fn apply_round_trips_through_flags() {
        for s in [Sampled::Unknown, Sampled::No, Sampled::Yes] {
            let flags = s.apply(DEBUG);
            assert_eq!(Sampled::from_flags(flags), s);
            assert_eq!(flags & DEBUG, DEBUG, "unrelated bit preserved");
        }
    }
}
