//! Segment identifier encoding.
//!
//! A segment id is written as a fixed number of base-1000 digit groups, most
//! significant first. Each group names one level of the directory tree:
//!
//! ```text
//! id 1_002_003 with 3 groups -> [1, 2, 3] -> 001/002/003
//! ```

use std::fmt;

use crate::{Error, Result};

/// Radix of one digit group.
pub const GROUP_BASE: u64 = 1000;

/// Largest supported group count. `1000^6 - 1` is the largest id that still
/// fits in a `u64` with headroom for `+ 1`.
pub const MAX_GROUPS: usize = 6;

/// Identifier of a segment within a log directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct SegmentId(u64);

impl SegmentId {
    pub const FIRST: SegmentId = SegmentId(0);

    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn get(self) -> u64 {
        self.0
    }

    /// The following id, if it is still addressable with `groups` groups.
    pub fn next(self, groups: usize) -> Result<Self> {
        increment(self.0, groups).map(Self)
    }

    pub fn groups(self, groups: usize) -> Result<Vec<u16>> {
        decompose(self.0, groups)
    }
}

impl fmt::Display for SegmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for SegmentId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

/// Largest id representable with `groups` digit groups.
pub fn max_id(groups: usize) -> u64 {
    match u32::try_from(groups).ok().and_then(|g| GROUP_BASE.checked_pow(g)) {
        Some(limit) => limit - 1,
        None => u64::MAX,
    }
}

/// Minimal digit groups of `id`, most significant first. Zero is `[0]`.
pub fn split_groups(mut id: u64) -> Vec<u16> {
    let mut groups = Vec::new();
    loop {
        groups.push((id % GROUP_BASE) as u16);
        id /= GROUP_BASE;
        if id == 0 {
            break;
        }
    }
    groups.reverse();
    groups
}

/// Digit groups of `id`, left-padded with zero groups to exactly `groups`.
///
/// # Errors
///
/// - `Error::CapacityExceeded`: `id` needs more than `groups` groups
pub fn decompose(id: u64, groups: usize) -> Result<Vec<u16>> {
    let minimal = split_groups(id);
    if minimal.len() > groups {
        return Err(Error::CapacityExceeded { id, groups });
    }
    let mut padded = vec![0u16; groups - minimal.len()];
    padded.extend(minimal);
    Ok(padded)
}

/// Evaluate digit groups as a base-1000 number.
///
/// # Errors
///
/// - `Error::CapacityExceeded`: the value does not fit in a `u64`
pub fn compose(groups: &[u16]) -> Result<u64> {
    groups.iter().try_fold(0u64, |acc, &group| {
        acc.checked_mul(GROUP_BASE)
            .and_then(|acc| acc.checked_add(u64::from(group)))
            .ok_or(Error::CapacityExceeded {
                id: u64::MAX,
                groups: groups.len(),
            })
    })
}

/// `id + 1`, failing once the layout runs out of identifiers.
pub fn increment(id: u64, groups: usize) -> Result<u64> {
    if id >= max_id(groups) {
        return Err(Error::CapacityExceeded {
            id: id.saturating_add(1),
            groups,
        });
    }
    Ok(id + 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_groups() {
        assert_eq!(split_groups(0), vec![0]);
        assert_eq!(split_groups(123_456_789), vec![123, 456, 789]);
        assert_eq!(split_groups(12_304_560_789), vec![12, 304, 560, 789]);
    }

    #[test]
    fn test_decompose_pads_to_length() {
        assert_eq!(decompose(123, 1).unwrap(), vec![123]);
        assert_eq!(decompose(123, 2).unwrap(), vec![0, 123]);
        assert_eq!(decompose(123, 3).unwrap(), vec![0, 0, 123]);
        assert_eq!(decompose(123_456, 2).unwrap(), vec![123, 456]);
        assert_eq!(decompose(123_456, 3).unwrap(), vec![0, 123, 456]);
    }

    #[test]
    fn test_decompose_capacity() {
        assert!(matches!(
            decompose(123_456, 1),
            Err(Error::CapacityExceeded { id: 123_456, groups: 1 })
        ));
        assert!(decompose(999_999_999, 3).is_ok());
        assert!(decompose(1_000_000_000, 3).is_err());
    }

    #[test]
    fn test_compose() {
        assert_eq!(compose(&[123, 456]).unwrap(), 123_456);
        assert_eq!(compose(&[1]).unwrap(), 1);
        assert_eq!(compose(&[0, 0, 0]).unwrap(), 0);
        assert_eq!(compose(&[]).unwrap(), 0);
    }

    #[test]
    fn test_compose_inverts_decompose() {
        let samples = [0u64, 1, 999, 1_000, 1_001, 999_999, 123_456_789, 999_999_999];
        for id in samples {
            assert_eq!(compose(&decompose(id, 3).unwrap()).unwrap(), id);
        }

        // Pseudo-random spread across the full 6-group range.
        let mut x = 0x9e37_79b9_7f4a_7c15u64;
        for _ in 0..1000 {
            x ^= x << 13;
            x ^= x >> 7;
            x ^= x << 17;
            let id = x % (max_id(MAX_GROUPS) + 1);
            assert_eq!(compose(&decompose(id, MAX_GROUPS).unwrap()).unwrap(), id);
        }
    }

    #[test]
    fn test_increment_carries() {
        let groups = 3;
        for id in [0u64, 998, 999, 999_999, 123_999_999] {
            let next = increment(id, groups).unwrap();
            assert_eq!(
                compose(&decompose(id, groups).unwrap()).unwrap() + 1,
                compose(&decompose(next, groups).unwrap()).unwrap()
            );
        }
        assert_eq!(decompose(increment(999, 3).unwrap(), 3).unwrap(), vec![0, 1, 0]);
        assert_eq!(
            decompose(increment(999_999, 3).unwrap(), 3).unwrap(),
            vec![1, 0, 0]
        );
    }

    #[test]
    fn test_increment_at_max() {
        assert_eq!(max_id(3), 999_999_999);
        assert!(increment(999_999_998, 3).is_ok());
        assert!(matches!(
            increment(999_999_999, 3),
            Err(Error::CapacityExceeded { groups: 3, .. })
        ));
        assert!(SegmentId::new(max_id(1)).next(1).is_err());
    }
}
