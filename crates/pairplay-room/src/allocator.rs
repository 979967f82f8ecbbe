//! Short numeric code allocation.
//!
//! Room PINs and seat pairing codes are drawn uniformly at random from a
//! fixed range and retried until they don't collide with a live code.
//! Because callers type these codes by hand the ranges are small, so the
//! allocator refuses to hand out codes once the live population reaches a
//! configured share of the space instead of retrying forever.

use rand::Rng;

use crate::RoomError;

/// Random draws attempted before falling back to a linear scan.
const RANDOM_ATTEMPTS: usize = 32;

/// An inclusive range of numeric codes with a saturation limit.
#[derive(Debug, Clone, Copy)]
pub struct CodeSpace {
    name: &'static str,
    min: u32,
    max: u32,
    capacity: usize,
}

impl CodeSpace {
    /// 4-digit room PINs, 1000 to 9999.
    pub fn room_pins(saturation_ratio: f64) -> Self {
        Self::new("room PIN", 1000, 9999, saturation_ratio)
    }

    /// 3-digit pairing codes, 100 to 999.
    pub fn pairing_codes(saturation_ratio: f64) -> Self {
        Self::new("pairing code", 100, 999, saturation_ratio)
    }

    fn new(name: &'static str, min: u32, max: u32, saturation_ratio: f64) -> Self {
        let size = (max - min + 1) as usize;
        let ratio = saturation_ratio.clamp(0.0, 1.0);
        Self {
            name,
            min,
            max,
            capacity: (size as f64 * ratio).floor() as usize,
        }
    }

    /// Total number of codes in the range.
    pub fn size(&self) -> usize {
        (self.max - self.min + 1) as usize
    }

    /// How many codes may be live at once.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Draws a code that `is_live` reports as free.
    ///
    /// `live` is the current number of live codes in this space.
    ///
    /// # Errors
    /// Returns [`RoomError::ResourceExhausted`] when `live` has reached the
    /// saturation limit, or when no free code exists.
    pub fn allocate<R, F>(&self, rng: &mut R, live: usize, is_live: F) -> Result<u32, RoomError>
    where
        R: Rng,
        F: Fn(u32) -> bool,
    {
        if live >= self.capacity {
            tracing::warn!(space = self.name, live, capacity = self.capacity, "code space saturated");
            return Err(RoomError::ResourceExhausted(self.name));
        }

        for _ in 0..RANDOM_ATTEMPTS {
            let candidate = rng.random_range(self.min..=self.max);
            if !is_live(candidate) {
                return Ok(candidate);
            }
        }

        // Unlucky streak: walk the range from a random point so the
        // result stays spread out but allocation always terminates.
        let span = self.max - self.min + 1;
        let start = rng.random_range(0..span);
        (0..span)
            .map(|offset| self.min + (start + offset) % span)
            .find(|candidate| !is_live(*candidate))
            .ok_or(RoomError::ResourceExhausted(self.name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use std::collections::HashSet;

    #[test]
    fn test_capacity_is_share_of_space() {
        assert_eq!(CodeSpace::room_pins(0.8).size(), 9000);
        assert_eq!(CodeSpace::room_pins(0.8).capacity(), 7200);
        assert_eq!(CodeSpace::pairing_codes(0.8).size(), 900);
        assert_eq!(CodeSpace::pairing_codes(0.8).capacity(), 720);
    }

    #[test]
    fn test_allocate_stays_in_range_and_avoids_live_codes() {
        let space = CodeSpace::pairing_codes(1.0);
        let mut rng = StdRng::seed_from_u64(7);
        let mut live = HashSet::new();

        for _ in 0..500 {
            let code = space
                .allocate(&mut rng, live.len(), |c| live.contains(&c))
                .unwrap();
            assert!((100..=999).contains(&code));
            assert!(live.insert(code), "code {code} allocated twice");
        }
    }

    #[test]
    fn test_allocate_finds_last_free_code_by_scan() {
        let space = CodeSpace::pairing_codes(1.0);
        let mut rng = StdRng::seed_from_u64(1);

        let code = space.allocate(&mut rng, 899, |c| c != 555).unwrap();
        assert_eq!(code, 555);
    }

    #[test]
    fn test_allocate_at_saturation_returns_resource_exhausted() {
        let space = CodeSpace::pairing_codes(0.8);
        let mut rng = StdRng::seed_from_u64(3);

        let result = space.allocate(&mut rng, 720, |_| false);
        assert!(matches!(result, Err(RoomError::ResourceExhausted("pairing code"))));
    }

    #[test]
    fn test_allocate_full_space_returns_resource_exhausted() {
        let space = CodeSpace::room_pins(1.0);
        let mut rng = StdRng::seed_from_u64(3);

        let result = space.allocate(&mut rng, 0, |_| true);
        assert!(matches!(result, Err(RoomError::ResourceExhausted(_))));
    }
}
