/// A PCG32 (permuted congruential generator) pseudo-random number
/// generator, following the reference `pcg32_random_r` / `pcg32_srandom_r`
/// algorithm. Deterministic given `(init_state, init_seq)`, which makes it
/// suitable for reproducible per-tile renderer seeding.
#[derive(Debug, Clone, PartialEq)]
pub struct Pcg {
    state: u64,
    inc: u64,
}

const PCG_MULTIPLIER: u64 = 6364136223846793005;

impl Pcg {
    pub fn new(init_state: u64, init_seq: u64) -> Self {
        let mut pcg = Pcg { state: 0, inc: (init_seq << 1) | 1 };
        pcg.step();
        pcg.state = pcg.state.wrapping_add(init_state);
        pcg.step();
        pcg
    }

    /// Default seed, equivalent to `Pcg::new(42, 54)`.
    pub fn default_seed() -> Self {
        Pcg::new(42, 54)
    }

    pub fn state(&self) -> u64 {
        self.state
    }

    pub fn inc(&self) -> u64 {
        self.inc
    }

    fn step(&mut self) -> u64 {
        let oldstate = self.state;
        self.state = oldstate.wrapping_mul(PCG_MULTIPLIER).wrapping_add(self.inc);

        let xorshifted = (((oldstate >> 18) ^ oldstate) >> 27) as u32;
        let rot = (oldstate >> 59) as u32;
        xorshifted.rotate_right(rot)
    }

    /// Generate the next pseudo-random `u32`.
    pub fn random_u32(&mut self) -> u32 {
        self.step()
    }

    /// Generate a uniform `f64` in `[0, 1)`.
    pub fn random_f64(&mut self) -> f64 {
        f64::from(self.random_u32()) / f64::from(u32::MAX)
    }

    /// Derive a fresh, statistically independent stream for parallel tile
    /// dispatch: the increment must stay odd (the PCG invariant), and the
    /// state is re-seeded from a hash of this generator's own state so two
    /// tiles never share a sequence regardless of scheduling order.
    pub fn derive_stream(&self, tile_id: u64) -> Pcg {
        let mut state = self.state ^ tile_id.wrapping_mul(0x9E3779B97F4A7C15);
        state = state.wrapping_mul(PCG_MULTIPLIER).wrapping_add(self.inc);
        Pcg::new(state, self.inc | 1)
    }
}

impl rand_core::RngCore for Pcg {
    fn next_u32(&mut self) -> u32 {
        self.random_u32()
    }

    fn next_u64(&mut self) -> u64 {
        rand_core::impls::next_u64_via_u32(self)
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        rand_core::impls::fill_bytes_via_next(self, dest)
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
        self.fill_bytes(dest);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_sequence() {
        let mut pcg = Pcg::new(1, 54);
        let expected = [
            2707161783u32,
            2068313097,
            3122475824,
            2211639955,
            3215226955,
            3421331566,
        ];

        for e in expected {
            assert_eq!(pcg.random_u32(), e);
        }
    }

    #[test]
    fn test_derived_streams_are_distinct_and_reproducible() {
        let base = Pcg::new(1, 54);

        let mut a1 = base.derive_stream(0);
        let mut a2 = base.derive_stream(0);
        let mut b = base.derive_stream(1);

        assert_eq!(a1.random_u32(), a2.random_u32());
        assert_ne!(a1.random_u32(), b.random_u32());
        assert_eq!(a1.inc() % 2, 1);
    }
}
