//! Restartable pseudo-random scalar stream shared by every entity in a frame.

const MULTIPLIER: u64 = 134_775_813;
const INCREMENT: u64 = 1;
const MODULUS: u64 = 1 << 32;

/// Linear congruential sequence that yields scalars in `[0, 1)`.
///
/// The cursor is a single piece of state consumed in call order. Resetting it
/// at the start of every frame means that the `n`th draw of a frame always
/// yields the same value, so two frames that animate the same population in
/// the same order produce identical poses.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct PseudoRandomSequence {
    seed: u64,
    state: u64,
    draws: u64,
}

impl PseudoRandomSequence {
    /// Creates a sequence that restarts from a zero seed.
    #[must_use]
    pub const fn new() -> Self {
        Self::with_seed(0)
    }

    /// Creates a sequence that restarts from the provided seed.
    ///
    /// Only the low 32 bits of the seed participate in the sequence.
    #[must_use]
    pub const fn with_seed(seed: u32) -> Self {
        Self {
            seed: seed as u64,
            state: seed as u64,
            draws: 0,
        }
    }

    /// Rewinds the cursor to its seed.
    pub fn reset(&mut self) {
        self.state = self.seed;
        self.draws = 0;
    }

    /// Advances the cursor and returns the next scalar in `[0, 1)`.
    pub fn next_unit(&mut self) -> f64 {
        self.state = self
            .state
            .wrapping_mul(MULTIPLIER)
            .wrapping_add(INCREMENT)
            % MODULUS;
        self.draws = self.draws.wrapping_add(1);
        self.state as f64 / MODULUS as f64
    }

    /// Number of scalars drawn since the last reset.
    #[must_use]
    pub const fn draws(&self) -> u64 {
        self.draws
    }
}

impl Default for PseudoRandomSequence {
    fn default() -> Self {
        Self::new()
    }
}
