//! Deterministic shuffle ("fountain") PRNG.
//!
//! A direct port of `fountain.c`/`fountain.h`: a 64-bit xorshift-multiply
//! generator (Numerical Recipes' "Ranq1"). The sender and the recovery
//! engine each build their own [`Ranq1`], seed it with the same constant,
//! and run the same shuffle, so the two sides reconstruct bit-identical
//! permutations without exchanging any state.

/// Numerical Recipes "Ranq1" initial state.
const RANQ1_IV: u64 = 4_101_842_887_655_102_017;
/// Multiplier applied to every generated value.
const RANQ1_MULTIPLIER: u64 = 2_685_821_657_736_338_717;

/// The xorshift-multiply generator used to build the slice permutation.
pub struct Ranq1 {
    v: u64,
}

impl Default for Ranq1 {
    fn default() -> Self {
        Ranq1 { v: RANQ1_IV }
    }
}

impl Ranq1 {
    /// A fresh generator in its initial, unseeded state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance the generator and return the next 64-bit output.
    pub fn next_u64(&mut self) -> u64 {
        self.v ^= self.v >> 21;
        self.v ^= self.v << 35;
        self.v ^= self.v >> 4;
        self.v.wrapping_mul(RANQ1_MULTIPLIER)
    }

    /// Mix `seed` into the generator state and discard one output, exactly
    /// as `seed()` in `fountain.c` does via `Random32`.
    pub fn seed(&mut self, seed: u64) {
        self.v ^= seed;
        self.v = self.next_u64();
    }

    /// Fisher-Yates shuffle in descending order, matching `shuffle32`.
    pub fn shuffle(&mut self, a: &mut [u32]) {
        let n = a.len();
        for i in (1..n).rev() {
            let j = (self.next_u64() % (i as u64 + 1)) as usize;
            a.swap(i, j);
        }
    }

    /// Fisher-Yates shuffle that simultaneously builds the inverse
    /// permutation `lookup`, matching `indexed_shuffle32`. On exit,
    /// `lookup[a[k]] == k` for every `k`.
    pub fn indexed_shuffle(&mut self, a: &mut [u32], lookup: &mut [u32]) {
        let n = a.len();
        for i in (1..n).rev() {
            let j = (self.next_u64() % (i as u64 + 1)) as usize;
            lookup.swap(a[i] as usize, a[j] as usize);
            a.swap(i, j);
        }
    }
}

/// Build the identity permutation `[0, n)` as `u32`s.
pub fn identity(n: u32) -> Vec<u32> {
    (0..n).collect()
}

/// Build the sender-side permutation π: identity, seed(777), `shuffle`.
pub fn build_permutation(n: u32, seed: u64) -> Vec<u32> {
    let mut a = identity(n);
    let mut rng = Ranq1::new();
    rng.seed(seed);
    rng.shuffle(&mut a);
    a
}

/// Build π and π⁻¹ together: identity, seed(777), `indexed_shuffle`.
///
/// Returns `(index, lookup)` such that `lookup[index[i]] == i` for all `i`.
pub fn build_permutation_with_inverse(n: u32, seed: u64) -> (Vec<u32>, Vec<u32>) {
    let mut index = identity(n);
    let mut lookup = identity(n);
    let mut rng = Ranq1::new();
    rng.seed(seed);
    rng.indexed_shuffle(&mut index, &mut lookup);
    (index, lookup)
}

/// FNV-1a, 32-bit. Used to desynchronise the sender's spray transmission
/// order across distinct files sharing a diode (`fnv_hash` in
/// `datadiode-send.c`).
pub fn fnv1a32(data: &[u8]) -> u32 {
    let mut h = crate::constants::FNV_OFFSET_BASIS_32;
    for &byte in data {
        h = h.wrapping_mul(crate::constants::FNV_PRIME_32) ^ u32::from(byte);
    }
    h
}

#[cfg(test)]
mod tests {
    use super::*;
    use quickcheck_macros::quickcheck;

    #[test]
    fn seeded_sequence_is_reproducible() {
        let mut a = Ranq1::new();
        a.seed(777);
        let mut b = Ranq1::new();
        b.seed(777);
        for _ in 0..100 {
            assert_eq!(a.next_u64(), b.next_u64());
        }
    }

    #[test]
    fn fnv1a32_matches_known_vector() {
        // FNV-1a 32-bit of the empty string is the offset basis.
        assert_eq!(fnv1a32(b""), crate::constants::FNV_OFFSET_BASIS_32);
    }

    #[quickcheck]
    fn indexed_shuffle_is_inverse_consistent(n: u8) -> bool {
        let n = (n as u32 % 2000).max(1);
        let (index, lookup) = build_permutation_with_inverse(n, 777);
        let mut seen = vec![false; n as usize];
        for &v in &index {
            if v >= n || seen[v as usize] {
                return false;
            }
            seen[v as usize] = true;
        }
        (0..n).all(|k| lookup[index[k as usize] as usize] == k)
    }

    #[test]
    fn shuffle_and_indexed_shuffle_agree_on_permutation() {
        // Both shuffle variants swap entries the same way, so the resulting
        // permutation array must be identical for the same seed and n.
        let plain = build_permutation(500, 777);
        let (indexed, _) = build_permutation_with_inverse(500, 777);
        assert_eq!(plain, indexed);
    }
}
