//! The pseudo-random number generator: a multiplicative LCG (Park-Miller,
//! `A = 16807`, `M = 2^31 - 1`) seeded from 15 predetermined streams, plus
//! the derived distribution samplers.
//!
//! The generator must reproduce, bit-for-bit, the output of a historical C
//! implementation that split the 32-bit seed into two 16-bit halves to avoid
//! a 32-bit multiply on hardware that lacked one. See [`Prng::uniform_unit`]
//! for the exact bit operations; they look unusual but are load-bearing.

use crate::error::{Result, SmplError};

/// Multiplier (7^5) for the minimal-standard LCG.
const A: u64 = 16807;
/// Modulus (2^31 - 1).
const M: u64 = 2_147_483_647;
/// `1 / M`, using the historical single-precision-rounded literal rather
/// than the exact reciprocal, so scaled outputs match the calibrated
/// reference vectors to the last bit.
const INV_M: f64 = 4.656612875e-10;

/// Default seeds for streams 1..15, in order.
pub const DEFAULT_STREAMS: [u32; 15] = [
    1973272912, 747177549, 20464843, 640830765, 1098742207, 78126602, 84743774, 831312807,
    124667236, 1172177002, 1124933064, 1223960546, 1878892440, 1449793615, 553303732,
];

/// A single Park-Miller LCG stream with a Box-Muller carry slot for
/// [`Prng::normal`].
#[derive(Debug, Clone, PartialEq)]
pub struct Prng {
    seed: u32,
    normal_carry: f64,
}

impl Default for Prng {
    fn default() -> Self {
        Self {
            seed: DEFAULT_STREAMS[0],
            normal_carry: 0.0,
        }
    }
}

impl Prng {
    /// Selects one of the 15 predetermined streams and clears the cached
    /// normal-distribution draw. `n` is 1-indexed.
    pub fn stream(&mut self, n: u32) -> Result<()> {
        if !(1..=15).contains(&n) {
            return Err(SmplError::InvalidArgument(format!(
                "random number generator stream must be in 1..=15, got {n}"
            )));
        }
        self.seed = DEFAULT_STREAMS[(n - 1) as usize];
        self.normal_carry = 0.0;
        Ok(())
    }

    /// Sets the seed directly, without touching the cached normal draw.
    pub fn seed(&mut self, value: u32) {
        self.seed = value;
    }

    /// Draws the next value in (0, 1) and advances the generator.
    ///
    /// Implements the historical 16-bit-short-split trick: split the seed
    /// into high half `H` (bits 16-31) and low half `L` (bits 0-15), compute
    /// partial products `H*A` and `L*A`, fold the carry from the low product
    /// into the high one, and reconstruct the reduced-mod-M result from the
    /// two halves. Note that the final carry bit `k` is read from bit 15 of
    /// the *low* half of the intermediate `hi`, not its high half — an easy
    /// detail to get backwards, and the one place this implementation must
    /// not "clean up".
    pub(crate) fn uniform_unit(&mut self) -> f64 {
        let seed = self.seed as u64;

        let h = (seed >> 16) & 0xFFFF;
        let mut hi = h * A;

        let z = seed & 0xFFFF;
        let mut lo = z * A;

        hi += (lo >> 16) & 0xFFFF;

        lo = (lo & 0x0000_FFFF) | (((hi & 0xFFFF) & 0x7FFF) << 16);

        let mut k = ((hi >> 16) & 0xFFFF) << 1;
        if (hi & 0xFFFF) & 0x8000 != 0 {
            k += 1;
        }

        let mut signed_lo = lo as i64 - M as i64 + k as i64;
        if signed_lo < 0 {
            signed_lo += M as i64;
        }

        self.seed = signed_lo as u32;
        signed_lo as f64 * INV_M
    }

    /// Uniform distribution over `[a, b]`.
    pub fn uniform(&mut self, a: f64, b: f64) -> Result<f64> {
        if a > b {
            return Err(SmplError::InvalidArgument(format!(
                "uniform: lower bound {a} exceeds upper bound {b}"
            )));
        }
        Ok(a + (b - a) * self.uniform_unit())
    }

    /// Uniform integer distribution over `[a, b]`, inclusive.
    pub fn random(&mut self, a: i64, b: i64) -> Result<i64> {
        if a > b {
            return Err(SmplError::InvalidArgument(format!(
                "random: lower bound {a} exceeds upper bound {b}"
            )));
        }
        let span = (b - a) as f64 + 1.0;
        Ok(a + (span * self.uniform_unit()).floor() as i64)
    }

    /// Exponential distribution with the given mean.
    pub fn expntl(&mut self, mean: f64) -> f64 {
        -mean * self.uniform_unit().ln()
    }

    /// Erlang distribution with the given mean and standard deviation.
    ///
    /// `stddev` must not exceed `mean`.
    pub fn erlang(&mut self, mean: f64, stddev: f64) -> Result<f64> {
        if stddev > mean {
            return Err(SmplError::InvalidArgument(
                "erlang: standard deviation must not exceed the mean".to_string(),
            ));
        }
        if stddev <= 0.0 {
            return Err(SmplError::InvalidArgument(
                "erlang: standard deviation must be positive".to_string(),
            ));
        }
        let z1 = mean / stddev;
        let k = (z1 * z1) as u64;
        let mut z2 = 1.0;
        for _ in 0..k {
            z2 *= self.uniform_unit();
        }
        Ok(-(mean / k as f64) * z2.ln())
    }

    /// Morse's two-stage hyperexponential distribution.
    ///
    /// `stddev` must exceed `mean`.
    pub fn hyperx(&mut self, mean: f64, stddev: f64) -> Result<f64> {
        if stddev <= mean {
            return Err(SmplError::InvalidArgument(
                "hyperx: standard deviation must exceed the mean".to_string(),
            ));
        }
        let cv = stddev / mean;
        let z = cv * cv;
        let p = 0.5 * (1.0 - ((z - 1.0) / (z + 1.0)).sqrt());
        let s = if self.uniform_unit() > p {
            mean / (1.0 - p)
        } else {
            mean / p
        };
        Ok(-0.5 * s * self.uniform_unit().ln())
    }

    /// Normal (Gaussian) distribution via polar Box-Muller, caching the
    /// second draw for the next call.
    pub fn normal(&mut self, mean: f64, stddev: f64) -> f64 {
        let z1 = if self.normal_carry != 0.0 {
            let cached = self.normal_carry;
            self.normal_carry = 0.0;
            cached
        } else {
            let (v1, factor) = loop {
                let v1 = 2.0 * self.uniform_unit() - 1.0;
                let v2 = 2.0 * self.uniform_unit() - 1.0;
                let w = v1 * v1 + v2 * v2;
                if w < 1.0 {
                    let factor = (-2.0 * w.ln() / w).sqrt();
                    self.normal_carry = v2 * factor;
                    break (v1, factor);
                }
            };
            v1 * factor
        };
        mean + z1 * stddev
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stream(n: u32) -> Prng {
        let mut p = Prng::default();
        p.stream(n).unwrap();
        p
    }

    #[test]
    fn stream_1_matches_calibrated_vector() {
        let mut p = stream(1);
        let expected = [
            0.5624589340289599,
            0.2473047237001694,
            0.4504914481190157,
            0.4097689359278046,
            0.9865065020856831,
        ];
        for e in expected {
            assert_eq!(p.uniform_unit(), e);
        }
    }

    #[test]
    fn all_fifteen_streams_match_calibrated_first_values() {
        let expected_first = [
            0.5624589340289599,
            0.6874008265368088,
            0.16541815416266553,
            0.37819969017772437,
            0.1622328982426986,
            0.44763623615582243,
            0.2360677612988784,
            0.16099767160729878,
            0.6918234879213397,
            0.8900550584258344,
            0.14155100105586726,
            0.1671919641775266,
            0.9060341831312198,
            0.6201809474965004,
            0.35931925024771555,
        ];
        for (idx, expected) in expected_first.into_iter().enumerate() {
            let mut p = stream((idx + 1) as u32);
            assert_eq!(p.uniform_unit(), expected, "stream {}", idx + 1);
        }
    }

    #[test]
    fn stream_rejects_out_of_range() {
        let mut p = Prng::default();
        assert!(p.stream(0).is_err());
        assert!(p.stream(16).is_err());
        assert!(p.stream(1).is_ok());
        assert!(p.stream(15).is_ok());
    }

    #[test]
    fn uniform_unit_matches_plain_modular_lcg() {
        // Cross-check against the non-bit-tricked Park-Miller recurrence for
        // a spread of seeds; the 16-bit split must agree with it exactly.
        let seeds: [u32; 6] = [1, 42, 123_456_789, 2_000_000_000, 999_999, 7];
        for &seed in &seeds {
            let mut p = Prng {
                seed,
                normal_carry: 0.0,
            };
            let got = p.uniform_unit();
            let want = ((seed as u64 * A) % M) as f64 * INV_M;
            assert_eq!(got, want, "seed {seed}");
        }
    }

    #[test]
    fn uniform_guards_bounds() {
        let mut p = stream(1);
        assert!(p.uniform(1.0, 2.0).is_ok());
        assert!(p.uniform(2.0, 1.0).is_err());
    }

    #[test]
    fn random_guards_bounds_and_stays_in_range() {
        let mut p = stream(2);
        for _ in 0..200 {
            let v = p.random(3, 7).unwrap();
            assert!((3..=7).contains(&v));
        }
        assert!(p.random(7, 3).is_err());
    }

    #[test]
    fn erlang_rejects_stddev_above_mean() {
        let mut p = stream(3);
        assert!(p.erlang(10.0, 11.0).is_err());
        assert!(p.erlang(10.0, 5.0).is_ok());
    }

    #[test]
    fn erlang_rejects_non_positive_stddev() {
        let mut p = stream(3);
        assert!(p.erlang(10.0, 0.0).is_err());
        assert!(p.erlang(10.0, -1.0).is_err());
    }

    #[test]
    fn hyperx_rejects_stddev_at_or_below_mean() {
        let mut p = stream(4);
        assert!(p.hyperx(10.0, 10.0).is_err());
        assert!(p.hyperx(10.0, 5.0).is_err());
        assert!(p.hyperx(10.0, 20.0).is_ok());
    }

    #[test]
    fn normal_caches_second_draw() {
        let mut p = stream(5);
        let _ = p.normal(0.0, 1.0);
        assert_ne!(p.normal_carry, 0.0);
        let carry = p.normal_carry;
        let second = p.normal(0.0, 1.0);
        assert_eq!(p.normal_carry, 0.0);
        assert_eq!(second, carry);
    }
}
