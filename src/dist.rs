//! Random durations, transmission counts and dice throws.

use anyhow::{Context, Result, bail};
use rand::prelude::*;
use rand_distr::{Exp, Gamma, Poisson};
use serde::{Deserialize, Serialize};

/// Dispersion of the negative binomial (superspreading) transmission model.
pub const K_NEGATIVE_BINOMIAL: f64 = 0.16;

/// Dispersion of the near-deterministic transmission model.
pub const K_POISSON: f64 = 1e4;

/// Distribution of incubation and recovery times.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DurationDist {
    Fixed,
    Exponential,
    Gamma,
}

/// Distribution of the individual reproduction number.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransmissionDist {
    Fixed,
    NegativeBinomial,
    Poisson,
}

impl TransmissionDist {
    /// Dispersion parameter `k`, or `None` for the fixed case.
    pub fn dispersion(&self) -> Option<f64> {
        match self {
            TransmissionDist::Fixed => None,
            TransmissionDist::NegativeBinomial => Some(K_NEGATIVE_BINOMIAL),
            TransmissionDist::Poisson => Some(K_POISSON),
        }
    }
}

/// Sample a duration with the given mean.
///
/// The gamma case uses `shape = mean` and `scale = 1`, so its variance is also `mean`.
pub fn sample_duration<R: Rng + ?Sized>(rng: &mut R, kind: DurationDist, mean: f64) -> Result<f64> {
    if kind != DurationDist::Fixed && (mean.is_nan() || mean <= 0.0 || mean.is_infinite()) {
        bail!("mean of a {kind:?} duration must be positive and finite, but is {mean}");
    }

    let duration = match kind {
        DurationDist::Fixed => mean,
        DurationDist::Exponential => {
            let exp_dist = Exp::new(1.0 / mean)
                .with_context(|| format!("invalid exponential mean {mean}"))?;
            exp_dist.sample(rng)
        }
        DurationDist::Gamma => {
            let gamma_dist =
                Gamma::new(mean, 1.0).with_context(|| format!("invalid gamma shape {mean}"))?;
            gamma_dist.sample(rng)
        }
    };
    Ok(duration)
}

/// Sample a transmission count from the negative binomial with mean `r0_mean` and
/// dispersion `k`, i.e. `n = k` and `prob = 1 / (1 + r0_mean / k)`.
///
/// Drawn as a gamma-Poisson mixture.
pub fn sample_transmission_count<R: Rng + ?Sized>(rng: &mut R, r0_mean: f64, k: f64) -> Result<f64> {
    if r0_mean < 0.0 || k <= 0.0 {
        bail!("negative binomial requires r0 >= 0 and k > 0, but got r0 = {r0_mean}, k = {k}");
    }
    if r0_mean == 0.0 {
        return Ok(0.0);
    }

    let rate_dist = Gamma::new(k, r0_mean / k).context("failed to build gamma mixing dist")?;
    let rate = rate_dist.sample(rng);

    // Very small shapes can underflow the mixing rate.
    if rate <= 0.0 {
        return Ok(0.0);
    }

    let count_dist = Poisson::new(rate).context("failed to build poisson dist")?;
    Ok(count_dist.sample(rng))
}

/// One uniform draw in `[0, 1)` compared against `prob`.
///
/// Never fails: `prob <= 0` is always false and `prob >= 1` is always true.
pub fn throw_dice<R: Rng + ?Sized>(rng: &mut R, prob: f64) -> bool {
    rng.random::<f64>() < prob
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand_chacha::ChaCha12Rng;

    fn sample_mean(n: usize, mut f: impl FnMut() -> f64) -> f64 {
        (0..n).map(|_| f()).sum::<f64>() / n as f64
    }

    #[test]
    fn fixed_duration_is_exact() {
        let mut rng = ChaCha12Rng::seed_from_u64(1);
        for mean in [0.5, 5.5, 27.5] {
            let duration = sample_duration(&mut rng, DurationDist::Fixed, mean).unwrap();
            assert_eq!(duration, mean);
        }
    }

    #[test]
    fn exponential_duration_has_requested_mean() {
        let mut rng = ChaCha12Rng::seed_from_u64(2);
        let mean = sample_mean(200_000, || {
            sample_duration(&mut rng, DurationDist::Exponential, 5.5).unwrap()
        });
        assert!((mean - 5.5).abs() < 0.1, "mean = {mean}");
    }

    #[test]
    fn gamma_duration_ties_shape_to_mean() {
        let mut rng = ChaCha12Rng::seed_from_u64(3);
        let samples: Vec<f64> = (0..200_000)
            .map(|_| sample_duration(&mut rng, DurationDist::Gamma, 4.0).unwrap())
            .collect();
        let mean = samples.iter().sum::<f64>() / samples.len() as f64;
        let var = samples.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / samples.len() as f64;
        assert!((mean - 4.0).abs() < 0.05, "mean = {mean}");
        assert!((var - 4.0).abs() < 0.15, "var = {var}");
    }

    #[test]
    fn invalid_duration_mean_is_an_error() {
        let mut rng = ChaCha12Rng::seed_from_u64(4);
        assert!(sample_duration(&mut rng, DurationDist::Exponential, 0.0).is_err());
        assert!(sample_duration(&mut rng, DurationDist::Exponential, f64::INFINITY).is_err());
        assert!(sample_duration(&mut rng, DurationDist::Gamma, -1.0).is_err());
        assert!(sample_duration(&mut rng, DurationDist::Gamma, f64::NAN).is_err());
    }

    #[test]
    fn transmission_count_has_requested_mean() {
        let mut rng = ChaCha12Rng::seed_from_u64(5);
        for k in [K_NEGATIVE_BINOMIAL, K_POISSON] {
            let mean = sample_mean(200_000, || {
                sample_transmission_count(&mut rng, 3.5, k).unwrap()
            });
            assert!((mean - 3.5).abs() < 0.1, "k = {k}, mean = {mean}");
        }
    }

    #[test]
    fn small_dispersion_produces_superspreaders() {
        let mut rng = ChaCha12Rng::seed_from_u64(6);
        let samples: Vec<f64> = (0..50_000)
            .map(|_| sample_transmission_count(&mut rng, 3.5, K_NEGATIVE_BINOMIAL).unwrap())
            .collect();
        let zeros = samples.iter().filter(|&&x| x == 0.0).count() as f64 / samples.len() as f64;
        let max = samples.iter().cloned().fold(0.0, f64::max);
        assert!(zeros > 0.5, "fraction of zeros = {zeros}");
        assert!(max > 20.0, "max = {max}");
    }

    #[test]
    fn transmission_count_edge_cases() {
        let mut rng = ChaCha12Rng::seed_from_u64(7);
        assert_eq!(sample_transmission_count(&mut rng, 0.0, K_POISSON).unwrap(), 0.0);
        assert!(sample_transmission_count(&mut rng, 3.5, 0.0).is_err());
        assert!(sample_transmission_count(&mut rng, -1.0, K_POISSON).is_err());
    }

    #[test]
    fn dice_boundaries() {
        let mut rng = ChaCha12Rng::seed_from_u64(8);
        for _ in 0..10_000 {
            assert!(!throw_dice(&mut rng, 0.0));
            assert!(!throw_dice(&mut rng, -0.5));
            assert!(throw_dice(&mut rng, 1.0));
            assert!(throw_dice(&mut rng, 1.5));
        }
    }

    #[test]
    fn dice_frequency() {
        let mut rng = ChaCha12Rng::seed_from_u64(9);
        let hits = (0..100_000).filter(|_| throw_dice(&mut rng, 0.3)).count();
        let freq = hits as f64 / 100_000.0;
        assert!((freq - 0.3).abs() < 0.01, "freq = {freq}");
    }
}
