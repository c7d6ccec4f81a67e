//! State-of-charge estimation and health scoring.
//!
//! Pure functions over the chemistry table. The only randomness is the
//! measurement-noise term of [`score_health`], drawn from the passed-in Rng.

use rand::Rng;

use crate::{Chemistry, ChemistryTable, Reading};

/// Half-width of the uniform noise added to every health score.
pub const HEALTH_NOISE_AMPLITUDE: f64 = 2.0;

/// Linear interpolation of `voltage` across the chemistry's window, clamped
/// to `[0, 100]`.
pub fn estimate_soc(voltage: f64, chemistry: Chemistry, table: &ChemistryTable) -> f64 {
    let profile = table.profile(chemistry);
    let span = profile.max_voltage - profile.min_voltage;
    if span <= 0.0 {
        return 0.0;
    }
    ((voltage - profile.min_voltage) / span * 100.0).clamp(0.0, 100.0)
}

pub fn temperature_penalty(temperature: f64) -> f64 {
    if temperature > 50.0 {
        ((temperature - 50.0) * 3.0).min(30.0)
    } else if temperature > 40.0 {
        (temperature - 40.0) * 1.5
    } else if temperature < 0.0 {
        (temperature.abs() * 2.0).min(25.0)
    } else if temperature < 10.0 {
        (10.0 - temperature) * 0.8
    } else {
        0.0
    }
}

pub fn voltage_penalty(voltage: f64, optimal_voltage: f64) -> f64 {
    ((voltage - optimal_voltage).abs() * 15.0).min(20.0)
}

pub fn current_penalty(current: f64) -> f64 {
    let magnitude = current.abs();
    if magnitude > 8.0 {
        ((magnitude - 8.0) * 3.0).min(25.0)
    } else if magnitude > 5.0 {
        (magnitude - 5.0) * 1.5
    } else {
        0.0
    }
}

pub fn soc_penalty(soc: f64) -> f64 {
    if soc < 10.0 {
        (10.0 - soc) * 2.0
    } else if soc > 95.0 {
        (soc - 95.0) * 1.5
    } else if soc < 20.0 {
        (20.0 - soc) * 0.5
    } else if soc > 90.0 {
        (soc - 90.0) * 0.8
    } else {
        0.0
    }
}

/// 100 minus the four independent penalties. Unclamped, noise-free.
pub fn health_before_noise(reading: &Reading, chemistry: Chemistry, table: &ChemistryTable) -> f64 {
    let optimal = table.profile(chemistry).optimal_voltage;
    100.0
        - temperature_penalty(reading.temperature)
        - voltage_penalty(reading.voltage, optimal)
        - current_penalty(reading.current)
        - soc_penalty(reading.soc)
}

/// Health with an explicit noise term, clamped to `[0, 100]` after the noise
/// is applied.
pub fn score_health_with_noise(
    reading: &Reading,
    chemistry: Chemistry,
    table: &ChemistryTable,
    noise: f64,
) -> f64 {
    (health_before_noise(reading, chemistry, table) + noise).clamp(0.0, 100.0)
}

/// Health score in `[0, 100]` with a uniform noise draw in
/// `[-HEALTH_NOISE_AMPLITUDE, HEALTH_NOISE_AMPLITUDE]`.
pub fn score_health(
    reading: &Reading,
    chemistry: Chemistry,
    table: &ChemistryTable,
    rng: &mut impl Rng,
) -> f64 {
    let noise = rng.gen_range(-HEALTH_NOISE_AMPLITUDE..=HEALTH_NOISE_AMPLITUDE);
    score_health_with_noise(reading, chemistry, table, noise)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    const EPS: f64 = 1e-9;

    fn reading(voltage: f64, current: f64, temperature: f64, soc: f64) -> Reading {
        Reading {
            voltage,
            current,
            temperature,
            soc,
        }
    }

    // ── estimate_soc ──────────────────────────────────────────────────

    #[test]
    fn soc_is_zero_at_min_and_hundred_at_max() {
        let table = ChemistryTable::default();
        for (chemistry, profile) in table.iter() {
            assert!(estimate_soc(profile.min_voltage, chemistry, &table).abs() < EPS);
            assert!((estimate_soc(profile.max_voltage, chemistry, &table) - 100.0).abs() < EPS);
        }
    }

    #[test]
    fn soc_is_monotonic_and_bounded() {
        let table = ChemistryTable::default();
        for chemistry in Chemistry::ALL {
            let mut previous = f64::NEG_INFINITY;
            for step in 0..=500 {
                let voltage = f64::from(step) * 0.01;
                let soc = estimate_soc(voltage, chemistry, &table);
                assert!((0.0..=100.0).contains(&soc), "{chemistry} {voltage}: {soc}");
                assert!(soc >= previous, "{chemistry} not monotonic at {voltage}");
                previous = soc;
            }
        }
    }

    #[test]
    fn soc_interpolates_lfp() {
        let table = ChemistryTable::default();
        let expected = (3.2 - 2.5) / (3.65 - 2.5) * 100.0;
        assert!((estimate_soc(3.2, Chemistry::Lfp, &table) - expected).abs() < EPS);
        assert!((expected - 60.869_565).abs() < 1e-5);
    }

    // ── penalties ─────────────────────────────────────────────────────

    #[test]
    fn temperature_penalty_bands() {
        assert!(temperature_penalty(25.0).abs() < EPS);
        assert!((temperature_penalty(45.0) - 7.5).abs() < EPS);
        assert!((temperature_penalty(55.0) - 15.0).abs() < EPS);
        assert!((temperature_penalty(70.0) - 30.0).abs() < EPS);
        assert!((temperature_penalty(5.0) - 4.0).abs() < EPS);
        assert!((temperature_penalty(-5.0) - 10.0).abs() < EPS);
        assert!((temperature_penalty(-20.0) - 25.0).abs() < EPS);
    }

    #[test]
    fn voltage_penalty_caps_at_twenty() {
        assert!((voltage_penalty(3.4, 3.3) - 1.5).abs() < 1e-9);
        assert!((voltage_penalty(0.0, 3.7) - 20.0).abs() < EPS);
    }

    #[test]
    fn current_penalty_bands() {
        assert!(current_penalty(4.0).abs() < EPS);
        assert!((current_penalty(-7.0) - 3.0).abs() < EPS);
        assert!((current_penalty(10.0) - 6.0).abs() < EPS);
        assert!((current_penalty(15.0) - 21.0).abs() < EPS);
        assert!((current_penalty(40.0) - 25.0).abs() < EPS);
    }

    #[test]
    fn soc_penalty_bands() {
        assert!((soc_penalty(5.0) - 10.0).abs() < EPS);
        assert!((soc_penalty(15.0) - 2.5).abs() < EPS);
        assert!(soc_penalty(50.0).abs() < EPS);
        assert!((soc_penalty(92.0) - 1.6).abs() < 1e-9);
        assert!((soc_penalty(98.0) - 4.5).abs() < EPS);
    }

    // ── score_health ──────────────────────────────────────────────────

    #[test]
    fn healthy_lfp_loses_only_voltage_deviation() {
        let table = ChemistryTable::default();
        let soc = estimate_soc(3.2, Chemistry::Lfp, &table);
        let r = reading(3.2, 0.0, 25.0, soc);
        let health = score_health_with_noise(&r, Chemistry::Lfp, &table, 0.0);
        assert!((health - 98.5).abs() < 1e-9);
    }

    #[test]
    fn stressed_nmc_sums_penalties() {
        let table = ChemistryTable::default();
        let r = reading(4.2, 10.0, 55.0, 98.0);
        // 15 (temp) + 7.5 (voltage) + 6 (current) + 4.5 (soc)
        let health = score_health_with_noise(&r, Chemistry::Nmc, &table, 0.0);
        assert!((health - 67.0).abs() < 1e-9);
    }

    #[test]
    fn noise_is_applied_before_clamp() {
        let table = ChemistryTable::default();
        let r = reading(3.3, 0.0, 25.0, 50.0);
        assert!((score_health_with_noise(&r, Chemistry::Lfp, &table, 2.0) - 100.0).abs() < EPS);
        assert!((score_health_with_noise(&r, Chemistry::Lfp, &table, -2.0) - 98.0).abs() < EPS);
    }

    #[test]
    fn extreme_inputs_stay_in_range() {
        let table = ChemistryTable::default();
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let extremes = [
            reading(-100.0, 1_000.0, 500.0, -50.0),
            reading(100.0, -1_000.0, -300.0, 400.0),
            reading(0.0, 0.0, 0.0, 0.0),
        ];
        for r in &extremes {
            for chemistry in Chemistry::ALL {
                for _ in 0..50 {
                    let health = score_health(r, chemistry, &table, &mut rng);
                    assert!((0.0..=100.0).contains(&health), "{r:?} -> {health}");
                }
            }
        }
    }

    #[test]
    fn seeded_scores_are_reproducible() {
        let table = ChemistryTable::default();
        let r = reading(3.6, 2.0, 30.0, 70.0);
        let mut a = ChaCha8Rng::seed_from_u64(42);
        let mut b = ChaCha8Rng::seed_from_u64(42);
        for _ in 0..10 {
            let left = score_health(&r, Chemistry::Nmc, &table, &mut a);
            let right = score_health(&r, Chemistry::Nmc, &table, &mut b);
            assert!((left - right).abs() < f64::EPSILON);
        }
    }

    #[test]
    fn noise_stays_within_amplitude() {
        let table = ChemistryTable::default();
        let r = reading(3.7, 0.0, 25.0, 50.0);
        let base = health_before_noise(&r, Chemistry::Nmc, &table);
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        for _ in 0..200 {
            let health = score_health(&r, Chemistry::Nmc, &table, &mut rng);
            assert!(health >= base - HEALTH_NOISE_AMPLITUDE - EPS);
            assert!(health <= 100.0);
        }
    }
}
