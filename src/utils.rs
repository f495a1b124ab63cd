//! Strength metrics: estimated one-rep max, intensity, and rep-range bands.

use std::ops::RangeInclusive;

use crate::types::OneRmFormula;

/// Rep counts above this are treated as this many; the formulas stop
/// tracking real strength past typical strength rep ranges.
pub const MAX_FORMULA_REPS: u32 = 12;

/// Estimated 1RM for a set of `reps` at `weight`.
///
/// A single rep (or none) is its own max. Reps above [`MAX_FORMULA_REPS`]
/// are capped before the formula is applied.
pub fn calculate_1rm(weight: f64, reps: u32, formula: OneRmFormula) -> f64 {
    if reps <= 1 {
        return weight;
    }

    let r = f64::from(reps.min(MAX_FORMULA_REPS));
    match formula {
        OneRmFormula::Brzycki => weight * (36.0 / (37.0 - r)),
        OneRmFormula::Epley => weight * (1.0 + r / 30.0),
    }
}

/// Fraction of `one_rm` that `weight` represents; 0 when the max is unknown.
pub fn percent_of_max(weight: f64, one_rm: f64) -> f64 {
    if one_rm <= 0.0 {
        0.0
    } else {
        weight / one_rm
    }
}

/// Rep range that fits a given fraction of 1RM.
pub fn recommended_rep_range(percent_of_max: f64) -> RangeInclusive<u32> {
    match percent_of_max {
        p if (0.9..=1.0).contains(&p) => 1..=3,
        p if (0.8..0.9).contains(&p) => 3..=6,
        p if (0.7..0.8).contains(&p) => 6..=10,
        p if (0.6..0.7).contains(&p) => 10..=15,
        _ => 15..=20,
    }
}

/// Round to the nearest loadable increment (2.5 kg plates and the like).
pub fn round_to_increment(weight: f64, increment: f64) -> f64 {
    if increment <= 0.0 {
        return weight;
    }
    (weight / increment).round() * increment
}

pub fn format_duration(duration: chrono::Duration) -> String {
    let hours = duration.num_hours();
    let minutes = duration.num_minutes() % 60;

    if hours > 0 {
        format!("{}h {}m", hours, minutes)
    } else {
        format!("{}m", minutes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    #[test]
    fn test_single_rep_is_the_max() {
        for w in [0.0, 20.0, 102.5, 300.0] {
            assert_eq!(calculate_1rm(w, 0, OneRmFormula::Brzycki), w);
            assert_eq!(calculate_1rm(w, 1, OneRmFormula::Brzycki), w);
            assert_eq!(calculate_1rm(w, 1, OneRmFormula::Epley), w);
        }
    }

    #[test]
    fn test_brzycki_exact_value() {
        let e1rm = calculate_1rm(100.0, 5, OneRmFormula::Brzycki);
        assert!((e1rm - 112.5).abs() < EPS, "got {e1rm}");
    }

    #[test]
    fn test_epley_value() {
        let e1rm = calculate_1rm(100.0, 6, OneRmFormula::Epley);
        assert!((e1rm - 120.0).abs() < EPS, "got {e1rm}");
    }

    #[test]
    fn test_reps_are_capped_at_twelve() {
        let at_cap = calculate_1rm(80.0, 12, OneRmFormula::Brzycki);
        for reps in [13, 15, 20, 100] {
            assert_eq!(calculate_1rm(80.0, reps, OneRmFormula::Brzycki), at_cap);
            assert_eq!(
                calculate_1rm(80.0, reps, OneRmFormula::Epley),
                calculate_1rm(80.0, 12, OneRmFormula::Epley)
            );
        }
    }

    #[test]
    fn test_percent_of_max_never_divides_by_zero() {
        assert_eq!(percent_of_max(100.0, 0.0), 0.0);
        assert_eq!(percent_of_max(100.0, -5.0), 0.0);
        assert!((percent_of_max(90.0, 100.0) - 0.9).abs() < EPS);
    }

    #[test]
    fn test_recommended_rep_range_bands() {
        assert_eq!(recommended_rep_range(1.0), 1..=3);
        assert_eq!(recommended_rep_range(0.9), 1..=3);
        assert_eq!(recommended_rep_range(0.85), 3..=6);
        assert_eq!(recommended_rep_range(0.75), 6..=10);
        assert_eq!(recommended_rep_range(0.6), 10..=15);
        assert_eq!(recommended_rep_range(0.5), 15..=20);
        assert_eq!(recommended_rep_range(1.2), 15..=20);
    }

    #[test]
    fn test_round_to_increment() {
        assert_eq!(round_to_increment(103.0, 2.5), 102.5);
        assert_eq!(round_to_increment(104.0, 2.5), 105.0);
        assert_eq!(round_to_increment(104.0, 0.0), 104.0);
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(chrono::Duration::minutes(45)), "45m");
        assert_eq!(format_duration(chrono::Duration::minutes(95)), "1h 35m");
    }
}
