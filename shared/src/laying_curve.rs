//! Reference laying curve for commercial layers
//!
//! Expected laying rate by age in weeks, as a lookup over a static table.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Expected laying rate band, in percent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpectedLayingRate {
    pub min: Decimal,
    pub max: Decimal,
    pub optimal: Decimal,
}

/// (first week, last week, min, max, optimal)
const CURVE: &[(i64, i64, i64, i64, i64)] = &[
    (0, 17, 0, 0, 0),
    (18, 18, 0, 10, 5),
    (19, 19, 5, 25, 15),
    (20, 20, 20, 50, 35),
    (21, 21, 40, 70, 55),
    (22, 22, 55, 80, 70),
    (23, 23, 70, 88, 80),
    (24, 24, 80, 92, 88),
    (25, 26, 85, 95, 92),
    (27, 30, 88, 96, 94),
    (31, 35, 85, 94, 91),
    (36, 40, 82, 92, 88),
    (41, 45, 78, 88, 84),
    (46, 50, 72, 84, 79),
    (51, 55, 65, 78, 72),
    (56, 60, 58, 72, 66),
    (61, 70, 50, 68, 60),
    (71, 100, 40, 60, 50),
];

/// Band used past the end of the table
const BEYOND_CURVE: (i64, i64, i64) = (30, 50, 40);

pub fn expected_rate(age_weeks: i64) -> ExpectedLayingRate {
    let (min, max, optimal) = CURVE
        .iter()
        .find(|(from, to, ..)| (*from..=*to).contains(&age_weeks))
        .map(|&(_, _, min, max, optimal)| (min, max, optimal))
        .unwrap_or(BEYOND_CURVE);
    ExpectedLayingRate {
        min: Decimal::from(min),
        max: Decimal::from(max),
        optimal: Decimal::from(optimal),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayingPhase {
    PreLay,
    Onset,
    Rising,
    Peak,
    PostPeak,
    EndCycle,
}

pub fn phase(age_weeks: i64) -> LayingPhase {
    match age_weeks {
        w if w < 18 => LayingPhase::PreLay,
        w if w < 20 => LayingPhase::Onset,
        w if w < 25 => LayingPhase::Rising,
        w if w < 32 => LayingPhase::Peak,
        w if w < 52 => LayingPhase::PostPeak,
        _ => LayingPhase::EndCycle,
    }
}

/// How an observed rate compares with the expected band
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CurvePosition {
    Below,
    Within,
    Above,
}

pub fn compare(observed: Decimal, expected: &ExpectedLayingRate) -> CurvePosition {
    if observed < expected.min {
        CurvePosition::Below
    } else if observed > expected.max {
        CurvePosition::Above
    } else {
        CurvePosition::Within
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expected_rate_lookup() {
        assert_eq!(expected_rate(10).optimal, Decimal::ZERO);
        assert_eq!(expected_rate(20).optimal, Decimal::from(35));
        let peak = expected_rate(28);
        assert_eq!((peak.min, peak.max, peak.optimal), (Decimal::from(88), Decimal::from(96), Decimal::from(94)));
        assert_eq!(expected_rate(100).optimal, Decimal::from(50));
        assert_eq!(expected_rate(120).optimal, Decimal::from(40));
    }

    #[test]
    fn test_phase_boundaries() {
        assert_eq!(phase(17), LayingPhase::PreLay);
        assert_eq!(phase(18), LayingPhase::Onset);
        assert_eq!(phase(24), LayingPhase::Rising);
        assert_eq!(phase(25), LayingPhase::Peak);
        assert_eq!(phase(40), LayingPhase::PostPeak);
        assert_eq!(phase(52), LayingPhase::EndCycle);
    }

    #[test]
    fn test_compare() {
        let expected = expected_rate(30);
        assert_eq!(compare(Decimal::from(80), &expected), CurvePosition::Below);
        assert_eq!(compare(Decimal::from(90), &expected), CurvePosition::Within);
        assert_eq!(compare(Decimal::from(97), &expected), CurvePosition::Above);
    }
}
