//! # Tuning Module
//!
//! Target pitches for the instrument and nearest-target matching.
//!
//! ## Features
//! - Ordered label → frequency table, immutable after construction
//! - Standard six-string guitar tuning (E2 A2 D3 G3 B3 E4)
//! - Nearest-target lookup with first-inserted tie-break
//! - Cent deviation between a measurement and its target

use once_cell::sync::Lazy;

use crate::error::ConfigError;

/// A single target: the string's label and its frequency.
#[derive(Debug, Clone, PartialEq)]
pub struct TargetPitch {
    /// String label (e.g., "E2", "A2")
    pub label: String,
    /// Frequency in Hz
    pub frequency: f32,
}

/// Ordered set of target pitches.
///
/// Iteration order is insertion order, which also decides ties in
/// [`TargetPitchTable::nearest`].
#[derive(Debug, Clone, PartialEq)]
pub struct TargetPitchTable {
    pitches: Vec<TargetPitch>,
}

/// Standard guitar tuning, low string first.
static STANDARD_GUITAR: Lazy<TargetPitchTable> = Lazy::new(|| TargetPitchTable {
    pitches: [
        ("E2", 82.0),
        ("A2", 110.0),
        ("D3", 147.0),
        ("G3", 196.0),
        ("B3", 247.0),
        ("E4", 330.0),
    ]
    .into_iter()
    .map(|(label, frequency)| TargetPitch {
        label: label.to_string(),
        frequency,
    })
    .collect(),
});

impl TargetPitchTable {
    /// Builds a table from `(label, frequency)` pairs, keeping their order.
    pub fn new<I, L>(targets: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (L, f32)>,
        L: Into<String>,
    {
        let pitches = targets
            .into_iter()
            .map(|(label, frequency)| {
                let label = label.into();
                if frequency.is_finite() {
                    Ok(TargetPitch { label, frequency })
                } else {
                    Err(ConfigError::NonFiniteTarget { label })
                }
            })
            .collect::<Result<Vec<_>, _>>()?;

        if pitches.is_empty() {
            return Err(ConfigError::EmptyPitchTable);
        }
        Ok(Self { pitches })
    }

    /// The six open strings of a guitar in standard tuning.
    pub fn standard_guitar() -> &'static TargetPitchTable {
        &STANDARD_GUITAR
    }

    pub fn len(&self) -> usize {
        self.pitches.len()
    }

    /// Always false: construction rejects empty tables.
    pub fn is_empty(&self) -> bool {
        self.pitches.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TargetPitch> {
        self.pitches.iter()
    }

    /// Finds the target closest to `freq`.
    ///
    /// Equally close targets resolve to the one inserted first. Any input,
    /// including zero, negative or NaN, yields a target.
    pub fn nearest(&self, freq: f32) -> &TargetPitch {
        let mut best = &self.pitches[0];
        let mut best_diff = (best.frequency - freq).abs();
        for pitch in &self.pitches[1..] {
            let diff = (pitch.frequency - freq).abs();
            if diff < best_diff {
                best = pitch;
                best_diff = diff;
            }
        }
        best
    }
}

/// Maps a detected frequency to the label and frequency of the nearest target.
pub fn match_pitch(detected_hz: f32, table: &TargetPitchTable) -> (&str, f32) {
    let target = table.nearest(detected_hz);
    (&target.label, target.frequency)
}

/// Calculates the deviation from a target frequency in cents.
///
/// - 100 cents = 1 semitone
/// - Positive values are sharp, negative values are flat
pub fn calculate_cents_deviation(freq: f32, target_freq: f32) -> f32 {
    1200.0 * (freq / target_freq).log2()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_table_is_ordered_low_to_high() {
        let table = TargetPitchTable::standard_guitar();
        let entries: Vec<_> = table
            .iter()
            .map(|p| (p.label.as_str(), p.frequency))
            .collect();
        assert_eq!(
            entries,
            vec![
                ("E2", 82.0),
                ("A2", 110.0),
                ("D3", 147.0),
                ("G3", 196.0),
                ("B3", 247.0),
                ("E4", 330.0),
            ]
        );
    }

    #[test]
    fn matches_each_open_string() {
        let table = TargetPitchTable::standard_guitar();
        assert_eq!(match_pitch(110.0, table), ("A2", 110.0));
        assert_eq!(match_pitch(90.0, table), ("E2", 82.0));
        assert_eq!(match_pitch(150.0, table), ("D3", 147.0));
        assert_eq!(match_pitch(1_000.0, table), ("E4", 330.0));
    }

    #[test]
    fn never_fails_on_odd_input() {
        let table = TargetPitchTable::standard_guitar();
        assert_eq!(match_pitch(0.0, table), ("E2", 82.0));
        assert_eq!(match_pitch(-500.0, table), ("E2", 82.0));
        assert_eq!(match_pitch(f32::NAN, table), ("E2", 82.0));
        assert_eq!(match_pitch(f32::INFINITY, table).0, "E2");
    }

    #[test]
    fn matching_is_deterministic() {
        let table = TargetPitchTable::standard_guitar();
        for freq in [0.0, 82.0, 95.9, 96.0, 170.0, 288.5, 4_000.0] {
            assert_eq!(match_pitch(freq, table), match_pitch(freq, table));
        }
    }

    #[test]
    fn ties_go_to_first_inserted() {
        let low_first = TargetPitchTable::new([("low", 100.0), ("high", 200.0)]).unwrap();
        assert_eq!(match_pitch(150.0, &low_first), ("low", 100.0));

        let high_first = TargetPitchTable::new([("high", 200.0), ("low", 100.0)]).unwrap();
        assert_eq!(match_pitch(150.0, &high_first), ("high", 200.0));
    }

    #[test]
    fn rejects_bad_tables() {
        let empty: [(&str, f32); 0] = [];
        assert_eq!(
            TargetPitchTable::new(empty),
            Err(ConfigError::EmptyPitchTable)
        );
        assert_eq!(
            TargetPitchTable::new([("x", f32::NAN)]),
            Err(ConfigError::NonFiniteTarget {
                label: "x".to_string()
            })
        );
    }

    #[test]
    fn cents_deviation() {
        assert_eq!(calculate_cents_deviation(110.0, 110.0), 0.0);
        assert!((calculate_cents_deviation(220.0, 110.0) - 1200.0).abs() < 1e-3);
        assert!(calculate_cents_deviation(108.0, 110.0) < 0.0);
    }
}
