use crate::day_record::{DayRecord, FIXED_SLOTS};

const MIN_LIGHTNESS: f64 = 10.0;
const MAX_LIGHTNESS: f64 = 55.0;
const SHADE_HUE: u16 = 142;
const SHADE_SATURATION: u8 = 70;

/// Derived scoring for one day. Recomputed on read, never persisted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DayState {
    pub fraction: f64,
    pub is_golden: bool,
    pub optional_substituted: bool,
}

impl DayState {
    /// Score a record against three slots.
    ///
    /// Each done fixed task fills one slot. The optional task backfills at
    /// most one missing slot; once all fixed tasks are done it no longer
    /// fills anything and instead makes the day golden.
    pub fn compute(record: &DayRecord) -> Self {
        let done = record.done_count();
        let substituted = record.optional && done < FIXED_SLOTS;
        let filled = (done + usize::from(substituted)).min(FIXED_SLOTS);
        Self {
            fraction: filled as f64 / FIXED_SLOTS as f64,
            is_golden: done == FIXED_SLOTS && record.optional,
            optional_substituted: substituted,
        }
    }

    pub fn percent(&self) -> u8 {
        (self.fraction * 100.0).round() as u8
    }

    /// Badge text for a day: `Golden Day` or the filled percentage.
    pub fn badge(&self) -> String {
        if self.is_golden {
            "Golden Day".to_string()
        } else {
            format!("{}%", self.percent())
        }
    }
}

/// Linear lightness for a fill fraction, clamped to `[0, 1]` first.
pub fn shade_lightness(fraction: f64) -> u8 {
    let f = if fraction.is_nan() { 0.0 } else { fraction.clamp(0.0, 1.0) };
    (MIN_LIGHTNESS + f * (MAX_LIGHTNESS - MIN_LIGHTNESS)).round() as u8
}

/// Visual treatment of a grid cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellShade {
    Empty,
    Golden,
    Partial { lightness: u8 },
}

impl CellShade {
    pub fn for_record(record: &DayRecord) -> Self {
        let state = DayState::compute(record);
        if state.is_golden {
            Self::Golden
        } else if record.is_empty() {
            Self::Empty
        } else {
            Self::Partial {
                lightness: shade_lightness(state.fraction),
            }
        }
    }

    pub fn css(&self) -> String {
        match self {
            Self::Empty => "rgb(64 64 64)".to_string(),
            Self::Golden => "rgb(250 204 21)".to_string(),
            Self::Partial { lightness } => {
                format!("hsl({SHADE_HUE} {SHADE_SATURATION}% {lightness}%)")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn record(fixed: [bool; 3], optional: bool) -> DayRecord {
        DayRecord {
            fixed,
            optional,
            optional_text: String::new(),
        }
    }

    #[test]
    fn optional_backfills_one_gap() {
        let state = DayState::compute(&record([true, true, false], true));
        assert_eq!(state.fraction, 1.0);
        assert!(!state.is_golden);
        assert!(state.optional_substituted);
    }

    #[test]
    fn all_done_plus_optional_is_golden() {
        let state = DayState::compute(&record([true, true, true], true));
        assert_eq!(state.fraction, 1.0);
        assert!(state.is_golden);
        assert!(!state.optional_substituted);
    }

    #[test]
    fn nothing_done_is_zero() {
        let state = DayState::compute(&record([false, false, false], false));
        assert_eq!(state.fraction, 0.0);
        assert!(!state.is_golden);
        assert_eq!(state.badge(), "0%");
    }

    #[test]
    fn optional_never_fills_more_than_one_slot() {
        let state = DayState::compute(&record([false, false, false], true));
        assert!((state.fraction - 1.0 / 3.0).abs() < f64::EPSILON);
        assert_eq!(state.badge(), "33%");
    }

    #[test]
    fn shade_is_monotonic_within_bounds() {
        assert_eq!(shade_lightness(0.0), 10);
        assert_eq!(shade_lightness(1.0), 55);
        assert_eq!(shade_lightness(2.0), 55);
        assert!(shade_lightness(1.0 / 3.0) < shade_lightness(2.0 / 3.0));
    }

    #[test]
    fn cell_shades() {
        assert_eq!(CellShade::for_record(&record([false; 3], false)), CellShade::Empty);
        assert_eq!(CellShade::for_record(&record([true; 3], true)), CellShade::Golden);
        let partial = CellShade::for_record(&record([true, false, false], false));
        assert_eq!(partial, CellShade::Partial { lightness: 25 });
        assert_eq!(partial.css(), "hsl(142 70% 25%)");
    }

    proptest! {
        #[test]
        fn scoring_rule_holds(fixed in any::<[bool; 3]>(), optional in any::<bool>()) {
            let rec = record(fixed, optional);
            let state = DayState::compute(&rec);
            let done = fixed.iter().filter(|&&b| b).count();
            let extra = usize::from(optional && done < 3);
            prop_assert_eq!(state.is_golden, done == 3 && optional);
            prop_assert_eq!(state.fraction, (done + extra).min(3) as f64 / 3.0);
            prop_assert!((0.0..=1.0).contains(&state.fraction));
            prop_assert_eq!(DayState::compute(&rec), state);
        }
    }
}
