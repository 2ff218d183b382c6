use chrono::{DateTime, Utc};

const SECS_PER_DAY: u64 = 86_400;
const SECS_PER_HOUR: u64 = 3_600;
const SECS_PER_MIN: u64 = 60;

/// Time remaining until a target, floor-divided into calendar-free units.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Countdown {
    pub days: u64,
    pub hours: u8,
    pub mins: u8,
    pub secs: u8,
}

impl Countdown {
    pub const ZERO: Countdown = Countdown {
        days: 0,
        hours: 0,
        mins: 0,
        secs: 0,
    };

    /// Breakdown of `max(0, target - now)`.
    pub fn between(target: DateTime<Utc>, now: DateTime<Utc>) -> Self {
        Self::from_millis((target - now).num_milliseconds())
    }

    pub fn from_millis(remaining_ms: i64) -> Self {
        let total = u64::try_from(remaining_ms.max(0)).unwrap_or(0) / 1000;
        Self {
            days: total / SECS_PER_DAY,
            hours: ((total % SECS_PER_DAY) / SECS_PER_HOUR) as u8,
            mins: ((total % SECS_PER_HOUR) / SECS_PER_MIN) as u8,
            secs: (total % SECS_PER_MIN) as u8,
        }
    }

    pub fn is_zero(&self) -> bool {
        *self == Self::ZERO
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn breakdown_floors_each_unit() {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let target = Utc.with_ymd_and_hms(2024, 1, 3, 5, 6, 7).unwrap();
        let c = Countdown::between(target, now + chrono::Duration::milliseconds(400));
        assert_eq!(
            c,
            Countdown {
                days: 2,
                hours: 5,
                mins: 6,
                secs: 6
            }
        );
    }

    #[test]
    fn past_target_clamps_to_zero() {
        let now = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
        let target = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        assert!(Countdown::between(target, now).is_zero());
    }

    #[test]
    fn sub_second_remainder_is_zero() {
        assert!(Countdown::from_millis(999).is_zero());
        assert_eq!(Countdown::from_millis(1000).secs, 1);
    }
}
