use chrono::{Days, Months, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How often a recurring bill repeats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "varchar", rename_all = "snake_case")]
pub enum Frequency {
    Weekly,
    /// A fixed 15-day step, not a calendar fortnight.
    Biweekly,
    Monthly,
    Bimonthly,
    Quarterly,
    Semiannual,
    Annual,
}

/// Unit of a single frequency step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    Days(u64),
    Months(u32),
}

impl Frequency {
    pub const ALL: [Frequency; 7] = [
        Frequency::Weekly,
        Frequency::Biweekly,
        Frequency::Monthly,
        Frequency::Bimonthly,
        Frequency::Quarterly,
        Frequency::Semiannual,
        Frequency::Annual,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Frequency::Weekly => "weekly",
            Frequency::Biweekly => "biweekly",
            Frequency::Monthly => "monthly",
            Frequency::Bimonthly => "bimonthly",
            Frequency::Quarterly => "quarterly",
            Frequency::Semiannual => "semiannual",
            Frequency::Annual => "annual",
        }
    }

    fn step(&self) -> Step {
        match self {
            Frequency::Weekly => Step::Days(7),
            Frequency::Biweekly => Step::Days(15),
            Frequency::Monthly => Step::Months(1),
            Frequency::Bimonthly => Step::Months(2),
            Frequency::Quarterly => Step::Months(3),
            Frequency::Semiannual => Step::Months(6),
            Frequency::Annual => Step::Months(12),
        }
    }

    /// Lenient parse used for caller input: unknown names yield `None`.
    pub fn parse(raw: &str) -> Option<Frequency> {
        raw.trim().parse().ok()
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown frequency `{0}`")]
pub struct UnknownFrequency(pub String);

impl FromStr for Frequency {
    type Err = UnknownFrequency;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.to_ascii_lowercase();
        Frequency::ALL
            .iter()
            .copied()
            .find(|f| f.as_str() == lowered)
            .ok_or_else(|| UnknownFrequency(s.to_string()))
    }
}

/// Advances `date` by `n` steps of `frequency`.
///
/// `n == 0` and a missing frequency both return the date unchanged. Month
/// based steps clamp to the last day of the target month (Jan 31 + 1 month is
/// Feb 28 or 29) and are always computed from the original date, so a clamp
/// in one period does not leak into the next. Returns `None` only when the
/// result falls outside the representable calendar.
pub fn advance(date: NaiveDate, frequency: Option<Frequency>, n: u32) -> Option<NaiveDate> {
    let Some(frequency) = frequency else {
        return Some(date);
    };
    if n == 0 {
        return Some(date);
    }

    match frequency.step() {
        Step::Days(days) => date.checked_add_days(Days::new(days.checked_mul(u64::from(n))?)),
        Step::Months(months) => date.checked_add_months(Months::new(months.checked_mul(n)?)),
    }
}
