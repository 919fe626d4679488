//! Time-series reshaping of reduction results.
//!
//! Reductions come back as dictionaries keyed by band name. These functions parse the band names,
//! order the values and cut them into productive-year windows running from July to June.

use serde_json::{Map, Value};
use time::{Date, Month};

/// One reduced band: its period or year and value
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Band<K> {
    pub key: K,
    pub value: Option<f64>,
}

fn number(value: &Value) -> Option<f64> {
    value.as_f64().filter(|v| v.is_finite())
}

/// Parse `b{year}-{period}` bands, sorted by period.
///
/// Bands without a numeric period suffix are skipped. Null values are kept as `None`.
pub fn band_series(values: &Map<String, Value>) -> Vec<Band<u32>> {
    let mut bands: Vec<Band<u32>> = values
        .iter()
        .filter_map(|(name, value)| {
            let (_, period) = name.rsplit_once('-')?;
            Some(Band {
                key: period.parse().ok()?,
                value: number(value),
            })
        })
        .collect();
    bands.sort_by_key(|band| band.key);
    bands
}

/// Parse `b{n}` bands of historical means, sorted by n.
pub fn numbered_series(values: &Map<String, Value>) -> Vec<Band<u32>> {
    let mut bands: Vec<Band<u32>> = values
        .iter()
        .filter_map(|(name, value)| {
            Some(Band {
                key: name.strip_prefix('b')?.parse().ok()?,
                value: number(value),
            })
        })
        .collect();
    bands.sort_by_key(|band| band.key);
    bands
}

/// Parse `b{year}` bands, sorted by year.
///
/// A reducer suffix such as `_p25` after the year is ignored.
pub fn yearly_series(values: &Map<String, Value>) -> Vec<Band<i32>> {
    let mut bands: Vec<Band<i32>> = values
        .iter()
        .filter_map(|(name, value)| {
            let year = name.strip_prefix('b')?.split('_').next()?;
            Some(Band {
                key: year.parse().ok()?,
                value: number(value),
            })
        })
        .collect();
    bands.sort_by_key(|band| band.key);
    bands
}

/// Index of the first composite of the productive year.
///
/// This is the first composite starting on or after the 1st of July for composites of
/// `period_days` days; monthly composites (28 days or more) start at index 6.
pub fn productive_offset(period_days: u32) -> usize {
    if period_days >= 28 {
        6
    } else {
        181_usize.div_ceil(period_days.max(1) as usize)
    }
}

/// Join the second half of one year with the first half of the next.
pub fn productive_year<T: Clone>(current: &[T], next: &[T], offset: usize) -> Vec<T> {
    let start = offset.min(current.len());
    let end = offset.min(next.len());
    current[start..]
        .iter()
        .chain(next[..end].iter())
        .cloned()
        .collect()
}

/// Rotate a calendar-year series so that it starts at the productive year.
pub fn productive_rotation<T: Clone>(values: &[T], offset: usize) -> Vec<T> {
    productive_year(values, values, offset)
}

/// Which years of data make up an annual series
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AnnualPlan {
    /// Fetch the requested year
    pub year: bool,
    /// Fetch the year after
    pub next_year: bool,
}

impl AnnualPlan {
    const EMPTY: AnnualPlan = AnnualPlan {
        year: false,
        next_year: false,
    };
}

/// Decide which years to fetch for an annual series.
///
/// Data for a year becomes available after the 20th of January of that year. Years up to 2000
/// and future years have no data.
///
/// # Arguments
///
/// * `year`: Requested year
/// * `today`: Current date
pub fn annual_plan(year: i32, today: Date) -> AnnualPlan {
    let current = today.year();
    let published = today.month() != Month::January || today.day() > 20;
    if year <= 2000 || year > current {
        AnnualPlan::EMPTY
    } else if year == current {
        AnnualPlan {
            year: published,
            next_year: false,
        }
    } else {
        AnnualPlan {
            year: true,
            next_year: year != current - 1 || published,
        }
    }
}
