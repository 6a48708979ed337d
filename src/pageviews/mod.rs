//! Weekly pageview aggregation.
//!
//! Daily counts are bucketed into `"<year>-<week>"` identifiers, where weeks are 7-day
//! buckets anchored on the weekday of January 1st (Sunday-based), so week 1 of a year
//! may be shorter than seven days. The first bucket of a series is dropped because the
//! queried window usually starts mid-week.

use std::collections::HashMap;

use chrono::{Datelike, NaiveDate};
use serde_json::Value;

/// Summed views for one week identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeeklyViews {
    pub week: String,
    pub views: i64,
}

/// Week identifier of a calendar date.
pub fn week_id(date: NaiveDate) -> String {
    let jan1 = NaiveDate::from_ymd_opt(date.year(), 1, 1).unwrap_or(date);
    let offset = jan1.weekday().num_days_from_sunday();
    let week = (offset + date.ordinal0()) / 7 + 1;
    format!("{}-{}", date.year(), week)
}

/// Coerce a raw daily value to a non-negative count. Strings are read by their
/// leading digits; anything unreadable counts as zero.
pub fn coerce_views(value: &Value) -> i64 {
    match value {
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                i.max(0)
            } else if n.as_u64().is_some() {
                i64::MAX
            } else {
                n.as_f64()
                    .filter(|f| f.is_finite() && *f >= 0.0)
                    .map(|f| f.trunc() as i64)
                    .unwrap_or(0)
            }
        }
        Value::String(s) => leading_count(s),
        _ => 0,
    }
}

fn leading_count(s: &str) -> i64 {
    let s = s.trim_start();
    let (negative, digits) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };
    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    if negative || end == 0 {
        return 0;
    }
    digits[..end].parse().unwrap_or(i64::MAX)
}

/// Sum a daily series per week and drop the first week encountered.
///
/// Weeks are emitted in first-encounter order. A series covering fewer than two weeks
/// yields nothing.
pub fn aggregate_weekly(series: &[(String, Value)]) -> Vec<WeeklyViews> {
    let mut weeks: Vec<WeeklyViews> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for (date, value) in series {
        let Ok(day) = NaiveDate::parse_from_str(date, "%Y-%m-%d") else {
            tracing::warn!("Skipping pageviews for unparseable date {:?}", date);
            continue;
        };
        let week = week_id(day);
        let views = coerce_views(value);

        match index.get(&week) {
            Some(&i) => weeks[i].views = weeks[i].views.saturating_add(views),
            None => {
                index.insert(week.clone(), weeks.len());
                weeks.push(WeeklyViews { week, views });
            }
        }
    }

    weeks.into_iter().skip(1).collect()
}
