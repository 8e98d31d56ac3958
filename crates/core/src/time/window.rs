use anyhow::Context;
use chrono::{DateTime, Months, NaiveDate, Utc};

pub fn capture_time() -> DateTime<Utc> {
    Utc::now()
}

/// Inclusive `(start, end)` dates of the year ending on `now`'s UTC date.
///
/// Start is the same calendar day one year earlier; Feb 29 maps to Feb 28.
pub fn trailing_year(now: DateTime<Utc>) -> anyhow::Result<(NaiveDate, NaiveDate)> {
    let end = now.date_naive();
    let start = end
        .checked_sub_months(Months::new(12))
        .with_context(|| format!("no date one year before {end}"))?;
    Ok((start, end))
}
