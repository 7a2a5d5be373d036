//! Outbound number generation: `{YYYYMMDD}{seq:03}`.

use chrono::NaiveDate;

use millerp_core::{DomainError, DomainResult};

const MAX_DAILY_SEQUENCE: u32 = 999;

/// Next free outbound number for `date`, one past the highest sequence
/// already used that day. Numbers that don't follow the pattern are ignored.
pub fn next_outbound_number<'a>(
    date: NaiveDate,
    existing: impl IntoIterator<Item = &'a str>,
) -> DomainResult<String> {
    let prefix = date.format("%Y%m%d").to_string();

    let max = existing
        .into_iter()
        .filter_map(|number| number.strip_prefix(prefix.as_str()))
        .filter(|seq| seq.len() == 3)
        .filter_map(|seq| seq.parse::<u32>().ok())
        .max()
        .unwrap_or(0);

    if max >= MAX_DAILY_SEQUENCE {
        return Err(DomainError::conflict(format!(
            "outbound numbers for {prefix} are exhausted"
        )));
    }
    Ok(format!("{prefix}{:03}", max + 1))
}
