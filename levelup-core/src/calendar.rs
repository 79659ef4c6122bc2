//! Calendar days in the user's time zone, and local deadline parsing.
//!
//! "Today" drives three rules: the daily quest reset, the one-deletion-per-day
//! limit, and the Reaper check. All of them use the same zone.

use anyhow::Result;
use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;

/// Calendar date of `now` as seen in `tz`.
pub fn calendar_day(now: DateTime<Utc>, tz: Tz) -> NaiveDate {
    now.with_timezone(&tz).date_naive()
}

/// The day immediately before `day`.
pub fn previous_day(day: NaiveDate) -> NaiveDate {
    day.pred_opt().unwrap_or(day)
}

/// Parse a deadline like "2026-02-20 23:59" (or a bare "2026-02-20", meaning
/// end of that day) in an IANA tz like "America/Chicago", returning UTC.
pub fn parse_local_deadline_to_utc(local: &str, tz: &str) -> Result<DateTime<Utc>> {
    let tz: Tz = tz
        .parse()
        .map_err(|_| anyhow::anyhow!("invalid timezone: {tz}"))?;

    let local = local.trim();
    let ndt = match NaiveDateTime::parse_from_str(local, "%Y-%m-%d %H:%M") {
        Ok(ndt) => ndt,
        Err(e) => NaiveDate::parse_from_str(local, "%Y-%m-%d")
            .ok()
            .and_then(|d| d.and_hms_opt(23, 59, 59))
            .ok_or_else(|| anyhow::anyhow!("invalid local datetime '{local}': {e}"))?,
    };

    let local_dt = tz
        .from_local_datetime(&ndt)
        .single()
        .ok_or_else(|| anyhow::anyhow!("ambiguous or invalid local time (DST?): {local} {tz}"))?;

    Ok(local_dt.with_timezone(&Utc))
}
