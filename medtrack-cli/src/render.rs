//! Plain-text rendering of task reports in the configured display timezone.

use anyhow::Result;
use chrono::{NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use medtrack_core::{Instant, TaskReport, TaskStatus};

/// Parse `--at`: RFC 3339, or a local "2026-02-20 23:59" in `tz`.
pub fn parse_at(s: &str, tz: Tz) -> Result<Instant> {
    if let Ok(at) = s.parse::<Instant>() {
        return Ok(at);
    }

    let ndt = NaiveDateTime::parse_from_str(s.trim(), "%Y-%m-%d %H:%M")
        .map_err(|e| anyhow::anyhow!("invalid time '{s}': {e}"))?;
    let local = tz
        .from_local_datetime(&ndt)
        .single()
        .ok_or_else(|| anyhow::anyhow!("ambiguous or invalid local time (DST?): {s} {tz}"))?;

    Ok(local.with_timezone(&Utc).into())
}

pub fn format_instant(at: Instant, tz: Tz) -> String {
    if at.is_never() {
        return "never".to_string();
    }
    at.to_datetime()
        .with_timezone(&tz)
        .format("%Y-%m-%d %H:%M %Z")
        .to_string()
}

/// One aligned line per report:
/// `NEEDED   Pill ABC   30 minutes ago   (2026-02-20 07:00 UTC)`
pub fn status_lines(reports: &[TaskReport], tz: Tz) -> String {
    if reports.is_empty() {
        return "No tasks loaded.\n".to_string();
    }

    let name_width = reports.iter().map(|r| r.name.chars().count()).max().unwrap_or(0);
    let due_width = reports.iter().map(|r| due_text(r).chars().count()).max().unwrap_or(0);

    let mut out = String::new();
    for r in reports {
        let when = match r.next_due {
            Some(at) => format!("({})", format_instant(at, tz)),
            None => String::new(),
        };
        let line = format!(
            "{:<8} {:<name_width$}  {:<due_width$}  {}",
            r.status.as_str(),
            r.name,
            due_text(r),
            when,
        );
        out.push_str(line.trim_end());
        out.push('\n');
    }
    out
}

fn due_text(r: &TaskReport) -> String {
    match r.status {
        TaskStatus::Done => "finished".to_string(),
        _ => r.due_in.clone(),
    }
}
