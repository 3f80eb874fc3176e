use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeZone};
use regex::Regex;
use std::sync::LazyLock;

// Trailing UTC offset as the gateway renders it: `+0200`, `+02:00`, `+02:00:00`, `+020000`.
static OFFSET_SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([+-])(\d{2}):?(\d{2})(?::?(\d{2}))?$").expect("static regex"));

const LOCAL_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M"];

/// Parse a rule `modified_date`.
///
/// The offset may be written with or without a colon and with or without
/// seconds; `Z` means UTC. Returns `None` for anything else.
pub fn parse_modified_date(raw: &str) -> Option<DateTime<FixedOffset>> {
    let raw = raw.trim();
    let (local, offset_secs) = if let Some(stripped) = raw.strip_suffix('Z') {
        (stripped, 0)
    } else {
        let caps = OFFSET_SUFFIX.captures(raw)?;
        let whole = caps.get(0)?;
        let hours: i32 = caps[2].parse().ok()?;
        let minutes: i32 = caps[3].parse().ok()?;
        let seconds: i32 = caps.get(4).map_or(Ok(0), |m| m.as_str().parse()).ok()?;
        let sign = if &caps[1] == "-" { -1 } else { 1 };
        (&raw[..whole.start()], sign * (hours * 3600 + minutes * 60 + seconds))
    };

    let offset = FixedOffset::east_opt(offset_secs)?;
    let naive = LOCAL_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(local, fmt).ok())?;
    offset.from_local_datetime(&naive).single()
}

/// Round to one decimal place, half to even on the exact binary value
/// (`10.25` gives `10.2`, `0.15` gives `0.1` because it is stored just below).
pub fn round_one_decimal(value: f64) -> f64 {
    format!("{:.1}", value).parse().unwrap_or(value)
}
