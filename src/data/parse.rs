use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};

const DATETIME_FORMATS: [&str; 6] = [
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
    "%d-%m-%Y %H:%M:%S",
    "%d-%b-%Y %H:%M:%S",
];

/// Parse a numeric cell. Empty cells and the usual placeholders are missing
/// values; anything else that is not a finite number is an error.
pub(crate) fn parse_number(cell: &str) -> Result<Option<f64>, ()> {
    let s = cell.trim();
    if s.is_empty() || s == "-" || s.eq_ignore_ascii_case("nan") || s.eq_ignore_ascii_case("null") {
        return Ok(None);
    }
    let cleaned = s.replace(',', "");
    match cleaned.parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(Some(v)),
        _ => Err(()),
    }
}

/// Parse a `timestamp` cell: RFC 3339, common date-time layouts, or unix seconds.
pub fn parse_timestamp(cell: &str) -> Option<NaiveDateTime> {
    let s = cell.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_utc());
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt);
        }
    }
    if s.bytes().all(|b| b.is_ascii_digit()) {
        let secs: i64 = s.parse().ok()?;
        // Millisecond epochs are 13 digits
        let secs = if s.len() >= 13 { secs / 1000 } else { secs };
        return DateTime::from_timestamp(secs, 0).map(|dt| dt.naive_utc());
    }
    None
}

/// Extract a timestamp embedded in a file name, e.g. `chain_20240115_091500.csv`,
/// `NIFTY_2024-01-15_09-15.csv` or `oc-20240115T0915.csv`.
///
/// The stem is split into digit runs. The first run (or `YYYY-MM-DD` group of
/// runs) forming a valid date wins; the run right after it, if it reads as
/// `HHMM[SS]` or `HH-MM[-SS]`, is the time of day, otherwise midnight. Other
/// digits in the name (`NIFTY50`, `v2`) are ignored.
pub fn timestamp_from_file_name(stem: &str) -> Option<NaiveDateTime> {
    let runs = digit_runs(stem);
    (0..runs.len()).find_map(|i| timestamp_at(stem, &runs, i))
}

const DATE_SEPARATORS: &[&str] = &["-", "_"];
const TIME_SEPARATORS: &[&str] = &["-", "_", "."];
const DATE_TIME_SEPARATORS: &[&str] = &["-", "_", "T", " "];

#[derive(Debug, Clone, Copy)]
struct DigitRun<'a> {
    start: usize,
    end: usize,
    text: &'a str,
}

fn digit_runs(s: &str) -> Vec<DigitRun<'_>> {
    let mut runs = Vec::new();
    let mut start = None;
    for (i, c) in s.char_indices() {
        match (c.is_ascii_digit(), start) {
            (true, None) => start = Some(i),
            (false, Some(st)) => {
                runs.push(DigitRun {
                    start: st,
                    end: i,
                    text: &s[st..i],
                });
                start = None;
            }
            _ => {}
        }
    }
    if let Some(st) = start {
        runs.push(DigitRun {
            start: st,
            end: s.len(),
            text: &s[st..],
        });
    }
    runs
}

/// Whether `b` follows `a` across exactly one of `separators`.
fn adjacent(stem: &str, a: &DigitRun, b: &DigitRun, separators: &[&str]) -> bool {
    let between = &stem[a.end..b.start];
    separators.iter().any(|s| *s == between)
}

fn timestamp_at(stem: &str, runs: &[DigitRun], i: usize) -> Option<NaiveDateTime> {
    let run = runs[i];
    let (date, next) = match run.text.len() {
        8 => (NaiveDate::parse_from_str(run.text, "%Y%m%d").ok()?, i + 1),
        12 | 14 => {
            let date = NaiveDate::parse_from_str(&run.text[..8], "%Y%m%d").ok()?;
            return Some(date.and_time(compact_time(&run.text[8..])?));
        }
        4 => {
            let (month, day) = (runs.get(i + 1)?, runs.get(i + 2)?);
            if month.text.len() != 2
                || day.text.len() != 2
                || !adjacent(stem, &run, month, DATE_SEPARATORS)
                || !adjacent(stem, month, day, DATE_SEPARATORS)
            {
                return None;
            }
            let date = NaiveDate::from_ymd_opt(
                run.text.parse().ok()?,
                num(month.text)?,
                num(day.text)?,
            )?;
            (date, i + 3)
        }
        _ => return None,
    };

    let time = runs
        .get(next)
        .filter(|r| adjacent(stem, &runs[next - 1], r, DATE_TIME_SEPARATORS))
        .and_then(|_| time_at(stem, runs, next))
        .unwrap_or(NaiveTime::MIN);
    Some(date.and_time(time))
}

fn time_at(stem: &str, runs: &[DigitRun], i: usize) -> Option<NaiveTime> {
    let run = &runs[i];
    match run.text.len() {
        4 | 6 => compact_time(run.text),
        2 => {
            let minute = runs
                .get(i + 1)
                .filter(|r| r.text.len() == 2 && adjacent(stem, run, r, TIME_SEPARATORS))?;
            let second = runs
                .get(i + 2)
                .filter(|r| r.text.len() == 2 && adjacent(stem, minute, r, TIME_SEPARATORS))
                .and_then(|r| num(r.text))
                .unwrap_or(0);
            NaiveTime::from_hms_opt(num(run.text)?, num(minute.text)?, second)
        }
        _ => None,
    }
}

/// `HHMM` or `HHMMSS`.
fn compact_time(digits: &str) -> Option<NaiveTime> {
    let second = match digits.len() {
        4 => 0,
        6 => num(&digits[4..6])?,
        _ => return None,
    };
    NaiveTime::from_hms_opt(num(&digits[0..2])?, num(&digits[2..4])?, second)
}

fn num(s: &str) -> Option<u32> {
    s.parse().ok()
}
