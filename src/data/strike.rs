use std::collections::BTreeMap;

use chrono::NaiveDateTime;

use super::{LoadError, RawRow};
use crate::model::{RawField, Side, StrikeMode};

/// Apply the strike policy to raw rows. Returns the kept rows and the strike
/// the resulting table represents (`None` when aggregated or unknown).
pub fn apply(
    rows: Vec<RawRow>,
    mode: StrikeMode,
    source_id: &str,
) -> Result<(Vec<RawRow>, Option<f64>), LoadError> {
    match mode {
        StrikeMode::Single => {
            let strikes = distinct_strikes(&rows);
            if strikes.len() > 1 {
                return Err(LoadError::MixedStrikes {
                    source_id: source_id.to_string(),
                    strikes: strikes.iter().map(|s| *s as i64).collect(),
                });
            }
            let strike = strikes.first().copied();
            Ok((rows, strike))
        }
        StrikeMode::Select(wanted) => {
            let wanted = wanted.round();
            let kept: Vec<RawRow> = rows
                .into_iter()
                .filter(|r| r.strike() == Some(wanted))
                .collect();
            if kept.is_empty() {
                return Err(LoadError::StrikeNotFound {
                    source_id: source_id.to_string(),
                    strike: wanted as i64,
                });
            }
            Ok((kept, Some(wanted)))
        }
        StrikeMode::Aggregate => Ok((aggregate(rows), None)),
    }
}

fn distinct_strikes(rows: &[RawRow]) -> Vec<f64> {
    let mut strikes: Vec<f64> = rows.iter().filter_map(RawRow::strike).collect();
    strikes.sort_by(f64::total_cmp);
    strikes.dedup();
    strikes
}

/// Collapse rows sharing a timestamp: open interest and volume are summed,
/// price and implied volatility averaged over the rows that carry them.
fn aggregate(rows: Vec<RawRow>) -> Vec<RawRow> {
    let mut groups: BTreeMap<NaiveDateTime, Vec<RawRow>> = BTreeMap::new();
    for row in rows {
        groups.entry(row.timestamp).or_default().push(row);
    }

    groups
        .into_iter()
        .map(|(timestamp, group)| {
            let mut out = RawRow::new(timestamp);
            for side in Side::ALL {
                for field in RawField::ALL {
                    let present: Vec<f64> =
                        group.iter().filter_map(|r| r.get(side, field)).collect();
                    let value = match field {
                        RawField::OpenInterest | RawField::TotalTradedVolume => {
                            (!present.is_empty()).then(|| present.iter().sum::<f64>())
                        }
                        RawField::LastPrice | RawField::ImpliedVolatility => {
                            (!present.is_empty())
                                .then(|| present.iter().sum::<f64>() / present.len() as f64)
                        }
                        RawField::StrikePrice => None,
                    };
                    out.set(side, field, value);
                }
            }
            out
        })
        .collect()
}
