//! Batch right-labeled resampling.

use chrono::{DateTime, Duration, Utc};

use crate::domain::{Bar, BarError, Tick};

/// Start of the bar-length bin containing `ts`, aligned to the Unix epoch.
pub fn floor_to_boundary(ts: DateTime<Utc>, bar_length: Duration) -> DateTime<Utc> {
    let len_ms = bar_length.num_milliseconds().max(1);
    let rem_ms = ts.timestamp_millis().rem_euclid(len_ms);
    let sub_ms_nanos = i64::from(ts.timestamp_subsec_nanos() % 1_000_000);
    ts - Duration::milliseconds(rem_ms) - Duration::nanoseconds(sub_ms_nanos)
}

/// Resample ordered ticks into right-labeled bars.
///
/// A bar labeled `T` takes the last tick in `[T - bar_length, T)`. Empty
/// bins produce no bar. Both ends are dropped when incomplete: the first bin
/// unless the input starts exactly on a boundary (the stream never emits it
/// either), and always the most recent bin, which the clock is still inside
/// and must be re-derived from the stream.
pub fn resample_ticks(ticks: &[Tick], bar_length: Duration) -> Result<Vec<Bar>, BarError> {
    let mut bars: Vec<Bar> = Vec::new();
    let mut current: Option<(DateTime<Utc>, Tick)> = None;
    let mut leading_partial = ticks
        .first()
        .is_some_and(|t| floor_to_boundary(t.timestamp, bar_length) != t.timestamp);

    for tick in ticks {
        let label = floor_to_boundary(tick.timestamp, bar_length) + bar_length;
        match current {
            Some((open_label, _)) if open_label == label => {
                current = Some((label, *tick));
            }
            Some((open_label, last)) => {
                if leading_partial {
                    leading_partial = false;
                } else {
                    bars.push(last.to_bar(open_label)?);
                }
                current = Some((label, *tick));
            }
            None => current = Some((label, *tick)),
        }
    }
    // The bin still open at the end of the input is the incomplete one; it is
    // never pushed.
    Ok(bars)
}
