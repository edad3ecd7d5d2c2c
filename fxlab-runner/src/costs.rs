//! Trading-cost coverage by hour of day.
//!
//! A bar "covers its costs" when the absolute change of the mid price since
//! the previous bar exceeds the bar's spread. Hours where that happens often
//! are the cheapest to trade in.

use std::collections::BTreeMap;

use chrono::Timelike;
use serde::{Deserialize, Serialize};

use fxlab_core::domain::Bar;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct HourCoverage {
    pub bars: usize,
    pub covered: usize,
}

impl HourCoverage {
    /// Share of bars in this hour that covered their spread.
    pub fn share(&self) -> f64 {
        if self.bars == 0 {
            0.0
        } else {
            self.covered as f64 / self.bars as f64
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CostCoverage {
    /// Keyed by UTC hour (0..24); hours without bars are absent.
    pub hours: BTreeMap<u32, HourCoverage>,
}

impl CostCoverage {
    /// Hour with the highest share; the earliest hour wins ties.
    pub fn best_hour(&self) -> Option<(u32, f64)> {
        self.hours
            .iter()
            .map(|(h, c)| (*h, c.share()))
            .fold(None, |best, (h, share)| match best {
                Some((_, s)) if s >= share => best,
                _ => Some((h, share)),
            })
    }
}

/// Count covering bars per UTC hour.
///
/// The first bar has no previous mid price and counts as not covered.
pub fn cost_coverage(bars: &[Bar]) -> CostCoverage {
    let mut coverage = CostCoverage::default();
    let mut prev_mid: Option<f64> = None;
    for bar in bars {
        let entry = coverage.hours.entry(bar.timestamp.hour()).or_default();
        entry.bars += 1;
        if prev_mid.is_some_and(|prev| (bar.mid_price - prev).abs() > bar.spread) {
            entry.covered += 1;
        }
        prev_mid = Some(bar.mid_price);
    }
    coverage
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn bar(minutes: i64, mid: f64, spread: f64) -> Bar {
        let ts = Utc.with_ymd_and_hms(2024, 1, 2, 8, 0, 0).unwrap() + Duration::minutes(minutes);
        Bar::from_quote(ts, mid - spread / 2.0, mid + spread / 2.0).unwrap()
    }

    #[test]
    fn counts_moves_larger_than_spread() {
        let bars = vec![
            bar(0, 1.1000, 0.0002),
            bar(30, 1.1005, 0.0002), // covered
            bar(60, 1.1006, 0.0002), // 09:00, not covered
            bar(90, 1.1016, 0.0002), // 09:30, covered
        ];
        let coverage = cost_coverage(&bars);

        assert_eq!(coverage.hours[&8], HourCoverage { bars: 2, covered: 1 });
        assert_eq!(coverage.hours[&9], HourCoverage { bars: 2, covered: 1 });
        assert_eq!(coverage.hours[&8].share(), 0.5);
    }

    #[test]
    fn best_hour_prefers_higher_share() {
        let bars = vec![
            bar(0, 1.1000, 0.0002),
            bar(30, 1.1000, 0.0002),
            bar(60, 1.1010, 0.0002),
            bar(90, 1.1020, 0.0002),
        ];
        let coverage = cost_coverage(&bars);
        assert_eq!(coverage.best_hour(), Some((9, 1.0)));
    }

    #[test]
    fn empty_input_has_no_hours() {
        let coverage = cost_coverage(&[]);
        assert!(coverage.hours.is_empty());
        assert_eq!(coverage.best_hour(), None);
    }
}
