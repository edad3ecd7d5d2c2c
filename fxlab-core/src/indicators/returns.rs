//! Log returns: `ln(p[t] / p[t-1])`. Lookback: 1.

use super::Indicator;

#[derive(Debug, Clone, Copy, Default)]
pub struct LogReturns;

impl Indicator for LogReturns {
    fn name(&self) -> &str {
        "log_returns"
    }

    fn lookback(&self) -> usize {
        1
    }

    fn compute(&self, series: &[f64]) -> Vec<f64> {
        let mut result = vec![f64::NAN; series.len()];
        for i in 1..series.len() {
            result[i] = (series[i] / series[i - 1]).ln();
        }
        result
    }
}
