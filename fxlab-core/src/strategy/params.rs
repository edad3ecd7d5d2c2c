//! Strategy parameter sets, selected by configuration.

use serde::{Deserialize, Serialize};

use crate::domain::PriceField;

use super::{
    BollingerBands, Contrarian, MlClassification, MlRegression, Momentum, SmaCross,
    StrategyError, StrategySignalSource,
};

fn default_learning_rate() -> f64 {
    0.1
}

fn default_iterations() -> usize {
    1000
}

/// Closed set of strategy families with their parameters.
///
/// Immutable once built: a different parameter set means a new source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StrategyParams {
    SmaCross {
        short: usize,
        long: usize,
    },
    BollingerBands {
        window: usize,
        deviation: f64,
    },
    Contrarian {
        window: usize,
    },
    Momentum {
        window: usize,
    },
    MlClassification {
        lags: usize,
        training_bars: usize,
        #[serde(default = "default_learning_rate")]
        learning_rate: f64,
        #[serde(default = "default_iterations")]
        iterations: usize,
    },
    MlRegression {
        lags: usize,
        training_bars: usize,
    },
}

impl StrategyParams {
    pub fn family(&self) -> &'static str {
        match self {
            StrategyParams::SmaCross { .. } => "sma_cross",
            StrategyParams::BollingerBands { .. } => "bollinger_bands",
            StrategyParams::Contrarian { .. } => "contrarian",
            StrategyParams::Momentum { .. } => "momentum",
            StrategyParams::MlClassification { .. } => "ml_classification",
            StrategyParams::MlRegression { .. } => "ml_regression",
        }
    }

    pub fn validate(&self) -> Result<(), StrategyError> {
        let strategy = self.family();
        let invalid = |reason: String| Err(StrategyError::InvalidParameterRange { strategy, reason });
        match *self {
            StrategyParams::SmaCross { short, long } => {
                if short == 0 {
                    return invalid("short window must be >= 1".into());
                }
                if long <= short {
                    return invalid(format!("long window {long} must exceed short window {short}"));
                }
            }
            StrategyParams::BollingerBands { window, deviation } => {
                if window < 2 {
                    return invalid(format!("window must be >= 2, got {window}"));
                }
                if !deviation.is_finite() || deviation <= 0.0 {
                    return invalid(format!("deviation must be positive, got {deviation}"));
                }
            }
            StrategyParams::Contrarian { window } | StrategyParams::Momentum { window } => {
                if window == 0 {
                    return invalid("window must be >= 1".into());
                }
            }
            StrategyParams::MlClassification {
                lags,
                training_bars,
                learning_rate,
                iterations,
            } => {
                if lags == 0 {
                    return invalid("lags must be >= 1".into());
                }
                if training_bars < lags + 2 {
                    return invalid(format!(
                        "training_bars must be >= lags + 2 ({}), got {training_bars}",
                        lags + 2
                    ));
                }
                if !learning_rate.is_finite() || learning_rate <= 0.0 {
                    return invalid(format!("learning_rate must be positive, got {learning_rate}"));
                }
                if iterations == 0 {
                    return invalid("iterations must be >= 1".into());
                }
            }
            StrategyParams::MlRegression {
                lags,
                training_bars,
            } => {
                if lags == 0 {
                    return invalid("lags must be >= 1".into());
                }
                // more samples than coefficients
                if training_bars < 2 * lags + 2 {
                    return invalid(format!(
                        "training_bars must be >= 2 * lags + 2 ({}), got {training_bars}",
                        2 * lags + 2
                    ));
                }
            }
        }
        Ok(())
    }

    /// Validate and build the signal source.
    pub fn build(
        &self,
        price_field: PriceField,
    ) -> Result<Box<dyn StrategySignalSource>, StrategyError> {
        self.validate()?;
        let source: Box<dyn StrategySignalSource> = match *self {
            StrategyParams::SmaCross { short, long } => {
                Box::new(SmaCross::new(short, long, price_field))
            }
            StrategyParams::BollingerBands { window, deviation } => {
                Box::new(BollingerBands::new(window, deviation, price_field))
            }
            StrategyParams::Contrarian { window } => Box::new(Contrarian::new(window, price_field)),
            StrategyParams::Momentum { window } => Box::new(Momentum::new(window, price_field)),
            StrategyParams::MlClassification {
                lags,
                training_bars,
                learning_rate,
                iterations,
            } => Box::new(MlClassification::new(
                lags,
                training_bars,
                learning_rate,
                iterations,
                price_field,
            )),
            StrategyParams::MlRegression {
                lags,
                training_bars,
            } => Box::new(MlRegression::new(lags, training_bars, price_field)),
        };
        Ok(source)
    }
}
