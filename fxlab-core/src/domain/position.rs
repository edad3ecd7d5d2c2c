use serde::{Deserialize, Serialize};

/// Market exposure of a strategy or ledger: `{+1, -1, 0}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Position {
    Long,
    Short,
    #[default]
    Neutral,
}

impl Position {
    pub fn signum(self) -> i64 {
        match self {
            Position::Long => 1,
            Position::Short => -1,
            Position::Neutral => 0,
        }
    }

    /// Position matching the sign of `value`; zero and NaN map to Neutral.
    pub fn from_sign(value: f64) -> Self {
        if value > 0.0 {
            Position::Long
        } else if value < 0.0 {
            Position::Short
        } else {
            Position::Neutral
        }
    }

    pub fn from_units(units: i64) -> Self {
        match units.signum() {
            1 => Position::Long,
            -1 => Position::Short,
            _ => Position::Neutral,
        }
    }

    pub fn opposite(self) -> Self {
        match self {
            Position::Long => Position::Short,
            Position::Short => Position::Long,
            Position::Neutral => Position::Neutral,
        }
    }

    pub fn is_flat(self) -> bool {
        self == Position::Neutral
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_mapping() {
        assert_eq!(Position::from_sign(0.3), Position::Long);
        assert_eq!(Position::from_sign(-1e-9), Position::Short);
        assert_eq!(Position::from_sign(0.0), Position::Neutral);
        assert_eq!(Position::from_sign(f64::NAN), Position::Neutral);
        assert_eq!(Position::Short.signum(), -1);
    }

    #[test]
    fn units_mapping() {
        assert_eq!(Position::from_units(25), Position::Long);
        assert_eq!(Position::from_units(-3), Position::Short);
        assert_eq!(Position::from_units(0), Position::Neutral);
        assert_eq!(Position::Long.opposite(), Position::Short);
    }
}
