//! Tax-year tables.
//!
//! Every rate, threshold and cap the engine reads lives in a [`TaxYearConfig`]
//! passed into the computation, so historical or future years can be loaded
//! from JSON without touching the engine.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read tax-year table '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse tax-year table: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid tax-year table: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaxBracket {
    /// `None` marks the terminal, unbounded bracket.
    pub upper_bound: Option<f64>,
    pub rate: f64,
}

impl TaxBracket {
    pub fn limit(&self) -> f64 {
        self.upper_bound.unwrap_or(f64::INFINITY)
    }

    pub fn label(&self) -> String {
        let percent = self.rate * 100.0;
        if (percent - percent.round()).abs() < 1e-9 {
            format!("{:.0}%", percent)
        } else {
            format!("{:.1}%", percent)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StandardDeduction {
    pub rate: f64,
    pub floor: f64,
    pub ceiling: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecoteThreshold {
    pub threshold: f64,
    pub max_relief: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecoteTable {
    pub single: DecoteThreshold,
    pub couple: DecoteThreshold,
    pub rate: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SurtaxBand {
    pub lower_bound: f64,
    pub upper_bound: Option<f64>,
    pub rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SurtaxTable {
    pub single: Vec<SurtaxBand>,
    pub couple: Vec<SurtaxBand>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaxYearConfig {
    /// Year the income was earned.
    pub income_year: u16,
    /// Year the tax is assessed.
    pub assessment_year: u16,
    pub brackets: Vec<TaxBracket>,
    pub standard_deduction: StandardDeduction,
    pub quotient_cap_per_half_part: f64,
    pub widow_relief_cap: f64,
    pub decote: DecoteTable,
    pub surtax: SurtaxTable,
    pub recovery_threshold: f64,
    pub reference_income_rate: f64,
}

impl Default for TaxYearConfig {
    fn default() -> Self {
        Self::year_2025()
    }
}

impl TaxYearConfig {
    /// 2025 assessment on 2024 income.
    pub fn year_2025() -> Self {
        Self {
            income_year: 2024,
            assessment_year: 2025,
            brackets: vec![
                TaxBracket {
                    upper_bound: Some(11_497.0),
                    rate: 0.0,
                },
                TaxBracket {
                    upper_bound: Some(29_315.0),
                    rate: 0.11,
                },
                TaxBracket {
                    upper_bound: Some(83_823.0),
                    rate: 0.30,
                },
                TaxBracket {
                    upper_bound: Some(180_294.0),
                    rate: 0.41,
                },
                TaxBracket {
                    upper_bound: None,
                    rate: 0.45,
                },
            ],
            standard_deduction: StandardDeduction {
                rate: 0.10,
                floor: 504.0,
                ceiling: 14_426.0,
            },
            quotient_cap_per_half_part: 1_791.0,
            widow_relief_cap: 1_993.0,
            decote: DecoteTable {
                single: DecoteThreshold {
                    threshold: 1_964.0,
                    max_relief: 889.0,
                },
                couple: DecoteThreshold {
                    threshold: 3_249.0,
                    max_relief: 1_470.0,
                },
                rate: 0.4525,
            },
            surtax: SurtaxTable {
                single: vec![
                    SurtaxBand {
                        lower_bound: 250_000.0,
                        upper_bound: Some(500_000.0),
                        rate: 0.03,
                    },
                    SurtaxBand {
                        lower_bound: 500_000.0,
                        upper_bound: None,
                        rate: 0.04,
                    },
                ],
                couple: vec![
                    SurtaxBand {
                        lower_bound: 500_000.0,
                        upper_bound: Some(1_000_000.0),
                        rate: 0.03,
                    },
                    SurtaxBand {
                        lower_bound: 1_000_000.0,
                        upper_bound: None,
                        rate: 0.04,
                    },
                ],
            },
            recovery_threshold: 61.0,
            reference_income_rate: 0.9,
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let json = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&json)
    }

    /// Loads `path` when given, otherwise the built-in current year.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::from_json_file(path),
            None => Ok(Self::year_2025()),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let Some((last, rest)) = self.brackets.split_last() else {
            return Err(ConfigError::Invalid("bracket table is empty".to_string()));
        };
        if last.upper_bound.is_some() {
            return Err(ConfigError::Invalid(
                "terminal bracket must be unbounded".to_string(),
            ));
        }

        let mut previous = 0.0;
        for bracket in rest {
            let Some(limit) = bracket.upper_bound else {
                return Err(ConfigError::Invalid(
                    "only the terminal bracket may be unbounded".to_string(),
                ));
            };
            if !limit.is_finite() || limit <= previous {
                return Err(ConfigError::Invalid(format!(
                    "bracket bounds must be strictly ascending, got {limit} after {previous}"
                )));
            }
            previous = limit;
        }

        for (name, rate) in self
            .brackets
            .iter()
            .map(|b| ("bracket rate", b.rate))
            .chain([
                ("standardDeduction.rate", self.standard_deduction.rate),
                ("decote.rate", self.decote.rate),
                ("referenceIncomeRate", self.reference_income_rate),
            ])
        {
            if !(0.0..=1.0).contains(&rate) {
                return Err(ConfigError::Invalid(format!(
                    "{name} must be between 0 and 1, got {rate}"
                )));
            }
        }

        for (name, value) in [
            ("standardDeduction.floor", self.standard_deduction.floor),
            ("standardDeduction.ceiling", self.standard_deduction.ceiling),
            ("quotientCapPerHalfPart", self.quotient_cap_per_half_part),
            ("widowReliefCap", self.widow_relief_cap),
            ("decote.single.threshold", self.decote.single.threshold),
            ("decote.single.maxRelief", self.decote.single.max_relief),
            ("decote.couple.threshold", self.decote.couple.threshold),
            ("decote.couple.maxRelief", self.decote.couple.max_relief),
            ("recoveryThreshold", self.recovery_threshold),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::Invalid(format!(
                    "{name} must be a finite value >= 0, got {value}"
                )));
            }
        }

        if self.standard_deduction.floor > self.standard_deduction.ceiling {
            return Err(ConfigError::Invalid(
                "standardDeduction.floor cannot exceed standardDeduction.ceiling".to_string(),
            ));
        }

        validate_surtax_bands("surtax.single", &self.surtax.single)?;
        validate_surtax_bands("surtax.couple", &self.surtax.couple)
    }
}

fn validate_surtax_bands(name: &str, bands: &[SurtaxBand]) -> Result<(), ConfigError> {
    let mut previous_upper = 0.0;
    for (index, band) in bands.iter().enumerate() {
        for (bound, value) in [
            ("lowerBound", Some(band.lower_bound)),
            ("upperBound", band.upper_bound),
        ] {
            if let Some(value) = value.filter(|v| !v.is_finite() || *v < 0.0) {
                return Err(ConfigError::Invalid(format!(
                    "{name}[{index}].{bound} must be a finite value >= 0, got {value}"
                )));
            }
        }
        if !(0.0..=1.0).contains(&band.rate) {
            return Err(ConfigError::Invalid(format!(
                "{name}[{index}].rate must be between 0 and 1"
            )));
        }
        if band.lower_bound < previous_upper {
            return Err(ConfigError::Invalid(format!(
                "{name}[{index}] overlaps the previous band"
            )));
        }
        match band.upper_bound {
            Some(upper) if upper <= band.lower_bound => {
                return Err(ConfigError::Invalid(format!(
                    "{name}[{index}].upperBound must exceed lowerBound"
                )));
            }
            Some(upper) => previous_upper = upper,
            None if index + 1 != bands.len() => {
                return Err(ConfigError::Invalid(format!(
                    "{name}[{index}] is unbounded but not last"
                )));
            }
            None => {}
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bundled_table_path() -> PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR")).join("config/2025.json")
    }

    #[test]
    fn builtin_table_is_valid() {
        TaxYearConfig::year_2025()
            .validate()
            .expect("built-in table should validate");
    }

    #[test]
    fn bundled_json_matches_builtin_table() {
        let loaded =
            TaxYearConfig::from_json_file(&bundled_table_path()).expect("bundled table loads");
        assert_eq!(loaded, TaxYearConfig::year_2025());
    }

    #[test]
    fn json_round_trip_keeps_unbounded_bracket() {
        let json = serde_json::to_string(&TaxYearConfig::year_2025()).expect("serializes");
        assert!(json.contains("\"upperBound\":null"));
        let parsed = TaxYearConfig::from_json_str(&json).expect("parses back");
        assert_eq!(parsed.brackets.len(), 5);
        assert!(parsed.brackets[4].upper_bound.is_none());
    }

    #[test]
    fn load_without_path_uses_builtin_year() {
        let config = TaxYearConfig::load(None).expect("built-in");
        assert_eq!(config.assessment_year, 2025);
    }

    #[test]
    fn missing_file_reports_path() {
        let err = TaxYearConfig::from_json_file(Path::new("does/not/exist.json"))
            .expect_err("missing file must fail");
        assert!(matches!(err, ConfigError::Read { .. }));
        assert!(err.to_string().contains("does/not/exist.json"));
    }

    #[test]
    fn rejects_bounded_terminal_bracket() {
        let mut config = TaxYearConfig::year_2025();
        config.brackets[4].upper_bound = Some(1_000_000.0);
        let err = config.validate().expect_err("terminal must be unbounded");
        assert!(err.to_string().contains("terminal bracket"));
    }

    #[test]
    fn rejects_descending_bounds() {
        let mut config = TaxYearConfig::year_2025();
        config.brackets[2].upper_bound = Some(20_000.0);
        let err = config.validate().expect_err("bounds must ascend");
        assert!(err.to_string().contains("ascending"));
    }

    #[test]
    fn rejects_rate_above_one() {
        let mut config = TaxYearConfig::year_2025();
        config.decote.rate = 1.5;
        let err = config.validate().expect_err("rate must be <= 1");
        assert!(err.to_string().contains("decote.rate"));
    }

    #[test]
    fn rejects_deduction_floor_above_ceiling() {
        let mut config = TaxYearConfig::year_2025();
        config.standard_deduction.floor = 20_000.0;
        let err = config.validate().expect_err("floor above ceiling");
        assert!(err.to_string().contains("standardDeduction.floor"));
    }

    #[test]
    fn rejects_overlapping_surtax_bands() {
        let mut config = TaxYearConfig::year_2025();
        config.surtax.single[1].lower_bound = 400_000.0;
        let err = config.validate().expect_err("bands overlap");
        assert!(err.to_string().contains("surtax.single[1]"));
    }

    #[test]
    fn rejects_non_finite_or_negative_surtax_bounds() {
        let mut config = TaxYearConfig::year_2025();
        config.surtax.couple[0].lower_bound = f64::NAN;
        let err = config.validate().expect_err("NaN lower bound");
        assert!(err.to_string().contains("surtax.couple[0].lowerBound"));

        let mut config = TaxYearConfig::year_2025();
        config.surtax.single[0].lower_bound = -1.0;
        let err = config.validate().expect_err("negative lower bound");
        assert!(err.to_string().contains("surtax.single[0].lowerBound"));

        let mut config = TaxYearConfig::year_2025();
        config.surtax.single[0].upper_bound = Some(f64::INFINITY);
        let err = config.validate().expect_err("infinite upper bound");
        assert!(err.to_string().contains("surtax.single[0].upperBound"));
    }

    #[test]
    fn rejects_malformed_json() {
        let err = TaxYearConfig::from_json_str("{\"incomeYear\": 2024").expect_err("bad json");
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn bracket_labels_are_whole_percentages() {
        let config = TaxYearConfig::year_2025();
        let labels: Vec<String> = config.brackets.iter().map(TaxBracket::label).collect();
        assert_eq!(labels, ["0%", "11%", "30%", "41%", "45%"]);
        let half = TaxBracket {
            upper_bound: None,
            rate: 0.055,
        };
        assert_eq!(half.label(), "5.5%");
    }
}
