//! Analysis configuration.
//!
//! Every parameter has a default and may be overridden by flat `Key=Value`
//! pairs, either given directly (command-line arguments) or read from a
//! file of one pair per line with `#` comments.

use crate::{Error, Result};
use std::path::{Path, PathBuf};

/// Largest number of tag-multiplicity bins a run may book.
pub const MAX_NCH_TAG_BINS: usize = 1 << 20;

/// Parameters of one K/pi analysis run.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisConfig {
    /// Input column store.
    pub input: PathBuf,
    /// Output histogram file.
    pub output: PathBuf,
    /// Table to bind in the input store.
    pub tree: String,
    /// Largest tag multiplicity; higher values fill the last bin.
    pub max_nch_tag: i64,
    /// Number of tag-multiplicity bins, `max_nch_tag + 1` when unset.
    pub nch_tag_bins: Option<usize>,
    /// Entries to process; zero or negative means all.
    pub max_events: i64,
    /// Reference center-of-mass energy in GeV.
    pub ecm_ref: f64,
    /// Minimum charged multiplicity.
    pub min_nch: i64,
    /// Lower bound of the thrust polar angle, degrees.
    pub min_theta_deg: f64,
    /// Upper bound of the thrust polar angle, degrees.
    pub max_theta_deg: f64,
    /// Count generator-level particles instead of PID-tagged tracks.
    pub is_gen: bool,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            input: PathBuf::from("sample/Strangeness/merged_mc_v2.h5"),
            output: PathBuf::from("output/KtoPi.json"),
            tree: "Tree".to_string(),
            max_nch_tag: 60,
            nch_tag_bins: None,
            max_events: -1,
            ecm_ref: 91.2,
            min_nch: 7,
            min_theta_deg: 30.0,
            max_theta_deg: 150.0,
            is_gen: false,
        }
    }
}

impl AnalysisConfig {
    /// Recognized keys, in documentation order.
    pub const KEYS: [&'static str; 11] = [
        "Input",
        "Output",
        "Tree",
        "MaxNchTag",
        "NchTagBins",
        "MaxEvents",
        "EcmRef",
        "MinNch",
        "MinThetaDeg",
        "MaxThetaDeg",
        "IsGen",
    ];

    /// Builds a validated configuration from defaults overridden by `pairs`.
    ///
    /// # Errors
    /// Returns an error for malformed pairs, unparsable values or an
    /// invalid resulting configuration.
    pub fn from_pairs<I, S>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut config = Self::default();
        config.apply_pairs(pairs)?;
        config.validate()?;
        Ok(config)
    }

    /// Builds a validated configuration from a `Key=Value` file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or does not parse.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut config = Self::default();
        config.apply_file(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Overrides fields from the `Key=Value` lines of a file.
    ///
    /// Blank lines are skipped and `#` starts a comment.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or a line does not parse.
    pub fn apply_file<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        let text = std::fs::read_to_string(path)?;
        let lines = text
            .lines()
            .map(|line| line.split_once('#').map_or(line, |(body, _)| body).trim())
            .filter(|line| !line.is_empty());
        self.apply_pairs(lines)
    }

    /// Overrides fields from `Key=Value` pairs. Later pairs win.
    ///
    /// # Errors
    /// Returns an error for a pair without `=` or an unparsable value.
    pub fn apply_pairs<I, S>(&mut self, pairs: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for pair in pairs {
            let pair = pair.as_ref();
            let (key, value) = pair
                .split_once('=')
                .ok_or_else(|| Error::MalformedPair(pair.to_string()))?;
            self.set(key.trim(), value.trim())?;
        }
        Ok(())
    }

    /// Sets one field by key. Unknown keys are logged and ignored.
    ///
    /// # Errors
    /// Returns [`Error::InvalidValue`] if `value` does not parse for `key`.
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        match key {
            "Input" => self.input = PathBuf::from(value),
            "Output" => self.output = PathBuf::from(value),
            "Tree" => self.tree = value.to_string(),
            "MaxNchTag" => self.max_nch_tag = parse_value(key, value, "an integer")?,
            "NchTagBins" => {
                self.nch_tag_bins = Some(parse_value(key, value, "a positive integer")?);
            }
            "MaxEvents" => self.max_events = parse_value(key, value, "an integer")?,
            "EcmRef" => self.ecm_ref = parse_value(key, value, "a number")?,
            "MinNch" => self.min_nch = parse_value(key, value, "an integer")?,
            "MinThetaDeg" => self.min_theta_deg = parse_value(key, value, "a number")?,
            "MaxThetaDeg" => self.max_theta_deg = parse_value(key, value, "a number")?,
            "IsGen" => {
                self.is_gen = parse_bool(value).ok_or_else(|| Error::InvalidValue {
                    key: key.to_string(),
                    value: value.to_string(),
                    expected: "true/false, yes/no or 1/0",
                })?;
            }
            _ => log::warn!("ignoring unknown configuration key '{key}'"),
        }
        Ok(())
    }

    /// Checks that the configuration describes a runnable analysis.
    ///
    /// # Errors
    /// Returns [`Error::ConfigError`] for an empty angle window, a negative
    /// `MaxNchTag`, a bin count of zero or above [`MAX_NCH_TAG_BINS`], or a
    /// non-positive reference energy.
    pub fn validate(&self) -> Result<()> {
        if self.max_nch_tag < 0 {
            return Err(Error::ConfigError(format!(
                "MaxNchTag must be non-negative, got {}",
                self.max_nch_tag
            )));
        }
        if !usize::try_from(self.max_nch_tag).is_ok_and(|max| max < MAX_NCH_TAG_BINS) {
            return Err(Error::ConfigError(format!(
                "MaxNchTag must be below {MAX_NCH_TAG_BINS}, got {}",
                self.max_nch_tag
            )));
        }
        match self.nch_tag_bins {
            Some(0) => {
                return Err(Error::ConfigError("NchTagBins must be positive".to_string()));
            }
            Some(bins) if bins > MAX_NCH_TAG_BINS => {
                return Err(Error::ConfigError(format!(
                    "NchTagBins must be at most {MAX_NCH_TAG_BINS}, got {bins}"
                )));
            }
            _ => {}
        }
        let window_open = self.min_theta_deg < self.max_theta_deg;
        if !window_open {
            return Err(Error::ConfigError(format!(
                "MinThetaDeg ({}) must be below MaxThetaDeg ({})",
                self.min_theta_deg, self.max_theta_deg
            )));
        }
        if !self.ecm_ref.is_finite() || self.ecm_ref <= 0.0 {
            return Err(Error::ConfigError(format!(
                "EcmRef must be positive, got {}",
                self.ecm_ref
            )));
        }
        Ok(())
    }

    /// Number of tag-multiplicity bins.
    #[must_use]
    pub fn n_bins(&self) -> usize {
        self.nch_tag_bins
            .unwrap_or_else(|| usize::try_from(self.max_nch_tag).map_or(1, |max| max + 1))
    }

    /// Thrust polar-angle window `(min, max)` in radians.
    #[must_use]
    pub fn theta_window(&self) -> (f64, f64) {
        (self.min_theta_deg.to_radians(), self.max_theta_deg.to_radians())
    }

    /// Entries to process out of `available`.
    #[must_use]
    pub fn event_limit(&self, available: u64) -> u64 {
        match u64::try_from(self.max_events) {
            Ok(limit) if limit > 0 => limit.min(available),
            _ => available,
        }
    }

    #[must_use]
    pub fn with_input(mut self, input: impl Into<PathBuf>) -> Self {
        self.input = input.into();
        self
    }

    #[must_use]
    pub fn with_output(mut self, output: impl Into<PathBuf>) -> Self {
        self.output = output.into();
        self
    }

    #[must_use]
    pub fn with_tree(mut self, tree: impl Into<String>) -> Self {
        self.tree = tree.into();
        self
    }

    #[must_use]
    pub fn with_max_nch_tag(mut self, max_nch_tag: i64) -> Self {
        self.max_nch_tag = max_nch_tag;
        self
    }

    #[must_use]
    pub fn with_nch_tag_bins(mut self, bins: usize) -> Self {
        self.nch_tag_bins = Some(bins);
        self
    }

    #[must_use]
    pub fn with_max_events(mut self, max_events: i64) -> Self {
        self.max_events = max_events;
        self
    }

    #[must_use]
    pub fn with_ecm_ref(mut self, ecm_ref: f64) -> Self {
        self.ecm_ref = ecm_ref;
        self
    }

    #[must_use]
    pub fn with_min_nch(mut self, min_nch: i64) -> Self {
        self.min_nch = min_nch;
        self
    }

    /// Sets the thrust polar-angle window in degrees.
    #[must_use]
    pub fn with_theta_window_deg(mut self, min: f64, max: f64) -> Self {
        self.min_theta_deg = min;
        self.max_theta_deg = max;
        self
    }

    #[must_use]
    pub fn with_gen_level(mut self, is_gen: bool) -> Self {
        self.is_gen = is_gen;
        self
    }
}

fn parse_value<T: std::str::FromStr>(key: &str, value: &str, expected: &'static str) -> Result<T> {
    value.parse().map_err(|_| Error::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
        expected,
    })
}

/// Parses a case-insensitive boolean: `true`/`false`, `yes`/`no` or `1`/`0`.
#[must_use]
pub fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "1" => Some(true),
        "false" | "no" | "0" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults() {
        let config = AnalysisConfig::default();
        assert_eq!(config.max_nch_tag, 60);
        assert_eq!(config.n_bins(), 61);
        assert_eq!(config.min_nch, 7);
        assert!(!config.is_gen);
        let (lo, hi) = config.theta_window();
        assert_relative_eq!(lo, std::f64::consts::FRAC_PI_6);
        assert_relative_eq!(hi, 5.0 * std::f64::consts::FRAC_PI_6);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_pairs_overrides() {
        let config = AnalysisConfig::from_pairs([
            "Input=data/a.json",
            "MaxNchTag=20",
            "MaxEvents=100",
            "EcmRef=91.0",
            "IsGen=YES",
            "Tree = Events",
        ])
        .unwrap();
        assert_eq!(config.input, PathBuf::from("data/a.json"));
        assert_eq!(config.max_nch_tag, 20);
        assert_eq!(config.n_bins(), 21);
        assert_eq!(config.max_events, 100);
        assert_relative_eq!(config.ecm_ref, 91.0);
        assert!(config.is_gen);
        assert_eq!(config.tree, "Events");
    }

    #[test]
    fn test_parse_bool_variants() {
        for value in ["true", "True", "TRUE", "yes", "Yes", "1"] {
            assert_eq!(parse_bool(value), Some(true), "{value}");
        }
        for value in ["false", "FALSE", "no", "No", "0"] {
            assert_eq!(parse_bool(value), Some(false), "{value}");
        }
        assert_eq!(parse_bool("maybe"), None);
    }

    #[test]
    fn test_malformed_and_invalid_values() {
        assert!(matches!(
            AnalysisConfig::from_pairs(["MaxNchTag"]),
            Err(Error::MalformedPair(_))
        ));
        assert!(matches!(
            AnalysisConfig::from_pairs(["MinNch=seven"]),
            Err(Error::InvalidValue { .. })
        ));
        assert!(matches!(
            AnalysisConfig::from_pairs(["IsGen=perhaps"]),
            Err(Error::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_unknown_key_is_ignored() {
        let config = AnalysisConfig::from_pairs(["Colour=blue", "MinNch=3"]).unwrap();
        assert_eq!(config.min_nch, 3);
    }

    #[test]
    fn test_invalid_ranges_rejected() {
        assert!(matches!(
            AnalysisConfig::from_pairs(["MinThetaDeg=150", "MaxThetaDeg=30"]),
            Err(Error::ConfigError(_))
        ));
        assert!(matches!(
            AnalysisConfig::from_pairs(["MaxNchTag=-1"]),
            Err(Error::ConfigError(_))
        ));
        assert!(matches!(
            AnalysisConfig::from_pairs(["NchTagBins=0"]),
            Err(Error::ConfigError(_))
        ));
        assert!(matches!(
            AnalysisConfig::from_pairs(["MaxNchTag=9223372036854775807"]),
            Err(Error::ConfigError(_))
        ));
        let too_many = format!("NchTagBins={}", MAX_NCH_TAG_BINS + 1);
        assert!(matches!(
            AnalysisConfig::from_pairs([too_many.as_str()]),
            Err(Error::ConfigError(_))
        ));
        let largest = format!("MaxNchTag={}", MAX_NCH_TAG_BINS - 1);
        let config = AnalysisConfig::from_pairs([largest.as_str()]).unwrap();
        assert_eq!(config.n_bins(), MAX_NCH_TAG_BINS);
    }

    #[test]
    fn test_event_limit() {
        let config = AnalysisConfig::default();
        assert_eq!(config.event_limit(50), 50);
        assert_eq!(config.clone().with_max_events(10).event_limit(50), 10);
        assert_eq!(config.clone().with_max_events(80).event_limit(50), 50);
        assert_eq!(config.with_max_events(0).event_limit(50), 50);
    }

    #[test]
    fn test_from_file_with_comments() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "# K/pi run").unwrap();
        writeln!(file, "Output=out/yields.json").unwrap();
        writeln!(file).unwrap();
        writeln!(file, "MaxNchTag=40   # coarse").unwrap();
        writeln!(file, "NchTagBins=11").unwrap();
        file.flush().unwrap();

        let mut config = AnalysisConfig::from_file(file.path()).unwrap();
        assert_eq!(config.output, PathBuf::from("out/yields.json"));
        assert_eq!(config.max_nch_tag, 40);
        assert_eq!(config.n_bins(), 11);

        config.apply_pairs(["MaxNchTag=30"]).unwrap();
        assert_eq!(config.max_nch_tag, 30);
    }
}
