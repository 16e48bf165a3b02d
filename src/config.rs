//! Configuration file for irptool, in toml
//!
//! ```toml
//! absolute_tolerance = 60
//! relative_tolerance = 0.1
//! minimum_repeat_gap = 20000
//! irp_protocols = "/usr/share/irpmaster/IrpProtocols.xml"
//! ```

use irpmaster::{CleanerOptions, RepeatFinderOptions};
use serde::Deserialize;
use std::{fs, path::Path, path::PathBuf};

#[derive(Deserialize, Debug, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Absolute tolerance in microseconds
    pub absolute_tolerance: f64,
    /// Relative tolerance as a fraction
    pub relative_tolerance: f64,
    /// Shortest gap in microseconds which can end a repeat
    pub minimum_repeat_gap: f64,
    /// Location of IrpProtocols.xml
    pub irp_protocols: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        let options = RepeatFinderOptions::default();

        Config {
            absolute_tolerance: options.absolute_tolerance,
            relative_tolerance: options.relative_tolerance,
            minimum_repeat_gap: options.minimum_repeat_gap,
            irp_protocols: None,
        }
    }
}

impl Config {
    pub fn parse(s: &str) -> Result<Config, String> {
        let config: Config = toml::from_str(s).map_err(|e| e.to_string())?;

        if config.absolute_tolerance < 0.0 {
            return Err("absolute_tolerance cannot be negative".to_string());
        }

        if !(0.0..1.0).contains(&config.relative_tolerance) {
            return Err("relative_tolerance should be between 0 and 1".to_string());
        }

        if config.minimum_repeat_gap < 0.0 {
            return Err("minimum_repeat_gap cannot be negative".to_string());
        }

        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Config, String> {
        let text = fs::read_to_string(path).map_err(|e| format!("{}: {e}", path.display()))?;

        Self::parse(&text).map_err(|e| format!("{}: {e}", path.display()))
    }

    pub fn repeat_finder_options(&self) -> RepeatFinderOptions {
        RepeatFinderOptions {
            absolute_tolerance: self.absolute_tolerance,
            relative_tolerance: self.relative_tolerance,
            minimum_repeat_gap: self.minimum_repeat_gap,
        }
    }

    pub fn cleaner_options(&self) -> CleanerOptions {
        CleanerOptions {
            absolute_tolerance: self.absolute_tolerance,
            relative_tolerance: self.relative_tolerance,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn parse_test() {
        let config = Config::parse(
            r#"
        absolute_tolerance = 100
        irp_protocols = "IrpProtocols.xml"
        "#,
        )
        .unwrap();

        assert_eq!(config.absolute_tolerance, 100.0);
        assert_eq!(config.relative_tolerance, 0.1);
        assert_eq!(config.minimum_repeat_gap, 20000.0);
        assert_eq!(config.irp_protocols, Some(PathBuf::from("IrpProtocols.xml")));

        assert_eq!(Config::parse("").unwrap(), Config::default());

        assert!(Config::parse("relative_tolerance = 2.0").is_err());
        assert!(Config::parse("absolute_tolerance = -1").is_err());
        assert!(Config::parse("tolerance = 1").is_err());
        assert!(Config::parse("absolute_tolerance = \"many\"").is_err());
    }

    #[test]
    fn load() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "minimum_repeat_gap = 15000").unwrap();

        let config = Config::load(file.path()).unwrap();

        assert_eq!(config.repeat_finder_options().minimum_repeat_gap, 15000.0);
        assert_eq!(config.cleaner_options().absolute_tolerance, 60.0);

        assert!(Config::load(Path::new("/nonexistent/irptool.toml")).is_err());
    }
}
