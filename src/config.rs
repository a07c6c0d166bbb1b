// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use std::fmt::Display;
use std::fs::File;
use std::io::BufRead;
use std::io::BufReader;
use std::path::Path;
use std::str::FromStr;

use anyhow::bail;
use anyhow::Context;
use anyhow::Result;

use crate::automove::AutomoveError;

const WINDOW_SIZE_FILENAME: &str = "slab_automove_window";
const MAX_AGE_RATIO_FILENAME: &str = "slab_automove_ratio";
const FREE_RATIO_FILENAME: &str = "slab_automove_freeratio";
const EXT_ITEM_SIZE_FILENAME: &str = "ext_item_size";

const DEFAULT_WINDOW_SIZE: usize = 30;
const DEFAULT_MAX_AGE_RATIO: f64 = 0.8;
const DEFAULT_FREE_RATIO: f64 = 0.01;
const DEFAULT_EXT_ITEM_SIZE: u32 = 512;

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Number of ticks a signal has to persist before a page is moved.
    pub window_size: usize,
    /// Kept for tuning the age balancer, the decision rules don't read it.
    pub max_age_ratio: f64,
    /// Fraction of all pages to keep free in the global pool.
    pub free_ratio: f64,
    /// Classes with chunks smaller than this can't be flushed to the external store.
    pub ext_item_size: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            window_size: DEFAULT_WINDOW_SIZE,
            max_age_ratio: DEFAULT_MAX_AGE_RATIO,
            free_ratio: DEFAULT_FREE_RATIO,
            ext_item_size: DEFAULT_EXT_ITEM_SIZE,
        }
    }
}

impl Config {
    pub fn validate(&self) -> std::result::Result<(), AutomoveError> {
        if self.window_size == 0 {
            return Err(AutomoveError::InvalidWindowSize);
        }
        if !(0.0..=1.0).contains(&self.free_ratio) {
            return Err(AutomoveError::InvalidRatio("free ratio", self.free_ratio));
        }
        if !self.max_age_ratio.is_finite() || self.max_age_ratio < 0.0 {
            return Err(AutomoveError::InvalidRatio(
                "max age ratio",
                self.max_age_ratio,
            ));
        }
        Ok(())
    }

    /// Loads the configuration from a directory holding one value per file.
    ///
    /// Missing files keep their default value.
    pub fn load_from_dir(root: &Path) -> Result<Self> {
        if !root.is_dir() {
            bail!("The config directory {} doesn't exist.", root.display());
        }
        let mut config = Self::default();
        if let Some(value) = read_param(&root.join(WINDOW_SIZE_FILENAME))? {
            config.window_size = value;
        }
        if let Some(value) = read_param(&root.join(MAX_AGE_RATIO_FILENAME))? {
            config.max_age_ratio = value;
        }
        if let Some(value) = read_param(&root.join(FREE_RATIO_FILENAME))? {
            config.free_ratio = value;
        }
        if let Some(value) = read_param(&root.join(EXT_ITEM_SIZE_FILENAME))? {
            config.ext_item_size = value;
        }
        config
            .validate()
            .with_context(|| format!("Invalid config in {}", root.display()))?;
        Ok(config)
    }
}

// Extract the parsing function for unittest.
fn parse_first_line<T, R>(reader: R) -> Result<T>
where
    T: FromStr,
    T::Err: Display,
    R: BufRead,
{
    let first_line = reader.lines().next().context("No content in buffer")??;
    let trimmed = first_line.trim();
    match trimmed.parse() {
        Ok(value) => Ok(value),
        Err(e) => bail!("Couldn't parse \"{}\": {}", trimmed, e),
    }
}

fn read_param<T>(path: &Path) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: Display,
{
    if !path.exists() {
        return Ok(None);
    }
    let reader = File::open(path)
        .map(BufReader::new)
        .with_context(|| format!("Couldn't read {}", path.display()))?;
    let value =
        parse_first_line(reader).with_context(|| format!("Couldn't parse {}", path.display()))?;
    Ok(Some(value))
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::TempDir;

    use super::*;

    #[test]
    fn test_parse_first_line() {
        assert_eq!(parse_first_line::<usize, _>("30".as_bytes()).unwrap(), 30);
        assert_eq!(
            parse_first_line::<f64, _>(" 0.25 \n0.5".as_bytes()).unwrap(),
            0.25
        );
        assert!(parse_first_line::<usize, _>("".as_bytes()).is_err());
        assert!(parse_first_line::<usize, _>("abc".as_bytes()).is_err());
    }

    #[test]
    fn test_default_config_is_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_validate() {
        let config = Config {
            window_size: 0,
            ..Config::default()
        };
        assert!(matches!(
            config.validate(),
            Err(AutomoveError::InvalidWindowSize)
        ));

        let config = Config {
            free_ratio: 1.5,
            ..Config::default()
        };
        assert!(matches!(
            config.validate(),
            Err(AutomoveError::InvalidRatio(_, _))
        ));

        let config = Config {
            max_age_ratio: f64::NAN,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_empty_dir() {
        let root = TempDir::new().unwrap();
        let config = Config::load_from_dir(root.path()).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_load_from_dir() {
        let root = TempDir::new().unwrap();
        fs::write(root.path().join(WINDOW_SIZE_FILENAME), "5\n").unwrap();
        fs::write(root.path().join(MAX_AGE_RATIO_FILENAME), "0.5").unwrap();
        fs::write(root.path().join(FREE_RATIO_FILENAME), "0.1").unwrap();
        fs::write(root.path().join(EXT_ITEM_SIZE_FILENAME), "1024").unwrap();

        let config = Config::load_from_dir(root.path()).unwrap();
        assert_eq!(
            config,
            Config {
                window_size: 5,
                max_age_ratio: 0.5,
                free_ratio: 0.1,
                ext_item_size: 1024,
            }
        );
    }

    #[test]
    fn test_load_from_dir_errors() {
        let root = TempDir::new().unwrap();
        assert!(Config::load_from_dir(&root.path().join("missing")).is_err());

        fs::write(root.path().join(WINDOW_SIZE_FILENAME), "thirty").unwrap();
        assert!(Config::load_from_dir(root.path()).is_err());

        fs::write(root.path().join(WINDOW_SIZE_FILENAME), "0").unwrap();
        assert!(Config::load_from_dir(root.path()).is_err());
    }
}
