// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! CONTEXT: Board boot configuration loaded from TOML
//! OWNERS: @init-team
//! STATUS: Functional
//! API_STABILITY: Unstable
//! TEST_COVERAGE: 6 unit tests
//!
//! Every key is optional; an absent file yields the board defaults.
//!
//! ```toml
//! [board]
//! arch = "RP2040 264K SRAM"
//! kind = "RP2"
//! firmware = [4, 5, 0]
//!
//! [scripts]
//! boot = "boot.py"
//! main = "main.py"
//!
//! [debug]
//! host_wait_timeout_ms = 1000
//!
//! [fatal]
//! blink_half_period_ms = 100
//! on_critical_init = true
//! ```

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::gate::DeviceIdentity;

/// Longest architecture string the host tooling accepts.
pub const ARCH_MAX_LEN: usize = 33;

/// Error produced while loading or validating a [`BootConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("failed to access {path}: {source}")]
    Io {
        /// Location associated with the error.
        path: PathBuf,
        /// Underlying operating system error.
        source: io::Error,
    },
    /// TOML parsing failed.
    #[error("failed to parse boot config {origin}: {source}")]
    Parse {
        /// File name, or `<inline>` for string input.
        origin: String,
        /// Error returned by the TOML deserializer.
        source: toml::de::Error,
    },
    /// Parsed, but a value is out of range.
    #[error("invalid boot config: {0}")]
    Invalid(String),
}

/// Board identity reported to the debug host.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct BoardConfig {
    pub arch: String,
    pub kind: String,
    pub firmware: [u32; 3],
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self { arch: "RP2040 264K SRAM".into(), kind: "RP2".into(), firmware: [4, 5, 0] }
    }
}

/// Names of the device-resident scripts.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct ScriptsConfig {
    pub boot: String,
    pub main: String,
}

impl Default for ScriptsConfig {
    fn default() -> Self {
        Self { boot: "boot.py".into(), main: "main.py".into() }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct DebugConfig {
    /// Upper bound on the wait for a host command after a host script.
    pub host_wait_timeout_ms: u32,
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self { host_wait_timeout_ms: 1_000 }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct FatalConfig {
    /// LED on time and off time while blinking.
    pub blink_half_period_ms: u32,
    /// Escalate a failed `Critical` subsystem to the fatal handler.
    pub on_critical_init: bool,
}

impl Default for FatalConfig {
    fn default() -> Self {
        Self { blink_half_period_ms: 100, on_critical_init: true }
    }
}

/// Complete boot configuration.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct BootConfig {
    pub board: BoardConfig,
    pub scripts: ScriptsConfig,
    pub debug: DebugConfig,
    pub fatal: FatalConfig,
}

impl BootConfig {
    /// Parses and validates `raw`.
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        Self::parse(raw, "<inline>")
    }

    /// Loads `path`. A missing file yields [`BootConfig::default`].
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = match fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                log::info!(target: "config", "{} not found, using defaults", path.display());
                return Ok(Self::default());
            }
            Err(source) => return Err(ConfigError::Io { path: path.to_path_buf(), source }),
        };
        Self::parse(&raw, &path.display().to_string())
    }

    fn parse(raw: &str, origin: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(raw)
            .map_err(|source| ConfigError::Parse { origin: origin.to_string(), source })?;
        config.validate()?;
        Ok(config)
    }

    /// Range checks that serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.board.arch.is_empty() || self.board.arch.len() > ARCH_MAX_LEN {
            return Err(ConfigError::Invalid(format!(
                "board.arch must be 1..={ARCH_MAX_LEN} bytes, got {}",
                self.board.arch.len()
            )));
        }
        if self.scripts.boot.is_empty() || self.scripts.main.is_empty() {
            return Err(ConfigError::Invalid("script names must not be empty".into()));
        }
        if self.debug.host_wait_timeout_ms == 0 {
            return Err(ConfigError::Invalid("debug.host_wait_timeout_ms must be > 0".into()));
        }
        if self.fatal.blink_half_period_ms == 0 {
            return Err(ConfigError::Invalid("fatal.blink_half_period_ms must be > 0".into()));
        }
        Ok(())
    }

    /// Identity the debug gate reports to the host.
    pub fn identity(&self) -> DeviceIdentity {
        DeviceIdentity { firmware: self.board.firmware, arch: self.board.arch.clone() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;

    #[test]
    fn empty_document_is_the_default() {
        assert_eq!(BootConfig::from_toml_str("").unwrap(), BootConfig::default());
        let config = BootConfig::default();
        assert_eq!(config.debug.host_wait_timeout_ms, 1_000);
        assert_eq!(config.fatal.blink_half_period_ms, 100);
        assert_eq!(config.scripts.main, "main.py");
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config = BootConfig::from_toml_str(
            "[scripts]\nmain = \"app.py\"\n[fatal]\non_critical_init = false\n",
        )
        .unwrap();
        assert_eq!(config.scripts.main, "app.py");
        assert_eq!(config.scripts.boot, "boot.py");
        assert!(!config.fatal.on_critical_init);
        assert_eq!(config.fatal.blink_half_period_ms, 100);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = BootConfig::from_toml_str("[debug]\nhost_wait = 5\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn out_of_range_values_are_rejected() {
        let long_arch = format!("[board]\narch = \"{}\"\n", "x".repeat(ARCH_MAX_LEN + 1));
        assert!(matches!(BootConfig::from_toml_str(&long_arch), Err(ConfigError::Invalid(_))));
        assert!(matches!(
            BootConfig::from_toml_str("[debug]\nhost_wait_timeout_ms = 0\n"),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn load_reads_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("boot.toml");
        let mut file = File::create(&path).unwrap();
        writeln!(file, "[board]").unwrap();
        writeln!(file, "arch = \"OPENMV4 1MB SRAM\"").unwrap();
        writeln!(file, "firmware = [4, 6, 1]").unwrap();
        drop(file);
        let config = BootConfig::load(&path).unwrap();
        assert_eq!(
            config.identity(),
            DeviceIdentity { firmware: [4, 6, 1], arch: "OPENMV4 1MB SRAM".into() }
        );
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = BootConfig::load(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, BootConfig::default());
    }
}
