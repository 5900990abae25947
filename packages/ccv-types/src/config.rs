//! Defines the module configuration of the CCV keepers.
use std::{fs, path::Path};

use cosmwasm_std::Timestamp;
use serde::{Deserialize, Serialize};

use crate::{host, CcvError, CHILD_PORT_ID, PARENT_PORT_ID};

/// Four weeks, the unbonding period of the reference deployment
pub const DEFAULT_UNBONDING_PERIOD_SECS: u64 = 4 * 7 * 24 * 60 * 60;
/// Upper bound of both periods, 100 years
pub const MAX_PERIOD_SECS: u64 = 100 * 365 * 24 * 60 * 60;

/// The top level configuration of the CCV modules.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CcvConfig {
    /// Parameters of the child module
    #[serde(default)]
    pub child: ChildParams,
    /// Parameters of the parent module
    #[serde(default)]
    pub parent: ParentParams,
}

impl CcvConfig {
    /// Load a `CcvConfig` from a TOML file on disk.
    ///
    /// Accepts any `P: AsRef<Path>` (e.g. &str, String, Path, PathBuf).
    /// # Errors
    /// Returns [`CcvError::Config`] if the file cannot be read, is not valid
    /// TOML or fails [`CcvConfig::validate`]
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, CcvError> {
        let path_ref = path.as_ref();
        let contents = fs::read_to_string(path_ref).map_err(|e| {
            CcvError::Config(format!("I/O error reading `{}`: {e}", path_ref.display()))
        })?;
        let cfg: Self = toml::from_str(&contents)
            .map_err(|e| CcvError::Config(format!("invalid TOML in config: {e}")))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Checks the port identifiers and that both periods are non-zero and at
    /// most [`MAX_PERIOD_SECS`].
    /// # Errors
    /// Returns [`CcvError::Config`] describing the first invalid parameter
    pub fn validate(&self) -> Result<(), CcvError> {
        host::validate_port_id(&self.child.port_id).map_err(CcvError::Config)?;
        host::validate_port_id(&self.parent.port_id).map_err(CcvError::Config)?;
        for (name, secs) in [
            ("child unbonding period", self.child.unbonding_period_secs),
            ("parent time delay", self.parent.time_delay_secs),
        ] {
            if secs == 0 {
                return Err(CcvError::Config(format!("{name} cannot be zero")));
            }
            if secs > MAX_PERIOD_SECS {
                return Err(CcvError::Config(format!(
                    "{name} of {secs}s exceeds the maximum of {MAX_PERIOD_SECS}s"
                )));
            }
        }
        Ok(())
    }
}

/// The time `period_secs` after `time`, in nanoseconds.
/// # Errors
/// Returns [`CcvError::Config`] if the result does not fit the timestamp range
pub fn period_end(time: Timestamp, period_secs: u64) -> Result<u64, CcvError> {
    period_secs
        .checked_mul(1_000_000_000)
        .and_then(|period| time.nanos().checked_add(period))
        .ok_or_else(|| {
            CcvError::Config(format!(
                "period of {period_secs}s after {time} overflows the block time"
            ))
        })
}

/// Parameters of the child keeper
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChildParams {
    /// The port the child module binds
    pub port_id: String,
    /// Time a received packet waits before it is acknowledged
    pub unbonding_period_secs: u64,
}

impl Default for ChildParams {
    fn default() -> Self {
        Self {
            port_id: CHILD_PORT_ID.to_string(),
            unbonding_period_secs: DEFAULT_UNBONDING_PERIOD_SECS,
        }
    }
}

/// Parameters of the parent keeper
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParentParams {
    /// The port the parent module binds
    pub port_id: String,
    /// Timeout horizon of the packets sent to child chains
    pub time_delay_secs: u64,
}

impl Default for ParentParams {
    fn default() -> Self {
        Self {
            port_id: PARENT_PORT_ID.to_string(),
            time_delay_secs: DEFAULT_UNBONDING_PERIOD_SECS,
        }
    }
}
