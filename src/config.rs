// Copyright 2022 The Firefly Authors.
//
// Use of this source code is governed by a BSD 3-clause
// license that can be found in the LICENSE file.

//! Process-wide configuration: the real-memory arena's size, read from
//! the environment at startup.

use crate::arena::MIN_REAL_SIZE;
use crate::error::{Error, Result};

/// The environment variable naming the arena's total size, in bytes.
pub const REAL_MEM_SIZE_VAR: &str = "VMSIM_REAL_MEM_SIZE";

/// The default arena size used when `VMSIM_REAL_MEM_SIZE` is unset:
/// 4 MiB + 16 KiB.
pub const DEFAULT_REAL_MEM_SIZE: u32 = 4 * 1024 * 1024 + 16 * 1024;

/// Engine configuration.
#[derive(Debug, Clone, Copy)]
pub struct Config {
    pub real_mem_size: u32,
}

impl Config {
    /// Reads `VMSIM_REAL_MEM_SIZE` from the process environment, falling
    /// back to [`DEFAULT_REAL_MEM_SIZE`] if unset.
    ///
    /// Fails if the variable is set but unparseable, or parses to a value
    /// smaller than the page-table region plus one frame requires.
    pub fn from_env() -> Result<Self> {
        match std::env::var(REAL_MEM_SIZE_VAR) {
            Ok(raw) => Self::parse(&raw),
            Err(std::env::VarError::NotPresent) => Ok(Config {
                real_mem_size: DEFAULT_REAL_MEM_SIZE,
            }),
            Err(std::env::VarError::NotUnicode(_)) => Err(Error::Configuration(format!(
                "{REAL_MEM_SIZE_VAR} is not valid unicode"
            ))),
        }
    }

    /// Parses a raw decimal value for `VMSIM_REAL_MEM_SIZE`.
    pub fn parse(raw: &str) -> Result<Self> {
        let real_mem_size: u32 = raw.trim().parse().map_err(|_| {
            Error::Configuration(format!("{REAL_MEM_SIZE_VAR}={raw:?} is not a valid decimal unsigned integer"))
        })?;

        if real_mem_size < MIN_REAL_SIZE {
            return Err(Error::Configuration(format!(
                "{REAL_MEM_SIZE_VAR}={real_mem_size} is smaller than the minimum {MIN_REAL_SIZE}"
            )));
        }

        Ok(Config { real_mem_size })
    }
}
