//! Configuration for prefetch resolution and the PostgreSQL executor

use std::env;

use serde::Deserialize;

use crate::error::{OrmError, OrmResult};

pub const ENV_MAX_IN_LIST_SIZE: &str = "TRELLIS_PREFETCH_MAX_IN_LIST_SIZE";
pub const ENV_MAX_DEPTH: &str = "TRELLIS_PREFETCH_MAX_DEPTH";

/// Limits applied while compiling and running a prefetch pass
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PrefetchConfig {
    /// Largest number of key tuples in one IN-list; bigger key sets are
    /// split into several statements
    pub max_in_list_size: usize,
    /// Longest prefetch path, in relationship segments
    pub max_depth: usize,
}

impl Default for PrefetchConfig {
    fn default() -> Self {
        Self {
            max_in_list_size: 1000,
            max_depth: 10,
        }
    }
}

impl PrefetchConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_in_list_size(mut self, size: usize) -> Self {
        self.max_in_list_size = size;
        self
    }

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    /// Defaults overridden by `TRELLIS_PREFETCH_*` environment variables
    pub fn from_env() -> OrmResult<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Same as [`from_env`](Self::from_env) with a custom variable source
    pub fn from_lookup<F>(lookup: F) -> OrmResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(value) = lookup(ENV_MAX_IN_LIST_SIZE) {
            config.max_in_list_size = parse_env(ENV_MAX_IN_LIST_SIZE, &value)?;
        }

        if let Some(value) = lookup(ENV_MAX_DEPTH) {
            config.max_depth = parse_env(ENV_MAX_DEPTH, &value)?;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> OrmResult<()> {
        if self.max_in_list_size == 0 {
            return Err(OrmError::configuration(
                "max_in_list_size must be greater than 0",
            ));
        }
        if self.max_depth == 0 {
            return Err(OrmError::configuration("max_depth must be greater than 0"));
        }
        Ok(())
    }
}

fn parse_env(name: &str, value: &str) -> OrmResult<usize> {
    value.trim().parse().map_err(|_| {
        OrmError::configuration(format!(
            "{} has invalid value '{}', expected a positive integer",
            name, value
        ))
    })
}

/// Connection pool settings for [`PostgresExecutor`](crate::backends::PostgresExecutor)
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    pub max_connections: u32,
    pub min_connections: u32,
    /// Seconds
    pub acquire_timeout: u64,
    pub idle_timeout: Option<u64>,
    pub max_lifetime: Option<u64>,
    pub test_before_acquire: bool,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: 10,
            min_connections: 1,
            acquire_timeout: 30,
            idle_timeout: Some(600),  // 10 minutes
            max_lifetime: Some(1800), // 30 minutes
            test_before_acquire: true,
        }
    }
}
