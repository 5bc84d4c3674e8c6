//! Component lifecycle guards
//!
//! Every stateful component embeds a `Lifecycle` and checks it at the start
//! of its public lifecycle methods: configure exactly once (a repeat is a
//! warned no-op), activate only when enabled and configured, deactivate
//! unconditionally idempotent. Child cascading is a plain loop in the owning
//! component, children after self on the way up and in reverse order on the
//! way down.

use tracing::warn;

use crate::error::{DataSrvError, Result};

/// Explicit lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunState {
    /// Created, configuration hook not run yet
    #[default]
    Unconfigured,
    /// Configuration completed, not operating
    Configured,
    /// Activated and operating
    Active,
    /// Deactivated after having been active
    Inactive,
}

impl std::fmt::Display for RunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunState::Unconfigured => write!(f, "UNCONFIGURED"),
            RunState::Configured => write!(f, "CONFIGURED"),
            RunState::Active => write!(f, "ACTIVE"),
            RunState::Inactive => write!(f, "INACTIVE"),
        }
    }
}

/// Lifecycle guard state embedded in every configurable component
#[derive(Debug)]
pub struct Lifecycle {
    state: RunState,
    enabled: bool,
}

impl Lifecycle {
    pub fn new(enabled: bool) -> Self {
        Self {
            state: RunState::Unconfigured,
            enabled,
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn is_configured(&self) -> bool {
        !matches!(self.state, RunState::Unconfigured)
    }

    pub fn is_active(&self) -> bool {
        matches!(self.state, RunState::Active)
    }

    /// Guard for `configure`. Returns `Ok(true)` when the caller should run
    /// its configuration hooks, `Ok(false)` when already configured (warned
    /// no-op). Disabled components refuse to configure.
    pub fn start_configure(&mut self, id: &str) -> Result<bool> {
        if !self.enabled {
            return Err(DataSrvError::config(format!(
                "Component '{id}' is disabled"
            )));
        }
        if self.is_configured() {
            warn!("Component '{}' is already configured", id);
            return Ok(false);
        }
        self.state = RunState::Configured;
        Ok(true)
    }

    /// Guard for `activate`. Requires enabled and configured; idempotent.
    pub fn start_activate(&mut self, id: &str) -> Result<bool> {
        if !self.enabled {
            return Err(DataSrvError::config(format!(
                "Component '{id}' is disabled"
            )));
        }
        if !self.is_configured() {
            return Err(DataSrvError::config(format!(
                "Component '{id}' is not configured"
            )));
        }
        if self.is_active() {
            return Ok(false);
        }
        self.state = RunState::Active;
        Ok(true)
    }

    /// Guard for `deactivate`. Unconditionally idempotent and never fails;
    /// returns whether teardown hooks should run.
    pub fn start_deactivate(&mut self) -> bool {
        if self.is_active() {
            self.state = RunState::Inactive;
            true
        } else {
            false
        }
    }
}
