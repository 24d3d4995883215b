/*!
Schema migrations for persisted state and the resolver that decides which of
them to run.

A snapshot is saved together with a ledger: the names of the migrations that
had been applied to it. On load, the ledger is reconciled against the
currently configured migration list by positional prefix. Everything after the
first divergence is reverted (newest first) and the configured list is then
replayed forward from that point.
*/

use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use crate::{PhoenixError, Result};

/// A forward or reverse migration function.
pub type MigrationFn = Arc<dyn Fn(Value) -> Result<Value> + Send + Sync>;

/// A named migration with optional forward (`up`) and reverse (`down`) steps.
///
/// A migration without a name or an `up` step is never applied, and one
/// without a name or a `down` step is never reverted.
#[derive(Clone, Default)]
pub struct Migration {
    pub name: Option<String>,
    pub up: Option<MigrationFn>,
    pub down: Option<MigrationFn>,
}

impl Migration {
    /// Create a named migration with no steps yet.
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self {
            name: Some(name.into()),
            up: None,
            down: None,
        }
    }

    /// Set the forward step
    pub fn with_up<F>(mut self, up: F) -> Self
    where
        F: Fn(Value) -> Result<Value> + Send + Sync + 'static,
    {
        self.up = Some(Arc::new(up));
        self
    }

    /// Set the reverse step
    pub fn with_down<F>(mut self, down: F) -> Self
    where
        F: Fn(Value) -> Result<Value> + Send + Sync + 'static,
    {
        self.down = Some(Arc::new(down));
        self
    }

    fn applicable(&self) -> Option<(&str, &MigrationFn)> {
        Some((self.name.as_deref()?, self.up.as_ref()?))
    }

    fn revertible(&self) -> Option<(&str, &MigrationFn)> {
        Some((self.name.as_deref()?, self.down.as_ref()?))
    }
}

impl fmt::Debug for Migration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Migration")
            .field("name", &self.name)
            .field("up", &self.up.is_some())
            .field("down", &self.down.is_some())
            .finish()
    }
}

/// Which way a resolved step moves the state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
}

/// A migration function selected by [`migrations_to_run`].
#[derive(Clone)]
pub struct MigrationStep {
    pub name: String,
    pub direction: Direction,
    run: MigrationFn,
}

impl MigrationStep {
    /// Run this step against `state`.
    pub fn apply(&self, state: Value) -> Result<Value> {
        (self.run)(state)
    }
}

impl fmt::Debug for MigrationStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MigrationStep")
            .field("name", &self.name)
            .field("direction", &self.direction)
            .finish()
    }
}

/// Names of the configured migrations that can be applied, in order.
///
/// This is the ledger written alongside every save.
pub fn applied_ledger(migrations: &[Migration]) -> Vec<String> {
    migrations
        .iter()
        .filter_map(Migration::applicable)
        .map(|(name, _)| name.to_string())
        .collect()
}

/// Resolve the steps needed to bring a snapshot with ledger `applied` up to
/// date with `migrations`.
///
/// Reverts come first, newest applied first, followed by forward steps.
/// Ledger entries with no matching revertible definition are skipped.
pub fn migrations_to_run(applied: &[String], migrations: &[Migration]) -> Vec<MigrationStep> {
    let to_apply: Vec<(&str, &MigrationFn)> =
        migrations.iter().filter_map(Migration::applicable).collect();

    let number_applied = applied
        .iter()
        .zip(&to_apply)
        .take_while(|(applied_name, (name, _))| applied_name.as_str() == *name)
        .count();

    let reverts = applied[number_applied..].iter().rev().filter_map(|name| {
        let found = migrations
            .iter()
            .find(|migration| migration.name.as_deref() == Some(name.as_str()))?;
        let (name, down) = found.revertible()?;
        Some(MigrationStep {
            name: name.to_string(),
            direction: Direction::Down,
            run: Arc::clone(down),
        })
    });

    let runs = to_apply[number_applied..]
        .iter()
        .map(|(name, up)| MigrationStep {
            name: name.to_string(),
            direction: Direction::Up,
            run: Arc::clone(up),
        });

    let steps: Vec<MigrationStep> = reverts.chain(runs).collect();
    debug!(
        number_applied,
        steps = steps.len(),
        "Resolved migrations to run"
    );
    steps
}

/// Fold `steps` over `state` left to right, stopping at the first failure.
pub fn run_migrations(steps: &[MigrationStep], state: Value) -> Result<Value> {
    steps.iter().try_fold(state, |state, step| {
        debug!(migration = %step.name, direction = ?step.direction, "Running migration");
        step.apply(state).map_err(|e| match e {
            PhoenixError::Migration { .. } => e,
            other => PhoenixError::migration(step.name.clone(), other.to_string()),
        })
    })
}
