//! Restore strategy resolution.
//!
//! The resolver is a pure function of the strategy and the probed state of
//! one entity. Dry runs and live runs call the same function with the same
//! probe result, so a preview always names the action a live run takes.

use serde::{Deserialize, Serialize};

use crate::backup::{RestoreStrategy, StepResult};

/// Whether an entity with the same ID is already present at the destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Existence {
    Absent,
    Present,
}

impl Existence {
    pub fn from_found(found: bool) -> Self {
        if found {
            Self::Present
        } else {
            Self::Absent
        }
    }
}

/// What a restore does with one parsed entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RestoreAction {
    Create,
    Update,
    Skip,
}

impl RestoreAction {
    /// Step result recorded for this action once it has been applied.
    pub fn step_result(&self) -> StepResult {
        match self {
            Self::Create | Self::Update => StepResult::Success,
            Self::Skip => StepResult::Skipped,
        }
    }

    /// Reason text for the entity's step.
    pub fn describe(&self, dry_run: bool) -> &'static str {
        match (self, dry_run) {
            (Self::Create, false) => "Created",
            (Self::Update, false) => "Updated",
            (Self::Skip, false) => "Skipped: already exists",
            (Self::Create, true) => "Would create",
            (Self::Update, true) => "Would update",
            (Self::Skip, true) => "Would skip: already exists",
        }
    }

    /// Whether applying the action writes to a registry.
    pub fn mutates(&self) -> bool {
        !matches!(self, Self::Skip)
    }
}

/// Decide the action for one entity.
///
/// | strategy       | absent | present |
/// |----------------|--------|---------|
/// | `full_replace` | create | create  |
/// | `merge_add`    | create | skip    |
/// | `merge_update` | create | update  |
///
/// Full replace clears the destination before any entity is resolved, so
/// `Present` only reaches it for IDs the clear could not remove; those still
/// resolve to create and surface as per-item conflicts.
pub fn resolve(strategy: RestoreStrategy, existence: Existence) -> RestoreAction {
    match (strategy, existence) {
        (RestoreStrategy::FullReplace, _) => RestoreAction::Create,
        (RestoreStrategy::MergeAdd, Existence::Absent) => RestoreAction::Create,
        (RestoreStrategy::MergeAdd, Existence::Present) => RestoreAction::Skip,
        (RestoreStrategy::MergeUpdate, Existence::Absent) => RestoreAction::Create,
        (RestoreStrategy::MergeUpdate, Existence::Present) => RestoreAction::Update,
    }
}

/// Whether the strategy empties the destination before importing.
pub fn clears_destination(strategy: RestoreStrategy) -> bool {
    strategy == RestoreStrategy::FullReplace
}
