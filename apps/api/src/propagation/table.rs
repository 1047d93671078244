//! Per-user read-model state table.
//!
//! Every trigger bumps the user's generation and stamps the affected models
//! with it. A model is fresh when it was last computed at or after the
//! generation that last invalidated it. Nothing here awaits; the table sits
//! behind a plain mutex and is never held across an await point.

use std::collections::BTreeMap;

use serde::Serialize;
use uuid::Uuid;

/// Derived read models, in refresh order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKey {
    RoleDetail,
    SkillGap,
    Dashboard,
    LearningPath,
}

impl ModelKey {
    pub const ALL: [ModelKey; 4] = [
        ModelKey::RoleDetail,
        ModelKey::SkillGap,
        ModelKey::Dashboard,
        ModelKey::LearningPath,
    ];

    /// Models that must be fresh before this one can be computed.
    pub fn dependencies(self) -> &'static [ModelKey] {
        match self {
            ModelKey::RoleDetail => &[],
            ModelKey::SkillGap => &[ModelKey::RoleDetail],
            ModelKey::Dashboard | ModelKey::LearningPath => {
                &[ModelKey::RoleDetail, ModelKey::SkillGap]
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelState {
    Fresh,
    Stale,
    Refreshing,
}

/// A change to a user's records that invalidates derived models.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Trigger {
    TargetRoleChanged,
    SkillLevelChanged,
    ProgressChanged,
    CareerGoalChanged {
        previous_role_id: Option<Uuid>,
        new_role_id: Option<Uuid>,
    },
    LearningPathRequested,
}

const ROLE_CHANGE: &[ModelKey] = &[
    ModelKey::RoleDetail,
    ModelKey::SkillGap,
    ModelKey::Dashboard,
    ModelKey::LearningPath,
];

impl Trigger {
    pub fn affected_models(&self) -> &'static [ModelKey] {
        match self {
            Trigger::TargetRoleChanged => ROLE_CHANGE,
            // The learning path is kept across skill updates.
            Trigger::SkillLevelChanged => &[ModelKey::SkillGap, ModelKey::Dashboard],
            Trigger::ProgressChanged => &[ModelKey::Dashboard],
            Trigger::CareerGoalChanged {
                previous_role_id,
                new_role_id,
            } => {
                if previous_role_id != new_role_id {
                    ROLE_CHANGE
                } else {
                    &[ModelKey::Dashboard]
                }
            }
            Trigger::LearningPathRequested => &[ModelKey::LearningPath],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelEntry {
    pub state: ModelState,
    pub invalidated_at: u64,
    pub computed_at: Option<u64>,
    pub last_error: Option<String>,
}

impl Default for ModelEntry {
    fn default() -> Self {
        Self {
            state: ModelState::Stale,
            invalidated_at: 0,
            computed_at: None,
            last_error: None,
        }
    }
}

impl ModelEntry {
    pub fn is_fresh(&self) -> bool {
        self.computed_at
            .map(|at| at >= self.invalidated_at)
            .unwrap_or(false)
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelStatus {
    pub model: ModelKey,
    #[serde(flatten)]
    pub entry: ModelEntry,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelStates {
    pub generation: u64,
    pub models: Vec<ModelStatus>,
}

#[derive(Debug)]
pub struct ModelTable {
    generation: u64,
    entries: BTreeMap<ModelKey, ModelEntry>,
    /// Generation of the pending explicit path request, if any.
    path_requested_at: Option<u64>,
}

impl Default for ModelTable {
    fn default() -> Self {
        Self::new()
    }
}

impl ModelTable {
    pub fn new() -> Self {
        Self {
            generation: 0,
            entries: ModelKey::ALL
                .iter()
                .map(|key| (*key, ModelEntry::default()))
                .collect(),
            path_requested_at: None,
        }
    }

    pub fn entry(&self, key: ModelKey) -> &ModelEntry {
        &self.entries[&key]
    }

    fn entry_mut(&mut self, key: ModelKey) -> &mut ModelEntry {
        self.entries.entry(key).or_default()
    }

    pub fn is_fresh(&self, key: ModelKey) -> bool {
        self.entry(key).is_fresh()
    }

    /// Records a trigger and returns the new generation.
    pub fn apply(&mut self, trigger: &Trigger) -> u64 {
        let generation = self.invalidate(trigger.affected_models());
        if *trigger == Trigger::LearningPathRequested {
            self.path_requested_at = Some(generation);
        }
        generation
    }

    pub fn invalidate(&mut self, keys: &[ModelKey]) -> u64 {
        self.generation += 1;
        let generation = self.generation;
        for key in keys {
            let entry = self.entry_mut(*key);
            entry.invalidated_at = generation;
            // A running refresh keeps its state; its result is checked on arrival.
            if entry.state != ModelState::Refreshing {
                entry.state = ModelState::Stale;
            }
        }
        generation
    }

    /// `key` and its dependencies that need recomputing, in refresh order.
    pub fn stale_for(&self, key: ModelKey) -> Vec<ModelKey> {
        ModelKey::ALL
            .iter()
            .copied()
            .filter(|k| *k == key || key.dependencies().contains(k))
            .filter(|k| !self.is_fresh(*k))
            .collect()
    }

    /// Marks `keys` as refreshing and returns the generation the run is based on.
    pub fn begin_refresh(&mut self, keys: &[ModelKey]) -> u64 {
        for key in keys {
            self.entry_mut(*key).state = ModelState::Refreshing;
        }
        self.generation
    }

    /// Publishes a result computed at `run_gen`. Returns false, leaving the
    /// model stale, when a newer trigger invalidated it mid-run.
    pub fn complete(&mut self, key: ModelKey, run_gen: u64) -> bool {
        let entry = self.entry_mut(key);
        if entry.invalidated_at > run_gen {
            entry.state = ModelState::Stale;
            return false;
        }
        entry.computed_at = Some(run_gen);
        entry.state = ModelState::Fresh;
        entry.last_error = None;
        true
    }

    /// Returns models still marked refreshing to stale, recording the error.
    pub fn fail_pending(&mut self, keys: &[ModelKey], error: &str) {
        for key in keys {
            let entry = self.entry_mut(*key);
            if entry.state == ModelState::Refreshing {
                entry.state = ModelState::Stale;
                entry.last_error = Some(error.to_string());
            }
        }
    }

    pub fn path_requested(&self) -> bool {
        self.path_requested_at.is_some()
    }

    /// Clears the path request if the run at `run_gen` has served it.
    pub fn clear_path_request(&mut self, run_gen: u64) {
        if self.path_requested_at.map(|at| at <= run_gen).unwrap_or(false) {
            self.path_requested_at = None;
        }
    }

    pub fn report(&self) -> ModelStates {
        ModelStates {
            generation: self.generation,
            models: self
                .entries
                .iter()
                .map(|(model, entry)| ModelStatus {
                    model: *model,
                    entry: entry.clone(),
                })
                .collect(),
        }
    }
}
