//! Consistency propagator: keeps the derived read models in step with
//! record changes.
//!
//! Triggers only invalidate; recomputation is pulled by readers. Per user, a
//! refresh lock serializes recomputes, so concurrent readers of a stale model
//! wait on the lock and then find the model fresh. A run computes every stale
//! model it needs from one consistent set of inputs, in refresh order
//! (role → gaps → dashboard). A result whose model was invalidated again
//! while the run was in flight is discarded and the run is repeated.
//!
//! The learning path has its own generation lock. Its advisor call runs with
//! the refresh lock released, so dashboard and gap reads never wait on it.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::advisor::{AdvisorGoal, GapAnalysis, LearningPathAdvisor, SuggestionSource};
use crate::dashboard::aggregator::{
    build_dashboard, DashboardInputs, DashboardView, ReadinessScore, RECENT_ACTIVITY_LIMIT,
};
use crate::dashboard::outcome::{DegradeReason, Outcome};
use crate::models::activity::ACTIVITY_PATH_GENERATED;
use crate::models::career::CareerGoal;
use crate::models::learning::{LearningPath, NewLearningPath, PathModule, PathResource};
use crate::models::skill::{Role, UserSkill};
use crate::propagation::table::{ModelKey, ModelStates, ModelTable, Trigger};
use crate::readiness::{compute_report, GapReport, SkillGap};
use crate::store::{note_activity, SkillRecordStore, StoreError};

/// Runs per read before a superseded result is served as stale.
const MAX_REFRESH_ATTEMPTS: u32 = 3;
/// Tracked users before idle ones are evicted.
pub const DEFAULT_USER_CAPACITY: usize = 10_000;
const SUPERSEDED_REASON: &str = "superseded by newer changes while refreshing";

/// A read-model value with its freshness.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot<T> {
    pub data: T,
    pub stale: bool,
    /// Generation the value was computed at.
    pub generation: u64,
    pub stale_reason: Option<String>,
}

impl<T> Snapshot<T> {
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Snapshot<U> {
        Snapshot {
            data: f(self.data),
            stale: self.stale,
            generation: self.generation,
            stale_reason: self.stale_reason,
        }
    }
}

/// The active goal and its resolved role. `role` is `None` when there is no
/// goal or the goal's role no longer exists.
#[derive(Debug, Clone, Default)]
pub struct RoleDetail {
    pub goal: Option<CareerGoal>,
    pub role: Option<Role>,
}

impl RoleDetail {
    fn advisor_goal(&self) -> AdvisorGoal {
        AdvisorGoal::from_goal(
            self.goal.as_ref(),
            self.role.as_ref().map(|r| r.title.as_str()),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SkillGapView {
    pub role_id: Option<Uuid>,
    pub role_title: Option<String>,
    pub overall_readiness: ReadinessScore,
    pub gaps: Vec<SkillGap>,
    pub degraded: Vec<DegradeReason>,
}

impl From<Outcome<GapReport>> for SkillGapView {
    fn from(outcome: Outcome<GapReport>) -> Self {
        let (report, degraded) = outcome.into_parts();
        let role_missing = degraded
            .iter()
            .any(|r| matches!(r, DegradeReason::RoleNotFound { .. }));
        Self {
            role_id: report.role_id,
            role_title: report.role_title,
            overall_readiness: if role_missing {
                ReadinessScore::Unknown
            } else {
                ReadinessScore::Known(report.overall_readiness)
            },
            gaps: report.gaps,
            degraded,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LearningPathView {
    pub path: Option<LearningPath>,
    /// Set when this refresh generated the path.
    pub source: Option<SuggestionSource>,
    pub fallback_reason: Option<String>,
}

#[derive(Default)]
struct ModelCache {
    role: Option<RoleDetail>,
    gaps: Option<Outcome<GapReport>>,
    dashboard: Option<DashboardView>,
    learning_path: Option<LearningPathView>,
}

#[derive(Default)]
struct UserModels {
    table: Mutex<ModelTable>,
    /// Refresh lock. Holds the last computed value of each model.
    cache: tokio::sync::Mutex<ModelCache>,
    /// Serializes learning-path generation.
    generating: tokio::sync::Mutex<()>,
}

impl UserModels {
    fn table(&self) -> MutexGuard<'_, ModelTable> {
        self.table.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

pub struct Propagator {
    store: Arc<dyn SkillRecordStore>,
    advisor: LearningPathAdvisor,
    auto_refresh_path: bool,
    user_capacity: usize,
    users: Mutex<HashMap<Uuid, Arc<UserModels>>>,
}

impl Propagator {
    pub fn new(
        store: Arc<dyn SkillRecordStore>,
        advisor: LearningPathAdvisor,
        auto_refresh_path: bool,
    ) -> Self {
        Self {
            store,
            advisor,
            auto_refresh_path,
            user_capacity: DEFAULT_USER_CAPACITY,
            users: Mutex::new(HashMap::new()),
        }
    }

    /// Caps the number of tracked users. Past the cap, users nobody is
    /// reading and with no pending path request are dropped; their models
    /// are recomputed on the next read.
    pub fn with_user_capacity(mut self, capacity: usize) -> Self {
        self.user_capacity = capacity.max(1);
        self
    }

    fn lock_users(&self) -> MutexGuard<'_, HashMap<Uuid, Arc<UserModels>>> {
        self.users.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn user_models(&self, user_id: Uuid) -> Arc<UserModels> {
        let mut users = self.lock_users();
        if let Some(models) = users.get(&user_id) {
            return Arc::clone(models);
        }
        if users.len() >= self.user_capacity {
            let before = users.len();
            users.retain(|_, models| {
                Arc::strong_count(models) > 1 || models.table().path_requested()
            });
            debug!("Evicted {} idle users", before - users.len());
            if users.len() >= self.user_capacity {
                warn!(
                    "All {} tracked users are busy; exceeding capacity {}",
                    users.len(),
                    self.user_capacity
                );
            }
        }
        Arc::clone(users.entry(user_id).or_default())
    }

    #[cfg(test)]
    fn is_tracked(&self, user_id: Uuid) -> bool {
        self.lock_users().contains_key(&user_id)
    }

    #[cfg(test)]
    fn tracked_users(&self) -> usize {
        self.lock_users().len()
    }

    /// Invalidates the models `trigger` affects. Returns the new generation.
    pub fn notify(&self, user_id: Uuid, trigger: &Trigger) -> u64 {
        let generation = self.user_models(user_id).table().apply(trigger);
        info!(
            "User {} trigger {:?} → generation {}, invalidated {:?}",
            user_id,
            trigger,
            generation,
            trigger.affected_models()
        );
        generation
    }

    /// `notify`, then refresh the learning path in the background when the
    /// trigger touched it and auto-refresh is on.
    pub fn dispatch(self: &Arc<Self>, user_id: Uuid, trigger: Trigger) -> u64 {
        let generation = self.notify(user_id, &trigger);
        let touches_path = trigger.affected_models().contains(&ModelKey::LearningPath);
        if self.auto_refresh_path && touches_path && trigger != Trigger::LearningPathRequested {
            let this = Arc::clone(self);
            tokio::spawn(async move {
                if let Err(e) = this.learning_path(user_id).await {
                    warn!("Background learning path refresh for user {user_id} failed: {e}");
                }
            });
        }
        generation
    }

    /// Reporting never starts tracking a user; an unknown user reports the
    /// initial all-stale table.
    pub fn model_states(&self, user_id: Uuid) -> ModelStates {
        match self.lock_users().get(&user_id) {
            Some(models) => models.table().report(),
            None => ModelTable::new().report(),
        }
    }

    /// A stale dashboard also lists the staleness among its degraded fields.
    pub async fn dashboard(&self, user_id: Uuid) -> Result<Snapshot<DashboardView>, StoreError> {
        let mut snapshot = self.read(user_id, ModelKey::Dashboard, pick_dashboard).await?;
        if let Some(detail) = snapshot.stale_reason.clone() {
            snapshot
                .data
                .degraded
                .push(DegradeReason::StaleData { detail });
        }
        Ok(snapshot)
    }

    pub async fn skill_gaps(&self, user_id: Uuid) -> Result<Snapshot<SkillGapView>, StoreError> {
        Ok(self
            .read(user_id, ModelKey::SkillGap, pick_gaps)
            .await?
            .map(SkillGapView::from))
    }

    /// Serves the learning path, regenerating it first when it is stale.
    /// Concurrent callers wait on the generation lock, not the refresh lock.
    pub async fn learning_path(
        &self,
        user_id: Uuid,
    ) -> Result<Snapshot<LearningPathView>, StoreError> {
        let models = self.user_models(user_id);
        let _generating = models.generating.lock().await;
        let mut failure: Option<StoreError> = None;

        for attempt in 1..=MAX_REFRESH_ATTEMPTS {
            if models.table().is_fresh(ModelKey::LearningPath) {
                break;
            }
            debug!("User {} refreshing learning path (attempt {})", user_id, attempt);
            let keep_superseded = attempt == MAX_REFRESH_ATTEMPTS;
            if let Err(e) = self
                .refresh_learning_path(user_id, &models, keep_superseded)
                .await
            {
                warn!("Learning path refresh for user {} failed: {}", user_id, e);
                models
                    .table()
                    .fail_pending(&[ModelKey::LearningPath], &e.to_string());
                failure = Some(e);
                break;
            }
        }

        let cache = models.cache.lock().await;
        serve(
            user_id,
            &models,
            ModelKey::LearningPath,
            pick_learning_path(&cache),
            failure,
        )
    }

    /// Advisor summary of the current gaps. The advisor runs after the
    /// refresh lock is released.
    pub async fn gap_analysis(&self, user_id: Uuid) -> Result<Snapshot<GapAnalysis>, StoreError> {
        let snapshot = self
            .read(user_id, ModelKey::SkillGap, pick_role_and_gaps)
            .await?;
        let (detail, gaps) = &snapshot.data;
        let analysis = self
            .advisor
            .analyze_skill_gap(&detail.advisor_goal(), &gaps.value().gaps)
            .await;
        Ok(snapshot.map(|_| analysis))
    }

    async fn read<T>(
        &self,
        user_id: Uuid,
        key: ModelKey,
        pick: fn(&ModelCache) -> Option<T>,
    ) -> Result<Snapshot<T>, StoreError> {
        let models = self.user_models(user_id);
        let mut cache = models.cache.lock().await;
        let mut failure: Option<StoreError> = None;

        for attempt in 1..=MAX_REFRESH_ATTEMPTS {
            let (keys, run_gen) = {
                let mut table = models.table();
                let keys = table.stale_for(key);
                if keys.is_empty() {
                    break;
                }
                let run_gen = table.begin_refresh(&keys);
                (keys, run_gen)
            };

            debug!(
                "User {} refreshing {:?} at generation {} (attempt {})",
                user_id, keys, run_gen, attempt
            );
            let keep_superseded = attempt == MAX_REFRESH_ATTEMPTS;
            if let Err(e) = self
                .refresh(user_id, &models, &mut cache, &keys, run_gen, keep_superseded)
                .await
            {
                warn!("Refresh of {:?} for user {} failed: {}", keys, user_id, e);
                models.table().fail_pending(&keys, &e.to_string());
                failure = Some(e);
                break;
            }
        }

        serve(user_id, &models, key, pick(&cache), failure)
    }

    /// One refresh run over `keys`, all computed from the inputs visible at
    /// `run_gen`.
    async fn refresh(
        &self,
        user_id: Uuid,
        models: &UserModels,
        cache: &mut ModelCache,
        keys: &[ModelKey],
        run_gen: u64,
        keep_superseded: bool,
    ) -> Result<(), StoreError> {
        let mut role = cache.role.clone().unwrap_or_default();
        let mut gaps = cache
            .gaps
            .clone()
            .unwrap_or_else(|| Outcome::Ok(GapReport::empty()));

        for &key in keys {
            match key {
                ModelKey::RoleDetail => {
                    role = self.load_role_detail(user_id).await?;
                    publish(models, key, run_gen, keep_superseded, &mut cache.role, role.clone());
                }
                ModelKey::SkillGap => {
                    let user_skills = self.store.get_user_skills(user_id).await?;
                    gaps = gap_outcome(user_id, &user_skills, &role);
                    publish(models, key, run_gen, keep_superseded, &mut cache.gaps, gaps.clone());
                }
                ModelKey::Dashboard => {
                    let view = self.build_dashboard_view(user_id, gaps.clone()).await?;
                    publish(models, key, run_gen, keep_superseded, &mut cache.dashboard, view);
                }
                // Generated by `learning_path` under its own lock.
                ModelKey::LearningPath => {}
            }
        }
        Ok(())
    }

    async fn load_role_detail(&self, user_id: Uuid) -> Result<RoleDetail, StoreError> {
        let goal = self.store.get_active_career_goal(user_id).await?;
        let role = match &goal {
            Some(goal) => self.store.get_role(goal.target_role_id).await?,
            None => None,
        };
        Ok(RoleDetail { goal, role })
    }

    async fn build_dashboard_view(
        &self,
        user_id: Uuid,
        gap_result: Outcome<GapReport>,
    ) -> Result<DashboardView, StoreError> {
        let store = self.store.as_ref();
        let (user_skills, progress, goals, activities, resources, active_path) = tokio::try_join!(
            store.get_user_skills(user_id),
            store.get_user_progress(user_id),
            store.get_career_goals(user_id),
            store.get_recent_activities(user_id, RECENT_ACTIVITY_LIMIT as i64),
            store.get_learning_resources(),
            store.get_active_learning_path(user_id),
        )?;

        Ok(build_dashboard(DashboardInputs {
            user_id,
            user_skills: &user_skills,
            progress: &progress,
            goals: &goals,
            activities: &activities,
            resources: &resources,
            active_path: active_path.as_ref(),
            gap_result,
        }))
    }

    /// Loads the active path, regenerating it first when explicitly requested
    /// or, with auto-refresh on, when it targets a different role than the
    /// active goal. The refresh lock is taken only to read the inputs and to
    /// publish the result.
    async fn refresh_learning_path(
        &self,
        user_id: Uuid,
        models: &UserModels,
        keep_superseded: bool,
    ) -> Result<(), StoreError> {
        let key = ModelKey::LearningPath;
        let run_gen = models.table().begin_refresh(&[key]);

        let inputs = self
            .read(user_id, ModelKey::SkillGap, pick_role_and_gaps)
            .await?;
        if let Some(reason) = inputs.stale_reason {
            return Err(StoreError::Unavailable(format!(
                "learning path inputs are stale: {reason}"
            )));
        }
        let (role, gaps) = inputs.data;

        let current = self.store.get_active_learning_path(user_id).await?;
        let requested = models.table().path_requested();
        let target_role_id = role.role.as_ref().map(|r| r.id);
        let role_moved = target_role_id.is_some()
            && current.as_ref().and_then(|p| p.target_role_id) != target_role_id;

        let view = if !requested && !(self.auto_refresh_path && role_moved) {
            LearningPathView {
                path: current,
                source: None,
                fallback_reason: None,
            }
        } else {
            let (catalog, progress) = tokio::try_join!(
                self.store.get_learning_resources(),
                self.store.get_user_progress(user_id),
            )?;
            let suggestion = self
                .advisor
                .suggest_path(&role.advisor_goal(), &gaps.value().gaps, &catalog)
                .await;

            // A trigger that landed while the advisor ran outdates the suggestion.
            if !keep_superseded && models.table().entry(key).invalidated_at > run_gen {
                models.table().complete(key, run_gen);
                debug!("Learning path suggestion from generation {run_gen} superseded");
                return Ok(());
            }

            let completed: HashSet<Uuid> = progress
                .iter()
                .filter(|p| p.completed)
                .map(|p| p.resource_id)
                .collect();
            let modules = suggestion
                .modules
                .iter()
                .map(|m| PathModule {
                    title: m.title.clone(),
                    resources: m
                        .resources
                        .iter()
                        .map(|r| PathResource {
                            resource_id: r.resource_id,
                            completed: completed.contains(&r.resource_id),
                        })
                        .collect(),
                })
                .collect();

            let path = self
                .store
                .create_learning_path(NewLearningPath {
                    user_id,
                    title: suggestion.title.clone(),
                    target_role_id,
                    modules,
                })
                .await?;
            {
                let mut table = models.table();
                table.clear_path_request(run_gen);
                // The dashboard's resource total follows the active path.
                table.invalidate(&[ModelKey::Dashboard]);
            }
            info!(
                "Stored learning path {} for user {} ({:?})",
                path.id, user_id, suggestion.source
            );
            note_activity(
                self.store.as_ref(),
                user_id,
                ACTIVITY_PATH_GENERATED,
                &format!(
                    "Generated learning path \"{}\" with {} resources",
                    path.title,
                    path.total_resources()
                ),
            )
            .await;

            LearningPathView {
                path: Some(path),
                source: Some(suggestion.source),
                fallback_reason: suggestion.fallback_reason,
            }
        };

        let mut cache = models.cache.lock().await;
        publish(models, key, run_gen, keep_superseded, &mut cache.learning_path, view);
        Ok(())
    }
}

/// Wraps the cached value of `key` with its freshness. Without a cached
/// value, the refresh failure (if any) surfaces.
fn serve<T>(
    user_id: Uuid,
    models: &UserModels,
    key: ModelKey,
    data: Option<T>,
    failure: Option<StoreError>,
) -> Result<Snapshot<T>, StoreError> {
    let table = models.table();
    let entry = table.entry(key);
    match data {
        Some(data) => {
            let stale = !entry.is_fresh();
            let stale_reason = stale.then(|| {
                entry
                    .last_error
                    .clone()
                    .unwrap_or_else(|| SUPERSEDED_REASON.to_string())
            });
            if stale {
                warn!("Serving stale {:?} for user {}", key, user_id);
            }
            Ok(Snapshot {
                data,
                stale,
                generation: entry.computed_at.unwrap_or(0),
                stale_reason,
            })
        }
        None => Err(failure.unwrap_or_else(|| {
            StoreError::Unavailable(format!("{key:?} has not been computed"))
        })),
    }
}

/// Stores `value` if the model is still current at `run_gen`, or if the
/// caller accepts a superseded value. Returns whether the model is fresh.
fn publish<T>(
    models: &UserModels,
    key: ModelKey,
    run_gen: u64,
    keep_superseded: bool,
    slot: &mut Option<T>,
    value: T,
) -> bool {
    let fresh = models.table().complete(key, run_gen);
    if fresh || keep_superseded {
        *slot = Some(value);
    }
    if !fresh {
        debug!("{key:?} result from generation {run_gen} superseded");
    }
    fresh
}

fn gap_outcome(
    user_id: Uuid,
    user_skills: &[UserSkill],
    detail: &RoleDetail,
) -> Outcome<GapReport> {
    match (&detail.goal, &detail.role) {
        (Some(goal), None) => {
            let reason = DegradeReason::RoleNotFound {
                role_id: goal.target_role_id,
            };
            warn!(
                "Goal {} of user {}: {}; readiness unknown",
                goal.id,
                user_id,
                reason.describe()
            );
            Outcome::degraded(compute_report(user_skills, None), reason)
        }
        (_, role) => Outcome::Ok(compute_report(user_skills, role.as_ref())),
    }
}

fn pick_dashboard(cache: &ModelCache) -> Option<DashboardView> {
    cache.dashboard.clone()
}

fn pick_gaps(cache: &ModelCache) -> Option<Outcome<GapReport>> {
    cache.gaps.clone()
}

fn pick_learning_path(cache: &ModelCache) -> Option<LearningPathView> {
    cache.learning_path.clone()
}

fn pick_role_and_gaps(cache: &ModelCache) -> Option<(RoleDetail, Outcome<GapReport>)> {
    Some((cache.role.clone()?, cache.gaps.clone()?))
}
