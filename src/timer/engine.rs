//! Timer engine: per-user timer states and their transitions

use std::{sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::{
    error::TimerError,
    services::{bounded, TaskStore, UserSettingsStore},
    state::{
        PomodoroSettings, PresetType, SessionType, TaskId, TaskSummary, TimerSnapshot, TimerState,
        UserId,
    },
    utils::Clock,
};

/// What happens to the countdown once a session is skipped or completes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum SkipPolicy {
    /// The next session waits for an explicit resume
    #[default]
    Pause,
    /// The next session starts counting immediately
    Resume,
}

/// Tunables for the engine
#[derive(Debug, Clone, Copy)]
pub struct EngineOptions {
    pub skip_policy: SkipPolicy,
    /// Upper bound on every collaborator call
    pub store_timeout: Duration,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            skip_policy: SkipPolicy::Pause,
            store_timeout: Duration::from_secs(3),
        }
    }
}

/// Result of looking at a user's timer
#[derive(Debug, Clone, PartialEq)]
pub enum Observation {
    /// Current state, recomputed
    Snapshot(TimerSnapshot),
    /// The running session just reached zero and has not been handled yet
    CompletionDue,
}

type TimerSlot = Arc<Mutex<Option<TimerState>>>;

/// Owns every active timer, keyed by user
///
/// Each user has its own async mutex; all reads that recompute and all
/// commands for one user are serialized through it, while different users
/// never contend on a shared lock.
pub struct TimerEngine {
    timers: DashMap<UserId, TimerSlot>,
    settings_store: Arc<dyn UserSettingsStore>,
    task_store: Arc<dyn TaskStore>,
    clock: Arc<dyn Clock>,
    options: EngineOptions,
}

impl TimerEngine {
    pub fn new(
        settings_store: Arc<dyn UserSettingsStore>,
        task_store: Arc<dyn TaskStore>,
        clock: Arc<dyn Clock>,
        options: EngineOptions,
    ) -> Self {
        Self {
            timers: DashMap::new(),
            settings_store,
            task_store,
            clock,
            options,
        }
    }

    pub fn options(&self) -> EngineOptions {
        self.options
    }

    fn slot(&self, user_id: &str) -> TimerSlot {
        self.timers.entry(user_id.to_string()).or_default().clone()
    }

    fn existing_slot(&self, user_id: &str) -> Option<TimerSlot> {
        self.timers.get(user_id).map(|slot| slot.clone())
    }

    /// Drop the user's slot once it is empty and nobody else holds it
    fn prune(&self, user_id: &str) {
        self.timers.remove_if(user_id, |_, slot| {
            Arc::strong_count(slot) == 1
                && slot.try_lock().map(|state| state.is_none()).unwrap_or(false)
        });
    }

    /// Run `f` against the user's timer under its lock, `None` if there is no timer
    async fn with_timer<R>(
        &self,
        user_id: &str,
        f: impl FnOnce(&mut TimerState, DateTime<Utc>) -> R,
    ) -> Option<R> {
        let slot = self.existing_slot(user_id)?;
        let mut guard = slot.lock().await;
        let state = guard.as_mut()?;
        let now = self.clock.now();
        Some(f(state, now))
    }

    /// Start (or restart) a running session for the user
    ///
    /// Any previous timer is replaced outright; only its round counter carries over.
    pub async fn start_timer(
        &self,
        user_id: &str,
        task_id: Option<TaskId>,
        session_type: SessionType,
        duration_seconds: f64,
        preset_type: PresetType,
        settings: Option<PomodoroSettings>,
    ) -> Result<(), TimerError> {
        let settings = settings.ok_or_else(|| TimerError::invalid("user settings are required"))?;
        if !duration_seconds.is_finite() || duration_seconds <= 0.0 {
            return Err(TimerError::invalid(format!(
                "duration must be a positive number of seconds, got {}",
                duration_seconds
            )));
        }

        let active_task = match task_id {
            Some(id) => self.fetch_summary(id).await,
            None => None,
        };

        let slot = self.slot(user_id);
        let mut guard = slot.lock().await;
        let round_number = guard.as_ref().map_or(1, |previous| previous.round_number);

        let now = self.clock.now();
        let mut state = TimerState::new(
            task_id,
            session_type,
            duration_seconds,
            preset_type,
            settings,
            now,
        );
        state.round_number = round_number;
        state.clamp_round();
        state.active_task = active_task;
        state.resume(now);

        info!(
            "Started {} session for user {} ({}s, preset {}, round {})",
            session_type, user_id, duration_seconds, preset_type, state.round_number
        );
        *guard = Some(state);
        Ok(())
    }

    /// Remove the user's timer, returning whether one existed
    pub async fn stop_timer(&self, user_id: &str) -> bool {
        let Some(slot) = self.existing_slot(user_id) else {
            return false;
        };
        let stopped = slot.lock().await.take().is_some();
        drop(slot);
        self.prune(user_id);

        if stopped {
            info!("Stopped timer for user {}", user_id);
        }
        stopped
    }

    pub async fn pause(&self, user_id: &str) -> bool {
        self.with_timer(user_id, |state, now| state.pause(now))
            .await
            .is_some()
    }

    pub async fn resume(&self, user_id: &str) -> bool {
        self.with_timer(user_id, |state, now| state.resume(now))
            .await
            .is_some()
    }

    /// Recomputed remaining seconds, `None` when the user has no timer
    pub async fn get_remaining_time(&self, user_id: &str) -> Option<u64> {
        self.with_timer(user_id, |state, now| state.remaining_time(now))
            .await
    }

    pub async fn has_timer(&self, user_id: &str) -> bool {
        match self.existing_slot(user_id) {
            Some(slot) => slot.lock().await.is_some(),
            None => false,
        }
    }

    /// Number of users with a timer; a slot busy with a command counts as active
    pub fn active_timer_count(&self) -> usize {
        self.timers
            .iter()
            .filter(|entry| {
                entry
                    .value()
                    .try_lock()
                    .map(|state| state.is_some())
                    .unwrap_or(true)
            })
            .count()
    }

    /// Force the current session to end and move to the next one
    pub async fn skip_to_next(&self, user_id: &str) -> bool {
        let Some(slot) = self.existing_slot(user_id) else {
            return false;
        };
        let mut guard = slot.lock().await;
        let Some(state) = guard.as_mut() else {
            return false;
        };

        debug!("Skipping {} session for user {}", state.session_type, user_id);
        self.finish_session(user_id, state).await;
        true
    }

    /// Transition after a running session reached zero
    ///
    /// Fires only for a pending completion edge; a timer that is already at
    /// zero and handled is left alone.
    pub async fn handle_session_completion(&self, user_id: &str) -> bool {
        let Some(slot) = self.existing_slot(user_id) else {
            return false;
        };
        let mut guard = slot.lock().await;
        let Some(state) = guard.as_mut() else {
            return false;
        };

        state.recompute(self.clock.now());
        if !state.take_completion() {
            return false;
        }

        info!("{} session completed for user {}", state.session_type, user_id);
        self.finish_session(user_id, state).await;
        true
    }

    /// Credit the task for a finished work session, then advance
    async fn finish_session(&self, user_id: &str, state: &mut TimerState) {
        state.time_remaining_seconds = 0.0;

        if state.session_type == SessionType::Work {
            if let Some(task_id) = state.task_id {
                self.credit_task(task_id, state.active_task.as_mut()).await;
            }
        }

        let keep_running = self.options.skip_policy == SkipPolicy::Resume;
        state.advance(self.clock.now(), keep_running);
        info!(
            "User {} moved to {} (round {}, {})",
            user_id,
            state.session_type,
            state.round_number,
            if state.is_paused { "paused" } else { "running" }
        );
    }

    async fn credit_task(&self, task_id: TaskId, cached: Option<&mut TaskSummary>) {
        let limit = self.options.store_timeout;
        match bounded(limit, self.task_store.increment_completed(task_id)).await {
            Ok(()) => {
                if let Some(task) = cached.filter(|task| task.id == task_id) {
                    task.completed_pomodoros += 1;
                }
            }
            Err(e) => warn!("Failed to credit pomodoro to task {}: {}", task_id, e),
        }
    }

    /// Back to round 1 of a paused work session, creating a timer if needed
    pub async fn reset_rounds(&self, user_id: &str) {
        let slot = self.slot(user_id);
        let mut guard = slot.lock().await;

        match guard.as_mut() {
            Some(state) => state.reset_rounds(self.clock.now()),
            None => {
                let settings = self.fetch_settings(user_id).await;
                *guard = Some(TimerState::fresh_work(
                    PresetType::Short,
                    settings,
                    self.clock.now(),
                ));
            }
        }
        info!("Reset rounds for user {}", user_id);
    }

    /// Switch the user's duration table for the current session
    pub async fn change_preset(&self, user_id: &str, preset_type: PresetType) -> bool {
        let changed = self
            .with_timer(user_id, |state, now| state.apply_preset(preset_type, now))
            .await
            .is_some();
        if changed {
            info!("User {} switched to {} preset", user_id, preset_type);
        }
        changed
    }

    /// Install new settings into the user's timer
    pub async fn refresh_user_settings(&self, user_id: &str, settings: PomodoroSettings) -> bool {
        self.with_timer(user_id, |state, _| state.apply_settings(settings))
            .await
            .is_some()
    }

    /// Recompute the user's timer and render it
    ///
    /// Reports a due completion instead of rendering the stale zero frame; the
    /// caller is expected to run [`TimerEngine::handle_session_completion`].
    ///
    /// The task summary is fetched without holding the user's lock, so a slow
    /// task store never delays that user's commands.
    pub async fn observe(&self, user_id: &str) -> Option<Observation> {
        let slot = self.existing_slot(user_id)?;

        let task_id = {
            let mut guard = slot.lock().await;
            let state = guard.as_mut()?;
            state.recompute(self.clock.now());
            if state.completion_pending() {
                return Some(Observation::CompletionDue);
            }
            match state.task_id {
                Some(task_id) => task_id,
                None => return Some(Observation::Snapshot(state.snapshot())),
            }
        };

        let limit = self.options.store_timeout;
        let summary = match bounded(limit, self.task_store.get_summary(task_id)).await {
            Ok(Some(summary)) => Some(summary),
            Ok(None) => {
                debug!("Task {} no longer exists", task_id);
                None
            }
            Err(e) => {
                warn!("Keeping cached summary for task {}: {}", task_id, e);
                None
            }
        };

        let mut guard = slot.lock().await;
        let state = guard.as_mut()?;
        state.recompute(self.clock.now());
        if state.completion_pending() {
            return Some(Observation::CompletionDue);
        }
        // the timer may have been restarted on another task meanwhile
        if let Some(summary) = summary.filter(|_| state.task_id == Some(task_id)) {
            state.active_task = Some(summary);
        }

        Some(Observation::Snapshot(state.snapshot()))
    }

    /// Settings from the collaborator, or defaults when it is unavailable
    pub async fn fetch_settings(&self, user_id: &str) -> PomodoroSettings {
        let limit = self.options.store_timeout;
        match bounded(limit, self.settings_store.get(user_id)).await {
            Ok(settings) => settings,
            Err(e) => {
                warn!("Using default settings for user {}: {}", user_id, e);
                PomodoroSettings::default()
            }
        }
    }

    async fn fetch_summary(&self, task_id: TaskId) -> Option<TaskSummary> {
        let limit = self.options.store_timeout;
        match bounded(limit, self.task_store.get_summary(task_id)).await {
            Ok(summary) => summary,
            Err(e) => {
                warn!("Failed to fetch task {}: {}", task_id, e);
                None
            }
        }
    }
}
