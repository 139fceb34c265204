use chrono::NaiveDate;
use serde_json::json;
use tracing::debug;

use crate::api::{ApiClient, ApiError};
use crate::models::{
    DailyProgress, Goal, GoalCompletionResponse, GoalInput, GoalStats, GoalType, ListResponse,
    ProcessProgress,
};

use super::{record_error, replace_by_id, today};

const GOALS_PATH: &str = "/goals/";
const GOAL_COMPLETION_PATH: &str = "/goals/analytics/goal-completion/";
const GOAL_CHAIN_HEALTH_PATH: &str = "/goals/analytics/goal-chain-health/";

fn goal_path(id: &str) -> String {
    format!("/goals/{}/", id)
}

fn goals_by_type_path(goal_type: GoalType) -> String {
    format!("/goals/type/{}/", goal_type.code())
}

fn daily_progress_path(date: NaiveDate) -> String {
    format!("/goals/daily-progress/date/{}/", date.format("%Y-%m-%d"))
}

fn process_progress_path(id: &str) -> String {
    format!("/goals/process-progress/{}/", id)
}

/// Goals split by hierarchy level.
#[derive(Debug, Clone, Default)]
pub struct GoalsByType {
    pub big: Vec<Goal>,
    pub medium_term: Vec<Goal>,
    pub daily_processes: Vec<Goal>,
}

impl GoalsByType {
    pub fn of_type(&self, goal_type: GoalType) -> &[Goal] {
        match goal_type {
            GoalType::Big => &self.big,
            GoalType::MediumTerm => &self.medium_term,
            GoalType::DailyProcess => &self.daily_processes,
        }
    }

    fn of_type_mut(&mut self, goal_type: GoalType) -> &mut Vec<Goal> {
        match goal_type {
            GoalType::Big => &mut self.big,
            GoalType::MediumTerm => &mut self.medium_term,
            GoalType::DailyProcess => &mut self.daily_processes,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Goal> {
        self.big
            .iter()
            .chain(self.medium_term.iter())
            .chain(self.daily_processes.iter())
    }

    /// Put a goal returned by the backend where it belongs, replacing any
    /// previous version (also one filed under a different level).
    fn upsert(&mut self, goal: Goal) {
        let goal_type = goal.goal_type;
        let id = goal.id.clone();
        for other in GoalType::ALL.into_iter().filter(|t| *t != goal_type) {
            self.of_type_mut(other).retain(|g| g.id != id);
        }
        let list = self.of_type_mut(goal_type);
        if !replace_by_id(list, &id, goal.clone(), |g| g.id.as_str()) {
            list.push(goal);
        }
    }
}

pub struct GoalsStore {
    api: ApiClient,
    pub goals: GoalsByType,
    pub daily_progress: Vec<ProcessProgress>,
    pub stats: GoalStats,
    pub loading: bool,
    pub error: Option<String>,
}

impl GoalsStore {
    pub fn new(api: ApiClient) -> Self {
        Self {
            api,
            goals: GoalsByType::default(),
            daily_progress: Vec::new(),
            stats: GoalStats::default(),
            loading: false,
            error: None,
        }
    }

    // ===== Getters =====

    pub fn big_goals(&self) -> &[Goal] {
        &self.goals.big
    }

    pub fn medium_term_goals(&self) -> &[Goal] {
        &self.goals.medium_term
    }

    pub fn daily_processes(&self) -> &[Goal] {
        &self.goals.daily_processes
    }

    pub fn goal_by_id(&self, id: &str) -> Option<&Goal> {
        self.goals.iter().find(|g| g.id == id)
    }

    /// Medium-term goals and daily processes whose parent is `parent_id`
    pub fn child_goals(&self, parent_id: &str) -> Vec<&Goal> {
        self.goals
            .medium_term
            .iter()
            .chain(self.goals.daily_processes.iter())
            .filter(|g| g.parent.as_deref() == Some(parent_id))
            .collect()
    }

    pub fn active_goals(&self) -> Vec<&Goal> {
        self.goals.iter().filter(|g| !g.is_completed).collect()
    }

    pub fn today_process_progress(&self, process_id: &str) -> Option<&ProcessProgress> {
        self.daily_progress.iter().find(|p| p.process == process_id)
    }

    pub fn clear_error(&mut self) {
        self.error = None;
    }

    // ===== Actions =====

    /// Fetch all three hierarchy levels in parallel.
    pub async fn fetch_all_goals(&mut self) -> Result<(), ApiError> {
        self.loading = true;
        let big_path = goals_by_type_path(GoalType::Big);
        let mtg_path = goals_by_type_path(GoalType::MediumTerm);
        let dp_path = goals_by_type_path(GoalType::DailyProcess);

        let result = futures::try_join!(
            self.api.get::<ListResponse<Goal>>(&big_path),
            self.api.get::<ListResponse<Goal>>(&mtg_path),
            self.api.get::<ListResponse<Goal>>(&dp_path),
        );
        self.loading = false;

        let (big, medium_term, daily_processes) =
            record_error(&mut self.error, result, "Failed to fetch goals")?;
        self.goals = GoalsByType {
            big: big.into_vec(),
            medium_term: medium_term.into_vec(),
            daily_processes: daily_processes.into_vec(),
        };
        debug!(
            big = self.goals.big.len(),
            medium_term = self.goals.medium_term.len(),
            daily_processes = self.goals.daily_processes.len(),
            "Fetched goals"
        );
        Ok(())
    }

    pub async fn create_goal(&mut self, input: &GoalInput) -> Result<Goal, ApiError> {
        self.loading = true;
        let result = self.api.post::<Goal, _>(GOALS_PATH, input).await;
        self.loading = false;

        let goal = record_error(&mut self.error, result, "Failed to create goal")?;
        self.goals.of_type_mut(goal.goal_type).push(goal.clone());
        Ok(goal)
    }

    pub async fn update_goal(&mut self, goal_id: &str, input: &GoalInput) -> Result<Goal, ApiError> {
        self.loading = true;
        let result = self.api.put::<Goal, _>(&goal_path(goal_id), input).await;
        self.loading = false;

        let goal = record_error(&mut self.error, result, "Failed to update goal")?;
        self.goals.upsert(goal.clone());
        Ok(goal)
    }

    /// Mark a goal completed as of today, then refresh the analytics.
    pub async fn complete_goal(&mut self, goal_id: &str) -> Result<Goal, ApiError> {
        let body = json!({
            "is_completed": true,
            "completion_date": today().format("%Y-%m-%d").to_string(),
        });
        let result = self.api.patch::<Goal, _>(&goal_path(goal_id), &body).await;
        let goal = record_error(&mut self.error, result, "Failed to complete goal")?;
        self.goals.upsert(goal.clone());

        self.fetch_stats().await?;
        Ok(goal)
    }

    pub async fn fetch_today_progress(&mut self) -> Result<(), ApiError> {
        self.fetch_progress_for(today()).await
    }

    pub async fn fetch_progress_for(&mut self, date: NaiveDate) -> Result<(), ApiError> {
        self.loading = true;
        let result = self.api.get::<DailyProgress>(&daily_progress_path(date)).await;
        self.loading = false;

        let progress = record_error(&mut self.error, result, "Failed to fetch today's progress")?;
        debug!(date = %date, processes = progress.process_progress.len(), "Fetched daily progress");
        self.daily_progress = progress.process_progress;
        Ok(())
    }

    pub async fn toggle_process_completion(
        &mut self,
        progress_id: &str,
        is_completed: bool,
        time_spent_minutes: Option<u32>,
    ) -> Result<ProcessProgress, ApiError> {
        let mut body = json!({ "is_completed": is_completed });
        if let Some(minutes) = time_spent_minutes {
            body["time_spent_minutes"] = json!(minutes);
        }

        let result = self
            .api
            .patch::<ProcessProgress, _>(&process_progress_path(progress_id), &body)
            .await;
        let progress = record_error(&mut self.error, result, "Failed to update progress")?;
        replace_by_id(&mut self.daily_progress, progress_id, progress.clone(), |p| p.id.as_str());

        self.fetch_stats().await?;
        Ok(progress)
    }

    pub async fn fetch_stats(&mut self) -> Result<(), ApiError> {
        let result = futures::try_join!(
            self.api.get::<GoalCompletionResponse>(GOAL_COMPLETION_PATH),
            self.api.get::<serde_json::Value>(GOAL_CHAIN_HEALTH_PATH),
        );
        let (completion, chain_health) = record_error(&mut self.error, result, "Failed to fetch stats")?;
        self.stats = GoalStats::from_responses(completion, chain_health);
        Ok(())
    }
}
