use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Level in the goal hierarchy: Big Goal → Medium-Term Goal → Daily Process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GoalType {
    #[serde(rename = "BIG")]
    Big,
    #[serde(rename = "MTG")]
    MediumTerm,
    #[serde(rename = "DP")]
    DailyProcess,
}

impl GoalType {
    pub const ALL: [GoalType; 3] = [GoalType::Big, GoalType::MediumTerm, GoalType::DailyProcess];

    /// Path segment used by the backend
    pub fn code(&self) -> &'static str {
        match self {
            GoalType::Big => "BIG",
            GoalType::MediumTerm => "MTG",
            GoalType::DailyProcess => "DP",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            GoalType::Big => "Big Goal",
            GoalType::MediumTerm => "Medium-Term Goal",
            GoalType::DailyProcess => "Daily Process",
        }
    }

    /// Goal type a parent must have, if any
    pub fn parent_type(&self) -> Option<GoalType> {
        match self {
            GoalType::Big => None,
            GoalType::MediumTerm => Some(GoalType::Big),
            GoalType::DailyProcess => Some(GoalType::MediumTerm),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Goal {
    pub id: String,
    #[serde(default)]
    pub parent: Option<String>,
    pub goal_type: GoalType,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category: String,
    pub start_date: NaiveDate,
    pub target_date: NaiveDate,
    #[serde(default)]
    pub metrics: serde_json::Value,
    #[serde(default)]
    pub is_completed: bool,
    #[serde(default)]
    pub completion_date: Option<NaiveDate>,
    #[serde(default)]
    pub children_count: u32,
    #[serde(default)]
    pub completion_percentage: f64,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Body for creating or replacing a goal.
#[derive(Debug, Clone, Serialize)]
pub struct GoalInput {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    pub goal_type: GoalType,
    pub title: String,
    pub description: String,
    pub category: String,
    pub start_date: NaiveDate,
    pub target_date: NaiveDate,
    pub metrics: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProcessProgress {
    pub id: String,
    pub process: String,
    #[serde(default)]
    pub process_title: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub parent_goal: Option<String>,
    #[serde(default)]
    pub is_completed: bool,
    #[serde(default)]
    pub time_spent_minutes: u32,
    #[serde(default)]
    pub completion_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub notes: String,
}

/// A day's tracked progress across processes and standards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyProgress {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub date: Option<NaiveDate>,
    #[serde(default)]
    pub process_progress: Vec<ProcessProgress>,
    #[serde(default)]
    pub standard_progress: Vec<serde_json::Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GoalCompletionResponse {
    #[serde(default)]
    pub total_goals: u32,
    #[serde(default)]
    pub completed_goals: u32,
    #[serde(default)]
    pub completion_rate: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct GoalStats {
    pub total_goals: u32,
    pub completed_goals: u32,
    /// Whole percent
    pub completion_rate: u32,
    pub chain_health: Option<serde_json::Value>,
}

impl GoalStats {
    pub fn from_responses(completion: GoalCompletionResponse, chain_health: serde_json::Value) -> Self {
        Self {
            total_goals: completion.total_goals,
            completed_goals: completion.completed_goals,
            completion_rate: completion.completion_rate.round().max(0.0) as u32,
            chain_health: Some(chain_health),
        }
    }
}
