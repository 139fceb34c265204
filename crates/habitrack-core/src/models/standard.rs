use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Category name used for standards without one
pub const UNCATEGORIZED: &str = "Uncategorized";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    Daily,
    Weekly,
    Monthly,
    Custom,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StandardCategory {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub is_default: bool,
    #[serde(default)]
    pub order: i32,
}

#[derive(Debug, Clone, Serialize)]
pub struct CategoryInput {
    pub name: String,
    pub description: String,
    pub order: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Standard {
    pub id: String,
    #[serde(default)]
    pub category: Option<StandardCategory>,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub minimum_requirement: String,
    #[serde(default)]
    pub success_criteria: Vec<String>,
    pub frequency: Frequency,
    #[serde(default)]
    pub specific_days: Option<Vec<u8>>,
    #[serde(default)]
    pub time_of_day: Option<String>,
    #[serde(default)]
    pub duration_minutes: Option<u32>,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

fn default_true() -> bool {
    true
}

impl Standard {
    pub fn category_name(&self) -> &str {
        self.category
            .as_ref()
            .map(|c| c.name.as_str())
            .unwrap_or(UNCATEGORIZED)
    }
}

/// Body for creating or replacing a standard.
#[derive(Debug, Clone, Serialize)]
pub struct StandardInput {
    pub category_id: String,
    pub title: String,
    pub description: String,
    pub minimum_requirement: String,
    pub success_criteria: Vec<String>,
    pub frequency: Frequency,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub specific_days: Option<Vec<u8>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_of_day: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_minutes: Option<u32>,
    pub is_active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StandardProgress {
    pub id: String,
    pub standard: String,
    #[serde(default)]
    pub standard_title: Option<String>,
    #[serde(default)]
    pub category_name: Option<String>,
    #[serde(default)]
    pub frequency: Option<Frequency>,
    #[serde(default)]
    pub is_completed: bool,
    #[serde(default)]
    pub completion_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub notes: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CompletionRateResponse {
    #[serde(default)]
    pub completion_rate: f64,
    #[serde(default)]
    pub current_streak: u32,
    #[serde(default)]
    pub total_standards: u32,
    #[serde(default)]
    pub completed_standards: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct StandardStats {
    /// Whole percent
    pub completion_rate: u32,
    pub current_streak: u32,
    pub total_standards: u32,
    pub completed_standards: u32,
}

impl From<CompletionRateResponse> for StandardStats {
    fn from(r: CompletionRateResponse) -> Self {
        Self {
            completion_rate: r.completion_rate.round().max(0.0) as u32,
            current_streak: r.current_streak,
            total_standards: r.total_standards,
            completed_standards: r.completed_standards,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_standard_without_category() {
        let json = r#"{"id": "s1", "category": null, "title": "Read", "frequency": "daily"}"#;
        let standard: Standard = serde_json::from_str(json).unwrap();
        assert_eq!(standard.category_name(), UNCATEGORIZED);
        assert!(standard.is_active);
        assert_eq!(standard.frequency, Frequency::Daily);
    }

    #[test]
    fn test_stats_from_response() {
        let response: CompletionRateResponse = serde_json::from_str(
            r#"{"completion_rate": 82.4, "current_streak": 5, "total_standards": 10, "completed_standards": 8}"#,
        )
        .unwrap();
        let stats = StandardStats::from(response);
        assert_eq!(stats.completion_rate, 82);
        assert_eq!(stats.current_streak, 5);
    }
}
