use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Points at the first level boundary; the boundary after level `n` is
/// `n² × LEVEL_POINTS_BASE`.
pub const LEVEL_POINTS_BASE: u64 = 100;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GameProfile {
    #[serde(default)]
    pub total_points: u64,
    #[serde(default = "default_level")]
    pub level: u32,
    #[serde(default)]
    pub current_streak: u32,
    #[serde(default)]
    pub longest_streak: u32,
    #[serde(default)]
    pub last_activity_date: Option<NaiveDate>,
}

fn default_level() -> u32 {
    1
}

impl Default for GameProfile {
    fn default() -> Self {
        Self {
            total_points: 0,
            level: 1,
            current_streak: 0,
            longest_streak: 0,
            last_activity_date: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Achievement {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub points: u32,
    #[serde(default)]
    pub icon: String,
    #[serde(default)]
    pub achievement_type: String,
    #[serde(default)]
    pub required_count: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserAchievement {
    pub id: String,
    pub achievement: Achievement,
    pub unlocked_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PointTransaction {
    pub id: String,
    pub points: i64,
    pub transaction_type: String,
    #[serde(default)]
    pub reference_id: Option<String>,
    #[serde(default)]
    pub reference_type: Option<String>,
    #[serde(default = "default_multiplier")]
    pub streak_multiplier: f64,
    #[serde(default)]
    pub description: String,
    pub created_at: DateTime<Utc>,
}

fn default_multiplier() -> f64 {
    1.0
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GamificationStats {
    #[serde(default)]
    pub profile: GameProfile,
    #[serde(default)]
    pub recent_achievements: Vec<UserAchievement>,
    #[serde(default)]
    pub recent_transactions: Vec<PointTransaction>,
    #[serde(default = "default_next_level_points")]
    pub next_level_points: u64,
    #[serde(default)]
    pub progress_to_next_level: f64,
}

fn default_next_level_points() -> u64 {
    LEVEL_POINTS_BASE
}

impl Default for GamificationStats {
    fn default() -> Self {
        Self {
            profile: GameProfile::default(),
            recent_achievements: Vec::new(),
            recent_transactions: Vec::new(),
            next_level_points: LEVEL_POINTS_BASE,
            progress_to_next_level: 0.0,
        }
    }
}

impl GamificationStats {
    /// Points still needed to reach the next level
    pub fn points_remaining(&self) -> u64 {
        self.next_level_points.saturating_sub(self.profile.total_points)
    }
}
