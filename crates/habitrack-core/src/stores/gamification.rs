use crate::api::{ApiClient, ApiError};
use crate::models::{Achievement, GamificationStats, ListResponse, PointTransaction, UserAchievement};

use super::record_error;

const STATS_PATH: &str = "/gamification/stats/";
const ACHIEVEMENTS_PATH: &str = "/gamification/achievements/";
const AVAILABLE_ACHIEVEMENTS_PATH: &str = "/gamification/achievements/available/";

/// Default look-back window for point history
pub const DEFAULT_HISTORY_DAYS: u32 = 30;

fn point_history_path(days: u32) -> String {
    format!("/gamification/points/history/?days={}", days)
}

pub struct GamificationStore {
    api: ApiClient,
    pub stats: GamificationStats,
    /// Unlocked achievements, most recent first
    pub achievements: Vec<UserAchievement>,
    /// Achievements not yet unlocked
    pub available_achievements: Vec<Achievement>,
    pub loading: bool,
    pub error: Option<String>,
}

impl GamificationStore {
    pub fn new(api: ApiClient) -> Self {
        Self {
            api,
            stats: GamificationStats::default(),
            achievements: Vec::new(),
            available_achievements: Vec::new(),
            loading: false,
            error: None,
        }
    }

    pub fn clear_error(&mut self) {
        self.error = None;
    }

    pub async fn fetch_stats(&mut self) -> Result<(), ApiError> {
        self.loading = true;
        let result = self.api.get::<GamificationStats>(STATS_PATH).await;
        self.loading = false;

        self.stats = record_error(&mut self.error, result, "Failed to fetch gamification stats")?;
        Ok(())
    }

    pub async fn fetch_achievements(&mut self) -> Result<(), ApiError> {
        self.loading = true;
        let result = futures::try_join!(
            self.api.get::<ListResponse<UserAchievement>>(ACHIEVEMENTS_PATH),
            self.api.get::<ListResponse<Achievement>>(AVAILABLE_ACHIEVEMENTS_PATH),
        );
        self.loading = false;

        let (unlocked, available) = record_error(&mut self.error, result, "Failed to fetch achievements")?;
        self.achievements = unlocked.into_vec();
        self.available_achievements = available.into_vec();
        Ok(())
    }

    /// Point transactions from the last `days` days, newest first.
    /// The history is returned to the caller and not kept in the store.
    pub async fn fetch_point_history(&mut self, days: u32) -> Result<Vec<PointTransaction>, ApiError> {
        self.loading = true;
        let result = self
            .api
            .get::<ListResponse<PointTransaction>>(&point_history_path(days))
            .await;
        self.loading = false;

        let history = record_error(&mut self.error, result, "Failed to fetch point history")?;
        Ok(history.into_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stores::test_support::offline_client;

    #[test]
    fn test_new_store_defaults() {
        let store = GamificationStore::new(offline_client());
        assert_eq!(store.stats.profile.level, 1);
        assert_eq!(store.stats.points_remaining(), 100);
        assert!(store.achievements.is_empty());
        assert!(!store.loading);
    }

    #[test]
    fn test_point_history_path() {
        assert_eq!(
            point_history_path(DEFAULT_HISTORY_DAYS),
            "/gamification/points/history/?days=30"
        );
    }
}
