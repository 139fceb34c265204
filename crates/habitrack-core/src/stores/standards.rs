use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDate;
use serde_json::json;
use tracing::debug;

use crate::api::{ApiClient, ApiError};
use crate::models::{
    CategoryInput, CompletionRateResponse, Frequency, ListResponse, Standard, StandardCategory,
    StandardInput, StandardProgress, StandardStats,
};

use super::{record_error, replace_by_id, today};

const CATEGORIES_PATH: &str = "/standards/categories/";
const STANDARDS_PATH: &str = "/standards/";
const COMPLETION_RATE_PATH: &str = "/standards/analytics/completion-rate/";

fn standard_path(id: &str) -> String {
    format!("/standards/{}/", id)
}

fn progress_for_date_path(date: NaiveDate) -> String {
    format!("/standards/progress/date/{}/", date.format("%Y-%m-%d"))
}

fn progress_path(id: &str) -> String {
    format!("/standards/progress/{}/", id)
}

pub struct StandardsStore {
    api: ApiClient,
    pub categories: Vec<StandardCategory>,
    pub standards: Vec<Standard>,
    pub today_progress: Vec<StandardProgress>,
    pub stats: StandardStats,
    pub loading: bool,
    pub error: Option<String>,
}

impl StandardsStore {
    pub fn new(api: ApiClient) -> Self {
        Self {
            api,
            categories: Vec::new(),
            standards: Vec::new(),
            today_progress: Vec::new(),
            stats: StandardStats::default(),
            loading: false,
            error: None,
        }
    }

    // ===== Getters =====

    /// Standards grouped by category name, sorted by name.
    /// Standards without a category are filed under "Uncategorized".
    pub fn standards_by_category(&self) -> BTreeMap<&str, Vec<&Standard>> {
        let mut groups: BTreeMap<&str, Vec<&Standard>> = BTreeMap::new();
        for standard in &self.standards {
            groups.entry(standard.category_name()).or_default().push(standard);
        }
        groups
    }

    pub fn active_standards(&self) -> Vec<&Standard> {
        self.standards.iter().filter(|s| s.is_active).collect()
    }

    pub fn today_progress_by_standard(&self) -> HashMap<&str, &StandardProgress> {
        self.today_progress
            .iter()
            .map(|p| (p.standard.as_str(), p))
            .collect()
    }

    pub fn daily_standards(&self) -> Vec<&Standard> {
        self.active_with_frequency(Frequency::Daily)
    }

    pub fn weekly_standards(&self) -> Vec<&Standard> {
        self.active_with_frequency(Frequency::Weekly)
    }

    fn active_with_frequency(&self, frequency: Frequency) -> Vec<&Standard> {
        self.standards
            .iter()
            .filter(|s| s.is_active && s.frequency == frequency)
            .collect()
    }

    pub fn clear_error(&mut self) {
        self.error = None;
    }

    // ===== Actions =====

    pub async fn fetch_categories(&mut self) -> Result<(), ApiError> {
        self.loading = true;
        let result = self.api.get::<ListResponse<StandardCategory>>(CATEGORIES_PATH).await;
        self.loading = false;

        let categories = record_error(&mut self.error, result, "Failed to fetch categories")?;
        self.categories = categories.into_vec();
        self.categories.sort_by_key(|c| c.order);
        Ok(())
    }

    pub async fn create_category(&mut self, input: &CategoryInput) -> Result<StandardCategory, ApiError> {
        let result = self.api.post::<StandardCategory, _>(CATEGORIES_PATH, input).await;
        let category = record_error(&mut self.error, result, "Failed to create category")?;
        self.categories.push(category.clone());
        Ok(category)
    }

    pub async fn fetch_standards(&mut self) -> Result<(), ApiError> {
        self.loading = true;
        let result = self.api.get::<ListResponse<Standard>>(STANDARDS_PATH).await;
        self.loading = false;

        let standards = record_error(&mut self.error, result, "Failed to fetch standards")?;
        self.standards = standards.into_vec();
        debug!(count = self.standards.len(), "Fetched standards");
        Ok(())
    }

    pub async fn create_standard(&mut self, input: &StandardInput) -> Result<Standard, ApiError> {
        self.loading = true;
        let result = self.api.post::<Standard, _>(STANDARDS_PATH, input).await;
        self.loading = false;

        let standard = record_error(&mut self.error, result, "Failed to create standard")?;
        self.standards.push(standard.clone());
        Ok(standard)
    }

    pub async fn update_standard(
        &mut self,
        standard_id: &str,
        input: &StandardInput,
    ) -> Result<Standard, ApiError> {
        self.loading = true;
        let result = self.api.put::<Standard, _>(&standard_path(standard_id), input).await;
        self.loading = false;

        let standard = record_error(&mut self.error, result, "Failed to update standard")?;
        if !replace_by_id(&mut self.standards, standard_id, standard.clone(), |s| s.id.as_str()) {
            self.standards.push(standard.clone());
        }
        Ok(standard)
    }

    pub async fn delete_standard(&mut self, standard_id: &str) -> Result<(), ApiError> {
        self.loading = true;
        let result = self.api.delete(&standard_path(standard_id)).await;
        self.loading = false;

        record_error(&mut self.error, result, "Failed to delete standard")?;
        self.standards.retain(|s| s.id != standard_id);
        Ok(())
    }

    pub async fn fetch_today_progress(&mut self) -> Result<(), ApiError> {
        self.fetch_progress_for(today()).await
    }

    pub async fn fetch_progress_for(&mut self, date: NaiveDate) -> Result<(), ApiError> {
        self.loading = true;
        let result = self
            .api
            .get::<ListResponse<StandardProgress>>(&progress_for_date_path(date))
            .await;
        self.loading = false;

        let progress = record_error(&mut self.error, result, "Failed to fetch today's progress")?;
        self.today_progress = progress.into_vec();
        Ok(())
    }

    pub async fn toggle_standard_completion(
        &mut self,
        progress_id: &str,
        is_completed: bool,
        notes: Option<&str>,
    ) -> Result<StandardProgress, ApiError> {
        let mut body = json!({ "is_completed": is_completed });
        if let Some(notes) = notes {
            body["notes"] = json!(notes);
        }

        let result = self
            .api
            .patch::<StandardProgress, _>(&progress_path(progress_id), &body)
            .await;
        let progress = record_error(&mut self.error, result, "Failed to update progress")?;
        replace_by_id(&mut self.today_progress, progress_id, progress.clone(), |p| p.id.as_str());

        self.fetch_stats().await?;
        Ok(progress)
    }

    pub async fn fetch_stats(&mut self) -> Result<(), ApiError> {
        let result = self.api.get::<CompletionRateResponse>(COMPLETION_RATE_PATH).await;
        let response = record_error(&mut self.error, result, "Failed to fetch stats")?;
        self.stats = StandardStats::from(response);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::UNCATEGORIZED;
    use crate::stores::test_support::offline_client;

    fn named_category(name: &str) -> StandardCategory {
        StandardCategory {
            id: format!("c-{}", name),
            name: name.to_string(),
            description: String::new(),
            is_default: false,
            order: 0,
        }
    }

    fn standard(id: &str, category: Option<&str>, frequency: Frequency, active: bool) -> Standard {
        Standard {
            id: id.to_string(),
            category: category.map(named_category),
            title: format!("Standard {}", id),
            description: String::new(),
            minimum_requirement: String::new(),
            success_criteria: Vec::new(),
            frequency,
            specific_days: None,
            time_of_day: None,
            duration_minutes: None,
            is_active: active,
            created_at: None,
            updated_at: None,
        }
    }

    fn store() -> StandardsStore {
        let mut store = StandardsStore::new(offline_client());
        store.standards = vec![
            standard("s1", Some("Health"), Frequency::Daily, true),
            standard("s2", None, Frequency::Weekly, true),
            standard("s3", Some("Health"), Frequency::Daily, false),
            standard("s4", Some("Career"), Frequency::Monthly, true),
        ];
        store
    }

    #[test]
    fn test_standards_by_category() {
        let store = store();
        let groups = store.standards_by_category();
        let names: Vec<_> = groups.keys().copied().collect();
        assert_eq!(names, vec!["Career", "Health", UNCATEGORIZED]);
        assert_eq!(groups["Health"].len(), 2);
        assert_eq!(groups[UNCATEGORIZED][0].id, "s2");
    }

    #[test]
    fn test_frequency_filters_skip_inactive() {
        let store = store();
        let daily: Vec<_> = store.daily_standards().iter().map(|s| s.id.as_str()).collect();
        assert_eq!(daily, vec!["s1"]);
        assert_eq!(store.weekly_standards().len(), 1);
        assert_eq!(store.active_standards().len(), 3);
    }

    #[test]
    fn test_today_progress_by_standard() {
        let mut store = store();
        store.today_progress = vec![StandardProgress {
            id: "p1".to_string(),
            standard: "s1".to_string(),
            standard_title: None,
            category_name: None,
            frequency: Some(Frequency::Daily),
            is_completed: true,
            completion_time: None,
            notes: String::new(),
        }];
        let by_standard = store.today_progress_by_standard();
        assert!(by_standard["s1"].is_completed);
        assert!(!by_standard.contains_key("s2"));
    }

    #[test]
    fn test_paths() {
        assert_eq!(standard_path("abc"), "/standards/abc/");
        assert_eq!(
            progress_for_date_path(NaiveDate::from_ymd_opt(2024, 11, 2).unwrap()),
            "/standards/progress/date/2024-11-02/"
        );
    }
}
