use chrono::NaiveDate;
use tracing::debug;

use crate::api::{ApiClient, ApiError};
use crate::models::{ListResponse, Reflection, ReflectionInput, ReflectionPeriod, ReflectionType};

use super::{record_error, replace_by_id};

const REFLECTIONS_PATH: &str = "/goals/reflections/";

fn reflection_path(id: &str) -> String {
    format!("/goals/reflections/{}/", id)
}

fn reflections_by_type_path(kind: ReflectionType) -> String {
    format!("/goals/reflections/type/{}/", kind.as_str())
}

#[derive(Debug, Clone, Default)]
pub struct ReflectionsByType {
    pub weekly: Vec<Reflection>,
    pub monthly: Vec<Reflection>,
    pub quarterly: Vec<Reflection>,
    pub yearly: Vec<Reflection>,
}

impl ReflectionsByType {
    pub fn of_type(&self, kind: ReflectionType) -> &[Reflection] {
        match kind {
            ReflectionType::Weekly => &self.weekly,
            ReflectionType::Monthly => &self.monthly,
            ReflectionType::Quarterly => &self.quarterly,
            ReflectionType::Yearly => &self.yearly,
        }
    }

    fn of_type_mut(&mut self, kind: ReflectionType) -> &mut Vec<Reflection> {
        match kind {
            ReflectionType::Weekly => &mut self.weekly,
            ReflectionType::Monthly => &mut self.monthly,
            ReflectionType::Quarterly => &mut self.quarterly,
            ReflectionType::Yearly => &mut self.yearly,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Reflection> {
        ReflectionType::ALL.into_iter().flat_map(move |kind| self.of_type(kind).iter())
    }
}

pub struct ReflectionsStore {
    api: ApiClient,
    pub reflections: ReflectionsByType,
    pub current: Option<Reflection>,
    pub loading: bool,
    pub error: Option<String>,
}

impl ReflectionsStore {
    pub fn new(api: ApiClient) -> Self {
        Self {
            api,
            reflections: ReflectionsByType::default(),
            current: None,
            loading: false,
            error: None,
        }
    }

    pub fn weekly(&self) -> &[Reflection] {
        &self.reflections.weekly
    }

    pub fn monthly(&self) -> &[Reflection] {
        &self.reflections.monthly
    }

    pub fn quarterly(&self) -> &[Reflection] {
        &self.reflections.quarterly
    }

    pub fn yearly(&self) -> &[Reflection] {
        &self.reflections.yearly
    }

    pub fn reflection_by_id(&self, id: &str) -> Option<&Reflection> {
        self.reflections.iter().find(|r| r.id == id)
    }

    /// Reflections starting within `start..=end`, newest first.
    pub fn reflections_in_range(&self, start: NaiveDate, end: NaiveDate) -> Vec<&Reflection> {
        let mut found: Vec<&Reflection> = self
            .reflections
            .iter()
            .filter(|r| r.start_date >= start && r.start_date <= end)
            .collect();
        found.sort_by(|a, b| b.start_date.cmp(&a.start_date));
        found
    }

    /// The most recent reflection of each type that has one.
    pub fn latest_reflections(&self) -> Vec<&Reflection> {
        ReflectionType::ALL
            .into_iter()
            .filter_map(|kind| self.reflections.of_type(kind).iter().max_by_key(|r| r.start_date))
            .collect()
    }

    pub fn reflection_period(kind: ReflectionType, today: NaiveDate) -> ReflectionPeriod {
        ReflectionPeriod::containing(kind, today)
    }

    pub fn clear_error(&mut self) {
        self.error = None;
    }

    pub async fn fetch_all_reflections(&mut self) -> Result<(), ApiError> {
        self.loading = true;
        let weekly_path = reflections_by_type_path(ReflectionType::Weekly);
        let monthly_path = reflections_by_type_path(ReflectionType::Monthly);
        let quarterly_path = reflections_by_type_path(ReflectionType::Quarterly);
        let yearly_path = reflections_by_type_path(ReflectionType::Yearly);

        let result = futures::try_join!(
            self.api.get::<ListResponse<Reflection>>(&weekly_path),
            self.api.get::<ListResponse<Reflection>>(&monthly_path),
            self.api.get::<ListResponse<Reflection>>(&quarterly_path),
            self.api.get::<ListResponse<Reflection>>(&yearly_path),
        );
        self.loading = false;

        let (weekly, monthly, quarterly, yearly) =
            record_error(&mut self.error, result, "Failed to fetch reflections")?;
        self.reflections = ReflectionsByType {
            weekly: weekly.into_vec(),
            monthly: monthly.into_vec(),
            quarterly: quarterly.into_vec(),
            yearly: yearly.into_vec(),
        };
        debug!(total = self.reflections.iter().count(), "Fetched reflections");
        Ok(())
    }

    pub async fn create_reflection(&mut self, input: &ReflectionInput) -> Result<Reflection, ApiError> {
        self.loading = true;
        let result = self.api.post::<Reflection, _>(REFLECTIONS_PATH, input).await;
        self.loading = false;

        let reflection = record_error(&mut self.error, result, "Failed to create reflection")?;
        self.reflections
            .of_type_mut(reflection.reflection_type)
            .push(reflection.clone());
        Ok(reflection)
    }

    pub async fn update_reflection(
        &mut self,
        reflection_id: &str,
        input: &ReflectionInput,
    ) -> Result<Reflection, ApiError> {
        self.loading = true;
        let result = self
            .api
            .put::<Reflection, _>(&reflection_path(reflection_id), input)
            .await;
        self.loading = false;

        let reflection = record_error(&mut self.error, result, "Failed to update reflection")?;
        let list = self.reflections.of_type_mut(reflection.reflection_type);
        if !replace_by_id(list, reflection_id, reflection.clone(), |r| r.id.as_str()) {
            list.push(reflection.clone());
        }
        if self.current.as_ref().is_some_and(|c| c.id == reflection_id) {
            self.current = Some(reflection.clone());
        }
        Ok(reflection)
    }

    /// Load one reflection into `current`.
    pub async fn fetch_reflection(&mut self, reflection_id: &str) -> Result<Reflection, ApiError> {
        self.loading = true;
        let result = self.api.get::<Reflection>(&reflection_path(reflection_id)).await;
        self.loading = false;

        let reflection = record_error(&mut self.error, result, "Failed to fetch reflection")?;
        self.current = Some(reflection.clone());
        Ok(reflection)
    }
}
