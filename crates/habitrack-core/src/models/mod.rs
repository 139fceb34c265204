//! Data models for habitrack entities.
//!
//! This module contains the structures exchanged with the backend:
//!
//! - `UserProfile`, `LoginCredentials`, `Registration`: accounts
//! - `Goal`, `ProcessProgress`, `GoalStats`: the goal hierarchy and daily processes
//! - `Standard`, `StandardCategory`, `StandardProgress`: recurring habits
//! - `Reflection`, `ReflectionPeriod`: periodic reflections
//! - `GamificationStats`, `Achievement`, `PointTransaction`: points and levels

pub mod gamification;
pub mod goal;
pub mod reflection;
pub mod standard;
pub mod user;

use serde::Deserialize;

pub use gamification::{Achievement, GameProfile, GamificationStats, PointTransaction, UserAchievement};
pub use goal::{DailyProgress, Goal, GoalCompletionResponse, GoalInput, GoalStats, GoalType, ProcessProgress};
pub use reflection::{Reflection, ReflectionInput, ReflectionPeriod, ReflectionType};
pub use standard::{
    CategoryInput, CompletionRateResponse, Frequency, Standard, StandardCategory, StandardInput,
    StandardProgress, StandardStats, UNCATEGORIZED,
};
pub use user::{LoginCredentials, ProfileUpdate, Registration, UserProfile, UserSettings};

/// List endpoints answer either a bare array or a paginated page.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ListResponse<T> {
    Plain(Vec<T>),
    Paginated {
        #[serde(default = "Vec::new")]
        results: Vec<T>,
    },
}

impl<T> ListResponse<T> {
    pub fn into_vec(self) -> Vec<T> {
        match self {
            ListResponse::Plain(items) => items,
            ListResponse::Paginated { results } => results,
        }
    }
}
