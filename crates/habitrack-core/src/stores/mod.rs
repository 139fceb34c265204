//! Resource stores backed by the API client.
//!
//! Each store keeps the last fetched data together with a `loading` flag and
//! an `error` message. Actions record a display message on failure and hand
//! the error back to the caller.
//!
//! - `GoalsStore`: goal hierarchy, today's process progress, goal analytics
//! - `StandardsStore`: categories, standards, today's standard progress
//! - `ReflectionsStore`: weekly/monthly/quarterly/yearly reflections
//! - `GamificationStore`: points, levels and achievements

pub mod gamification;
pub mod goals;
pub mod reflections;
pub mod standards;

use chrono::{Local, NaiveDate};

use crate::api::ApiError;

pub use gamification::GamificationStore;
pub use goals::{GoalsByType, GoalsStore};
pub use reflections::{ReflectionsByType, ReflectionsStore};
pub use standards::StandardsStore;

/// Record a failed action's display message and pass the result through.
pub(crate) fn record_error<T>(
    error: &mut Option<String>,
    result: Result<T, ApiError>,
    fallback: &str,
) -> Result<T, ApiError> {
    if let Err(ref e) = result {
        *error = Some(e.display_message(fallback));
    }
    result
}

/// Today's date in the user's local time zone
pub(crate) fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// Replace the item with a matching id, returning whether one was found.
pub(crate) fn replace_by_id<T, F>(items: &mut [T], id: &str, item: T, id_of: F) -> bool
where
    F: Fn(&T) -> &str,
{
    match items.iter().position(|existing| id_of(existing) == id) {
        Some(index) => {
            items[index] = item;
            true
        }
        None => false,
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_error_uses_fallback() {
        let mut error = None;
        let result: Result<(), ApiError> = Err(ApiError::Unauthorized);
        assert!(record_error(&mut error, result, "Failed to fetch goals").is_err());
        assert_eq!(error.as_deref(), Some("Failed to fetch goals"));
    }

    #[test]
    fn test_record_error_leaves_success_alone() {
        let mut error = Some("previous".to_string());
        let result: Result<u32, ApiError> = Ok(3);
        assert_eq!(record_error(&mut error, result, "x").unwrap(), 3);
        assert_eq!(error.as_deref(), Some("previous"));
    }

    #[test]
    fn test_replace_by_id() {
        let mut items = vec![("a".to_string(), 1), ("b".to_string(), 2)];
        assert!(replace_by_id(&mut items, "b", ("b".to_string(), 20), |i| i.0.as_str()));
        assert_eq!(items[1].1, 20);
        assert!(!replace_by_id(&mut items, "z", ("z".to_string(), 0), |i| i.0.as_str()));
    }
}
