use std::str::FromStr;

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReflectionType {
    Weekly,
    Monthly,
    Quarterly,
    Yearly,
}

impl ReflectionType {
    pub const ALL: [ReflectionType; 4] = [
        ReflectionType::Weekly,
        ReflectionType::Monthly,
        ReflectionType::Quarterly,
        ReflectionType::Yearly,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ReflectionType::Weekly => "weekly",
            ReflectionType::Monthly => "monthly",
            ReflectionType::Quarterly => "quarterly",
            ReflectionType::Yearly => "yearly",
        }
    }
}

impl FromStr for ReflectionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "weekly" => Ok(ReflectionType::Weekly),
            "monthly" => Ok(ReflectionType::Monthly),
            "quarterly" => Ok(ReflectionType::Quarterly),
            "yearly" => Ok(ReflectionType::Yearly),
            other => Err(format!("Unknown reflection type '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Reflection {
    pub id: String,
    pub reflection_type: ReflectionType,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub highlights: Vec<String>,
    #[serde(default)]
    pub challenges: Vec<String>,
    #[serde(default)]
    pub action_items: Vec<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReflectionInput {
    pub reflection_type: ReflectionType,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub content: String,
    pub highlights: Vec<String>,
    pub challenges: Vec<String>,
    pub action_items: Vec<String>,
}

/// Inclusive date span a reflection covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReflectionPeriod {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

impl ReflectionPeriod {
    /// The period of `kind` containing `today`.
    ///
    /// Weeks run Sunday through Saturday; months, quarters and years are
    /// calendar aligned.
    pub fn containing(kind: ReflectionType, today: NaiveDate) -> Self {
        match kind {
            ReflectionType::Weekly => {
                let start = today - Duration::days(today.weekday().num_days_from_sunday() as i64);
                Self {
                    start_date: start,
                    end_date: start + Duration::days(6),
                }
            }
            ReflectionType::Monthly => Self {
                start_date: first_of_month(today.year(), today.month()),
                end_date: last_of_month(today.year(), today.month()),
            },
            ReflectionType::Quarterly => {
                let first_month = (today.month0() / 3) * 3 + 1;
                Self {
                    start_date: first_of_month(today.year(), first_month),
                    end_date: last_of_month(today.year(), first_month + 2),
                }
            }
            ReflectionType::Yearly => Self {
                start_date: first_of_month(today.year(), 1),
                end_date: last_of_month(today.year(), 12),
            },
        }
    }
}

fn first_of_month(year: i32, month: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, 1).unwrap_or(NaiveDate::MIN)
}

fn last_of_month(year: i32, month: u32) -> NaiveDate {
    let (next_year, next_month) = if month == 12 { (year + 1, 1) } else { (year, month + 1) };
    first_of_month(next_year, next_month)
        .pred_opt()
        .unwrap_or(NaiveDate::MIN)
}
