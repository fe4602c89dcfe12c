use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use super::id_format;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Child {
    #[serde(deserialize_with = "id_format::deserialize")]
    pub id: String,
    pub name: String,
    pub date_of_birth: NaiveDate,
    #[serde(default)]
    pub gender: Option<String>,
    #[serde(default, deserialize_with = "id_format::option::deserialize")]
    pub parent_id: Option<String>,
    #[serde(default, deserialize_with = "id_format::option::deserialize")]
    pub doctor_id: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Payload for creating or editing a child profile.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChildDraft {
    pub name: String,
    pub date_of_birth: NaiveDate,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub doctor_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct Age {
    pub years: u32,
    pub months: u32,
}

impl Age {
    /// "3 years 2 months", "11 months", "1 year".
    pub fn describe(&self) -> String {
        fn unit(count: u32, singular: &str) -> String {
            if count == 1 {
                format!("1 {singular}")
            } else {
                format!("{count} {singular}s")
            }
        }

        match (self.years, self.months) {
            (0, months) => unit(months, "month"),
            (years, 0) => unit(years, "year"),
            (years, months) => format!("{} {}", unit(years, "year"), unit(months, "month")),
        }
    }
}

impl Child {
    /// Whole years and months elapsed between birth and `today`. A month is
    /// only counted once its day-of-month has been reached.
    pub fn age_on(&self, today: NaiveDate) -> Age {
        age_between(self.date_of_birth, today)
    }
}

pub fn age_between(date_of_birth: NaiveDate, today: NaiveDate) -> Age {
    if date_of_birth >= today {
        return Age { years: 0, months: 0 };
    }

    let mut months = (today.year() - date_of_birth.year()) * 12
        + (today.month() as i32 - date_of_birth.month() as i32);
    if today.day() < date_of_birth.day() {
        months -= 1;
    }
    let months = months.max(0) as u32;

    Age {
        years: months / 12,
        months: months % 12,
    }
}
