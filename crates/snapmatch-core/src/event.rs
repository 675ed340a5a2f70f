use crate::validate::ValidationError;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// A user-created photo collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub id: String,
    pub name: String,
    pub date: NaiveDate,
    pub location: String,
    /// Public URLs of the event's photos, in upload order.
    pub images: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub last_modified: Option<DateTime<Utc>>,
}

impl Event {
    pub fn new(id: String, details: EventDetails, now: DateTime<Utc>) -> Self {
        Self {
            id,
            name: details.name,
            date: details.date,
            location: details.location,
            images: Vec::new(),
            created_at: now,
            last_modified: None,
        }
    }

    pub fn photo_count(&self) -> usize {
        self.images.len()
    }

    /// Append URLs not already present, preserving order.
    pub fn add_images<I>(&mut self, urls: I)
    where
        I: IntoIterator<Item = String>,
    {
        for url in urls {
            if !self.images.contains(&url) {
                self.images.push(url);
            }
        }
    }

    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.last_modified = Some(now);
    }
}

/// Time-derived event id: epoch milliseconds.
pub fn event_id_at(now: DateTime<Utc>) -> String {
    now.timestamp_millis().to_string()
}

/// Unvalidated form input for a new event. Missing fields deserialize as blank.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NewEvent {
    pub name: String,
    pub date: String,
    pub location: String,
}

/// Validated event fields.
#[derive(Debug, Clone, PartialEq)]
pub struct EventDetails {
    pub name: String,
    pub date: NaiveDate,
    pub location: String,
}

impl NewEvent {
    pub fn validate(self) -> Result<EventDetails, ValidationError> {
        let name = required(self.name, "name")?;
        let location = required(self.location, "location")?;
        let date = NaiveDate::parse_from_str(self.date.trim(), "%Y-%m-%d")
            .map_err(|_| ValidationError::InvalidDate(self.date.clone()))?;
        Ok(EventDetails {
            name,
            date,
            location,
        })
    }
}

fn required(value: String, field: &'static str) -> Result<String, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::MissingField(field));
    }
    Ok(trimmed.to_string())
}
