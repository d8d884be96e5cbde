//! The editable working copy of a post and the checks it must pass before
//! anything is sent.

use crate::model::{Post, PostPayload, PostStatus};
use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Utc};
use thiserror::Error;

pub const MAX_TITLE_CHARS: usize = 200;
pub const MAX_TAGS: usize = 10;

/// Format of the datetime-local input the scheduler works with.
pub const LOCAL_INPUT_FORMAT: &str = "%Y-%m-%dT%H:%M";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Title is required")]
    TitleRequired,
    #[error("Title too long")]
    TitleTooLong,
    #[error("Content is required")]
    ContentRequired,
    #[error("Maximum 10 tags allowed")]
    TooManyTags,
    #[error("Please select a date and time to schedule")]
    MissingSchedule,
    #[error("Scheduled time must look like YYYY-MM-DDTHH:MM")]
    InvalidScheduleTime,
    #[error("Published posts cannot be scheduled")]
    AlreadyPublished,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Field {
    Title(String),
    Content(String),
    Category(String),
    Tags(Vec<String>),
    FeaturedImage(String),
    /// Local time in [`LOCAL_INPUT_FORMAT`], or empty to clear.
    ScheduledFor(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkingCopy {
    pub title: String,
    pub content: String,
    pub category: String,
    pub tags: Vec<String>,
    pub featured_image: String,
    pub scheduled_for: String,
}

impl WorkingCopy {
    pub fn from_post(post: &Post) -> Self {
        Self {
            title: post.title.clone(),
            content: post.content.clone(),
            category: post.category.clone().unwrap_or_default(),
            tags: post.tags.clone(),
            featured_image: post.featured_image.clone().unwrap_or_default(),
            scheduled_for: post.scheduled_for.map(to_local_input).unwrap_or_default(),
        }
    }

    pub fn apply(&mut self, field: Field) {
        match field {
            Field::Title(v) => self.title = v,
            Field::Content(v) => self.content = v,
            Field::Category(v) => self.category = v,
            Field::Tags(v) => self.tags = v,
            Field::FeaturedImage(v) => self.featured_image = v,
            Field::ScheduledFor(v) => self.scheduled_for = v,
        }
    }

    /// Nothing worth autosaving yet.
    pub fn is_blank(&self) -> bool {
        self.title.is_empty() && self.content.is_empty()
    }

    /// First failing rule wins, in form order.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.title.is_empty() {
            return Err(ValidationError::TitleRequired);
        }
        if self.title.chars().count() > MAX_TITLE_CHARS {
            return Err(ValidationError::TitleTooLong);
        }
        if self.content.is_empty() {
            return Err(ValidationError::ContentRequired);
        }
        if self.tags.len() > MAX_TAGS {
            return Err(ValidationError::TooManyTags);
        }
        Ok(())
    }

    pub fn to_payload(&self, status: PostStatus) -> Result<PostPayload, ValidationError> {
        self.validate()?;

        let scheduled_for = match self.scheduled_for.as_str() {
            "" => None,
            raw => Some(parse_local_input(raw)?),
        };
        if status == PostStatus::Scheduled && scheduled_for.is_none() {
            return Err(ValidationError::MissingSchedule);
        }

        Ok(PostPayload {
            title: self.title.clone(),
            content: self.content.clone(),
            category: non_empty(&self.category),
            tags: self.tags.clone(),
            featured_image: non_empty(&self.featured_image),
            status,
            scheduled_for,
        })
    }
}

fn non_empty(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_string())
}

pub fn to_local_input(at: DateTime<Utc>) -> String {
    at.with_timezone(&Local).format(LOCAL_INPUT_FORMAT).to_string()
}

pub fn parse_local_input(raw: &str) -> Result<DateTime<Utc>, ValidationError> {
    let naive = NaiveDateTime::parse_from_str(raw, LOCAL_INPUT_FORMAT)
        .map_err(|_| ValidationError::InvalidScheduleTime)?;
    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|at| at.with_timezone(&Utc))
        .ok_or(ValidationError::InvalidScheduleTime)
}
