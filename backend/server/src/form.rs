use std::{collections::BTreeMap, fmt};

use records::{LanguageLabel, NewReview, Rating};
use serde::Deserialize;
use thiserror::Error;

/// Raw, unvalidated values of the submission form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Draft {
    pub name: String,
    pub rating: Option<i64>,
    pub description: String,
}

impl Draft {
    /// Length the description limit applies to, in characters.
    pub fn description_chars(&self) -> usize {
        self.description.chars().count()
    }
}

/// Form body as posted by the page. Every field is text, the rating included.
#[derive(Debug, Default, Deserialize)]
pub struct ReviewForm {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub rating: String,
    #[serde(default)]
    pub description: String,
}

impl From<ReviewForm> for Draft {
    fn from(form: ReviewForm) -> Self {
        Self {
            name: form.name,
            rating: parse_rating(&form.rating),
            description: form.description,
        }
    }
}

/// Whole numbers only, `4.0` is accepted but `4.5` is not.
pub fn parse_rating(raw: &str) -> Option<i64> {
    let raw = raw.trim();

    if let Ok(value) = raw.parse::<i64>() {
        return Some(value);
    }

    raw.parse::<f64>()
        .ok()
        .filter(|value| value.is_finite() && value.fract() == 0.0)
        .map(|value| value as i64)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Field {
    Name,
    Rating,
    Description,
}

impl Field {
    pub fn as_str(self) -> &'static str {
        match self {
            Field::Name => "name",
            Field::Rating => "rating",
            Field::Description => "description",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Name is required")]
    MissingName,

    #[error("Rating must be between {} and {}", Rating::MIN, Rating::MAX)]
    InvalidRating,

    #[error("Description is required")]
    MissingDescription,

    #[error("Description cannot exceed {max} characters")]
    DescriptionTooLong { max: usize },
}

pub type FieldErrors = BTreeMap<Field, ValidationError>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidDraft {
    pub name: String,
    pub rating: Rating,
    pub description: String,
}

impl ValidDraft {
    pub fn into_review(self, language: LanguageLabel) -> NewReview {
        NewReview {
            name: self.name,
            rating: self.rating,
            language,
            description: self.description,
        }
    }
}

/// Checks every field, collecting one error per failing field.
pub fn validate(draft: &Draft, max_description_chars: usize) -> Result<ValidDraft, FieldErrors> {
    let mut errors = FieldErrors::new();

    if draft.name.trim().is_empty() {
        errors.insert(Field::Name, ValidationError::MissingName);
    }

    let rating = draft.rating.and_then(Rating::new);
    if rating.is_none() {
        errors.insert(Field::Rating, ValidationError::InvalidRating);
    }

    if draft.description.trim().is_empty() {
        errors.insert(Field::Description, ValidationError::MissingDescription);
    } else if draft.description_chars() > max_description_chars {
        errors.insert(
            Field::Description,
            ValidationError::DescriptionTooLong {
                max: max_description_chars,
            },
        );
    }

    match rating {
        Some(rating) if errors.is_empty() => Ok(ValidDraft {
            name: draft.name.clone(),
            rating,
            description: draft.description.clone(),
        }),
        _ => Err(errors),
    }
}
