use std::fmt;

use rand::distributions::{Alphanumeric, DistString};
use serde::{Deserialize, Serialize};

/// Same length as the auto ids handed out by Firestore.
pub const RECORD_ID_LEN: usize = 20;

pub const UNDETERMINED_CODE: &str = "und";

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(String);

impl RecordId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Random alphanumeric id for stores that do not assign their own.
    pub fn generate() -> Self {
        Self(Alphanumeric.sample_string(&mut rand::thread_rng(), RECORD_ID_LEN))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Star rating, only constructible inside `MIN..=MAX`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "u8")]
pub struct Rating(u8);

impl Rating {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 5;

    pub fn new(value: i64) -> Option<Self> {
        if (Self::MIN as i64..=Self::MAX as i64).contains(&value) {
            Some(Self(value as u8))
        } else {
            None
        }
    }

    pub fn get(self) -> u8 {
        self.0
    }
}

impl TryFrom<i64> for Rating {
    type Error = String;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value).ok_or_else(|| format!("rating {value} outside {}..={}", Self::MIN, Self::MAX))
    }
}

impl From<Rating> for u8 {
    fn from(rating: Rating) -> Self {
        rating.0
    }
}

/// Labels we show for a detected language. The set is closed on purpose,
/// every code outside it collapses into [`LanguageLabel::Undetermined`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "&'static str")]
pub enum LanguageLabel {
    #[default]
    Undetermined,
    English,
    Deutsch,
}

impl LanguageLabel {
    /// Maps an ISO 639-3 code from the classifier.
    pub fn from_code(code: &str) -> Self {
        match code {
            "eng" => Self::English,
            "deu" => Self::Deutsch,
            _ => Self::Undetermined,
        }
    }

    /// Maps a label read back from the store.
    pub fn from_label(label: &str) -> Self {
        match label {
            "English" => Self::English,
            "Deutsch" => Self::Deutsch,
            _ => Self::Undetermined,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Undetermined => "-",
            Self::English => "English",
            Self::Deutsch => "Deutsch",
        }
    }
}

impl fmt::Display for LanguageLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for LanguageLabel {
    fn from(label: String) -> Self {
        Self::from_label(&label)
    }
}

impl From<LanguageLabel> for &'static str {
    fn from(label: LanguageLabel) -> Self {
        label.as_str()
    }
}

/// A validated review that has not been stored yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewReview {
    pub name: String,
    pub rating: Rating,
    pub language: LanguageLabel,
    pub description: String,
}

/// A review as enumerated by the store.
///
/// `rating` is kept as read: other clients of the same collection are not
/// bound by [`Rating`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReviewRecord {
    pub id: RecordId,
    pub name: String,
    pub rating: i64,
    pub language: LanguageLabel,
    pub description: String,
}

/// Stored body of a review, exactly the four persisted fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub rating: i64,
    #[serde(default)]
    pub language: LanguageLabel,
    #[serde(default)]
    pub description: String,
}

impl Document {
    pub fn into_record(self, id: RecordId) -> ReviewRecord {
        ReviewRecord {
            id,
            name: self.name,
            rating: self.rating,
            language: self.language,
            description: self.description,
        }
    }
}

impl From<&NewReview> for Document {
    fn from(review: &NewReview) -> Self {
        Self {
            name: review.name.clone(),
            rating: review.rating.get() as i64,
            language: review.language,
            description: review.description.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_rating_bounds() {
        assert_eq!(Rating::new(0), None);
        assert_eq!(Rating::new(1).map(Rating::get), Some(1));
        assert_eq!(Rating::new(5).map(Rating::get), Some(5));
        assert_eq!(Rating::new(6), None);
        assert_eq!(Rating::new(-3), None);
    }

    #[test]
    fn test_rating_rejects_out_of_range_json() {
        assert!(serde_json::from_value::<Rating>(json!(9)).is_err());
        assert_eq!(serde_json::from_value::<Rating>(json!(4)).ok(), Rating::new(4));
    }

    #[test]
    fn test_language_codes() {
        assert_eq!(LanguageLabel::from_code(UNDETERMINED_CODE), LanguageLabel::Undetermined);
        assert_eq!(LanguageLabel::from_code("eng"), LanguageLabel::English);
        assert_eq!(LanguageLabel::from_code("deu"), LanguageLabel::Deutsch);
        assert_eq!(LanguageLabel::from_code("fra"), LanguageLabel::Undetermined);
        assert_eq!(LanguageLabel::from_code(""), LanguageLabel::Undetermined);
    }

    #[test]
    fn test_language_labels() {
        assert_eq!(LanguageLabel::Undetermined.to_string(), "-");
        assert_eq!(LanguageLabel::from_label("English"), LanguageLabel::English);
        assert_eq!(LanguageLabel::from_label("Français"), LanguageLabel::Undetermined);
    }

    #[test]
    fn test_document_fields() {
        let review = NewReview {
            name: "Ana".to_string(),
            rating: Rating::new(5).unwrap(),
            language: LanguageLabel::English,
            description: "Great!".to_string(),
        };

        assert_eq!(
            serde_json::to_value(Document::from(&review)).unwrap(),
            json!({
                "name": "Ana",
                "rating": 5,
                "language": "English",
                "description": "Great!",
            })
        );
    }

    #[test]
    fn test_document_missing_language() {
        let document: Document =
            serde_json::from_value(json!({"name": "Bo", "rating": 2, "description": "meh"})).unwrap();
        let record = document.into_record(RecordId::new("abc"));

        assert_eq!(record.language, LanguageLabel::Undetermined);
        assert_eq!(record.id.as_str(), "abc");
    }

    #[test]
    fn test_generated_ids() {
        let id = RecordId::generate();

        assert_eq!(id.as_str().len(), RECORD_ID_LEN);
        assert!(id.as_str().chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(id, RecordId::generate());
    }
}
