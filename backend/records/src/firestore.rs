//! # Firestore documents
//!
//! The REST API wraps every field in a typed value:
//! ```json
//! { "name": "projects/p/databases/(default)/documents/reviews/AbC",
//!   "fields": { "name": { "stringValue": "Ana" }, "rating": { "integerValue": "5" } } }
//! ```
//! - Integers travel as strings
//! - Browser clients may have stored the rating as a `doubleValue`
//! - The record id is the last segment of the document `name`
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::reviews::{LanguageLabel, NewReview, RecordId, ReviewRecord};

pub const FIELD_NAME: &str = "name";
pub const FIELD_RATING: &str = "rating";
pub const FIELD_LANGUAGE: &str = "language";
pub const FIELD_DESCRIPTION: &str = "description";

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListResponse {
    #[serde(default)]
    pub documents: Vec<FirestoreDocument>,
    pub next_page_token: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FirestoreDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub fields: Map<String, Value>,
}

impl FirestoreDocument {
    pub fn id(&self) -> Option<RecordId> {
        self.name
            .as_deref()
            .and_then(|name| name.rsplit('/').next())
            .filter(|id| !id.is_empty())
            .map(RecordId::new)
    }

    /// `None` for documents without a resource name.
    pub fn into_record(self) -> Option<ReviewRecord> {
        let id = self.id()?;

        Some(ReviewRecord {
            id,
            name: string_value(&self.fields, FIELD_NAME),
            rating: integer_value(&self.fields, FIELD_RATING),
            language: LanguageLabel::from_label(&string_value(&self.fields, FIELD_LANGUAGE)),
            description: string_value(&self.fields, FIELD_DESCRIPTION),
        })
    }
}

impl From<&NewReview> for FirestoreDocument {
    fn from(review: &NewReview) -> Self {
        let mut fields = Map::new();
        fields.insert(FIELD_NAME.into(), json!({ "stringValue": review.name }));
        fields.insert(
            FIELD_RATING.into(),
            json!({ "integerValue": review.rating.get().to_string() }),
        );
        fields.insert(
            FIELD_LANGUAGE.into(),
            json!({ "stringValue": review.language.as_str() }),
        );
        fields.insert(
            FIELD_DESCRIPTION.into(),
            json!({ "stringValue": review.description }),
        );

        Self { name: None, fields }
    }
}

fn string_value(fields: &Map<String, Value>, key: &str) -> String {
    fields
        .get(key)
        .and_then(|value| value.get("stringValue"))
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn integer_value(fields: &Map<String, Value>, key: &str) -> i64 {
    let Some(value) = fields.get(key) else {
        return 0;
    };

    if let Some(integer) = value.get("integerValue") {
        return match integer {
            Value::String(s) => s.parse().unwrap_or_default(),
            other => other.as_i64().unwrap_or_default(),
        };
    }

    value
        .get("doubleValue")
        .and_then(Value::as_f64)
        .map(|double| double as i64)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reviews::Rating;

    #[test]
    fn test_create_body() {
        let review = NewReview {
            name: "Ana".to_string(),
            rating: Rating::new(5).unwrap(),
            language: LanguageLabel::English,
            description: "Great!".to_string(),
        };

        assert_eq!(
            serde_json::to_value(FirestoreDocument::from(&review)).unwrap(),
            json!({
                "fields": {
                    "name": { "stringValue": "Ana" },
                    "rating": { "integerValue": "5" },
                    "language": { "stringValue": "English" },
                    "description": { "stringValue": "Great!" },
                }
            })
        );
    }

    #[test]
    fn test_list_response() {
        let body = json!({
            "documents": [
                {
                    "name": "projects/p/databases/(default)/documents/reviews/first",
                    "fields": {
                        "name": { "stringValue": "Ana" },
                        "rating": { "integerValue": "4" },
                        "language": { "stringValue": "Deutsch" },
                        "description": { "stringValue": "Gut" },
                    }
                },
                {
                    "name": "projects/p/databases/(default)/documents/reviews/second",
                    "fields": {
                        "name": { "stringValue": "Bo" },
                        "rating": { "doubleValue": 3.0 },
                        "description": { "stringValue": "fine" },
                    }
                }
            ],
            "nextPageToken": "next"
        });

        let response: ListResponse = serde_json::from_value(body).unwrap();
        assert_eq!(response.next_page_token.as_deref(), Some("next"));

        let records: Vec<ReviewRecord> = response
            .documents
            .into_iter()
            .filter_map(FirestoreDocument::into_record)
            .collect();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].id.as_str(), "first");
        assert_eq!(records[0].rating, 4);
        assert_eq!(records[0].language, LanguageLabel::Deutsch);
        assert_eq!(records[1].rating, 3);
        assert_eq!(records[1].language, LanguageLabel::Undetermined);
    }

    #[test]
    fn test_empty_collection() {
        let response: ListResponse = serde_json::from_value(json!({})).unwrap();

        assert!(response.documents.is_empty());
        assert!(response.next_page_token.is_none());
    }

    #[test]
    fn test_document_without_name() {
        assert!(FirestoreDocument::default().into_record().is_none());
    }
}
