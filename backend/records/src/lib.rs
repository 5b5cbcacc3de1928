//! # Records
//!
//! Shared shape of a review, both in memory and as stored documents.
//!
//! ## Schema
//! - Collection of flat documents, one per review
//! - Fields: name (**string**), rating (**int** 1-5), language (**string**), description (**string**)
//! - Identifier is assigned by the store and never stored inside the document
//!
//! ## Language
//! - Stored as the human readable label, not the classifier code
//! - `-` when the classifier could not decide or answered with a code we do not label
//!
//! ## Encodings
//! - Firestore REST: typed values (`stringValue`, `integerValue`, ...), see [`firestore`]
//! - Redis: plain JSON object per hash field, see [`Document`]
pub mod firestore;
pub mod reviews;

pub use reviews::{Document, LanguageLabel, NewReview, Rating, RecordId, ReviewRecord};
