//! # Firestore
//!
//! Review collection kept in Cloud Firestore, spoken to over the REST API.
//!
//! - Collection url: `{FIRESTORE_URL}/projects/{project}/databases/(default)/documents/{collection}`
//! - Requests are authorised with the web API key, same as the browser SDK
//! - Listing follows `nextPageToken` until the collection is exhausted
//! - Deleting a missing document answers 200, a 404 is folded into success too
use async_trait::async_trait;
use records::{
    NewReview, RecordId, ReviewRecord,
    firestore::{FirestoreDocument, ListResponse},
};
use reqwest::{Client, StatusCode, Url};
use tracing::debug;

use crate::{
    config::Config,
    database::{ReviewStore, StoreError},
};

pub struct FirestoreStore {
    client: Client,
    collection_url: Url,
    api_key: String,
}

impl FirestoreStore {
    pub fn new(
        client: Client,
        base_url: &str,
        project_id: &str,
        collection: &str,
        api_key: &str,
    ) -> Result<Self, StoreError> {
        let collection_url = collection_url(base_url, project_id, collection)?;

        Ok(Self {
            client,
            collection_url,
            api_key: api_key.to_string(),
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, StoreError> {
        let missing = |key: &str| StoreError::Unavailable(format!("{key} not configured"));

        let project_id = config
            .firebase_project_id
            .as_deref()
            .ok_or_else(|| missing("FIREBASE_PROJECT_ID"))?;
        let api_key = config
            .firebase_api_key
            .as_deref()
            .ok_or_else(|| missing("FIREBASE_API_KEY"))?;

        Self::new(
            Client::new(),
            &config.firestore_url,
            project_id,
            &config.collection,
            api_key,
        )
    }

    fn document_url(&self, id: &RecordId) -> Result<Url, StoreError> {
        let mut url = self.collection_url.clone();
        url.path_segments_mut()
            .map_err(|_| StoreError::Unavailable("collection url cannot be a base".to_string()))?
            .push(id.as_str());

        Ok(url)
    }
}

fn collection_url(base_url: &str, project_id: &str, collection: &str) -> Result<Url, StoreError> {
    let mut url = Url::parse(base_url)
        .map_err(|e| StoreError::Unavailable(format!("invalid Firestore url {base_url}: {e}")))?;

    url.path_segments_mut()
        .map_err(|_| StoreError::Unavailable(format!("invalid Firestore url {base_url}")))?
        .pop_if_empty()
        .extend([
            "projects",
            project_id,
            "databases",
            "(default)",
            "documents",
            collection,
        ]);

    Ok(url)
}

#[async_trait]
impl ReviewStore for FirestoreStore {
    async fn list_all(&self) -> Result<Vec<ReviewRecord>, StoreError> {
        let mut records = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut request = self
                .client
                .get(self.collection_url.clone())
                .query(&[("key", self.api_key.as_str())]);
            if let Some(token) = &page_token {
                request = request.query(&[("pageToken", token.as_str())]);
            }

            let page: ListResponse = request.send().await?.error_for_status()?.json().await?;

            records.extend(
                page.documents
                    .into_iter()
                    .filter_map(FirestoreDocument::into_record),
            );

            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }

        debug!("Listed {} reviews from Firestore", records.len());
        Ok(records)
    }

    async fn create(&self, review: &NewReview) -> Result<RecordId, StoreError> {
        let created: FirestoreDocument = self
            .client
            .post(self.collection_url.clone())
            .query(&[("key", self.api_key.as_str())])
            .json(&FirestoreDocument::from(review))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        created
            .id()
            .ok_or_else(|| StoreError::Unavailable("created document has no name".to_string()))
    }

    async fn delete_by_id(&self, id: &RecordId) -> Result<(), StoreError> {
        let response = self
            .client
            .delete(self.document_url(id)?)
            .query(&[("key", self.api_key.as_str())])
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            debug!("Review {id} already gone");
            return Ok(());
        }

        response.error_for_status()?;
        Ok(())
    }
}
