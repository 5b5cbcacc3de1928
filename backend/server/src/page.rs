//! # Review page
//!
//! Server side state of the single review page.
//!
//! ## State
//! - Draft being edited plus the errors of its last rejected submission
//! - Last good list of reviews, replaced only by a successful read
//! - Session presence, fed by a [`SessionWatch`] subscription
//!
//! ## Draft lifecycle
//! `Empty -> Editing -> (validating) -> Rejected | Submitted`, where a rejected draft keeps its
//! values and errors for the next render and a submitted one goes back to `Empty`. The browser
//! holds the draft while it is typed, the server sees it on submit. A draft whose write failed
//! is back in `Editing`.
//!
//! ## Consistency
//! - Every mutation is followed by a full re-read of the collection, no optimistic updates
//! - The view lock is never held across store I/O, so mutations may interleave and a
//!   refresh may or may not include a concurrent write
//! - After [`ReviewPage::teardown`] nothing touches the view again: late store answers and
//!   late session callbacks are dropped
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use records::{LanguageLabel, RecordId, ReviewRecord};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::{
    auth::{AuthError, Session, SessionWatch, Subscription},
    database::{ReviewStore, StoreError},
    form::{Draft, FieldErrors, ValidDraft, validate},
    language::{LanguageClassifier, classify_language},
};

#[derive(Error, Debug)]
pub enum SubmitError {
    #[error("Review has invalid fields")]
    Invalid(FieldErrors),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Page is closed")]
    Closed,
}

#[derive(Error, Debug)]
pub enum DeleteError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Page is closed")]
    Closed,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DraftStage {
    #[default]
    Empty,
    Editing,
    Rejected,
}

impl DraftStage {
    pub fn as_str(self) -> &'static str {
        match self {
            DraftStage::Empty => "empty",
            DraftStage::Editing => "editing",
            DraftStage::Rejected => "rejected",
        }
    }
}

#[derive(Debug, Default)]
struct View {
    draft: Draft,
    stage: DraftStage,
    errors: FieldErrors,
    reviews: Vec<ReviewRecord>,
    session: Option<Session>,
    closed: bool,
}

/// Copy of the page state for rendering.
#[derive(Debug, Clone)]
pub struct PageSnapshot {
    pub draft: Draft,
    pub stage: DraftStage,
    pub errors: FieldErrors,
    pub reviews: Vec<ReviewRecord>,
    pub session: Option<Session>,
    pub max_description_chars: usize,
}

impl PageSnapshot {
    pub fn is_authenticated(&self) -> bool {
        self.session.is_some()
    }

    pub fn description_too_long(&self) -> bool {
        self.draft.description_chars() > self.max_description_chars
    }
}

fn lock(view: &Mutex<View>) -> MutexGuard<'_, View> {
    view.lock().unwrap_or_else(PoisonError::into_inner)
}

pub struct ReviewPage {
    store: Arc<dyn ReviewStore>,
    classifier: Arc<dyn LanguageClassifier>,
    max_description_chars: usize,
    view: Arc<Mutex<View>>,
    subscription: Mutex<Option<Subscription>>,
}

impl ReviewPage {
    pub fn new(
        store: Arc<dyn ReviewStore>,
        classifier: Arc<dyn LanguageClassifier>,
        max_description_chars: usize,
    ) -> Self {
        Self {
            store,
            classifier,
            max_description_chars,
            view: Arc::new(Mutex::new(View::default())),
            subscription: Mutex::new(None),
        }
    }

    /// Starts observing the session, replacing any earlier subscription.
    ///
    /// The callback ignores the value it is handed and reads the watch again while holding the
    /// view lock. Overlapping `set` calls may deliver their values out of order, the last
    /// callback to take the lock always copies the newest one.
    pub fn attach(&self, sessions: &SessionWatch) {
        let view = Arc::downgrade(&self.view);
        let watch = sessions.clone();

        let subscription = sessions.subscribe(move |_| {
            let Some(view) = view.upgrade() else {
                return;
            };
            let mut view = lock(&view);
            if view.closed {
                debug!("Ignoring session change after teardown");
                return;
            }
            view.session = watch.current();
        });

        *self
            .subscription
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(subscription);
    }

    /// Attaches to the session and performs the initial load. A failed load leaves the
    /// list empty and is only logged.
    pub async fn mount(&self, sessions: &SessionWatch) {
        self.attach(sessions);

        if let Err(e) = self.refresh().await {
            warn!("Initial review load failed: {e}");
        }
    }

    /// Stops observing the session and freezes the view.
    pub fn teardown(&self) {
        if let Some(subscription) = self
            .subscription
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            subscription.unsubscribe();
        }

        lock(&self.view).closed = true;
        info!("Review page torn down");
    }

    pub fn snapshot(&self) -> PageSnapshot {
        let view = lock(&self.view);

        PageSnapshot {
            draft: view.draft.clone(),
            stage: view.stage,
            errors: view.errors.clone(),
            reviews: view.reviews.clone(),
            session: view.session.clone(),
            max_description_chars: self.max_description_chars,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        lock(&self.view).session.is_some()
    }

    pub fn max_description_chars(&self) -> usize {
        self.max_description_chars
    }

    /// Runs `update` unless the page was torn down.
    fn apply<R>(&self, update: impl FnOnce(&mut View) -> R) -> Option<R> {
        let mut view = lock(&self.view);
        if view.closed {
            return None;
        }
        Some(update(&mut view))
    }

    pub fn validate(&self, draft: &Draft) -> Result<ValidDraft, FieldErrors> {
        validate(draft, self.max_description_chars)
    }

    pub fn classify_language(&self, text: &str) -> LanguageLabel {
        classify_language(self.classifier.as_ref(), text)
    }

    /// Re-reads the whole collection. On failure the last good list stays in place.
    pub async fn refresh(&self) -> Result<(), StoreError> {
        match self.store.list_all().await {
            Ok(reviews) => {
                let count = reviews.len();
                if self.apply(|view| view.reviews = reviews).is_none() {
                    debug!("Dropping review list that arrived after teardown");
                } else {
                    debug!("Loaded {count} reviews");
                }
                Ok(())
            }
            Err(e) => {
                warn!("Failed to load reviews, keeping previous list: {e}");
                Err(e)
            }
        }
    }

    /// Validates, tags and stores one review, then refreshes the list.
    ///
    /// Exactly one store write happens on success and none on a rejected draft. A failed
    /// write is not retried and keeps the draft for the user to try again.
    pub async fn submit(&self, draft: Draft) -> Result<RecordId, SubmitError> {
        if lock(&self.view).closed {
            return Err(SubmitError::Closed);
        }

        let valid = match self.validate(&draft) {
            Ok(valid) => valid,
            Err(errors) => {
                debug!("Rejected review draft: {errors:?}");
                self.apply(|view| {
                    view.draft = draft;
                    view.errors = errors.clone();
                    view.stage = DraftStage::Rejected;
                });
                return Err(SubmitError::Invalid(errors));
            }
        };

        let language = self.classify_language(&valid.description);
        let review = valid.into_review(language);

        let id = match self.store.create(&review).await {
            Ok(id) => id,
            Err(e) => {
                warn!("Failed to store review: {e}");
                self.apply(|view| {
                    view.draft = draft;
                    view.errors.clear();
                    view.stage = DraftStage::Editing;
                });
                return Err(e.into());
            }
        };
        info!("Stored review {id} ({language})");

        self.apply(|view| {
            view.draft = Draft::default();
            view.errors.clear();
            view.stage = DraftStage::Empty;
        });

        // the write already happened, a failed re-read only leaves the list stale
        let _ = self.refresh().await;

        Ok(id)
    }

    /// Deletes a review if a session is present, then refreshes the list.
    pub async fn request_delete(&self, id: &RecordId) -> Result<(), DeleteError> {
        {
            let view = lock(&self.view);
            if view.closed {
                return Err(DeleteError::Closed);
            }
            if view.session.is_none() {
                debug!("Refusing anonymous delete of {id}");
                return Err(AuthError::NotAuthenticated.into());
            }
        }

        if let Err(e) = self.store.delete_by_id(id).await {
            warn!("Failed to delete review {id}: {e}");
            return Err(e.into());
        }
        info!("Deleted review {id}");

        let _ = self.refresh().await;

        Ok(())
    }
}
