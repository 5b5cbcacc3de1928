use std::sync::Arc;

use anyhow::Context;

use super::{
    auth::{Auth, SessionWatch},
    config::Config,
    database::{ReviewStore, init_store},
    language::{LanguageClassifier, WhatlangClassifier},
    page::ReviewPage,
};

pub struct State {
    pub config: Config,
    pub auth: Auth,
    pub page: ReviewPage,
}

impl State {
    pub async fn new(config: Config) -> anyhow::Result<Arc<Self>> {
        let store = init_store(&config)
            .await
            .context("Failed to initialize review store")?;
        let classifier = Arc::new(WhatlangClassifier::new(config.min_detect_chars));
        let auth = Auth::from_config(&config, SessionWatch::new())
            .context("Failed to initialize identity provider")?;

        let state = Self::from_parts(config, store, classifier, auth);
        state.page.mount(state.auth.sessions()).await;

        Ok(state)
    }

    /// Wires already built collaborators. The page is not mounted yet.
    pub fn from_parts(
        config: Config,
        store: Arc<dyn ReviewStore>,
        classifier: Arc<dyn LanguageClassifier>,
        auth: Auth,
    ) -> Arc<Self> {
        let page = ReviewPage::new(store, classifier, config.max_description_chars);

        Arc::new(Self { config, auth, page })
    }
}
