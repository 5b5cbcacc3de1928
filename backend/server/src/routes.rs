use std::sync::Arc;

use axum::{
    Form,
    extract::{Path, State as AxumState},
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
};
use records::RecordId;
use serde::Deserialize;

use crate::{
    error::AppError,
    form::{Draft, ReviewForm},
    page::{DeleteError, SubmitError},
    render::{RenderOptions, render_page},
    state::State,
};

const SAVE_FAILED: &str = "Could not save your review, please try again.";
const DELETE_FAILED: &str = "Could not delete the review, please try again.";
const CLOSED: &str = "The page is shutting down.";

#[derive(Deserialize)]
pub struct GoogleCredential {
    #[serde(default)]
    credential: String,
}

#[derive(Deserialize)]
pub struct Registration {
    email: String,
    password: String,
}

fn render(state: &State, status: StatusCode, notice: Option<&str>) -> Response {
    let options = RenderOptions {
        google_client_id: state.config.google_client_id.as_deref(),
        sign_up_enabled: state.auth.is_configured(),
        notice,
    };

    (status, Html(render_page(&state.page.snapshot(), &options))).into_response()
}

fn home() -> Response {
    Redirect::to("/").into_response()
}

pub async fn page_handler(AxumState(state): AxumState<Arc<State>>) -> Response {
    render(&state, StatusCode::OK, None)
}

pub async fn submit_handler(
    AxumState(state): AxumState<Arc<State>>,
    Form(form): Form<ReviewForm>,
) -> Response {
    match state.page.submit(Draft::from(form)).await {
        Ok(_) => home(),
        Err(SubmitError::Invalid(_)) => render(&state, StatusCode::UNPROCESSABLE_ENTITY, None),
        Err(SubmitError::Store(_)) => {
            render(&state, StatusCode::SERVICE_UNAVAILABLE, Some(SAVE_FAILED))
        }
        Err(SubmitError::Closed) => (StatusCode::SERVICE_UNAVAILABLE, CLOSED).into_response(),
    }
}

pub async fn delete_handler(
    AxumState(state): AxumState<Arc<State>>,
    Path(id): Path<String>,
) -> Response {
    match state.page.request_delete(&RecordId::new(id)).await {
        Ok(()) => home(),
        Err(DeleteError::Auth(e)) => {
            render(&state, AppError::from(e.clone()).status(), Some(&e.to_string()))
        }
        Err(DeleteError::Store(_)) => {
            render(&state, StatusCode::SERVICE_UNAVAILABLE, Some(DELETE_FAILED))
        }
        Err(DeleteError::Closed) => (StatusCode::SERVICE_UNAVAILABLE, CLOSED).into_response(),
    }
}

pub async fn google_handler(
    AxumState(state): AxumState<Arc<State>>,
    Form(payload): Form<GoogleCredential>,
) -> Result<Response, AppError> {
    if payload.credential.trim().is_empty() {
        return Err(AppError::MalformedPayload);
    }

    state.auth.sign_in_with_google(&payload.credential).await?;
    Ok(home())
}

pub async fn register_handler(
    AxumState(state): AxumState<Arc<State>>,
    Form(payload): Form<Registration>,
) -> Result<Response, AppError> {
    if payload.email.trim().is_empty() || payload.password.is_empty() {
        return Err(AppError::MalformedPayload);
    }

    state
        .auth
        .sign_up_with_password(payload.email.trim(), &payload.password)
        .await?;
    Ok(home())
}

pub async fn logout_handler(AxumState(state): AxumState<Arc<State>>) -> Response {
    state.auth.sign_out();
    home()
}

pub async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}
