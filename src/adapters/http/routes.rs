use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
    Json,
};
use tracing::error;

use super::{
    multipart::read_image,
    session::CurrentSession,
    state::HttpState,
    views::Outcome,
};
use crate::application::{
    dto::{ErrorResponse, HealthResponse, InspectResponse, SessionResponse},
    sessions::Flash,
};
use crate::domain::errors::{DomainResult, InspectError};
use crate::domain::input::InspectionImage;

fn status_for(err: &InspectError) -> StatusCode {
    match err {
        InspectError::UnsupportedFormat(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
        InspectError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        InspectError::Authentication(_)
        | InspectError::Transport(_)
        | InspectError::MalformedResponse(_) => StatusCode::BAD_GATEWAY,
        InspectError::Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn error_json(err: &InspectError) -> Response {
    (status_for(err), Json(ErrorResponse::from(err))).into_response()
}

async fn require_image(form: Multipart) -> DomainResult<InspectionImage> {
    read_image(form)
        .await?
        .ok_or_else(|| InspectError::InvalidInput("capture or upload an image first".into()))
}

/// Dashboard for the caller's session, with the outcome of its last form submission (once).
pub async fn dashboard(State(st): State<HttpState>, current: CurrentSession) -> Response {
    let flash = current.session.take_flash();
    let stats = current.session.snapshot();
    match st.views.render_page(&stats, &Outcome::from(flash.as_ref())) {
        Ok(html) => current.respond(Html(html)),
        Err(e) => {
            error!("dashboard template failed: {e:#}");
            current.respond((StatusCode::INTERNAL_SERVER_ERROR, "page rendering failed"))
        }
    }
}

/// Form submit from the dashboard. The outcome is parked on the session and the
/// browser is sent back to `/`, so reloading the page never re-runs an inspection.
pub async fn inspect_form(State(st): State<HttpState>, current: CurrentSession, form: Multipart) -> Response {
    let flash = match require_image(form).await {
        Ok(image) => match st.inspection.inspect(&current.session, &image).await {
            Ok(display) => Flash::Verdict { display, image },
            Err(e) => Flash::Failed(e),
        },
        Err(e) => Flash::Failed(e),
    };
    current.session.set_flash(flash);
    current.respond(Redirect::to("/"))
}

pub async fn inspect_api(State(st): State<HttpState>, current: CurrentSession, form: Multipart) -> Response {
    let image = match require_image(form).await {
        Ok(image) => image,
        Err(e) => return current.respond(error_json(&e)),
    };

    match st.inspection.inspect(&current.session, &image).await {
        Ok(display) => current.respond(Json(InspectResponse {
            source: image.source,
            score_text: display.score_text(),
            result: display,
            session: current.session.snapshot().into(),
        })),
        Err(e) => current.respond(error_json(&e)),
    }
}

pub async fn session_stats(current: CurrentSession) -> Response {
    let body: SessionResponse = current.session.snapshot().into();
    current.respond(Json(body))
}

pub async fn healthz(State(st): State<HttpState>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".into(),
        endpoint_ready: st.inspection.endpoint_ready(),
        active_sessions: st.sessions.len(),
    })
}
