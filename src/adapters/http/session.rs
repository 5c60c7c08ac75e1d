use std::convert::Infallible;

use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts, HeaderMap, HeaderValue},
    response::{IntoResponse, Response},
};
use uuid::Uuid;

use super::state::HttpState;
use crate::application::sessions::SessionHandle;

pub const SESSION_COOKIE: &str = "weld_session";

/// The caller's session, resolved from the `weld_session` cookie.
pub struct CurrentSession {
    pub id: Uuid,
    pub session: SessionHandle,
    is_new: bool,
}

impl FromRequestParts<HttpState> for CurrentSession {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &HttpState) -> Result<Self, Self::Rejection> {
        let lease = state.sessions.resolve(session_id(&parts.headers));
        Ok(Self { id: lease.id, session: lease.session, is_new: lease.is_new })
    }
}

impl CurrentSession {
    /// Attaches the session cookie when this request started the session.
    pub fn respond(&self, body: impl IntoResponse) -> Response {
        let mut response = body.into_response();
        if self.is_new {
            if let Ok(value) = HeaderValue::from_str(&session_cookie(self.id)) {
                response.headers_mut().append(header::SET_COOKIE, value);
            }
        }
        response
    }
}

pub fn session_id(headers: &HeaderMap) -> Option<Uuid> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .and_then(|(_, value)| Uuid::parse_str(value.trim()).ok())
}

fn session_cookie(id: Uuid) -> String {
    format!("{SESSION_COOKIE}={id}; Path=/; HttpOnly; SameSite=Lax")
}
