//! Vertex AI online prediction, authenticated with Google OAuth2 credentials.

pub mod credentials;
pub mod endpoint;
pub mod vertex;
