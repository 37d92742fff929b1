use std::sync::Arc;

use axum::extract::FromRef;
use shala_studio::Studio;

#[derive(Clone, FromRef)]
pub struct ServerContext {
    pub studio: Arc<Studio>,
}
