use std::sync::Arc;

use crate::{config::Config, services::auth::AuthService};

#[derive(Clone)]
pub struct AppState {
    pub auth: Arc<AuthService>,
    pub config: Config,
}

impl AppState {
    pub fn new(auth: Arc<AuthService>, config: Config) -> Self {
        Self { auth, config }
    }
}
