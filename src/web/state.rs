use std::sync::Arc;

use paperpost::DisplayService;

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<DisplayService>,
}
