pub mod app;
pub mod config;
pub mod domain;
pub mod http;
pub mod infra;

use std::sync::Arc;

use crate::app::follow::FollowService;
use crate::app::visibility::VisibilityPolicy;
use crate::infra::store::RelationshipStore;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn RelationshipStore>,
    pub follows: FollowService,
}

impl AppState {
    pub fn new(store: Arc<dyn RelationshipStore>, policy: VisibilityPolicy) -> Self {
        let follows = FollowService::new(store.clone(), policy);
        Self { store, follows }
    }
}
