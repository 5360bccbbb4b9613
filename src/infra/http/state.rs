use std::sync::Arc;

use crate::application::auth::AuthService;
use crate::application::feed::FeedService;
use crate::application::repos::StoreHealth;

#[derive(Clone)]
pub struct HttpState {
    pub feed: Arc<FeedService>,
    pub auth: Arc<AuthService>,
    pub store: Arc<dyn StoreHealth>,
}
