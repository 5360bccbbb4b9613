use listings_api_types::{AdResponse, AuthResponse, FeedResponse};
use uuid::Uuid;

use crate::application::auth::AuthSession;
use crate::application::pagination::NumberedPage;
use crate::application::shaping::AdView;

pub fn ad_response(view: AdView) -> AdResponse {
    let AdView { record, is_owner } = view;
    AdResponse {
        id: record.id,
        owner_id: record.owner_id,
        author_username: record.owner_username,
        caption: record.caption,
        description: record.description,
        image_url: record.image_url,
        price: record.price.minor_units(),
        created_at: record.created_at,
        updated_at: record.updated_at,
        is_owner,
    }
}

pub fn feed_response(page: NumberedPage<AdView>) -> FeedResponse {
    let page = page.map(ad_response);
    FeedResponse {
        ads: page.items,
        page: page.page,
        page_size: page.page_size,
        total: page.total,
        total_pages: page.total_pages,
    }
}

pub fn auth_response(session: AuthSession, current_user: Option<Uuid>) -> AuthResponse {
    AuthResponse {
        id: session.user.id,
        username: session.user.username,
        created_at: session.user.created_at,
        token: session.token,
        is_authorized: true,
        current_user,
    }
}
