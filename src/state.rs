use std::sync::Arc;

use crate::cache::PageCache;
use crate::config::Config;
use crate::media::MediaStorage;
use crate::pagination::Paginator;
use crate::store::Store;

/// Everything a handler needs, shared behind one `Arc`.
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub cache: PageCache,
    pub paginator: Paginator,
    pub media: MediaStorage,
    /// Body limit of the post create/edit routes.
    pub max_upload_bytes: usize,
}

pub type SharedState = Arc<AppState>;

impl AppState {
    pub fn new(store: Arc<dyn Store>, config: &Config) -> SharedState {
        Arc::new(AppState {
            store,
            cache: PageCache::new(config.index_cache_ttl),
            paginator: Paginator::new(config.posts_per_page),
            media: MediaStorage::new(config.media_root.clone()),
            max_upload_bytes: config.max_upload_bytes,
        })
    }
}
