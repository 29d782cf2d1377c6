use std::sync::Arc;

use crate::application::comments::CommentService;
use crate::infra::db::PostgresRepositories;

#[derive(Clone)]
pub struct HttpState {
    pub comments: Arc<CommentService>,
    /// Database probed by `/health`; `None` when running on in-memory storage.
    pub db: Option<Arc<PostgresRepositories>>,
}

impl HttpState {
    pub fn new(comments: Arc<CommentService>, db: Option<Arc<PostgresRepositories>>) -> Self {
        Self { comments, db }
    }
}
