/// Directed edge: `user_id` follows `author_id`. A pair exists at most once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Follow {
    pub user_id: i64,
    pub author_id: i64,
}

impl Follow {
    pub fn new(user_id: i64, author_id: i64) -> Self {
        Follow { user_id, author_id }
    }
}
