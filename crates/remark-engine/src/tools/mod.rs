mod fetch_comments;

pub use fetch_comments::{FetchCommentsTool, DEFAULT_COMMENTS_URL};
