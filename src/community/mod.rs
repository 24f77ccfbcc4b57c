//! Reader interaction with archived documents: threaded comments and likes

pub mod comments;
pub mod likes;

pub use comments::{build_threads, CommentRequest, CommentService};
pub use likes::LikeService;
