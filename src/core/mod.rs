// Core types and primitives shared by the store and the services

pub mod pagination;
pub mod strong_types;

pub use pagination::{Page, PageRequest, PageWindow, FEED_PAGE_SIZE};
pub use strong_types::{from_millis, now_millis, to_millis, CommentId, GroupId, PostId, UserId};
