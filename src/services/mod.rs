// Services: feed composition, relationship queries and mutation handlers

pub mod admin;
pub mod feed;
pub mod posts;
pub mod profiles;
pub mod relationships;
pub mod social;
pub mod validation;

pub use admin::AdminService;
pub use feed::{FeedComposer, FeedContext, FeedPage, FeedSubject};
pub use posts::{CommentForm, PostDetail, PostEditForm, PostForm, PostService};
pub use profiles::{Profile, ProfileService};
pub use relationships::RelationshipIndex;
pub use social::{EdgeChange, SocialService};
