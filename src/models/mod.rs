// Persisted entities and the read models composed from them

pub mod entities;
pub mod views;

pub use entities::{Comment, Group, Image, NewGroup, NewPost, Post, PostChanges, User};
pub use views::{CommentView, GroupRef, PostView};
