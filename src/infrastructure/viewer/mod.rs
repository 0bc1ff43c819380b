pub mod viewer;

pub use viewer::{new_request_id, Principal, ViewerContext};
