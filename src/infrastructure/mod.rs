// Infrastructure: persistence, caching and request identity

pub mod feed_cache;        // Time-bounded global feed slot
pub mod middleware;        // Viewer context middleware and extractor
pub mod sqlite_store;      // SQLite entity store
pub mod store;             // Entity store interface
pub mod viewer;            // Viewer context

pub use feed_cache::{CacheStats, TimedSlot};
pub use middleware::{viewer_context_middleware, HasIdentity, Vc};
pub use sqlite_store::SqliteStore;
pub use store::{EntityStore, PostFilter, PostUpdate};
pub use viewer::{Principal, ViewerContext};
