pub mod document_cache;
pub mod draft_store;
pub mod expiring;
pub mod view_store;

pub use document_cache::{CachedDocuments, ChildAttachments, DocumentCache};
pub use draft_store::{DraftStore, DraftStoreStats};
pub use expiring::{EntryHandle, ExpiringEntry, ExpiringStore, StoreStats};
pub use view_store::{ViewStore, ViewStoreStats};
