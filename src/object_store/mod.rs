//! C4: the optional object store (§4.4) for non-string answers.

mod fs;

pub use fs::FsObjectStore;

use async_trait::async_trait;

use crate::types::ObjectHandle;
use crate::Result;

/// Content-addressed blob storage backing non-string answers.
///
/// Storage is deduplicated by content: putting the same bytes twice returns
/// the same handle. Handles are opaque outside this trait.
#[async_trait]
pub trait ObjectStore: Send + Sync + 'static {
    /// Store `bytes`, returning the handle to retrieve them by.
    async fn put(&self, bytes: &[u8]) -> Result<ObjectHandle>;

    /// Fetch the bytes for `handle`, or `None` if no such object exists.
    async fn get(&self, handle: &ObjectHandle) -> Result<Option<Vec<u8>>>;

    /// Remove the object for `handle`. Removing a handle that does not
    /// exist is not an error.
    async fn delete(&self, handle: &ObjectHandle) -> Result<()>;
}
