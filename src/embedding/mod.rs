//! C1: the embedding dispatcher (§4.1).

mod dispatcher;
#[cfg(feature = "local-embeddings")]
mod fastembed;

pub use dispatcher::{EmbeddingDispatcher, EmbeddingDispatcherConfig};
#[cfg(feature = "local-embeddings")]
pub use fastembed::FastEmbedder;

use async_trait::async_trait;

use crate::types::Embedding;
use crate::Result;

/// Turns prompt text into a fixed-dimension vector for one embedding model.
///
/// Implementations are expected to be cheap to clone (an `Arc` internally)
/// and safe to call concurrently; the dispatcher is the only thing that
/// serialises access when a backend needs it.
#[async_trait]
pub trait Embedder: Send + Sync + 'static {
    /// Embed a single piece of already pre-processed prompt text.
    async fn embed(&self, text: &str) -> Result<Embedding>;

    /// The dimensionality of vectors this embedder produces.
    fn dimensions(&self) -> usize;

    /// The model name entries embedded by this backend are tagged with.
    fn model_name(&self) -> &str;
}
