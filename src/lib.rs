//! modelcache - a semantic response cache for LLM interactions
//!
//! Given a model scope and a prompt, `modelcache` looks up semantically
//! similar previously-answered prompts via an embedding model, a per-model
//! vector index, and a similarity evaluator, hydrating hits through a
//! bounded in-memory tier backed by an adaptive eviction policy (ARC or
//! W-TinyLFU) before falling back to the durable scalar store.
//!
//! The engine is built from pluggable backends behind trait objects —
//! [`embedding::Embedder`], [`vector::VectorIndex`], [`scalar::ScalarStore`],
//! [`object_store::ObjectStore`] — with an in-process default for each, so a
//! deployment can swap in a different vector index or durable store without
//! touching [`adapter::CacheEngine`].
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use modelcache::adapter::CacheEngine;
//! use modelcache::config::CacheEngineConfig;
//! use modelcache::embedding::{EmbeddingDispatcher, EmbeddingDispatcherConfig};
//! use modelcache::manager::DataManager;
//! use modelcache::object_store::FsObjectStore;
//! use modelcache::scalar::MemoryScalarStore;
//! use modelcache::similarity::L2Evaluator;
//! use modelcache::tier::{EvictionPolicyKind, MemoryTier};
//! use modelcache::vector::FlatIndex;
//!
//! # struct MyEmbedder;
//! # #[async_trait::async_trait]
//! # impl modelcache::embedding::Embedder for MyEmbedder {
//! #     async fn embed(&self, text: &str) -> modelcache::Result<modelcache::types::Embedding> {
//! #         Ok(modelcache::types::Embedding::new(vec![0.0; 8], "my-model"))
//! #     }
//! #     fn dimensions(&self) -> usize { 8 }
//! #     fn model_name(&self) -> &str { "my-model" }
//! # }
//! # async fn run() -> modelcache::Result<()> {
//! let manager = Arc::new(DataManager::new(
//!     Arc::new(FlatIndex::new()),
//!     Arc::new(MemoryScalarStore::new()),
//!     Arc::new(FsObjectStore::new("./objects")),
//!     Arc::new(MemoryTier::new(EvictionPolicyKind::Arc, 10_000)),
//! ));
//! let embedder = EmbeddingDispatcher::spawn(Arc::new(MyEmbedder), EmbeddingDispatcherConfig::default());
//! // The evaluator passed to `CacheEngine::new` must match `config.metric`
//! // (`cached`'s own startup wiring in `src/bin/cached.rs` picks one from
//! // the other) — here that means overriding the default `Cosine` metric
//! // to line up with `L2Evaluator`.
//! let mut config = CacheEngineConfig::default();
//! config.metric = modelcache::config::MetricKind::L2;
//! let engine = CacheEngine::new(embedder, manager, Arc::new(L2Evaluator::default()), config);
//! # let _ = engine;
//! # Ok(())
//! # }
//! ```

pub mod adapter;
pub mod config;
pub mod embedding;
pub mod error;
pub mod manager;
pub mod object_store;
pub mod processing;
pub mod scalar;
#[cfg(feature = "server")]
pub mod server;
pub mod similarity;
pub mod telemetry;
pub mod tier;
pub mod types;
pub mod vector;
pub mod version;

pub use adapter::CacheEngine;
pub use error::{CacheError, Result};
