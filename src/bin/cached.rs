//! cached — modelcache daemon.
//!
//! Serves a [`CacheEngine`](modelcache::adapter::CacheEngine) over HTTP,
//! letting multiple clients share one cache instance and its backends.

use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use tracing::info;

use modelcache::adapter::CacheEngine;
use modelcache::embedding::{EmbeddingDispatcher, EmbeddingDispatcherConfig};
use modelcache::manager::DataManager;
use modelcache::object_store::FsObjectStore;
use modelcache::scalar::MemoryScalarStore;
use modelcache::server::config::Config;
use modelcache::similarity::{CosineEvaluator, L2Evaluator, SimilarityEvaluator};
use modelcache::tier::{EvictionPolicyKind, MemoryTier};
use modelcache::vector::VectorIndex;

/// modelcache daemon — semantic response cache service.
#[derive(Parser)]
#[command(name = "cached")]
#[command(version = modelcache::version::PKG_VERSION)]
#[command(about = "modelcache semantic response cache daemon")]
struct Args {
    /// Path to configuration file.
    #[arg(short, long)]
    config: Option<std::path::PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let config = Config::load(args.config.as_deref())?;

    let vector_index: Arc<dyn VectorIndex> = build_vector_index();
    let scalar_store = build_scalar_store(&config.storage.scalar_store_url).await?;
    let object_store = Arc::new(FsObjectStore::new(&config.storage.object_store_dir));
    let tier = Arc::new(MemoryTier::new(EvictionPolicyKind::Arc, config.cache.tier_capacity_per_model));

    let manager = Arc::new(DataManager::with_normalize(
        vector_index,
        scalar_store,
        object_store,
        tier,
        config.cache.normalize,
    ));

    let embedder = build_embedder(&config.cache);

    let evaluator: Arc<dyn SimilarityEvaluator> = match config.cache.metric {
        modelcache::config::MetricKind::Cosine => Arc::new(CosineEvaluator),
        modelcache::config::MetricKind::L2 => Arc::new(L2Evaluator::default()),
    };

    let manager_for_shutdown = Arc::clone(&manager);
    let engine = Arc::new(CacheEngine::new(embedder, manager, evaluator, config.cache.clone()));

    let addr: SocketAddr = config
        .server
        .address
        .parse()
        .map_err(|e| modelcache::CacheError::Configuration(format!("invalid address: {e}")))?;

    info!(version = modelcache::version::version_string(), %addr, "cached starting");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    let app = modelcache::server::router(engine);

    let shutdown = async {
        tokio::signal::ctrl_c().await.expect("failed to install CTRL+C handler");
        info!("shutdown signal received, draining connections");
    };

    axum::serve(listener, app).with_graceful_shutdown(shutdown).await?;

    if let Err(err) = manager_for_shutdown.flush().await {
        tracing::warn!(error = %err, "flush on shutdown failed");
    }
    info!("cached stopped");
    Ok(())
}

#[cfg(feature = "hnsw")]
fn build_vector_index() -> Arc<dyn VectorIndex> {
    Arc::new(modelcache::vector::HnswIndex::new())
}

#[cfg(not(feature = "hnsw"))]
fn build_vector_index() -> Arc<dyn VectorIndex> {
    Arc::new(modelcache::vector::FlatIndex::new())
}

#[cfg(feature = "sqlite")]
async fn build_scalar_store(
    url: &str,
) -> Result<Arc<dyn modelcache::scalar::ScalarStore>, Box<dyn std::error::Error>> {
    if let Some(path) = url.strip_prefix("sqlite:") {
        let store = modelcache::scalar::SqliteScalarStore::connect(path).await?;
        return Ok(Arc::new(store));
    }
    Ok(Arc::new(MemoryScalarStore::new()))
}

#[cfg(not(feature = "sqlite"))]
async fn build_scalar_store(
    _url: &str,
) -> Result<Arc<dyn modelcache::scalar::ScalarStore>, Box<dyn std::error::Error>> {
    Ok(Arc::new(MemoryScalarStore::new()))
}

#[cfg(feature = "local-embeddings")]
fn build_embedder(config: &modelcache::config::CacheEngineConfig) -> EmbeddingDispatcher {
    let embedder = modelcache::embedding::FastEmbedder::try_new("BAAI/bge-small-en-v1.5")
        .expect("failed to load local embedding model");
    EmbeddingDispatcher::spawn(
        Arc::new(embedder),
        EmbeddingDispatcherConfig { queue_capacity: config.embed_queue_capacity, workers: config.embed_workers },
    )
}

#[cfg(not(feature = "local-embeddings"))]
fn build_embedder(_config: &modelcache::config::CacheEngineConfig) -> EmbeddingDispatcher {
    panic!(
        "cached requires an Embedder backend; build with --features local-embeddings or wire a custom one via the library API"
    );
}
