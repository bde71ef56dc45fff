// SPDX-FileCopyrightText: 2026 Waypoint Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `waypoint serve`: wire configuration into a running router.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use waypoint_cache::{CacheStore, LexicalSimilarityCache, MemoryCache};
use waypoint_config::WaypointConfig;
use waypoint_config::model::CacheConfig;
use waypoint_core::WaypointError;
use waypoint_gateway::{AuthConfig, GatewayState, ServerConfig};
use waypoint_prometheus::PrometheusAdapter;
use waypoint_provider::ProviderPool;
use waypoint_router::Orchestrator;

/// Run the router until SIGINT or SIGTERM.
pub async fn run_serve(config: WaypointConfig) -> Result<(), WaypointError> {
    init_tracing(&config.server.log_level);

    info!("starting waypoint serve");

    if config.providers.is_empty() {
        return Err(WaypointError::Config(
            "no providers configured; add at least one [[providers]] entry".into(),
        ));
    }

    let prometheus = if config.prometheus.enabled {
        Some(Arc::new(PrometheusAdapter::new()?))
    } else {
        debug!("prometheus metrics disabled");
        None
    };

    let chain = config.provider_chain();
    let pool = ProviderPool::new(&chain)?;
    let orchestrator = Arc::new(Orchestrator::from_config(
        &config,
        Arc::new(pool),
        build_cache_store(&config.cache),
    ));
    for provider in orchestrator.providers() {
        info!(
            provider = %provider.name,
            priority = provider.priority,
            cost = provider.cost_per_request,
            timeout_secs = provider.timeout.as_secs(),
            "provider registered"
        );
    }

    let cancel = install_signal_handler();
    let sweeper = spawn_cache_sweeper(
        orchestrator.clone(),
        config.cache.sweep_interval(),
        cancel.clone(),
    );

    let mut state = GatewayState::new(orchestrator, config.server.request_timeout())
        .with_auth(AuthConfig::new(config.server.admin_token.clone()));
    if let Some(prometheus) = prometheus {
        state = state.with_prometheus_render(Arc::new(move || prometheus.render()));
    }

    let server_config = ServerConfig {
        host: config.server.host.clone(),
        port: config.server.port,
    };
    let result = waypoint_gateway::start_server(&server_config, state, cancel.clone()).await;

    cancel.cancel();
    if let Err(e) = sweeper.await {
        warn!(error = %e, "cache sweeper task failed");
    }
    info!("waypoint stopped");
    result
}

/// Exact tier in memory, plus the similarity tier when enabled.
fn build_cache_store(config: &CacheConfig) -> CacheStore {
    let backend = Arc::new(MemoryCache::new(config.max_entries));
    if config.similarity.enabled {
        info!(
            threshold = config.similarity.threshold,
            max_entries = config.similarity.max_entries,
            "similarity cache enabled"
        );
        CacheStore::with_similarity(
            backend,
            Arc::new(LexicalSimilarityCache::new(
                config.similarity.threshold,
                config.similarity.max_entries,
            )),
        )
    } else {
        CacheStore::new(backend)
    }
}

/// Purge expired cache entries every `interval` until `cancel` fires.
fn spawn_cache_sweeper(
    orchestrator: Arc<Orchestrator>,
    interval: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // Skip the first immediate tick.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let purged = orchestrator.purge_expired().await;
                    if purged > 0 {
                        debug!(purged, "expired cache entries purged");
                    }
                }
                _ = cancel.cancelled() => {
                    debug!("cache sweeper stopped");
                    break;
                }
            }
        }
    })
}

/// Returns a token cancelled on SIGINT or SIGTERM.
fn install_signal_handler() -> CancellationToken {
    let token = CancellationToken::new();
    let token_clone = token.clone();

    tokio::spawn(async move {
        let ctrl_c = tokio::signal::ctrl_c();

        #[cfg(unix)]
        {
            use tokio::signal::unix::{SignalKind, signal};
            match signal(SignalKind::terminate()) {
                Ok(mut sigterm) => {
                    tokio::select! {
                        _ = ctrl_c => info!("received SIGINT (Ctrl+C), initiating shutdown"),
                        _ = sigterm.recv() => info!("received SIGTERM, initiating shutdown"),
                    }
                }
                Err(e) => {
                    warn!(error = %e, "failed to install SIGTERM handler, only Ctrl+C will stop the server");
                    let _ = ctrl_c.await;
                    info!("received SIGINT (Ctrl+C), initiating shutdown");
                }
            }
        }

        #[cfg(not(unix))]
        {
            let _ = ctrl_c.await;
            info!("received Ctrl+C, initiating shutdown");
        }

        token_clone.cancel();
    });

    token
}

fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("waypoint={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .try_init()
        .ok();
}

#[cfg(test)]
mod tests {
    use waypoint_router::CacheTtls;
    use waypoint_test_utils::TestHarness;

    use super::*;

    #[tokio::test(start_paused = true)]
    async fn sweeper_purges_expired_entries_until_cancelled() {
        let harness = TestHarness::three_providers()
            .with_ttls(CacheTtls {
                response: Duration::from_secs(10),
                warm: Duration::from_secs(10),
            })
            .build();
        harness.route("What is SEO?").await.unwrap();
        assert_eq!(harness.orchestrator.cache_stats().await.entry_count, 1);

        let cancel = CancellationToken::new();
        let sweeper = spawn_cache_sweeper(
            harness.orchestrator.clone(),
            Duration::from_secs(5),
            cancel.clone(),
        );

        tokio::time::sleep(Duration::from_secs(16)).await;
        // Nothing left for a manual purge once the sweeper has run.
        assert_eq!(harness.orchestrator.purge_expired().await, 0);
        assert_eq!(harness.orchestrator.cache_stats().await.entry_count, 0);

        cancel.cancel();
        sweeper.await.unwrap();
    }

    #[tokio::test]
    async fn serve_refuses_to_start_without_providers() {
        let mut config = waypoint_config::load_and_validate_str("").unwrap();
        config.prometheus.enabled = false;
        let err = run_serve(config).await.unwrap_err();
        assert!(matches!(err, WaypointError::Config(_)));
        assert!(err.to_string().contains("no providers"));
    }

    #[test]
    fn similarity_tier_follows_config() {
        let mut config = CacheConfig::default();
        assert!(!build_cache_store(&config).similarity_enabled());
        config.similarity.enabled = true;
        assert!(build_cache_store(&config).similarity_enabled());
    }
}
