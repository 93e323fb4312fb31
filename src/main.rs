use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use callwise::application::ports::{CallRepository, CrmClient, JobQueue, MetricsSink};
use callwise::application::services::{
    AiRouter, CallProcessingWorker, CallQueryService, CrmPushService, MetricsRecorder,
    PipelineConfig, ProviderHealth, RoutedCallAnalyzer, WebhookIngestionService, WebhookVerifier,
};
use callwise::infrastructure::crm::HttpCrmClient;
use callwise::infrastructure::fetch::HttpRecordingFetcher;
use callwise::infrastructure::llm::{EmbedderFactory, ProviderFactory};
use callwise::infrastructure::observability::{TracingConfig, init_tracing};
use callwise::infrastructure::persistence::{
    PgCallRepository, PgJobQueue, PgMetricsSink, QueuePolicy, create_pool, run_migrations,
};
use callwise::infrastructure::storage::StorageFactory;
use callwise::infrastructure::transcription::TranscriberFactory;
use callwise::presentation::{AppState, Environment, Settings, create_router};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Arc::new(Settings::load().context("Failed to load settings")?);
    let environment = Environment::from_env().map_err(anyhow::Error::msg)?;

    init_tracing(
        TracingConfig::new(
            environment.as_str(),
            settings.logging.json,
            settings.logging.level.clone(),
        )
        .with_env_overrides(),
        settings.server.port,
    );

    let pool = create_pool(&settings.database.url, settings.database.max_connections)
        .await
        .context("Failed to connect to PostgreSQL")?;
    if settings.database.run_migrations {
        run_migrations(&pool).await.context("Failed to run migrations")?;
    }

    let http_client = reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(10))
        .build()
        .context("Failed to build HTTP client")?;

    let calls: Arc<dyn CallRepository> = Arc::new(PgCallRepository::new(pool.clone()));
    let queue: Arc<dyn JobQueue> = Arc::new(PgJobQueue::new(
        pool.clone(),
        QueuePolicy {
            max_attempts: settings.queue.max_attempts,
            visibility_timeout: settings.queue.visibility_timeout(),
            retry_backoff: settings.queue.retry_backoff(),
        },
    ));

    let providers = ProviderFactory::create_all(&http_client, &settings.providers)
        .context("Failed to build AI providers")?;
    let health = Arc::new(ProviderHealth::new(
        settings.router.cb_threshold,
        settings.router.breaker_window(),
    ));

    let recorder = settings.metrics.enabled.then(|| {
        let sink: Arc<dyn MetricsSink> = Arc::new(PgMetricsSink::new(pool.clone()));
        let recorder = Arc::new(MetricsRecorder::new(
            sink,
            settings.metrics.batch_size,
            Duration::from_millis(settings.metrics.flush_interval_ms),
        ));
        recorder.start();
        recorder
    });

    let mut router = AiRouter::new(providers, health, settings.router.router_config());
    if let Some(recorder) = &recorder {
        router = router.with_metrics_recorder(Arc::clone(recorder));
    }
    let router = Arc::new(router);
    tracing::info!(
        mode = ?settings.router.mode,
        providers = settings.providers.len(),
        "AI router ready"
    );

    let crm_service = match settings.crm.endpoint.clone() {
        Some(endpoint) if settings.features.crm_push || settings.features.crm_auto_push => {
            let client: Arc<dyn CrmClient> = Arc::new(HttpCrmClient::new(
                http_client.clone(),
                settings.crm.target.clone(),
                endpoint,
                settings.crm.api_key.clone(),
            ));
            Some(Arc::new(CrmPushService::new(
                Arc::clone(&calls),
                client,
                Duration::from_secs(settings.crm.timeout_secs),
            )))
        }
        _ => None,
    };

    let storage = StorageFactory::create(&settings.storage).context("Failed to create storage")?;
    let transcriber = TranscriberFactory::create(http_client.clone(), &settings.transcription)
        .context("Failed to create transcriber")?;
    let fetcher = Arc::new(HttpRecordingFetcher::new(
        http_client.clone(),
        Duration::from_secs(settings.processing.fetch_timeout_secs),
        settings.processing.max_recording_bytes,
    ));
    let analyzer = Arc::new(RoutedCallAnalyzer::new(
        Arc::clone(&router),
        settings.processing.max_transcript_chars,
    ));

    let worker = Arc::new(CallProcessingWorker::new(
        Arc::clone(&calls),
        Arc::clone(&queue),
        fetcher,
        storage,
        transcriber,
        analyzer,
        crm_service
            .clone()
            .filter(|_| settings.features.crm_auto_push),
        PipelineConfig {
            language: settings.processing.language.clone(),
            locale: settings.processing.locale.clone(),
            diarize: settings.transcription.diarize,
            scorecard_template: settings.scoring.template.clone(),
            fetch_timeout: Duration::from_secs(settings.processing.fetch_timeout_secs),
            transcription_timeout: Duration::from_secs(settings.transcription.timeout_secs),
            analysis_timeout: Duration::from_secs(settings.processing.analysis_timeout_secs),
            crm_auto_push: settings.features.crm_auto_push,
            poll_interval: settings.queue.poll_interval(),
        },
    ));

    let shutdown = CancellationToken::new();
    let worker_handles: Vec<_> = (0..settings.queue.worker_concurrency.max(1))
        .map(|index| tokio::spawn(Arc::clone(&worker).run(index, shutdown.child_token())))
        .collect();

    let verifier = WebhookVerifier::new(settings.webhook.secret.as_bytes())
        .map_err(|e| anyhow::anyhow!("Invalid webhook secret: {}", e))?;
    let ingestion_service = Arc::new(WebhookIngestionService::new(
        verifier,
        Arc::clone(&calls),
        Arc::clone(&queue),
    ));
    let query_service = Arc::new(CallQueryService::new(
        Arc::clone(&calls),
        Arc::clone(&queue),
        crm_service.filter(|_| settings.features.crm_push),
    ));

    let embedder =
        EmbedderFactory::create(&http_client, &settings.embeddings, &settings.cache).await;
    tracing::info!(enabled = embedder.is_some(), "Embedding service configured");

    let state = AppState::new(ingestion_service, query_service, Arc::clone(&settings))
        .with_embedder(embedder);
    let app = create_router(state);

    let addr: SocketAddr = format!("{}:{}", settings.server.host, settings.server.port)
        .parse()
        .context("Invalid server address")?;
    tracing::info!(address = %addr, "Starting server");

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    let server_shutdown = shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            server_shutdown.cancel();
        })
        .await
        .context("Server error")?;

    shutdown.cancel();
    for handle in worker_handles {
        if let Err(e) = handle.await {
            tracing::error!(error = %e, "Worker task panicked");
        }
    }

    if let Some(recorder) = recorder {
        recorder.shutdown().await;
    }

    pool.close().await;
    tracing::info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for ctrl-c");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => tracing::error!(error = %e, "Failed to listen for SIGTERM"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
