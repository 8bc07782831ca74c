#![forbid(unsafe_code)]

mod adapters;
mod config;
mod server;
mod util;

use std::path::PathBuf;
use std::sync::Arc;

use corkboard_gateway::{ChatTarget, EventSource, MessengerGateway, bounded_event_channel};
use tracing::{info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::adapters::{DemoSource, LogGateway};
use crate::server::access::AccessControl;
use crate::server::assembler::{AlbumAssembler, AssemblerConfig};
use crate::server::coordinator::{Destinations, ModerationCoordinator};
use crate::server::dispatcher::Dispatcher;
use crate::server::health::{HealthState, spawn_health_server};
use crate::server::lifecycle::SubmissionService;
use crate::server::store::{MemoryStore, PersistentStore, RecordStore};

/// Dev-only scripted event source enable flag.
const CORKBOARD_ENABLE_DEMO_SOURCE_ENV: &str = "CORKBOARD_ENABLE_DEMO_SOURCE";

fn usage_and_exit() -> ! {
	eprintln!(
		"Usage: corkboard_server [--config path]\n\
\n\
Options:\n\
\t--config  Config file path (default: ~/.corkboard/config.toml)\n\
\t--help    Show this help\n\
"
	);
	std::process::exit(2)
}

fn parse_args() -> Option<PathBuf> {
	let mut config_path = None;

	let mut it = std::env::args().skip(1);
	while let Some(arg) = it.next() {
		match arg.as_str() {
			"--help" | "-h" => usage_and_exit(),
			"--config" => {
				let v = it.next().unwrap_or_else(|| usage_and_exit());
				if v.trim().is_empty() {
					eprintln!("--config must be non-empty");
					usage_and_exit();
				}
				config_path = Some(PathBuf::from(v));
			}
			other => {
				eprintln!("Unknown argument: {other}");
				usage_and_exit();
			}
		}
	}

	config_path
}

fn init_tracing() {
	let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "info,corkboard_server=debug".to_string());

	let otlp_endpoint = std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT")
		.ok()
		.map(|v| v.trim().to_string())
		.filter(|v| !v.is_empty());
	let base = tracing_subscriber::registry()
		.with(tracing_subscriber::EnvFilter::new(filter))
		.with(tracing_subscriber::fmt::layer().with_target(false));

	if let Some(endpoint) = otlp_endpoint {
		use opentelemetry::global;
		use opentelemetry::trace::TracerProvider as _;
		use opentelemetry_otlp::WithExportConfig;

		match opentelemetry_otlp::SpanExporter::builder()
			.with_tonic()
			.with_endpoint(endpoint.clone())
			.build()
		{
			Ok(exporter) => {
				let tracer_provider = opentelemetry_sdk::trace::SdkTracerProvider::builder()
					.with_batch_exporter(exporter)
					.build();
				let tracer = tracer_provider.tracer("corkboard_server");
				global::set_tracer_provider(tracer_provider);

				let otel_layer = tracing_opentelemetry::layer().with_tracer(tracer);
				base.with(otel_layer).init();
				info!(endpoint = %endpoint, "otlp tracing enabled");
			}
			Err(e) => {
				base.init();
				warn!(error = %e, "failed to initialize otlp tracing");
			}
		}
	} else {
		base.init();
	}
}

fn init_metrics(bind: Option<&str>) {
	let Some(bind) = bind else {
		return;
	};

	match bind.parse::<std::net::SocketAddr>() {
		Ok(addr) => {
			if let Err(e) = metrics_exporter_prometheus::PrometheusBuilder::new()
				.with_http_listener(addr)
				.install()
			{
				warn!(error = %e, "failed to start metrics exporter");
			} else {
				info!(%addr, "metrics exporter listening");
			}
		}
		Err(e) => {
			warn!(error = %e, %bind, "invalid metrics bind address (expected host:port)");
		}
	}
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
	init_tracing();

	let config_path = match parse_args() {
		Some(path) => path,
		None => crate::config::default_config_path()?,
	};
	let cfg = crate::config::load_config_from_path(&config_path)?;
	info!(path = %config_path.display(), "loaded config (toml + env overrides)");

	if cfg.bot.token.is_none() {
		warn!("no bot token configured; outbound delivery runs through the logging gateway");
	}
	if cfg.bot.admin_ids.is_empty() {
		warn!("no administrators configured; every moderation action will be refused");
	}

	init_metrics(cfg.server.metrics_bind.as_deref());

	let store: Arc<dyn RecordStore> = match cfg.persistence.database_url.as_deref() {
		Some(database_url) => {
			let store = PersistentStore::connect(database_url).await?;
			info!("record store connected");
			Arc::new(store)
		}
		None => {
			warn!("no database_url configured; records are in-memory and lost on restart");
			Arc::new(MemoryStore::new())
		}
	};

	let health_state = HealthState::new();
	if let Some(bind) = cfg.server.health_bind.as_deref() {
		match bind.parse::<std::net::SocketAddr>() {
			Ok(addr) => {
				spawn_health_server(addr, health_state.clone(), Arc::clone(&store));
				info!(%addr, "health server listening");
			}
			Err(e) => warn!(error = %e, %bind, "invalid health bind address (expected host:port)"),
		}
	}

	let channel = cfg.bot.channel.clone().unwrap_or_else(|| {
		warn!("no public channel configured; publishing to the dev placeholder target");
		ChatTarget::Handle("corkboard-dev".to_string())
	});

	let access = AccessControl::new(cfg.bot.admin_ids.iter().copied());
	info!(
		admins = access.admin_count(),
		channel = %channel,
		moderation_chat = cfg.bot.moderation_chat.as_ref().map(|c| c.to_string()).unwrap_or_default(),
		"moderation destinations configured"
	);

	let gateway: Arc<dyn MessengerGateway> = Arc::new(LogGateway::new());

	let lifecycle = Arc::new(SubmissionService::new(
		Arc::clone(&store),
		access,
		cfg.limits.content_policy(),
	));

	let coordinator = Arc::new(ModerationCoordinator::new(
		Arc::clone(&gateway),
		Arc::clone(&lifecycle),
		Destinations {
			channel,
			moderation_chat: cfg.bot.moderation_chat.clone(),
			admins: cfg.bot.admin_ids.clone(),
		},
	));

	let (assembler, albums_rx) = AlbumAssembler::new(AssemblerConfig {
		quiescence: cfg.limits.album_quiescence,
		..AssemblerConfig::default()
	});

	let dispatcher = Arc::new(Dispatcher::new(
		assembler,
		coordinator,
		Arc::clone(&lifecycle),
		Arc::clone(&store),
		Arc::clone(&gateway),
	));

	let (events_tx, events_rx) = bounded_event_channel(256);

	let demo_enabled = cfg!(debug_assertions)
		&& std::env::var(CORKBOARD_ENABLE_DEMO_SOURCE_ENV)
			.map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
			.unwrap_or(false);

	let mut sources: Vec<Box<dyn EventSource>> = Vec::new();
	if demo_enabled {
		info!(
			env = CORKBOARD_ENABLE_DEMO_SOURCE_ENV,
			"starting dev-only demo event source (enabled by env)"
		);
		sources.push(Box::new(DemoSource::new(cfg.bot.admin_ids.first().copied())));
	}

	for source in sources {
		let name = source.name();
		let tx = events_tx.clone();
		tokio::spawn(async move {
			if let Err(e) = source.run(tx).await {
				warn!(source = name, error = %e, "event source exited with error");
			}
		});
	}

	health_state.mark_ready();
	info!("corkboard server ready");

	// `events_tx` stays alive here so the dispatcher keeps serving after
	// any finite source ends; shutdown comes from the signal.
	tokio::select! {
		_ = dispatcher.run(events_rx, albums_rx) => {
			info!("dispatcher stopped");
		}
		_ = tokio::signal::ctrl_c() => {
			info!("shutdown signal received");
		}
	}

	Ok(())
}
