// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! SwiftBase server binary.

use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use swiftbase_server::api::create_app;
use swiftbase_server::{bootstrap_admin, create_app_state, seed};
use swiftbase_server_db::StorageKernel;
use swiftbase_server_jobs::JobScheduler;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// SwiftBase - single-binary backend platform.
#[derive(Parser, Debug)]
#[command(name = "swiftbase", about = "SwiftBase backend server", version)]
struct Args {
	#[command(subcommand)]
	command: Option<Command>,

	/// Path to the configuration file.
	#[arg(long, global = true)]
	config: Option<std::path::PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Command {
	/// Run the server (default).
	Serve,
	/// Apply pending schema migrations and exit.
	Migrate {
		/// Reverse the last applied migration instead.
		#[arg(long)]
		rollback: bool,
	},
	/// Insert demo data for local development.
	Seed,
	/// Show version information.
	Version,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
	let args = Args::parse();

	if let Some(Command::Version) = args.command {
		println!("swiftbase {}", env!("CARGO_PKG_VERSION"));
		return Ok(());
	}

	// Load .env file if present
	dotenvy::dotenv().ok();

	let config = match &args.config {
		Some(path) => swiftbase_server_config::load_config_with_file(path)?,
		None => swiftbase_server_config::load_config()?,
	};

	tracing_subscriber::registry()
		.with(
			tracing_subscriber::EnvFilter::try_from_default_env()
				.unwrap_or_else(|_| config.logging.level.clone().into()),
		)
		.with(tracing_subscriber::fmt::layer())
		.init();

	tracing::info!(
		host = %config.http.host,
		port = config.http.port,
		database = %config.database.url,
		"starting swiftbase"
	);

	if let Some(parent) = database_parent_dir(&config.database.url) {
		std::fs::create_dir_all(parent).ok();
	}
	let kernel = Arc::new(StorageKernel::open(&config.database.url).await?);

	match args.command {
		Some(Command::Migrate { rollback }) => {
			if rollback {
				match swiftbase_server_db::rollback_last(&kernel).await? {
					Some(version) => tracing::info!(version, "rolled back one migration"),
					None => tracing::info!("nothing to roll back"),
				}
			} else {
				let applied = swiftbase_server_db::run_migrations(&kernel).await?;
				tracing::info!(applied, "migrations applied");
			}
			return Ok(());
		}
		Some(Command::Seed) => {
			swiftbase_server_db::run_migrations(&kernel).await?;
			let state = create_app_state(Arc::clone(&kernel), &config).await;
			seed::seed_demo_data(&state).await?;
			return Ok(());
		}
		Some(Command::Serve) | Some(Command::Version) | None => {}
	}

	swiftbase_server_db::run_migrations(&kernel).await?;

	let state = create_app_state(Arc::clone(&kernel), &config).await;
	bootstrap_admin(&state).await?;

	// Hub heartbeat plus periodic jobs.
	let heartbeat = state.hub.spawn_heartbeat();
	let mut scheduler = JobScheduler::new();
	scheduler.register_periodic(
		Arc::new(swiftbase_server::jobs::StorageSweepJob::new(Arc::clone(
			&state.files,
		))),
		Duration::from_secs(config.storage.sweep_interval_secs),
	);
	let scheduler = Arc::new(scheduler);
	scheduler.start().await;

	let hub = Arc::clone(&state.hub);
	let app = create_app(state)
		.layer(tower_http::timeout::TimeoutLayer::new(Duration::from_secs(
			config.http.request_timeout_secs,
		)))
		.layer(TraceLayer::new_for_http())
		.layer(
			CorsLayer::new()
				.allow_origin(AllowOrigin::mirror_request())
				.allow_methods([
					http::Method::GET,
					http::Method::POST,
					http::Method::PUT,
					http::Method::PATCH,
					http::Method::DELETE,
					http::Method::OPTIONS,
				])
				.allow_headers([
					http::header::CONTENT_TYPE,
					http::header::AUTHORIZATION,
					http::header::HeaderName::from_static("x-requested-with"),
				])
				.allow_credentials(true)
				.max_age(Duration::from_secs(86_400)),
		);

	let addr = config.socket_addr();
	tracing::info!("listening on {}", addr);
	let listener = tokio::net::TcpListener::bind(&addr).await?;

	tokio::select! {
		result = axum::serve(listener, app) => {
			if let Err(e) = result {
				tracing::error!(error = %e, "server error");
			}
		}
		_ = tokio::signal::ctrl_c() => {
			tracing::info!("received shutdown signal");
		}
	}

	heartbeat.abort();
	hub.shutdown().await;
	scheduler.shutdown().await;
	kernel.close().await;
	tracing::info!("server shutdown complete");
	Ok(())
}

/// Directory holding the SQLite file, if the URL points at a file path.
fn database_parent_dir(database_url: &str) -> Option<std::path::PathBuf> {
	let path = database_url.strip_prefix("sqlite:")?;
	let path = path.split('?').next()?;
	if path == ":memory:" || path.is_empty() {
		return None;
	}
	std::path::Path::new(path).parent().map(|p| p.to_path_buf())
}
