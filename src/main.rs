//! Site CMS - content backend with an image ingestion pipeline.
//!
//! This binary starts the HTTP server and provides offline helpers.

use clap::Parser;
use std::process::ExitCode;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use site_cms::{
    config::{Cli, Command, ConvertConfig, ServeConfig, TokenConfig},
    media::{heif_supported, AdaptiveCompressor, Normalizer},
    server::{auth::TokenAuth, create_router, RouterConfig},
    store::MemoryStore,
};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match cli.into_command() {
        Command::Serve(config) => run_serve(config).await,
        Command::Convert(config) => run_convert(config).await,
        Command::Token(config) => run_token(config),
    }
}

// =============================================================================
// Serve Command
// =============================================================================

async fn run_serve(config: ServeConfig) -> ExitCode {
    // Initialize logging
    init_logging(config.verbose);

    // Validate configuration
    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        return ExitCode::FAILURE;
    }

    info!("site-cms v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration:");

    // Auth status with warning if disabled
    if config.auth_enabled {
        info!("  Auth: enabled (token TTL {}s)", config.token_ttl);
    } else {
        warn!("  Auth: DISABLED - all write endpoints are publicly accessible");
        warn!("        Enable for production: --auth-enabled=true --auth-secret=<secret>");
    }
    match config.admin_credentials() {
        Some((username, _)) => info!("  Admin login: {}", username),
        None => {
            warn!("  Admin login: no configured admin (set CMS_ADMIN_USERNAME/CMS_ADMIN_PASSWORD)");
            warn!("        or mint a token with `site-cms token` and POST /admin/add");
        }
    }

    let limits = config.upload_limits();
    info!(
        "  Uploads: max {}MB, compress above {}MB towards {}MB, bounds {}x{}",
        limits.max_upload_size / (1024 * 1024),
        limits.compression_threshold / (1024 * 1024),
        limits.target_size / (1024 * 1024),
        limits.max_width,
        limits.max_height
    );
    if heif_supported() {
        info!("  HEIC/HEIF: enabled");
    } else {
        warn!("  HEIC/HEIF: unavailable (build with --features heif)");
    }
    info!(
        "  Contact form: {} submissions per {}s per client",
        config.rate_limit, config.rate_window
    );
    if config.trust_forwarded {
        info!("  Client identity: X-Forwarded-For (trusted proxy)");
    } else {
        info!("  Client identity: peer address");
    }
    warn!("  Email: log transport, messages are not delivered");
    warn!("  Storage: in-memory, documents are lost on restart");

    // Build router configuration
    let router_config = build_router_config(&config);

    // Create router
    let router = create_router(MemoryStore::new(), router_config);

    // Bind and serve
    let addr = config.bind_address();

    info!("");
    info!("  Server listening on: http://{}", addr);
    info!("    curl http://{}/health", addr);
    info!("");

    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind to {}: {}", addr, e);
            return ExitCode::FAILURE;
        }
    };

    let service = router.into_make_service_with_connect_info::<std::net::SocketAddr>();
    if let Err(e) = axum::serve(listener, service).await {
        error!("Server error: {}", e);
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

/// Initialize the tracing/logging subsystem.
fn init_logging(verbose: bool) {
    let env_filter = if verbose {
        "site_cms=debug,tower_http=debug"
    } else {
        "site_cms=info,tower_http=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Build RouterConfig from the application ServeConfig.
fn build_router_config(config: &ServeConfig) -> RouterConfig {
    let mut router_config = if config.auth_enabled {
        RouterConfig::new(config.auth_secret_or_empty())
    } else {
        RouterConfig::without_auth()
    };

    if let Some((username, password)) = config.admin_credentials() {
        router_config = router_config.with_admin(username, password);
    }

    router_config = router_config
        .with_token_ttl(Duration::from_secs(config.token_ttl))
        .with_upload_limits(config.upload_limits())
        .with_rate_limit(config.rate_limit, Duration::from_secs(config.rate_window))
        .with_trust_forwarded(config.trust_forwarded)
        .with_password_cost(config.password_cost)
        .with_site_name(config.site_name.clone())
        .with_tracing(!config.no_tracing);

    // Apply CORS origins
    if let Some(ref origins) = config.cors_origins {
        router_config = router_config.with_cors_origins(origins.clone());
    }

    router_config
}

// =============================================================================
// Convert Command
// =============================================================================

async fn run_convert(config: ConvertConfig) -> ExitCode {
    if config.verbose {
        init_logging(true);
    }

    if let Err(e) = config.validate() {
        eprintln!("Error: {}", e);
        return ExitCode::FAILURE;
    }

    let input = match tokio::fs::read(&config.input).await {
        Ok(bytes) => bytes,
        Err(e) => {
            eprintln!("Error: cannot read {}: {}", config.input.display(), e);
            return ExitCode::FAILURE;
        }
    };

    let settings = config.clone();
    let converted = tokio::task::spawn_blocking(move || match settings.target_size {
        Some(target) => AdaptiveCompressor::with_bounds(settings.max_width, settings.max_height)
            .compress_to_target(&input, target),
        None => Normalizer::new().normalize(
            &input,
            settings.max_width,
            settings.max_height,
            settings.quality,
        ),
    })
    .await;

    let output = match converted {
        Ok(Ok(output)) => output,
        Ok(Err(e)) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
        Err(e) => {
            eprintln!("Error: conversion task failed: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let path = config.output_path();
    if let Err(e) = tokio::fs::write(&path, &output.data).await {
        eprintln!("Error: cannot write {}: {}", path.display(), e);
        return ExitCode::FAILURE;
    }

    if config.json {
        match serde_json::to_string_pretty(&output.metadata) {
            Ok(json) => println!("{}", json),
            Err(e) => {
                eprintln!("Error: {}", e);
                return ExitCode::FAILURE;
            }
        }
    } else {
        let meta = &output.metadata;
        println!("{} -> {}", config.input.display(), path.display());
        println!(
            "  {} {}x{} ({} bytes) -> JPEG {}x{} ({} bytes, {:.1}% smaller)",
            meta.original_format,
            meta.original_dimensions.width,
            meta.original_dimensions.height,
            meta.original_size,
            meta.final_dimensions.width,
            meta.final_dimensions.height,
            meta.final_size,
            meta.size_reduction_percent
        );
        if meta.target_achieved == Some(false) {
            println!("  Warning: target size not reached");
        }
    }

    ExitCode::SUCCESS
}

// =============================================================================
// Token Command
// =============================================================================

fn run_token(config: TokenConfig) -> ExitCode {
    if let Err(e) = config.validate() {
        eprintln!("Error: {}", e);
        return ExitCode::FAILURE;
    }

    let auth = TokenAuth::new(&config.secret).with_ttl(Duration::from_secs(config.ttl));
    let issued = auth.issue(&config.subject);

    if config.json {
        match serde_json::to_string_pretty(&issued) {
            Ok(json) => println!("{}", json),
            Err(e) => {
                eprintln!("Error: {}", e);
                return ExitCode::FAILURE;
            }
        }
    } else {
        println!("{}", issued.token);
    }

    ExitCode::SUCCESS
}
