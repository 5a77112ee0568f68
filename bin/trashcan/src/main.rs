//! # Trashcan Binary
//!
//! Assembles the archive: SQLite store, DCInside source, the crawl loop and
//! the read API.

use actix_web::{web, App, HttpServer};
use anyhow::Context;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tc_api::handlers::AppState;
use tc_config::Settings;
use tc_core::normalize::ImageNormalizer;
use tc_db_sqlite::SqliteArchiveStore;
use tc_services::{ArchiveQueries, Crawler, CrawlerSettings};
use tc_source_dc::DcSource;
use tokio::sync::watch;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Creates the parent directory of a file-backed SQLite URL.
fn ensure_database_dir(url: &str) -> std::io::Result<()> {
    let rest = url
        .strip_prefix("sqlite://")
        .or_else(|| url.strip_prefix("sqlite:"))
        .unwrap_or(url);
    let path = rest.split('?').next().unwrap_or_default();
    if path.is_empty() || path.starts_with(":memory:") {
        return Ok(());
    }
    match Path::new(path).parent() {
        Some(dir) if !dir.as_os_str().is_empty() => std::fs::create_dir_all(dir),
        _ => Ok(()),
    }
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    let dotenv = tc_config::load_dotenv();
    let settings = Settings::load().context("loading settings")?;
    env_logger::init_from_env(env_logger::Env::new().default_filter_or(settings.log_filter()));
    if let Err(e) = dotenv {
        log::warn!("ignoring {}", e);
    }

    ensure_database_dir(&settings.database_url).context("creating database directory")?;
    let store = Arc::new(
        SqliteArchiveStore::connect(&settings.database_url)
            .await
            .context("opening archive")?,
    );
    log::info!("archive opened at {}", settings.database_url);

    let (stop, stop_rx) = watch::channel(false);
    let crawler = match CrawlerSettings::new(settings.board_id()) {
        Ok(crawler_settings) => {
            let crawler_settings = crawler_settings
                .with_recent_count(settings.recent_count)
                .with_cycle_delay(settings.cycle_delay())
                .with_verify_delay(settings.verify_delay());
            let source = Arc::new(
                DcSource::new(settings.mobile_host.clone(), &settings.user_agent, REQUEST_TIMEOUT)
                    .context("building HTTP client")?,
            );
            let crawler = Crawler::new(
                crawler_settings,
                source.clone(),
                store.clone(),
                source,
                ImageNormalizer::new(settings.image_host.clone()),
            );
            Some(tokio::spawn(crawler.run(stop_rx)))
        }
        Err(e) => {
            log::error!("crawler disabled, serving the archive read-only: {}", e);
            None
        }
    };

    let state = web::Data::new(AppState {
        queries: ArchiveQueries::new(store.clone()),
    });
    let public_dir = settings.public_dir.clone();
    let serve_public = Path::new(&public_dir).is_dir();
    if !serve_public {
        log::warn!("{} not found, /app will not be served", public_dir);
    }

    log::info!("trashcan listening on http://{}", settings.bind_addr);

    HttpServer::new(move || {
        let app = App::new()
            .app_data(state.clone())
            .wrap(tc_api::middleware::cors_policy())
            .wrap(tc_api::middleware::standard_middleware())
            .configure(tc_api::configure_routes);
        if serve_public {
            app.service(actix_files::Files::new("/app", &public_dir).index_file("index.html"))
        } else {
            app
        }
    })
    .bind(&settings.bind_addr)
    .with_context(|| format!("binding {}", settings.bind_addr))?
    .run()
    .await?;

    log::info!("server stopped, shutting down crawler");
    stop.send_replace(true);
    if let Some(handle) = crawler {
        if let Err(e) = handle.await {
            log::error!("crawler task ended abnormally: {}", e);
        }
    }
    store.close().await;

    Ok(())
}
