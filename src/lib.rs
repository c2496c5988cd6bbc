pub mod api;
pub mod cache;
pub mod config;
pub mod cors;
pub mod images;
pub mod models;
pub mod resolver;

use log::info;
use rocket::figment::Figment;
use rocket::{Build, Rocket};

use crate::cache::{ImageCache, InFlight};
use crate::config::AppConfig;
use crate::cors::CORS;
use crate::images::{FetchError, ImageFetcher};
use crate::resolver::ImageResolver;

/// Assembles the Rocket instance from a fully merged figment.
pub fn build(figment: Figment) -> Rocket<Build> {
    let config = figment
        .extract::<AppConfig>()
        .expect("invalid configuration");

    let store = ImageCache::new(&config.cache_dir);
    info!("image cache directory: {}", config.cache_dir.display());

    let inflight: InFlight<FetchError> = InFlight::new();

    let fetcher = ImageFetcher::new(config.fetch_timeout, config.max_redirects, &config.user_agent)
        .expect("failed to build image fetcher");

    let resolver = ImageResolver::new(&config.search_base_url, config.search_timeout)
        .expect("failed to build image resolver");
    info!("image search backed by {}", config.search_base_url);

    info!(
        "Starting mealsnap image server on {}:{}",
        config.address, config.port
    );

    rocket::custom(figment)
        .attach(CORS)
        .manage(store)
        .manage(inflight)
        .manage(fetcher)
        .manage(resolver)
        .manage(config)
        .mount(
            "/images",
            rocket::routes![api::images::fetch_image, api::images::resolve_image],
        )
}
