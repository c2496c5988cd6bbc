use log::{debug, error, warn};
use rocket::get;
use rocket::http::{ContentType, Header};
use rocket::request::Request;
use rocket::response::{self, Responder, Response};
use rocket::serde::json::Json;
use rocket::State;
use tokio::fs::File;

use crate::api::ApiError;
use crate::cache::{CacheKey, ImageCache, InFlight};
use crate::config::AppConfig;
use crate::images::{FetchError, ImageFetcher};
use crate::resolver::{ImageResolver, ResolvedImage};

// Cache keys encode the full request signature, so a cached file never
// changes and clients may keep it forever. Fallback responses carry no cache
// header so clients retry later.
const IMMUTABLE_CACHE_CONTROL: &str = "public, max-age=31536000, immutable";

/// Streams an image file back to the client.
pub struct ImageResponse {
    file: File,
    len: u64,
    content_type: ContentType,
    cacheable: bool,
}

impl<'r> Responder<'r, 'static> for ImageResponse {
    fn respond_to(self, _: &'r Request<'_>) -> response::Result<'static> {
        let mut response = Response::build();
        response.header(self.content_type);
        if self.cacheable {
            response.header(Header::new("Cache-Control", IMMUTABLE_CACHE_CONTROL));
        }
        response.sized_body(Some(self.len as usize), self.file);
        response.ok()
    }
}

#[get("/fetch?<u>&<w>&<h>")]
pub async fn fetch_image(
    u: Option<String>,
    w: Option<String>,
    h: Option<String>,
    store: &State<ImageCache>,
    inflight: &State<InFlight<FetchError>>,
    fetcher: &State<ImageFetcher>,
    config: &State<AppConfig>,
) -> Result<ImageResponse, ApiError> {
    let url = u.ok_or(ApiError::MissingParam("u"))?;
    let key = CacheKey::derive(&url, w.as_deref(), h.as_deref());

    if store.exists(&key).await {
        debug!("cache hit for {} ({})", key, url);
        return cached_response(store, &key, config).await;
    }

    debug!("cache miss for {} ({})", key, url);
    let outcome = {
        let fetcher = fetcher.inner().clone();
        let store = store.inner().clone();
        let url = url.clone();
        let fetch_key = key.clone();
        inflight
            .claim_or_join(key.as_str(), move || async move {
                fetcher.fetch(&url, &store, &fetch_key).await
            })
            .await
    };

    match outcome {
        Ok(()) => {
            if store.exists(&key).await {
                cached_response(store, &key, config).await
            } else {
                warn!("fetch for {} completed but the entry is missing", key);
                fallback_response(config).await
            }
        }
        Err(err) => {
            warn!("serving fallback for {}: {}", url, err);
            fallback_response(config).await
        }
    }
}

#[get("/resolve?<title>&<ingredients>&<i>")]
pub async fn resolve_image(
    title: Option<String>,
    ingredients: Option<String>,
    i: Option<usize>,
    resolver: &State<ImageResolver>,
) -> Result<Json<ResolvedImage>, ApiError> {
    let title = title.ok_or(ApiError::MissingParam("title"))?;
    let resolved = resolver
        .resolve(&title, ingredients.as_deref().unwrap_or(""), i.unwrap_or(0))
        .await;
    Ok(Json(resolved))
}

async fn cached_response(
    store: &ImageCache,
    key: &CacheKey,
    config: &AppConfig,
) -> Result<ImageResponse, ApiError> {
    match store.serve(key).await {
        Ok((file, len)) => Ok(ImageResponse {
            file,
            len,
            content_type: ContentType::JPEG,
            cacheable: true,
        }),
        Err(err) => {
            error!("failed to open cache entry {}: {}", key, err);
            fallback_response(config).await
        }
    }
}

async fn fallback_response(config: &AppConfig) -> Result<ImageResponse, ApiError> {
    let file = File::open(&config.fallback_image).await.map_err(|err| {
        error!(
            "fallback asset {} unreadable: {}",
            config.fallback_image.display(),
            err
        );
        ApiError::FallbackUnavailable
    })?;
    let len = file
        .metadata()
        .await
        .map_err(|_| ApiError::FallbackUnavailable)?
        .len();

    Ok(ImageResponse {
        file,
        len,
        content_type: ContentType::PNG,
        cacheable: false,
    })
}
