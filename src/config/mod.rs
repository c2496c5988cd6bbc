use std::path::PathBuf;

use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    #[serde(default = "default_address")]
    pub address: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,
    #[serde(default = "default_fallback_image")]
    pub fallback_image: PathBuf,
    /// Whole-request timeout for origin image fetches, in seconds.
    #[serde(default = "default_fetch_timeout")]
    pub fetch_timeout: u64,
    #[serde(default = "default_max_redirects")]
    pub max_redirects: usize,
    /// Per-call timeout for image search lookups, in seconds.
    #[serde(default = "default_search_timeout")]
    pub search_timeout: u64,
    #[serde(default = "default_search_base_url")]
    pub search_base_url: String,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_address() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from("public/image_cache")
}

fn default_fallback_image() -> PathBuf {
    PathBuf::from("public/fallback_image.png")
}

fn default_fetch_timeout() -> u64 {
    15
}

fn default_max_redirects() -> usize {
    5
}

fn default_search_timeout() -> u64 {
    5
}

fn default_search_base_url() -> String {
    "https://www.themealdb.com/api/json/v1/1".to_string()
}

fn default_user_agent() -> String {
    "mealsnap/1.0".to_string()
}
