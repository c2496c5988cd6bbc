#[macro_use]
extern crate rocket;

use std::env;

use dotenv::dotenv;
use env_logger::Env;
use log::info;
use rocket::figment::{
    providers::{Format, Toml},
    Figment, Profile,
};
use rocket::Config;

#[launch]
fn rocket() -> _ {
    dotenv().ok();

    env_logger::init_from_env(Env::default().default_filter_or("info"));

    // Load config
    let mut figment = Figment::from(Config::default()).merge(Toml::file("App.toml").nested());

    if let Ok(dir) = env::var("IMAGE_CACHE_DIR") {
        figment = figment.merge(("cache_dir", dir));
    }
    if let Ok(base) = env::var("IMAGE_SEARCH_BASE_URL") {
        figment = figment.merge(("search_base_url", base));
    }

    figment = figment.select(Profile::from_env_or("APP_PROFILE", "default"));

    info!("Configuration loaded successfully");

    mealsnap::build(figment)
}
