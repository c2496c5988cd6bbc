pub mod image;
pub mod inflight;
pub mod key;

pub use image::{ImageCache, WriteSink};
pub use inflight::InFlight;
pub use key::CacheKey;
