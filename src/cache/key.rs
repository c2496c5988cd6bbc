use std::fmt;

/// Identifies a cached image by the request signature that produced it.
///
/// The key is the hex digest of the origin URL concatenated with the
/// requested width and height. Dimensions are hashed as the literal query
/// strings with absent values treated as empty, so `u=x` and `u=x&w=0` name
/// different entries while `u=x` and `u=x&w=` name the same one.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn derive(url: &str, width: Option<&str>, height: Option<&str>) -> Self {
        let material = format!(
            "{}|w={}|h={}",
            url,
            width.unwrap_or(""),
            height.unwrap_or("")
        );
        CacheKey(format!("{:x}", md5::compute(material.as_bytes())))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
