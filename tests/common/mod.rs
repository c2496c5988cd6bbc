#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use rocket::local::asynchronous::Client;
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

/// Canned response returned by the test origin.
#[derive(Clone)]
pub struct OriginResponse {
    pub status: u16,
    pub content_type: &'static str,
    pub body: Vec<u8>,
    pub delay: Duration,
}

impl OriginResponse {
    pub fn ok(content_type: &'static str, body: Vec<u8>) -> Self {
        Self {
            status: 200,
            content_type,
            body,
            delay: Duration::ZERO,
        }
    }

    pub fn not_found() -> Self {
        Self {
            status: 404,
            content_type: "text/plain",
            body: b"not found".to_vec(),
            delay: Duration::ZERO,
        }
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

type Handler = Arc<dyn Fn(&str) -> OriginResponse + Send + Sync>;

/// Minimal HTTP/1.1 origin double that counts every request it answers.
pub struct TestOrigin {
    addr: SocketAddr,
    hits: Arc<AtomicUsize>,
}

impl TestOrigin {
    pub async fn spawn<F>(handler: F) -> Self
    where
        F: Fn(&str) -> OriginResponse + Send + Sync + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let hits = Arc::new(AtomicUsize::new(0));
        let handler: Handler = Arc::new(handler);

        let hit_counter = Arc::clone(&hits);
        tokio::spawn(async move {
            loop {
                let (mut stream, _) = match listener.accept().await {
                    Ok(conn) => conn,
                    Err(_) => break,
                };
                let handler = Arc::clone(&handler);
                let hits = Arc::clone(&hit_counter);
                tokio::spawn(async move {
                    let mut buf = vec![0u8; 8192];
                    let mut read = 0usize;
                    loop {
                        match stream.read(&mut buf[read..]).await {
                            Ok(0) => return,
                            Ok(n) => read += n,
                            Err(_) => return,
                        }
                        if buf[..read].windows(4).any(|window| window == b"\r\n\r\n") {
                            break;
                        }
                        if read == buf.len() {
                            return;
                        }
                    }
                    let request = String::from_utf8_lossy(&buf[..read]);
                    let target = request.split_whitespace().nth(1).unwrap_or("/").to_string();

                    hits.fetch_add(1, Ordering::SeqCst);
                    let response = handler(&target);
                    if !response.delay.is_zero() {
                        tokio::time::sleep(response.delay).await;
                    }

                    let head = format!(
                        "HTTP/1.1 {} Origin\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                        response.status,
                        response.content_type,
                        response.body.len(),
                    );
                    let _ = stream.write_all(head.as_bytes()).await;
                    let _ = stream.write_all(&response.body).await;
                    let _ = stream.shutdown().await;
                });
            }
        });

        Self { addr, hits }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }
}

/// A mealsnap instance wired to a scratch cache directory and a known
/// fallback asset.
pub struct TestServer {
    pub client: Client,
    pub scratch: TempDir,
    pub fallback_bytes: Vec<u8>,
}

impl TestServer {
    pub fn cache_dir(&self) -> std::path::PathBuf {
        self.scratch.path().join("image_cache")
    }
}

pub async fn spawn_app(search_base_url: &str) -> TestServer {
    let scratch = tempfile::tempdir().unwrap();
    let fallback_path = scratch.path().join("fallback.png");
    let fallback_bytes = b"fallback image bytes".to_vec();
    std::fs::write(&fallback_path, &fallback_bytes).unwrap();

    let figment = rocket::figment::Figment::from(rocket::Config::default())
        .merge((
            "cache_dir",
            scratch.path().join("image_cache").to_str().unwrap(),
        ))
        .merge(("fallback_image", fallback_path.to_str().unwrap()))
        .merge(("search_base_url", search_base_url))
        .merge(("fetch_timeout", 5u64))
        .merge(("search_timeout", 2u64));

    let client = Client::tracked(mealsnap::build(figment)).await.unwrap();

    TestServer {
        client,
        scratch,
        fallback_bytes,
    }
}
