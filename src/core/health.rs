//! Liveness endpoint for external infrastructure checks.
//!
//! Answers GET and HEAD on `/` and `/health` with `200 OK`. It knows nothing
//! about the pipeline and runs on its own OS thread with a private runtime.

use axum::{http::StatusCode, routing::get, Router};
use std::net::SocketAddr;
use std::thread::JoinHandle;
use tokio::net::TcpListener;

fn router() -> Router {
    // axum answers HEAD through the GET route
    Router::new().route("/", get(ok)).route("/health", get(ok))
}

async fn ok() -> (StatusCode, &'static str) {
    (StatusCode::OK, "OK")
}

/// Serve the liveness router on an already bound listener.
pub async fn serve(listener: TcpListener) -> std::io::Result<()> {
    axum::serve(listener, router()).await
}

/// Start the liveness listener on a dedicated thread.
pub fn spawn_health_server(port: u16) -> std::io::Result<JoinHandle<()>> {
    std::thread::Builder::new().name("health".to_string()).spawn(move || {
        let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
            Ok(rt) => rt,
            Err(e) => {
                log::error!("Health server runtime failed to start: {}", e);
                return;
            }
        };

        runtime.block_on(async move {
            let addr = SocketAddr::from(([0, 0, 0, 0], port));
            let listener = match TcpListener::bind(addr).await {
                Ok(l) => l,
                Err(e) => {
                    log::error!("Health server failed to bind {}: {}", addr, e);
                    return;
                }
            };
            log::info!("Starting liveness server on http://{}", addr);
            if let Err(e) = serve(listener).await {
                log::error!("Health server error: {}", e);
            }
        });
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;

    async fn request(method: &str, path: &str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(serve(listener));

        let mut stream = TcpStream::connect(addr).await.unwrap();
        let req = format!("{method} {path} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n");
        stream.write_all(req.as_bytes()).await.unwrap();

        let mut buf = Vec::new();
        stream.read_to_end(&mut buf).await.unwrap();
        String::from_utf8_lossy(&buf).to_string()
    }

    #[tokio::test]
    async fn test_get_health() {
        let resp = request("GET", "/health").await;
        assert!(resp.starts_with("HTTP/1.1 200"), "{resp}");
        assert!(resp.ends_with("OK"));
    }

    #[tokio::test]
    async fn test_head_root() {
        let resp = request("HEAD", "/").await;
        assert!(resp.starts_with("HTTP/1.1 200"), "{resp}");
    }
}
