//! Shared utilities for gateway integration tests.

use std::net::SocketAddr;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use rewrite_router::{HttpServer, RewriterConfig, Shutdown};

/// Start a mock page renderer that answers every request with its
/// request line (`GET /signin?token=abc HTTP/1.1`) as the body.
#[allow(dead_code)]
pub async fn start_echo_upstream() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                let mut head = Vec::new();
                let mut buf = [0u8; 1024];
                while !head.windows(4).any(|w| w == b"\r\n\r\n") {
                    match socket.read(&mut buf).await {
                        Ok(0) | Err(_) => return,
                        Ok(n) => head.extend_from_slice(&buf[..n]),
                    }
                }

                let text = String::from_utf8_lossy(&head);
                let request_line = text.lines().next().unwrap_or_default().to_string();
                let request_id = text
                    .lines()
                    .find_map(|line| {
                        let (name, value) = line.split_once(':')?;
                        name.eq_ignore_ascii_case("x-request-id")
                            .then(|| value.trim().to_string())
                    })
                    .unwrap_or_default();

                let response = format!(
                    "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nx-upstream-saw-request-id: {}\r\nConnection: close\r\n\r\n{}",
                    request_line.len(),
                    request_id,
                    request_line
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    addr
}

/// A gateway running on an ephemeral port.
#[allow(dead_code)]
pub struct TestGateway {
    pub addr: SocketAddr,
    pub updates: mpsc::UnboundedSender<RewriterConfig>,
    pub shutdown: Shutdown,
    pub task: JoinHandle<Result<(), std::io::Error>>,
}

#[allow(dead_code)]
impl TestGateway {
    pub async fn start(mut config: RewriterConfig) -> Self {
        config.listener.bind_address = "127.0.0.1:0".to_string();
        let listener = TcpListener::bind(&config.listener.bind_address).await.unwrap();
        let addr = listener.local_addr().unwrap();

        let (updates, rx) = mpsc::unbounded_channel();
        let shutdown = Shutdown::new();
        let server = HttpServer::new(config).unwrap();
        let task = tokio::spawn(server.run(listener, rx, shutdown.subscribe()));

        Self {
            addr,
            updates,
            shutdown,
            task,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub async fn stop(self) {
        self.shutdown.trigger();
        self.task.await.unwrap().unwrap();
    }
}

/// Client that reports redirects instead of following them.
#[allow(dead_code)]
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap()
}
