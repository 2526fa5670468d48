use crate::handler::AnalyzeHandler;
use crate::{Error, Result};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use pagescope_browser::{BrowserEngine, PageAnalyzer};
use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::pin::pin;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinSet;

/// HTTP/1 server answering `POST /analyze`
pub struct AnalysisServer<E: BrowserEngine + 'static> {
    listener: TcpListener,
    handler: AnalyzeHandler<E>,
}

impl<E: BrowserEngine + 'static> AnalysisServer<E> {
    /// Bind the listening socket; port 0 picks a free port
    pub async fn bind(addr: SocketAddr, analyzer: PageAnalyzer<E>) -> Result<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| Error::Bind { addr, source })?;
        Ok(Self {
            listener,
            handler: AnalyzeHandler::new(analyzer),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Serve until Ctrl+C
    pub async fn run(self) -> Result<()> {
        self.run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::warn!("Failed to listen for Ctrl+C: {}", e);
                std::future::pending::<()>().await;
            }
            tracing::info!("Received Ctrl+C, shutting down...");
        })
        .await
    }

    /// Serve until `shutdown` resolves, then let open connections finish
    pub async fn run_until<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let addr = self.local_addr()?;
        tracing::info!("Analysis server listening on http://{}", addr);

        let (stop_tx, stop_rx) = watch::channel(false);
        let mut connections = JoinSet::new();
        let mut shutdown = pin!(shutdown);

        loop {
            let (stream, peer) = tokio::select! {
                _ = &mut shutdown => break,
                accepted = self.listener.accept() => match accepted {
                    Ok(accepted) => accepted,
                    Err(e) => {
                        tracing::warn!("Failed to accept connection: {}", e);
                        continue;
                    }
                },
            };
            tracing::debug!("Accepted connection from {}", peer);

            let handler = self.handler.clone();
            let mut stop = stop_rx.clone();
            connections.spawn(async move {
                let service = service_fn(move |req| {
                    let handler = handler.clone();
                    async move { Ok::<_, Infallible>(handler.handle(req).await) }
                });
                let conn = http1::Builder::new().serve_connection(TokioIo::new(stream), service);
                let mut conn = pin!(conn);

                tokio::select! {
                    result = conn.as_mut() => {
                        if let Err(e) = result {
                            tracing::debug!("Connection from {} ended with error: {}", peer, e);
                        }
                        return;
                    }
                    _ = stop.changed() => conn.as_mut().graceful_shutdown(),
                }
                if let Err(e) = conn.await {
                    tracing::debug!("Connection from {} ended with error: {}", peer, e);
                }
            });

            // reap finished connections so the set does not grow unbounded
            while connections.try_join_next().is_some() {}
        }

        let _ = stop_tx.send(true);
        let open = connections.len();
        if open > 0 {
            tracing::info!("Waiting for {} open connections to finish", open);
        }
        while connections.join_next().await.is_some() {}

        tracing::info!("Analysis server stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::{Request, StatusCode};
    use http_body_util::{BodyExt, Full};
    use hyper::body::Bytes;
    use pagescope_browser::fake::{FakeEngine, FakeResponse, FakeSite};
    use pagescope_core::CaptureConfig;
    use serde_json::Value;
    use tokio::net::TcpStream;
    use tokio::sync::oneshot;

    async fn post(addr: SocketAddr, path: &str, body: &str) -> (StatusCode, Value) {
        let stream = TcpStream::connect(addr).await.unwrap();
        let (mut sender, conn) = hyper::client::conn::http1::handshake(TokioIo::new(stream))
            .await
            .unwrap();
        tokio::spawn(conn);

        let request = Request::post(path)
            .header("host", addr.to_string())
            .header("content-type", "application/json")
            .body(Full::new(Bytes::from(body.to_string())))
            .unwrap();
        let response = sender.send_request(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    fn site(host: &str) -> FakeSite {
        FakeSite::new().response(FakeResponse::new(
            format!("https://{}/api", host),
            "application/json",
            format!(r#"{{"host":"{}"}}"#, host),
        ))
    }

    #[tokio::test]
    async fn test_serves_concurrent_isolated_requests() {
        let engine = FakeEngine::new()
            .site("https://one.test/", site("one.test"))
            .site("https://two.test/", site("two.test"));
        let analyzer = PageAnalyzer::new(engine, CaptureConfig::default()).unwrap();
        let server = AnalysisServer::bind(([127, 0, 0, 1], 0).into(), analyzer)
            .await
            .unwrap();
        let addr = server.local_addr().unwrap();

        let (stop, stopped) = oneshot::channel::<()>();
        let running = tokio::spawn(server.run_until(async {
            let _ = stopped.await;
        }));

        let (one, two) = tokio::join!(
            post(addr, "/analyze", r#"{"url":"https://one.test/"}"#),
            post(addr, "/analyze", r#"{"url":"https://two.test/"}"#),
        );

        assert_eq!(one.0, StatusCode::OK);
        assert_eq!(two.0, StatusCode::OK);
        assert_eq!(one.1["apiResponses"][0]["raw"]["host"], "one.test");
        assert_eq!(two.1["apiResponses"][0]["raw"]["host"], "two.test");
        assert_eq!(one.1["apiResponses"].as_array().unwrap().len(), 1);
        assert_eq!(two.1["apiResponses"].as_array().unwrap().len(), 1);

        let _ = stop.send(());
        running.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_unknown_route_over_http() {
        let analyzer = PageAnalyzer::new(FakeEngine::new(), CaptureConfig::default()).unwrap();
        let server = AnalysisServer::bind(([127, 0, 0, 1], 0).into(), analyzer)
            .await
            .unwrap();
        let addr = server.local_addr().unwrap();
        let (stop, stopped) = oneshot::channel::<()>();
        let running = tokio::spawn(server.run_until(async {
            let _ = stopped.await;
        }));

        let (status, body) = post(addr, "/nope", "{}").await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body["error"].as_str().unwrap().contains("/nope"));

        let _ = stop.send(());
        running.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_bind_conflict_is_reported() {
        let taken = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = taken.local_addr().unwrap();
        let analyzer = PageAnalyzer::new(FakeEngine::new(), CaptureConfig::default()).unwrap();

        let result = AnalysisServer::bind(addr, analyzer).await;

        assert!(matches!(result, Err(Error::Bind { .. })));
    }
}
