use http::header::{ALLOW, CONTENT_TYPE, HeaderValue};
use http::{Method, Request, Response, StatusCode};
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::{Body, Bytes};
use pagescope_browser::{BrowserEngine, Error as BrowserError, PageAnalyzer};
use pagescope_core::report::AnalysisRequest;
use serde_json::json;
use std::sync::Arc;

pub const ANALYZE_PATH: &str = "/analyze";

/// Largest accepted request body
pub const MAX_BODY_BYTES: usize = 64 * 1024;

/// Routes HTTP requests to a shared [`PageAnalyzer`]
///
/// Cloning is cheap; every clone drives the same analyzer, which opens a
/// separate page per request.
pub struct AnalyzeHandler<E: BrowserEngine> {
    analyzer: Arc<PageAnalyzer<E>>,
}

impl<E: BrowserEngine> Clone for AnalyzeHandler<E> {
    fn clone(&self) -> Self {
        Self {
            analyzer: Arc::clone(&self.analyzer),
        }
    }
}

impl<E: BrowserEngine> AnalyzeHandler<E> {
    pub fn new(analyzer: PageAnalyzer<E>) -> Self {
        Self {
            analyzer: Arc::new(analyzer),
        }
    }

    pub fn analyzer(&self) -> &PageAnalyzer<E> {
        &self.analyzer
    }

    pub async fn handle<B>(&self, req: Request<B>) -> Response<Full<Bytes>>
    where
        B: Body + Send,
        B::Data: Send,
        B::Error: std::error::Error + Send + Sync + 'static,
    {
        let method = req.method().clone();
        let path = req.uri().path().to_string();

        let response = match (&method, path.as_str()) {
            (&Method::POST, ANALYZE_PATH) => self.analyze(req.into_body()).await,
            (_, ANALYZE_PATH) => {
                let mut response = error_response(
                    StatusCode::METHOD_NOT_ALLOWED,
                    &format!("{} only accepts POST", ANALYZE_PATH),
                );
                response
                    .headers_mut()
                    .insert(ALLOW, HeaderValue::from_static("POST"));
                response
            }
            _ => error_response(StatusCode::NOT_FOUND, &format!("No route for {}", path)),
        };

        tracing::info!("{} {} -> {}", method, path, response.status().as_u16());
        response
    }

    async fn analyze<B>(&self, body: B) -> Response<Full<Bytes>>
    where
        B: Body + Send,
        B::Data: Send,
        B::Error: std::error::Error + Send + Sync + 'static,
    {
        let bytes = match Limited::new(body, MAX_BODY_BYTES).collect().await {
            Ok(collected) => collected.to_bytes(),
            Err(e) if e.downcast_ref::<LengthLimitError>().is_some() => {
                return error_response(
                    StatusCode::PAYLOAD_TOO_LARGE,
                    &format!("Request body exceeds {} bytes", MAX_BODY_BYTES),
                );
            }
            Err(e) => {
                return error_response(
                    StatusCode::BAD_REQUEST,
                    &format!("Could not read request body: {}", e),
                );
            }
        };

        let request = match parse_request(&bytes) {
            Ok(request) => request,
            Err(message) => return error_response(StatusCode::BAD_REQUEST, &message),
        };

        match self.analyzer.analyze(request).await {
            Ok(report) => match serde_json::to_vec(&report) {
                Ok(body) => json_response(StatusCode::OK, body),
                Err(e) => error_response(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    &format!("Could not serialize report: {}", e),
                ),
            },
            Err(e) => error_response(status_for(&e), &e.to_string()),
        }
    }
}

fn parse_request(bytes: &[u8]) -> Result<AnalysisRequest, String> {
    let request: AnalysisRequest =
        serde_json::from_slice(bytes).map_err(|e| format!("Invalid request body: {}", e))?;
    if request.url.trim().is_empty() {
        return Err("`url` must not be empty".to_string());
    }
    Ok(request)
}

/// HTTP status for a failed analysis
pub fn status_for(err: &BrowserError) -> StatusCode {
    match err {
        BrowserError::Navigation { .. } => StatusCode::BAD_GATEWAY,
        BrowserError::ResourceAcquisition(_) => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn json_response(status: StatusCode, body: Vec<u8>) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::from(body)));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
}

fn error_response(status: StatusCode, message: &str) -> Response<Full<Bytes>> {
    let body = json!({ "error": message }).to_string();
    json_response(status, body.into_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pagescope_browser::fake::{FakeEngine, FakeResponse, FakeSite, SiteOutcome};
    use pagescope_core::CaptureConfig;
    use serde_json::Value;

    fn handler(engine: FakeEngine) -> AnalyzeHandler<FakeEngine> {
        AnalyzeHandler::new(PageAnalyzer::new(engine, CaptureConfig::default()).unwrap())
    }

    fn post(path: &str, body: &str) -> Request<Full<Bytes>> {
        Request::builder()
            .method(Method::POST)
            .uri(path)
            .header(CONTENT_TYPE, "application/json")
            .body(Full::new(Bytes::from(body.to_string())))
            .unwrap()
    }

    async fn body_json(response: Response<Full<Bytes>>) -> Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_analyze_returns_report() {
        let site = FakeSite::new().response(FakeResponse::new(
            "https://shop.test/api/cart",
            "application/json",
            r#"{"cart":{"items":2}}"#,
        ));
        let handler = handler(FakeEngine::new().site("https://shop.test/", site));

        let response = handler
            .handle(post("/analyze", r#"{"url":"https://shop.test/"}"#))
            .await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[CONTENT_TYPE], "application/json");
        let report = body_json(response).await;
        assert_eq!(report["urlAnalyzed"], "https://shop.test/");
        assert_eq!(report["apiResponses"][0]["flattened"]["cart.items"], 2);
        assert_eq!(report["domEvents"], serde_json::json!([]));
    }

    #[tokio::test]
    async fn test_invalid_body_is_bad_request() {
        let handler = handler(FakeEngine::new());

        for body in ["not json", "{}", r#"{"url":"  "}"#] {
            let response = handler.handle(post("/analyze", body)).await;
            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "body: {}", body);
            assert!(body_json(response).await["error"].is_string());
        }
        assert_eq!(handler.analyzer().engine().opened(), 0);
    }

    #[tokio::test]
    async fn test_oversized_body_is_rejected() {
        let handler = handler(FakeEngine::new());
        let body = format!(r#"{{"url":"{}"}}"#, "a".repeat(MAX_BODY_BYTES));

        let response = handler.handle(post("/analyze", &body)).await;

        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn test_navigation_failure_is_bad_gateway() {
        let site = FakeSite::new().outcome(SiteOutcome::Fail("net::ERR_CONNECTION_REFUSED".into()));
        let handler = handler(FakeEngine::new().site("http://127.0.0.1:1/", site));

        let response = handler
            .handle(post("/analyze", r#"{"url":"http://127.0.0.1:1/"}"#))
            .await;

        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        let error = body_json(response).await;
        assert!(error["error"].as_str().unwrap().contains("ERR_CONNECTION_REFUSED"));
        assert_eq!(handler.analyzer().engine().closed(), 1);
    }

    #[tokio::test]
    async fn test_browser_unavailable_is_service_unavailable() {
        let handler = handler(FakeEngine::new().fail_launch());

        let response = handler
            .handle(post("/analyze", r#"{"url":"https://shop.test/"}"#))
            .await;

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_unknown_route_and_method() {
        let handler = handler(FakeEngine::new());

        let missing = handler.handle(post("/report", "{}")).await;
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);

        let get = Request::builder()
            .uri("/analyze")
            .body(Full::new(Bytes::new()))
            .unwrap();
        let wrong_method = handler.handle(get).await;
        assert_eq!(wrong_method.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(wrong_method.headers()[ALLOW], "POST");
    }
}
