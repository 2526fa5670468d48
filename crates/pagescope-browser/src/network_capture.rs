use crate::driver::ObservedResponse;
use std::collections::{HashMap, HashSet};

/// Pairs `responseReceived` events with the matching `loadingFinished`
///
/// CDP delivers response headers before the body is available; a response is
/// only released once its body has finished loading, and forgotten if loading
/// fails. The two events arrive on separate streams, so either may be seen
/// first.
#[derive(Debug, Default)]
pub struct NetworkCapture {
    pending: HashMap<String, ObservedResponse>,
    finished: HashSet<String>,
}

impl NetworkCapture {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record response headers for a request
    ///
    /// Returns the response right away if its body already finished loading.
    pub fn add_response(
        &mut self,
        request_id: String,
        url: String,
        status: u16,
        headers: HashMap<String, String>,
    ) -> Option<ObservedResponse> {
        let response = ObservedResponse {
            request_id: request_id.clone(),
            url,
            status,
            headers,
        };
        if self.finished.remove(&request_id) {
            return Some(response);
        }
        // a repeated request id replaces the earlier response
        self.pending.insert(request_id, response);
        None
    }

    /// Body finished loading; hand the response out
    pub fn mark_completed(&mut self, request_id: &str) -> Option<ObservedResponse> {
        let response = self.pending.remove(request_id);
        if response.is_none() {
            self.finished.insert(request_id.to_string());
        }
        response
    }

    /// Loading failed or was cancelled; the body will never be available
    pub fn mark_failed(&mut self, request_id: &str) {
        self.pending.remove(request_id);
        self.finished.remove(request_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn json_headers() -> HashMap<String, String> {
        let mut headers = HashMap::new();
        headers.insert("content-type".to_string(), "application/json".to_string());
        headers
    }

    #[test]
    fn test_response_released_on_completion() {
        let mut capture = NetworkCapture::new();
        let early = capture.add_response(
            "req-1".to_string(),
            "https://api.example.com".to_string(),
            200,
            json_headers(),
        );

        assert!(early.is_none());
        let response = capture.mark_completed("req-1").unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(response.url, "https://api.example.com");
        // released once
        assert!(capture.mark_completed("req-1").is_none());
        assert!(capture.pending.is_empty());
    }

    #[test]
    fn test_failed_response_is_dropped() {
        let mut capture = NetworkCapture::new();
        capture.add_response("req-1".to_string(), "u".to_string(), 200, json_headers());

        capture.mark_failed("req-1");
        assert!(capture.mark_completed("req-1").is_none());
    }

    #[test]
    fn test_completion_before_response_releases_on_arrival() {
        let mut capture = NetworkCapture::new();
        assert!(capture.mark_completed("req-7").is_none());

        let response = capture
            .add_response("req-7".to_string(), "u".to_string(), 200, json_headers())
            .unwrap();
        assert_eq!(response.request_id, "req-7");
        assert!(capture.pending.is_empty());
        assert!(capture.finished.is_empty());
    }

    #[test]
    fn test_repeated_request_id_keeps_latest_response() {
        let mut capture = NetworkCapture::new();
        capture.add_response("req-1".to_string(), "http://a".to_string(), 301, HashMap::new());
        capture.add_response("req-1".to_string(), "https://a".to_string(), 200, json_headers());

        let response = capture.mark_completed("req-1").unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(response.url, "https://a");
    }
}
