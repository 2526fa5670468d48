use std::collections::HashMap;

/// Decides which network responses are worth capturing.
///
/// Both conditions are combined with AND logic - a response must match the
/// content type and the status filter to be recorded.
#[derive(Debug, Clone)]
pub struct ResponseFilter {
    /// Content-Type substring (lowercased, case-insensitive containment)
    pub content_type: String,
    /// HTTP status filter (e.g., "2xx", "404", "500-599")
    pub status: Option<StatusFilter>,
}

impl ResponseFilter {
    /// Create a filter matching the given content type at any status
    pub fn new(content_type: impl Into<String>) -> Self {
        Self {
            content_type: content_type.into().to_lowercase(),
            status: None,
        }
    }

    /// Set status filter from a status pattern string
    pub fn with_status(mut self, pattern: &str) -> crate::Result<Self> {
        self.status = Some(StatusFilter::parse(pattern)?);
        Ok(self)
    }

    /// Check if a response with these headers and status should be captured
    pub fn matches(&self, headers: &HashMap<String, String>, status: u16) -> bool {
        self.matches_content_type(headers) && self.matches_status(status)
    }

    /// Check the Content-Type header; a missing header never matches
    pub fn matches_content_type(&self, headers: &HashMap<String, String>) -> bool {
        match header_value(headers, "content-type") {
            Some(value) => value.to_lowercase().contains(&self.content_type),
            None => false,
        }
    }

    fn matches_status(&self, status: u16) -> bool {
        match &self.status {
            None => true,
            Some(filter) => filter.matches(status as i64),
        }
    }
}

impl Default for ResponseFilter {
    fn default() -> Self {
        Self::new("application/json")
    }
}

/// Case-insensitive header lookup
pub fn header_value<'a>(headers: &'a HashMap<String, String>, name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .map(|(_, value)| value.as_str())
}

/// Status filter for HTTP status codes
#[derive(Debug, Clone, PartialEq)]
pub enum StatusFilter {
    /// Exact status code (e.g., 404)
    Exact(i64),
    /// Status code range (e.g., 200-299 for "2xx")
    Range(i64, i64),
}

impl StatusFilter {
    /// Parse a status filter pattern
    ///
    /// Supports:
    /// - Exact: "404", "200"
    /// - Range shorthand: "2xx", "4xx", "5xx"
    /// - Explicit range: "200-299", "500-599"
    pub fn parse(pattern: &str) -> crate::Result<Self> {
        let pattern = pattern.trim();

        if pattern.len() == 3 && pattern.ends_with("xx") {
            if let Some(digit) = pattern.chars().next().and_then(|c| c.to_digit(10)) {
                let start = digit as i64 * 100;
                return Ok(StatusFilter::Range(start, start + 99));
            }
        }

        if let Some((start_str, end_str)) = pattern.split_once('-') {
            let start = start_str.trim().parse::<i64>().map_err(|_| {
                crate::Error::InvalidPattern(format!("Invalid status range start: {}", start_str))
            })?;
            let end = end_str.trim().parse::<i64>().map_err(|_| {
                crate::Error::InvalidPattern(format!("Invalid status range end: {}", end_str))
            })?;
            return Ok(StatusFilter::Range(start, end));
        }

        let code = pattern.parse::<i64>().map_err(|_| {
            crate::Error::InvalidPattern(format!("Invalid status code: {}", pattern))
        })?;
        Ok(StatusFilter::Exact(code))
    }

    /// Check if a status code matches this filter
    pub fn matches(&self, status: i64) -> bool {
        match self {
            StatusFilter::Exact(code) => status == *code,
            StatusFilter::Range(start, end) => status >= *start && status <= *end,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_json_with_charset_matches() {
        let filter = ResponseFilter::default();
        assert!(filter.matches(&headers(&[("content-type", "application/json; charset=utf-8")]), 200));
    }

    #[test]
    fn test_header_name_and_value_are_case_insensitive() {
        let filter = ResponseFilter::default();
        assert!(filter.matches(&headers(&[("Content-Type", "Application/JSON")]), 200));
        // containment, not a media-type parse
        assert!(!filter.matches(&headers(&[("CONTENT-TYPE", "application/vnd.api+json")]), 200));
    }

    #[test]
    fn test_html_never_matches() {
        let filter = ResponseFilter::default();
        assert!(!filter.matches(&headers(&[("content-type", "text/html")]), 200));
    }

    #[test]
    fn test_missing_content_type_never_matches() {
        let filter = ResponseFilter::default();
        assert!(!filter.matches(&headers(&[("content-length", "12")]), 200));
        assert!(!filter.matches(&HashMap::new(), 200));
    }

    #[test]
    fn test_status_filter_restricts_matches() {
        let filter = ResponseFilter::default().with_status("2xx").unwrap();
        let json = headers(&[("content-type", "application/json")]);

        assert!(filter.matches(&json, 204));
        assert!(!filter.matches(&json, 404));
    }

    #[test]
    fn test_status_filter_exact() {
        let filter = StatusFilter::parse("404").unwrap();
        assert!(filter.matches(404));
        assert!(!filter.matches(200));
    }

    #[test]
    fn test_status_filter_ranges() {
        assert_eq!(StatusFilter::parse("4xx").unwrap(), StatusFilter::Range(400, 499));
        assert_eq!(StatusFilter::parse("500-599").unwrap(), StatusFilter::Range(500, 599));
    }

    #[test]
    fn test_status_filter_invalid() {
        assert!(StatusFilter::parse("abc").is_err());
        assert!(StatusFilter::parse("1xxx").is_err());
        assert!(StatusFilter::parse("200-abc").is_err());
    }
}
