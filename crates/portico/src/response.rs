use axum::body::Body;
use axum::http::header::{CONTENT_TYPE, LOCATION, SET_COOKIE};
use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode};

/// The finished response handed to the transport
pub type HttpResponse = axum::response::Response;

// -- Shared helpers --

fn header_pair(key: &str, value: &str) -> Option<(HeaderName, HeaderValue)> {
    match (
        HeaderName::from_bytes(key.as_bytes()),
        HeaderValue::from_str(value),
    ) {
        (Ok(name), Ok(val)) => Some((name, val)),
        _ => {
            tracing::warn!(header = %key, "Dropping header with invalid name or value");
            None
        }
    }
}

/// Response under construction for the current request
///
/// Controllers set status, headers and body; the dispatcher calls
/// [`Response::send`] once, at the very end. `send` consumes the response,
/// so it cannot be sent twice.
#[derive(Debug)]
pub struct Response {
    status: StatusCode,
    status_text: String,
    headers: HeaderMap,
    body: String,
}

impl Response {
    pub fn new() -> Self {
        Self {
            status: StatusCode::OK,
            status_text: "OK".to_string(),
            headers: HeaderMap::new(),
            body: String::new(),
        }
    }

    /// Set the status code and reason phrase
    ///
    /// An empty reason falls back to the canonical one for the code.
    pub fn set_status(&mut self, status: StatusCode, text: impl Into<String>) {
        let text = text.into();
        self.status_text = if text.is_empty() {
            status.canonical_reason().unwrap_or_default().to_string()
        } else {
            text
        };
        self.status = status;
    }

    /// Set (replace) a header
    pub fn set_header(&mut self, key: impl AsRef<str>, value: impl AsRef<str>) {
        if let Some((name, val)) = header_pair(key.as_ref(), value.as_ref()) {
            self.headers.insert(name, val);
        }
    }

    /// Add a header without replacing existing values (e.g. `Set-Cookie`)
    pub fn append_header(&mut self, key: impl AsRef<str>, value: impl AsRef<str>) {
        if let Some((name, val)) = header_pair(key.as_ref(), value.as_ref()) {
            self.headers.append(name, val);
        }
    }

    /// Back to a blank 200, keeping only `Set-Cookie` headers
    pub fn reset(&mut self) {
        let cookies: Vec<HeaderValue> = self.headers.get_all(SET_COOKIE).iter().cloned().collect();
        *self = Self::new();
        for cookie in cookies {
            self.headers.append(SET_COOKIE, cookie);
        }
    }

    pub fn set_body(&mut self, body: impl Into<String>) {
        self.body = body.into();
    }

    /// Point the client at `url` with a 302
    pub fn redirect(&mut self, url: &str) {
        self.set_status(StatusCode::FOUND, "Found");
        self.set_header(LOCATION.as_str(), url);
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn status_text(&self) -> &str {
        &self.status_text
    }

    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers.get(key)?.to_str().ok()
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    /// Hand the response to the transport
    ///
    /// Bodies default to `text/html; charset=utf-8` unless a content type
    /// was set explicitly.
    pub fn send(self) -> HttpResponse {
        tracing::debug!(
            status = self.status.as_u16(),
            status_text = %self.status_text,
            bytes = self.body.len(),
            "Sending response"
        );

        let mut headers = self.headers;
        if !headers.contains_key(CONTENT_TYPE) {
            headers.insert(
                CONTENT_TYPE,
                HeaderValue::from_static("text/html; charset=utf-8"),
            );
        }

        let mut response = HttpResponse::new(Body::from(self.body));
        *response.status_mut() = self.status;
        *response.headers_mut() = headers;
        response
    }
}

impl Default for Response {
    fn default() -> Self {
        Self::new()
    }
}
