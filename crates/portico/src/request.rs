// File: src/request.rs
// Purpose: What a controller sees of the inbound HTTP request

use axum::http::{HeaderMap, Method};
use serde_json::Value as JsonValue;
use std::collections::HashMap;

/// The inbound request as controllers see it
#[derive(Clone)]
pub struct Request {
    pub method: Method,
    pub query: QueryParams,
    /// Body fields; empty unless the method carries a body
    pub form: FormData,
    pub headers: HeaderMap,
    pub cookies: HashMap<String, String>,

    /// Path and query as received, e.g. "/blog/user/alice?page=2"
    request_uri: String,

    /// Mount prefix the application lives under ("" for the root)
    mount_path: String,

    /// Host to report when the request carries no Host header
    default_host: String,

    /// Whether the request arrived over TLS at this process
    secure_transport: bool,
}

impl std::fmt::Debug for Request {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Request")
            .field("method", &self.method)
            .field("request_uri", &self.request_uri)
            .finish()
    }
}

impl Request {
    pub fn new(method: Method, request_uri: impl Into<String>, headers: HeaderMap) -> Self {
        let request_uri = request_uri.into();
        let cookies = Self::parse_cookies(&headers);
        let query = request_uri
            .split_once('?')
            .map(|(_, q)| QueryParams::parse(q))
            .unwrap_or_default();

        Self {
            method,
            query,
            form: FormData::new(),
            headers,
            cookies,
            request_uri,
            mount_path: String::new(),
            default_host: String::new(),
            secure_transport: false,
        }
    }

    /// Attach the request body, parsed according to its content type
    pub fn with_body(mut self, body: &[u8]) -> Self {
        if matches!(self.method, Method::POST | Method::PUT | Method::PATCH | Method::DELETE) {
            let content_type = self.get_header("content-type").unwrap_or_default().to_string();
            self.form = FormData::from_body(&content_type, body);
        }
        self
    }

    /// Set the prefix the application is mounted under
    pub fn with_mount_path(mut self, mount_path: impl Into<String>) -> Self {
        self.mount_path = mount_path.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_default_host(mut self, host: impl Into<String>) -> Self {
        self.default_host = host.into();
        self
    }

    pub fn with_secure_transport(mut self, secure: bool) -> Self {
        self.secure_transport = secure;
        self
    }

    /// `name=value` pairs from every Cookie header
    fn parse_cookies(headers: &HeaderMap) -> HashMap<String, String> {
        headers
            .get_all("cookie")
            .iter()
            .filter_map(|value| value.to_str().ok())
            .flat_map(|line| line.split(';'))
            .filter_map(|pair| pair.trim().split_once('='))
            .map(|(name, value)| (name.to_string(), value.to_string()))
            .collect()
    }

    /// The request URI (path and query) as received
    pub fn request_uri(&self) -> &str {
        &self.request_uri
    }

    /// The part of the URL that addresses the application itself
    ///
    /// The mount prefix when the request URI falls under it, otherwise "".
    pub fn base_url(&self) -> &str {
        if self.mount_path.is_empty() {
            return "";
        }

        match self.request_uri.strip_prefix(&self.mount_path) {
            Some(rest) if rest.is_empty() || rest.starts_with('/') || rest.starts_with('?') => {
                &self.mount_path
            }
            _ => "",
        }
    }

    /// Request path without query string and base URL, used for routing
    pub fn path_info(&self) -> &str {
        let path = match self.request_uri.find('?') {
            Some(pos) => &self.request_uri[..pos],
            None => &self.request_uri,
        };

        path.strip_prefix(self.base_url()).unwrap_or(path)
    }

    /// Host header, falling back to the configured host
    pub fn host(&self) -> &str {
        self.get_header("host").unwrap_or(&self.default_host)
    }

    /// Whether the client connection is HTTPS, directly or behind a proxy
    pub fn is_ssl(&self) -> bool {
        self.secure_transport
            || self
                .get_header("x-forwarded-proto")
                .map(|p| p.eq_ignore_ascii_case("https"))
                .unwrap_or(false)
    }

    /// Query string parameter
    pub fn get(&self, name: &str) -> Option<&String> {
        self.query.get(name)
    }

    /// Body field
    pub fn post(&self, name: &str) -> Option<&String> {
        self.form.get(name)
    }

    pub fn get_cookie(&self, name: &str) -> Option<&String> {
        self.cookies.get(name)
    }

    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)?.to_str().ok()
    }

    pub fn is_get(&self) -> bool {
        self.method == Method::GET
    }

    pub fn is_post(&self) -> bool {
        self.method == Method::POST
    }
}

/// Decode one `application/x-www-form-urlencoded` component
fn decode_component(raw: &str) -> String {
    let spaced = raw.replace('+', " ");
    urlencoding::decode(&spaced)
        .map(|s| s.into_owned())
        .unwrap_or(spaced)
}

/// Split `a=1&b=2` into decoded pairs; a later duplicate key wins
fn parse_urlencoded(input: &str) -> HashMap<String, String> {
    input
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (k, v) = pair.split_once('=').unwrap_or((pair, ""));
            (decode_component(k), decode_component(v))
        })
        .collect()
}

/// `?key=value` pairs of the request URI
#[derive(Debug, Clone, Default)]
pub struct QueryParams(HashMap<String, String>);

impl QueryParams {
    /// Parse a raw query string (without the `?`)
    pub fn parse(query: &str) -> Self {
        Self(parse_urlencoded(query))
    }

    pub fn get(&self, key: &str) -> Option<&String> {
        self.0.get(key)
    }

    pub fn get_as<T: std::str::FromStr>(&self, key: &str) -> Option<T> {
        self.0.get(key)?.parse().ok()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Submitted body fields, values trimmed
///
/// JSON bodies are flattened one level: string members become fields as-is,
/// other members their JSON text. The parsed document stays available.
#[derive(Debug, Clone, Default)]
pub struct FormData {
    fields: HashMap<String, String>,
    json: Option<JsonValue>,
}

impl FormData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_fields(fields: HashMap<String, String>) -> Self {
        let fields = fields
            .into_iter()
            .map(|(k, v)| (k, v.trim().to_string()))
            .collect();
        Self { fields, json: None }
    }

    pub fn from_json(json: JsonValue) -> Self {
        let fields = match &json {
            JsonValue::Object(members) => members
                .iter()
                .map(|(key, value)| {
                    let text = match value {
                        JsonValue::String(s) => s.trim().to_string(),
                        other => other.to_string(),
                    };
                    (key.clone(), text)
                })
                .collect(),
            _ => HashMap::new(),
        };
        Self { fields, json: Some(json) }
    }

    /// Parse a request body by content type; unknown types give empty form data
    pub fn from_body(content_type: &str, body: &[u8]) -> Self {
        if content_type.contains("application/json") {
            serde_json::from_slice::<JsonValue>(body)
                .map(Self::from_json)
                .unwrap_or_default()
        } else if content_type.contains("application/x-www-form-urlencoded") {
            Self::from_fields(parse_urlencoded(&String::from_utf8_lossy(body)))
        } else {
            Self::new()
        }
    }

    pub fn get(&self, key: &str) -> Option<&String> {
        self.fields.get(key)
    }

    pub fn get_as<T: std::str::FromStr>(&self, key: &str) -> Option<T> {
        self.fields.get(key)?.parse().ok()
    }

    /// The parsed document of a JSON body
    pub fn json(&self) -> Option<&JsonValue> {
        self.json.as_ref()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.json.is_none()
    }
}
