//! # Portico Router
//!
//! Ordered, pattern-based routing for front-controller applications:
//! - Static segments (`/account/signin`)
//! - Named captures (`/user/:user_name/status/:id`), one non-empty segment each
//! - Literal default params per route
//!
//! ## Matching Rules
//!
//! - Routes are compiled once, at startup, to anchored regular expressions
//! - Routes are tried in declaration order; the first full match wins,
//!   regardless of how specific a later route is
//! - A path without a leading `/` is normalized before matching
//! - Resolved params always contain `controller` and `action`; captures
//!   override same-named defaults
//!
//! ## Example
//!
//! ```
//! use portico_router::{Router, RouteDefinition};
//!
//! let router = Router::new(vec![
//!     RouteDefinition::new("/", "status", "index"),
//!     RouteDefinition::new("/users/:id", "user", "show"),
//! ])
//! .unwrap();
//!
//! let params = router.resolve("/users/42").unwrap();
//! assert_eq!(params.controller(), "user");
//! assert_eq!(params.action(), "show");
//! assert_eq!(params.get("id"), Some("42"));
//!
//! assert!(router.resolve("/unknown").is_none());
//! ```

use std::collections::HashMap;

pub mod path;
pub mod route;

pub use path::normalize_path;
pub use route::pattern::{classify_segment, compile_pattern, PatternSegmentType};
pub use route::{CompiledRoute, RouteDefinition};

/// Errors raised while compiling a route table
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RouteError {
    #[error("invalid parameter name `{name}` in route `{pattern}`")]
    InvalidParam { pattern: String, name: String },

    #[error("parameter `{name}` appears more than once in route `{pattern}`")]
    DuplicateParam { pattern: String, name: String },

    #[error("route `{pattern}` did not compile: {message}")]
    Regex { pattern: String, message: String },
}

/// Params produced by a successful resolution
///
/// Always contains `controller` and `action`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ResolvedParams {
    params: HashMap<String, String>,
}

impl ResolvedParams {
    pub fn new(params: HashMap<String, String>) -> Self {
        Self { params }
    }

    /// Controller name as declared in the route (e.g. "user")
    pub fn controller(&self) -> &str {
        self.get("controller").unwrap_or_default()
    }

    /// Action name as declared in the route (e.g. "show")
    pub fn action(&self) -> &str {
        self.get("action").unwrap_or_default()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    /// Get a param parsed as a specific type
    pub fn get_as<T: std::str::FromStr>(&self, key: &str) -> Option<T> {
        self.params.get(key)?.parse().ok()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.params.contains_key(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.params.insert(key.into(), value.into());
    }

    pub fn as_map(&self) -> &HashMap<String, String> {
        &self.params
    }

    pub fn into_map(self) -> HashMap<String, String> {
        self.params
    }
}

impl From<HashMap<String, String>> for ResolvedParams {
    fn from(params: HashMap<String, String>) -> Self {
        Self::new(params)
    }
}

/// The route table: compiled routes in declaration order
#[derive(Debug, Clone, Default)]
pub struct Router {
    routes: Vec<CompiledRoute>,
}

impl Router {
    /// Compiles route definitions, preserving their order
    pub fn new<I>(definitions: I) -> Result<Self, RouteError>
    where
        I: IntoIterator<Item = RouteDefinition>,
    {
        let routes = definitions
            .into_iter()
            .map(CompiledRoute::compile)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { routes })
    }

    /// Compiles a terse `(pattern, controller, action)` table
    ///
    /// ```
    /// use portico_router::Router;
    ///
    /// let router = Router::from_table([
    ///     ("/account", "account", "index"),
    ///     ("/account/:action", "account", "index"),
    /// ])
    /// .unwrap();
    ///
    /// assert_eq!(router.resolve("/account/signin").unwrap().action(), "signin");
    /// ```
    pub fn from_table<I, T>(table: I) -> Result<Self, RouteError>
    where
        I: IntoIterator<Item = T>,
        T: Into<RouteDefinition>,
    {
        Self::new(table.into_iter().map(Into::into))
    }

    /// Resolves a path to its params, or `None` when no route matches
    pub fn resolve(&self, path_info: &str) -> Option<ResolvedParams> {
        let path = normalize_path(path_info);
        self.routes.iter().find_map(|route| route.resolve(&path))
    }

    /// Like [`Router::resolve`], also returning the route that matched
    pub fn resolve_route(&self, path_info: &str) -> Option<(&CompiledRoute, ResolvedParams)> {
        let path = normalize_path(path_info);
        self.routes
            .iter()
            .find_map(|route| route.resolve(&path).map(|params| (route, params)))
    }

    /// Builds a path for the first route targeting `controller`/`action`
    /// whose captures can all be filled from `params`
    ///
    /// ```
    /// use portico_router::Router;
    /// use std::collections::HashMap;
    ///
    /// let router = Router::from_table([("/user/:user_name", "status", "user")]).unwrap();
    ///
    /// let mut params = HashMap::new();
    /// params.insert("user_name".to_string(), "alice".to_string());
    /// assert_eq!(router.url_for("status", "user", &params).as_deref(), Some("/user/alice"));
    /// ```
    pub fn url_for(
        &self,
        controller: &str,
        action: &str,
        params: &HashMap<String, String>,
    ) -> Option<String> {
        self.routes
            .iter()
            .filter(|route| {
                let def = route.definition();
                def.controller == controller && def.action == action
            })
            .find_map(|route| route.generate(params))
    }

    pub fn routes(&self) -> &[CompiledRoute] {
        &self.routes
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}
