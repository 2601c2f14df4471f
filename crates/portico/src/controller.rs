//! Controllers: per-request action dispatch behind an authentication gate.
//!
//! A controller type is described once at startup by a [`ControllerDef`]:
//! its type name, its action table and its [`AuthGate`]. For every request
//! that resolves to it, the dispatcher builds a [`Controller`] around the
//! request's [`RequestScope`] and calls [`Controller::run`].
//!
//! Actions are plain functions:
//!
//! ```ignore
//! fn show(c: &mut Controller, params: ResolvedParams) -> BoxFuture<'_, ActionResult> {
//!     Box::pin(async move {
//!         let id: i64 = params.get_as("id").ok_or_else(|| c.forward_404())?;
//!         c.render(vars(json!({ "id": id })))
//!     })
//! }
//! ```

use crate::csrf;
use crate::db::DbManager;
use crate::error::{ActionResult, DispatchError};
use crate::request::Request;
use crate::response::Response;
use crate::session::Session;
use crate::view::{View, Vars, ViewRegistry};
use portico_router::{ResolvedParams, Router};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// An action handler
pub type Action = for<'a> fn(&'a mut Controller, ResolvedParams) -> BoxFuture<'a, ActionResult>;

/// Layout wrapped around rendered templates unless told otherwise
pub const DEFAULT_LAYOUT: &str = "layout";

const CONTROLLER_SUFFIX: &str = "Controller";

/// Everything one request owns while it is being dispatched
#[derive(Debug)]
pub struct RequestScope {
    pub request: Request,
    pub response: Response,
    pub session: Session,
    pub db: DbManager,
}

impl RequestScope {
    pub fn new(request: Request, session: Session, db: DbManager) -> Self {
        Self {
            request,
            response: Response::new(),
            session,
            db,
        }
    }
}

/// Which actions need a signed-in session
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum AuthGate {
    #[default]
    None,
    All,
    Actions(HashSet<String>),
}

impl AuthGate {
    pub fn actions<I, S>(actions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        AuthGate::Actions(actions.into_iter().map(Into::into).collect())
    }

    pub fn requires(&self, action: &str) -> bool {
        match self {
            AuthGate::None => false,
            AuthGate::All => true,
            AuthGate::Actions(actions) => actions.contains(action),
        }
    }
}

/// Startup description of a controller type
#[derive(Clone)]
pub struct ControllerDef {
    type_name: String,
    name: String,
    auth: AuthGate,
    actions: HashMap<String, Action>,
}

impl std::fmt::Debug for ControllerDef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut actions: Vec<_> = self.actions.keys().collect();
        actions.sort();
        f.debug_struct("ControllerDef")
            .field("type_name", &self.type_name)
            .field("auth", &self.auth)
            .field("actions", &actions)
            .finish()
    }
}

/// `"UserController"` → `"user"`
pub fn controller_name(type_name: &str) -> String {
    type_name
        .strip_suffix(CONTROLLER_SUFFIX)
        .unwrap_or(type_name)
        .to_lowercase()
}

/// `"user"` → `"UserController"`
pub fn canonical_type_name(controller: &str) -> String {
    let mut chars = controller.chars();
    match chars.next() {
        Some(first) => format!("{}{}{}", first.to_uppercase(), chars.as_str(), CONTROLLER_SUFFIX),
        None => CONTROLLER_SUFFIX.to_string(),
    }
}

impl ControllerDef {
    pub fn new(type_name: impl Into<String>) -> Self {
        let type_name = type_name.into();
        Self {
            name: controller_name(&type_name),
            type_name,
            auth: AuthGate::None,
            actions: HashMap::new(),
        }
    }

    pub fn auth(mut self, gate: AuthGate) -> Self {
        self.auth = gate;
        self
    }

    pub fn action(mut self, name: impl Into<String>, handler: Action) -> Self {
        self.actions.insert(name.into(), handler);
        self
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn gate(&self) -> &AuthGate {
        &self.auth
    }

    pub fn handler(&self, action: &str) -> Option<Action> {
        self.actions.get(action).copied()
    }

    pub fn has_action(&self, action: &str) -> bool {
        self.actions.contains_key(action)
    }
}

/// A controller bound to one request
pub struct Controller {
    def: Arc<ControllerDef>,
    action_name: String,
    scope: RequestScope,
    views: Arc<ViewRegistry>,
    router: Arc<Router>,
    layout_vars: Vars,
}

impl std::fmt::Debug for Controller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Controller")
            .field("name", &self.def.name)
            .field("action", &self.action_name)
            .finish()
    }
}

impl Controller {
    pub fn new(
        def: Arc<ControllerDef>,
        scope: RequestScope,
        views: Arc<ViewRegistry>,
        router: Arc<Router>,
    ) -> Self {
        Self {
            def,
            action_name: String::new(),
            scope,
            views,
            router,
            layout_vars: Vars::new(),
        }
    }

    /// Run `action`: look it up, apply the auth gate, invoke it
    pub async fn run(&mut self, action: &str, params: ResolvedParams) -> ActionResult {
        self.action_name = action.to_string();

        let Some(handler) = self.def.handler(action) else {
            return Err(self.forward_404());
        };

        if self.needs_authentication(action) && !self.scope.session.is_authenticated() {
            tracing::warn!(
                controller = %self.def.name,
                action = %action,
                "Unauthenticated request for protected action"
            );
            return Err(DispatchError::Unauthorized);
        }

        tracing::debug!(controller = %self.def.name, action = %action, "Running action");
        handler(self, params).await
    }

    pub fn needs_authentication(&self, action: &str) -> bool {
        self.def.auth.requires(action)
    }

    /// Hand the request scope back to the dispatcher
    pub fn into_scope(self) -> RequestScope {
        self.scope
    }

    pub fn name(&self) -> &str {
        &self.def.name
    }

    pub fn action_name(&self) -> &str {
        &self.action_name
    }

    pub fn request(&self) -> &Request {
        &self.scope.request
    }

    pub fn session(&self) -> &Session {
        &self.scope.session
    }

    pub fn session_mut(&mut self) -> &mut Session {
        &mut self.scope.session
    }

    pub fn response_mut(&mut self) -> &mut Response {
        &mut self.scope.response
    }

    pub fn db(&mut self) -> &mut DbManager {
        &mut self.scope.db
    }

    /// Not-found outcome naming this controller and action
    pub fn forward_404(&self) -> DispatchError {
        DispatchError::NotFound(format!(
            "Forwarded 404 page from {}/{}",
            self.def.name, self.action_name
        ))
    }

    /// Set a variable for the layout of the next render
    pub fn set_layout_var(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.layout_vars.insert(name.into(), value.into());
    }

    /// Render `<controller>/<action>` inside the default layout
    pub fn render(&self, vars: Vars) -> ActionResult {
        self.render_with(vars, None, Some(DEFAULT_LAYOUT))
    }

    /// Render `<controller>/<template>` (the action name when `None`),
    /// wrapped in `layout` when given
    pub fn render_with(&self, vars: Vars, template: Option<&str>, layout: Option<&str>) -> ActionResult {
        let request = &self.scope.request;

        let mut defaults = Vars::new();
        defaults.insert("base_url".into(), request.base_url().into());
        defaults.insert("request_path".into(), request.path_info().into());
        defaults.insert(
            "authenticated".into(),
            self.scope.session.is_authenticated().into(),
        );

        let mut view = View::new(&self.views, defaults);
        for (name, value) in &self.layout_vars {
            view.set_layout_var(name.clone(), value.clone());
        }

        let template = template.unwrap_or(&self.action_name);
        let path = format!("{}/{}", self.def.name, template);

        Ok(view.render(&path, vars, layout)?)
    }

    /// Answer with a 302 to `url`
    ///
    /// Relative URLs are made absolute against the scheme, host and base
    /// URL of the current request.
    pub fn redirect(&mut self, url: &str) -> ActionResult {
        let target = if url.starts_with("http://") || url.starts_with("https://") {
            url.to_string()
        } else {
            let request = &self.scope.request;
            let protocol = if request.is_ssl() { "https://" } else { "http://" };
            format!("{}{}{}{}", protocol, request.host(), request.base_url(), url)
        };

        tracing::debug!(location = %target, "Redirecting");
        self.scope.response.redirect(&target);
        Ok(String::new())
    }

    /// Path for a controller/action, prefixed with the base URL
    pub fn url_for(&self, controller: &str, action: &str, params: &[(&str, &str)]) -> Option<String> {
        let params: HashMap<String, String> = params
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        self.router
            .url_for(controller, action, &params)
            .map(|path| format!("{}{}", self.scope.request.base_url(), path))
    }

    pub fn generate_csrf_token(&mut self, form: &str) -> String {
        csrf::generate_token(&mut self.scope.session, form)
    }

    pub fn check_csrf_token(&mut self, form: &str, token: &str) -> bool {
        csrf::check_token(&mut self.scope.session, form, token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::view::vars;
    use axum::http::{HeaderMap, Method, StatusCode};
    use maud::html;
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use serde_json::json;

    fn list(c: &mut Controller, _params: ResolvedParams) -> BoxFuture<'_, ActionResult> {
        Box::pin(async move { Ok(format!("list from {}", c.name())) })
    }

    fn delete(_c: &mut Controller, params: ResolvedParams) -> BoxFuture<'_, ActionResult> {
        Box::pin(async move { Ok(format!("deleted {}", params.get("id").unwrap_or("?"))) })
    }

    fn show(c: &mut Controller, params: ResolvedParams) -> BoxFuture<'_, ActionResult> {
        Box::pin(async move {
            let id: i64 = params.get_as("id").ok_or_else(|| c.forward_404())?;
            c.set_layout_var("title", format!("User {}", id));
            c.render(vars(json!({ "id": id })))
        })
    }

    fn user_def() -> Arc<ControllerDef> {
        Arc::new(
            ControllerDef::new("UserController")
                .auth(AuthGate::actions(["delete"]))
                .action("list", list)
                .action("delete", delete)
                .action("show", show),
        )
    }

    fn views() -> Arc<ViewRegistry> {
        Arc::new(
            ViewRegistry::new()
                .with("user/show", |ctx| {
                    let id = ctx.get("id").map(|v| v.to_string()).unwrap_or_default();
                    html! { p { "user " (id) } }
                })
                .with("layout", |ctx| html! { h1 { (ctx.str("title")) } (ctx.content()) }),
        )
    }

    async fn controller_for(def: Arc<ControllerDef>, request: Request) -> Controller {
        let scope = RequestScope::new(
            request,
            Session::detached().await,
            DbManager::new(Arc::new(Database::new())),
        );
        let router = Router::from_table([("/user/:id", "user", "show")]).unwrap();
        Controller::new(def, scope, views(), Arc::new(router))
    }

    async fn controller(def: Arc<ControllerDef>) -> Controller {
        let request = Request::new(Method::GET, "/blog/user/1", HeaderMap::new())
            .with_mount_path("/blog")
            .with_default_host("example.com");
        controller_for(def, request).await
    }

    fn params(pairs: &[(&str, &str)]) -> ResolvedParams {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect::<HashMap<_, _>>()
            .into()
    }

    #[rstest]
    #[case("UserController", "user")]
    #[case("StatusController", "status")]
    #[case("Account", "account")]
    fn test_controller_name(#[case] type_name: &str, #[case] expected: &str) {
        assert_eq!(controller_name(type_name), expected);
    }

    #[rstest]
    #[case("user", "UserController")]
    #[case("status", "StatusController")]
    #[case("", "Controller")]
    fn test_canonical_type_name(#[case] controller: &str, #[case] expected: &str) {
        assert_eq!(canonical_type_name(controller), expected);
    }

    #[test]
    fn test_auth_gate() {
        assert!(!AuthGate::None.requires("delete"));
        assert!(AuthGate::All.requires("anything"));

        let gate = AuthGate::actions(["delete"]);
        assert!(gate.requires("delete"));
        assert!(!gate.requires("list"));
        assert!(!AuthGate::actions(Vec::<String>::new()).requires("delete"));
    }

    #[tokio::test]
    async fn test_missing_action_is_not_found() {
        let mut c = controller(user_def()).await;
        let err = c.run("nope", params(&[])).await.unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "Forwarded 404 page from user/nope");
    }

    #[tokio::test]
    async fn test_gated_action_requires_authentication() {
        let mut c = controller(user_def()).await;

        let err = c.run("delete", params(&[("id", "3")])).await.unwrap_err();
        assert!(err.is_unauthorized());

        assert_eq!(c.run("list", params(&[])).await.unwrap(), "list from user");

        c.session_mut().set_authenticated(true);
        assert_eq!(c.run("delete", params(&[("id", "3")])).await.unwrap(), "deleted 3");
    }

    #[tokio::test]
    async fn test_gate_all() {
        let def = Arc::new(ControllerDef::new("StatusController").auth(AuthGate::All).action("list", list));
        let mut c = controller(def).await;
        assert!(c.run("list", params(&[])).await.unwrap_err().is_unauthorized());
    }

    #[tokio::test]
    async fn test_missing_action_wins_over_gate() {
        let def = Arc::new(ControllerDef::new("StatusController").auth(AuthGate::All));
        let mut c = controller(def).await;
        assert!(c.run("list", params(&[])).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_render_with_layout() {
        let mut c = controller(user_def()).await;
        let body = c.run("show", params(&[("id", "7")])).await.unwrap();
        assert_eq!(body, "<h1>User 7</h1><p>user 7</p>");
    }

    #[tokio::test]
    async fn test_action_forward_404() {
        let mut c = controller(user_def()).await;
        let err = c.run("show", params(&[("id", "abc")])).await.unwrap_err();
        assert_eq!(err.to_string(), "Forwarded 404 page from user/show");
    }

    #[tokio::test]
    async fn test_missing_template_is_internal() {
        let mut c = controller(user_def()).await;
        c.action_name = "list".into();
        let err = c.render(Vars::new()).unwrap_err();
        assert!(matches!(err, DispatchError::Internal(_)));
    }

    #[tokio::test]
    async fn test_redirect_relative_url() {
        let mut c = controller(user_def()).await;
        assert_eq!(c.redirect("/account").unwrap(), "");

        let response = c.into_scope().response;
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(response.header("location"), Some("http://example.com/blog/account"));
    }

    #[tokio::test]
    async fn test_redirect_https_and_absolute() {
        let mut headers = HeaderMap::new();
        headers.insert("host", "secure.example".parse().unwrap());
        headers.insert("x-forwarded-proto", "https".parse().unwrap());
        let request = Request::new(Method::GET, "/", headers);

        let mut c = controller_for(user_def(), request).await;
        c.redirect("/signin").unwrap();
        assert_eq!(
            c.response_mut().header("location"),
            Some("https://secure.example/signin")
        );

        c.redirect("http://elsewhere.test/x").unwrap();
        assert_eq!(c.response_mut().header("location"), Some("http://elsewhere.test/x"));
    }

    #[tokio::test]
    async fn test_url_for_includes_base_url() {
        let c = controller(user_def()).await;
        assert_eq!(c.url_for("user", "show", &[("id", "5")]).as_deref(), Some("/blog/user/5"));
        assert_eq!(c.url_for("user", "missing", &[]), None);
    }

    #[tokio::test]
    async fn test_csrf_helpers() {
        let mut c = controller(user_def()).await;
        let first = c.generate_csrf_token("user/delete");
        let second = c.generate_csrf_token("user/delete");
        assert_ne!(first, second);

        assert!(c.check_csrf_token("user/delete", &second));
        assert!(!c.check_csrf_token("user/delete", &second));
        assert!(c.check_csrf_token("user/delete", &first));
    }
}
