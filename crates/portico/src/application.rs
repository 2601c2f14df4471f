// File: src/application.rs
// Purpose: Front controller - resolve the route, run the action, send the response
//
// Lifecycle of one request:
//   path_info → Router::resolve → run_action → Controller::run
//   NotFound     → 404 page
//   Unauthorized → configured login action, else 401 page
//   Internal     → 500 page
// then the session is committed and the response sent, exactly once.

use crate::config::{ActionTarget, Config};
use crate::controller::{canonical_type_name, Controller, ControllerDef, RequestScope};
use crate::db::{Database, DbManager, Repository};
use crate::error::DispatchError;
use crate::request::Request;
use crate::response::{HttpResponse, Response};
use crate::session::{Session, SessionCookie, SessionStore};
use crate::view::ViewRegistry;
use anyhow::{Context, Result};
use maud::{html, Markup, DOCTYPE};
use portico_router::{ResolvedParams, RouteDefinition, Router};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Message shown for 404s outside debug mode
pub const NOT_FOUND_MESSAGE: &str = "Page not found.";

type RepositoryRegistration = Box<dyn FnOnce(&mut Database) + Send>;

/// Everything shared by all requests; immutable once built
pub struct Application {
    config: Config,
    router: Arc<Router>,
    controllers: HashMap<String, Arc<ControllerDef>>,
    views: Arc<ViewRegistry>,
    database: Arc<Database>,
    sessions: SessionStore,
}

impl std::fmt::Debug for Application {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut controllers: Vec<_> = self.controllers.keys().collect();
        controllers.sort();
        f.debug_struct("Application")
            .field("routes", &self.router.len())
            .field("controllers", &controllers)
            .field("views", &self.views)
            .field("database", &self.database)
            .finish()
    }
}

/// Startup registration of routes, controllers, views and repositories
pub struct ApplicationBuilder {
    config: Config,
    routes: Vec<RouteDefinition>,
    controllers: Vec<ControllerDef>,
    views: ViewRegistry,
    database: Option<Database>,
    repositories: Vec<RepositoryRegistration>,
}

impl ApplicationBuilder {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            routes: Vec::new(),
            controllers: Vec::new(),
            views: ViewRegistry::new(),
            database: None,
            repositories: Vec::new(),
        }
    }

    /// Append a route after those from the configuration file
    pub fn route(mut self, route: impl Into<RouteDefinition>) -> Self {
        self.routes.push(route.into());
        self
    }

    pub fn routes<I, T>(mut self, routes: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<RouteDefinition>,
    {
        self.routes.extend(routes.into_iter().map(Into::into));
        self
    }

    pub fn controller(mut self, def: ControllerDef) -> Self {
        self.controllers.push(def);
        self
    }

    pub fn views(mut self, views: ViewRegistry) -> Self {
        self.views = views;
        self
    }

    /// Use this database instead of the configured connections
    pub fn database(mut self, database: Database) -> Self {
        self.database = Some(database);
        self
    }

    pub fn repository<R: Repository>(mut self, entity: impl Into<String>) -> Self {
        let entity = entity.into();
        self.repositories.push(Box::new(move |database: &mut Database| {
            database.register_repository::<R>(entity);
        }));
        self
    }

    pub fn build(self) -> Result<Application> {
        let ApplicationBuilder {
            config,
            routes,
            controllers,
            views,
            database,
            repositories,
        } = self;

        let table = config.routes.iter().cloned().chain(routes);
        let router = Router::new(table).context("Invalid route table")?;

        let mut database = match database {
            Some(database) => database,
            None => Database::from_config(&config.database)
                .context("Failed to set up database connections")?,
        };
        for register in repositories {
            register(&mut database);
        }

        let controllers: HashMap<String, Arc<ControllerDef>> = controllers
            .into_iter()
            .map(|def| (def.type_name().to_string(), Arc::new(def)))
            .collect();

        for route in router.routes() {
            let def = route.definition();
            if !controllers.contains_key(&canonical_type_name(&def.controller)) {
                tracing::warn!(
                    pattern = %def.pattern,
                    controller = %def.controller,
                    "Route targets an unregistered controller"
                );
            }
        }

        tracing::debug!(
            routes = router.len(),
            controllers = controllers.len(),
            views = views.len(),
            "Application built"
        );

        let sessions = SessionStore::with_lifetime(Duration::from_secs(config.session.lifetime));

        Ok(Application {
            config,
            router: Arc::new(router),
            controllers,
            views: Arc::new(views),
            database: Arc::new(database),
            sessions,
        })
    }
}

impl Application {
    pub fn builder(config: Config) -> ApplicationBuilder {
        ApplicationBuilder::new(config)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn is_debug(&self) -> bool {
        self.config.app.debug
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    pub fn views(&self) -> &ViewRegistry {
        &self.views
    }

    pub fn database(&self) -> &Arc<Database> {
        &self.database
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    /// Controller definition by canonical type name (`"UserController"`)
    pub fn controller(&self, type_name: &str) -> Option<&Arc<ControllerDef>> {
        self.controllers.get(type_name)
    }

    /// Handle a request end to end, opening the session from its cookie
    pub async fn handle(&self, request: Request) -> HttpResponse {
        let session_id = request.get_cookie(&self.config.session.cookie_name).cloned();
        let session = self.sessions.open(session_id.as_deref()).await;
        self.run(request, session).await
    }

    /// Dispatch a request with an already opened session
    pub async fn run(&self, request: Request, session: Session) -> HttpResponse {
        let scope = RequestScope::new(request, session, DbManager::new(self.database.clone()));
        let path = scope.request.path_info().to_string();

        let (scope, outcome) = match self.router.resolve(&path) {
            Some(params) => {
                let controller = params.controller().to_string();
                let action = params.action().to_string();
                tracing::debug!(path = %path, controller = %controller, action = %action, "Route resolved");
                self.run_action(&controller, &action, params, scope).await
            }
            None => {
                tracing::warn!(path = %path, "No route matched");
                let err = DispatchError::not_found(format!("No route found for {}", path));
                (scope, Err(err))
            }
        };

        let (mut scope, outcome) = match (outcome, &self.config.app.login_action) {
            (Err(DispatchError::Unauthorized), Some(login)) => {
                tracing::debug!(
                    controller = %login.controller,
                    action = %login.action,
                    "Dispatching to login action"
                );
                let params = login_params(login);
                self.run_action(&login.controller, &login.action, params, scope).await
            }
            (outcome, _) => (scope, outcome),
        };

        if let Err(err) = outcome {
            self.render_error(&mut scope.response, &err);
        }

        self.finish(scope).await
    }

    /// Look up `controller`, run `action` on it and store its content as the
    /// response body
    ///
    /// The scope is handed back whatever the outcome.
    pub async fn run_action(
        &self,
        controller: &str,
        action: &str,
        params: ResolvedParams,
        scope: RequestScope,
    ) -> (RequestScope, Result<(), DispatchError>) {
        let type_name = canonical_type_name(controller);

        let Some(def) = self.controllers.get(&type_name).cloned() else {
            tracing::warn!(controller = %type_name, "Controller not registered");
            let err = DispatchError::not_found(format!("{} controller is not found.", type_name));
            return (scope, Err(err));
        };

        let mut controller =
            Controller::new(def, scope, self.views.clone(), self.router.clone());
        let result = controller.run(action, params).await;
        let mut scope = controller.into_scope();

        match result {
            Ok(content) => {
                scope.response.set_body(content);
                (scope, Ok(()))
            }
            Err(err) => (scope, Err(err)),
        }
    }

    fn render_error(&self, response: &mut Response, err: &DispatchError) {
        let (status, text) = err.status();
        let debug = self.is_debug();

        let message = match err {
            DispatchError::NotFound(detail) if debug => detail.clone(),
            DispatchError::NotFound(_) => NOT_FOUND_MESSAGE.to_string(),
            DispatchError::Unauthorized => "You need to sign in to view this page.".to_string(),
            DispatchError::Internal(e) => {
                tracing::error!(error = %format!("{:#}", e), "Action failed");
                if debug {
                    format!("{:#}", e)
                } else {
                    "Something went wrong on our side.".to_string()
                }
            }
        };

        // nothing the failed action left behind but its cookies
        response.reset();
        response.set_status(status, text);
        response.set_body(error_page(&format!("{} {}", status.as_u16(), text), &message).into_string());
    }

    async fn finish(&self, scope: RequestScope) -> HttpResponse {
        let RequestScope {
            request,
            mut response,
            session,
            ..
        } = scope;

        if let SessionCookie::Set(id) = self.sessions.commit(session).await {
            response.append_header("Set-Cookie", self.session_cookie(&id, &request));
        }

        response.send()
    }

    fn session_cookie(&self, id: &str, request: &Request) -> String {
        let path = match request.base_url() {
            "" => "/",
            base => base,
        };
        let mut cookie = format!(
            "{}={}; Path={}; HttpOnly; SameSite=Lax",
            self.config.session.cookie_name, id, path
        );
        if request.is_ssl() {
            cookie.push_str("; Secure");
        }
        cookie
    }
}

fn login_params(login: &ActionTarget) -> ResolvedParams {
    let mut params = ResolvedParams::default();
    params.insert("controller", login.controller.clone());
    params.insert("action", login.action.clone());
    params
}

/// Minimal HTML shell for error outcomes; `message` is escaped
fn error_page(title: &str, message: &str) -> Markup {
    html! {
        (DOCTYPE)
        html lang="en" {
            head {
                meta charset="utf-8";
                title { (title) }
            }
            body {
                h1 { (title) }
                p { (message) }
            }
        }
    }
}
