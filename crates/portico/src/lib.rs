// Portico - front-controller MVC on Axum + Maud
// Routes map paths to controller actions; actions render maud views and
// reach the database through per-entity repositories.

pub mod application;
pub mod config;
pub mod controller;
pub mod csrf;
pub mod db;
pub mod error;
pub mod request;
pub mod response;
pub mod service;
pub mod session;
pub mod view;

// Re-export the router
pub use portico_router::{ResolvedParams, RouteDefinition, RouteError, Router};

// Re-export Maud for templates
pub use maud::{html, Markup, PreEscaped, DOCTYPE};

// Re-export framework types
pub use application::{Application, ApplicationBuilder};
pub use config::{ActionTarget, Config};
pub use controller::{Action, AuthGate, BoxFuture, Controller, ControllerDef, RequestScope};
pub use db::{from_record, Database, DbError, DbManager, DbRepository, Record, Repository};
pub use error::{ActionResult, DispatchError};
pub use request::{FormData, QueryParams, Request};
pub use response::{HttpResponse, Response};
pub use service::into_router;
pub use session::{Session, SessionStore};
pub use view::{escape, vars, View, ViewContext, ViewRegistry, Vars};

// Re-export commonly used types from dependencies
pub use axum;
pub use axum::http::StatusCode;
