// Portico mini blog
// Users sign up, post short statuses and browse each other's timelines.
// Everything goes through the Portico dispatcher: routes below, controllers
// in `controllers`, maud templates in `views`, SQL in `models`.

pub mod controllers;
pub mod models;
pub mod views;

use anyhow::{Context, Result};
use portico::config::ConnectionConfig;
use portico::{ActionTarget, Application, Config};

use models::{StatusRepository, UserRepository, STATUS_ENTITY, USER_ENTITY};

/// Used when neither portico.toml nor `DATABASE_URL` names a database
pub const DEFAULT_DATABASE_URL: &str = "sqlite:blog.db?mode=rwc";

/// Built-in route table, matched after any `[[routes]]` from the config
pub const ROUTES: &[(&str, &str, &str)] = &[
    ("/", "status", "index"),
    ("/status/post", "status", "post"),
    ("/user/:user_name", "status", "user"),
    ("/user/:user_name/status/:id", "status", "show"),
    ("/account", "account", "index"),
    // a captured `:action` replaces "index"
    ("/account/:action", "account", "index"),
];

/// Assemble the blog application on top of `config`
pub fn build_application(mut config: Config) -> Result<Application> {
    if config.app.login_action.is_none() {
        config.app.login_action = Some(ActionTarget::new("account", "signin"));
    }
    if config.database.connections.is_empty() {
        config
            .database
            .connections
            .push(ConnectionConfig::new("default", DEFAULT_DATABASE_URL));
    }

    let mut builder = Application::builder(config)
        .routes(ROUTES.iter().copied())
        .views(views::registry())
        .repository::<UserRepository>(USER_ENTITY)
        .repository::<StatusRepository>(STATUS_ENTITY);
    for def in controllers::definitions() {
        builder = builder.controller(def);
    }

    builder.build().context("Failed to build the blog application")
}

/// Create the blog tables on the default connection
pub async fn prepare_database(app: &Application) -> Result<()> {
    let pool = app
        .database()
        .connection(None)
        .context("No default database connection")?;
    models::create_schema(pool)
        .await
        .context("Failed to create the blog schema")?;
    tracing::info!("Database schema ready");
    Ok(())
}
