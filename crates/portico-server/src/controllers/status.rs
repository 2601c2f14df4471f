//! Home timeline, posting, and public status pages.

use super::{current_user, form_value};
use crate::models::{Status, StatusRepository, UserRepository, STATUS_ENTITY, USER_ENTITY};
use portico::controller::DEFAULT_LAYOUT;
use portico::{vars, ActionResult, AuthGate, BoxFuture, Controller, ControllerDef, ResolvedParams};
use serde_json::json;

const POST_FORM: &str = "status/post";

pub const MAX_STATUS_CHARS: usize = 200;

pub fn definition() -> ControllerDef {
    ControllerDef::new("StatusController")
        .auth(AuthGate::actions(["index", "post"]))
        .action("index", index)
        .action("post", post)
        .action("user", user)
        .action("show", show)
}

pub fn validate_status(body: &str) -> Vec<String> {
    if body.is_empty() {
        vec!["Please write something.".to_string()]
    } else if body.chars().count() > MAX_STATUS_CHARS {
        vec![format!("Statuses are limited to {} characters.", MAX_STATUS_CHARS)]
    } else {
        Vec::new()
    }
}

fn render_home(
    c: &mut Controller,
    statuses: Vec<Status>,
    body: &str,
    errors: Vec<String>,
) -> ActionResult {
    let user = current_user(c)?;
    let token = c.generate_csrf_token(POST_FORM);
    c.set_layout_var("title", "Home");
    c.render_with(
        vars(json!({
            "user": user,
            "statuses": statuses,
            "body": body,
            "errors": errors,
            "_token": token,
        })),
        Some("index"),
        Some(DEFAULT_LAYOUT),
    )
}

fn index(c: &mut Controller, _params: ResolvedParams) -> BoxFuture<'_, ActionResult> {
    Box::pin(async move {
        let user = current_user(c)?;
        let statuses = c
            .db()
            .get::<StatusRepository>(STATUS_ENTITY)?
            .fetch_all_by_user_id(user.id)
            .await?;
        render_home(c, statuses, "", Vec::new())
    })
}

fn post(c: &mut Controller, _params: ResolvedParams) -> BoxFuture<'_, ActionResult> {
    Box::pin(async move {
        if !c.request().is_post() {
            return Err(c.forward_404());
        }

        let token = form_value(c, "_token");
        if !c.check_csrf_token(POST_FORM, &token) {
            return c.redirect("/");
        }

        let user = current_user(c)?;
        let body = form_value(c, "body");
        let statuses = c.db().get::<StatusRepository>(STATUS_ENTITY)?;

        let errors = validate_status(&body);
        if errors.is_empty() {
            statuses.insert(user.id, &body).await?;
            return c.redirect("/");
        }

        let timeline = statuses.fetch_all_by_user_id(user.id).await?;
        render_home(c, timeline, &body, errors)
    })
}

fn user(c: &mut Controller, params: ResolvedParams) -> BoxFuture<'_, ActionResult> {
    Box::pin(async move {
        let user_name = params.get("user_name").unwrap_or_default();
        let Some(user) = c
            .db()
            .get::<UserRepository>(USER_ENTITY)?
            .fetch_by_user_name(user_name)
            .await?
        else {
            return Err(c.forward_404());
        };

        let statuses = c
            .db()
            .get::<StatusRepository>(STATUS_ENTITY)?
            .fetch_all_by_user_id(user.id)
            .await?;

        c.set_layout_var("title", user.user_name.clone());
        c.render(vars(json!({ "user": user, "statuses": statuses })))
    })
}

fn show(c: &mut Controller, params: ResolvedParams) -> BoxFuture<'_, ActionResult> {
    Box::pin(async move {
        let user_name = params.get("user_name").unwrap_or_default();
        let Some(id) = params.get_as::<i64>("id") else {
            return Err(c.forward_404());
        };

        let Some(status) = c
            .db()
            .get::<StatusRepository>(STATUS_ENTITY)?
            .fetch_by_id_and_user_name(id, user_name)
            .await?
        else {
            return Err(c.forward_404());
        };

        c.set_layout_var("title", status.user_name.clone());
        c.render(vars(json!({ "status": status })))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_status() {
        assert!(validate_status("hello").is_empty());
        assert_eq!(validate_status(""), vec!["Please write something.".to_string()]);
        assert!(validate_status(&"x".repeat(MAX_STATUS_CHARS)).is_empty());
        assert_eq!(
            validate_status(&"x".repeat(MAX_STATUS_CHARS + 1)),
            vec!["Statuses are limited to 200 characters.".to_string()]
        );
    }

    #[test]
    fn test_definition() {
        let def = definition();
        assert_eq!(def.type_name(), "StatusController");
        assert!(def.gate().requires("index"));
        assert!(def.gate().requires("post"));
        assert!(!def.gate().requires("user"));
        assert!(!def.gate().requires("show"));
        assert!(def.has_action("show"));
    }
}
