//! Sign-up, sign-in and the account page.

use super::{current_user, form_value, sign_in};
use crate::models::{UserRepository, USER_ENTITY};
use anyhow::anyhow;
use portico::controller::DEFAULT_LAYOUT;
use portico::{vars, ActionResult, AuthGate, BoxFuture, Controller, ControllerDef, ResolvedParams};
use serde_json::json;

const SIGNUP_FORM: &str = "account/signup";
const SIGNIN_FORM: &str = "account/signin";

pub fn definition() -> ControllerDef {
    ControllerDef::new("AccountController")
        .auth(AuthGate::actions(["index", "signout"]))
        .action("index", index)
        .action("signup", signup)
        .action("register", register)
        .action("signin", signin)
        .action("authenticate", authenticate)
        .action("signout", signout)
}

/// Problems with a new account's user name and password
pub fn validate_new_account(user_name: &str, password: &str) -> Vec<String> {
    let mut errors = Vec::new();

    if user_name.is_empty() {
        errors.push("Please enter a user name.".to_string());
    } else if !(3..=20).contains(&user_name.chars().count())
        || !user_name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        errors.push("User name must be 3 to 20 letters, digits or underscores.".to_string());
    }

    if password.is_empty() {
        errors.push("Please enter a password.".to_string());
    } else if !(4..=30).contains(&password.chars().count()) {
        errors.push("Password must be 4 to 30 characters.".to_string());
    }

    errors
}

fn render_signup(c: &mut Controller, user_name: &str, errors: Vec<String>) -> ActionResult {
    let token = c.generate_csrf_token(SIGNUP_FORM);
    c.set_layout_var("title", "Sign up");
    c.render_with(
        vars(json!({ "user_name": user_name, "errors": errors, "_token": token })),
        Some("signup"),
        Some(DEFAULT_LAYOUT),
    )
}

fn render_signin(c: &mut Controller, user_name: &str, errors: Vec<String>) -> ActionResult {
    let token = c.generate_csrf_token(SIGNIN_FORM);
    c.set_layout_var("title", "Sign in");
    c.render_with(
        vars(json!({ "user_name": user_name, "errors": errors, "_token": token })),
        Some("signin"),
        Some(DEFAULT_LAYOUT),
    )
}

fn index(c: &mut Controller, _params: ResolvedParams) -> BoxFuture<'_, ActionResult> {
    Box::pin(async move {
        let user = current_user(c)?;
        c.set_layout_var("title", "Account");
        c.render(vars(json!({ "user": user })))
    })
}

fn signup(c: &mut Controller, _params: ResolvedParams) -> BoxFuture<'_, ActionResult> {
    Box::pin(async move {
        if c.session().is_authenticated() {
            return c.redirect("/account");
        }
        render_signup(c, "", Vec::new())
    })
}

fn register(c: &mut Controller, _params: ResolvedParams) -> BoxFuture<'_, ActionResult> {
    Box::pin(async move {
        if !c.request().is_post() {
            return Err(c.forward_404());
        }
        if c.session().is_authenticated() {
            return c.redirect("/account");
        }

        let token = form_value(c, "_token");
        if !c.check_csrf_token(SIGNUP_FORM, &token) {
            return c.redirect("/account/signup");
        }

        let user_name = form_value(c, "user_name");
        let password = form_value(c, "password");
        let users = c.db().get::<UserRepository>(USER_ENTITY)?;

        let mut errors = validate_new_account(&user_name, &password);
        if errors.is_empty() && !users.is_unique_user_name(&user_name).await? {
            errors.push("That user name is already taken.".to_string());
        }
        if !errors.is_empty() {
            return render_signup(c, &user_name, errors);
        }

        users.insert(&user_name, &password).await?;
        let user = users
            .fetch_by_user_name(&user_name)
            .await?
            .ok_or_else(|| anyhow!("user {} missing right after insert", user_name))?;

        tracing::info!(user = %user.user_name, "Account created");
        sign_in(c, &user);
        c.redirect("/")
    })
}

fn signin(c: &mut Controller, _params: ResolvedParams) -> BoxFuture<'_, ActionResult> {
    Box::pin(async move {
        if c.session().is_authenticated() {
            return c.redirect("/account");
        }
        render_signin(c, "", Vec::new())
    })
}

fn authenticate(c: &mut Controller, _params: ResolvedParams) -> BoxFuture<'_, ActionResult> {
    Box::pin(async move {
        if !c.request().is_post() {
            return Err(c.forward_404());
        }
        if c.session().is_authenticated() {
            return c.redirect("/account");
        }

        let token = form_value(c, "_token");
        if !c.check_csrf_token(SIGNIN_FORM, &token) {
            return c.redirect("/account/signin");
        }

        let user_name = form_value(c, "user_name");
        let password = form_value(c, "password");

        let mut errors = Vec::new();
        if user_name.is_empty() {
            errors.push("Please enter a user name.".to_string());
        }
        if password.is_empty() {
            errors.push("Please enter a password.".to_string());
        }
        if !errors.is_empty() {
            return render_signin(c, &user_name, errors);
        }

        let users = c.db().get::<UserRepository>(USER_ENTITY)?;
        match users.authenticate(&user_name, &password).await? {
            Some(user) => {
                tracing::info!(user = %user.user_name, "Signed in");
                sign_in(c, &user);
                c.redirect("/")
            }
            None => render_signin(
                c,
                &user_name,
                vec!["Invalid user name or password.".to_string()],
            ),
        }
    })
}

fn signout(c: &mut Controller, _params: ResolvedParams) -> BoxFuture<'_, ActionResult> {
    Box::pin(async move {
        let session = c.session_mut();
        session.clear();
        session.set_authenticated(false);
        c.redirect("/account/signin")
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("alice", "pass")]
    #[case("bob_42", "a-much-longer-password")]
    #[case("abc", "1234")]
    fn test_valid_accounts(#[case] user_name: &str, #[case] password: &str) {
        assert!(validate_new_account(user_name, password).is_empty());
    }

    #[rstest]
    #[case("", "pass", "Please enter a user name.")]
    #[case("al", "pass", "User name must be 3 to 20 letters, digits or underscores.")]
    #[case("has space", "pass", "User name must be 3 to 20 letters, digits or underscores.")]
    #[case("a_very_long_user_name_indeed", "pass", "User name must be 3 to 20 letters, digits or underscores.")]
    #[case("alice", "", "Please enter a password.")]
    #[case("alice", "abc", "Password must be 4 to 30 characters.")]
    fn test_invalid_accounts(#[case] user_name: &str, #[case] password: &str, #[case] message: &str) {
        assert_eq!(validate_new_account(user_name, password), vec![message.to_string()]);
    }

    #[test]
    fn test_definition_gates_account_pages() {
        let def = definition();
        assert_eq!(def.name(), "account");
        assert!(def.gate().requires("index"));
        assert!(def.gate().requires("signout"));
        assert!(!def.gate().requires("signin"));
        assert!(!def.gate().requires("register"));
    }
}
