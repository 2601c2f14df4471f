use super::{csrf_field, errors, field};
use maud::{html, Markup};
use portico::ViewContext;
use serde_json::Value;

pub fn index(ctx: &ViewContext) -> Markup {
    let base = ctx.base_url();
    let user = ctx.get("user").cloned().unwrap_or(Value::Null);
    let user_name = field(&user, "user_name");

    html! {
        h2 { "Account" }
        p { "User name: " strong { (user_name) } }
        ul {
            li { a href={ (base) "/" } { "Home" } }
            li { a href={ (base) "/user/" (user_name) } { "Your statuses" } }
            li { a href={ (base) "/account/signout" } { "Sign out" } }
        }
    }
}

fn credentials_form(ctx: &ViewContext, action: &str, submit: &str) -> Markup {
    html! {
        form action={ (ctx.base_url()) (action) } method="post" {
            (csrf_field(ctx))
            (errors(ctx))
            table {
                tbody {
                    tr {
                        th { label for="user_name" { "User name" } }
                        td { input type="text" id="user_name" name="user_name" value=(ctx.str("user_name")); }
                    }
                    tr {
                        th { label for="password" { "Password" } }
                        td { input type="password" id="password" name="password"; }
                    }
                }
            }
            p { input type="submit" value=(submit); }
        }
    }
}

pub fn signup(ctx: &ViewContext) -> Markup {
    html! {
        h2 { "Sign up" }
        (credentials_form(ctx, "/account/register", "Sign up"))
    }
}

pub fn signin(ctx: &ViewContext) -> Markup {
    html! {
        h2 { "Sign in" }
        p { a href={ (ctx.base_url()) "/account/signup" } { "New here? Create an account" } }
        (credentials_form(ctx, "/account/authenticate", "Sign in"))
    }
}
