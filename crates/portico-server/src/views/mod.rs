// File: src/views/mod.rs
// Purpose: Maud templates for the blog, registered by path

mod account;
mod status;

use maud::{html, Markup, DOCTYPE};
use portico::{ViewContext, ViewRegistry};
use serde_json::Value;

const SITE_NAME: &str = "Mini Blog";

pub fn registry() -> ViewRegistry {
    ViewRegistry::new()
        .with("layout", layout)
        .with("account/index", account::index)
        .with("account/signup", account::signup)
        .with("account/signin", account::signin)
        .with("status/index", status::index)
        .with("status/user", status::user)
        .with("status/show", status::show)
}

fn layout(ctx: &ViewContext) -> Markup {
    let base = ctx.base_url();
    let title = match ctx.str("title") {
        "" => SITE_NAME.to_string(),
        title => format!("{} - {}", title, SITE_NAME),
    };

    html! {
        (DOCTYPE)
        html lang="en" {
            head {
                meta charset="utf-8";
                meta name="viewport" content="width=device-width, initial-scale=1";
                title { (title) }
            }
            body {
                header {
                    h1 { a href={ (base) "/" } { (SITE_NAME) } }
                    nav {
                        ul {
                            @if ctx.is_authenticated() {
                                li { a href={ (base) "/" } { "Home" } }
                                li { a href={ (base) "/account" } { "Account" } }
                            } @else {
                                li { a href={ (base) "/account/signin" } { "Sign in" } }
                                li { a href={ (base) "/account/signup" } { "Sign up" } }
                            }
                        }
                    }
                }
                main { (ctx.content()) }
            }
        }
    }
}

/// String field of a JSON object, `""` when missing
fn field<'a>(value: &'a Value, key: &str) -> &'a str {
    value.get(key).and_then(Value::as_str).unwrap_or_default()
}

fn errors(ctx: &ViewContext) -> Markup {
    let errors = ctx.list("errors");
    html! {
        @if !errors.is_empty() {
            ul.error_list {
                @for error in errors {
                    li { (error.as_str().unwrap_or_default()) }
                }
            }
        }
    }
}

fn csrf_field(ctx: &ViewContext) -> Markup {
    html! { input type="hidden" name="_token" value=(ctx.str("_token")); }
}
