use super::{csrf_field, errors, field};
use maud::{html, Markup};
use portico::ViewContext;
use serde_json::Value;

fn status_item(base: &str, status: &Value) -> Markup {
    let user_name = field(status, "user_name");
    let id = status.get("id").and_then(Value::as_i64).unwrap_or_default();

    html! {
        div.status {
            div.status_content {
                a href={ (base) "/user/" (user_name) } { (user_name) }
                " "
                (field(status, "body"))
            }
            div.status_meta {
                a href={ (base) "/user/" (user_name) "/status/" (id) } {
                    (field(status, "created_at"))
                }
            }
        }
    }
}

fn timeline(ctx: &ViewContext) -> Markup {
    let base = ctx.base_url();
    html! {
        div #statuses {
            @for status in ctx.list("statuses") {
                (status_item(base, status))
            }
        }
    }
}

pub fn index(ctx: &ViewContext) -> Markup {
    let user = ctx.get("user").cloned().unwrap_or(Value::Null);

    html! {
        h2 { "Home" }
        p { "Signed in as " strong { (field(&user, "user_name")) } }
        form action={ (ctx.base_url()) "/status/post" } method="post" {
            (csrf_field(ctx))
            (errors(ctx))
            textarea name="body" rows="2" cols="60" { (ctx.str("body")) }
            p { input type="submit" value="Post"; }
        }
        (timeline(ctx))
    }
}

pub fn user(ctx: &ViewContext) -> Markup {
    let user = ctx.get("user").cloned().unwrap_or(Value::Null);

    html! {
        h2 { (field(&user, "user_name")) }
        (timeline(ctx))
    }
}

pub fn show(ctx: &ViewContext) -> Markup {
    let status = ctx.get("status").cloned().unwrap_or(Value::Null);
    html! { (status_item(ctx.base_url(), &status)) }
}
