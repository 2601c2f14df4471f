/// Mini blog flows driven through the full router
///
/// Every test gets its own in-memory SQLite database. The pool holds a
/// single connection so the schema and data live as long as the app.
use axum::body::Body;
use axum::http::{header, Request as HttpRequest, StatusCode};
use portico::config::ConnectionConfig;
use portico::{into_router, Config, HttpResponse};
use portico_server::{build_application, prepare_database};
use pretty_assertions::assert_eq;
use std::sync::Arc;
use tower::ServiceExt;

const HOST: &str = "blog.test";

async fn app() -> axum::Router {
    let mut config = Config::default();
    let mut connection = ConnectionConfig::new("default", "sqlite::memory:");
    connection.max_connections = 1;
    config.database.connections.push(connection);

    let app = build_application(config).unwrap();
    prepare_database(&app).await.unwrap();
    into_router(Arc::new(app))
}

fn get(uri: &str, cookie: Option<&str>) -> HttpRequest<Body> {
    let mut builder = HttpRequest::get(uri).header(header::HOST, HOST);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::empty()).unwrap()
}

fn post(uri: &str, cookie: &str, body: String) -> HttpRequest<Body> {
    HttpRequest::post(uri)
        .header(header::HOST, HOST)
        .header(header::COOKIE, cookie)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(body))
        .unwrap()
}

async fn body_string(response: HttpResponse) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

/// Keep `cookie` in step with a rotated or newly issued session id
fn update_cookie(cookie: &mut String, response: &HttpResponse) {
    if let Some(set_cookie) = response.headers().get(header::SET_COOKIE) {
        let set_cookie = set_cookie.to_str().unwrap();
        *cookie = set_cookie.split(';').next().unwrap().to_string();
    }
}

fn location(response: &HttpResponse) -> &str {
    response
        .headers()
        .get(header::LOCATION)
        .expect("Location header")
        .to_str()
        .unwrap()
}

fn csrf_token(html: &str) -> String {
    let marker = r#"name="_token" value=""#;
    let start = html.find(marker).expect("CSRF field") + marker.len();
    let end = html[start..].find('"').unwrap();
    html[start..start + end].to_string()
}

/// Sign up `user_name` and return the signed-in session cookie
async fn sign_up(router: &axum::Router, user_name: &str) -> String {
    let mut cookie = String::new();

    let response = router
        .clone()
        .oneshot(get("/account/signup", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    update_cookie(&mut cookie, &response);
    let token = csrf_token(&body_string(response).await);

    let response = router
        .clone()
        .oneshot(post(
            "/account/register",
            &cookie,
            format!("_token={}&user_name={}&password=secret", token, user_name),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response), format!("http://{}/", HOST));
    update_cookie(&mut cookie, &response);

    cookie
}

#[tokio::test]
async fn test_sign_up_post_and_browse() {
    let router = app().await;
    let cookie = sign_up(&router, "alice").await;

    // Home shows the signed-in user and a posting form
    let response = router.clone().oneshot(get("/", Some(&cookie))).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let html = body_string(response).await;
    assert!(html.contains("<title>Home - Mini Blog</title>"));
    assert!(html.contains("Signed in as <strong>alice</strong>"));
    let token = csrf_token(&html);

    let response = router
        .clone()
        .oneshot(post(
            "/status/post",
            &cookie,
            format!("_token={}&body=Hello%20from%20Portico", token),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response), format!("http://{}/", HOST));

    // Public pages need no session
    let response = router.clone().oneshot(get("/user/alice", None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let html = body_string(response).await;
    assert!(html.contains("<h2>alice</h2>"));
    assert!(html.contains("Hello from Portico"));
    assert!(html.contains(r#"href="/user/alice/status/1""#));

    let response = router
        .clone()
        .oneshot(get("/user/alice/status/1", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_string(response).await.contains("Hello from Portico"));
}

#[tokio::test]
async fn test_invalid_status_is_shown_with_errors() {
    let router = app().await;
    let cookie = sign_up(&router, "bob").await;

    let response = router.clone().oneshot(get("/", Some(&cookie))).await.unwrap();
    let token = csrf_token(&body_string(response).await);

    let response = router
        .clone()
        .oneshot(post("/status/post", &cookie, format!("_token={}&body=", token)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_string(response).await.contains("Please write something."));
}

#[tokio::test]
async fn test_duplicate_user_name_is_rejected() {
    let router = app().await;
    sign_up(&router, "carol").await;

    let mut cookie = String::new();
    let response = router
        .clone()
        .oneshot(get("/account/signup", None))
        .await
        .unwrap();
    update_cookie(&mut cookie, &response);
    let token = csrf_token(&body_string(response).await);

    let response = router
        .clone()
        .oneshot(post(
            "/account/register",
            &cookie,
            format!("_token={}&user_name=carol&password=secret", token),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_string(response).await.contains("That user name is already taken."));
}

#[tokio::test]
async fn test_sign_out_then_sign_in() {
    let router = app().await;
    let mut cookie = sign_up(&router, "dave").await;

    let response = router
        .clone()
        .oneshot(get("/account/signout", Some(&cookie)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response), format!("http://{}/account/signin", HOST));
    update_cookie(&mut cookie, &response);

    // Signed out, the account page falls back to the sign-in form
    let response = router
        .clone()
        .oneshot(get("/account", Some(&cookie)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    update_cookie(&mut cookie, &response);
    let html = body_string(response).await;
    assert!(html.contains("<h2>Sign in</h2>"));
    let token = csrf_token(&html);

    let response = router
        .clone()
        .oneshot(post(
            "/account/authenticate",
            &cookie,
            format!("_token={}&user_name=dave&password=wrong", token),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    update_cookie(&mut cookie, &response);
    let html = body_string(response).await;
    assert!(html.contains("Invalid user name or password."));
    let token = csrf_token(&html);

    let response = router
        .clone()
        .oneshot(post(
            "/account/authenticate",
            &cookie,
            format!("_token={}&user_name=dave&password=secret", token),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response), format!("http://{}/", HOST));
}

#[tokio::test]
async fn test_home_requires_sign_in() {
    let router = app().await;

    let response = router.clone().oneshot(get("/", None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let html = body_string(response).await;
    assert!(html.contains("<h2>Sign in</h2>"));
    assert!(html.contains(r#"action="/account/authenticate""#));
}

#[tokio::test]
async fn test_unknown_pages_are_not_found() {
    let router = app().await;

    for uri in ["/user/nobody", "/user/nobody/status/1", "/user/x/status/abc", "/nope/at/all"] {
        let response = router.clone().oneshot(get(uri, None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND, "{}", uri);
        assert!(body_string(response).await.contains("Page not found."));
    }
}

#[tokio::test]
async fn test_register_rejects_get() {
    let router = app().await;

    let response = router
        .clone()
        .oneshot(get("/account/register", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
