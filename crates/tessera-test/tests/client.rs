//! Driving real handlers through the test client.

use http::{Method, StatusCode};
use serde_json::{json, Value};
use tessera_core::di::{Binding, Container};
use tessera_core::schema::{BodySchema, BodyType, FieldSchema, FileSchema, Validator};
use tessera_core::{InterceptionMoment, Request, TesseraError};
use tessera_middleware::{guard_fn, handler_fn, Handler, Route, RouteBuilder, Services, DENIED_MESSAGE};
use tessera_test::{MultipartForm, TestClient, TestRequest};

/// Echoes everything the pipeline validated.
fn echo(method: Method, url: &str) -> RouteBuilder {
    Route::builder(method, url).handler(handler_fn(|req: &Request, _: Services| {
        let files: Value = req
            .files()
            .iter()
            .map(|(field, files)| {
                let contents: Vec<String> = files
                    .iter()
                    .map(|f| String::from_utf8_lossy(&f.data).into_owned())
                    .collect();
                (field.clone(), json!(contents))
            })
            .collect::<serde_json::Map<_, _>>()
            .into();
        let echo = json!({
            "body": req.body(),
            "cookies": req.cookies(),
            "query": req.query_params(),
            "params": req.url_params(),
            "files": files,
        });
        async move { Ok::<_, TesseraError>(echo) }
    }))
}

fn client(route: Route) -> TestClient {
    TestClient::new(Handler::new(&Container::new(), route))
}

#[tokio::test]
async fn form_body_arrives_in_chunks() {
    let client = client(
        echo(Method::POST, "/login")
            .body(
                BodySchema::object()
                    .field("user", BodyType::String)
                    .field("pass", BodyType::String),
            )
            .build(),
    );

    let response = client
        .post("/login")
        .form(&[("user", "ada"), ("pass", "s3cret word")])
        .chunked(3)
        .send()
        .await;

    response
        .assert_status(StatusCode::OK)
        .assert_moment(InterceptionMoment::HandlerFinishedWithOkResponse)
        .assert_json_field("body.user", &json!("ada"))
        .assert_json_field("body.pass", &json!("s3cret word"));
}

#[tokio::test]
async fn declared_cookie_is_required() {
    let client = client(
        echo(Method::GET, "/me")
            .cookies(FieldSchema::new().field("session", Validator::non_empty()))
            .build(),
    );

    client
        .get("/me")
        .send()
        .await
        .assert_status(StatusCode::BAD_REQUEST)
        .assert_moment(InterceptionMoment::DataValidationFailed);

    client
        .get("/me")
        .cookie("theme", "dark")
        .cookie("session", "abc123")
        .send()
        .await
        .assert_status(StatusCode::OK)
        .assert_json_field("cookies.session", &json!("abc123"));
}

#[tokio::test]
async fn query_is_encoded_and_converted() {
    let client = client(
        echo(Method::GET, "/search")
            .query_params(
                FieldSchema::new()
                    .field("q", Validator::non_empty())
                    .field("page", Validator::integer().range(1, 50)),
            )
            .build(),
    );

    client
        .get("/search")
        .query("q", "red & blue")
        .query("page", "3")
        .send()
        .await
        .assert_status(StatusCode::OK)
        .assert_json_field("query.q", &json!("red & blue"))
        .assert_json_field("query.page", &json!(3));
}

#[tokio::test]
async fn chunked_multipart_upload_reaches_handler() {
    let client = client(
        echo(Method::POST, "/albums")
            .files(FileSchema::new().required("photo"))
            .build(),
    );

    let form = MultipartForm::new()
        .text("title", "holiday")
        .file("photo", "beach.txt", "text/plain", "sand and sea");

    client
        .post("/albums")
        .multipart(form)
        .chunked(7)
        .send()
        .await
        .assert_status(StatusCode::OK)
        .assert_json_field("files.photo.0", &json!("sand and sea"));
}

#[tokio::test]
async fn missing_file_is_a_validation_failure() {
    let client = client(
        echo(Method::POST, "/albums")
            .files(FileSchema::new().required("photo"))
            .build(),
    );

    let response = client
        .post("/albums")
        .multipart(MultipartForm::new().text("title", "holiday"))
        .send()
        .await;

    response
        .assert_status(StatusCode::BAD_REQUEST)
        .assert_moment(InterceptionMoment::DataValidationFailed);
    assert!(response.error_message().unwrap().contains("photo"));
}

#[tokio::test]
async fn denying_guard_is_reported() {
    let client = client(
        echo(Method::GET, "/admin")
            .guard(guard_fn(|req: &Request, _: Services| {
                let admin = req.header("x-role") == Some("admin");
                async move { admin }
            }))
            .build(),
    );

    client
        .get("/admin")
        .header("x-role", "guest")
        .send()
        .await
        .assert_status(StatusCode::UNAUTHORIZED)
        .assert_moment(InterceptionMoment::GuardPreventedProgression)
        .assert_error_message(DENIED_MESSAGE);

    client
        .get("/admin")
        .header("x-role", "admin")
        .send()
        .await
        .assert_status(StatusCode::OK);
}

#[tokio::test]
async fn url_params_and_default_headers() {
    let container = Container::new();
    container.register("store", Binding::value("north".to_string()));

    let route = Route::builder(Method::GET, "/orders/:id")
        .headers(FieldSchema::new().present("x-tenant"))
        .url_params(FieldSchema::new().field("id", Validator::integer()))
        .handler(
            handler_fn(|req: &Request, services: Services| {
                let id = req.url_params()["id"].clone();
                let tenant = req.header("x-tenant").map(ToString::to_string);
                async move {
                    let store = services.get::<String>("store")?;
                    Ok::<_, TesseraError>(json!({ "id": id, "tenant": tenant, "store": store.as_str() }))
                }
            })
            .inject(["request", "store"]),
        )
        .build();

    let client = TestClient::new(Handler::new(&container, route))
        .with_url_param("id", "7")
        .with_default_header("x-tenant", "acme");

    client
        .get("/orders/7")
        .send()
        .await
        .assert_status(StatusCode::OK)
        .assert_json_eq(&json!({ "id": 7, "tenant": "acme", "store": "north" }));
}

#[tokio::test]
async fn text_body_is_decoded() {
    let client = client(echo(Method::POST, "/notes").body(BodySchema::text()).build());

    client
        .post("/notes")
        .text("remember the milk")
        .send()
        .await
        .assert_status(StatusCode::OK)
        .assert_json_field("body", &json!("remember the milk"));
}

#[tokio::test]
async fn prepared_exchange_can_be_executed() {
    let client = client(echo(Method::PUT, "/items").build());
    let exchange = TestRequest::put("/items").query("x", "1").build().unwrap();

    let response = client.execute(exchange).await.unwrap();
    response
        .assert_status(StatusCode::OK)
        .assert_json_field("query.x", &json!("1"));
}

#[tokio::test]
async fn invalid_header_fails_try_send() {
    let client = client(echo(Method::GET, "/").build());
    let result = client.get("/").header("bad header", "x").try_send().await;
    assert!(result.is_err());
}
