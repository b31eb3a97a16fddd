//! Integration tests for the raw interceptors.
//!
//! Each test adapts a real `http::Request` into a [`RawExchange`] and runs
//! the interceptor against a fresh request scope.

use bytes::Bytes;
use http::{Method, Request as HttpRequest};
use http_body_util::Full;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tessera_core::di::{Container, ServiceProvider};
use tessera_core::schema::{BodySchema, BodyType, FieldSchema, FileSchema, Validator};
use tessera_core::{RawExchange, RawFlow, RawInterceptor, Request};
use tessera_extract::{
    BodyInterceptor, BodyParserRegistry, CookieInterceptor, FnBodyParser, ParsedBody,
    ParserOptions, QueryInterceptor,
};

fn exchange(method: Method, uri: &str, headers: &[(&str, &str)], body: &str) -> RawExchange {
    let mut builder = HttpRequest::builder().method(method).uri(uri);
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }
    let request = builder
        .body(Full::new(Bytes::from(body.to_string())))
        .unwrap();
    RawExchange::from_http(request)
}

fn request_for(exchange: &RawExchange) -> Request {
    Request::new(
        exchange.method.clone(),
        exchange.uri.clone(),
        Container::new().create_scope(),
    )
}

async fn run(interceptor: &dyn RawInterceptor, exchange: &mut RawExchange) -> (RawFlow, Request) {
    let mut request = request_for(exchange);
    let flow = interceptor.intercept(exchange, &mut request).await;
    (flow, request)
}

#[tokio::test]
async fn test_body_interceptor_sets_typed_body() {
    #[derive(Deserialize)]
    struct Order {
        sku: String,
        quantity: i64,
    }

    let interceptor = BodyInterceptor::new(
        Some(
            BodySchema::object()
                .field("sku", BodyType::String)
                .field("quantity", BodyType::Integer),
        ),
        None,
    );
    let mut raw = exchange(
        Method::POST,
        "/orders",
        &[("content-type", "application/json")],
        r#"{"sku":"A-1","quantity":3}"#,
    );

    let (flow, request) = run(&interceptor, &mut raw).await;
    assert!(matches!(flow, RawFlow::Continue));
    assert!(raw.body_taken());

    let order: Order = request.body_as().unwrap();
    assert_eq!(order.sku, "A-1");
    assert_eq!(order.quantity, 3);
}

#[tokio::test]
async fn test_body_interceptor_enforces_size_ceiling() {
    let interceptor = BodyInterceptor::new(Some(BodySchema::text()), None)
        .options(ParserOptions::new().max_body_size(4));
    let mut raw = exchange(
        Method::POST,
        "/notes",
        &[("content-type", "text/plain")],
        "hello",
    );

    let (flow, _) = run(&interceptor, &mut raw).await;
    match flow {
        RawFlow::Reject(err) => assert_eq!(err.status_code(), 413),
        other => panic!("expected rejection, got {other:?}"),
    }
}

#[tokio::test]
async fn test_body_interceptor_uses_custom_parser() {
    let registry = Arc::new(BodyParserRegistry::with_defaults());
    registry.register(
        "application/csv",
        FnBodyParser::new(|stream, input| async move {
            let bytes = tessera_extract::accumulate_body(stream, input.options.max_body_size).await?;
            let rows: Vec<String> = String::from_utf8_lossy(&bytes)
                .lines()
                .map(str::to_string)
                .collect();
            Ok::<_, tessera_core::TesseraError>(ParsedBody::body(json!(rows)))
        }),
    );
    let interceptor = BodyInterceptor::new(
        Some(BodySchema::new(BodyType::Array(Box::new(BodyType::String)))),
        None,
    )
    .registry(registry);
    let mut raw = exchange(
        Method::POST,
        "/import",
        &[("content-type", "application/csv")],
        "a,b\nc,d",
    );

    let (flow, request) = run(&interceptor, &mut raw).await;
    assert!(matches!(flow, RawFlow::Continue));
    assert_eq!(request.body(), Some(&json!(["a,b", "c,d"])));
}

#[tokio::test]
async fn test_body_interceptor_requires_declared_file() {
    let interceptor = BodyInterceptor::new(None, Some(FileSchema::new().required("avatar")));
    let body = "--B\r\nContent-Disposition: form-data; name=\"title\"\r\n\r\nhi\r\n--B--\r\n";
    let mut raw = exchange(
        Method::POST,
        "/profile",
        &[("content-type", "multipart/form-data; boundary=B")],
        body,
    );

    let (flow, _) = run(&interceptor, &mut raw).await;
    match flow {
        RawFlow::Reject(err) => {
            assert_eq!(err.status_code(), 400);
            assert!(err.to_string().contains("\"avatar\""));
        }
        other => panic!("expected rejection, got {other:?}"),
    }
}

#[tokio::test]
async fn test_cookie_and_query_interceptors() {
    let cookies = CookieInterceptor::new(FieldSchema::new().present("session"));
    let query = QueryInterceptor::new(
        FieldSchema::new().field("limit", Validator::integer().range(1, 100)),
    );
    let mut raw = exchange(
        Method::GET,
        "/items?limit=25",
        &[("cookie", "session=abc; theme=dark")],
        "",
    );
    let mut request = request_for(&raw);

    assert!(matches!(
        cookies.intercept(&mut raw, &mut request).await,
        RawFlow::Continue
    ));
    assert!(matches!(
        query.intercept(&mut raw, &mut request).await,
        RawFlow::Continue
    ));
    assert_eq!(request.cookies()["session"], json!("abc"));
    assert_eq!(request.cookies()["theme"], json!("dark"));
    assert_eq!(request.query_params()["limit"], json!(25));
}

#[tokio::test]
async fn test_query_interceptor_rejects_out_of_range() {
    let query = QueryInterceptor::new(
        FieldSchema::new().field("limit", Validator::integer().range(1, 100)),
    );
    let mut raw = exchange(Method::GET, "/items?limit=500", &[], "");

    let (flow, _) = run(&query, &mut raw).await;
    match flow {
        RawFlow::Reject(err) => {
            assert_eq!(err.status_code(), 400);
            assert!(err.to_string().contains("\"limit\""));
        }
        other => panic!("expected rejection, got {other:?}"),
    }
}
