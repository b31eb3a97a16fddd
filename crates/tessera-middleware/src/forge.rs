//! Building the typed request from the raw exchange.

use crate::options::HandlerOptions;
use serde_json::{Map, Value};
use tessera_core::di::Scope;
use tessera_core::schema::{FieldKind, FieldSchema, SchemaSet};
use tessera_core::{
    header_map_to_json, url_params_to_json, RawExchange, Request, TesseraError, UrlParams,
};
use tessera_extract::{cookies_from_headers, discard_uploads, parse_query, read_body};

/// Forging failed; carries what was built so far.
#[derive(Debug)]
pub struct ForgeError {
    /// The partially filled request.
    pub request: Box<Request>,
    /// The first validation failure.
    pub error: TesseraError,
}

/// Builds and validates a request.
///
/// Categories are filled in this order: headers, body and files, cookies,
/// URL parameters, query parameters. The first failure stops forging.
/// The body is only read when the schema declares a body or files. Cookies
/// and query parameters are always parsed, but a malformed cookie header or
/// query string only fails the request if the matching schema is declared.
/// Uploads persisted before a later failure are removed.
pub async fn forge_request(
    exchange: &mut RawExchange,
    url_params: &UrlParams,
    schema: &SchemaSet,
    scope: Scope,
    options: &HandlerOptions,
) -> Result<Request, ForgeError> {
    let mut request = Request::new(exchange.method.clone(), exchange.uri.clone(), scope);
    match fill(&mut request, exchange, url_params, schema, options).await {
        Ok(()) => Ok(request),
        Err(error) => {
            discard_uploads(request.files()).await;
            Err(ForgeError {
                request: Box::new(request),
                error,
            })
        }
    }
}

async fn fill(
    request: &mut Request,
    exchange: &mut RawExchange,
    url_params: &UrlParams,
    schema: &SchemaSet,
    options: &HandlerOptions,
) -> Result<(), TesseraError> {
    let headers = header_map_to_json(&exchange.headers);
    request.set_headers(validated(schema.headers.as_ref(), FieldKind::Header, headers)?);

    if schema.expects_body() {
        let stream = exchange.take_body();
        let body = read_body(
            &exchange.headers,
            stream,
            schema.body.as_ref(),
            schema.files.as_ref(),
            &options.registry,
            &options.parser,
        )
        .await?;
        request.set_body(body.body);
        request.set_files(body.files);
    }

    let cookies = lenient(
        cookies_from_headers(&exchange.headers),
        schema.cookies.is_some(),
        "cookie header",
    )?;
    request.set_cookies(validated(schema.cookies.as_ref(), FieldKind::Cookie, cookies)?);

    let params = url_params_to_json(url_params);
    request.set_url_params(validated(schema.url_params.as_ref(), FieldKind::UrlParam, params)?);

    let query = lenient(
        parse_query(exchange.uri.query().unwrap_or_default()),
        schema.query_params.is_some(),
        "query string",
    )?;
    request.set_query_params(validated(
        schema.query_params.as_ref(),
        FieldKind::QueryParam,
        query,
    )?);

    Ok(())
}

fn validated(
    schema: Option<&FieldSchema>,
    kind: FieldKind,
    source: Map<String, Value>,
) -> Result<Map<String, Value>, TesseraError> {
    match schema {
        Some(schema) => schema.validate(kind, &source),
        None => Ok(source),
    }
}

fn lenient(
    parsed: Result<Map<String, Value>, TesseraError>,
    declared: bool,
    what: &str,
) -> Result<Map<String, Value>, TesseraError> {
    match parsed {
        Ok(map) => Ok(map),
        Err(err) if declared => Err(err),
        Err(err) => {
            tracing::debug!(error = %err, "ignoring malformed {what}");
            Ok(Map::new())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use http::{HeaderMap, HeaderValue, Method, Uri};
    use serde_json::json;
    use tessera_core::di::{Container, ServiceProvider};
    use tessera_core::schema::{BodySchema, BodyType, Validator};
    use tessera_core::BodyStream;

    fn stream(body: &'static [u8]) -> BodyStream {
        Box::pin(futures_util::stream::iter(vec![Ok(Bytes::from_static(body))]))
    }

    fn exchange(uri: &'static str, headers: &[(&'static str, &'static str)], body: &'static [u8]) -> RawExchange {
        let mut map = HeaderMap::new();
        for (name, value) in headers {
            map.append(*name, HeaderValue::from_static(*value));
        }
        RawExchange::new(Method::POST, Uri::from_static(uri), map, stream(body))
    }

    async fn forge(
        exchange: &mut RawExchange,
        params: &UrlParams,
        schema: &SchemaSet,
    ) -> Result<Request, ForgeError> {
        forge_request(
            exchange,
            params,
            schema,
            Container::new().create_scope(),
            &HandlerOptions::default(),
        )
        .await
    }

    #[tokio::test]
    async fn test_every_category_is_filled() {
        let mut schema = SchemaSet::new();
        schema.headers = Some(FieldSchema::new().field("x-page", Validator::integer()));
        schema.body = Some(BodySchema::object().field("name", BodyType::String));
        schema.url_params = Some(FieldSchema::new().field("id", Validator::integer()));
        schema.query_params = Some(FieldSchema::new().field("verbose", Validator::boolean()));

        let mut exchange = exchange(
            "/users/7?verbose=true",
            &[
                ("x-page", "3"),
                ("content-type", "application/json"),
                ("cookie", "theme=dark"),
            ],
            br#"{"name":"ada","admin":true}"#,
        );
        let mut params = UrlParams::new();
        params.insert("id".into(), Some("7".into()));

        let request = forge(&mut exchange, &params, &schema).await.unwrap();
        assert_eq!(request.headers()["x-page"], json!(3));
        assert_eq!(request.body(), Some(&json!({"name": "ada"})));
        assert_eq!(request.cookies()["theme"], "dark");
        assert_eq!(request.url_params()["id"], json!(7));
        assert_eq!(request.query_params()["verbose"], json!(true));
    }

    #[tokio::test]
    async fn test_headers_fail_before_body_is_read() {
        let mut schema = SchemaSet::new();
        schema.headers = Some(FieldSchema::new().present("x-api-key"));
        schema.body = Some(BodySchema::any());

        let mut exchange = exchange("/", &[("content-type", "application/json")], b"{}");
        let failure = forge(&mut exchange, &UrlParams::new(), &schema)
            .await
            .unwrap_err();
        assert_eq!(failure.error.status_code(), 400);
        assert!(failure.error.to_string().contains("x-api-key"));
        assert!(!exchange.body_taken());
        assert!(failure.request.body().is_none());
    }

    #[tokio::test]
    async fn test_malformed_cookie_only_fails_when_declared() {
        let mut exchange1 = exchange("/", &[("cookie", "broken")], b"");
        let request = forge(&mut exchange1, &UrlParams::new(), &SchemaSet::new())
            .await
            .unwrap();
        assert!(request.cookies().is_empty());

        let mut schema = SchemaSet::new();
        schema.cookies = Some(FieldSchema::new().present("session"));
        let mut exchange2 = exchange("/", &[("cookie", "broken")], b"");
        let failure = forge(&mut exchange2, &UrlParams::new(), &schema)
            .await
            .unwrap_err();
        assert_eq!(failure.error.status_code(), 400);
    }

    #[tokio::test]
    async fn test_body_is_not_read_without_schema() {
        let mut exchange = exchange("/", &[("content-type", "application/json")], b"{}");
        let request = forge(&mut exchange, &UrlParams::new(), &SchemaSet::new())
            .await
            .unwrap();
        assert!(request.body().is_none());
        assert!(!exchange.body_taken());
    }
}
