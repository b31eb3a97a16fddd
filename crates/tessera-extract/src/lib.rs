//! # Tessera Extract
//!
//! Turns the raw parts of an HTTP request into validated request data.
//!
//! ## Body parsing
//!
//! | Content type | Parser | Body |
//! |--------------|--------|------|
//! | `application/json` | [`JsonParser`] | JSON value, `__proto__` keys dropped |
//! | `application/x-www-form-urlencoded` | [`UrlEncodedParser`] | object of strings, repeats as arrays |
//! | `text/plain` | [`TextParser`] | string in the declared charset |
//! | `multipart/form-data` | [`MultipartParser`] | text fields plus uploaded files |
//!
//! Parsers live in a [`BodyParserRegistry`] that can be extended at runtime.
//! [`read_body`] negotiates the content type, parses and validates the body
//! against the route's schemas.
//!
//! ## Raw interceptors
//!
//! [`BodyInterceptor`], [`CookieInterceptor`] and [`QueryInterceptor`] run
//! the same parsing as raw interceptors, for routes that want to parse
//! lazily or with a different schema.
//!
//! ## Example
//!
//! ```rust
//! use tessera_extract::{parse_cookie_header, parse_query, resolve_content_type};
//!
//! let ct = resolve_content_type("application/x-www-form-urlencoded").unwrap();
//! assert_eq!(ct.charset(), Some("utf8"));
//!
//! let query = parse_query("page=2&tag=a&tag=b").unwrap();
//! assert!(query["tag"].is_array());
//!
//! let cookies = parse_cookie_header("session=abc; theme=dark").unwrap();
//! assert_eq!(cookies.len(), 2);
//! ```

#![doc(html_root_url = "https://docs.rs/tessera-extract/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod body;
mod content_type;
pub mod cookie;
mod multipart;
mod negotiate;
mod options;
mod query;
mod registry;

pub use body::{
    accumulate_body, decode_text, strip_proto_keys, BodyParser, FnBodyParser, JsonParser,
    ParseInput, ParsedBody, TextParser, UrlEncodedParser,
};
pub use content_type::{
    default_charset, resolve_content_type, ContentType, APPLICATION_FORM, APPLICATION_JSON,
    MULTIPART_FORM_DATA, TEXT_PLAIN,
};
pub use cookie::{cookies_from_headers, parse_cookie_header, CookieInterceptor, SetCookie};
pub use multipart::{discard_uploads, MultipartParser};
pub use negotiate::{read_body, BodyInterceptor, ValidatedBody};
pub use options::{
    MultipartLimits, ParserOptions, DEFAULT_MAX_BODY_SIZE, DEFAULT_MAX_FILES,
    DEFAULT_MAX_FILE_SIZE, DEFAULT_MAX_TOTAL_FILE_SIZE, DEFAULT_MIN_FILE_SIZE,
};
pub use query::{pairs_to_object, parse_query, QueryInterceptor};
pub use registry::BodyParserRegistry;
