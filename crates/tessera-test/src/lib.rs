//! # Tessera Test
//!
//! In-memory testing for Tessera handlers.
//!
//! - [`TestRequest`] builds the [`RawExchange`](tessera_core::RawExchange) a
//!   transport would hand over: headers, cookies, encoded query strings and
//!   JSON, form, text or multipart bodies, optionally split into chunks.
//! - [`TestClient`] runs requests through a
//!   [`Handler`](tessera_middleware::Handler).
//! - [`TestResponse`] exposes the status, headers, body and interception
//!   moment, with chainable assertions.
//!
//! ## Example
//!
//! ```ignore
//! use tessera_test::{MultipartForm, TestClient};
//!
//! #[tokio::test]
//! async fn upload_requires_a_title() {
//!     let client = TestClient::new(upload_handler());
//!
//!     client
//!         .post("/albums")
//!         .multipart(MultipartForm::new().file("photo", "a.png", "image/png", png()))
//!         .send()
//!         .await
//!         .assert_status(StatusCode::BAD_REQUEST)
//!         .assert_moment(InterceptionMoment::DataValidationFailed);
//! }
//! ```

#![doc(html_root_url = "https://docs.rs/tessera-test/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod client;
mod error;
mod request;
mod response;

pub use client::{TestClient, TestClientRequest};
pub use error::TestError;
pub use request::{MultipartForm, TestRequest, DEFAULT_BOUNDARY};
pub use response::TestResponse;
