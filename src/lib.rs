//! # rttp-message
//!
//! Immutable HTTP message values: URIs, header bags, body streams, requests,
//! server requests, responses and uploaded files.
//!
//! Every `with_*` operation leaves its receiver untouched and returns a new
//! value. Body streams are the one shared, mutable resource: cloning a message
//! shares its body until the body is replaced.
//!
//! ## Quick Start
//!
//! ```rust
//! use rttp_message::http::Cookie;
//! use rttp_message::{ByteStream, HttpRequest, Message, Request, Response, Uri};
//!
//! let uri = Uri::parse("HTTP://Example.com:80/x").unwrap();
//! assert_eq!(uri.to_string(), "http://example.com/x");
//!
//! let request = Request::new("GET", uri).unwrap();
//! assert_eq!(request.header_line("Host"), "example.com");
//!
//! let response = Response::new(200)
//!     .unwrap()
//!     .with_header("Content-Type", "text/plain")
//!     .unwrap()
//!     .with_cookie(&Cookie::new("visited", "yes"))
//!     .unwrap()
//!     .with_body(ByteStream::from_bytes("Hello, World!"));
//!
//! let wire = response.to_string();
//! assert!(wire.starts_with("HTTP/1.1 200 OK\r\n"));
//! assert!(wire.ends_with("Hello, World!"));
//! ```

pub mod error;
pub mod http;
pub mod stream;
pub mod upload;
pub mod uri;

// ── Convenience re-exports ────────────────────────────────────────────────────
pub use error::{Error, Result};
pub use http::{
    HeaderBag, HttpRequest, Message, Method, Request, Response, ServerRequest, StatusCode,
};
pub use stream::ByteStream;
pub use upload::{UploadErrorCode, UploadedFile};
pub use uri::Uri;
