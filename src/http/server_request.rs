//! Server-side view of an incoming request.
//!
//! [`ServerRequest`] wraps a [`Request`] and adds what the receiving side
//! derives from the environment and the raw message: server parameters,
//! cookies, query parameters, a parsed body, uploaded files and free-form
//! attributes attached by application code.

use std::any::Any;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{Error, Result};
use crate::http::headers::HeaderBag;
use crate::http::message::{DEFAULT_PROTOCOL_VERSION, HttpMessage, Message};
use crate::http::request::{HttpRequest, Request};
use crate::stream::ByteStream;
use crate::upload::UploadedFile;
use crate::uri::Uri;

/// Environment-derived parameters such as `REMOTE_ADDR` or `HTTPS`.
pub type ServerParams = HashMap<String, String>;

type Attribute = Arc<dyn Any + Send + Sync>;

/// A deserialized request body.
#[derive(Clone)]
pub enum ParsedBody {
    /// A map or a list, e.g. decoded form fields or a JSON document.
    Structured(Value),
    /// An application-defined record.
    Record(Arc<dyn Any + Send + Sync>),
}

impl ParsedBody {
    /// Returns the structured value, if this is not a record.
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Self::Structured(value) => Some(value),
            Self::Record(_) => None,
        }
    }

    /// Returns the record if it is of type `T`.
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        match self {
            Self::Structured(_) => None,
            Self::Record(record) => record.downcast_ref::<T>(),
        }
    }
}

impl fmt::Debug for ParsedBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Structured(value) => f.debug_tuple("Structured").field(value).finish(),
            Self::Record(_) => f.write_str("Record(..)"),
        }
    }
}

impl PartialEq for ParsedBody {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Structured(a), Self::Structured(b)) => a == b,
            (Self::Record(a), Self::Record(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

/// A node in the uploaded-files tree.
///
/// Forms can nest file inputs (`files[]`, `doc[scan][front]`), so uploads are
/// kept as a tree whose leaves are always [`UploadedFile`]s.
#[derive(Debug, Clone, PartialEq)]
pub enum UploadedFiles {
    File(UploadedFile),
    List(Vec<UploadedFiles>),
    Map(BTreeMap<String, UploadedFiles>),
}

impl UploadedFiles {
    /// Returns the file if this node is a leaf.
    pub fn as_file(&self) -> Option<&UploadedFile> {
        match self {
            Self::File(file) => Some(file),
            _ => None,
        }
    }

    /// Returns a child of a map node.
    pub fn get(&self, key: &str) -> Option<&UploadedFiles> {
        match self {
            Self::Map(children) => children.get(key),
            _ => None,
        }
    }

    /// Returns every leaf below this node, depth first.
    pub fn files(&self) -> Vec<&UploadedFile> {
        let mut out = Vec::new();
        self.collect_files(&mut out);
        out
    }

    fn collect_files<'a>(&'a self, out: &mut Vec<&'a UploadedFile>) {
        match self {
            Self::File(file) => out.push(file),
            Self::List(children) => children.iter().for_each(|c| c.collect_files(out)),
            Self::Map(children) => children.values().for_each(|c| c.collect_files(out)),
        }
    }
}

impl From<UploadedFile> for UploadedFiles {
    fn from(file: UploadedFile) -> Self {
        Self::File(file)
    }
}

/// A request as seen by the server that received it.
///
/// # Examples
///
/// ```
/// use std::collections::HashMap;
///
/// use rttp_message::{HttpRequest, ServerRequest, Uri};
///
/// let uri = Uri::parse("http://example.com/users?page=2").unwrap();
/// let params = HashMap::from([("REMOTE_ADDR".to_owned(), "10.0.0.1".to_owned())]);
/// let request = ServerRequest::new("GET", uri, params).unwrap();
///
/// let request = request.with_attribute("user_id", 42_u64);
/// assert_eq!(request.attribute::<u64>("user_id"), Some(&42));
/// assert_eq!(request.server_param("REMOTE_ADDR"), Some("10.0.0.1"));
/// assert_eq!(request.uri().query(), "page=2");
/// ```
#[derive(Clone, Default)]
pub struct ServerRequest {
    request: Request,
    server_params: ServerParams,
    cookie_params: HashMap<String, String>,
    query_params: HashMap<String, String>,
    uploaded_files: BTreeMap<String, UploadedFiles>,
    parsed_body: Option<ParsedBody>,
    attributes: HashMap<String, Attribute>,
}

impl ServerRequest {
    /// # Errors
    ///
    /// [`Error::InvalidArgument`] if `method` is not in the allow-list.
    pub fn new(method: &str, uri: Uri, server_params: ServerParams) -> Result<Self> {
        Self::from_parts(
            method,
            uri,
            HeaderBag::new(),
            None,
            DEFAULT_PROTOCOL_VERSION,
            server_params,
        )
    }

    /// # Errors
    ///
    /// Same as [`Request::from_parts`].
    pub fn from_parts(
        method: &str,
        uri: Uri,
        headers: HeaderBag,
        body: Option<ByteStream>,
        protocol_version: &str,
        server_params: ServerParams,
    ) -> Result<Self> {
        let request = Request::from_parts(method, uri, headers, body, protocol_version)?;
        Ok(Self::from_request(request, server_params))
    }

    pub fn from_request(request: Request, server_params: ServerParams) -> Self {
        Self {
            request,
            server_params,
            ..Self::default()
        }
    }

    /// Server parameters are fixed at construction.
    pub fn server_params(&self) -> &ServerParams {
        &self.server_params
    }

    pub fn server_param(&self, name: &str) -> Option<&str> {
        self.server_params.get(name).map(String::as_str)
    }

    pub fn cookie_params(&self) -> &HashMap<String, String> {
        &self.cookie_params
    }

    #[must_use]
    pub fn with_cookie_params(&self, cookies: HashMap<String, String>) -> Self {
        Self {
            cookie_params: cookies,
            ..self.clone()
        }
    }

    pub fn query_params(&self) -> &HashMap<String, String> {
        &self.query_params
    }

    /// Replaces the query parameters. The URI is not touched.
    #[must_use]
    pub fn with_query_params(&self, query: HashMap<String, String>) -> Self {
        Self {
            query_params: query,
            ..self.clone()
        }
    }

    pub fn uploaded_files(&self) -> &BTreeMap<String, UploadedFiles> {
        &self.uploaded_files
    }

    #[must_use]
    pub fn with_uploaded_files(&self, files: BTreeMap<String, UploadedFiles>) -> Self {
        Self {
            uploaded_files: files,
            ..self.clone()
        }
    }

    pub fn parsed_body(&self) -> Option<&ParsedBody> {
        self.parsed_body.as_ref()
    }

    /// Replaces the parsed body with a map or a list. `null` clears it.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidArgument`] for a scalar value.
    pub fn with_parsed_body(&self, body: Value) -> Result<Self> {
        let parsed_body = match body {
            Value::Null => None,
            value @ (Value::Object(_) | Value::Array(_)) => Some(ParsedBody::Structured(value)),
            scalar => {
                return Err(Error::invalid(format!(
                    "parsed body must be a map, a list or null, got {scalar}"
                )));
            }
        };

        Ok(Self {
            parsed_body,
            ..self.clone()
        })
    }

    /// Replaces the parsed body with an application-defined record.
    #[must_use]
    pub fn with_parsed_record<T: Any + Send + Sync>(&self, record: T) -> Self {
        Self {
            parsed_body: Some(ParsedBody::Record(Arc::new(record))),
            ..self.clone()
        }
    }

    #[must_use]
    pub fn without_parsed_body(&self) -> Self {
        if self.parsed_body.is_none() {
            return self.clone();
        }
        Self {
            parsed_body: None,
            ..self.clone()
        }
    }

    /// Deserializes a structured parsed body into `T`.
    ///
    /// Returns `None` when there is no structured body.
    pub fn parsed_body_as<T: DeserializeOwned>(&self) -> Option<serde_json::Result<T>> {
        let value = self.parsed_body.as_ref()?.as_value()?;
        Some(T::deserialize(value))
    }

    /// Returns the names of all attributes, in no particular order.
    pub fn attribute_names(&self) -> impl Iterator<Item = &str> {
        self.attributes.keys().map(String::as_str)
    }

    /// Returns an attribute if it exists and is of type `T`.
    pub fn attribute<T: Any>(&self, name: &str) -> Option<&T> {
        self.attributes
            .get(name)
            .and_then(|value| value.downcast_ref::<T>())
    }

    /// Returns an attribute of type `T`, or `default`.
    pub fn attribute_or<T: Any + Clone>(&self, name: &str, default: T) -> T {
        self.attribute::<T>(name).cloned().unwrap_or(default)
    }

    #[must_use]
    pub fn with_attribute<T: Any + Send + Sync>(&self, name: &str, value: T) -> Self {
        let mut next = self.clone();
        next.attributes.insert(name.to_owned(), Arc::new(value));
        next
    }

    #[must_use]
    pub fn without_attribute(&self, name: &str) -> Self {
        if !self.attributes.contains_key(name) {
            return self.clone();
        }
        let mut next = self.clone();
        next.attributes.remove(name);
        next
    }
}

impl Message for ServerRequest {
    fn message(&self) -> &HttpMessage {
        self.request.message()
    }

    fn with_message(&self, message: HttpMessage) -> Self {
        Self {
            request: self.request.with_message(message),
            ..self.clone()
        }
    }
}

impl HttpRequest for ServerRequest {
    fn request(&self) -> &Request {
        &self.request
    }

    fn with_request(&self, request: Request) -> Self {
        Self {
            request,
            ..self.clone()
        }
    }
}

impl PartialEq for ServerRequest {
    fn eq(&self, other: &Self) -> bool {
        self.request == other.request
            && self.server_params == other.server_params
            && self.cookie_params == other.cookie_params
            && self.query_params == other.query_params
            && self.uploaded_files == other.uploaded_files
            && self.parsed_body == other.parsed_body
            && self.attributes.len() == other.attributes.len()
            && self.attributes.iter().all(|(name, value)| {
                other
                    .attributes
                    .get(name)
                    .is_some_and(|theirs| Arc::ptr_eq(value, theirs))
            })
    }
}

impl fmt::Debug for ServerRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut attributes: Vec<&str> = self.attribute_names().collect();
        attributes.sort_unstable();

        f.debug_struct("ServerRequest")
            .field("request", &self.request)
            .field("server_params", &self.server_params)
            .field("cookie_params", &self.cookie_params)
            .field("query_params", &self.query_params)
            .field("uploaded_files", &self.uploaded_files)
            .field("parsed_body", &self.parsed_body)
            .field("attributes", &attributes)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;
    use serde_json::json;

    use super::*;
    use crate::http::Method;

    fn request() -> ServerRequest {
        let uri = Uri::parse("http://example.com/form").unwrap();
        ServerRequest::new("POST", uri, ServerParams::new()).unwrap()
    }

    fn upload(data: &str) -> UploadedFile {
        UploadedFile::new(Some(ByteStream::from_bytes(data)), None, 0, None, None).unwrap()
    }

    #[test]
    fn scalar_parsed_body_is_rejected() {
        let req = request();
        for scalar in [json!(42), json!("text"), json!(true), json!(1.5)] {
            assert!(matches!(req.with_parsed_body(scalar), Err(Error::InvalidArgument(_))));
        }
    }

    #[test]
    fn structured_parsed_body() {
        let req = request().with_parsed_body(json!({"name": "ada"})).unwrap();
        assert_eq!(
            req.parsed_body().and_then(ParsedBody::as_value),
            Some(&json!({"name": "ada"}))
        );

        let list = req.with_parsed_body(json!([1, 2])).unwrap();
        assert_eq!(list.parsed_body(), Some(&ParsedBody::Structured(json!([1, 2]))));

        let cleared = req.with_parsed_body(Value::Null).unwrap();
        assert!(cleared.parsed_body().is_none());
        assert!(req.parsed_body().is_some());
    }

    #[test]
    fn typed_parsed_body() {
        #[derive(Deserialize, Debug, PartialEq)]
        struct Login {
            user: String,
        }

        let req = request().with_parsed_body(json!({"user": "ada"})).unwrap();
        let login: Login = req.parsed_body_as().unwrap().unwrap();
        assert_eq!(login.user, "ada");
        assert!(request().parsed_body_as::<Login>().is_none());
    }

    #[test]
    fn record_parsed_body() {
        struct Form {
            fields: usize,
        }

        let req = request().with_parsed_record(Form { fields: 3 });
        let form = req.parsed_body().and_then(|b| b.downcast_ref::<Form>());
        assert_eq!(form.map(|f| f.fields), Some(3));
        assert!(req.parsed_body().and_then(ParsedBody::as_value).is_none());
        assert!(req.without_parsed_body().parsed_body().is_none());
    }

    #[test]
    fn attributes() {
        let req = request();
        let with = req.with_attribute("user", String::from("ada"));

        assert_eq!(with.attribute::<String>("user").map(String::as_str), Some("ada"));
        assert_eq!(with.attribute::<u32>("user"), None);
        assert_eq!(req.attribute::<String>("user"), None);
        assert_eq!(req.attribute_or("missing", 7_u32), 7);

        let without = with.without_attribute("user");
        assert!(without.attribute::<String>("user").is_none());
        assert_eq!(without.attribute_names().count(), 0);
        assert_eq!(req.without_attribute("absent"), req);
    }

    #[test]
    fn params_are_replaced_not_merged() {
        let req = request()
            .with_query_params(HashMap::from([("a".into(), "1".into())]))
            .with_cookie_params(HashMap::from([("sid".into(), "x".into())]));
        let next = req.with_query_params(HashMap::from([("b".into(), "2".into())]));

        assert_eq!(next.query_params().get("a"), None);
        assert_eq!(next.query_params().get("b").map(String::as_str), Some("2"));
        assert_eq!(next.cookie_params().get("sid").map(String::as_str), Some("x"));
        assert_eq!(req.query_params().get("a").map(String::as_str), Some("1"));
        assert_eq!(req.uri().query(), "");
    }

    #[test]
    fn uploaded_files_tree() {
        let avatar = upload("png");
        let first = upload("one");
        let second = upload("two");
        let files = BTreeMap::from([
            ("avatar".to_owned(), UploadedFiles::from(avatar.clone())),
            (
                "docs".to_owned(),
                UploadedFiles::List(vec![first.clone().into(), second.clone().into()]),
            ),
        ]);

        let req = request().with_uploaded_files(files);
        let tree = req.uploaded_files();
        assert_eq!(tree["avatar"].as_file(), Some(&avatar));
        assert_eq!(tree["docs"].files(), [&first, &second]);
        assert!(request().uploaded_files().is_empty());
    }

    #[test]
    fn request_behavior_is_delegated() {
        let req = request();
        let next = req
            .with_attribute("k", 1_i32)
            .with_method("PUT")
            .unwrap()
            .with_header("X-Trace", "abc")
            .unwrap();

        assert_eq!(next.method(), Method::Put);
        assert_eq!(next.header_line("Host"), "example.com");
        assert_eq!(next.header_line("x-trace"), "abc");
        assert_eq!(next.attribute::<i32>("k"), Some(&1));
        assert_eq!(req.method(), Method::Post);
    }
}
