//! In-memory transport with scripted routes and a request log.
//!
//! Routes match on method plus path (relative to the base URL). Unmatched
//! requests answer 404 with a Gitea-style error body.

use std::sync::{Mutex, PoisonError};

use serde_json::{json, Value};

use crate::transport::{Method, RawResponse, Request, Transport, TransportError};

type Handler = Box<dyn Fn(&Request) -> Result<RawResponse, TransportError> + Send + Sync>;

struct Route {
    method: Method,
    path: String,
    handler: Handler,
}

/// Scripted [`Transport`].
pub struct MemoryTransport {
    base_url: String,
    routes: Vec<Route>,
    log: Mutex<Vec<Request>>,
}

impl MemoryTransport {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_owned(),
            routes: Vec::new(),
            log: Mutex::new(Vec::new()),
        }
    }

    /// Answer `method path` with `handler`. Later routes shadow earlier ones.
    pub fn route<F>(mut self, method: Method, path: &str, handler: F) -> Self
    where
        F: Fn(&Request) -> Result<RawResponse, TransportError> + Send + Sync + 'static,
    {
        self.routes.push(Route {
            method,
            path: path.to_owned(),
            handler: Box::new(handler),
        });
        self
    }

    /// Answer `method path` with a fixed status and JSON body.
    pub fn json(self, method: Method, path: &str, status: u16, body: Value) -> Self {
        let body = body.to_string();
        self.route(method, path, move |_| {
            Ok(RawResponse {
                status,
                body: body.clone(),
            })
        })
    }

    /// Serve a paginated `GET path`: the `page` query parameter (1-based)
    /// selects an entry of `pages`; pages past the end are `[]`.
    pub fn json_pages(self, path: &str, pages: Vec<Value>) -> Self {
        self.route(Method::Get, path, move |request| {
            let page = request
                .query_value("page")
                .and_then(|p| p.parse::<usize>().ok())
                .unwrap_or(1);
            let body = page
                .checked_sub(1)
                .and_then(|i| pages.get(i))
                .cloned()
                .unwrap_or_else(|| json!([]));
            Ok(RawResponse {
                status: 200,
                body: body.to_string(),
            })
        })
    }

    /// Every request executed so far, in order.
    pub fn requests(&self) -> Vec<Request> {
        self.log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Executed requests other than `GET`.
    pub fn mutations(&self) -> Vec<Request> {
        self.requests()
            .into_iter()
            .filter(|r| r.method != Method::Get)
            .collect()
    }

    fn path_of<'a>(&self, url: &'a str) -> &'a str {
        url.strip_prefix(self.base_url.as_str()).unwrap_or(url)
    }
}

impl Transport for MemoryTransport {
    fn execute(&self, request: &Request) -> Result<RawResponse, TransportError> {
        self.log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request.clone());

        let path = self.path_of(&request.url);
        match self
            .routes
            .iter()
            .rev()
            .find(|r| r.method == request.method && r.path == path)
        {
            Some(route) => (route.handler)(request),
            None => Ok(RawResponse {
                status: 404,
                body: json!({ "message": "Not Found" }).to_string(),
            }),
        }
    }
}
