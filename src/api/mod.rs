//! Transport-agnostic JSON request router.
//!
//! A [`Request`] names a method, a path, query parameters and an optional
//! JSON body; [`Router::handle`] turns it into a [`Response`] with an HTTP
//! status code and a JSON body. Errors always render as
//! `{"error": {"kind": ..., "message": ...}}`.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use thiserror::Error;
use tracing::debug;

use bugtrack_core::error::{BugError, ErrorKind};
use bugtrack_core::model::{BugState, Provider, TestCycle, state_from_status};
use bugtrack_core::query::{BugFilters, BugUpdate, NewBug};
use bugtrack_core::util::parse_bug_id;

use crate::config::Config;
use crate::providers::ProviderRegistry;
use crate::storage::SqliteStorage;

/// An incoming request.
#[derive(Debug, Clone, Default)]
pub struct Request {
    pub method: String,
    pub path: String,
    pub query: BTreeMap<String, String>,
    pub body: Option<Value>,
}

impl Request {
    /// Build a request from a method and a target that may carry a
    /// `?query` string.
    #[must_use]
    pub fn new(method: &str, target: &str) -> Self {
        let (path, query) = target.split_once('?').unwrap_or((target, ""));
        Self {
            method: method.trim().to_ascii_uppercase(),
            path: path.to_string(),
            query: url::form_urlencoded::parse(query.as_bytes())
                .into_owned()
                .collect(),
            body: None,
        }
    }

    #[must_use]
    pub fn with_query(mut self, key: &str, value: &str) -> Self {
        self.query.insert(key.to_string(), value.to_string());
        self
    }

    #[must_use]
    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    fn param(&self, name: &str) -> Option<&str> {
        self.query
            .get(name)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    fn required(&self, name: &str) -> Result<&str, ApiError> {
        self.param(name)
            .ok_or_else(|| ApiError::MissingParam(name.to_string()))
    }

    fn body_as<T: DeserializeOwned>(&self) -> Result<T, ApiError> {
        let body = self.body.clone().unwrap_or_else(|| json!({}));
        serde_json::from_value(body).map_err(|e| ApiError::BadBody(e.to_string()))
    }
}

/// An outgoing response.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    pub status: u16,
    pub body: Value,
}

impl Response {
    fn ok(body: Value) -> Self {
        Self { status: 200, body }
    }

    fn created(body: Value) -> Self {
        Self { status: 201, body }
    }

    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.status < 400
    }
}

/// Router-level failures.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("No route for {method} {path}")]
    NoRoute { method: String, path: String },

    #[error("Method {method} not allowed on {path}")]
    MethodNotAllowed { method: String, path: String },

    #[error("Missing query parameter '{0}'")]
    MissingParam(String),

    #[error("Invalid request body: {0}")]
    BadBody(String),

    #[error(transparent)]
    Bug(#[from] BugError),
}

impl ApiError {
    /// HTTP status for this error.
    #[must_use]
    pub fn status(&self) -> u16 {
        match self {
            Self::NoRoute { .. } => 404,
            Self::MethodNotAllowed { .. } => 405,
            Self::MissingParam(_) | Self::BadBody(_) => 400,
            Self::Bug(err) => status_for(err),
        }
    }

    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NoRoute { .. } => "not_found",
            Self::MethodNotAllowed { .. } => "method_not_allowed",
            Self::MissingParam(_) | Self::BadBody(_) => "bad_request",
            Self::Bug(err) => err.kind().as_str(),
        }
    }

    fn into_response(self) -> Response {
        Response {
            status: self.status(),
            body: json!({
                "error": {
                    "kind": self.kind(),
                    "message": self.to_string(),
                }
            }),
        }
    }
}

/// HTTP status for a domain error.
///
/// Provider service failures are server errors. Otherwise the innermost
/// cause decides; a create error with no deeper cause is a conflict.
#[must_use]
pub fn status_for(err: &BugError) -> u16 {
    match err.kind() {
        ErrorKind::Crawl | ErrorKind::Index | ErrorKind::Push => 500,
        _ => match err.root_kind() {
            ErrorKind::InvalidId
            | ErrorKind::InvalidProvider
            | ErrorKind::UnsupportedService
            | ErrorKind::Validation
            | ErrorKind::Json => 400,
            ErrorKind::NotFound => 404,
            ErrorKind::Create => 409,
            _ => 500,
        },
    }
}

/// Body of `POST /testing/cycles`.
#[derive(Debug, Deserialize)]
struct NewCycle {
    #[serde(default)]
    provider: Option<Provider>,
    project: String,
    cycle_id: String,
    #[serde(default)]
    name: Option<String>,
}

/// Dispatches requests against one open store.
pub struct Router<'a> {
    storage: &'a mut SqliteStorage,
    registry: &'a ProviderRegistry,
    config: &'a Config,
    actor: String,
}

type Handled = Result<Response, ApiError>;

impl<'a> Router<'a> {
    #[must_use]
    pub fn new(
        storage: &'a mut SqliteStorage,
        registry: &'a ProviderRegistry,
        config: &'a Config,
        actor: impl Into<String>,
    ) -> Self {
        Self {
            storage,
            registry,
            config,
            actor: actor.into(),
        }
    }

    /// Route `req` and render the outcome.
    pub fn handle(&mut self, req: &Request) -> Response {
        debug!(method = %req.method, path = %req.path, "Handling request");
        match self.route(req) {
            Ok(response) => response,
            Err(err) => {
                debug!(status = err.status(), error = %err, "Request failed");
                err.into_response()
            }
        }
    }

    fn route(&mut self, req: &Request) -> Handled {
        let segments: Vec<&str> = req
            .path
            .split('/')
            .filter(|segment| !segment.is_empty())
            .collect();
        let method = req.method.as_str();

        match segments.as_slice() {
            ["bugs"] => match method {
                "GET" => self.get_bug(req.required("id")?),
                "POST" => self.create_bug(req),
                _ => Err(not_allowed(req)),
            },
            ["bugs", "all"] => match method {
                "GET" => self.list_bugs(req),
                _ => Err(not_allowed(req)),
            },
            ["bugs", "urls"] => match method {
                "GET" => self.bugs_for_url(req),
                _ => Err(not_allowed(req)),
            },
            ["bugs", "state"] => match method {
                "GET" => Self::state(req),
                _ => Err(not_allowed(req)),
            },
            ["bugs", id] => match method {
                "GET" => self.get_bug(id),
                "PUT" => self.update_bug(id, req),
                "DELETE" => self.delete_bug(id),
                _ => Err(not_allowed(req)),
            },
            ["bugs", id, "index"] => match method {
                "POST" => self.index_bug(id),
                _ => Err(not_allowed(req)),
            },
            ["bugs", id, "push"] => match method {
                "POST" => self.push_bug(id),
                _ => Err(not_allowed(req)),
            },
            ["crawl", provider] => match method {
                "POST" => self.crawl(provider),
                _ => Err(not_allowed(req)),
            },
            ["testing", "cycles"] => match method {
                "GET" => self.list_cycles(req),
                "POST" => self.create_cycle(req),
                _ => Err(not_allowed(req)),
            },
            ["testing", "cycles", provider, project, cycle_id] => match method {
                "GET" => self.get_cycle(provider, project, cycle_id),
                _ => Err(not_allowed(req)),
            },
            _ => Err(ApiError::NoRoute {
                method: req.method.clone(),
                path: req.path.clone(),
            }),
        }
    }

    // ========================================================================
    // Bugs
    // ========================================================================

    fn get_bug(&self, id: &str) -> Handled {
        let bug = self.storage.get_bug_by_key(id)?;
        Ok(Response::ok(to_value(&bug)?))
    }

    fn create_bug(&mut self, req: &Request) -> Handled {
        let draft: NewBug = req.body_as()?;
        let bug = self
            .storage
            .create_bug(&draft.into_bug(self.config.default_provider()))?;
        Ok(Response::created(to_value(&bug)?))
    }

    fn update_bug(&mut self, id: &str, req: &Request) -> Handled {
        let id = parse_bug_id(id)?;
        let update: BugUpdate = req.body_as()?;
        let bug = self.storage.update_bug(id, &update)?;
        Ok(Response::ok(to_value(&bug)?))
    }

    fn delete_bug(&mut self, id: &str) -> Handled {
        let id = parse_bug_id(id)?;
        let removed = self.storage.delete_bug(id)?;
        Ok(Response::ok(json!({ "id": id, "deleted_mappings": removed })))
    }

    fn list_bugs(&self, req: &Request) -> Handled {
        let filters = BugFilters {
            provider: req.param("provider").map(str::parse).transpose()?,
            project: req.param("project").map(str::to_string),
            state: req.param("state").map(str::parse::<BugState>).transpose()?,
            limit: req
                .param("limit")
                .map(|raw| {
                    raw.parse::<usize>().map_err(|_| {
                        BugError::validation("limit", format!("'{raw}' is not a number"))
                    })
                })
                .transpose()?,
        };
        let bugs = self.storage.list_bugs(&filters)?;
        Ok(Response::ok(json!({ "count": bugs.len(), "bugs": bugs })))
    }

    fn bugs_for_url(&self, req: &Request) -> Handled {
        let url = req.required("url")?;
        let bugs = self.storage.bugs_for_url(url)?;
        Ok(Response::ok(json!({ "url": url, "count": bugs.len(), "bugs": bugs })))
    }

    fn state(req: &Request) -> Handled {
        let status = req.param("status").unwrap_or_default();
        let provider = req.required("provider")?;
        let state = state_from_status(status, provider)?;
        Ok(Response::ok(json!({
            "status": status,
            "provider": provider,
            "state": state,
        })))
    }

    // ========================================================================
    // Provider services
    // ========================================================================

    fn index_bug(&mut self, id: &str) -> Handled {
        let id = parse_bug_id(id)?;
        let mapping = self.registry.index(self.storage, id)?;
        Ok(Response::ok(json!({ "bug": id, "mapping": mapping })))
    }

    fn push_bug(&mut self, id: &str) -> Handled {
        let id = parse_bug_id(id)?;
        let bug = self.registry.push(self.storage, id, &self.actor)?;
        Ok(Response::ok(to_value(&bug)?))
    }

    fn crawl(&mut self, provider: &str) -> Handled {
        let provider: Provider = provider.parse()?;
        let report = self.registry.crawl(self.storage, provider)?;
        Ok(Response::ok(to_value(&report)?))
    }

    // ========================================================================
    // Test cycles
    // ========================================================================

    fn list_cycles(&self, req: &Request) -> Handled {
        let provider: Option<Provider> = req.param("provider").map(str::parse).transpose()?;
        let cycles = self
            .storage
            .list_test_cycles(provider, req.param("project"))?;
        Ok(Response::ok(json!({ "count": cycles.len(), "cycles": cycles })))
    }

    fn create_cycle(&mut self, req: &Request) -> Handled {
        let body: NewCycle = req.body_as()?;
        let cycle = TestCycle {
            id: 0,
            provider: body
                .provider
                .unwrap_or_else(|| self.config.default_provider()),
            project: body.project,
            cycle_id: body.cycle_id,
            name: body.name,
            created_at: chrono::Utc::now(),
        };
        let stored = self.storage.create_test_cycle(&cycle)?;
        Ok(Response::created(to_value(&stored)?))
    }

    fn get_cycle(&self, provider: &str, project: &str, cycle_id: &str) -> Handled {
        let provider: Provider = provider.parse()?;
        let cycle = self.storage.get_test_cycle(provider, project, cycle_id)?;
        Ok(Response::ok(to_value(&cycle)?))
    }
}

fn not_allowed(req: &Request) -> ApiError {
    ApiError::MethodNotAllowed {
        method: req.method.clone(),
        path: req.path.clone(),
    }
}

fn to_value<T: serde::Serialize>(value: &T) -> Result<Value, ApiError> {
    serde_json::to_value(value).map_err(|e| ApiError::Bug(BugError::Json(e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Workspace;
    use tempfile::TempDir;

    struct Fixture {
        _dir: TempDir,
        storage: SqliteStorage,
        registry: ProviderRegistry,
        config: Config,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = TempDir::new().unwrap();
            let workspace = Workspace::detached(dir.path());
            Self {
                registry: ProviderRegistry::from_workspace(&workspace),
                config: workspace.config,
                storage: SqliteStorage::open_memory().unwrap(),
                _dir: dir,
            }
        }

        fn call(&mut self, req: &Request) -> Response {
            Router::new(&mut self.storage, &self.registry, &self.config, "tester").handle(req)
        }

        fn create(&mut self, body: Value) -> i64 {
            let res = self.call(&Request::new("POST", "/bugs").with_body(body));
            assert_eq!(res.status, 201, "{}", res.body);
            res.body["id"].as_i64().unwrap()
        }
    }

    fn error_kind(res: &Response) -> &str {
        res.body["error"]["kind"].as_str().unwrap()
    }

    #[test]
    fn test_request_parses_query() {
        let req = Request::new("get", "/bugs/urls?url=https%3A%2F%2Fa.example.com%2Fx&x=1");
        assert_eq!(req.method, "GET");
        assert_eq!(req.path, "/bugs/urls");
        assert_eq!(
            req.query.get("url").map(String::as_str),
            Some("https://a.example.com/x")
        );
    }

    #[test]
    fn test_bug_crud_round_trip() {
        let mut fx = Fixture::new();
        let id = fx.create(json!({"title": "Compass drifts", "status": "open", "project": "maps"}));

        let res = fx.call(&Request::new("GET", &format!("/bugs?id={id}")));
        assert_eq!(res.status, 200);
        assert_eq!(res.body["title"], "Compass drifts");
        assert_eq!(res.body["state"], "active");
        assert_eq!(res.body["provider"], "datastore");

        let res = fx.call(
            &Request::new("PUT", &format!("/bugs/{id}")).with_body(json!({"status": "closed"})),
        );
        assert_eq!(res.status, 200);
        assert_eq!(res.body["state"], "closed");

        let res = fx.call(&Request::new("DELETE", &format!("/bugs/{id}")));
        assert_eq!(res.status, 200);
        assert_eq!(res.body["deleted_mappings"], 0);

        let res = fx.call(&Request::new("GET", &format!("/bugs/{id}")));
        assert_eq!(res.status, 404);
        assert_eq!(error_kind(&res), "not_found");
    }

    #[test]
    fn test_empty_update_returns_bug_unchanged() {
        let mut fx = Fixture::new();
        let id = fx.create(json!({"title": "Compass drifts"}));
        let before = fx.call(&Request::new("GET", &format!("/bugs/{id}")));
        let after =
            fx.call(&Request::new("PUT", &format!("/bugs/{id}")).with_body(json!({})));
        assert_eq!(after.status, 200);
        assert_eq!(after.body, before.body);
    }

    #[test]
    fn test_error_statuses() {
        let mut fx = Fixture::new();

        let res = fx.call(&Request::new("GET", "/bugs/abc"));
        assert_eq!(res.status, 400);
        assert_eq!(error_kind(&res), "invalid_id");

        let res = fx.call(&Request::new("POST", "/bugs").with_body(json!({"title": ""})));
        assert_eq!(res.status, 400);
        assert_eq!(error_kind(&res), "create");

        let res = fx.call(&Request::new("POST", "/bugs").with_body(json!({"title": 5})));
        assert_eq!(res.status, 400);
        assert_eq!(error_kind(&res), "bad_request");

        let res = fx.call(&Request::new("GET", "/bugs"));
        assert_eq!(res.status, 400);

        let res = fx.call(&Request::new("PATCH", "/bugs/1"));
        assert_eq!(res.status, 405);

        let res = fx.call(&Request::new("GET", "/nowhere"));
        assert_eq!(res.status, 404);

        let res = fx.call(&Request::new("POST", "/crawl/bugzilla"));
        assert_eq!(res.status, 400);
        assert_eq!(error_kind(&res), "invalid_provider");
    }

    #[test]
    fn test_state_route() {
        let mut fx = Fixture::new();
        let res = fx.call(&Request::new("GET", "/bugs/state?status=fixed&provider=issuetracker"));
        assert_eq!(res.status, 200);
        assert_eq!(res.body["state"], "resolved");

        let res = fx.call(&Request::new("GET", "/bugs/state?status=fixed&provider=jira"));
        assert_eq!(res.status, 400);
    }

    #[test]
    fn test_index_lookup_and_delete_cascade() {
        let mut fx = Fixture::new();
        let id = fx.create(json!({"title": "Bad geocode", "url": "https://maps.example.com/geo?q=1"}));

        let res = fx.call(&Request::new("POST", &format!("/bugs/{id}/index")));
        assert_eq!(res.status, 200);
        assert!(res.body["mapping"].is_i64());

        let res = fx.call(
            &Request::new("GET", "/bugs/urls").with_query("url", "maps.example.com/geo"),
        );
        assert_eq!(res.body["count"], 1);

        let res = fx.call(&Request::new("DELETE", &format!("/bugs/{id}")));
        assert_eq!(res.body["deleted_mappings"], 1);
    }

    #[test]
    fn test_push_stamps_actor() {
        let mut fx = Fixture::new();
        let id = fx.create(json!({"title": "Bad geocode"}));
        let res = fx.call(&Request::new("POST", &format!("/bugs/{id}/push")));
        assert_eq!(res.status, 200);
        assert_eq!(res.body["last_updater"], "tester");
        assert_eq!(res.body["metadata"]["pushed_by"], "tester");
    }

    #[test]
    fn test_list_filters() {
        let mut fx = Fixture::new();
        fx.create(json!({"title": "a", "status": "open"}));
        fx.create(json!({"title": "b", "status": "closed"}));
        fx.create(json!({"title": "c", "provider": "issuetracker", "status": "fixed"}));

        let res = fx.call(&Request::new("GET", "/bugs/all"));
        assert_eq!(res.body["count"], 3);

        let res = fx.call(&Request::new("GET", "/bugs/all?state=closed"));
        assert_eq!(res.body["count"], 1);
        assert_eq!(res.body["bugs"][0]["title"], "b");

        let res = fx.call(&Request::new("GET", "/bugs/all?provider=issuetracker&limit=5"));
        assert_eq!(res.body["count"], 1);

        let res = fx.call(&Request::new("GET", "/bugs/all?limit=many"));
        assert_eq!(res.status, 400);
    }

    #[test]
    fn test_cycles() {
        let mut fx = Fixture::new();
        let body = json!({"provider": "issuetracker", "project": "maps", "cycle_id": "r42"});

        let res = fx.call(&Request::new("POST", "/testing/cycles").with_body(body.clone()));
        assert_eq!(res.status, 201);

        let res = fx.call(&Request::new("POST", "/testing/cycles").with_body(body));
        assert_eq!(res.status, 409);
        assert_eq!(error_kind(&res), "create");

        let res = fx.call(&Request::new("GET", "/testing/cycles/issuetracker/maps/r42"));
        assert_eq!(res.status, 200);
        assert_eq!(res.body["cycle_id"], "r42");

        let res = fx.call(&Request::new("GET", "/testing/cycles/issuetracker/maps/r43"));
        assert_eq!(res.status, 404);

        let res = fx.call(&Request::new("GET", "/testing/cycles?project=maps"));
        assert_eq!(res.body["count"], 1);

        let res = fx.call(
            &Request::new("POST", "/testing/cycles")
                .with_body(json!({"project": "", "cycle_id": "x"})),
        );
        assert_eq!(res.status, 400);
    }

    #[test]
    fn test_crawl_datastore() {
        let mut fx = Fixture::new();
        let res = fx.call(&Request::new("POST", "/crawl/datastore"));
        assert_eq!(res.status, 200);
        assert_eq!(res.body["fetched"], 0);
        assert_eq!(res.body["provider"], "datastore");
    }
}
