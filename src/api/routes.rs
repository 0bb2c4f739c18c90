use super::ApiHandler;
use crate::error::{AppError, Result};
use axum::http::Method;
use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Handlers registered for one path pattern, keyed by method
struct MethodTable {
    pattern: String,
    handlers: Vec<(Method, Arc<dyn ApiHandler>)>,
}

/// Outcome of looking up a method and path
pub enum RouteMatch<'a> {
    Found {
        handler: Arc<dyn ApiHandler>,
        params: HashMap<String, String>,
        route: &'a str,
    },
    MethodNotAllowed,
    NotFound,
}

/// Method + path table for the API surface.
///
/// Paths use the same `:param` syntax as the HTTP router and are matched
/// by `matchit`. Registration errors (conflicting patterns, a method
/// registered twice for one path) are collected and reported by
/// [`ApiRoutes::check`].
pub struct ApiRoutes {
    router: matchit::Router<usize>,
    tables: Vec<MethodTable>,
    registered: Vec<(Method, String)>,
    conflicts: Vec<String>,
}

impl ApiRoutes {
    pub fn new() -> Self {
        Self {
            router: matchit::Router::new(),
            tables: Vec::new(),
            registered: Vec::new(),
            conflicts: Vec::new(),
        }
    }

    pub fn route<H: ApiHandler>(mut self, method: Method, path: &str, handler: H) -> Self {
        self.add(method, path, Arc::new(handler));
        self
    }

    pub fn get<H: ApiHandler>(self, path: &str, handler: H) -> Self {
        self.route(Method::GET, path, handler)
    }

    pub fn post<H: ApiHandler>(self, path: &str, handler: H) -> Self {
        self.route(Method::POST, path, handler)
    }

    /// Register every route of `other` after the existing ones
    pub fn merge(mut self, other: ApiRoutes) -> Self {
        self.conflicts.extend(other.conflicts);
        for table in other.tables {
            for (method, handler) in table.handlers {
                self.add(method, &table.pattern, handler);
            }
        }
        self
    }

    fn add(&mut self, method: Method, path: &str, handler: Arc<dyn ApiHandler>) {
        let index = match self.tables.iter().position(|table| table.pattern == path) {
            Some(index) => index,
            None => {
                let index = self.tables.len();
                if let Err(e) = self.router.insert(path, index) {
                    self.conflicts.push(format!("{} {}: {}", method, path, e));
                    return;
                }
                self.tables.push(MethodTable {
                    pattern: path.to_string(),
                    handlers: Vec::new(),
                });
                index
            }
        };

        let table = &mut self.tables[index];
        if table.handlers.iter().any(|(registered, _)| *registered == method) {
            self.conflicts
                .push(format!("{} {}: registered more than once", method, path));
            return;
        }

        table.handlers.push((method.clone(), handler));
        self.registered.push((method, path.to_string()));
    }

    /// Fails if any registration was rejected
    pub fn check(&self) -> Result<()> {
        if self.conflicts.is_empty() {
            Ok(())
        } else {
            Err(AppError::component(
                "routes",
                format!("invalid API routes: {}", self.conflicts.join("; ")),
            ))
        }
    }

    pub fn resolve(&self, method: &Method, path: &str) -> RouteMatch<'_> {
        let path = normalize(path);
        let Ok(matched) = self.router.at(path.as_ref()) else {
            return RouteMatch::NotFound;
        };
        let Some(table) = self.tables.get(*matched.value) else {
            return RouteMatch::NotFound;
        };

        match table.handlers.iter().find(|(registered, _)| registered == method) {
            Some((_, handler)) => RouteMatch::Found {
                handler: Arc::clone(handler),
                params: matched
                    .params
                    .iter()
                    .map(|(name, value)| (name.to_string(), value.to_string()))
                    .collect(),
                route: &table.pattern,
            },
            None => RouteMatch::MethodNotAllowed,
        }
    }

    pub fn len(&self) -> usize {
        self.registered.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registered.is_empty()
    }
}

impl Default for ApiRoutes {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ApiRoutes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(
                self.registered
                    .iter()
                    .map(|(method, path)| format!("{} {}", method, path)),
            )
            .finish()
    }
}

/// Trailing slashes are ignored; the empty path is the root
fn normalize(path: &str) -> Cow<'_, str> {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        Cow::Borrowed("/")
    } else if trimmed.starts_with('/') {
        Cow::Borrowed(trimmed)
    } else {
        Cow::Owned(format!("/{}", trimmed))
    }
}
