//! Application routes.
//!
//! There are two logical routes: the shell (dashboard, search, folders) and a
//! single document. Share links land on the document route. Every other path
//! redirects to the shell.

use docshelf_model::DocumentId;
use std::fmt::{Display, Formatter, Result as FmtResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Shell,
    Document(DocumentId),
}

/// Outcome of resolving a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolved {
    pub route: Route,
    /// The path didn't name a route and was sent to the shell instead.
    pub redirected: bool,
}

impl Route {
    /// Resolve a path (optionally with query and fragment) to a route.
    ///
    /// ```
    /// use docshelf_library::Route;
    ///
    /// let id = "6c0f1c43-5d4e-4d1c-9c1e-2b3f1c6a9f10";
    /// assert_eq!(Route::resolve(&format!("/document/{id}")).route.path(), format!("/document/{id}"));
    /// assert_eq!(Route::resolve(&format!("/share/{id}?token=x")).route.path(), format!("/document/{id}"));
    /// assert!(Route::resolve("/settings").redirected);
    /// ```
    pub fn resolve(path: &str) -> Resolved {
        let path = path.split(['?', '#']).next().unwrap_or_default();
        let segments: Vec<&str> = path.split('/').filter(|segment| !segment.is_empty()).collect();
        let route = match segments.as_slice() {
            [] => Some(Route::Shell),
            ["document" | "share", id] => id.parse().ok().map(Route::Document),
            _ => None,
        };
        match route {
            Some(route) => Resolved { route, redirected: false },
            None => Resolved {
                route: Route::Shell,
                redirected: true,
            },
        }
    }

    /// Canonical path of the route.
    pub fn path(&self) -> String {
        match self {
            Route::Shell => "/".to_string(),
            Route::Document(id) => format!("/document/{id}"),
        }
    }
}

impl Display for Route {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(&self.path())
    }
}
