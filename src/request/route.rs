//! Route resolution.

use crate::error::RouteError;
use reqwest::Url;

/// Anything that resolves to an absolute URL.
///
/// Services usually implement this on an enum of their endpoints:
///
/// ```
/// use netnode::request::{Route, UrlRoute};
/// use netnode::error::RouteError;
/// use reqwest::Url;
///
/// enum Users {
///     List,
///     Item(String),
/// }
///
/// impl Route for Users {
///     fn url(&self) -> Result<Url, RouteError> {
///         let base = "https://api.example.com";
///         match self {
///             Users::List => UrlRoute::new(base, "users").url(),
///             Users::Item(id) => UrlRoute::new(base, format!("users/{id}")).url(),
///         }
///     }
/// }
///
/// assert_eq!(Users::Item("7".into()).url().unwrap().path(), "/users/7");
/// ```
pub trait Route: Send + Sync {
    fn url(&self) -> Result<Url, RouteError>;

    /// Short text for logs.
    fn describe(&self) -> String {
        match self.url() {
            Ok(url) => url.to_string(),
            Err(e) => e.to_string(),
        }
    }
}

impl Route for Url {
    fn url(&self) -> Result<Url, RouteError> {
        Ok(self.clone())
    }
}

impl Route for String {
    fn url(&self) -> Result<Url, RouteError> {
        Url::parse(self).map_err(|_| RouteError::CannotBuildUrl(self.clone()))
    }
}

impl Route for &'static str {
    fn url(&self) -> Result<Url, RouteError> {
        Url::parse(self).map_err(|_| RouteError::CannotBuildUrl((*self).to_string()))
    }
}

/// Base URL plus a relative path.
///
/// Exactly one `/` separates the two no matter how either side is written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlRoute {
    base: String,
    path: String,
}

impl UrlRoute {
    pub fn new(base: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            base: base.into(),
            path: path.into(),
        }
    }

    fn joined(&self) -> String {
        let base = self.base.trim_end_matches('/');
        let path = self.path.trim_start_matches('/');
        if path.is_empty() {
            base.to_string()
        } else {
            format!("{base}/{path}")
        }
    }
}

impl Route for UrlRoute {
    fn url(&self) -> Result<Url, RouteError> {
        let joined = self.joined();
        let url = Url::parse(&joined).map_err(|_| RouteError::CannotBuildUrl(joined.clone()))?;
        if url.cannot_be_a_base() {
            return Err(RouteError::CannotBuildUrl(joined));
        }
        Ok(url)
    }
}
