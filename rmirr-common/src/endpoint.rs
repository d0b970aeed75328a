//! `user@host:path` endpoints
//!
//! An endpoint names a filesystem location that rsync can reach, local or
//! remote. Parsing never fails: a missing `@` means no user and a missing
//! `:` means no path.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// A (user, host, path) triple
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct Endpoint {
    pub user: Option<String>,
    pub host: String,
    pub path: Option<String>,
}

impl Endpoint {
    pub fn new(user: Option<&str>, host: &str, path: Option<&str>) -> Self {
        Self {
            user: user.map(str::to_string),
            host: host.to_string(),
            path: path.map(str::to_string),
        }
    }

    /// Split an endpoint string on the first `@` and the first `:` after it
    pub fn parse(s: &str) -> Self {
        let (user, rest) = match s.split_once('@') {
            Some((user, rest)) => (Some(user.to_string()), rest),
            None => (None, s),
        };

        let (host, path) = match rest.split_once(':') {
            Some((host, path)) => (host.to_string(), Some(path.to_string())),
            None => (rest.to_string(), None),
        };

        Self { user, host, path }
    }

    /// Expand a leading `~` in the path using the current user's home directory
    ///
    /// Only meant for configuration load time. Match and run time compare the
    /// already-expanded strings.
    pub fn normalize(&self) -> Self {
        self.normalize_with_home(dirs::home_dir().as_deref())
    }

    /// Same as [`Endpoint::normalize`] with an explicit home directory
    pub fn normalize_with_home(&self, home: Option<&Path>) -> Self {
        Self {
            user: self.user.clone(),
            host: self.host.clone(),
            path: self.path.as_deref().map(|p| expand_home_in(p, home)),
        }
    }

    /// Copy of this endpoint with the user filled in when absent
    pub fn with_default_user(&self, user: &str) -> Self {
        let mut endpoint = self.clone();
        if endpoint.user.is_none() {
            endpoint.user = Some(user.to_string());
        }
        endpoint
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(user) = &self.user {
            write!(f, "{user}@")?;
        }
        f.write_str(&self.host)?;
        if let Some(path) = &self.path {
            write!(f, ":{path}")?;
        }
        Ok(())
    }
}

impl From<String> for Endpoint {
    fn from(s: String) -> Self {
        Self::parse(&s)
    }
}

impl From<&str> for Endpoint {
    fn from(s: &str) -> Self {
        Self::parse(s)
    }
}

impl From<Endpoint> for String {
    fn from(endpoint: Endpoint) -> Self {
        endpoint.to_string()
    }
}

/// Expand a leading `~` or `~/` to the current user's home directory
pub fn expand_home(path: &str) -> String {
    expand_home_in(path, dirs::home_dir().as_deref())
}

/// Expand a leading `~` or `~/` against `home`
///
/// `~user` forms and paths without a leading `~` are returned unchanged, as is
/// everything when no home directory is known.
pub fn expand_home_in(path: &str, home: Option<&Path>) -> String {
    let Some(home) = home else {
        return path.to_string();
    };
    let home = home.to_string_lossy();

    if path == "~" {
        home.into_owned()
    } else if let Some(rest) = path.strip_prefix("~/") {
        join_relative(&home, rest)
    } else {
        path.to_string()
    }
}

/// Lexically normalize a path: collapse repeated separators, drop `.`
/// components, fold `..` and strip any trailing separator
///
/// No filesystem access; symlinks are not resolved.
pub fn normalize_path(path: &str) -> String {
    let absolute = path.starts_with('/');
    let mut parts: Vec<&str> = Vec::new();

    for part in path.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                if parts.last().is_some_and(|last| *last != "..") {
                    parts.pop();
                } else if !absolute {
                    parts.push("..");
                }
            }
            other => parts.push(other),
        }
    }

    let joined = parts.join("/");
    if absolute {
        format!("/{joined}")
    } else if joined.is_empty() {
        ".".to_string()
    } else {
        joined
    }
}

/// Append a relative path to `base` with exactly one separator between them
pub fn join_relative(base: &str, relative: &str) -> String {
    let relative = relative.trim_start_matches('/');
    if relative.is_empty() {
        base.to_string()
    } else if base.ends_with('/') {
        format!("{base}{relative}")
    } else {
        format!("{base}/{relative}")
    }
}

/// True if `path` is `root` itself or lies below it at a separator boundary
pub fn is_within(path: &str, root: &str) -> bool {
    match path.strip_prefix(root) {
        Some("") => true,
        Some(rest) => root.ends_with('/') || rest.starts_with('/'),
        None => false,
    }
}
