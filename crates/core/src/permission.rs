//! Permission keys.
//!
//! A permission grants one HTTP verb on one route template. Both sides of the
//! authorization check (the stored grants and the incoming request) are
//! normalised into the same `path:VERB` key before comparison.

use std::collections::HashSet;

/// Build the canonical `path:VERB` key: lowercased path, uppercased verb.
pub fn permission_key(path: &str, method: &str) -> String {
    format!(
        "{}:{}",
        path.trim().to_lowercase(),
        method.trim().to_uppercase()
    )
}

/// The union of permission keys granted to a user across all their roles.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PermissionSet {
    keys: HashSet<String>,
}

impl PermissionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn grant(&mut self, path: &str, method: &str) {
        self.keys.insert(permission_key(path, method));
    }

    pub fn allows(&self, path: &str, method: &str) -> bool {
        self.keys.contains(&permission_key(path, method))
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

impl<'a> FromIterator<(&'a str, &'a str)> for PermissionSet {
    fn from_iter<I: IntoIterator<Item = (&'a str, &'a str)>>(iter: I) -> Self {
        let mut set = Self::new();
        for (path, method) in iter {
            set.grant(path, method);
        }
        set
    }
}

/// A permission-protected route, as registered by the HTTP layer and synced
/// into the permissions table at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionPoint {
    /// Unique name, `"<path>#<METHOD>"`.
    pub name: String,
    /// Lowercased route template, e.g. `/api/v1/users/{id}`.
    pub path: String,
    pub method: String,
    pub description: String,
}

impl PermissionPoint {
    pub fn new(path: &str, method: &str, description: &str) -> Self {
        let path = path.trim().to_lowercase();
        let method = method.trim().to_uppercase();
        Self {
            name: format!("{path}#{method}"),
            path,
            method,
            description: description.to_string(),
        }
    }

    pub fn key(&self) -> String {
        permission_key(&self.path, &self.method)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
