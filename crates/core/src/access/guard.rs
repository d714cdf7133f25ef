//! Route-level access decisions
//!
//! The guard is a pure function of the current auth snapshot and the metadata
//! of the requested route. It performs no I/O.

use super::identity::Profile;
use super::permissions::Permission;
use crate::navigation::Redirect;
use serde::Serialize;

/// Point-in-time view of the auth state
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AuthSnapshot {
    pub is_loading: bool,
    pub profile: Option<Profile>,
}

impl AuthSnapshot {
    pub fn is_authenticated(&self) -> bool {
        self.profile.is_some()
    }
}

/// Access requirements declared by a route
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RouteMeta {
    pub path: &'static str,
    pub title: &'static str,
    pub super_admin_only: bool,
    pub permission: Option<Permission>,
}

impl RouteMeta {
    /// Route open to any authenticated admin
    pub const fn open(path: &'static str, title: &'static str) -> Self {
        Self {
            path,
            title,
            super_admin_only: false,
            permission: None,
        }
    }

    pub const fn requires(mut self, permission: Permission) -> Self {
        self.permission = Some(permission);
        self
    }

    pub const fn super_admin_only(mut self) -> Self {
        self.super_admin_only = true;
        self
    }
}

/// Outcome of evaluating the guard for one navigation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum GuardDecision {
    /// Auth state still resolving; show a placeholder
    Pending,
    Render,
    Redirect(Redirect),
}

impl GuardDecision {
    /// Decide whether `route` may be shown for `requested` (path plus query).
    ///
    /// Checks run in order and the first match wins.
    pub fn evaluate(snapshot: &AuthSnapshot, route: &RouteMeta, requested: &str) -> Self {
        if snapshot.is_loading {
            return Self::Pending;
        }

        let Some(profile) = &snapshot.profile else {
            return Self::Redirect(Redirect::login(Some(requested.to_string())));
        };

        if route.super_admin_only && !profile.role.is_super_admin() {
            return Self::Redirect(Redirect::landing());
        }

        if let Some(permission) = route.permission
            && !profile.has_permission(permission.as_str())
        {
            return Self::Redirect(Redirect::landing());
        }

        Self::Render
    }

    pub fn is_render(&self) -> bool {
        matches!(self, Self::Render)
    }
}
