use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::{self, Display};
use std::str::FromStr;

use super::permissions::Permission;

/// Role assigned to an admin account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    SuperAdmin,
    BlogManager,
    StoryModerator,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SuperAdmin => "super_admin",
            Self::BlogManager => "blog_manager",
            Self::StoryModerator => "story_moderator",
        }
    }

    pub fn is_super_admin(&self) -> bool {
        matches!(self, Self::SuperAdmin)
    }
}

impl Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "super_admin" => Ok(Self::SuperAdmin),
            "blog_manager" => Ok(Self::BlogManager),
            "story_moderator" => Ok(Self::StoryModerator),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

/// Named boolean capabilities held by a profile
///
/// Keys are the wire names (`canManageBlogs`, ...). Names this crate does not
/// know about are preserved so a newer server can add capabilities.
pub type PermissionMap = BTreeMap<String, bool>;

/// Admin profile as returned by the API
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    #[serde(alias = "_id")]
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: Role,
    #[serde(default)]
    pub permissions: PermissionMap,
    #[serde(default = "default_active")]
    pub is_active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_login: Option<DateTime<Utc>>,
}

fn default_active() -> bool {
    true
}

impl Profile {
    /// Whether this profile grants `permission`.
    ///
    /// Super admins hold every permission. `canManageAdmins` is never granted
    /// through the permission map alone.
    pub fn has_permission(&self, permission: &str) -> bool {
        if self.role.is_super_admin() {
            return true;
        }
        if permission == Permission::ManageAdmins.as_str() {
            return false;
        }
        self.permissions.get(permission).copied().unwrap_or(false)
    }

    /// Permissions currently granted, in wire-name order
    pub fn granted(&self) -> Vec<&str> {
        if self.role.is_super_admin() {
            return Permission::ALL.iter().map(Permission::as_str).collect();
        }
        self.permissions
            .iter()
            .filter(|(name, granted)| **granted && name.as_str() != Permission::ManageAdmins.as_str())
            .map(|(name, _)| name.as_str())
            .collect()
    }

    /// Merge the mutable fields of `update` into this profile.
    ///
    /// Identity fields (`id`, `role`) are kept from `self`.
    pub fn merge(&mut self, update: &Profile) {
        self.name.clone_from(&update.name);
        self.email.clone_from(&update.email);
        self.permissions.clone_from(&update.permissions);
        self.is_active = update.is_active;
        if update.last_login.is_some() {
            self.last_login = update.last_login;
        }
    }
}

impl Display for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} <{}> ({})", self.name, self.email, self.role)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn moderator() -> Profile {
        let mut permissions = PermissionMap::new();
        permissions.insert("canManageStories".to_string(), true);
        permissions.insert("canManageBlogs".to_string(), false);
        permissions.insert("canManageAdmins".to_string(), true);
        Profile {
            id: "a1".to_string(),
            name: "Mod".to_string(),
            email: "mod@example.com".to_string(),
            role: Role::StoryModerator,
            permissions,
            is_active: true,
            last_login: None,
        }
    }

    #[test]
    fn test_profile_deserializes_wire_format() {
        let json = r#"{
            "_id": "65f0c",
            "name": "Ada",
            "email": "ada@example.com",
            "role": "blog_manager",
            "permissions": {"canManageBlogs": true},
            "isActive": true,
            "lastLogin": "2024-03-01T10:00:00Z"
        }"#;
        let profile: Profile = serde_json::from_str(json).unwrap();
        assert_eq!(profile.id, "65f0c");
        assert_eq!(profile.role, Role::BlogManager);
        assert!(profile.has_permission("canManageBlogs"));
        assert!(profile.last_login.is_some());
    }

    #[test]
    fn test_missing_permissions_default_to_empty() {
        let json = r#"{"id":"x","name":"n","email":"e","role":"story_moderator"}"#;
        let profile: Profile = serde_json::from_str(json).unwrap();
        assert!(profile.permissions.is_empty());
        assert!(profile.is_active);
        assert!(!profile.has_permission("canManageStories"));
    }

    #[test]
    fn test_permission_map_lookup() {
        let profile = moderator();
        assert!(profile.has_permission("canManageStories"));
        assert!(!profile.has_permission("canManageBlogs"));
        assert!(!profile.has_permission("canViewAnalytics"));
    }

    #[test]
    fn test_manage_admins_requires_super_admin() {
        let mut profile = moderator();
        assert!(!profile.has_permission("canManageAdmins"));

        profile.role = Role::SuperAdmin;
        profile.permissions.clear();
        assert!(profile.has_permission("canManageAdmins"));
        assert!(profile.has_permission("canManageBlogs"));
    }

    #[test]
    fn test_granted_excludes_manage_admins() {
        assert_eq!(moderator().granted(), vec!["canManageStories"]);
    }

    #[test]
    fn test_merge_keeps_identity() {
        let mut current = moderator();
        let mut update = moderator();
        update.id = "other".to_string();
        update.role = Role::SuperAdmin;
        update.name = "Renamed".to_string();
        update.permissions.insert("canManageWaitlist".to_string(), true);

        current.merge(&update);
        assert_eq!(current.id, "a1");
        assert_eq!(current.role, Role::StoryModerator);
        assert_eq!(current.name, "Renamed");
        assert!(current.has_permission("canManageWaitlist"));
    }

    #[test]
    fn test_role_round_trips_through_str() {
        for role in [Role::SuperAdmin, Role::BlogManager, Role::StoryModerator] {
            assert_eq!(role.as_str().parse::<Role>().unwrap(), role);
        }
        assert!("owner".parse::<Role>().is_err());
    }
}
