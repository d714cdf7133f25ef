//! Admin back-office routes and their access requirements

use inkdesk_core::{AuthSnapshot, GuardDecision, Permission, RouteMeta};

pub const DASHBOARD: RouteMeta = RouteMeta::open("/dashboard", "Dashboard");
pub const BLOGS: RouteMeta = RouteMeta::open("/blogs", "Blogs").requires(Permission::ManageBlogs);
pub const STORIES: RouteMeta =
    RouteMeta::open("/stories", "Stories").requires(Permission::ManageStories);
pub const WAITLIST: RouteMeta =
    RouteMeta::open("/waitlist", "Waitlist").requires(Permission::ManageWaitlist);
pub const ANALYTICS: RouteMeta =
    RouteMeta::open("/analytics", "Analytics").requires(Permission::ViewAnalytics);
pub const ADMINS: RouteMeta = RouteMeta::open("/admins", "Admins")
    .requires(Permission::ManageAdmins)
    .super_admin_only();
pub const PROFILE: RouteMeta = RouteMeta::open("/profile", "Profile");

pub const ROUTES: &[RouteMeta] = &[
    DASHBOARD, BLOGS, STORIES, WAITLIST, ANALYTICS, ADMINS, PROFILE,
];

/// Route owning `location`; nested paths (`/blogs/42/edit`) resolve to their
/// section and the query string is ignored.
pub fn find(location: &str) -> Option<&'static RouteMeta> {
    let path = location.split(['?', '#']).next().unwrap_or_default();
    let path = match path.trim_end_matches('/') {
        "" => "/",
        trimmed => trimmed,
    };

    ROUTES.iter().find(|route| {
        path == route.path
            || path
                .strip_prefix(route.path)
                .is_some_and(|rest| rest.starts_with('/'))
    })
}

/// Routes the snapshot may currently render, in menu order
pub fn visible(snapshot: &AuthSnapshot) -> Vec<&'static RouteMeta> {
    ROUTES
        .iter()
        .filter(|route| GuardDecision::evaluate(snapshot, route, route.path).is_render())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use inkdesk_core::{PermissionMap, Profile, Role};

    fn snapshot(role: Role, granted: &[&str]) -> AuthSnapshot {
        AuthSnapshot {
            is_loading: false,
            profile: Some(Profile {
                id: "1".into(),
                name: "n".into(),
                email: "e@example.com".into(),
                role,
                permissions: granted
                    .iter()
                    .map(|p| (p.to_string(), true))
                    .collect::<PermissionMap>(),
                is_active: true,
                last_login: None,
            }),
        }
    }

    #[test]
    fn test_find_resolves_nested_paths() {
        assert_eq!(find("/blogs").unwrap().path, "/blogs");
        assert_eq!(find("/blogs/42/edit").unwrap().path, "/blogs");
        assert_eq!(find("/stories?status=pending").unwrap().path, "/stories");
        assert_eq!(find("/admins/").unwrap().path, "/admins");
        assert!(find("/blogsx").is_none());
        assert!(find("/").is_none());
    }

    #[test]
    fn test_visible_routes_follow_permissions() {
        let moderator = snapshot(Role::StoryModerator, &["canManageStories", "canManageWaitlist"]);
        let paths: Vec<_> = visible(&moderator).iter().map(|r| r.path).collect();
        assert_eq!(paths, vec!["/dashboard", "/stories", "/waitlist", "/profile"]);

        let super_admin = snapshot(Role::SuperAdmin, &[]);
        assert_eq!(visible(&super_admin).len(), ROUTES.len());

        assert!(visible(&AuthSnapshot::default()).is_empty());
    }
}
