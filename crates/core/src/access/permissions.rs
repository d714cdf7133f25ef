use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};
use std::str::FromStr;

/// Capabilities known to the admin back-office
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Permission {
    #[serde(rename = "canManageBlogs")]
    ManageBlogs,
    #[serde(rename = "canManageStories")]
    ManageStories,
    #[serde(rename = "canManageWaitlist")]
    ManageWaitlist,
    #[serde(rename = "canViewAnalytics")]
    ViewAnalytics,
    #[serde(rename = "canManageAdmins")]
    ManageAdmins,
}

impl Permission {
    pub const ALL: [Permission; 5] = [
        Self::ManageBlogs,
        Self::ManageStories,
        Self::ManageWaitlist,
        Self::ViewAnalytics,
        Self::ManageAdmins,
    ];

    /// Wire name used in permission maps and route metadata
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::ManageBlogs => "canManageBlogs",
            Self::ManageStories => "canManageStories",
            Self::ManageWaitlist => "canManageWaitlist",
            Self::ViewAnalytics => "canViewAnalytics",
            Self::ManageAdmins => "canManageAdmins",
        }
    }
}

impl Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Permission {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| format!("unknown permission: {s}"))
    }
}
