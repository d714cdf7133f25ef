//! Redirect targets and the navigation seam

use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};
use tracing::info;
use url::form_urlencoded;

/// Login entry point
pub const LOGIN_PATH: &str = "/login";

/// Default landing page for authenticated admins
pub const DEFAULT_LANDING_PATH: &str = "/dashboard";

/// A forced navigation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Redirect {
    pub to: String,
    /// Location to return to after the redirect target completes (login)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub return_to: Option<String>,
}

impl Redirect {
    pub fn login(return_to: Option<String>) -> Self {
        Self {
            to: LOGIN_PATH.to_string(),
            return_to,
        }
    }

    pub fn landing() -> Self {
        Self {
            to: DEFAULT_LANDING_PATH.to_string(),
            return_to: None,
        }
    }

    pub fn is_login(&self) -> bool {
        self.to == LOGIN_PATH
    }
}

impl Display for Redirect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.return_to {
            Some(from) => {
                let query = form_urlencoded::Serializer::new(String::new())
                    .append_pair("from", from)
                    .finish();
                write!(f, "{}?{query}", self.to)
            }
            None => f.write_str(&self.to),
        }
    }
}

/// Receives redirects the session layer forces on the application
pub trait Navigator: Send + Sync {
    fn navigate(&self, redirect: Redirect);
}

/// Navigator for headless use; records the redirect in the log only
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingNavigator;

impl Navigator for LoggingNavigator {
    fn navigate(&self, redirect: Redirect) {
        info!(target = %redirect, "Navigation requested");
    }
}
