//! Cookie jar persisted next to the session
//!
//! The refresh token travels as an HTTP-only cookie. Keeping the jar in the
//! session's [`KeyValueStorage`] lets a later process refresh or log out the
//! session, and lets [`TokenStore::clear`](inkdesk_core::TokenStore::clear)
//! drop it together with the token pair.
//!
//! A client talks to a single API origin, so cookies are kept by name only;
//! domain and path attributes are not tracked.

use chrono::{DateTime, Utc};
use inkdesk_core::{CoreError, KeyValueStorage};
use inkdesk_core::store::COOKIES_KEY;
use reqwest::cookie::CookieStore;
use reqwest::header::HeaderValue;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, warn};
use url::Url;

type CookieMap = BTreeMap<String, String>;

pub struct StoredCookieJar {
    storage: Arc<dyn KeyValueStorage>,
    lock: Mutex<()>,
}

impl StoredCookieJar {
    pub fn new(storage: Arc<dyn KeyValueStorage>) -> Self {
        Self {
            storage,
            lock: Mutex::new(()),
        }
    }

    fn read(&self) -> CookieMap {
        match self.storage.get_item(COOKIES_KEY) {
            Ok(Some(raw)) => serde_json::from_str(&raw).unwrap_or_else(|e| {
                warn!("Ignoring unreadable stored cookies: {e}");
                CookieMap::new()
            }),
            Ok(None) => CookieMap::new(),
            Err(e) => {
                warn!("Failed to read stored cookies: {e}");
                CookieMap::new()
            }
        }
    }

    fn write(&self, cookies: &CookieMap) {
        let result = if cookies.is_empty() {
            self.storage.remove_item(COOKIES_KEY)
        } else {
            serde_json::to_string(cookies)
                .map_err(|e| CoreError::serialization(e.to_string()))
                .and_then(|raw| self.storage.set_item(COOKIES_KEY, &raw))
        };
        if let Err(e) = result {
            warn!("Failed to store cookies: {e}");
        }
    }
}

impl CookieStore for StoredCookieJar {
    fn set_cookies(&self, cookie_headers: &mut dyn Iterator<Item = &HeaderValue>, _url: &Url) {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut cookies = self.read();
        let mut changed = false;

        for header in cookie_headers {
            let Some(cookie) = header.to_str().ok().and_then(SetCookie::parse) else {
                continue;
            };
            if cookie.expired {
                changed |= cookies.remove(cookie.name).is_some();
            } else {
                debug!(name = cookie.name, "Storing cookie");
                cookies.insert(cookie.name.to_string(), cookie.value.to_string());
                changed = true;
            }
        }

        if changed {
            self.write(&cookies);
        }
    }

    fn cookies(&self, _url: &Url) -> Option<HeaderValue> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let cookies = self.read();
        if cookies.is_empty() {
            return None;
        }
        let header = cookies
            .iter()
            .map(|(name, value)| format!("{name}={value}"))
            .collect::<Vec<_>>()
            .join("; ");
        HeaderValue::from_str(&header).ok()
    }
}

/// The parts of a `Set-Cookie` header the jar cares about
struct SetCookie<'a> {
    name: &'a str,
    value: &'a str,
    expired: bool,
}

impl<'a> SetCookie<'a> {
    fn parse(header: &'a str) -> Option<Self> {
        let mut parts = header.split(';');
        let (name, value) = parts.next()?.split_once('=')?;
        let name = name.trim();
        if name.is_empty() {
            return None;
        }
        let value = value.trim().trim_matches('"');

        let mut expired = value.is_empty();
        for attribute in parts {
            let (key, arg) = attribute
                .split_once('=')
                .map_or((attribute.trim(), ""), |(k, v)| (k.trim(), v.trim()));
            if key.eq_ignore_ascii_case("max-age") {
                expired |= arg.parse::<i64>().is_ok_and(|secs| secs <= 0);
            } else if key.eq_ignore_ascii_case("expires") {
                expired |= DateTime::parse_from_rfc2822(arg)
                    .is_ok_and(|at| at.with_timezone(&Utc) <= Utc::now());
            }
        }

        Some(Self {
            name,
            value,
            expired,
        })
    }
}
