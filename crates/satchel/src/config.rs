//! Configuration for the session middleware.
//!
//! Everything here is about the cookie that carries the identifier and how
//! incoming identifiers are screened. Where records live is the store's
//! business; see `satchel-store`.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Default cookie name.
pub const DEFAULT_COOKIE_NAME: &str = "id";

/// Default inactivity timeout: the cookie's `Max-Age`.
pub const DEFAULT_MAX_AGE: Duration = Duration::from_secs(900);

// ---------------------------------------------------------------------------
// Policies
// ---------------------------------------------------------------------------

/// The cookie's `SameSite` attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SameSitePolicy {
    Strict,
    #[default]
    Lax,
    /// Requires `Secure` in every current browser.
    None,
}

impl From<SameSitePolicy> for cookie::SameSite {
    fn from(policy: SameSitePolicy) -> Self {
        match policy {
            SameSitePolicy::Strict => cookie::SameSite::Strict,
            SameSitePolicy::Lax => cookie::SameSite::Lax,
            SameSitePolicy::None => cookie::SameSite::None,
        }
    }
}

/// When the cookie gets the `Secure` attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SecurePolicy {
    /// Secure when the request came in over TLS. That is recognized from
    /// any of:
    ///
    /// - a [`SecureConnection`] in the request extensions
    /// - an `https` request URI
    /// - `X-Forwarded-Proto: https`, if
    ///   [`trust_forwarded_proto`](SessionConfig::trust_forwarded_proto) is on
    ///
    /// Servers such as hyper hand out origin-form URIs (`/path`, no
    /// scheme), so a server terminating TLS itself must insert
    /// [`SecureConnection`] or use [`SecurePolicy::Always`].
    #[default]
    Auto,
    Always,
    Never,
}

/// Request extension marking a request that arrived over TLS.
///
/// Insert it from the TLS acceptor (or any earlier layer) so
/// [`SecurePolicy::Auto`] sets `Secure` on origin-form requests:
///
/// ```rust
/// use satchel::SecureConnection;
///
/// let mut req = http::Request::new(());
/// req.extensions_mut().insert(SecureConnection);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SecureConnection;

// ---------------------------------------------------------------------------
// SessionConfig
// ---------------------------------------------------------------------------

/// Configuration for [`SessionLayer`](crate::SessionLayer).
///
/// `#[serde(default)]` lets an application embed this in its own config
/// file and only spell out the fields it changes:
///
/// ```toml
/// [session]
/// cookie_name = "sid"
/// secure = "always"
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Name of the cookie carrying the identifier. Default: `id`.
    pub cookie_name: String,
    /// Cookie `Path`. Default: `/`.
    pub path: String,
    /// Cookie `Domain`. Default: none (host-only cookie).
    pub domain: Option<String>,
    /// Inactivity timeout, sent as `Max-Age` and `Expires` on every
    /// response. Default: 900 seconds.
    pub max_age: Duration,
    pub same_site: SameSitePolicy,
    pub secure: SecurePolicy,
    /// Believe `X-Forwarded-Proto` when deciding `Secure` under
    /// [`SecurePolicy::Auto`]. Only turn this on behind a proxy that sets
    /// the header itself. Default: off.
    pub trust_forwarded_proto: bool,
    /// Replace well-formed identifiers the store has never seen instead of
    /// adopting them, so a client can't pick its own session id.
    /// Default: on.
    pub strict_ids: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cookie_name: DEFAULT_COOKIE_NAME.to_string(),
            path: "/".to_string(),
            domain: None,
            max_age: DEFAULT_MAX_AGE,
            same_site: SameSitePolicy::default(),
            secure: SecurePolicy::default(),
            trust_forwarded_proto: false,
            strict_ids: true,
        }
    }
}

impl SessionConfig {
    /// Shortest `max_age` accepted.
    pub const MIN_MAX_AGE: Duration = Duration::from_secs(1);

    /// Longest `max_age` accepted: 400 days, the cap browsers put on
    /// cookie lifetimes anyway.
    pub const MAX_MAX_AGE: Duration = Duration::from_secs(400 * 24 * 60 * 60);

    pub fn with_cookie_name(mut self, name: impl Into<String>) -> Self {
        self.cookie_name = name.into();
        self
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    pub fn with_max_age(mut self, max_age: Duration) -> Self {
        self.max_age = max_age;
        self
    }

    pub fn with_same_site(mut self, same_site: SameSitePolicy) -> Self {
        self.same_site = same_site;
        self
    }

    pub fn with_secure(mut self, secure: SecurePolicy) -> Self {
        self.secure = secure;
        self
    }

    pub fn with_trust_forwarded_proto(mut self, trust: bool) -> Self {
        self.trust_forwarded_proto = trust;
        self
    }

    pub fn with_strict_ids(mut self, strict: bool) -> Self {
        self.strict_ids = strict;
        self
    }

    /// Fix any unusable values so the config is safe to use.
    ///
    /// Called automatically by [`SessionLayer::with_config`](crate::SessionLayer::with_config).
    /// Rules:
    /// - an empty `cookie_name` falls back to [`DEFAULT_COOKIE_NAME`]
    /// - an empty `path` becomes `/`
    /// - `max_age` is clamped to [`Self::MIN_MAX_AGE`]..=[`Self::MAX_MAX_AGE`]
    pub fn validated(mut self) -> Self {
        if self.cookie_name.trim().is_empty() {
            warn!("empty session cookie name, using default");
            self.cookie_name = DEFAULT_COOKIE_NAME.to_string();
        }
        if self.path.is_empty() {
            self.path = "/".to_string();
        }
        if self.max_age < Self::MIN_MAX_AGE {
            warn!(
                max_age_ms = self.max_age.as_millis() as u64,
                "session max_age below minimum, raising to 1s"
            );
            self.max_age = Self::MIN_MAX_AGE;
        }
        if self.max_age > Self::MAX_MAX_AGE {
            warn!(
                max_age_secs = self.max_age.as_secs(),
                "session max_age above maximum, lowering to 400 days"
            );
            self.max_age = Self::MAX_MAX_AGE;
        }
        self
    }
}
