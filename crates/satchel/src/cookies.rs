//! Reading and writing the session cookie.

use cookie::Cookie;
use http::header::{COOKIE, InvalidHeaderValue};
use http::{HeaderMap, HeaderValue, Request};
use satchel_data::SessionId;
use time::OffsetDateTime;

use crate::config::{SecureConnection, SecurePolicy, SessionConfig};

const FORWARDED_PROTO: &str = "x-forwarded-proto";

/// Finds the session cookie among all `Cookie` headers.
///
/// Returns the raw value; screening it is the caller's job. Unparseable
/// cookie pairs are skipped, not fatal: a browser extension mangling some
/// other cookie shouldn't log the user out.
pub(crate) fn read_session_id(headers: &HeaderMap, name: &str) -> Option<SessionId> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(Cookie::split_parse)
        .filter_map(Result::ok)
        .find(|cookie| cookie.name() == name)
        .map(|cookie| SessionId::from(cookie.value()))
}

/// Decides whether the cookie gets the `Secure` attribute.
pub(crate) fn is_secure<B>(req: &Request<B>, config: &SessionConfig) -> bool {
    match config.secure {
        SecurePolicy::Always => true,
        SecurePolicy::Never => false,
        SecurePolicy::Auto => {
            if req.extensions().get::<SecureConnection>().is_some()
                || req.uri().scheme_str() == Some("https")
            {
                return true;
            }
            config.trust_forwarded_proto
                && req
                    .headers()
                    .get(FORWARDED_PROTO)
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.split(',').next())
                    .is_some_and(|proto| proto.trim().eq_ignore_ascii_case("https"))
        }
    }
}

/// The cookie handed out for a live session.
///
/// `Expires` is recomputed from `now` on every response so the window
/// slides with activity. `Max-Age` wins in browsers that understand both.
/// A `max_age` beyond [`SessionConfig::MAX_MAX_AGE`] is capped there.
pub(crate) fn live_cookie(config: &SessionConfig, id: &SessionId, secure: bool) -> Cookie<'static> {
    let secs = config.max_age.min(SessionConfig::MAX_MAX_AGE).as_secs();
    let max_age = i64::try_from(secs).map_or(time::Duration::MAX, time::Duration::seconds);
    let mut cookie = base_cookie(config, id.to_string(), secure);
    cookie.set_max_age(max_age);
    if let Some(expires) = OffsetDateTime::now_utc().checked_add(max_age) {
        cookie.set_expires(expires);
    }
    cookie
}

/// The cookie that tells the browser to forget a destroyed session:
/// empty value, `Max-Age=0`, `Expires` a year in the past.
///
/// Path and domain must match the live cookie or the browser treats it as
/// a different cookie and keeps the old one.
pub(crate) fn removal_cookie(config: &SessionConfig, secure: bool) -> Cookie<'static> {
    let mut cookie = base_cookie(config, String::new(), secure);
    cookie.make_removal();
    cookie
}

pub(crate) fn to_header_value(cookie: &Cookie<'_>) -> Result<HeaderValue, InvalidHeaderValue> {
    HeaderValue::from_str(&cookie.to_string())
}

fn base_cookie(config: &SessionConfig, value: String, secure: bool) -> Cookie<'static> {
    let mut builder = Cookie::build((config.cookie_name.clone(), value))
        .path(config.path.clone())
        .http_only(true)
        .same_site(config.same_site.into())
        .secure(secure);
    if let Some(domain) = &config.domain {
        builder = builder.domain(domain.clone());
    }
    builder.build()
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use cookie::SameSite;

    use super::*;
    use crate::config::SameSitePolicy;

    fn headers(cookies: &[&str]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for c in cookies {
            map.append(COOKIE, HeaderValue::from_str(c).unwrap());
        }
        map
    }

    fn request(uri: &str) -> Request<()> {
        Request::builder().uri(uri).body(()).unwrap()
    }

    // -- read_session_id ----------------------------------------------------

    #[test]
    fn test_read_session_id_finds_named_cookie_among_others() {
        let map = headers(&["theme=dark; id=abc123; lang=en"]);

        assert_eq!(read_session_id(&map, "id"), Some(SessionId::from("abc123")));
    }

    #[test]
    fn test_read_session_id_searches_every_cookie_header() {
        let map = headers(&["theme=dark", "id=from-second-header"]);

        assert_eq!(
            read_session_id(&map, "id").as_ref().map(SessionId::as_str),
            Some("from-second-header")
        );
    }

    #[test]
    fn test_read_session_id_missing_returns_none() {
        assert_eq!(read_session_id(&headers(&["theme=dark"]), "id"), None);
        assert_eq!(read_session_id(&HeaderMap::new(), "id"), None);
    }

    #[test]
    fn test_read_session_id_does_not_match_name_prefixes() {
        let map = headers(&["session_id=abc; idx=def"]);

        assert_eq!(read_session_id(&map, "id"), None);
    }

    // -- is_secure ----------------------------------------------------------

    #[test]
    fn test_is_secure_auto_follows_uri_scheme() {
        let cfg = SessionConfig::default();

        assert!(is_secure(&request("https://example.com/"), &cfg));
        assert!(!is_secure(&request("http://example.com/"), &cfg));
        assert!(!is_secure(&request("/relative"), &cfg));
    }

    #[test]
    fn test_is_secure_auto_ignores_forwarded_proto_unless_trusted() {
        let req = Request::builder()
            .uri("/")
            .header("X-Forwarded-Proto", "https")
            .body(())
            .unwrap();

        assert!(!is_secure(&req, &SessionConfig::default()));
        assert!(is_secure(&req, &SessionConfig::default().with_trust_forwarded_proto(true)));
    }

    #[test]
    fn test_is_secure_trusted_forwarded_proto_uses_first_hop() {
        let req = Request::builder()
            .uri("/")
            .header("X-Forwarded-Proto", "http, https")
            .body(())
            .unwrap();
        let cfg = SessionConfig::default().with_trust_forwarded_proto(true);

        assert!(!is_secure(&req, &cfg));
    }

    #[test]
    fn test_is_secure_auto_honors_secure_connection_extension() {
        let mut req = request("/origin-form");
        req.extensions_mut().insert(SecureConnection);

        assert!(is_secure(&req, &SessionConfig::default()));
        assert!(!is_secure(&req, &SessionConfig::default().with_secure(SecurePolicy::Never)));
    }

    #[test]
    fn test_is_secure_fixed_policies_ignore_request() {
        let https = request("https://example.com/");
        let http = request("http://example.com/");

        assert!(is_secure(&http, &SessionConfig::default().with_secure(SecurePolicy::Always)));
        assert!(!is_secure(&https, &SessionConfig::default().with_secure(SecurePolicy::Never)));
    }

    // -- cookies ------------------------------------------------------------

    #[test]
    fn test_live_cookie_carries_all_attributes() {
        let cfg = SessionConfig::default()
            .with_path("/app")
            .with_domain("example.com")
            .with_same_site(SameSitePolicy::Strict);
        let id = SessionId::from("abc");

        let cookie = live_cookie(&cfg, &id, true);

        assert_eq!(cookie.name(), "id");
        assert_eq!(cookie.value(), "abc");
        assert_eq!(cookie.path(), Some("/app"));
        assert_eq!(cookie.domain(), Some("example.com"));
        assert_eq!(cookie.same_site(), Some(SameSite::Strict));
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.secure(), Some(true));
        assert_eq!(cookie.max_age(), Some(time::Duration::seconds(900)));
        let expires = cookie.expires_datetime().expect("expires is set");
        let ahead = expires - OffsetDateTime::now_utc();
        assert!(ahead > time::Duration::seconds(890) && ahead <= time::Duration::seconds(900));
    }

    #[test]
    fn test_live_cookie_uses_configured_max_age() {
        let cfg = SessionConfig::default().with_max_age(Duration::from_secs(60));

        let cookie = live_cookie(&cfg, &SessionId::from("abc"), false);

        assert_eq!(cookie.max_age(), Some(time::Duration::seconds(60)));
        assert_eq!(cookie.secure(), Some(false));
    }

    #[test]
    fn test_live_cookie_caps_unvalidated_huge_max_age() {
        let cap = time::Duration::seconds(SessionConfig::MAX_MAX_AGE.as_secs() as i64);

        for max_age in [Duration::MAX, Duration::from_secs(1_000_000_000_000)] {
            let cfg = SessionConfig::default().with_max_age(max_age);

            let cookie = live_cookie(&cfg, &SessionId::from("abc"), false);

            assert_eq!(cookie.max_age(), Some(cap));
            let expires = cookie.expires_datetime().expect("expires is set");
            assert!(expires > OffsetDateTime::now_utc() + time::Duration::days(399));
        }
    }

    #[test]
    fn test_removal_cookie_is_empty_and_expired() {
        let cfg = SessionConfig::default();

        let cookie = removal_cookie(&cfg, false);

        assert_eq!(cookie.name(), "id");
        assert_eq!(cookie.value(), "");
        assert_eq!(cookie.path(), Some("/"));
        assert_eq!(cookie.max_age(), Some(time::Duration::ZERO));
        let expires = cookie.expires_datetime().expect("expires is set");
        assert!(expires < OffsetDateTime::now_utc() - time::Duration::days(300));
    }

    #[test]
    fn test_to_header_value_renders_set_cookie_syntax() {
        let cookie = live_cookie(&SessionConfig::default(), &SessionId::from("abc"), true);

        let value = to_header_value(&cookie).unwrap();
        let text = value.to_str().unwrap();

        assert!(text.starts_with("id=abc"));
        assert!(text.contains("HttpOnly"));
        assert!(text.contains("Secure"));
        assert!(text.contains("SameSite=Lax"));
        assert!(text.contains("Max-Age=900"));
        assert!(text.contains("Path=/"));
    }
}
