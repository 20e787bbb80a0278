use std::time::Duration;

use chrono_tz::Tz;
use serde::Deserialize;
use url::Url;

const PORTAL_URL: &str = "https://www.fortum.com/valpas";
const CONSUMPTION_API: &str = "https://www.fortum.com/valpas/";
const PRICE_API: &str = "https://valpas.fortum.fi/valpas/";

/// Settings for logging in to the portal and querying its data endpoints.
///
/// The defaults describe the portal as it behaves today. Every identifier the
/// login flow depends on lives here, so a change on the portal side can be
/// followed by changing configuration only.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PortalConfig {
    /// Entry point of the login flow.
    pub portal_url: Url,
    pub login_form: LoginFormConfig,
    /// Response header carrying the redirect target after the form post.
    pub redirect_header: String,
    /// Number of meta-refresh hops that follow the ajax redirect.
    pub post_login_redirects: usize,
    /// Per-request timeout in milliseconds, must not be zero.
    pub request_timeout_ms: u64,
    /// Base the consumption series path is joined onto.
    pub consumption_api: Url,
    /// Base the spot price series path is joined onto.
    pub price_api: Url,
    /// Zone the query timestamps are expressed in.
    pub time_zone: Tz,
}

/// How to find, fill in and post the login form.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoginFormConfig {
    /// `id` attribute of the login `<form>`.
    pub form_id: String,
    pub username_field: String,
    pub password_field: String,
    /// Path the form is posted to, resolved against the login page URL.
    ///
    /// The form declares an `action` of its own, but the portal's ajax
    /// framework rewrites it on the client, so posting to the declared action
    /// does not log in. This path overrides it.
    pub submit_path: String,
    /// Headers the portal's ajax framework sends along with the form post.
    pub submit_headers: Vec<(String, String)>,
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            portal_url: PORTAL_URL.parse().expect("valid default URL"),
            login_form: LoginFormConfig::default(),
            redirect_header: "ajax-location".to_owned(),
            post_login_redirects: 2,
            request_timeout_ms: 30_000,
            consumption_api: CONSUMPTION_API.parse().expect("valid default URL"),
            price_api: PRICE_API.parse().expect("valid default URL"),
            time_zone: chrono_tz::Europe::Helsinki,
        }
    }
}

impl Default for LoginFormConfig {
    fn default() -> Self {
        let headers = [
            ("Wicket-Ajax", "true"),
            ("Wicket-Ajax-BaseURL", "login"),
            ("Wicket-FocusedElementId", "loginWithUserID5"),
            ("X-Requested-With", "XMLHttpRequest"),
            ("Origin", "https://login.fortum.com"),
            ("Referer", "https://login.fortum.com/portal/login"),
        ];

        Self {
            form_id: "usernameLogin4".to_owned(),
            username_field: "ttqusername".to_owned(),
            password_field: "userPassword".to_owned(),
            submit_path: "login?2-1.IBehaviorListener.0-userIDPanel-loginWithUserID".to_owned(),
            submit_headers: headers
                .into_iter()
                .map(|(name, value)| (name.to_owned(), value.to_owned()))
                .collect(),
        }
    }
}

impl PortalConfig {
    /// Override the portal entry point.
    #[must_use]
    pub fn with_portal_url(mut self, url: Url) -> Self {
        self.portal_url = url;
        self
    }

    /// Override the login form settings.
    #[must_use]
    pub fn with_login_form(mut self, login_form: LoginFormConfig) -> Self {
        self.login_form = login_form;
        self
    }

    /// Override the number of meta-refresh hops after the ajax redirect.
    #[must_use]
    pub fn with_post_login_redirects(mut self, hops: usize) -> Self {
        self.post_login_redirects = hops;
        self
    }

    /// Override the per-request timeout. Rounded up to whole milliseconds.
    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        let millis = (timeout.as_nanos() + 999_999) / 1_000_000;
        self.request_timeout_ms = u64::try_from(millis).unwrap_or(u64::MAX);
        self
    }

    /// Override both data endpoint bases.
    #[must_use]
    pub fn with_data_endpoints(mut self, consumption_api: Url, price_api: Url) -> Self {
        self.consumption_api = consumption_api;
        self.price_api = price_api;
        self
    }

    #[must_use]
    pub fn with_time_zone(mut self, time_zone: Tz) -> Self {
        self.time_zone = time_zone;
        self
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PortalConfig::default();

        assert_eq!(config.portal_url.as_str(), "https://www.fortum.com/valpas");
        assert_eq!(config.login_form.form_id, "usernameLogin4");
        assert_eq!(config.redirect_header, "ajax-location");
        assert_eq!(config.post_login_redirects, 2);
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
        assert!(config
            .login_form
            .submit_headers
            .iter()
            .any(|(name, value)| name == "Origin" && value == "https://login.fortum.com"));
    }

    #[test]
    fn test_partial_deserialize_keeps_defaults() {
        let config: PortalConfig = serde_json::from_str(
            r#"{
                "login_form": { "form_id": "usernameLogin5" },
                "time_zone": "Europe/Stockholm",
                "post_login_redirects": 3
            }"#,
        )
        .unwrap();

        assert_eq!(config.login_form.form_id, "usernameLogin5");
        assert_eq!(config.login_form.username_field, "ttqusername");
        assert_eq!(config.time_zone, chrono_tz::Europe::Stockholm);
        assert_eq!(config.post_login_redirects, 3);
        assert_eq!(config.price_api.as_str(), "https://valpas.fortum.fi/valpas/");
    }

    #[test]
    fn test_sub_second_timeout_is_kept() {
        let config = PortalConfig::default().with_request_timeout(Duration::from_millis(500));
        assert_eq!(config.request_timeout(), Duration::from_millis(500));

        let config = PortalConfig::default().with_request_timeout(Duration::from_micros(1500));
        assert_eq!(config.request_timeout(), Duration::from_millis(2));

        let config = PortalConfig::default().with_request_timeout(Duration::from_nanos(1));
        assert_eq!(config.request_timeout(), Duration::from_millis(1));
    }

    #[test]
    fn test_with_overrides() {
        let config = PortalConfig::default()
            .with_portal_url("https://portal.example/start".parse().unwrap())
            .with_request_timeout(Duration::from_secs(5))
            .with_post_login_redirects(1);

        assert_eq!(config.portal_url.as_str(), "https://portal.example/start");
        assert_eq!(config.request_timeout_ms, 5_000);
        assert_eq!(config.post_login_redirects, 1);
    }
}
