//! Logging in to the portal.
//!
//! There is no API for this. The flow emulates a browser and will break as
//! soon as the portal changes its login pages:
//!
//! 1. fetch the portal page
//! 2. follow its meta refresh to the login page
//! 3. scrape the login form and fill in the credentials
//! 4. post the form, the portal answers with an `ajax-location` header
//! 5. follow that header
//! 6. follow two more meta refreshes, after which the cookie jar is
//!    authenticated

use std::fmt;

use tracing::{debug, info};
use url::Url;

use crate::config::PortalConfig;
use crate::credentials::Credentials;
use crate::error::{LoginError, ProtocolDrift};
use crate::form::{FormFields, FormSnapshot};
use crate::refresh::{extract_refresh_target, resolve};
use crate::transport::{HttpTransport, Page, Transport};

/// The step of the login flow an error happened in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginStep {
    PortalRedirect,
    LoginForm,
    SubmitLogin,
    AjaxRedirect,
    /// 1-based number of the meta refresh hop after the ajax redirect.
    PostLoginRedirect(usize),
}

impl fmt::Display for LoginStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoginStep::PortalRedirect => write!(f, "portal redirect"),
            LoginStep::LoginForm => write!(f, "login form"),
            LoginStep::SubmitLogin => write!(f, "submit login"),
            LoginStep::AjaxRedirect => write!(f, "ajax redirect"),
            LoginStep::PostLoginRedirect(hop) => write!(f, "post-login redirect {hop}"),
        }
    }
}

/// States of the login flow. Each one carries what the next step needs.
#[derive(Debug)]
pub enum LoginState {
    Init,
    PortalFetched(Page),
    FirstRedirectResolved(Url),
    FormScraped(LoginSubmission),
    LoginSubmitted(Url),
    AjaxRedirectResolved(Page),
    Authenticated(Page),
}

/// Filled-in login form and where to post it.
#[derive(Debug)]
pub struct LoginSubmission {
    pub url: Url,
    pub fields: FormFields,
}

/// Entry point for one login attempt.
///
/// Every `Portal` owns its transport and with it its cookie jar. Logging in
/// consumes the portal; on success the jar lives on in the [`Session`].
pub struct Portal<T = HttpTransport> {
    config: PortalConfig,
    transport: T,
}

impl Portal<HttpTransport> {
    /// Create a portal with a fresh `reqwest` based transport.
    pub fn new(config: PortalConfig) -> Result<Self, LoginError> {
        let timeout = config.request_timeout();
        if timeout.is_zero() {
            return Err(LoginError::ZeroTimeout);
        }
        let transport = HttpTransport::new(timeout)?;

        Ok(Self::with_transport(config, transport))
    }
}

impl<T: Transport> Portal<T> {
    pub fn with_transport(config: PortalConfig, transport: T) -> Self {
        Self { config, transport }
    }

    pub fn config(&self) -> &PortalConfig {
        &self.config
    }

    /// Runs the whole login flow. A single attempt, nothing is retried.
    #[tracing::instrument(err, skip(self, credentials), level = "info")]
    pub async fn login(self, credentials: &Credentials) -> Result<Session<T>, LoginError> {
        let mut state = LoginState::Init;
        loop {
            state = match state {
                LoginState::Authenticated(page) => {
                    info!(location = %page.url, "logged in");
                    return Ok(Session::new(self.transport, self.config, page.url));
                }
                state => self.advance(state, credentials).await?,
            };
        }
    }

    /// Performs the step leaving `state`.
    pub async fn advance(
        &self,
        state: LoginState,
        credentials: &Credentials,
    ) -> Result<LoginState, LoginError> {
        Ok(match state {
            LoginState::Init => LoginState::PortalFetched(self.fetch_portal().await?),
            LoginState::PortalFetched(page) => LoginState::FirstRedirectResolved(
                meta_redirect(&page, LoginStep::PortalRedirect)?,
            ),
            LoginState::FirstRedirectResolved(url) => {
                LoginState::FormScraped(self.fetch_login_form(url, credentials).await?)
            }
            LoginState::FormScraped(submission) => {
                LoginState::LoginSubmitted(self.submit_login(submission).await?)
            }
            LoginState::LoginSubmitted(url) => LoginState::AjaxRedirectResolved(
                self.fetch(url, LoginStep::AjaxRedirect).await?,
            ),
            LoginState::AjaxRedirectResolved(page) => {
                LoginState::Authenticated(self.follow_meta_redirects(page).await?)
            }
            state @ LoginState::Authenticated(_) => state,
        })
    }

    async fn fetch_portal(&self) -> Result<Page, LoginError> {
        let url = self.config.portal_url.clone();
        debug!(%url, "opening portal");

        self.transport
            .get(url.clone())
            .await
            .map_err(|source| LoginError::PortalUnreachable { url, source })
    }

    async fn fetch(&self, url: Url, step: LoginStep) -> Result<Page, LoginError> {
        debug!(%url, %step, "following redirect");

        self.transport.get(url.clone()).await.map_err(|source| {
            protocol_changed(step, ProtocolDrift::Request { url, source })
        })
    }

    async fn fetch_login_form(
        &self,
        url: Url,
        credentials: &Credentials,
    ) -> Result<LoginSubmission, LoginError> {
        let page = self.fetch(url, LoginStep::LoginForm).await?;
        let form_config = &self.config.login_form;

        let snapshot = FormSnapshot::scrape(&page.body, &form_config.form_id)
            .map_err(|e| protocol_changed(LoginStep::LoginForm, e))?;
        debug!(
            action = snapshot.action(),
            fields = ?snapshot.names().collect::<Vec<_>>(),
            "scraped login form"
        );

        // The declared action is rewritten by the portal's scripts, post to
        // the configured path instead.
        let url = resolve(&page.url, &form_config.submit_path)
            .map_err(|e| protocol_changed(LoginStep::LoginForm, e))?;
        let fields = snapshot
            .fill(form_config, credentials)
            .map_err(|e| protocol_changed(LoginStep::LoginForm, e))?;

        Ok(LoginSubmission { url, fields })
    }

    async fn submit_login(&self, submission: LoginSubmission) -> Result<Url, LoginError> {
        let LoginSubmission { url, fields } = submission;
        debug!(%url, ?fields, "posting login form");

        let page = self
            .transport
            .post_form(
                url.clone(),
                &self.config.login_form.submit_headers,
                fields.as_slice(),
            )
            .await
            .map_err(|source| LoginError::LoginTransport { url, source })?;

        let header = &self.config.redirect_header;
        let target = page.header(header).ok_or_else(|| LoginError::LoginFailed {
            header: header.clone(),
        })?;
        debug!(%target, "got ajax redirect");

        resolve(&page.url, target).map_err(|e| protocol_changed(LoginStep::SubmitLogin, e))
    }

    async fn follow_meta_redirects(&self, mut page: Page) -> Result<Page, LoginError> {
        for hop in 1..=self.config.post_login_redirects {
            let step = LoginStep::PostLoginRedirect(hop);
            let url = meta_redirect(&page, step)?;
            page = self.fetch(url, step).await?;
        }

        Ok(page)
    }
}

/// Resolves the meta refresh target of `page` against the page's own URL.
fn meta_redirect(page: &Page, step: LoginStep) -> Result<Url, LoginError> {
    let target = extract_refresh_target(&page.body).map_err(|e| protocol_changed(step, e))?;
    debug!(%target, %step, "found meta refresh");

    resolve(&page.url, &target).map_err(|e| protocol_changed(step, e))
}

fn protocol_changed(step: LoginStep, drift: impl Into<ProtocolDrift>) -> LoginError {
    LoginError::ProtocolChanged {
        step,
        drift: drift.into(),
    }
}

/// An authenticated portal session.
///
/// Holds the transport whose cookie jar carries the login. Data queries are
/// made through it, see [`Session::consumption`] and [`Session::prices`].
pub struct Session<T = HttpTransport> {
    pub(crate) transport: T,
    pub(crate) config: PortalConfig,
    location: Url,
}

impl<T> Session<T> {
    pub(crate) fn new(transport: T, config: PortalConfig, location: Url) -> Self {
        Self {
            transport,
            config,
            location,
        }
    }

    /// URL of the last page of the login flow.
    pub fn location(&self) -> &Url {
        &self.location
    }

    pub fn config(&self) -> &PortalConfig {
        &self.config
    }
}

impl<T> fmt::Debug for Session<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("location", &self.location)
            .finish_non_exhaustive()
    }
}
