use reqwest::StatusCode;
use thiserror::Error;
use url::Url;

use crate::form::FormError;
use crate::login::LoginStep;
use crate::refresh::RefreshError;
use crate::series::SeriesKind;
use crate::transport::BoxError;

#[derive(Error, Debug)]
pub enum LoginError {
    #[error("could not create http client")]
    Client(#[from] reqwest::Error),
    #[error("request timeout must be longer than zero")]
    ZeroTimeout,
    #[error("portal not available at {url}")]
    PortalUnreachable {
        url: Url,
        #[source]
        source: BoxError,
    },
    /// The portal did not answer the way the login flow expects.
    #[error("login flow changed at step `{step}`: {drift}")]
    ProtocolChanged {
        step: LoginStep,
        #[source]
        drift: ProtocolDrift,
    },
    #[error("posting the login form to {url} failed")]
    LoginTransport {
        url: Url,
        #[source]
        source: BoxError,
    },
    /// No redirect header after the form post. Rejected credentials and a
    /// changed login flow look the same here.
    #[error("no `{header}` header after posting the login form, credentials rejected or login flow changed")]
    LoginFailed { header: String },
}

/// What exactly did not match during a login step.
#[derive(Error, Debug)]
pub enum ProtocolDrift {
    #[error(transparent)]
    Refresh(#[from] RefreshError),
    #[error(transparent)]
    Form(#[from] FormError),
    #[error("cannot resolve `{target}` against {base}")]
    Unresolvable {
        target: String,
        base: Url,
        #[source]
        source: url::ParseError,
    },
    #[error("request to {url} failed")]
    Request {
        url: Url,
        #[source]
        source: BoxError,
    },
}

#[derive(Error, Debug)]
pub enum DataFetchError {
    #[error("cannot build {series} url from {base}")]
    InvalidEndpoint { series: SeriesKind, base: Url },
    #[error("{series} request failed")]
    Request {
        series: SeriesKind,
        #[source]
        source: BoxError,
    },
    #[error("{series} endpoint responded with {status}")]
    Status {
        series: SeriesKind,
        status: StatusCode,
    },
    #[error("{series} response is not valid json")]
    Json {
        series: SeriesKind,
        #[source]
        source: serde_json::Error,
    },
}
