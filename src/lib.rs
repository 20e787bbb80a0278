//! Unofficial client for the Fortum Valpas energy portal.
//!
//! Valpas offers no API. This crate logs in the way a browser does and then
//! queries the JSON endpoints the portal's own pages use. It breaks whenever
//! Fortum changes its login pages; most identifiers the login depends on can
//! be adjusted through [`PortalConfig`].
//!
//! ```no_run
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! use valpas_api::{login, Credentials};
//!
//! let session = login(&Credentials::new("user", "secret")).await?;
//! let end = chrono::Utc::now();
//! let start = end - chrono::Duration::days(1);
//! let prices = session.prices("1234567", start, end).await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod credentials;
pub mod error;
pub mod form;
pub mod login;
pub mod refresh;
pub mod series;
pub mod transport;

pub use config::{LoginFormConfig, PortalConfig};
pub use credentials::Credentials;
pub use error::{DataFetchError, LoginError, ProtocolDrift};
pub use login::{LoginState, LoginStep, Portal, Session};
pub use series::{SeriesKind, SeriesQuery};
pub use transport::{HttpTransport, Page, Transport};

/// Log in with the default [`PortalConfig`].
///
/// This is a shortcut for `Portal::new(PortalConfig::default())?.login(credentials)`.
pub async fn login(credentials: &Credentials) -> Result<Session, LoginError> {
    Portal::new(PortalConfig::default())?
        .login(credentials)
        .await
}
