use secrecy::{ExposeSecret, Secret};

/// Username and password for the Valpas portal.
///
/// Both values are kept as [`Secret`]s, so the `Debug` output of this type
/// never contains them.
#[derive(Debug, Clone)]
pub struct Credentials {
    username: Secret<String>,
    password: Secret<String>,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: Secret::new(username.into()),
            password: Secret::new(password.into()),
        }
    }

    pub(crate) fn username(&self) -> &str {
        self.username.expose_secret()
    }

    pub(crate) fn password(&self) -> &str {
        self.password.expose_secret()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_is_redacted() {
        let credentials = Credentials::new("matti", "hunter2");
        let debug = format!("{credentials:?}");

        assert!(!debug.contains("matti"));
        assert!(!debug.contains("hunter2"));
    }
}
