use std::fmt;

use lazy_static::lazy_static;
use scraper::{Html, Selector};
use thiserror::Error;

use crate::config::LoginFormConfig;
use crate::credentials::Credentials;

lazy_static! {
    static ref FORMS: Selector = Selector::parse("form").expect("valid selector");
    static ref INPUTS: Selector = Selector::parse("input").expect("valid selector");
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum FormError {
    #[error("no form with id `{0}`")]
    MissingForm(String),
    #[error("login form has no `{0}` input")]
    MissingField(String),
}

/// Inputs of the login form as they were served.
///
/// Only inputs carrying a `value` attribute are kept (an empty value counts).
/// Besides the credential fields these are hidden anti-forgery fields which
/// are posted back untouched.
#[derive(Clone, PartialEq, Eq)]
pub struct FormSnapshot {
    action: Option<String>,
    fields: Vec<(String, String)>,
}

impl FormSnapshot {
    /// Scrapes the form with id `form_id` out of `html`.
    pub fn scrape(html: &str, form_id: &str) -> Result<Self, FormError> {
        let document = Html::parse_document(html);
        let form = document
            .select(&FORMS)
            .find(|form| form.value().id() == Some(form_id))
            .ok_or_else(|| FormError::MissingForm(form_id.to_owned()))?;

        let mut snapshot = Self {
            action: form.value().attr("action").map(str::to_owned),
            fields: Vec::new(),
        };
        for input in form.select(&INPUTS) {
            if let (Some(name), Some(value)) = (input.value().attr("name"), input.value().attr("value")) {
                snapshot.set(name, value);
            }
        }

        Ok(snapshot)
    }

    /// The form's declared `action`. Not used for submitting, see
    /// [`LoginFormConfig::submit_path`].
    pub fn action(&self) -> Option<&str> {
        self.action.as_deref()
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(name, _)| name.as_str())
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Later inputs with the same name replace earlier ones.
    fn set(&mut self, name: &str, value: &str) {
        match self.fields.iter_mut().find(|(field, _)| field == name) {
            Some((_, existing)) => *existing = value.to_owned(),
            None => self.fields.push((name.to_owned(), value.to_owned())),
        }
    }

    /// Fills in `credentials` and returns the fields to post.
    ///
    /// Fails if the form does not have both credential inputs.
    pub fn fill(
        mut self,
        config: &LoginFormConfig,
        credentials: &Credentials,
    ) -> Result<FormFields, FormError> {
        for field in [&config.username_field, &config.password_field] {
            if self.get(field).is_none() {
                return Err(FormError::MissingField(field.clone()));
            }
        }

        self.set(&config.username_field, credentials.username());
        self.set(&config.password_field, credentials.password());

        Ok(FormFields(self.fields))
    }
}

impl fmt::Debug for FormSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FormSnapshot")
            .field("action", &self.action)
            .field("fields", &self.names().collect::<Vec<_>>())
            .finish()
    }
}

/// Filled-in login form, ready to be posted. `Debug` shows field names only.
#[derive(Clone)]
pub struct FormFields(Vec<(String, String)>);

impl FormFields {
    pub fn as_slice(&self) -> &[(String, String)] {
        &self.0
    }
}

impl fmt::Debug for FormFields {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.0.iter().map(|(name, _)| name))
            .finish()
    }
}
