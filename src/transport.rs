use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::HeaderMap;
use reqwest::StatusCode;
use url::Url;

/// Error reported by a [`Transport`].
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// A fetched page, after all transport-level redirects were followed.
#[derive(Debug, Clone)]
pub struct Page {
    /// Final URL, used as the base for relative redirect targets.
    pub url: Url,
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: String,
}

impl Page {
    /// Returns the value of header `name` if it is present and valid text.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|value| value.to_str().ok())
    }
}

/// HTTP capabilities the login flow and the data queries need.
///
/// Implementations keep one cookie jar for their whole lifetime and follow
/// transport-level redirects themselves.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(&self, url: Url) -> Result<Page, BoxError>;

    /// Post `form` url-encoded, with the extra `headers`.
    async fn post_form(
        &self,
        url: Url,
        headers: &[(String, String)],
        form: &[(String, String)],
    ) -> Result<Page, BoxError>;
}

/// [`Transport`] on top of a cookie-storing `reqwest` client.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    /// Create a transport with an empty cookie jar.
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .cookie_store(true)
            .timeout(timeout)
            .build()?;

        Ok(Self { client })
    }

    async fn read(response: reqwest::Response) -> Result<Page, BoxError> {
        let url = response.url().clone();
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.text().await?;

        tracing::debug!(%url, %status, body_len = body.len(), "received page");

        Ok(Page {
            url,
            status,
            headers,
            body,
        })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(&self, url: Url) -> Result<Page, BoxError> {
        tracing::debug!(%url, "GET");
        let response = self.client.get(url).send().await?;

        Self::read(response).await
    }

    async fn post_form(
        &self,
        url: Url,
        headers: &[(String, String)],
        form: &[(String, String)],
    ) -> Result<Page, BoxError> {
        tracing::debug!(%url, "POST");
        let request = headers
            .iter()
            .fold(self.client.post(url).form(form), |request, (name, value)| {
                request.header(name.as_str(), value.as_str())
            });
        let response = request.send().await?;

        Self::read(response).await
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Scripted transport replaying canned pages.

    use std::collections::VecDeque;
    use std::sync::Mutex;

    use reqwest::header::{HeaderName, HeaderValue};

    use super::*;

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum Method {
        Get,
        Post,
    }

    #[derive(Debug, Clone)]
    pub struct Request {
        pub method: Method,
        pub url: Url,
        pub headers: Vec<(String, String)>,
        pub form: Vec<(String, String)>,
    }

    /// What the transport answers to the next request.
    pub struct Reply {
        redirected_to: Option<Url>,
        status: StatusCode,
        headers: HeaderMap,
        body: String,
        failure: Option<String>,
    }

    impl Reply {
        pub fn html(body: impl Into<String>) -> Self {
            Self {
                redirected_to: None,
                status: StatusCode::OK,
                headers: HeaderMap::new(),
                body: body.into(),
                failure: None,
            }
        }

        pub fn fail(message: &str) -> Self {
            Self {
                failure: Some(message.to_owned()),
                ..Self::html("")
            }
        }

        /// Pretend a transport-level redirect ended at `url`.
        pub fn redirected_to(mut self, url: &str) -> Self {
            self.redirected_to = Some(url.parse().unwrap());
            self
        }

        pub fn header(mut self, name: &'static str, value: &str) -> Self {
            self.headers.insert(
                HeaderName::from_static(name),
                HeaderValue::from_str(value).unwrap(),
            );
            self
        }

        pub fn status(mut self, status: StatusCode) -> Self {
            self.status = status;
            self
        }
    }

    pub struct ScriptedTransport {
        replies: Mutex<VecDeque<Reply>>,
        requests: Mutex<Vec<Request>>,
    }

    impl ScriptedTransport {
        pub fn new(replies: impl IntoIterator<Item = Reply>) -> Self {
            Self {
                replies: Mutex::new(replies.into_iter().collect()),
                requests: Mutex::default(),
            }
        }

        pub fn requests(&self) -> Vec<Request> {
            self.requests.lock().unwrap().clone()
        }

        pub fn urls(&self) -> Vec<String> {
            self.requests()
                .into_iter()
                .map(|request| request.url.to_string())
                .collect()
        }

        fn answer(&self, request: Request) -> Result<Page, BoxError> {
            let url = request.url.clone();
            self.requests.lock().unwrap().push(request);
            let reply = self
                .replies
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| format!("no scripted reply for {url}"))?;

            if let Some(message) = reply.failure {
                return Err(message.into());
            }

            Ok(Page {
                url: reply.redirected_to.unwrap_or(url),
                status: reply.status,
                headers: reply.headers,
                body: reply.body,
            })
        }
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        async fn get(&self, url: Url) -> Result<Page, BoxError> {
            self.answer(Request {
                method: Method::Get,
                url,
                headers: Vec::new(),
                form: Vec::new(),
            })
        }

        async fn post_form(
            &self,
            url: Url,
            headers: &[(String, String)],
            form: &[(String, String)],
        ) -> Result<Page, BoxError> {
            self.answer(Request {
                method: Method::Post,
                url,
                headers: headers.to_vec(),
                form: form.to_vec(),
            })
        }
    }
}
