use openidconnect::{HttpRequest, HttpResponse};
use reqwest::redirect::Policy;
use std::time::Duration;

/// Outbound client for discovery, key fetching and code exchange.
///
/// Redirects are not followed and every request is bounded by the configured timeout.
#[derive(Clone, Debug)]
pub(crate) struct HttpClient {
    inner: reqwest::Client,
}

impl HttpClient {
    pub(crate) fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let inner = reqwest::Client::builder()
            .redirect(Policy::none())
            .timeout(timeout)
            .build()?;
        Ok(Self { inner })
    }

    pub(crate) async fn execute(self, request: HttpRequest) -> Result<HttpResponse, reqwest::Error> {
        log::debug!("{} {}", request.method, request.url);

        let request = self
            .inner
            .request(request.method, request.url.as_str())
            .headers(request.headers)
            .body(request.body)
            .build()?;
        let response = self.inner.execute(request).await?;

        let status_code = response.status();
        let headers = response.headers().to_owned();
        let body = response.bytes().await?;

        Ok(HttpResponse {
            status_code,
            headers,
            body: body.to_vec(),
        })
    }
}
