// Request engine: builds the authenticated form request and drives it
// through the provider's redirect and re-authentication behavior. Kept
// synchronous on purpose; one round trip is in flight at a time.
//
// Nothing in here touches global state. The transport, credential store and
// diagnostics sink are all injected, so tests can script every round trip.

use std::collections::BTreeMap;
use std::time::Duration;

use anyhow::{Context, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use log::info;
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE, LOCATION};
use reqwest::{Method, StatusCode};
use url::Url;

use crate::error::{ExecError, TransportError};
use crate::keychain::CredentialStore;

/// Bitbucket v1 endpoint the `create` command posts to.
pub const REPOSITORIES_URL: &str = "https://api.bitbucket.org/1.0/repositories";
/// Hostname credentials are stored under.
pub const CREDENTIAL_HOST: &str = "bitbucket.org";

/// Hop budget shared by redirects and 401 retries (combined, not each).
const MAX_HOPS: usize = 5;

/// A single ready-to-send form request.
///
/// Built once per [`Executor::exec`] call. Only `url` and `host` change
/// afterwards, in place, when a redirect is followed; method, body and
/// headers ride along unchanged.
#[derive(Debug, Clone)]
pub struct OutboundRequest {
    pub method: Method,
    pub url: Url,
    /// Host of the form receiver, kept in sync with `url` across redirects.
    pub host: String,
    pub headers: HeaderMap,
    /// URL-encoded form body.
    pub body: String,
    /// Per-attempt deadline applied by the transport.
    pub timeout: Option<Duration>,
}

/// A response with its body already read in full, so no connection is held
/// open while the executor decides what to do next.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: String,
}

/// One blocking HTTP round trip.
///
/// Implementations must not follow redirects themselves; the executor owns
/// that behavior.
pub trait Transport {
    fn send(&self, request: &OutboundRequest) -> Result<HttpResponse, TransportError>;
}

impl<T: Transport + ?Sized> Transport for &T {
    fn send(&self, request: &OutboundRequest) -> Result<HttpResponse, TransportError> {
        (**self).send(request)
    }
}

/// Receives a dump of every request/response pair attempted, so an operator
/// can see each hop. Write-only; the format only has to be human-readable.
pub trait DiagnosticsSink {
    fn record_request(&mut self, request: &OutboundRequest);
    fn record_response(&mut self, response: &HttpResponse);
}

impl<D: DiagnosticsSink + ?Sized> DiagnosticsSink for &mut D {
    fn record_request(&mut self, request: &OutboundRequest) {
        (**self).record_request(request);
    }

    fn record_response(&mut self, response: &HttpResponse) {
        (**self).record_response(response);
    }
}

/// URL-encode the form fields. Keys come out of the `BTreeMap` sorted, so
/// the same field set always produces the same byte sequence.
pub fn encode_form(fields: &BTreeMap<String, String>) -> String {
    let mut serializer = url::form_urlencoded::Serializer::new(String::new());
    for (key, value) in fields {
        serializer.append_pair(key, value);
    }
    serializer.finish()
}

/// Assemble the signed request: URL-encoded body, content type, and basic
/// auth fetched from the credential store for `hostname`. No network I/O
/// happens here.
pub fn build_request(
    method: &str,
    url: &str,
    hostname: &str,
    fields: &BTreeMap<String, String>,
    store: &dyn CredentialStore,
    timeout: Option<Duration>,
) -> Result<OutboundRequest, ExecError> {
    if method.is_empty() || url.is_empty() {
        return Err(ExecError::RequestConstruction {
            reason: "method and URL must be non-empty".into(),
        });
    }
    let method = Method::from_bytes(method.as_bytes()).map_err(|_| {
        ExecError::RequestConstruction {
            reason: format!("unknown HTTP method `{method}`"),
        }
    })?;
    let url = Url::parse(url).map_err(|err| ExecError::RequestConstruction {
        reason: format!("malformed URL `{url}`: {err}"),
    })?;
    let host = url.host_str().unwrap_or_default().to_string();

    let credential = store
        .lookup(hostname)
        .map_err(|source| ExecError::CredentialLookup {
            hostname: hostname.to_string(),
            source,
        })?;

    let mut headers = HeaderMap::new();
    headers.insert(
        CONTENT_TYPE,
        HeaderValue::from_static("application/x-www-form-urlencoded"),
    );
    let token = BASE64.encode(format!("{}:{}", credential.username, credential.password));
    let mut auth =
        HeaderValue::from_str(&format!("Basic {token}")).map_err(|err| {
            ExecError::RequestConstruction {
                reason: format!("credential is not header-safe: {err}"),
            }
        })?;
    // Marked sensitive so hop dumps and debug output show it redacted.
    auth.set_sensitive(true);
    headers.insert(AUTHORIZATION, auth);

    Ok(OutboundRequest {
        method,
        url,
        host,
        headers,
        body: encode_form(fields),
        timeout,
    })
}

/// Statuses the executor re-issues for: the redirect family the provider
/// uses (301 through 307 inclusive, as the original tool checked) plus 401.
fn wants_retry(status: StatusCode) -> bool {
    (301..=307).contains(&status.as_u16()) || status == StatusCode::UNAUTHORIZED
}

/// Drives a built request to a terminal response, following up to
/// [`MAX_HOPS`] redirect/re-auth hops.
pub struct Executor<T, C, D> {
    transport: T,
    credentials: C,
    diagnostics: D,
    timeout: Option<Duration>,
}

impl<T, C, D> Executor<T, C, D>
where
    T: Transport,
    C: CredentialStore,
    D: DiagnosticsSink,
{
    pub fn new(transport: T, credentials: C, diagnostics: D) -> Self {
        Self {
            transport,
            credentials,
            diagnostics,
            timeout: None,
        }
    }

    /// Apply a per-attempt deadline to every request this executor sends.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Build the signed form request for `fields` and submit it,
    /// transparently following a bounded number of redirects and 401
    /// challenges.
    ///
    /// A response is returned even when its status signals failure; deciding
    /// what a non-success status means is the caller's job. This includes
    /// the case where the hop budget runs out while the provider is still
    /// redirecting: the last response comes back as-is, without an error.
    pub fn exec(
        &mut self,
        method: &str,
        url: &str,
        hostname: &str,
        fields: &BTreeMap<String, String>,
    ) -> Result<HttpResponse, ExecError> {
        let mut request =
            build_request(method, url, hostname, fields, &self.credentials, self.timeout)?;
        let mut response = self.transport.send(&request)?;

        // A hard client/server error on the first exchange is terminal.
        // Dump it for the operator and hand the status back untouched.
        if response.status.as_u16() >= 400 && !wants_retry(response.status) {
            self.diagnostics.record_response(&response);
            return Ok(response);
        }

        // Redirects and 401 retries share this one budget.
        for _ in 0..MAX_HOPS {
            if !wants_retry(response.status) {
                break;
            }
            if response.status != StatusCode::UNAUTHORIZED {
                follow_redirect(&mut request, &response)?;
            }
            // On 401 the request is re-issued untouched: same URL, same
            // auth header. No fresh credential lookup happens, so this can
            // only succeed if the provider's state changed in between.
            info!("retrying after {} at {}", response.status, request.url);
            self.diagnostics.record_request(&request);
            response = self.transport.send(&request)?;
            self.diagnostics.record_response(&response);
        }

        Ok(response)
    }
}

/// Point `request` at the `Location` named by a redirect response, keeping
/// method, body and headers intact. A redirect without a usable location is
/// a hard error, never silently ignored.
fn follow_redirect(
    request: &mut OutboundRequest,
    response: &HttpResponse,
) -> Result<(), ExecError> {
    let status = response.status.as_u16();
    let location = response
        .headers
        .get(LOCATION)
        .and_then(|value| value.to_str().ok())
        .ok_or(ExecError::RedirectResolution { status })?;
    // Location may be relative; resolve it against the current URL.
    let target = request
        .url
        .join(location)
        .map_err(|_| ExecError::RedirectResolution { status })?;
    request.host = target.host_str().unwrap_or_default().to_string();
    request.url = target;
    Ok(())
}

/// Production transport on top of reqwest's blocking client. Redirect
/// following is disabled so every hop passes through the executor.
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self { client })
    }
}

impl Transport for ReqwestTransport {
    fn send(&self, request: &OutboundRequest) -> Result<HttpResponse, TransportError> {
        let mut builder = self
            .client
            .request(request.method.clone(), request.url.clone())
            .headers(request.headers.clone())
            .body(request.body.clone());
        if let Some(timeout) = request.timeout {
            builder = builder.timeout(timeout);
        }
        let response = builder.send().map_err(|err| TransportError::Network {
            url: request.url.to_string(),
            source: Box::new(err),
        })?;
        let status = response.status();
        let headers = response.headers().clone();
        // Reading the body to completion releases the connection whichever
        // way the caller goes from here.
        let body = response.text().map_err(|err| TransportError::Body {
            url: request.url.to_string(),
            source: Box::new(err),
        })?;
        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}
