// SPDX-License-Identifier: GPL-3.0-only
// Copyright (C) 2025 Brian Hetro <whee@smaertness.net>

//! Fetching share pages over HTTP.
//!
//! Share pages sit behind bot protection that rejects requests that do not
//! look like a desktop browser navigation, so every request carries the
//! header set of a Chrome page load. Transient failures (timeouts, refused
//! connections, gateway errors) are retried a bounded number of times.

use crate::diagnostics::{Diagnostics, diag};
use reqwest::StatusCode;
use reqwest::blocking::{Client, Response};
use reqwest::header::{
    ACCEPT, ACCEPT_LANGUAGE, CACHE_CONTROL, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue,
    PRAGMA, REFERER, UPGRADE_INSECURE_REQUESTS, USER_AGENT,
};
use snafu::prelude::*;
use std::thread;
use std::time::Duration;

/// Default request deadline.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default number of retries after the first attempt.
pub const DEFAULT_RETRIES: u32 = 2;

/// Default pause between attempts.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(1);

const MAX_REDIRECTS: usize = 5;

const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/118.0.0.0 Safari/537.36";

const BROWSER_ACCEPT: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,\
     image/avif,image/webp,image/apng,*/*;q=0.8";

const SHARE_REFERER: &str = "https://chatgpt.com/";

/// Extra explanation for 403 responses.
const FORBIDDEN_HINT: &str = "the request was likely blocked by anti-bot protection; \
     datacenter and VPN addresses are often refused, try again from another network";

/// Options for [`fetch_html`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchOptions {
    /// Deadline for each attempt, connection through body.
    pub timeout: Duration,
    /// How many times a transient failure is retried.
    pub retries: u32,
    /// Pause between attempts.
    pub retry_delay: Duration,
    /// Headers replacing or extending the browser header set.
    pub header_overrides: Vec<(String, String)>,
    /// Diagnostic logging level.
    pub diagnostics: Diagnostics,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            retries: DEFAULT_RETRIES,
            retry_delay: DEFAULT_RETRY_DELAY,
            header_overrides: Vec::new(),
            diagnostics: Diagnostics::Off,
        }
    }
}

/// Error type for page fetching.
#[derive(Debug, Snafu)]
pub enum FetchError {
    /// The HTTP client could not be constructed.
    #[snafu(display("failed to build HTTP client: {source}"))]
    Client {
        /// The underlying client error.
        source: reqwest::Error,
    },

    /// A header override has an invalid name or value.
    #[snafu(display("invalid header override '{name}'"))]
    InvalidHeader {
        /// The header name as given.
        name: String,
    },

    /// The request failed before a response arrived.
    #[snafu(display("request to {url} failed: {source}"))]
    Request {
        /// The requested URL.
        url: String,
        /// The underlying transport error.
        source: reqwest::Error,
    },

    /// The server answered with a non-success status.
    #[snafu(display("HTTP {status} from {url}{}", hint.map(|h| format!(" ({h})")).unwrap_or_default()))]
    Status {
        /// The requested URL.
        url: String,
        /// The response status.
        status: StatusCode,
        /// What the status usually means for share pages.
        hint: Option<&'static str>,
    },

    /// The response is not an HTML document.
    #[snafu(display("{url} returned '{content_type}' instead of HTML"))]
    NotHtml {
        /// The requested URL.
        url: String,
        /// The `Content-Type` header received.
        content_type: String,
    },

    /// The response body could not be read.
    #[snafu(display("failed to read response body from {url}: {source}"))]
    Body {
        /// The requested URL.
        url: String,
        /// The underlying transport error.
        source: reqwest::Error,
    },
}

impl FetchError {
    /// Returns `true` if another attempt may succeed.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Request { source, .. } | Self::Body { source, .. } => {
                source.is_timeout() || source.is_connect()
            }
            Self::Status { status, .. } => is_transient_status(*status),
            _ => false,
        }
    }
}

/// Fetches the HTML of a share page.
///
/// # Errors
///
/// Returns a [`FetchError`] when the request fails, the status is not a
/// success, the response is not HTML, or the body cannot be decoded. Transient
/// failures are retried up to [`FetchOptions::retries`] times first.
pub fn fetch_html(url: &str, opts: &FetchOptions) -> Result<String, FetchError> {
    let client = Client::builder()
        .default_headers(build_headers(&opts.header_overrides)?)
        .timeout(opts.timeout)
        .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
        .build()
        .context(ClientSnafu)?;

    let mut attempt = 0;
    loop {
        attempt += 1;
        diag!(opts.diagnostics, attempt, "fetching share page");

        match fetch_once(&client, url) {
            Ok(html) => {
                diag!(opts.diagnostics, attempt, bytes = html.len(), "fetched share page");
                return Ok(html);
            }
            Err(e) if e.is_transient() && attempt <= opts.retries => {
                diag!(opts.diagnostics, attempt, error = %e, "transient fetch failure, retrying");
                thread::sleep(opts.retry_delay);
            }
            Err(e) => {
                diag!(opts.diagnostics, attempt, error = %e, "fetch failed");
                return Err(e);
            }
        }
    }
}

fn fetch_once(client: &Client, url: &str) -> Result<String, FetchError> {
    let response = client.get(url).send().context(RequestSnafu { url })?;

    let status = response.status();
    ensure!(
        status.is_success(),
        StatusSnafu {
            url,
            status,
            hint: (status == StatusCode::FORBIDDEN).then_some(FORBIDDEN_HINT),
        }
    );

    if let Some(content_type) = header_str(&response, &CONTENT_TYPE) {
        ensure!(
            is_html_content_type(content_type),
            NotHtmlSnafu { url, content_type }
        );
    }

    response.text().context(BodySnafu { url })
}

fn header_str<'a>(response: &'a Response, name: &HeaderName) -> Option<&'a str> {
    response.headers().get(name).and_then(|v| v.to_str().ok())
}

/// Builds the browser header set with `overrides` applied on top.
///
/// # Errors
///
/// Returns [`FetchError::InvalidHeader`] if an override is not a valid header.
pub fn build_headers(overrides: &[(String, String)]) -> Result<HeaderMap, FetchError> {
    let mut headers = HeaderMap::new();
    headers.insert(USER_AGENT, HeaderValue::from_static(BROWSER_USER_AGENT));
    headers.insert(
        HeaderName::from_static("sec-ch-ua"),
        HeaderValue::from_static(r#""Chromium";v="118", "Not=A?Brand";v="24""#),
    );
    headers.insert(
        HeaderName::from_static("sec-ch-ua-mobile"),
        HeaderValue::from_static("?0"),
    );
    headers.insert(
        HeaderName::from_static("sec-ch-ua-platform"),
        HeaderValue::from_static(r#""Windows""#),
    );
    headers.insert(ACCEPT, HeaderValue::from_static(BROWSER_ACCEPT));
    headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));
    headers.insert(UPGRADE_INSECURE_REQUESTS, HeaderValue::from_static("1"));
    for (name, value) in [
        ("sec-fetch-dest", "document"),
        ("sec-fetch-mode", "navigate"),
        ("sec-fetch-site", "none"),
        ("sec-fetch-user", "?1"),
    ] {
        headers.insert(HeaderName::from_static(name), HeaderValue::from_static(value));
    }
    headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    headers.insert(PRAGMA, HeaderValue::from_static("no-cache"));
    headers.insert(REFERER, HeaderValue::from_static(SHARE_REFERER));

    for (name, value) in overrides {
        let header_name = HeaderName::from_bytes(name.as_bytes())
            .ok()
            .context(InvalidHeaderSnafu { name })?;
        let header_value = HeaderValue::from_str(value)
            .ok()
            .context(InvalidHeaderSnafu { name })?;
        headers.insert(header_name, header_value);
    }

    Ok(headers)
}

/// Returns `true` for `text/html` and XHTML content types.
#[must_use]
pub fn is_html_content_type(content_type: &str) -> bool {
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    mime == "text/html" || mime == "application/xhtml+xml"
}

/// Returns `true` for gateway and availability errors worth retrying.
#[must_use]
pub fn is_transient_status(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::BAD_GATEWAY | StatusCode::SERVICE_UNAVAILABLE | StatusCode::GATEWAY_TIMEOUT
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn browser_headers_are_present() {
        let headers = build_headers(&[]).unwrap();

        assert!(headers[USER_AGENT].to_str().unwrap().contains("Chrome/118"));
        assert_eq!(headers[REFERER], "https://chatgpt.com/");
        assert_eq!(headers["sec-fetch-mode"], "navigate");
        assert_eq!(headers[CACHE_CONTROL], "no-cache");
    }

    #[test]
    fn overrides_replace_defaults() {
        let overrides = vec![
            ("Accept-Language".to_owned(), "de-DE".to_owned()),
            ("X-Debug".to_owned(), "1".to_owned()),
        ];

        let headers = build_headers(&overrides).unwrap();

        assert_eq!(headers[ACCEPT_LANGUAGE], "de-DE");
        assert_eq!(headers["x-debug"], "1");
    }

    #[test]
    fn invalid_override_is_error() {
        let overrides = vec![("bad header".to_owned(), "x".to_owned())];
        assert!(matches!(
            build_headers(&overrides),
            Err(FetchError::InvalidHeader { .. })
        ));
    }

    #[test]
    fn recognises_html_content_types() {
        assert!(is_html_content_type("text/html"));
        assert!(is_html_content_type("text/html; charset=utf-8"));
        assert!(is_html_content_type("application/xhtml+xml"));
        assert!(!is_html_content_type("application/json"));
    }

    #[test]
    fn gateway_errors_are_transient() {
        assert!(is_transient_status(StatusCode::BAD_GATEWAY));
        assert!(is_transient_status(StatusCode::GATEWAY_TIMEOUT));
        assert!(!is_transient_status(StatusCode::NOT_FOUND));
        assert!(!is_transient_status(StatusCode::FORBIDDEN));
    }

    #[test]
    fn forbidden_status_carries_hint() {
        let err = FetchError::Status {
            url: "https://chatgpt.com/share/x".into(),
            status: StatusCode::FORBIDDEN,
            hint: Some(FORBIDDEN_HINT),
        };

        let message = err.to_string();
        assert!(message.starts_with("HTTP 403 Forbidden from https://chatgpt.com/share/x"));
        assert!(message.contains("anti-bot"));
        assert!(!err.is_transient());
    }
}
