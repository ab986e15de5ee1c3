//! HTTP session used by every stage of the pipeline.
//!
//! The pipeline never talks to `reqwest` directly; it goes through the
//! [`Fetcher`] trait so the scraping logic can be exercised against canned
//! pages in tests.
//!
//! # Providers
//!
//! | Provider | Constructor | Notes |
//! |----------|-------------|-------|
//! | Anonymous | [`Session::anonymous`] | Public articles only |
//! | Cookie export | [`Session::with_cookies`] | Cookies exported from a logged-in browser |
//!
//! Interactive browser login is not performed here. A browser (or a
//! browser-automation tool) logs in, its cookies are exported to JSON, and
//! [`cookies::load_cookie_file`] turns that export into a session.

pub mod access;
pub mod cookies;

use crate::config::SiteRules;
use crate::error::{Result, ScrapeError};
use cookies::Cookie;
use reqwest::cookie::Jar;
use reqwest::header::{self, HeaderMap, HeaderValue};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};

pub use access::{AccessStatus, verify_access};

/// A completed HTTP exchange.
#[derive(Debug, Clone)]
pub struct FetchResponse {
    pub status: u16,
    /// Final URL after redirects.
    pub url: String,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl FetchResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Body decoded as UTF-8, replacing invalid sequences.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Turn a non-2xx response into [`ScrapeError::Status`].
    pub fn error_for_status(self, requested: &str) -> Result<Self> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(ScrapeError::Status {
                url: requested.to_string(),
                status: self.status,
            })
        }
    }
}

/// Anything that can perform a GET request with a per-request timeout.
pub trait Fetcher {
    /// Fetch `url`. Transport failures are errors; non-2xx statuses are not,
    /// callers decide what a status means for them.
    async fn get(&self, url: &str, timeout: Duration) -> Result<FetchResponse>;
}

/// `reqwest`-backed session, optionally carrying authentication cookies.
#[derive(Debug, Clone)]
pub struct Session {
    client: reqwest::Client,
    authenticated: bool,
}

impl Session {
    /// A session without cookies.
    pub fn anonymous() -> Result<Self> {
        Ok(Self {
            client: build_client(None)?,
            authenticated: false,
        })
    }

    /// A session carrying the cookies whose domain belongs to the site.
    #[instrument(level = "info", skip_all, fields(cookies = cookies.len()))]
    pub fn with_cookies(cookies: &[Cookie], rules: &SiteRules) -> Result<Self> {
        let jar = Jar::default();
        let mut installed = 0usize;
        for cookie in cookies.iter().filter(|c| c.domain.contains(&rules.cookie_domain)) {
            match cookie.origin() {
                Ok(origin) => {
                    jar.add_cookie_str(&cookie.to_set_cookie(), &origin);
                    installed += 1;
                }
                Err(e) => warn!(name = %cookie.name, domain = %cookie.domain, error = %e, "Skipping cookie with unusable domain"),
            }
        }
        info!(installed, domain = %rules.cookie_domain, "Installed session cookies");

        Ok(Self {
            client: build_client(Some(Arc::new(jar)))?,
            authenticated: true,
        })
    }

    pub fn is_authenticated(&self) -> bool {
        self.authenticated
    }
}

impl Fetcher for Session {
    #[instrument(level = "debug", skip(self), fields(%url))]
    async fn get(&self, url: &str, timeout: Duration) -> Result<FetchResponse> {
        let t0 = Instant::now();
        let http_err = |source| ScrapeError::Http {
            url: url.to_string(),
            source,
        };

        let response = self
            .client
            .get(url)
            .timeout(timeout)
            .send()
            .await
            .map_err(http_err)?;

        let status = response.status().as_u16();
        let final_url = response.url().to_string();
        let headers = response.headers().clone();
        let body = response.bytes().await.map_err(http_err)?.to_vec();

        debug!(
            status,
            final_url = %final_url,
            bytes = body.len(),
            elapsed_ms = t0.elapsed().as_millis() as u64,
            "GET finished"
        );

        Ok(FetchResponse {
            status,
            url: final_url,
            headers,
            body,
        })
    }
}

fn browser_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        header::USER_AGENT,
        HeaderValue::from_static(
            "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
        ),
    );
    headers.insert(
        header::ACCEPT,
        HeaderValue::from_static(
            "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,image/apng,*/*;q=0.8",
        ),
    );
    headers.insert(
        header::ACCEPT_LANGUAGE,
        HeaderValue::from_static("de-DE,de;q=0.9,en-US;q=0.8,en;q=0.7"),
    );
    headers.insert(header::DNT, HeaderValue::from_static("1"));
    headers.insert(
        header::UPGRADE_INSECURE_REQUESTS,
        HeaderValue::from_static("1"),
    );
    headers.insert("sec-fetch-dest", HeaderValue::from_static("document"));
    headers.insert("sec-fetch-mode", HeaderValue::from_static("navigate"));
    headers.insert("sec-fetch-site", HeaderValue::from_static("none"));
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("max-age=0"));
    headers
}

fn build_client(jar: Option<Arc<Jar>>) -> Result<reqwest::Client> {
    let mut builder = reqwest::Client::builder()
        .default_headers(browser_headers())
        .gzip(true)
        .redirect(reqwest::redirect::Policy::limited(10));
    if let Some(jar) = jar {
        builder = builder.cookie_provider(jar);
    }
    builder.build().map_err(ScrapeError::Client)
}
