//! Check that a session can actually read Plus articles.
//!
//! A known Plus article is requested and the response is classified:
//!
//! 1. final URL contains `login` → [`AccessStatus::LoginRedirect`]
//! 2. body mentions both `golem plus` and `anmelden` → [`AccessStatus::Paywall`]
//! 3. body shows the consent wall (`bereits pur-leser`, `cookies zustimmen`)
//!    → the account page decides between [`AccessStatus::Expired`] and
//!    [`AccessStatus::Granted`]
//! 4. anything else → [`AccessStatus::Granted`]

use super::Fetcher;
use crate::config::{SiteRules, Timing};
use crate::error::Result;
use std::fmt;
use tracing::{info, instrument, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessStatus {
    Granted,
    LoginRedirect,
    Paywall,
    Expired,
}

impl fmt::Display for AccessStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            AccessStatus::Granted => "Plus articles are accessible",
            AccessStatus::LoginRedirect => "redirected to login page",
            AccessStatus::Paywall => "paywall detected - not logged in",
            AccessStatus::Expired => "session expired - account page redirects to login",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Probe {
    Decided(AccessStatus),
    ConsentWall,
}

fn classify_probe(final_url: &str, body: &str) -> Probe {
    let body = body.to_lowercase();
    if final_url.to_lowercase().contains("login") {
        Probe::Decided(AccessStatus::LoginRedirect)
    } else if body.contains("golem plus") && body.contains("anmelden") {
        Probe::Decided(AccessStatus::Paywall)
    } else if body.contains("bereits pur-leser") || body.contains("cookies zustimmen") {
        Probe::ConsentWall
    } else {
        Probe::Decided(AccessStatus::Granted)
    }
}

/// Probe the site and report whether the session can read Plus content.
#[instrument(level = "info", skip_all, fields(probe = %rules.probe_article_url))]
pub async fn verify_access<F: Fetcher>(
    fetcher: &F,
    rules: &SiteRules,
    timing: &Timing,
) -> Result<AccessStatus> {
    let probe = fetcher
        .get(&rules.probe_article_url, timing.page_timeout)
        .await?;

    let status = match classify_probe(&probe.url, &probe.text()) {
        Probe::Decided(status) => status,
        Probe::ConsentWall => {
            info!("Consent page shown; checking account page");
            let account = fetcher.get(&rules.account_url, timing.page_timeout).await?;
            if account.url.to_lowercase().contains("login") {
                AccessStatus::Expired
            } else {
                AccessStatus::Granted
            }
        }
    };

    if status == AccessStatus::Granted {
        info!(%status, "Session valid");
    } else {
        warn!(%status, "Session cannot read Plus articles");
    }
    Ok(status)
}
