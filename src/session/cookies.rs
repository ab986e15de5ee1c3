//! Import of cookie exports from a regular browser.
//!
//! Two JSON layouts are accepted, matching what common cookie-export browser
//! extensions produce:
//!
//! ```json
//! [{"name": "golem_session", "value": "…", "domain": ".golem.de", "path": "/"}]
//! ```
//!
//! ```json
//! {"golem_session": "…", "consent": "yes"}
//! ```
//!
//! Missing domains default to the site's cookie domain and missing paths to `/`.

use crate::config::SiteRules;
use crate::error::{Result, ScrapeError};
use serde::Deserialize;
use std::collections::BTreeMap;
use tracing::{info, instrument};
use url::Url;

/// A cookie ready to be installed in the session jar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cookie {
    pub name: String,
    pub value: String,
    pub domain: String,
    pub path: String,
}

impl Cookie {
    pub fn new(name: &str, value: &str, domain: &str, path: &str) -> Self {
        Self {
            name: name.to_string(),
            value: value.to_string(),
            domain: domain.to_string(),
            path: path.to_string(),
        }
    }

    /// `Set-Cookie` header value understood by the reqwest cookie jar.
    pub fn to_set_cookie(&self) -> String {
        format!(
            "{}={}; Domain={}; Path={}",
            self.name, self.value, self.domain, self.path
        )
    }

    /// URL the cookie is scoped to, used as the origin when storing it.
    pub fn origin(&self) -> std::result::Result<Url, url::ParseError> {
        Url::parse(&format!("https://{}/", self.domain.trim_start_matches('.')))
    }
}

#[derive(Debug, Deserialize)]
struct ExportedCookie {
    name: String,
    value: String,
    domain: Option<String>,
    path: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum CookieExport {
    List(Vec<ExportedCookie>),
    Map(BTreeMap<String, String>),
}

/// Parse a cookie export; `default_domain` fills in missing domains.
pub fn parse_cookie_export(
    json: &str,
    default_domain: &str,
) -> std::result::Result<Vec<Cookie>, serde_json::Error> {
    let cookies = match serde_json::from_str::<CookieExport>(json)? {
        CookieExport::List(list) => list
            .into_iter()
            .map(|c| Cookie {
                name: c.name,
                value: c.value,
                domain: c
                    .domain
                    .filter(|d| !d.is_empty())
                    .unwrap_or_else(|| default_domain.to_string()),
                path: c.path.filter(|p| !p.is_empty()).unwrap_or_else(|| "/".to_string()),
            })
            .collect(),
        CookieExport::Map(map) => map
            .into_iter()
            .map(|(name, value)| Cookie::new(&name, &value, default_domain, "/"))
            .collect(),
    };
    Ok(cookies)
}

/// Read and parse a cookie export file.
#[instrument(level = "info", skip(rules))]
pub async fn load_cookie_file(path: &str, rules: &SiteRules) -> Result<Vec<Cookie>> {
    let json = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| ScrapeError::CookieFile {
            path: path.to_string(),
            reason: e.to_string(),
        })?;
    let cookies =
        parse_cookie_export(&json, &rules.default_cookie_domain).map_err(|e| {
            ScrapeError::CookieFile {
                path: path.to_string(),
                reason: e.to_string(),
            }
        })?;
    info!(count = cookies.len(), "Loaded cookies from file");
    Ok(cookies)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    #[test]
    fn test_parse_list_export() {
        let json = r#"[
            {"name": "session", "value": "abc", "domain": "account.golem.de", "path": "/user", "httpOnly": true},
            {"name": "consent", "value": "yes"}
        ]"#;
        let cookies = parse_cookie_export(json, ".golem.de").unwrap();
        assert_eq!(
            cookies,
            vec![
                Cookie::new("session", "abc", "account.golem.de", "/user"),
                Cookie::new("consent", "yes", ".golem.de", "/"),
            ]
        );
    }

    #[test]
    fn test_parse_map_export() {
        let json = r#"{"b": "2", "a": "1"}"#;
        let cookies = parse_cookie_export(json, ".golem.de").unwrap();
        assert_eq!(
            cookies,
            vec![
                Cookie::new("a", "1", ".golem.de", "/"),
                Cookie::new("b", "2", ".golem.de", "/"),
            ]
        );
    }

    #[test]
    fn test_parse_rejects_other_shapes() {
        assert!(parse_cookie_export("42", ".golem.de").is_err());
        assert!(parse_cookie_export("not json", ".golem.de").is_err());
    }

    #[test]
    fn test_cookie_origin_and_header() {
        let cookie = Cookie::new("s", "v", ".golem.de", "/");
        assert_eq!(cookie.origin().unwrap().as_str(), "https://golem.de/");
        assert_eq!(cookie.to_set_cookie(), "s=v; Domain=.golem.de; Path=/");
    }

    #[tokio::test]
    async fn test_load_cookie_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"golem_session": "abc"}}"#).unwrap();
        let path = file.path().to_str().unwrap().to_string();

        let cookies = load_cookie_file(&path, &SiteRules::default()).await.unwrap();
        assert_eq!(cookies, vec![Cookie::new("golem_session", "abc", ".golem.de", "/")]);
    }

    #[tokio::test]
    async fn test_load_missing_cookie_file() {
        let err = load_cookie_file("/nonexistent/cookies.json", &SiteRules::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ScrapeError::CookieFile { .. }));
    }
}
