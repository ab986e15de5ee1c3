//! Command-line interface definitions for Golem Reader.
//!
//! This module defines the CLI arguments and options using the `clap` crate.
//! The cookie file can also be supplied through the `GOLEM_COOKIES`
//! environment variable.

use clap::Parser;

/// Topic value that switches from the RSS feed to the Plus archive listing.
pub const ARCHIVE_TOPIC: &str = "plus-archive";

/// Command-line arguments for the Golem Reader application.
///
/// # Examples
///
/// ```sh
/// # Download 10 security articles
/// golem_reader security -n 10 --cookies cookies.json
///
/// # Download 20 articles from the Plus archive
/// golem_reader plus-archive -n 20 --cookies cookies.json
///
/// # Public articles only, custom file name
/// golem_reader --no-login -o custom.epub
///
/// # Only list what would be downloaded
/// golem_reader ki --no-login --list-only
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Topic to download (e.g. security, softwareentwicklung, ki); use
    /// "plus-archive" for all Golem Plus articles
    #[arg(default_value = "softwareentwicklung")]
    pub topic: String,

    /// Output EPUB file name (default: golem_{topic}_{timestamp}.epub)
    #[arg(short, long)]
    pub output: Option<String>,

    /// Download directory
    #[arg(short, long, default_value = "downloads")]
    pub download_dir: String,

    /// Maximum number of articles to download (0 for no limit)
    #[arg(short = 'n', long, default_value_t = 1)]
    pub max_articles: usize,

    /// Skip login (for public articles only)
    #[arg(long)]
    pub no_login: bool,

    /// JSON file with cookies exported from a logged-in browser
    #[arg(long, env = "GOLEM_COOKIES")]
    pub cookies: Option<String>,

    /// Optional YAML file overriding the built-in site selectors
    #[arg(long)]
    pub rules: Option<String>,

    /// Do not probe a Plus article to check the session before downloading
    #[arg(long)]
    pub skip_verify: bool,

    /// Enable debug logging
    #[arg(long)]
    pub debug: bool,

    /// Only list articles without downloading them
    #[arg(long)]
    pub list_only: bool,
}

impl Cli {
    pub fn is_archive(&self) -> bool {
        self.topic == ARCHIVE_TOPIC
    }

    /// Article ceiling; `None` when unlimited.
    pub fn max_articles(&self) -> Option<usize> {
        (self.max_articles > 0).then_some(self.max_articles)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::parse_from(["golem_reader"]);

        assert_eq!(cli.topic, "softwareentwicklung");
        assert_eq!(cli.download_dir, "downloads");
        assert_eq!(cli.max_articles(), Some(1));
        assert_eq!(cli.output, None);
        assert!(!cli.is_archive());
        assert!(!cli.no_login && !cli.skip_verify && !cli.debug && !cli.list_only);
    }

    #[test]
    fn test_cli_short_flags() {
        let cli = Cli::parse_from([
            "golem_reader",
            "security",
            "-n",
            "10",
            "-o",
            "custom.epub",
            "-d",
            "/tmp/golem",
        ]);

        assert_eq!(cli.topic, "security");
        assert_eq!(cli.max_articles(), Some(10));
        assert_eq!(cli.output.as_deref(), Some("custom.epub"));
        assert_eq!(cli.download_dir, "/tmp/golem");
    }

    #[test]
    fn test_cli_archive_and_long_flags() {
        let cli = Cli::parse_from([
            "golem_reader",
            "plus-archive",
            "--max-articles",
            "0",
            "--cookies",
            "cookies.json",
            "--rules",
            "rules.yaml",
            "--skip-verify",
            "--debug",
            "--list-only",
        ]);

        assert!(cli.is_archive());
        assert_eq!(cli.max_articles(), None);
        assert_eq!(cli.cookies.as_deref(), Some("cookies.json"));
        assert_eq!(cli.rules.as_deref(), Some("rules.yaml"));
        assert!(cli.skip_verify && cli.debug && cli.list_only);
    }

    #[test]
    fn test_cli_rejects_negative_max() {
        assert!(Cli::try_parse_from(["golem_reader", "-n", "-3"]).is_err());
    }
}
