//! # Golem Reader
//!
//! Downloads articles from Golem.de, including paywalled Golem Plus articles
//! when a logged-in session is available, and packages them as a single EPUB
//! for offline reading on e-readers.
//!
//! ## Features
//!
//! - Resolves a topic RSS feed (or an outline feed) into candidate articles
//! - Crawls the paginated Golem Plus archive when the topic is `plus-archive`
//! - Follows multi-page articles, strips ads, teasers and navigation, and
//!   downloads every referenced image
//! - Writes one EPUB chapter per article with embedded images and a source
//!   attribution
//!
//! ## Usage
//!
//! ```sh
//! golem_reader security -n 10 --cookies cookies.json
//! golem_reader plus-archive -n 20 --cookies cookies.json
//! golem_reader ki --no-login --list-only
//! ```
//!
//! ## Architecture
//!
//! The application follows a pipeline architecture:
//! 1. **Session**: Load exported browser cookies and verify Plus access
//! 2. **Indexing**: Resolve the feed or archive into candidate articles
//! 3. **Fetching**: Download each article (all pages and images), one at a time
//! 4. **Output**: Assemble the chapters and write the EPUB

use chrono::Local;
use clap::Parser;
use std::error::Error;
use std::path::{Path, PathBuf};
use tokio::time::sleep;
use tracing::{debug, error, info, instrument, warn};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod cli;
mod config;
mod error;
mod models;
mod outputs;
mod scrapers;
mod session;
mod utils;

use cli::Cli;
use config::{CompiledRules, SiteRules, Timing};
use error::ScrapeError;
use models::{ExtractedArticle, FeedEntry};
use outputs::{document, epub, listing};
use scrapers::article;
use scrapers::feed::{self, FeedSource};
use session::cookies::load_cookie_file;
use session::{AccessStatus, Fetcher, Session, verify_access};
use utils::{GERMAN_MONTHS, default_output_filename, ensure_writable_dir, truncate_for_log};

/// Label used in the document title for archive runs.
const ARCHIVE_LABEL: &str = "Plus Archive";

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn Error>> {
    let args = Cli::parse();

    // --- Tracing init ---
    let default_level = if args.debug { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!("golem_reader starting up");
    debug!(?args, "Parsed CLI arguments");

    let rules = match &args.rules {
        Some(path) => SiteRules::load(path).await?,
        None => SiteRules::default(),
    };
    let compiled = rules.compile()?;
    let timing = Timing::default();

    // Early check: ensure the download dir is writable
    if !args.list_only {
        if let Err(e) = ensure_writable_dir(&args.download_dir).await {
            error!(
                path = %args.download_dir,
                error = %e,
                "Download directory is not writable (fix perms or choose a different path)"
            );
            return Err(e.into());
        }
    }

    let session = open_session(&args, &rules, &timing).await?;
    info!(authenticated = session.is_authenticated(), "Session ready");

    // ---- Index articles ----
    let source = if args.is_archive() {
        FeedSource::Archive
    } else {
        FeedSource::Feed(rules.feed_url(&args.topic))
    };
    let entries = feed::resolve(&session, &source, args.max_articles(), &compiled, &timing).await?;

    if args.list_only {
        println!("{}", listing::render_listing(&entries, &GERMAN_MONTHS));
        return Ok(());
    }

    // ---- Fetch articles ----
    let run_started = Local::now();
    let articles = download_all(&session, &entries, &compiled, &timing).await;
    let downloaded = articles.iter().flatten().count();

    // ---- Output ----
    let Some(path) = write_output(&args, &rules, &articles, run_started).await? else {
        return Ok(());
    };

    info!(
        downloaded,
        attempted = articles.len(),
        path = %path.display(),
        elapsed_secs = start_time.elapsed().as_secs_f64(),
        "Successfully downloaded articles"
    );
    Ok(())
}

/// Download every entry in order, one at a time.
///
/// A failed article leaves a `None` hole at its position; the run goes on
/// with the next entry.
#[instrument(level = "info", skip_all, fields(total = entries.len()))]
async fn download_all<F: Fetcher>(
    fetcher: &F,
    entries: &[FeedEntry],
    rules: &CompiledRules,
    timing: &Timing,
) -> Vec<Option<ExtractedArticle>> {
    let total = entries.len();
    info!(count = total, "Downloading articles");

    let mut articles: Vec<Option<ExtractedArticle>> = Vec::with_capacity(total);
    for (i, entry) in entries.iter().enumerate() {
        info!(
            index = i + 1,
            total,
            title = %truncate_for_log(&entry.title, 60),
            url = %entry.url,
            "Downloading article"
        );
        debug!(
            published = ?entry.published,
            summary = ?entry.summary.as_deref().map(|s| truncate_for_log(s, 120)),
            "Feed entry"
        );
        match article::extract(fetcher, &entry.url, rules, timing).await {
            Ok(a) => {
                info!(
                    index = i + 1,
                    pages = a.page_count,
                    images = a.images.len(),
                    author = ?a.author,
                    published = ?a.published,
                    "Downloaded"
                );
                debug!(first_page_bytes = a.first_page().map_or(0, str::len), "Article content");
                articles.push(Some(a));
            }
            Err(e) if e.is_transport() => {
                warn!(index = i + 1, url = %entry.url, error = %e, "Article request failed; skipping article");
                articles.push(None);
            }
            Err(e) => {
                warn!(index = i + 1, url = %entry.url, error = %e, "Article could not be extracted; skipping article");
                articles.push(None);
            }
        }

        // Be polite between articles
        if i + 1 < total {
            sleep(timing.article_delay).await;
        }
    }
    articles
}

/// Build the HTTP session for this run.
///
/// `--no-login` yields an anonymous session; otherwise a cookie file is
/// required and, unless `--skip-verify` is given, must grant Plus access.
#[instrument(level = "info", skip_all, fields(no_login = args.no_login, skip_verify = args.skip_verify))]
async fn open_session(
    args: &Cli,
    rules: &SiteRules,
    timing: &Timing,
) -> Result<Session, Box<dyn Error>> {
    if args.no_login {
        info!("Skipping login; Plus articles will only contain their public part");
        return Ok(Session::anonymous()?);
    }

    let Some(path) = args.cookies.as_deref() else {
        error!("No cookie file given; export your golem.de cookies from a logged-in browser");
        return Err("a cookie file (--cookies) is required unless --no-login is set".into());
    };

    let cookies = load_cookie_file(path, rules).await?;
    let session = Session::with_cookies(&cookies, rules)?;

    if args.skip_verify {
        warn!("Skipping session verification");
        return Ok(session);
    }
    match verify_access(&session, rules, timing).await? {
        AccessStatus::Granted => Ok(session),
        status => {
            error!(%status, "Session cannot read Plus articles; refresh the cookie file");
            Err(ScrapeError::Access(status).into())
        }
    }
}

/// Assemble the downloaded articles and write the EPUB into the download dir.
///
/// Returns the written path, or `None` when no article was downloaded and
/// nothing was written.
#[instrument(level = "info", skip_all, fields(download_dir = %args.download_dir))]
async fn write_output(
    args: &Cli,
    rules: &SiteRules,
    articles: &[Option<ExtractedArticle>],
    run_started: chrono::DateTime<Local>,
) -> Result<Option<PathBuf>, Box<dyn Error>> {
    if articles.iter().flatten().next().is_none() {
        error!(attempted = articles.len(), "No articles were downloaded; no EPUB written");
        return Ok(None);
    }

    let file_name = args.output.clone().unwrap_or_else(|| {
        default_output_filename(Some(&args.topic), args.is_archive(), run_started)
    });
    let topic = if args.is_archive() {
        ARCHIVE_LABEL
    } else {
        args.topic.as_str()
    };

    let doc = document::assemble(articles, Some(topic), rules, Local::now());
    let path = Path::new(&args.download_dir).join(&file_name);
    info!(path = %path.display(), "Writing EPUB");
    if let Err(e) = epub::write_epub(&doc, &path).await {
        error!(path = %path.display(), error = %e, "Failed writing EPUB");
        return Err(e.into());
    }
    info!(path = %path.display(), chapters = doc.chapters.len(), "EPUB created");
    Ok(Some(path))
}
