//! Scrapers for golem.de feeds, the Plus archive and article pages.
//!
//! # Submodules
//!
//! - [`feed`]: Resolves an RSS/Atom or outline feed (or the archive) into entries
//! - [`archive`]: Crawls the paginated Golem Plus archive listing
//! - [`article`]: Downloads one article with all pages and images
//! - [`dom`]: Shared helpers over the parsed HTML tree

pub mod archive;
pub mod article;
pub mod dom;
pub mod feed;
