//! Output generation: the assembled EPUB and the plain-text listing.
//!
//! # Submodules
//!
//! - [`document`]: Builds an `AssembledDocument` from extracted articles
//! - [`epub`]: Serializes an `AssembledDocument` as an EPUB 3 container
//! - [`listing`]: Renders the numbered article list for `--list-only`
//!
//! # Output Structure
//!
//! ```text
//! downloads/
//! ├── golem_security_20251029_103601.epub
//! └── golem_plus_archive_20251029_111500.epub
//! ```

pub mod document;
pub mod epub;
pub mod listing;
