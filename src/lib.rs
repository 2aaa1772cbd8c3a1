//! `wiki-markup`: renderer for knowledge-base wiki markup.
//!
//! Converts the author-facing markup of a support wiki into an HTML
//! fragment. Beyond paragraphs, headings and lists the dialect has
//! `{note}`/`{warning}` blocks, `{key}`/`{menu}`/`{button}` spans,
//! `[[Template:...]]` expansion with parameters, `[[Include:...]]` and media
//! embeds resolved per locale, and `{for}` regions that show content only on
//! certain platforms.
//!
//! Content is looked up through a [`ContentSource`]. [`MemoryStore`] is a
//! ready-made in-memory implementation.
//!
//! # Quick start
//!
//! ```
//! let result = wiki_markup::parse("{for mac}Press {key Cmd+Q}.{/for}", "en-US");
//! assert!(result.diagnostics.is_empty());
//! assert_eq!(
//!     result.html,
//!     "<p><span class=\"for\" data-for=\"mac\">Press <span class=\"key\">Cmd</span> + \
//!      <span class=\"key\">Q</span>.</span></p>"
//! );
//! ```

pub mod balance;
pub mod blocks;
pub mod builder;
pub mod config;
pub mod directives;
pub mod error;
pub mod inline;
pub mod parse;
pub mod references;
pub mod render_html;
pub mod store;
pub mod template;
pub mod types;

pub use balance::TagBalancer;
pub use builder::StoreBuilder;
pub use config::ParserConfig;
pub use error::*;
pub use parse::{RenderResult, WikiParser, parse};
pub use store::{ContentSource, MemoryStore};
pub use template::{build_parameters, format_content};
pub use types::*;
