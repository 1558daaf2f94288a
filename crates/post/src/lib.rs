//! # Quill Post
//!
//! Document-level building blocks for the blog index: front matter
//! splitting and parsing, the body renderer seam, and the record builder
//! that turns one raw markdown file into an immutable [`Post`].

mod error;
mod frontmatter;
mod post;
mod render;

pub use error::{PostError, Result};
pub use frontmatter::{split_document, Frontmatter, SplitDocument};
pub use post::{
    build_post, has_date_prefix, normalize_tag, BuildOutcome, IndexMode, Post,
    MISSING_METADATA_TITLE,
};
pub use render::{PlainRenderer, Renderer};
