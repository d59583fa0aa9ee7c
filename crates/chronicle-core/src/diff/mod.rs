//! Word-level diffing of field content.
//!
//! The engine compares two strings token by token (words, whitespace runs
//! and single punctuation characters) and produces tagged segments that can be
//! rendered as structured JSON, plain text markers or inline markup.

mod render;
mod word;

pub use render::{escape_html, DiffFormat};
pub use word::{diff_words, ChangeTag, DiffSegment, WordDiff};
