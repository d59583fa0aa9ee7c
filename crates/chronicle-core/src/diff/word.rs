//! Tokenizer and longest-common-subsequence diff over words.

use serde::{Deserialize, Serialize};

use super::render::{render, DiffFormat};

/// How a segment relates the old text to the new text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeTag {
    /// Present in both texts.
    Equal,
    /// Present only in the old text.
    Delete,
    /// Present only in the new text.
    Insert,
}

/// A run of consecutive tokens sharing one tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffSegment {
    pub tag: ChangeTag,
    pub text: String,
}

/// Result of comparing two strings word by word.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WordDiff {
    segments: Vec<DiffSegment>,
}

impl WordDiff {
    /// All segments in reading order. Adjacent segments never share a tag.
    pub fn segments(&self) -> &[DiffSegment] {
        &self.segments
    }

    /// True when the two inputs differ somewhere.
    pub fn has_changes(&self) -> bool {
        self.segments.iter().any(|s| s.tag != ChangeTag::Equal)
    }

    /// True when there is nothing to show as changed: identical inputs, or
    /// both inputs empty.
    pub fn is_empty(&self) -> bool {
        !self.has_changes()
    }

    /// Text removed from the old value, one entry per deleted run.
    pub fn removed(&self) -> impl Iterator<Item = &str> {
        self.with_tag(ChangeTag::Delete)
    }

    /// Text added in the new value, one entry per inserted run.
    pub fn added(&self) -> impl Iterator<Item = &str> {
        self.with_tag(ChangeTag::Insert)
    }

    /// Text common to both values, one entry per unchanged run.
    pub fn unchanged(&self) -> impl Iterator<Item = &str> {
        self.with_tag(ChangeTag::Equal)
    }

    /// Render in `format`. Segment text is always HTML-escaped.
    pub fn render(&self, format: DiffFormat) -> String {
        render(&self.segments, format)
    }

    fn with_tag(&self, tag: ChangeTag) -> impl Iterator<Item = &str> {
        self.segments
            .iter()
            .filter(move |s| s.tag == tag)
            .map(|s| s.text.as_str())
    }

    fn push(&mut self, tag: ChangeTag, text: &str) {
        match self.segments.last_mut() {
            Some(last) if last.tag == tag => last.text.push_str(text),
            _ => self.segments.push(DiffSegment {
                tag,
                text: text.to_string(),
            }),
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum TokenClass {
    Word,
    Space,
    Other,
}

fn classify(c: char) -> TokenClass {
    if c.is_alphanumeric() || c == '_' {
        TokenClass::Word
    } else if c.is_whitespace() {
        TokenClass::Space
    } else {
        TokenClass::Other
    }
}

/// Split into word runs, whitespace runs and single punctuation characters.
fn tokenize(input: &str) -> Vec<&str> {
    let mut tokens = Vec::new();
    let mut start = 0;
    let mut current: Option<TokenClass> = None;

    for (idx, c) in input.char_indices() {
        let class = classify(c);
        match current {
            Some(prev) if prev == class && class != TokenClass::Other => {}
            Some(_) => {
                tokens.push(&input[start..idx]);
                start = idx;
            }
            None => {}
        }
        current = Some(class);
    }
    if start < input.len() {
        tokens.push(&input[start..]);
    }
    tokens
}

/// Compare `old` and `new` word by word.
///
/// Deterministic: when a deletion and an insertion are equally good, the
/// deletion is emitted first.
pub fn diff_words(old: &str, new: &str) -> WordDiff {
    let a = tokenize(old);
    let b = tokenize(new);
    let mut diff = WordDiff::default();

    let prefix = a.iter().zip(&b).take_while(|(x, y)| x == y).count();
    let suffix = a[prefix..]
        .iter()
        .rev()
        .zip(b[prefix..].iter().rev())
        .take_while(|(x, y)| x == y)
        .count();

    for token in &a[..prefix] {
        diff.push(ChangeTag::Equal, token);
    }

    let a_mid = &a[prefix..a.len() - suffix];
    let b_mid = &b[prefix..b.len() - suffix];
    diff_middle(&mut diff, a_mid, b_mid);

    for token in &a[a.len() - suffix..] {
        diff.push(ChangeTag::Equal, token);
    }

    diff
}

fn diff_middle<'a>(diff: &mut WordDiff, a: &[&'a str], b: &[&'a str]) {
    let mut ops = Vec::with_capacity(a.len().max(b.len()));
    align(a, b, &mut ops);

    // Inside a changed stretch, deletions come before insertions.
    let mut inserted: Vec<&str> = Vec::new();
    for (tag, token) in ops {
        match tag {
            ChangeTag::Delete => diff.push(ChangeTag::Delete, token),
            ChangeTag::Insert => inserted.push(token),
            ChangeTag::Equal => {
                for added in inserted.drain(..) {
                    diff.push(ChangeTag::Insert, added);
                }
                diff.push(ChangeTag::Equal, token);
            }
        }
    }
    for token in inserted {
        diff.push(ChangeTag::Insert, token);
    }
}

/// Hirschberg alignment: LCS edit script in space linear in `b`.
///
/// Split points take the leftmost optimum so earlier tokens match first.
fn align<'a>(a: &[&'a str], b: &[&'a str], ops: &mut Vec<(ChangeTag, &'a str)>) {
    if a.is_empty() {
        ops.extend(b.iter().map(|t| (ChangeTag::Insert, *t)));
        return;
    }
    if b.is_empty() {
        ops.extend(a.iter().map(|t| (ChangeTag::Delete, *t)));
        return;
    }
    if a.len() == 1 {
        match b.iter().position(|t| *t == a[0]) {
            Some(j) => {
                ops.extend(b[..j].iter().map(|t| (ChangeTag::Insert, *t)));
                ops.push((ChangeTag::Equal, a[0]));
                ops.extend(b[j + 1..].iter().map(|t| (ChangeTag::Insert, *t)));
            }
            None => {
                ops.push((ChangeTag::Delete, a[0]));
                ops.extend(b.iter().map(|t| (ChangeTag::Insert, *t)));
            }
        }
        return;
    }

    let mid = a.len() / 2;
    let front = lcs_prefix_row(&a[..mid], b);
    let back = lcs_suffix_row(&a[mid..], b);
    let mut split = 0;
    for j in 1..=b.len() {
        if front[j] + back[j] > front[split] + back[split] {
            split = j;
        }
    }

    align(&a[..mid], &b[..split], ops);
    align(&a[mid..], &b[split..], ops);
}

/// `row[j]` = LCS length of `a` and `b[..j]`.
fn lcs_prefix_row(a: &[&str], b: &[&str]) -> Vec<u32> {
    let mut prev = vec![0u32; b.len() + 1];
    let mut cur = vec![0u32; b.len() + 1];
    for x in a {
        for (j, y) in b.iter().enumerate() {
            cur[j + 1] = if x == y {
                prev[j] + 1
            } else {
                cur[j].max(prev[j + 1])
            };
        }
        std::mem::swap(&mut prev, &mut cur);
    }
    prev
}

/// `row[j]` = LCS length of `a` and `b[j..]`.
fn lcs_suffix_row(a: &[&str], b: &[&str]) -> Vec<u32> {
    let m = b.len();
    let mut prev = vec![0u32; m + 1];
    let mut cur = vec![0u32; m + 1];
    for x in a.iter().rev() {
        for j in (0..m).rev() {
            cur[j] = if *x == b[j] {
                prev[j + 1] + 1
            } else {
                cur[j + 1].max(prev[j])
            };
        }
        std::mem::swap(&mut prev, &mut cur);
    }
    prev
}
