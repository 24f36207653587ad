//! Word-level diff between a snapshot and the live content
//!
//! The version panel compares a stored snapshot with the prompt being
//! edited. The comparison works on words: both texts are split into word
//! and whitespace tokens, the Longest Common Subsequence (LCS) of the two
//! token lists is found with dynamic programming, and the result is
//! emitted as tagged spans.
//!
//! Whitespace runs are tokens of their own, so joining the `Unchanged` and
//! `Removed` spans reproduces the old text exactly, and joining the
//! `Unchanged` and `Added` spans reproduces the new text.
//!
//! ## Examples
//!
//! ```rust
//! use promptvault::diff::{diff, has_changes, SpanKind};
//!
//! let spans = diff("write a short poem", "write a long poem");
//! assert!(has_changes(&spans));
//! assert_eq!(spans[1].kind, SpanKind::Removed);
//! assert_eq!(spans[1].text, "short");
//! assert_eq!(spans[2].kind, SpanKind::Added);
//! assert_eq!(spans[2].text, "long");
//! ```

use serde::{Deserialize, Serialize};

/// Classification of a diff span
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpanKind {
    /// Present in both texts
    Unchanged,
    /// Only in the new text
    Added,
    /// Only in the old text
    Removed,
}

/// A run of text with one classification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffSpan {
    /// Classification
    pub kind: SpanKind,
    /// Text of the run, whitespace included
    pub text: String,
}

/// Word counts of a diff
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffStats {
    /// Words only in the new text
    pub words_added: usize,
    /// Words only in the old text
    pub words_removed: usize,
    /// Words in both
    pub words_unchanged: usize,
}

/// Largest LCS table (in cells) built for one diff, about 16 MB of `u32`
pub const MAX_LCS_CELLS: usize = 4_000_000;

/// Represents a change operation over token indices
#[derive(Debug, Clone, Copy)]
enum ChangeOp {
    Keep(usize),   // old token index
    Delete(usize), // old token index
    Insert(usize), // new token index
}

/// Compute word-level diff spans from `old` to `new`
pub fn diff(old: &str, new: &str) -> Vec<DiffSpan> {
    let old_tokens = tokenize(old);
    let new_tokens = tokenize(new);

    let changes = compute_changes(&old_tokens, &new_tokens);

    let mut spans: Vec<DiffSpan> = Vec::new();
    for op in changes {
        let (kind, text) = match op {
            ChangeOp::Keep(i) => (SpanKind::Unchanged, old_tokens[i]),
            ChangeOp::Delete(i) => (SpanKind::Removed, old_tokens[i]),
            ChangeOp::Insert(j) => (SpanKind::Added, new_tokens[j]),
        };
        push_span(&mut spans, kind, text);
    }
    spans
}

/// Whether any span is added or removed
///
/// Restore is only offered when this is true.
pub fn has_changes(spans: &[DiffSpan]) -> bool {
    spans.iter().any(|s| s.kind != SpanKind::Unchanged)
}

/// Count words per span kind
pub fn stats(spans: &[DiffSpan]) -> DiffStats {
    let mut stats = DiffStats::default();
    for span in spans {
        let words = span.text.split_whitespace().count();
        match span.kind {
            SpanKind::Unchanged => stats.words_unchanged += words,
            SpanKind::Added => stats.words_added += words,
            SpanKind::Removed => stats.words_removed += words,
        }
    }
    stats
}

/// Rebuild one side of a diff
///
/// `SpanKind::Removed` yields the old text, `SpanKind::Added` the new one.
pub fn reconstruct(spans: &[DiffSpan], side: SpanKind) -> String {
    spans
        .iter()
        .filter(|s| s.kind == SpanKind::Unchanged || s.kind == side)
        .map(|s| s.text.as_str())
        .collect()
}

/// Split into alternating word and whitespace tokens
fn tokenize(text: &str) -> Vec<&str> {
    let mut tokens = Vec::new();
    let mut start = 0;
    let mut in_space: Option<bool> = None;

    for (idx, ch) in text.char_indices() {
        let is_space = ch.is_whitespace();
        match in_space {
            Some(prev) if prev != is_space => {
                tokens.push(&text[start..idx]);
                start = idx;
            }
            _ => {}
        }
        in_space = Some(is_space);
    }

    if start < text.len() {
        tokens.push(&text[start..]);
    }
    tokens
}

/// Append a token, merging it into the previous span when the kind matches
fn push_span(spans: &mut Vec<DiffSpan>, kind: SpanKind, text: &str) {
    match spans.last_mut() {
        Some(last) if last.kind == kind => last.text.push_str(text),
        _ => spans.push(DiffSpan {
            kind,
            text: text.to_string(),
        }),
    }
}

/// Compute the sequence of change operations
///
/// Tokens shared at the start and end are kept without entering the LCS
/// table. If the differing middle would still need more than
/// [`MAX_LCS_CELLS`] table cells, it is reported as one removal followed
/// by one insertion.
fn compute_changes(old: &[&str], new: &[&str]) -> Vec<ChangeOp> {
    let prefix = old.iter().zip(new).take_while(|(a, b)| a == b).count();
    let suffix = old[prefix..]
        .iter()
        .rev()
        .zip(new[prefix..].iter().rev())
        .take_while(|(a, b)| a == b)
        .count();

    let old_mid = &old[prefix..old.len() - suffix];
    let new_mid = &new[prefix..new.len() - suffix];

    let mut changes = Vec::with_capacity(old.len() + new.len());
    changes.extend((0..prefix).map(ChangeOp::Keep));

    let cells = (old_mid.len() + 1).saturating_mul(new_mid.len() + 1);
    if old_mid.is_empty() || new_mid.is_empty() || cells > MAX_LCS_CELLS {
        changes.extend((0..old_mid.len()).map(|i| ChangeOp::Delete(prefix + i)));
        changes.extend((0..new_mid.len()).map(|j| ChangeOp::Insert(prefix + j)));
    } else {
        let lcs = compute_lcs(old_mid, new_mid);
        changes.extend(
            lcs_to_changes(&lcs, old_mid.len(), new_mid.len())
                .into_iter()
                .map(|op| match op {
                    ChangeOp::Keep(i) => ChangeOp::Keep(prefix + i),
                    ChangeOp::Delete(i) => ChangeOp::Delete(prefix + i),
                    ChangeOp::Insert(j) => ChangeOp::Insert(prefix + j),
                }),
        );
    }

    changes.extend((old.len() - suffix..old.len()).map(ChangeOp::Keep));
    changes
}

/// Compute longest common subsequence using dynamic programming
fn compute_lcs(old: &[&str], new: &[&str]) -> Vec<(usize, usize)> {
    let m = old.len();
    let n = new.len();
    let width = n + 1;

    // Flat (m+1) x (n+1) table
    let mut dp = vec![0u32; (m + 1) * width];

    for i in 1..=m {
        for j in 1..=n {
            dp[i * width + j] = if old[i - 1] == new[j - 1] {
                dp[(i - 1) * width + (j - 1)] + 1
            } else {
                dp[(i - 1) * width + j].max(dp[i * width + (j - 1)])
            };
        }
    }

    // Backtrack to find LCS
    let mut lcs = Vec::new();
    let mut i = m;
    let mut j = n;

    while i > 0 && j > 0 {
        if old[i - 1] == new[j - 1] {
            lcs.push((i - 1, j - 1));
            i -= 1;
            j -= 1;
        } else if dp[(i - 1) * width + j] > dp[i * width + (j - 1)] {
            i -= 1;
        } else {
            j -= 1;
        }
    }

    lcs.reverse();
    lcs
}

/// Convert LCS to a sequence of change operations
fn lcs_to_changes(lcs: &[(usize, usize)], old_len: usize, new_len: usize) -> Vec<ChangeOp> {
    let mut changes = Vec::with_capacity(old_len + new_len);
    let mut old_idx = 0;
    let mut new_idx = 0;

    for &(lcs_old, lcs_new) in lcs {
        // Deletions before the next match, then insertions
        while old_idx < lcs_old {
            changes.push(ChangeOp::Delete(old_idx));
            old_idx += 1;
        }
        while new_idx < lcs_new {
            changes.push(ChangeOp::Insert(new_idx));
            new_idx += 1;
        }

        changes.push(ChangeOp::Keep(old_idx));
        old_idx += 1;
        new_idx += 1;
    }

    // No more matches, process remaining tokens
    while old_idx < old_len {
        changes.push(ChangeOp::Delete(old_idx));
        old_idx += 1;
    }
    while new_idx < new_len {
        changes.push(ChangeOp::Insert(new_idx));
        new_idx += 1;
    }

    changes
}
