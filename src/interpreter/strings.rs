// String-specialised operations

use super::error::{RuntimeError, RuntimeResult};
use regex::Regex;
use std::borrow::Cow;
use std::cmp::Ordering;
use std::collections::HashMap;

/// Compiled patterns kept across rows; `rin` almost always sees the same
/// literal pattern on every row
const PATTERN_CACHE_CAPACITY: usize = 64;

#[derive(Debug, Default)]
pub struct PatternCache {
    patterns: HashMap<Box<str>, Regex>,
}

impl PatternCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `subject` matches `pattern`
    pub fn is_match(&mut self, pattern: &str, subject: &str) -> RuntimeResult<bool> {
        if let Some(regex) = self.patterns.get(pattern) {
            return Ok(regex.is_match(subject));
        }

        let regex = Regex::new(pattern).map_err(|e| RuntimeError::InvalidPattern {
            pattern: pattern.to_string(),
            message: e.to_string(),
        })?;
        let matched = regex.is_match(subject);

        if self.patterns.len() >= PATTERN_CACHE_CAPACITY {
            self.patterns.clear();
        }
        self.patterns.insert(pattern.into(), regex);

        Ok(matched)
    }
}

/// Concatenate into an owned string. An owned left operand is extended in
/// place; a borrowed one is copied.
pub fn concat<'a>(left: Cow<'a, str>, right: &str) -> RuntimeResult<Cow<'a, str>> {
    let mut text = left.into_owned();
    text.try_reserve(right.len())
        .map_err(|_| RuntimeError::Allocation {
            requested: text.len().saturating_add(right.len()),
        })?;
    text.push_str(right);
    Ok(Cow::Owned(text))
}

/// Repeat `text` `count` times. The count must be a non-negative integer.
pub fn repeat(text: &str, count: f64) -> RuntimeResult<Cow<'static, str>> {
    if !count.is_finite() || count < 0.0 || count.fract() != 0.0 {
        return Err(RuntimeError::InvalidRepeatCount { count });
    }

    let times = count as usize;
    if text.is_empty() || times == 0 {
        return Ok(Cow::Owned(String::new()));
    }
    let requested = text
        .len()
        .checked_mul(times)
        .ok_or(RuntimeError::Allocation {
            requested: usize::MAX,
        })?;

    let mut out = String::new();
    out.try_reserve_exact(requested)
        .map_err(|_| RuntimeError::Allocation { requested })?;
    for _ in 0..times {
        out.push_str(text);
    }
    Ok(Cow::Owned(out))
}

/// Remove the first occurrence of `needle`
pub fn remove_first<'a>(text: Cow<'a, str>, needle: &str) -> RuntimeResult<Cow<'a, str>> {
    let start = match text.find(needle) {
        Some(start) if !needle.is_empty() => start,
        _ => return Ok(text),
    };
    let end = start + needle.len();

    match text {
        Cow::Owned(mut s) => {
            s.replace_range(start..end, "");
            Ok(Cow::Owned(s))
        }
        Cow::Borrowed(s) => {
            let mut out = String::new();
            out.try_reserve_exact(s.len() - needle.len())
                .map_err(|_| RuntimeError::Allocation {
                    requested: s.len() - needle.len(),
                })?;
            out.push_str(&s[..start]);
            out.push_str(&s[end..]);
            Ok(Cow::Owned(out))
        }
    }
}

/// Cut the text at the first occurrence of `needle`. A borrowed text stays
/// borrowed.
pub fn truncate_at<'a>(text: Cow<'a, str>, needle: &str) -> Cow<'a, str> {
    let Some(at) = text.find(needle) else {
        return text;
    };

    match text {
        Cow::Owned(mut s) => {
            s.truncate(at);
            Cow::Owned(s)
        }
        Cow::Borrowed(s) => Cow::Borrowed(&s[..at]),
    }
}

/// Compare only the first `right.len()` bytes of `left` with `right`.
///
/// `'hello' = 'hel'` is true: string relational operators are prefix
/// comparisons, which is what makes `name = 'Sm'` a starts-with filter.
/// A left operand shorter than the right one orders before it.
pub fn prefix_cmp(left: &str, right: &str) -> Ordering {
    let len = left.len().min(right.len());
    left.as_bytes()[..len].cmp(right.as_bytes())
}
