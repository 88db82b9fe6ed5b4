//! Segment algebra.
//!
//! Paths are compared as ordered lists of name segments. Every predicate takes
//! an explicit `ignore_case` flag; callers that don't care pass `false`.
//!
//! Partial matching (`allow_partial`) lets the boundary segment match by
//! string prefix (for `starts_with`) or suffix (for `ends_with`), so
//! `[a, bc]` starts with `[a, b]` when partial matching is enabled.

/// Owned segment list.
pub type Segments = Vec<String>;

/// Build a segment list from string slices.
pub fn segs<I, S>(items: I) -> Segments
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    items.into_iter().map(Into::into).collect()
}

/// Split a string into segments on `separator`.
///
/// Empty input yields an empty list. Empty pieces are kept, so a leading
/// separator produces a leading empty segment (`"/a"` → `["", "a"]`).
pub fn to_segs(s: &str, separator: &str) -> Segments {
    if s.is_empty() {
        return Vec::new();
    }
    s.split(separator).map(str::to_string).collect()
}

fn seg_eq(a: &str, b: &str, ignore_case: bool) -> bool {
    if ignore_case {
        a.to_lowercase() == b.to_lowercase()
    } else {
        a == b
    }
}

fn seg_starts_with(a: &str, b: &str, ignore_case: bool) -> bool {
    if ignore_case {
        a.to_lowercase().starts_with(&b.to_lowercase())
    } else {
        a.starts_with(b)
    }
}

fn seg_ends_with(a: &str, b: &str, ignore_case: bool) -> bool {
    if ignore_case {
        a.to_lowercase().ends_with(&b.to_lowercase())
    } else {
        a.ends_with(b)
    }
}

fn all_eq(a: &[String], b: &[String], ignore_case: bool) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| seg_eq(x, y, ignore_case))
}

/// Comparison and manipulation of segment lists.
pub trait SegmentsExt {
    /// Same length and every segment equal.
    fn matches(&self, other: &[String], ignore_case: bool) -> bool;

    /// Strictly shorter and a segment-wise prefix of `other`.
    fn is_ancestor_of(&self, other: &[String], ignore_case: bool) -> bool;

    /// Ancestor of `other` with exactly one segment less.
    fn is_parent_of(&self, other: &[String], ignore_case: bool) -> bool;

    fn is_descendant_of(&self, other: &[String], ignore_case: bool) -> bool;

    fn is_child_of(&self, other: &[String], ignore_case: bool) -> bool;

    fn starts_with_segments(&self, other: &[String], ignore_case: bool, allow_partial: bool)
    -> bool;

    fn ends_with_segments(&self, other: &[String], ignore_case: bool, allow_partial: bool) -> bool;

    /// Whether `target` appears as a contiguous run.
    ///
    /// With `allow_partial` both sides are joined with `/` and compared as
    /// strings, so a run may begin or end mid-segment.
    fn contains_segments(&self, target: &[String], ignore_case: bool, allow_partial: bool)
    -> bool;

    fn join_segments(&self, separator: &str) -> String;

    fn lowercase(&self) -> Segments;

    /// A new list with `prefix` in front.
    fn prepend(&self, prefix: &[String]) -> Segments;
}

impl SegmentsExt for [String] {
    fn matches(&self, other: &[String], ignore_case: bool) -> bool {
        all_eq(self, other, ignore_case)
    }

    fn is_ancestor_of(&self, other: &[String], ignore_case: bool) -> bool {
        self.len() < other.len() && other.starts_with_segments(self, ignore_case, false)
    }

    fn is_parent_of(&self, other: &[String], ignore_case: bool) -> bool {
        self.len() + 1 == other.len() && self.is_ancestor_of(other, ignore_case)
    }

    fn is_descendant_of(&self, other: &[String], ignore_case: bool) -> bool {
        other.is_ancestor_of(self, ignore_case)
    }

    fn is_child_of(&self, other: &[String], ignore_case: bool) -> bool {
        other.is_parent_of(self, ignore_case)
    }

    fn starts_with_segments(
        &self,
        other: &[String],
        ignore_case: bool,
        allow_partial: bool,
    ) -> bool {
        if self.is_empty() {
            return other.is_empty();
        }
        if other.len() > self.len() {
            return false;
        }
        let Some((last, head)) = other.split_last() else {
            return true;
        };
        let boundary = &self[head.len()];
        let boundary_ok = if allow_partial {
            seg_starts_with(boundary, last, ignore_case)
        } else {
            seg_eq(boundary, last, ignore_case)
        };
        boundary_ok && all_eq(&self[..head.len()], head, ignore_case)
    }

    fn ends_with_segments(
        &self,
        other: &[String],
        ignore_case: bool,
        allow_partial: bool,
    ) -> bool {
        if self.is_empty() {
            return other.is_empty();
        }
        if other.len() > self.len() {
            return false;
        }
        let Some((first, tail)) = other.split_first() else {
            return true;
        };
        let window = &self[self.len() - other.len()..];
        let boundary_ok = if allow_partial {
            seg_ends_with(&window[0], first, ignore_case)
        } else {
            seg_eq(&window[0], first, ignore_case)
        };
        boundary_ok && all_eq(&window[1..], tail, ignore_case)
    }

    fn contains_segments(&self, target: &[String], ignore_case: bool, allow_partial: bool) -> bool {
        if self.len() < target.len() {
            return false;
        }
        if allow_partial {
            let (haystack, needle) = (self.join("/"), target.join("/"));
            return if ignore_case {
                haystack.to_lowercase().contains(&needle.to_lowercase())
            } else {
                haystack.contains(&needle)
            };
        }
        if target.is_empty() {
            return true;
        }
        self.windows(target.len())
            .any(|window| all_eq(window, target, ignore_case))
    }

    fn join_segments(&self, separator: &str) -> String {
        self.join(separator)
    }

    fn lowercase(&self) -> Segments {
        self.iter().map(|s| s.to_lowercase()).collect()
    }

    fn prepend(&self, prefix: &[String]) -> Segments {
        prefix.iter().chain(self.iter()).cloned().collect()
    }
}
