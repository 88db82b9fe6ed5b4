//! The polymorphic path value.
//!
//! [`APath`] is a closed union over three addressing schemes:
//!
//! - [`RawPath`] - an opaque string, never served by a backend
//! - [`LocalPath`] - a conventional filesystem path
//! - [`SafPath`] - a tree URI plus relative segments (content-provider storage)
//!
//! ## Serialization
//!
//! Through the union, paths carry a `pathType` discriminator (`RAW`, `LOCAL`,
//! `SAF`). Variant structs serialize without it and, when deserialized on
//! their own, reject payloads whose discriminator names another variant.

mod local;
mod raw;
mod saf;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use local::LocalPath;
pub use raw::RawPath;
pub use saf::SafPath;

use crate::error::{PathError, PathResult};
use crate::segments::{Segments, SegmentsExt};

/// Addressing scheme of a path.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE")]
pub enum PathType {
    Raw,
    Local,
    Saf,
}

fn check_path_type(found: Option<PathType>, expected: PathType) -> PathResult<()> {
    match found {
        Some(found) if found != expected => Err(PathError::mismatch(format!(
            "expected pathType {expected}, got {found}"
        ))),
        _ => Ok(()),
    }
}

/// A path in any of the supported addressing schemes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "pathType")]
pub enum APath {
    #[serde(rename = "RAW")]
    Raw(RawPath),
    #[serde(rename = "LOCAL")]
    Local(LocalPath),
    #[serde(rename = "SAF")]
    Saf(SafPath),
}

impl APath {
    pub fn path_type(&self) -> PathType {
        match self {
            Self::Raw(_) => PathType::Raw,
            Self::Local(_) => PathType::Local,
            Self::Saf(_) => PathType::Saf,
        }
    }

    /// Human readable form.
    pub fn path(&self) -> String {
        match self {
            Self::Raw(p) => p.path().to_string(),
            Self::Local(p) => p.path(),
            Self::Saf(p) => p.path(),
        }
    }

    pub fn name(&self) -> String {
        match self {
            Self::Raw(p) => p.name().to_string(),
            Self::Local(p) => p.name(),
            Self::Saf(p) => p.name(),
        }
    }

    /// Segment decomposition. Raw paths refuse.
    pub fn segments(&self) -> PathResult<Segments> {
        match self {
            Self::Raw(p) => p.segments(),
            Self::Local(p) => Ok(p.segments()),
            Self::Saf(p) => Ok(p.segments().to_vec()),
        }
    }

    /// Same variant with `names` appended.
    pub fn child<I, S>(&self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        match self {
            Self::Raw(p) => Self::Raw(p.child(names)),
            Self::Local(p) => Self::Local(p.child(names)),
            Self::Saf(p) => Self::Saf(p.child(names)),
        }
    }

    pub fn as_local(&self) -> Option<&LocalPath> {
        match self {
            Self::Local(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_saf(&self) -> Option<&SafPath> {
        match self {
            Self::Saf(p) => Some(p),
            _ => None,
        }
    }

    // ========================================================================
    // Comparison (cross-variant answers false)
    // ========================================================================

    pub fn matches(&self, other: &APath) -> bool {
        self == other
    }

    pub fn is_ancestor_of(&self, other: &APath) -> bool {
        match (self, other) {
            (Self::Raw(a), Self::Raw(b)) => a.is_ancestor_of(b),
            (Self::Local(a), Self::Local(b)) => a.is_ancestor_of(b),
            (Self::Saf(a), Self::Saf(b)) => a.is_ancestor_of(b),
            _ => false,
        }
    }

    pub fn is_parent_of(&self, other: &APath) -> bool {
        match (self, other) {
            (Self::Raw(a), Self::Raw(b)) => a.is_parent_of(b),
            (Self::Local(a), Self::Local(b)) => a.is_parent_of(b),
            (Self::Saf(a), Self::Saf(b)) => a.is_parent_of(b),
            _ => false,
        }
    }

    pub fn is_descendant_of(&self, other: &APath) -> bool {
        other.is_ancestor_of(self)
    }

    pub fn is_child_of(&self, other: &APath) -> bool {
        other.is_parent_of(self)
    }

    /// Prefix test that tolerates a partial final segment.
    pub fn starts_with(&self, prefix: &APath) -> bool {
        match (self, prefix) {
            (Self::Raw(a), Self::Raw(b)) => a.starts_with(b),
            (Self::Local(a), Self::Local(b)) => a.starts_with(b),
            (Self::Saf(a), Self::Saf(b)) => a.starts_with(b),
            _ => false,
        }
    }

    pub fn contains_segments(
        &self,
        target: &[String],
        ignore_case: bool,
        allow_partial: bool,
    ) -> PathResult<bool> {
        Ok(self
            .segments()?
            .contains_segments(target, ignore_case, allow_partial))
    }

    // ========================================================================
    // Arithmetic
    // ========================================================================

    /// This path's segments below `prefix`, keeping the last `overlap`
    /// segments of the prefix in front.
    pub fn remove_prefix(&self, prefix: &APath, overlap: usize) -> PathResult<Segments> {
        self.require_comparable(prefix)?;
        let (own, theirs) = (self.segments()?, prefix.segments()?);
        if !own.starts_with_segments(&theirs, false, false) {
            return Err(PathError::mismatch(format!("{prefix} is not a prefix of {self}")));
        }
        if overlap > theirs.len() {
            return Err(PathError::mismatch(format!(
                "overlap {overlap} exceeds the {} segments of {prefix}",
                theirs.len()
            )));
        }
        Ok(own[theirs.len() - overlap..].to_vec())
    }

    /// Segments leading from this path down to `child`.
    pub fn crumbs_to(&self, child: &APath) -> PathResult<Segments> {
        match (self, child) {
            (Self::Local(a), Self::Local(b)) => a.crumbs_to(b),
            (Self::Saf(a), Self::Saf(b)) => a.crumbs_to(b),
            (Self::Raw(_), Self::Raw(_)) => Err(PathError::Unsupported {
                operation: "crumbs_to",
                path_type: PathType::Raw,
            }),
            _ => Err(Self::variant_mismatch(self, child)),
        }
    }

    fn require_comparable(&self, other: &APath) -> PathResult<()> {
        match (self, other) {
            (Self::Saf(a), Self::Saf(b)) if a.tree_root() != b.tree_root() => Err(
                PathError::mismatch(format!("different tree roots: {a} and {b}")),
            ),
            _ if self.path_type() != other.path_type() => Err(Self::variant_mismatch(self, other)),
            _ => Ok(()),
        }
    }

    fn variant_mismatch(a: &APath, b: &APath) -> PathError {
        PathError::mismatch(format!(
            "{} path {a} vs {} path {b}",
            a.path_type(),
            b.path_type()
        ))
    }
}

/// Drop every path that has an ancestor (or a duplicate) in the set.
pub fn filter_distinct_roots<I>(paths: I) -> Vec<APath>
where
    I: IntoIterator<Item = APath>,
{
    let mut unique: Vec<APath> = Vec::new();
    for path in paths {
        if !unique.contains(&path) {
            unique.push(path);
        }
    }
    unique
        .iter()
        .filter(|path| !unique.iter().any(|other| other.is_ancestor_of(path)))
        .cloned()
        .collect()
}

impl fmt::Display for APath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Raw(p) => fmt::Display::fmt(p, f),
            Self::Local(p) => fmt::Display::fmt(p, f),
            Self::Saf(p) => fmt::Display::fmt(p, f),
        }
    }
}

impl From<RawPath> for APath {
    fn from(p: RawPath) -> Self {
        Self::Raw(p)
    }
}

impl From<LocalPath> for APath {
    fn from(p: LocalPath) -> Self {
        Self::Local(p)
    }
}

impl From<SafPath> for APath {
    fn from(p: SafPath) -> Self {
        Self::Saf(p)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segments::segs;
    use serde_json::json;

    const TREE: &str = "content://com.android.externalstorage.documents/tree/primary%3Asafstor";

    fn local(path: &str) -> APath {
        LocalPath::new(path).into()
    }

    fn saf(segments: &[&str]) -> APath {
        SafPath::build(TREE, segments.iter().copied()).unwrap().into()
    }

    #[test]
    fn test_child_segments_law() {
        for base in [local("/sdcard"), local("/"), saf(&[]), saf(&["a"])] {
            let mut expected = base.segments().unwrap();
            expected.push("x".into());
            assert_eq!(base.child(["x"]).segments().unwrap(), expected);
            assert_eq!(base.child(["x"]).path_type(), base.path_type());
        }
    }

    #[test]
    fn test_parent_implies_ancestor() {
        let cases = [
            (local("/a"), local("/a/b")),
            (local("/a"), local("/a/b/c")),
            (saf(&["a"]), saf(&["a", "b"])),
            (saf(&[]), saf(&["a", "b"])),
        ];
        for (a, b) in cases {
            if a.is_parent_of(&b) {
                assert!(a.is_ancestor_of(&b));
            }
            let len_a = a.segments().unwrap().len();
            let len_b = b.segments().unwrap().len();
            assert_eq!(
                a.is_ancestor_of(&b) && len_b == len_a + 1,
                a.is_parent_of(&b)
            );
            assert!(b.is_descendant_of(&a));
        }
    }

    #[test]
    fn test_cross_variant_comparisons_are_false() {
        let raw: APath = RawPath::new("/a").into();
        let l = local("/a");
        let s = saf(&["a"]);
        for (a, b) in [(&raw, &l), (&l, &s), (&s, &raw), (&l, &raw)] {
            assert!(!a.is_ancestor_of(b));
            assert!(!a.is_parent_of(b));
            assert!(!a.matches(b));
            assert!(!a.starts_with(b));
        }
    }

    #[test]
    fn test_raw_refuses_segments() {
        let raw: APath = RawPath::new("/a/b").into();
        assert!(matches!(raw.segments(), Err(PathError::Unsupported { .. })));
        assert!(raw.contains_segments(&segs(["a"]), false, false).is_err());
    }

    #[test]
    fn test_raw_string_comparisons() {
        let a: APath = RawPath::new("/a").into();
        let b: APath = RawPath::new("/a/b").into();
        let ab: APath = RawPath::new("/ab").into();
        assert!(a.is_ancestor_of(&b));
        assert!(a.is_parent_of(&b));
        assert!(!a.is_ancestor_of(&ab));
        assert!(ab.starts_with(&a));
    }

    #[test]
    fn test_starts_with_partial() {
        assert!(local("/a/bc").starts_with(&local("/a/b")));
        assert!(local("/a/b").starts_with(&local("/a")));
        assert!(!local("/a").starts_with(&local("/a/b")));
        assert!(saf(&["a", "bc"]).starts_with(&saf(&["a", "b"])));
    }

    #[test]
    fn test_remove_prefix() {
        let p = local("/a/b/c/d");
        assert!(p.remove_prefix(&p, 0).unwrap().is_empty());
        assert_eq!(p.remove_prefix(&local("/a/b"), 0).unwrap(), segs(["c", "d"]));
        assert_eq!(p.remove_prefix(&local("/a/b"), 1).unwrap(), segs(["b", "c", "d"]));
        assert!(matches!(
            p.remove_prefix(&local("/x"), 0),
            Err(PathError::ArgumentMismatch(_))
        ));
        assert!(matches!(
            p.remove_prefix(&saf(&["a"]), 0),
            Err(PathError::ArgumentMismatch(_))
        ));
    }

    #[test]
    fn test_crumbs_to() {
        let parent = saf(&["a", "b"]);
        let child = saf(&["a", "b", "c", "d"]);
        assert_eq!(parent.crumbs_to(&child).unwrap(), segs(["c", "d"]));
        assert!(matches!(
            parent.crumbs_to(&local("/a/b/c")),
            Err(PathError::ArgumentMismatch(_))
        ));
    }

    #[test]
    fn test_filter_distinct_roots() {
        let roots = filter_distinct_roots([
            local("/a/b"),
            local("/a"),
            local("/c"),
            local("/a/b/c"),
            local("/c"),
            saf(&["a"]),
        ]);
        assert_eq!(roots, vec![local("/a"), local("/c"), saf(&["a"])]);
    }

    #[test]
    fn test_union_serialization() {
        let raw: APath = RawPath::new("/raw").into();
        assert_eq!(
            serde_json::to_value(&raw).unwrap(),
            json!({ "path": "/raw", "pathType": "RAW" })
        );
        assert_eq!(
            serde_json::to_value(local("/sdcard")).unwrap(),
            json!({ "file": "/sdcard", "pathType": "LOCAL" })
        );
        assert_eq!(
            serde_json::to_value(saf(&["a", "b"])).unwrap(),
            json!({ "treeRoot": TREE, "segments": ["a", "b"], "pathType": "SAF" })
        );

        for path in [raw, local("/sdcard/x"), saf(&["a"])] {
            let json = serde_json::to_string(&path).unwrap();
            assert_eq!(serde_json::from_str::<APath>(&json).unwrap(), path);
        }
    }

    #[test]
    fn test_variant_serialization_omits_discriminator() {
        let path = SafPath::build(TREE, ["a"]).unwrap();
        assert_eq!(
            serde_json::to_value(&path).unwrap(),
            json!({ "treeRoot": TREE, "segments": ["a"] })
        );
        let tagged = json!({ "treeRoot": TREE, "segments": ["a"], "pathType": "SAF" });
        assert_eq!(serde_json::from_value::<SafPath>(tagged).unwrap(), path);
    }

    #[test]
    fn test_wrong_variant_payload_fails() {
        let raw = serde_json::to_string(&APath::from(RawPath::new("/raw"))).unwrap();
        assert!(serde_json::from_str::<SafPath>(&raw).is_err());

        let mislabeled = json!({ "file": "/sdcard", "pathType": "SAF" });
        assert!(serde_json::from_value::<LocalPath>(mislabeled).is_err());

        let bad_root = json!({ "treeRoot": "file:///sdcard", "segments": [], "pathType": "SAF" });
        assert!(serde_json::from_value::<APath>(bad_root).is_err());
    }
}
