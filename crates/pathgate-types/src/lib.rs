//! Path values and metadata for pathgate.
//!
//! This crate holds everything that describes *where* a file is and *what*
//! a lookup found, without doing any I/O. It has **no internal pathgate
//! dependencies** and the gateway crate builds on it.
//!
//! # Key Types
//!
//! |-------------------|----------------------------------------------|
//! | Type              | Purpose                                      |
//! |-------------------|----------------------------------------------|
//! | [`APath`]         | Union over raw, local and tree-URI paths     |
//! | [`LocalPath`]     | Conventional filesystem path                 |
//! | [`SafPath`]       | Tree URI root plus relative segments         |
//! | [`RawPath`]       | Opaque string, no segment structure          |
//! | [`TreeUri`]       | Validated content-provider tree URI          |
//! | [`APathLookup`]   | Stat result (type, size, owner, mode, link)  |
//! | [`SegmentsExt`]   | Ancestry/prefix algebra over segment lists   |
//! |-------------------|----------------------------------------------|

pub mod error;
pub mod lookup;
pub mod path;
pub mod segments;
pub mod tree_uri;

pub use error::{PathError, PathResult};
pub use lookup::{APathLookup, FileType, Ownership, Permissions};
pub use path::{APath, LocalPath, PathType, RawPath, SafPath, filter_distinct_roots};
pub use segments::{Segments, SegmentsExt, segs, to_segs};
pub use tree_uri::TreeUri;
