//! Direct (unprivileged) filesystem access.
//!
//! Plain functions over paths, shared by the gateway's direct route and by
//! [`HostPeer`](super::HostPeer).

use std::io;
use std::os::unix::fs::{MetadataExt, PermissionsExt};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use pathgate_types::{APathLookup, FileType, LocalPath, Ownership, Permissions};
use tokio::fs;

/// Run a blocking syscall off the async worker threads.
async fn blocking<T, F>(f: F) -> io::Result<T>
where
    F: FnOnce() -> io::Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(io::Error::other)?
}

// ============================================================================
// Probes
// ============================================================================
//
// Probes answer routing questions. They stat and call access(2), which can
// hang on slow mounts, so every probe runs on the blocking pool. A probe that
// can't run answers `false`.

async fn probe<F>(path: &Path, f: F) -> bool
where
    F: FnOnce(&Path) -> bool + Send + 'static,
{
    let path = path.to_path_buf();
    blocking(move || Ok(f(&path))).await.unwrap_or(false)
}

/// Exists without following a trailing symlink.
fn exists_at(path: &Path) -> bool {
    std::fs::symlink_metadata(path).is_ok()
}

fn is_dir_at(path: &Path) -> bool {
    std::fs::metadata(path).is_ok_and(|m| m.is_dir())
}

fn can_read_at(path: &Path) -> bool {
    rustix::fs::access(path, rustix::fs::Access::READ_OK).is_ok()
}

fn can_write_at(path: &Path) -> bool {
    rustix::fs::access(path, rustix::fs::Access::WRITE_OK).is_ok()
}

/// Closest of `path` and its ancestors that exists.
fn nearest_existing(path: &Path) -> Option<&Path> {
    path.ancestors()
        .filter(|p| !p.as_os_str().is_empty())
        .find(|p| exists_at(p))
}

pub(crate) async fn exists(path: &Path) -> bool {
    probe(path, exists_at).await
}

pub(crate) async fn is_dir(path: &Path) -> bool {
    probe(path, is_dir_at).await
}

/// Exists and is readable.
pub(crate) async fn readable(path: &Path) -> bool {
    probe(path, |p| exists_at(p) && can_read_at(p)).await
}

/// Exists and is writable.
pub(crate) async fn writable(path: &Path) -> bool {
    probe(path, |p| exists_at(p) && can_write_at(p)).await
}

pub(crate) async fn parent_writable(path: &Path) -> bool {
    probe(path, |p| p.parent().is_some_and(can_write_at)).await
}

/// Nearest existing ancestor (inclusive) is readable.
pub(crate) async fn readable_ancestor(path: &Path) -> bool {
    probe(path, |p| nearest_existing(p).is_some_and(can_read_at)).await
}

/// Nearest existing ancestor (inclusive) is writable.
pub(crate) async fn writable_ancestor(path: &Path) -> bool {
    probe(path, |p| nearest_existing(p).is_some_and(can_write_at)).await
}

/// `path` is missing and its nearest existing ancestor is readable, so the
/// absence is real rather than hidden by permissions.
pub(crate) async fn known_missing(path: &Path) -> bool {
    probe(path, |p| !exists_at(p) && nearest_existing(p).is_some_and(can_read_at)).await
}

/// A direct existence check gives a trustworthy answer for `path`: the path
/// exists, its parent is readable, or a readable root in `roots` covers it.
pub(crate) async fn existence_known(path: &Path, roots: Vec<PathBuf>) -> bool {
    probe(path, move |p| {
        exists_at(p)
            || p.parent().is_some_and(|parent| exists_at(parent) && can_read_at(parent))
            || roots.iter().any(|root| p.starts_with(root) && can_read_at(root))
    })
    .await
}

// ============================================================================
// Reading
// ============================================================================

fn file_type(meta: &std::fs::Metadata) -> FileType {
    let ft = meta.file_type();
    if ft.is_symlink() {
        FileType::SymbolicLink
    } else if ft.is_dir() {
        FileType::Directory
    } else if ft.is_file() {
        FileType::File
    } else {
        FileType::Unknown
    }
}

/// Owner ids with names. Name resolution goes through NSS and may block.
fn ownership(meta: &std::fs::Metadata) -> Ownership {
    use nix::unistd::{Gid, Group, Uid, User};

    let (uid, gid) = (meta.uid(), meta.gid());
    let user = User::from_uid(Uid::from_raw(uid))
        .ok()
        .flatten()
        .map(|u| u.name);
    let group = Group::from_gid(Gid::from_raw(gid))
        .ok()
        .flatten()
        .map(|g| g.name);
    Ownership::new(uid, gid).with_names(user, group)
}

fn lookup_at(path: &LocalPath) -> io::Result<APathLookup<LocalPath>> {
    let meta = std::fs::symlink_metadata(path.as_path())?;
    let file_type = file_type(&meta);
    let target = if file_type == FileType::SymbolicLink {
        Some(LocalPath::new(std::fs::read_link(path.as_path())?))
    } else {
        None
    };
    Ok(APathLookup {
        lookedup: path.clone(),
        file_type,
        size: meta.len(),
        modified_at: meta.modified().unwrap_or(SystemTime::UNIX_EPOCH),
        ownership: Some(ownership(&meta)),
        permissions: Some(Permissions::new(meta.mode())),
        target,
    })
}

fn list_at(path: &LocalPath) -> io::Result<Vec<LocalPath>> {
    let mut children = std::fs::read_dir(path.as_path())?
        .map(|entry| entry.map(|e| LocalPath::new(e.path())))
        .collect::<io::Result<Vec<_>>>()?;
    children.sort();
    Ok(children)
}

pub(crate) async fn lookup(path: &LocalPath) -> io::Result<APathLookup<LocalPath>> {
    let path = path.clone();
    blocking(move || lookup_at(&path)).await
}

pub(crate) async fn list(path: &LocalPath) -> io::Result<Vec<LocalPath>> {
    let path = path.clone();
    blocking(move || list_at(&path)).await
}

/// Listing and every child's lookup in one trip to the blocking pool.
pub(crate) async fn lookup_files(path: &LocalPath) -> io::Result<Vec<APathLookup<LocalPath>>> {
    let path = path.clone();
    blocking(move || list_at(&path)?.iter().map(lookup_at).collect()).await
}

pub(crate) async fn open_read(path: &LocalPath) -> io::Result<fs::File> {
    fs::File::open(path.as_path()).await
}

// ============================================================================
// Writing
// ============================================================================

/// Create `path` and missing parents. `false` when it already is a directory.
pub(crate) async fn mkdirs(path: &LocalPath) -> io::Result<bool> {
    if is_dir(path.as_path()).await {
        return Ok(false);
    }
    fs::create_dir_all(path.as_path()).await?;
    Ok(true)
}

/// Create an empty file and missing parents. `false` when a file exists.
pub(crate) async fn create_new_file(path: &LocalPath) -> io::Result<bool> {
    if let Ok(meta) = fs::metadata(path.as_path()).await {
        if meta.is_dir() {
            return Err(io::Error::new(
                io::ErrorKind::IsADirectory,
                format!("{path} exists as a directory"),
            ));
        }
        return Ok(false);
    }
    if let Some(parent) = path.as_path().parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).await?;
    }
    match fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path.as_path())
        .await
    {
        Ok(_) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Ok(false),
        Err(e) => Err(e),
    }
}

pub(crate) async fn open_write(path: &LocalPath) -> io::Result<fs::File> {
    fs::File::create(path.as_path()).await
}

/// Remove a file, symlink or empty directory.
pub(crate) async fn delete(path: &LocalPath) -> io::Result<()> {
    let meta = fs::symlink_metadata(path.as_path()).await?;
    if meta.is_dir() {
        fs::remove_dir(path.as_path()).await
    } else {
        fs::remove_file(path.as_path()).await
    }
}

pub(crate) async fn create_symlink(link: &LocalPath, target: &LocalPath) -> io::Result<()> {
    fs::symlink(target.as_path(), link.as_path()).await
}

pub(crate) async fn set_modified_at(path: &LocalPath, modified_at: SystemTime) -> io::Result<()> {
    let path = path.as_path().to_path_buf();
    blocking(move || {
        filetime::set_symlink_file_times(
            &path,
            filetime::FileTime::from_last_access_time(&std::fs::symlink_metadata(&path)?),
            filetime::FileTime::from_system_time(modified_at),
        )
    })
    .await
}

pub(crate) async fn set_permissions(path: &LocalPath, permissions: Permissions) -> io::Result<()> {
    fs::set_permissions(
        path.as_path(),
        std::fs::Permissions::from_mode(permissions.mode()),
    )
    .await
}

pub(crate) async fn set_ownership(path: &LocalPath, ownership: Ownership) -> io::Result<()> {
    let path = path.as_path().to_path_buf();
    blocking(move || {
        std::os::unix::fs::lchown(&path, Some(ownership.user_id), Some(ownership.group_id))
    })
    .await
}
