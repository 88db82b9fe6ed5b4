//! Convenience operations built on the gateway contract.

use async_trait::async_trait;
use futures::TryStreamExt;
use futures::future::BoxFuture;
use pathgate_types::APathLookup;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::debug;

use super::walk::PathTreeWalker;
use super::{APathGateway, GatewayError, GatewayResult};

/// Predicate for [`GatewayExt::delete_all`].
pub type DeleteFilter<'f, P> = &'f (dyn Fn(&APathLookup<P>) -> bool + Send + Sync);

/// Higher-level helpers, available on every gateway.
#[async_trait]
pub trait GatewayExt: APathGateway {
    /// Make sure a directory exists at `path`.
    async fn create_dir_if_necessary(&self, path: &Self::Path) -> GatewayResult<()> {
        if self.exists(path).await? {
            if self.is_directory(path).await? {
                return Ok(());
            }
            return Err(GatewayError::write_msg(
                path.clone(),
                "exists but is not a directory",
            ));
        }
        self.create_dir(path).await?;
        Ok(())
    }

    /// Make sure a file exists at `path`.
    async fn create_file_if_necessary(&self, path: &Self::Path) -> GatewayResult<()> {
        if self.exists(path).await? {
            if self.is_file(path).await? {
                return Ok(());
            }
            return Err(GatewayError::write_msg(path.clone(), "exists but is not a file"));
        }
        self.create_file(path).await?;
        Ok(())
    }

    async fn require_exists(&self, path: &Self::Path) -> GatewayResult<()> {
        if self.exists(path).await? {
            Ok(())
        } else {
            Err(GatewayError::read_msg(path.clone(), "does not exist"))
        }
    }

    async fn require_not_exists(&self, path: &Self::Path) -> GatewayResult<()> {
        if self.exists(path).await? {
            Err(GatewayError::write_msg(path.clone(), "already exists"))
        } else {
            Ok(())
        }
    }

    /// Delete `path` and everything below it that passes `filter`.
    ///
    /// Directories still holding filtered-out entries are left in place.
    /// Returns whether `path` itself was deleted.
    async fn delete_all(
        &self,
        path: &Self::Path,
        filter: Option<DeleteFilter<'_, Self::Path>>,
    ) -> GatewayResult<bool> {
        delete_tree(self, path.clone(), filter).await
    }

    /// Children with metadata, or `None` when the listing fails.
    async fn lookup_files_or_none(
        &self,
        path: &Self::Path,
    ) -> Option<Vec<APathLookup<Self::Path>>> {
        match self.lookup_files(path).await {
            Ok(lookups) => Some(lookups),
            Err(e) => {
                debug!(%path, error = %e, "listing failed");
                None
            }
        }
    }

    async fn is_file(&self, path: &Self::Path) -> GatewayResult<bool> {
        Ok(self.lookup(path).await?.is_file())
    }

    async fn is_directory(&self, path: &Self::Path) -> GatewayResult<bool> {
        Ok(self.lookup(path).await?.is_directory())
    }

    /// Read a whole file into memory.
    async fn read_all(&self, path: &Self::Path) -> GatewayResult<Vec<u8>> {
        let mut reader = self.read(path).await?;
        let mut content = Vec::new();
        reader
            .read_to_end(&mut content)
            .await
            .map_err(|e| GatewayError::read(path.clone(), e))?;
        Ok(content)
    }

    /// Replace a file's content with `data`.
    async fn write_all(&self, path: &Self::Path, data: &[u8]) -> GatewayResult<()> {
        let mut writer = self.write(path).await?;
        let written = async {
            writer.write_all(data).await?;
            writer.shutdown().await
        };
        written
            .await
            .map_err(|e| GatewayError::write(path.clone(), e))
    }

    /// Walk the tree below `start`.
    fn walk(&self, start: Self::Path) -> PathTreeWalker<'_, Self> {
        PathTreeWalker::new(self, start)
    }

    /// Disk usage: the size of `path` plus the size of every entry below it.
    ///
    /// Directory entries count with whatever size the backend reports for
    /// them. Any lookup or listing failure fails the whole sum.
    async fn du(&self, path: &Self::Path) -> GatewayResult<u64> {
        let start = self.lookup(path).await?;
        if !start.is_directory() {
            return Ok(start.size);
        }
        let total = self
            .walk(path.clone())
            .into_stream()
            .try_fold(start.size, |total, entry| async move { Ok(total + entry.size) })
            .await?;
        debug!(%path, total, "du");
        Ok(total)
    }
}

impl<G: APathGateway + ?Sized> GatewayExt for G {}

fn delete_tree<'a, G: APathGateway + ?Sized>(
    gateway: &'a G,
    path: G::Path,
    filter: Option<DeleteFilter<'a, G::Path>>,
) -> BoxFuture<'a, GatewayResult<bool>> {
    Box::pin(async move {
        let lookup = gateway.lookup(&path).await?;
        if filter.is_some_and(|f| !f(&lookup)) {
            return Ok(false);
        }
        let mut complete = true;
        if lookup.is_directory() {
            for child in gateway.list_files(&path).await? {
                complete &= delete_tree(gateway, child, filter).await?;
            }
        }
        if !complete {
            debug!(%path, "keeping directory with filtered entries");
            return Ok(false);
        }
        gateway.delete(&path).await?;
        Ok(true)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LocalConfig;
    use crate::local::LocalGateway;
    use pathgate_types::LocalPath;
    use tempfile::TempDir;

    fn setup() -> (LocalGateway, LocalPath, TempDir) {
        let dir = TempDir::new().unwrap();
        let root = LocalPath::new(dir.path());
        (LocalGateway::new(LocalConfig::default()), root, dir)
    }

    #[tokio::test]
    async fn test_if_necessary_helpers() {
        let (gateway, root, _dir) = setup();
        let dir = root.child(["d"]);
        let file = root.child(["f"]);

        gateway.create_dir_if_necessary(&dir).await.unwrap();
        gateway.create_dir_if_necessary(&dir).await.unwrap();
        gateway.create_file_if_necessary(&file).await.unwrap();
        gateway.create_file_if_necessary(&file).await.unwrap();

        assert!(gateway.create_dir_if_necessary(&file).await.is_err());
        assert!(gateway.create_file_if_necessary(&dir).await.is_err());
        assert!(gateway.is_directory(&dir).await.unwrap());
        assert!(gateway.is_file(&file).await.unwrap());
    }

    #[tokio::test]
    async fn test_require_helpers() {
        let (gateway, root, _dir) = setup();
        let missing = root.child(["missing"]);
        assert!(gateway.require_exists(&root).await.is_ok());
        assert!(gateway.require_exists(&missing).await.is_err());
        assert!(gateway.require_not_exists(&missing).await.is_ok());
        assert!(gateway.require_not_exists(&root).await.is_err());
    }

    #[tokio::test]
    async fn test_read_all_write_all() {
        let (gateway, root, _dir) = setup();
        let file = root.child(["data"]);
        gateway.write_all(&file, b"some bytes").await.unwrap();
        assert_eq!(gateway.read_all(&file).await.unwrap(), b"some bytes");
    }

    #[tokio::test]
    async fn test_delete_all() {
        let (gateway, root, _dir) = setup();
        let tree = root.child(["tree"]);
        gateway.create_file(&tree.child(["a", "1"])).await.unwrap();
        gateway.create_file(&tree.child(["a", "2"])).await.unwrap();
        gateway.create_file(&tree.child(["b"])).await.unwrap();

        assert!(gateway.delete_all(&tree, None).await.unwrap());
        assert!(!gateway.exists(&tree).await.unwrap());
    }

    #[tokio::test]
    async fn test_delete_all_keeps_filtered() {
        let (gateway, root, _dir) = setup();
        let tree = root.child(["tree"]);
        gateway.create_file(&tree.child(["keep"])).await.unwrap();
        gateway.create_file(&tree.child(["drop"])).await.unwrap();

        let filter = |l: &APathLookup<LocalPath>| l.lookedup.name() != "keep";
        assert!(!gateway.delete_all(&tree, Some(&filter)).await.unwrap());
        assert!(gateway.exists(&tree.child(["keep"])).await.unwrap());
        assert!(!gateway.exists(&tree.child(["drop"])).await.unwrap());
    }

    #[tokio::test]
    async fn test_lookup_files_or_none() {
        let (gateway, root, _dir) = setup();
        assert!(gateway.lookup_files_or_none(&root.child(["nope"])).await.is_none());
        assert_eq!(gateway.lookup_files_or_none(&root).await.unwrap().len(), 0);
    }

    #[tokio::test]
    async fn test_du_sums_tree() {
        let (gateway, root, _dir) = setup();
        let dir = root.child(["dir"]);
        let sub = dir.child(["sub"]);
        gateway.write_all(&dir.child(["hello"]), b"hello").await.unwrap();
        gateway.write_all(&sub.child(["world"]), b"world!!").await.unwrap();

        assert_eq!(gateway.du(&dir.child(["hello"])).await.unwrap(), 5);

        let dirs = gateway.lookup(&dir).await.unwrap().size
            + gateway.lookup(&sub).await.unwrap().size;
        assert_eq!(gateway.du(&dir).await.unwrap(), dirs + 12);
        assert!(gateway.du(&root.child(["missing"])).await.is_err());
    }

    #[tokio::test]
    async fn test_walk_helper() {
        let (gateway, root, _dir) = setup();
        gateway.create_file(&root.child(["x", "y"])).await.unwrap();
        let found: Vec<_> = gateway.walk(root).into_stream().try_collect().await.unwrap();
        assert_eq!(found.len(), 2);
    }
}
