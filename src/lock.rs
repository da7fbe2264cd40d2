use std::fs::File;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use nix::errno::Errno;
use nix::fcntl::{Flock, FlockArg};
use tracing::debug;

/// 配置文件上的排他锁，同一份配置同时只允许一次基准测试
///
/// 锁在drop时释放。
pub struct ConfigLock {
    _lock: Flock<File>,
    path: PathBuf,
}

impl ConfigLock {
    /// 不等待地加锁，已被其他进程持有时返回 `None`
    pub fn try_acquire(path: impl AsRef<Path>) -> Result<Option<Self>> {
        let path = path.as_ref();
        let file = File::open(path)
            .with_context(|| format!("打开配置文件失败: {}", path.display()))?;

        match Flock::lock(file, FlockArg::LockExclusiveNonblock) {
            Ok(lock) => {
                debug!("已锁定配置文件: {}", path.display());
                Ok(Some(Self {
                    _lock: lock,
                    path: path.to_path_buf(),
                }))
            }
            Err((_, errno)) if errno == Errno::EWOULDBLOCK => Ok(None),
            Err((_, errno)) => Err(anyhow::anyhow!(
                "锁定配置文件失败: {}: {}",
                path.display(),
                errno
            )),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
