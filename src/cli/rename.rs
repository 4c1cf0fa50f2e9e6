use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Result, bail};
use clap::Parser;
use log::{error, warn};
use tokio::task::block_in_place;

use crate::cli::SubCommandExtend;
use crate::config::Opts;
use crate::engine::ImageSearchBuilder;
use crate::identity::Identity;

#[derive(Parser, Debug, Clone)]
pub struct RenameCommand {
    /// 需要重命名的图片
    pub path: PathBuf,
    /// 新的文件名或路径，不带后缀名时沿用原来的后缀名
    pub new_name: String,
}

impl SubCommandExtend for RenameCommand {
    async fn run(&self, opts: &Opts) -> anyhow::Result<()> {
        let target = rename_target(&self.path, &self.new_name);
        if target.exists() {
            bail!("目标文件已存在: {}", target.display());
        }
        let old = Identity::from_path(&self.path)?;
        let new = Identity::from_path(&target)?;

        block_in_place(|| -> Result<()> {
            let db = ImageSearchBuilder::new(opts.conf_dir.clone()).open()?;
            fs::rename(&self.path, &target)?;
            match db.rename(&old, &new) {
                Ok(true) => {}
                Ok(false) => warn!("{} 不在缓存中，仅重命名了文件", old),
                Err(e) => {
                    // 缓存未被修改，恢复文件名
                    if let Err(e) = fs::rename(&target, &self.path) {
                        error!("恢复文件名失败: {}", e);
                    }
                    return Err(e.into());
                }
            }
            Ok(())
        })?;

        println!("{} -> {}", old, new);
        Ok(())
    }
}

fn rename_target(path: &Path, new_name: &str) -> PathBuf {
    let mut target = if new_name.contains(std::path::MAIN_SEPARATOR) {
        PathBuf::from(new_name)
    } else {
        path.with_file_name(new_name)
    };
    if target.extension().is_none() {
        if let Some(ext) = path.extension() {
            target.set_extension(ext);
        }
    }
    target
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rename_target_keeps_extension() {
        assert_eq!(rename_target(Path::new("/a/b.jpg"), "c"), Path::new("/a/c.jpg"));
        assert_eq!(rename_target(Path::new("/a/b.jpg"), "c.png"), Path::new("/a/c.png"));
        assert_eq!(rename_target(Path::new("/a/b.jpg"), "/d/e"), Path::new("/d/e.jpg"));
    }
}
