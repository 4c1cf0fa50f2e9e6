use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::Path;

use log::{debug, warn};
use regex::Regex;
use walkdir::WalkDir;

use crate::error::{Error, Result};
use crate::identity::Identity;

/// 默认扫描的图片后缀名
pub const DEFAULT_SUFFIX: &str = "jpg,jpeg,png,gif";

/// 目录与缓存之间的差异
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Delta {
    /// 磁盘上存在但缓存中没有的图片
    pub to_add: BTreeSet<Identity>,
    /// 缓存中存在但磁盘上已经没有的图片
    pub to_remove: BTreeSet<Identity>,
}

impl Delta {
    /// 计算磁盘上的图片与已知图片之间的差集
    pub fn between<'a>(
        on_disk: &BTreeSet<Identity>,
        known: impl IntoIterator<Item = &'a Identity>,
    ) -> Self {
        let known = known.into_iter().collect::<BTreeSet<_>>();
        let to_add = on_disk.iter().filter(|id| !known.contains(id)).cloned().collect();
        let to_remove = known.into_iter().filter(|id| !on_disk.contains(*id)).cloned().collect();
        Self { to_add, to_remove }
    }

    pub fn is_empty(&self) -> bool {
        self.to_add.is_empty() && self.to_remove.is_empty()
    }
}

/// 扫描单个目录下的图片文件，不递归
#[derive(Debug, Clone)]
pub struct Scanner {
    re_suf: Regex,
}

impl Scanner {
    /// `suffix` 为逗号分隔的后缀名列表，匹配时忽略大小写
    pub fn new(suffix: &str) -> Result<Self, regex::Error> {
        let alternatives = suffix
            .split(',')
            .map(|s| regex::escape(s.trim().trim_start_matches('.')))
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join("|");
        let re_suf = Regex::new(&format!("(?i)^({alternatives})$"))?;
        Ok(Self { re_suf })
    }

    pub fn is_image(&self, path: &Path) -> bool {
        path.extension().is_some_and(|ext| self.re_suf.is_match(&ext.to_string_lossy()))
    }

    /// 列出目录下的所有图片
    ///
    /// 目录无法读取时返回错误，不会返回部分结果。
    /// 无法读取的条目和非 UTF-8 文件名会被跳过
    pub fn list(&self, folder: &Path) -> Result<BTreeSet<Identity>> {
        let unreadable = |source: io::Error| Error::FolderUnreadable {
            path: folder.to_path_buf(),
            source,
        };

        if !folder.is_dir() {
            let source = match folder.metadata() {
                Ok(_) => io::Error::new(io::ErrorKind::InvalidInput, "不是目录"),
                Err(e) => e,
            };
            return Err(unreadable(source));
        }

        // 只有目录本身无法读取时才算失败，单个条目的错误直接跳过
        fs::read_dir(folder).map_err(unreadable)?;

        let mut images = BTreeSet::new();
        for entry in WalkDir::new(folder).min_depth(1).max_depth(1).follow_links(true) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) if e.depth() == 0 => {
                    let source =
                        e.into_io_error().unwrap_or_else(|| io::Error::other("目录不可读"));
                    return Err(unreadable(source));
                }
                Err(e) => {
                    warn!("跳过无法读取的文件: {e}");
                    continue;
                }
            };
            if !entry.file_type().is_file() || !self.is_image(entry.path()) {
                continue;
            }
            match Identity::from_path(entry.path()) {
                Ok(id) => {
                    images.insert(id);
                }
                Err(e) => warn!("跳过 {}: {}", entry.path().display(), e),
            }
        }

        debug!("目录 {} 中共有 {} 张图片", folder.display(), images.len());
        Ok(images)
    }

    /// 计算目录与已知图片之间的差异
    pub fn diff<'a>(
        &self,
        folder: &Path,
        known: impl IntoIterator<Item = &'a Identity>,
    ) -> Result<Delta> {
        let on_disk = self.list(folder)?;
        Ok(Delta::between(&on_disk, known))
    }
}

impl Default for Scanner {
    fn default() -> Self {
        Self::new(DEFAULT_SUFFIX).expect("default suffix must be a valid regex")
    }
}
