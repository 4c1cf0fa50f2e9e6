use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Result, anyhow};
use bincode::Options;
use indexmap::IndexMap;
use log::{debug, info, warn};
use parking_lot::{Mutex, RwLock};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::identity::Identity;

/// 存储文件格式版本
const STORE_VERSION: u32 = 1;

/// 磁盘上的存储格式
#[derive(Serialize, Deserialize)]
struct StoreFile<V> {
    version: u32,
    entries: Vec<(Identity, V)>,
}

/// 加载存储文件的结果
#[derive(Debug, Clone, PartialEq)]
pub enum LoadStatus {
    /// 成功加载，包含条目数量
    Loaded(usize),
    /// 文件不存在
    Missing,
    /// 文件损坏，已使用空存储代替
    Corrupt(String),
}

/// 图片标识到特征的持久化映射
///
/// 条目保持插入顺序，排序时分数相同的条目按该顺序排列。
/// 内存中的映射由读写锁保护，单个条目的写入是原子的；
/// 保存操作之间由单独的锁串行化。
pub struct VectorStore<V> {
    path: PathBuf,
    entries: RwLock<IndexMap<Identity, V>>,
    save_lock: Mutex<()>,
    dirty: AtomicBool,
}

impl<V> VectorStore<V>
where
    V: Clone + Serialize + DeserializeOwned,
{
    /// 创建一个空存储，不会读取磁盘
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            entries: RwLock::new(IndexMap::new()),
            save_lock: Mutex::new(()),
            dirty: AtomicBool::new(false),
        }
    }

    /// 从磁盘加载，任何错误都只会得到一个空存储
    pub fn load(path: impl Into<PathBuf>) -> (Self, LoadStatus) {
        let store = Self::new(path);
        let status = match read_store_file::<V>(&store.path) {
            Ok(Some(entries)) => {
                let len = entries.len();
                *store.entries.write() = entries.into_iter().collect();
                info!("从 {} 加载了 {} 条缓存", store.path.display(), len);
                LoadStatus::Loaded(len)
            }
            Ok(None) => LoadStatus::Missing,
            Err(e) => {
                warn!("缓存文件 {} 已损坏，将使用空缓存: {}", store.path.display(), e);
                LoadStatus::Corrupt(e.to_string())
            }
        };
        (store, status)
    }

    /// 保存到磁盘，先写入临时文件再替换，失败时旧文件保持不变
    pub fn save(&self) -> bool {
        match self.try_save() {
            Ok(()) => true,
            Err(e) => {
                warn!("保存缓存 {} 失败: {}", self.path.display(), e);
                false
            }
        }
    }

    /// 仅在内容有变化时保存，返回是否执行了保存
    pub fn save_if_dirty(&self) -> bool {
        self.dirty.load(Ordering::Acquire) && self.save()
    }

    fn try_save(&self) -> Result<()> {
        let _guard = self.save_lock.lock();
        // 先清除标记，保存期间发生的写入会重新标记
        self.dirty.store(false, Ordering::Release);
        let file = StoreFile { version: STORE_VERSION, entries: self.snapshot() };

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let tmp = self.tmp_path();
        let result = (|| -> Result<()> {
            let mut writer = BufWriter::new(File::create(&tmp)?);
            codec().serialize_into(&mut writer, &file)?;
            writer.flush()?;
            writer.get_ref().sync_all()?;
            fs::rename(&tmp, &self.path)?;
            Ok(())
        })();

        if result.is_err() {
            self.dirty.store(true, Ordering::Release);
            let _ = fs::remove_file(&tmp);
        } else {
            debug!("已保存 {} 条缓存到 {}", file.entries.len(), self.path.display());
        }
        result
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self.path.file_name().unwrap_or_default().to_os_string();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    pub fn get(&self, id: &Identity) -> Option<V> {
        self.entries.read().get(id).cloned()
    }

    /// 写入一个条目，返回旧值
    pub fn put(&self, id: Identity, value: V) -> Option<V> {
        let old = self.entries.write().insert(id, value);
        self.dirty.store(true, Ordering::Release);
        old
    }

    pub fn remove(&self, id: &Identity) -> bool {
        let removed = self.entries.write().shift_remove(id).is_some();
        if removed {
            self.dirty.store(true, Ordering::Release);
        }
        removed
    }

    pub fn contains(&self, id: &Identity) -> bool {
        self.entries.read().contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::Acquire)
    }

    /// 当前所有标识的快照
    pub fn keys(&self) -> Vec<Identity> {
        self.entries.read().keys().cloned().collect()
    }

    /// 当前所有条目的快照
    pub fn snapshot(&self) -> Vec<(Identity, V)> {
        self.entries.read().iter().map(|(k, v)| (k.clone(), v.clone())).collect()
    }

    /// 在读锁下访问全部条目，避免复制
    pub fn read<R>(&self, f: impl FnOnce(&IndexMap<Identity, V>) -> R) -> R {
        f(&self.entries.read())
    }

    /// 检查 `old` 能否重命名为 `new`，返回 `old` 是否存在
    pub fn check_rename(&self, old: &Identity, new: &Identity) -> Result<bool, Error> {
        let entries = self.entries.read();
        check_rename(&entries, old, new)
    }

    /// 将 `old` 的值移动到 `new`，返回是否发生了移动
    ///
    /// `new` 已存在时返回 [`Error::IdentityConflict`]，此时不做任何修改
    pub fn rename_key(&self, old: &Identity, new: &Identity) -> Result<bool, Error> {
        let mut entries = self.entries.write();
        if !check_rename(&entries, old, new)? || old == new {
            return Ok(false);
        }
        if let Some(value) = entries.shift_remove(old) {
            entries.insert(new.clone(), value);
        }
        self.dirty.store(true, Ordering::Release);
        Ok(true)
    }
}

impl VectorStore<Vec<f32>> {
    /// 向量维度，由第一条记录决定
    pub fn dimension(&self) -> Option<usize> {
        self.entries.read().first().map(|(_, v)| v.len())
    }
}

fn check_rename<V>(
    entries: &IndexMap<Identity, V>,
    old: &Identity,
    new: &Identity,
) -> Result<bool, Error> {
    if !entries.contains_key(old) {
        return Ok(false);
    }
    if old != new && entries.contains_key(new) {
        return Err(Error::IdentityConflict(new.clone()));
    }
    Ok(true)
}

fn codec() -> impl Options {
    bincode::DefaultOptions::new()
}

fn read_store_file<V: DeserializeOwned>(path: &Path) -> Result<Option<Vec<(Identity, V)>>> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    // 限制读取长度不超过文件大小，避免损坏的长度字段导致巨大的内存分配
    let limit = file.metadata()?.len();
    let file: StoreFile<V> = codec().with_limit(limit).deserialize_from(BufReader::new(file))?;
    if file.version != STORE_VERSION {
        return Err(anyhow!("不支持的缓存版本: {}", file.version));
    }
    Ok(Some(file.entries))
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;
    use crate::color::{PaletteEntry, Rgb};

    fn id(s: &str) -> Identity {
        Identity::from(s)
    }

    #[test]
    fn test_basic_operations() {
        let store = VectorStore::<Vec<f32>>::new("/nonexistent/store.bin");
        assert!(store.is_empty());
        assert_eq!(store.put(id("a"), vec![1.0, 2.0]), None);
        assert!(store.contains(&id("a")));
        assert_eq!(store.get(&id("a")), Some(vec![1.0, 2.0]));
        assert_eq!(store.len(), 1);
        assert_eq!(store.dimension(), Some(2));
        assert!(store.remove(&id("a")));
        assert!(!store.remove(&id("a")));
        assert_eq!(store.get(&id("a")), None);
    }

    #[test]
    fn test_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("semantic.bin");
        let store = VectorStore::new(&path);
        store.put(id("/a.jpg"), vec![0.1f32, -0.2, f32::MIN_POSITIVE, 1e30]);
        store.put(id("/b.jpg"), vec![3.0, 4.0, 5.0, 6.0]);
        assert!(store.save());
        assert!(!store.is_dirty());

        let (loaded, status) = VectorStore::<Vec<f32>>::load(&path);
        assert_eq!(status, LoadStatus::Loaded(2));
        assert_eq!(loaded.snapshot(), store.snapshot());
    }

    #[test]
    fn test_palette_round_trip_keeps_order() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("palette.bin");
        let store = VectorStore::new(&path);
        let palette = vec![
            PaletteEntry { color: Rgb([10, 20, 30]), weight: 0.6 },
            PaletteEntry { color: Rgb([200, 100, 0]), weight: 0.4 },
        ];
        store.put(id("/a.png"), palette.clone());
        assert!(store.save());

        let (loaded, _) = VectorStore::<Vec<PaletteEntry>>::load(&path);
        assert_eq!(loaded.get(&id("/a.png")), Some(palette));
    }

    #[test]
    fn test_missing_file() {
        let dir = TempDir::new().unwrap();
        let (store, status) = VectorStore::<Vec<f32>>::load(dir.path().join("none.bin"));
        assert_eq!(status, LoadStatus::Missing);
        assert!(store.is_empty());
    }

    #[test]
    fn test_corrupt_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("semantic.bin");
        fs::write(&path, b"definitely not bincode").unwrap();
        let (store, status) = VectorStore::<Vec<f32>>::load(&path);
        assert!(matches!(status, LoadStatus::Corrupt(_)));
        assert!(store.is_empty());
    }

    #[test]
    fn test_save_leaves_no_tmp_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("semantic.bin");
        let store = VectorStore::new(&path);
        store.put(id("/a.jpg"), vec![1.0f32]);
        assert!(store.save());
        let files = fs::read_dir(path.parent().unwrap()).unwrap().count();
        assert_eq!(files, 1);
        assert!(path.exists());
    }

    #[test]
    fn test_save_if_dirty() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("semantic.bin");
        let store = VectorStore::<Vec<f32>>::new(&path);
        assert!(!store.save_if_dirty());
        assert!(!path.exists());
        store.put(id("/a.jpg"), vec![1.0]);
        assert!(store.save_if_dirty());
        assert!(!store.save_if_dirty());
    }

    #[test]
    fn test_rename_key() {
        let store = VectorStore::<Vec<f32>>::new("/nonexistent");
        let v = vec![0.123_456_79f32, -7.0];
        store.put(id("old"), v.clone());
        store.put(id("other"), vec![1.0, 1.0]);

        assert!(store.rename_key(&id("old"), &id("new")).unwrap());
        assert_eq!(store.get(&id("old")), None);
        assert_eq!(store.get(&id("new")).unwrap(), v);
        // 重命名后的条目移动到末尾
        assert_eq!(store.keys(), vec![id("other"), id("new")]);

        // 不存在的标识不做任何事
        assert!(!store.rename_key(&id("missing"), &id("x")).unwrap());
    }

    #[test]
    fn test_rename_key_conflict() {
        let store = VectorStore::<Vec<f32>>::new("/nonexistent");
        store.put(id("a"), vec![1.0]);
        store.put(id("b"), vec![2.0]);
        let err = store.rename_key(&id("a"), &id("b")).unwrap_err();
        assert!(matches!(err, Error::IdentityConflict(ref x) if *x == id("b")));
        assert_eq!(store.get(&id("a")), Some(vec![1.0]));
        assert_eq!(store.get(&id("b")), Some(vec![2.0]));
    }

    #[test]
    fn test_remove_keeps_order() {
        let store = VectorStore::<Vec<f32>>::new("/nonexistent");
        for name in ["a", "b", "c", "d"] {
            store.put(id(name), vec![]);
        }
        store.remove(&id("b"));
        assert_eq!(store.keys(), vec![id("a"), id("c"), id("d")]);
    }
}
