use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use log::{debug, info, warn};
use serde::Serialize;
use utoipa::ToSchema;

use crate::color::{ColorQuery, Palette};
use crate::config::ConfDir;
use crate::driver::{self, BatchGuard, NoProgress, Progress};
use crate::error::{Error, ExtractionError, Result};
use crate::extract::{Embedder, KMeansPalette, PaletteExtractor};
use crate::identity::Identity;
use crate::metrics::{self, SearchKind};
use crate::rank::{self, Hit};
use crate::scan::{DEFAULT_SUFFIX, Delta, Scanner};
use crate::store::{LoadStatus, VectorStore};

pub struct ImageSearchBuilder {
    conf_dir: ConfDir,
    suffix: String,
    embedder: Option<Arc<dyn Embedder>>,
    palette: Arc<dyn PaletteExtractor>,
}

impl ImageSearchBuilder {
    pub fn new(conf_dir: ConfDir) -> Self {
        Self {
            conf_dir,
            suffix: DEFAULT_SUFFIX.to_owned(),
            embedder: None,
            palette: Arc::new(KMeansPalette::default()),
        }
    }

    /// 扫描的文件后缀名，多个后缀用逗号分隔
    pub fn suffix(mut self, suffix: impl Into<String>) -> Self {
        self.suffix = suffix.into();
        self
    }

    pub fn embedder(mut self, embedder: Arc<dyn Embedder>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    pub fn palette_extractor(mut self, palette: Arc<dyn PaletteExtractor>) -> Self {
        self.palette = palette;
        self
    }

    /// 加载缓存并创建引擎，缓存文件损坏时使用空缓存
    pub fn open(self) -> anyhow::Result<ImageSearch> {
        let scanner = Scanner::new(&self.suffix)?;
        let (semantic, semantic_status) = VectorStore::load(self.conf_dir.semantic_store());
        let (palettes, palette_status) = VectorStore::load(self.conf_dir.palette_store());
        debug!("语义缓存: {:?}，调色板缓存: {:?}", semantic_status, palette_status);
        if self.embedder.is_none() {
            info!("未配置嵌入服务，文本搜索不可用");
        }

        Ok(ImageSearch {
            conf_dir: self.conf_dir,
            scanner,
            semantic,
            palettes,
            load_status: [semantic_status, palette_status],
            embedder: self.embedder,
            palette: self.palette,
            batch: BatchGuard::default(),
        })
    }
}

/// 一次目录同步的结果
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct ReconcileReport {
    /// 成功提取特征的图片数量
    pub added: usize,
    /// 从缓存中移除的图片数量
    pub removed: usize,
    /// 提取失败被跳过的图片数量
    pub failed: usize,
    /// 是否被中途取消
    pub cancelled: bool,
    /// 是否写入了磁盘
    pub saved: bool,
}

/// 缓存状态
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct Status {
    /// 语义向量数量
    pub semantic: usize,
    /// 调色板数量
    pub palettes: usize,
    /// 语义向量维度
    pub dimension: Option<usize>,
    /// 是否有批处理任务正在运行
    pub processing: bool,
    /// 是否可以使用文本搜索
    pub text_search: bool,
}

/// 图片特征缓存与搜索引擎
pub struct ImageSearch {
    conf_dir: ConfDir,
    scanner: Scanner,
    semantic: VectorStore<Vec<f32>>,
    palettes: VectorStore<Palette>,
    load_status: [LoadStatus; 2],
    embedder: Option<Arc<dyn Embedder>>,
    palette: Arc<dyn PaletteExtractor>,
    batch: BatchGuard,
}

impl ImageSearch {
    pub fn conf_dir(&self) -> &ConfDir {
        &self.conf_dir
    }

    pub fn semantic(&self) -> &VectorStore<Vec<f32>> {
        &self.semantic
    }

    pub fn palettes(&self) -> &VectorStore<Palette> {
        &self.palettes
    }

    /// 语义缓存和调色板缓存的加载结果
    pub fn load_status(&self) -> &[LoadStatus; 2] {
        &self.load_status
    }

    /// 使用文本搜索图片
    ///
    /// 查询为空或缓存为空时返回空结果；查询会阻塞调用嵌入服务
    pub fn search_text(&self, query: &str, limit: usize) -> Result<Vec<Hit>> {
        let query = query.trim();
        if query.is_empty() || self.semantic.is_empty() {
            return Ok(vec![]);
        }
        let embedder = self.embedder.as_ref().ok_or(Error::EmbedderUnavailable)?;

        let start = Instant::now();
        let vector = embedder.embed_text(query)?;
        debug!("文本嵌入耗时: {:.2}ms", start.elapsed().as_secs_f32() * 1000.);

        let hits = rank::rank_semantic(&vector, &self.semantic, limit);
        metrics::observe_search(SearchKind::Text, start.elapsed().as_secs_f32(), hits.len());
        Ok(hits)
    }

    /// 使用颜色搜索图片，搜索前会补全缺失的调色板
    pub fn search_color(&self, query: &ColorQuery, limit: usize) -> Vec<Hit> {
        match self.backfill_palettes(&NoProgress) {
            Ok(0) => {}
            Ok(n) => info!("补全了 {} 张图片的调色板", n),
            Err(e) => info!("跳过调色板补全: {}", e),
        }

        let start = Instant::now();
        let hits = rank::rank_color(query, &self.palettes, limit);
        metrics::observe_search(SearchKind::Color, start.elapsed().as_secs_f32(), hits.len());
        hits
    }

    /// 为语义缓存中存在、调色板缓存中缺失的图片提取调色板，返回成功的数量
    pub fn backfill_palettes(&self, progress: &dyn Progress) -> Result<usize> {
        let token = self.batch.try_begin()?;
        let missing = self.semantic.read(|entries| {
            entries.keys().filter(|id| !self.palettes.contains(id)).cloned().collect::<Vec<_>>()
        });
        if missing.is_empty() {
            return Ok(0);
        }

        let stats = driver::process(
            &missing,
            |id| {
                let palette = self.palette.extract_palette(id.as_path())?;
                self.palettes.put(id.clone(), palette);
                Ok(())
            },
            progress,
            token.cancel_flag(),
        );
        self.palettes.save_if_dirty();
        Ok(stats.processed)
    }

    /// 将缓存与目录同步
    ///
    /// 目录中的新图片会提取缺失的特征，已不存在的图片会从所有缓存中移除。
    /// 同一时间只允许一个批处理任务，目录无法读取时不会修改缓存。
    pub fn reconcile(&self, folder: &Path, progress: &dyn Progress) -> Result<ReconcileReport> {
        let token = self.batch.try_begin()?;

        let on_disk = self.scanner.list(folder)?;
        let known = self.known_identities();
        let delta = Delta::between(&on_disk, &known);

        // 新图片以及只存在于其中一个缓存中的图片
        let pending = on_disk.iter().filter(|id| self.needs_features(id)).collect::<Vec<_>>();
        info!(
            "目录 {}：新增 {} 张，待处理 {} 张，移除 {} 张",
            folder.display(),
            delta.to_add.len(),
            pending.len(),
            delta.to_remove.len()
        );

        let stats = driver::process(
            pending.iter().copied(),
            |id| self.extract_missing(id),
            progress,
            token.cancel_flag(),
        );

        let mut removed = 0;
        for id in &delta.to_remove {
            let a = self.semantic.remove(id);
            let b = self.palettes.remove(id);
            if a || b {
                removed += 1;
            }
        }

        let saved = self.save_if_dirty();
        let report = ReconcileReport {
            added: stats.processed,
            removed,
            failed: stats.failed,
            cancelled: stats.cancelled,
            saved,
        };
        info!("同步完成: {:?}", report);
        Ok(report)
    }

    fn known_identities(&self) -> BTreeSet<Identity> {
        let mut known = self.semantic.keys().into_iter().collect::<BTreeSet<_>>();
        known.extend(self.palettes.keys());
        known
    }

    fn needs_features(&self, id: &Identity) -> bool {
        (self.embedder.is_some() && !self.semantic.contains(id)) || !self.palettes.contains(id)
    }

    // 只计算缺失的特征，全部成功后才写入缓存
    fn extract_missing(&self, id: &Identity) -> Result<(), ExtractionError> {
        let vector = match &self.embedder {
            Some(embedder) if !self.semantic.contains(id) => {
                let vector = embedder.embed_image(id.as_path())?;
                if let Some(expected) = self.semantic.dimension() {
                    if expected != vector.len() {
                        return Err(ExtractionError::Dimension { expected, actual: vector.len() });
                    }
                }
                Some(vector)
            }
            _ => None,
        };
        let palette = if self.palettes.contains(id) {
            None
        } else {
            Some(self.palette.extract_palette(id.as_path())?)
        };

        if let Some(vector) = vector {
            self.semantic.put(id.clone(), vector);
        }
        if let Some(palette) = palette {
            self.palettes.put(id.clone(), palette);
        }
        Ok(())
    }

    /// 将缓存中的 `old` 重命名为 `new`，返回是否有缓存被修改
    ///
    /// 任一缓存中已存在 `new` 时返回 [`Error::IdentityConflict`]，所有缓存保持不变
    pub fn rename(&self, old: &Identity, new: &Identity) -> Result<bool> {
        let in_semantic = self.semantic.check_rename(old, new)?;
        let in_palettes = self.palettes.check_rename(old, new)?;
        if old == new || !(in_semantic || in_palettes) {
            return Ok(false);
        }

        let moved_semantic = self.semantic.rename_key(old, new)?;
        let moved_palettes = match self.palettes.rename_key(old, new) {
            Ok(moved) => moved,
            Err(e) => {
                // 检查之后调色板缓存被并发写入了 `new`，回滚语义缓存
                if moved_semantic {
                    self.semantic.rename_key(new, old)?;
                }
                return Err(e);
            }
        };

        if moved_semantic {
            self.semantic.save();
        }
        if moved_palettes {
            self.palettes.save();
        }
        info!("重命名 {} -> {}", old, new);
        Ok(moved_semantic || moved_palettes)
    }

    /// 从所有缓存中删除图片，返回图片是否存在于任一缓存中
    pub fn delete(&self, id: &Identity) -> bool {
        let in_semantic = self.semantic.remove(id);
        let in_palettes = self.palettes.remove(id);
        if in_semantic {
            self.semantic.save();
        }
        if in_palettes {
            self.palettes.save();
        }
        if in_semantic || in_palettes {
            info!("已从缓存中删除 {}", id);
        }
        in_semantic || in_palettes
    }

    /// 请求取消正在运行的批处理，返回是否有任务在运行
    pub fn cancel_batch(&self) -> bool {
        let running = self.batch.cancel();
        if running {
            warn!("已请求取消当前批处理");
        }
        running
    }

    pub fn is_processing(&self) -> bool {
        self.batch.is_busy()
    }

    /// 保存有修改的缓存，返回是否写入了任何文件
    pub fn save_if_dirty(&self) -> bool {
        let a = self.semantic.save_if_dirty();
        let b = self.palettes.save_if_dirty();
        a || b
    }

    pub fn status(&self) -> Status {
        Status {
            semantic: self.semantic.len(),
            palettes: self.palettes.len(),
            dimension: self.semantic.dimension(),
            processing: self.is_processing(),
            text_search: self.embedder.is_some(),
        }
    }
}
