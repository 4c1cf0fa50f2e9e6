use std::sync::atomic::{AtomicBool, Ordering};

use log::{info, warn};
use serde::Serialize;

use crate::error::{Error, ExtractionError, Result};
use crate::identity::Identity;
use crate::metrics;

/// 单张图片的处理状态
#[derive(Debug, Clone, Copy)]
pub enum ItemStatus<'a> {
    Started,
    Extracted,
    Failed(&'a ExtractionError),
}

/// 批处理进度回调，`index` 从 0 开始
pub trait Progress: Sync {
    fn report(&self, index: usize, total: usize, id: &Identity, status: ItemStatus<'_>);
}

impl<F> Progress for F
where
    F: Fn(usize, usize, &Identity, ItemStatus<'_>) + Sync,
{
    fn report(&self, index: usize, total: usize, id: &Identity, status: ItemStatus<'_>) {
        self(index, total, id, status)
    }
}

/// 不报告任何进度
pub struct NoProgress;

impl Progress for NoProgress {
    fn report(&self, _: usize, _: usize, _: &Identity, _: ItemStatus<'_>) {}
}

/// 将进度输出到日志，用于没有终端的场景
pub struct LogProgress;

impl Progress for LogProgress {
    fn report(&self, index: usize, total: usize, id: &Identity, status: ItemStatus<'_>) {
        match status {
            ItemStatus::Started => {}
            ItemStatus::Extracted => info!("[{}/{}] {}", index + 1, total, id),
            ItemStatus::Failed(e) => warn!("[{}/{}] 跳过 {}: {}", index + 1, total, id, e),
        }
    }
}

/// 一次批处理的统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchStats {
    /// 成功提取的图片数量
    pub processed: usize,
    /// 提取失败被跳过的图片数量
    pub failed: usize,
    /// 是否被中途取消
    pub cancelled: bool,
}

/// 依次对每张图片调用 `extract`
///
/// 单张图片失败只会被跳过；`cancel` 只在两张图片之间检查，不会打断正在进行的提取
pub fn process<'a, I, F>(
    identities: I,
    mut extract: F,
    progress: &dyn Progress,
    cancel: &AtomicBool,
) -> BatchStats
where
    I: IntoIterator<Item = &'a Identity>,
    I::IntoIter: ExactSizeIterator,
    F: FnMut(&Identity) -> Result<(), ExtractionError>,
{
    let identities = identities.into_iter();
    let total = identities.len();
    let mut stats = BatchStats::default();

    for (index, id) in identities.enumerate() {
        if cancel.load(Ordering::Acquire) {
            info!("批处理已取消，剩余 {} 张图片未处理", total - index);
            stats.cancelled = true;
            break;
        }
        progress.report(index, total, id, ItemStatus::Started);
        match extract(id) {
            Ok(()) => {
                stats.processed += 1;
                metrics::inc_batch_item("extracted");
                progress.report(index, total, id, ItemStatus::Extracted);
            }
            Err(e) => {
                stats.failed += 1;
                metrics::inc_batch_item("failed");
                progress.report(index, total, id, ItemStatus::Failed(&e));
            }
        }
    }

    stats
}

/// 保证同一时间最多只有一个批处理任务
#[derive(Debug, Default)]
pub struct BatchGuard {
    busy: AtomicBool,
    cancel: AtomicBool,
}

impl BatchGuard {
    /// 开始一个批处理，已有任务在运行时直接拒绝
    pub fn try_begin(&self) -> Result<BatchToken<'_>> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| Error::ConcurrentBatchRejected)?;
        self.cancel.store(false, Ordering::Release);
        Ok(BatchToken { guard: self })
    }

    /// 请求取消正在运行的批处理，返回是否有任务在运行
    pub fn cancel(&self) -> bool {
        if self.is_busy() {
            self.cancel.store(true, Ordering::Release);
            true
        } else {
            false
        }
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }
}

/// 批处理令牌，drop 时释放 [`BatchGuard`]
pub struct BatchToken<'a> {
    guard: &'a BatchGuard,
}

impl BatchToken<'_> {
    pub fn cancel_flag(&self) -> &AtomicBool {
        &self.guard.cancel
    }
}

impl Drop for BatchToken<'_> {
    fn drop(&mut self) {
        self.guard.cancel.store(false, Ordering::Release);
        self.guard.busy.store(false, Ordering::Release);
    }
}
