use std::sync::LazyLock;

use prometheus::*;

static METRIC_SEARCH_COUNT: LazyLock<IntCounterVec> = LazyLock::new(|| {
    register_int_counter_vec!("clipsearch_search_count", "count of the searches", &["kind"])
        .unwrap()
});

static METRIC_SEARCH_DURATION: LazyLock<HistogramVec> = LazyLock::new(|| {
    register_histogram_vec!(
        "clipsearch_search_duration",
        "duration of the per-query ranking in seconds",
        &["kind"]
    )
    .unwrap()
});

static METRIC_SEARCH_RESULTS: LazyLock<HistogramVec> = LazyLock::new(|| {
    register_histogram_vec!(
        "clipsearch_search_results",
        "number of results returned by a search",
        &["kind"],
        vec![0., 1., 5., 10., 24., 50., 100.]
    )
    .unwrap()
});

static METRIC_BATCH_ITEMS: LazyLock<IntCounterVec> = LazyLock::new(|| {
    register_int_counter_vec!(
        "clipsearch_batch_items",
        "count of the images handled by extraction batches",
        &["outcome"]
    )
    .unwrap()
});

/// 搜索类型
#[derive(Debug, Clone, Copy)]
pub enum SearchKind {
    Text,
    Color,
}

impl SearchKind {
    fn label(self) -> &'static str {
        match self {
            SearchKind::Text => "text",
            SearchKind::Color => "color",
        }
    }
}

/// 记录一次搜索的耗时和结果数量
pub fn observe_search(kind: SearchKind, duration: f32, results: usize) {
    let label = [kind.label()];
    METRIC_SEARCH_COUNT.with_label_values(&label).inc();
    METRIC_SEARCH_DURATION.with_label_values(&label).observe(duration as f64);
    METRIC_SEARCH_RESULTS.with_label_values(&label).observe(results as f64);
}

/// 增加批处理中单张图片的计数，`outcome` 为 `extracted` 或 `failed`
pub fn inc_batch_item(outcome: &str) {
    METRIC_BATCH_ITEMS.with_label_values(&[outcome]).inc();
}
