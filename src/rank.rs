use rayon::prelude::*;
use serde::Serialize;
use utoipa::ToSchema;

use crate::color::{ColorQuery, MAX_RGB_DISTANCE, PaletteEntry, Rgb};
use crate::identity::Identity;
use crate::store::VectorStore;

/// 默认返回的结果数量
pub const DEFAULT_LIMIT: usize = 24;

/// 一条搜索结果
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct Hit {
    /// 图片路径
    #[schema(value_type = String)]
    pub path: Identity,
    /// 相似度，语义搜索范围为 [-1, 1]，颜色搜索范围为 [0, 1]
    pub score: f32,
}

/// 余弦相似度，任一向量模长为 0 或长度不同时返回 0
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }
    let (mut dot, mut na, mut nb) = (0.0f32, 0.0f32, 0.0f32);
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        na += x * x;
        nb += y * y;
    }
    if na == 0.0 || nb == 0.0 {
        return 0.0;
    }
    dot / (na.sqrt() * nb.sqrt())
}

/// 查询颜色与调色板中一项的相似度，已乘以该项的权重
pub fn color_similarity(query: &Rgb, entry: &PaletteEntry) -> f32 {
    let closeness = (1.0 - query.distance(&entry.color) / MAX_RGB_DISTANCE).max(0.0);
    closeness * entry.weight
}

/// 每个查询颜色取调色板中最匹配的一项，再对所有查询颜色取平均
pub fn color_score(query: &ColorQuery, palette: &[PaletteEntry]) -> f32 {
    if query.is_empty() || palette.is_empty() {
        return 0.0;
    }
    let total = query
        .iter()
        .map(|q| palette.iter().map(|p| color_similarity(q, p)).fold(0.0, f32::max))
        .sum::<f32>();
    total / query.len() as f32
}

/// 按语义向量排序
pub fn rank_semantic(query: &[f32], store: &VectorStore<Vec<f32>>, limit: usize) -> Vec<Hit> {
    if limit == 0 {
        return vec![];
    }
    let scored: Vec<(Identity, f32)> = store.read(|entries| {
        let entries = entries.iter().collect::<Vec<_>>();
        entries.par_iter().map(|(id, v)| ((*id).clone(), cosine_similarity(query, v))).collect()
    });
    top_k(scored, limit)
}

/// 按颜色排序
pub fn rank_color(
    query: &ColorQuery,
    store: &VectorStore<Vec<PaletteEntry>>,
    limit: usize,
) -> Vec<Hit> {
    if limit == 0 {
        return vec![];
    }
    let scored: Vec<(Identity, f32)> = store.read(|entries| {
        let entries = entries.iter().collect::<Vec<_>>();
        entries.par_iter().map(|(id, p)| ((*id).clone(), color_score(query, p))).collect()
    });
    top_k(scored, limit)
}

// 稳定排序，分数相同时保持存储中的顺序
fn top_k(mut scored: Vec<(Identity, f32)>, limit: usize) -> Vec<Hit> {
    scored.sort_by(|a, b| nan_to_zero(b.1).total_cmp(&nan_to_zero(a.1)));
    scored.truncate(limit);
    scored.into_iter().map(|(path, score)| Hit { path, score }).collect()
}

fn nan_to_zero(x: f32) -> f32 {
    if x.is_nan() { 0.0 } else { x }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn palette(entries: &[([u8; 3], f32)]) -> Vec<PaletteEntry> {
        entries.iter().map(|(c, w)| PaletteEntry { color: Rgb(*c), weight: *w }).collect()
    }

    #[test]
    fn test_cosine() {
        assert!((cosine_similarity(&[1.0, 2.0], &[2.0, 4.0]) - 1.0).abs() < 1e-6);
        assert!((cosine_similarity(&[1.0, 0.0], &[-1.0, 0.0]) + 1.0).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 1.0]), 0.0);
    }

    #[test]
    fn test_color_exact_match() {
        let query: ColorQuery = [Rgb([255, 0, 0])].into_iter().collect();
        let score = color_score(&query, &palette(&[([255, 0, 0], 1.0)]));
        assert!((score - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_color_overlap_ordering() {
        let query: ColorQuery = [Rgb([255, 0, 0]), Rgb([0, 0, 255])].into_iter().collect();
        let partial = color_score(&query, &palette(&[([255, 0, 0], 0.5), ([0, 255, 0], 0.5)]));
        let none = color_score(&query, &palette(&[([0, 255, 0], 1.0)]));
        assert!(none < partial);
    }

    #[test]
    fn test_color_empty() {
        let query: ColorQuery = [Rgb([1, 2, 3])].into_iter().collect();
        assert_eq!(color_score(&query, &[]), 0.0);
        assert_eq!(color_score(&ColorQuery::new(), &palette(&[([1, 2, 3], 1.0)])), 0.0);
    }

    #[test]
    fn test_rank_semantic_order_and_ties() {
        let store = VectorStore::new("/nonexistent");
        store.put(Identity::from("orthogonal"), vec![0.0, 1.0]);
        store.put(Identity::from("tie1"), vec![1.0, 1.0]);
        store.put(Identity::from("same"), vec![1.0, 0.0]);
        store.put(Identity::from("tie2"), vec![1.0, 1.0]);

        let hits = rank_semantic(&[1.0, 0.0], &store, DEFAULT_LIMIT);
        let names = hits.iter().map(|h| h.path.as_str()).collect::<Vec<_>>();
        assert_eq!(names, ["same", "tie1", "tie2", "orthogonal"]);
        assert!(hits[0].score > hits[3].score);

        assert_eq!(rank_semantic(&[1.0, 0.0], &store, 2).len(), 2);
        assert!(rank_semantic(&[1.0, 0.0], &store, 0).is_empty());
    }

    #[test]
    fn test_rank_color_ties_keep_store_order() {
        let store = VectorStore::new("/nonexistent");
        store.put(Identity::from("blue"), palette(&[([0, 0, 255], 1.0)]));
        store.put(Identity::from("red1"), palette(&[([255, 0, 0], 0.5), ([0, 255, 0], 0.5)]));
        store.put(Identity::from("exact"), palette(&[([255, 0, 0], 1.0)]));
        store.put(Identity::from("red2"), palette(&[([255, 0, 0], 0.5), ([0, 255, 0], 0.5)]));

        let query: ColorQuery = [Rgb([255, 0, 0])].into_iter().collect();
        let hits = rank_color(&query, &store, DEFAULT_LIMIT);
        let names = hits.iter().map(|h| h.path.as_str()).collect::<Vec<_>>();
        assert_eq!(names, ["exact", "red1", "red2", "blue"]);
        assert_eq!(hits[1].score, hits[2].score);
    }

    #[test]
    fn test_rank_empty_store() {
        let store = VectorStore::<Vec<PaletteEntry>>::new("/nonexistent");
        let query: ColorQuery = [Rgb([1, 2, 3])].into_iter().collect();
        assert!(rank_color(&query, &store, DEFAULT_LIMIT).is_empty());
    }
}
