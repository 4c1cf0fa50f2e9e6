use std::collections::BTreeMap;
use std::path::Path;

use kmeans::{EuclideanDistance, KMeans, KMeansConfig};
use rand::SeedableRng;
use rand::rngs::StdRng;

use super::PaletteExtractor;
use crate::color::{Palette, PaletteEntry, Rgb};
use crate::error::ExtractionError;

/// 使用 k-means 对像素颜色聚类得到主色调
#[derive(Debug, Clone)]
pub struct KMeansPalette {
    /// 聚类中心数量，即调色板最大长度
    pub k: usize,
    /// 最大迭代次数
    pub max_iter: usize,
    /// 聚类前图片缩放到的最大边长
    pub sample_size: u32,
    /// 随机种子，保证同一张图片每次得到相同的结果
    pub seed: u64,
}

impl Default for KMeansPalette {
    fn default() -> Self {
        Self { k: 5, max_iter: 20, sample_size: 64, seed: 42 }
    }
}

impl KMeansPalette {
    pub fn with_k(k: usize) -> Self {
        Self { k, ..Default::default() }
    }

    /// 从 RGB 像素计算调色板，按权重从大到小排列
    pub fn palette_of(&self, pixels: &[Rgb]) -> Palette {
        if pixels.is_empty() || self.k == 0 {
            return vec![];
        }

        // 统计不同颜色的数量，颜色种类不超过 k 时无需聚类
        let mut counts = BTreeMap::new();
        for p in pixels {
            *counts.entry(p.0).or_insert(0usize) += 1;
        }
        let total = pixels.len() as f32;

        let mut palette = if counts.len() <= self.k {
            counts
                .into_iter()
                .map(|(color, n)| PaletteEntry { color: Rgb(color), weight: n as f32 / total })
                .collect::<Vec<_>>()
        } else {
            self.cluster(pixels)
                .into_iter()
                .map(|(color, n)| PaletteEntry { color, weight: n as f32 / total })
                .collect()
        };

        palette.sort_by(|a, b| b.weight.total_cmp(&a.weight));
        palette
    }

    /// Lloyd k-means 聚类，返回每个非空聚类的中心和像素数量
    fn cluster(&self, pixels: &[Rgb]) -> Vec<(Rgb, usize)> {
        // 补齐到 4 维，与 SIMD 宽度对齐
        let n = pixels.len();
        let x = pixels
            .iter()
            .flat_map(|p| {
                let [r, g, b] = p.0.map(f32::from);
                [r, g, b, 0.0]
            })
            .collect::<Vec<_>>();
        let km: KMeans<_, 4, _> = KMeans::new(&x, n, 4, EuclideanDistance);
        let conf = KMeansConfig::build()
            .random_generator(StdRng::seed_from_u64(self.seed))
            .build();
        let result =
            km.kmeans_lloyd(self.k, self.max_iter.max(1), KMeans::init_random_sample, &conf);

        result
            .centroids
            .chunks_exact(4)
            .zip(&result.centroid_frequency)
            .filter(|(_, n)| **n > 0)
            .map(|(c, n)| {
                let color = [c[0], c[1], c[2]].map(|v| v.round().clamp(0.0, 255.0) as u8);
                (Rgb(color), *n)
            })
            .collect()
    }
}

impl PaletteExtractor for KMeansPalette {
    fn extract_palette(&self, path: &Path) -> Result<Palette, ExtractionError> {
        let img = image::open(path)?.thumbnail(self.sample_size, self.sample_size).to_rgb8();
        let pixels = img.pixels().map(|p| Rgb(p.0)).collect::<Vec<_>>();
        Ok(self.palette_of(&pixels))
    }
}
