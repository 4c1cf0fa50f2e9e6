use std::collections::VecDeque;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// 颜色查询最多同时选择的颜色数量
pub const MAX_QUERY_COLORS: usize = 5;

/// RGB 空间中两点的最大距离，即 sqrt(3 * 255²)
pub const MAX_RGB_DISTANCE: f32 = 441.672_96;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rgb(pub [u8; 3]);

impl Rgb {
    pub fn distance(&self, other: &Rgb) -> f32 {
        let [r1, g1, b1] = self.0.map(f32::from);
        let [r2, g2, b2] = other.0.map(f32::from);
        ((r1 - r2).powi(2) + (g1 - g2).powi(2) + (b1 - b2).powi(2)).sqrt()
    }
}

impl FromStr for Rgb {
    type Err = Error;

    /// 支持 `#rrggbb`、`rrggbb` 和 `#rgb`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let hex = s.trim().trim_start_matches('#');
        let invalid = || Error::InvalidColor(s.to_owned());
        if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(invalid());
        }
        let channel = |s: &str| u8::from_str_radix(s, 16).map_err(|_| invalid());
        match hex.len() {
            6 => Ok(Rgb([channel(&hex[0..2])?, channel(&hex[2..4])?, channel(&hex[4..6])?])),
            3 => {
                let mut rgb = [0u8; 3];
                for (i, c) in hex.chars().enumerate() {
                    rgb[i] = channel(&c.to_string())? * 17;
                }
                Ok(Rgb(rgb))
            }
            _ => Err(invalid()),
        }
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [r, g, b] = self.0;
        write!(f, "#{r:02x}{g:02x}{b:02x}")
    }
}

/// 调色板中的一项：聚类中心颜色以及属于该类的像素比例
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PaletteEntry {
    pub color: Rgb,
    pub weight: f32,
}

/// 一张图片的主色调，按权重从大到小排列
pub type Palette = Vec<PaletteEntry>;

/// 颜色查询，容量固定为 [`MAX_QUERY_COLORS`] 的环形队列
///
/// 超出容量时最早加入的颜色会被替换，允许重复颜色
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ColorQuery {
    colors: VecDeque<Rgb>,
}

impl ColorQuery {
    pub fn new() -> Self {
        Self { colors: VecDeque::with_capacity(MAX_QUERY_COLORS) }
    }

    /// 加入一个颜色，返回被挤出的最早的颜色
    pub fn push(&mut self, color: Rgb) -> Option<Rgb> {
        let evicted =
            if self.colors.len() == MAX_QUERY_COLORS { self.colors.pop_front() } else { None };
        self.colors.push_back(color);
        evicted
    }

    pub fn len(&self) -> usize {
        self.colors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Rgb> {
        self.colors.iter()
    }

    /// 解析一组十六进制颜色字符串，超出容量的部分按环形规则处理
    pub fn parse<S: AsRef<str>>(colors: &[S]) -> Result<Self, Error> {
        colors.iter().map(|s| s.as_ref().parse::<Rgb>()).collect()
    }
}

impl FromIterator<Rgb> for ColorQuery {
    fn from_iter<T: IntoIterator<Item = Rgb>>(iter: T) -> Self {
        let mut query = Self::new();
        for color in iter {
            query.push(color);
        }
        query
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hex() {
        assert_eq!("#ff8000".parse::<Rgb>().unwrap(), Rgb([255, 128, 0]));
        assert_eq!("00FF10".parse::<Rgb>().unwrap(), Rgb([0, 255, 16]));
        assert_eq!("#f00".parse::<Rgb>().unwrap(), Rgb([255, 0, 0]));
        assert!("#ff80".parse::<Rgb>().is_err());
        assert!("#gg0000".parse::<Rgb>().is_err());
        assert!("".parse::<Rgb>().is_err());
    }

    #[test]
    fn test_display_hex() {
        assert_eq!(Rgb([255, 128, 0]).to_string(), "#ff8000");
    }

    #[test]
    fn test_max_distance() {
        let d = Rgb([0, 0, 0]).distance(&Rgb([255, 255, 255]));
        assert!((d - MAX_RGB_DISTANCE).abs() < 1e-3);
    }

    #[test]
    fn test_ring_replaces_oldest() {
        let mut query = ColorQuery::new();
        for i in 0..5u8 {
            assert_eq!(query.push(Rgb([i, 0, 0])), None);
        }
        assert_eq!(query.push(Rgb([5, 0, 0])), Some(Rgb([0, 0, 0])));
        assert_eq!(query.push(Rgb([6, 0, 0])), Some(Rgb([1, 0, 0])));
        let colors = query.iter().map(|c| c.0[0]).collect::<Vec<_>>();
        assert_eq!(colors, &[2, 3, 4, 5, 6]);
    }

    #[test]
    fn test_ring_keeps_duplicates() {
        let query: ColorQuery = [Rgb([1, 1, 1]), Rgb([1, 1, 1])].into_iter().collect();
        assert_eq!(query.len(), 2);
    }

    #[test]
    fn test_parse_more_than_capacity() {
        let colors = ["#000001", "#000002", "#000003", "#000004", "#000005", "#000006"];
        let query = ColorQuery::parse(&colors).unwrap();
        assert_eq!(query.len(), MAX_QUERY_COLORS);
        assert_eq!(query.iter().next(), Some(&Rgb([0, 0, 2])));
    }
}
