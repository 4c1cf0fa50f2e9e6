use std::convert::Infallible;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::{Arc, LazyLock};

use clap::{Parser, Subcommand, ValueEnum};
use directories::ProjectDirs;
use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::cli::*;
use crate::engine::ImageSearchBuilder;
use crate::extract::{HttpEmbedder, KMeansPalette};
use crate::rank::DEFAULT_LIMIT;
use crate::scan::DEFAULT_SUFFIX;

static CONF_DIR: LazyLock<ConfDir> = LazyLock::new(|| {
    let path = match ProjectDirs::from("", "aloxaf", "clipsearch") {
        Some(dirs) => dirs.config_dir().to_path_buf(),
        None => PathBuf::from(".clipsearch"),
    };
    ConfDir { path }
});

fn default_conf_dir() -> ConfDir {
    CONF_DIR.clone()
}

#[derive(Parser, Debug, Clone)]
pub struct EngineOptions {
    /// 嵌入服务地址，不填则只能使用颜色搜索
    #[arg(short, long, value_name = "URL")]
    pub embed_url: Option<String>,
    /// 扫描的文件后缀名，多个后缀用逗号分隔
    #[arg(short, long, default_value = DEFAULT_SUFFIX)]
    pub suffix: String,
    /// 每张图片提取的主色调数量
    #[arg(
        long,
        value_name = "K",
        default_value_t = 5,
        value_parser = clap::value_parser!(u8).range(1..=16)
    )]
    pub palette_size: u8,
}

impl EngineOptions {
    /// 根据命令行参数创建引擎
    pub fn builder(&self, conf_dir: ConfDir) -> anyhow::Result<ImageSearchBuilder> {
        let mut builder = ImageSearchBuilder::new(conf_dir)
            .suffix(&self.suffix)
            .palette_extractor(Arc::new(KMeansPalette::with_k(self.palette_size as usize)));
        if let Some(url) = &self.embed_url {
            builder = builder.embedder(Arc::new(HttpEmbedder::new(url.as_str())?));
        }
        Ok(builder)
    }
}

#[derive(Parser, Debug, Clone)]
pub struct SearchOptions {
    /// 显示的结果数量，默认使用配置文件中的值
    #[arg(long, value_name = "COUNT")]
    pub count: Option<usize>,
    /// 输出格式
    #[arg(long, value_name = "FORMAT", value_enum, default_value_t = OutputFormat::Table)]
    pub output_format: OutputFormat,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Json,
    Table,
}

#[derive(Parser, Debug, Clone)]
#[command(name = "clipsearch", version)]
pub struct Opts {
    #[command(subcommand)]
    pub subcmd: SubCommand,
    /// clipsearch 配置文件目录
    #[arg(short, long, default_value_t = default_conf_dir())]
    pub conf_dir: ConfDir,
}

#[derive(Subcommand, Debug, Clone)]
pub enum SubCommand {
    /// 扫描目录，为新增图片提取特征并移除已删除的图片
    Scan(ScanCommand),
    /// 使用文本搜索图片
    Search(SearchCommand),
    /// 使用颜色搜索图片
    Color(ColorCommand),
    /// 重命名图片，同时更新缓存
    Rename(RenameCommand),
    /// 删除图片，同时从缓存中移除
    Delete(DeleteCommand),
    /// 显示缓存状态
    Status(StatusCommand),
    /// 启动 HTTP 搜索服务
    Server(ServerCommand),
}

#[derive(Debug, Clone)]
pub struct ConfDir {
    path: PathBuf,
}

impl ConfDir {
    pub fn path(&self) -> &Path {
        self.path.as_path()
    }

    /// 返回语义向量缓存的路径
    pub fn semantic_store(&self) -> PathBuf {
        self.path.join("semantic.bin")
    }

    /// 返回调色板缓存的路径
    pub fn palette_store(&self) -> PathBuf {
        self.path.join("palette.bin")
    }

    /// 返回应用配置文件的路径
    pub fn app_config(&self) -> PathBuf {
        self.path.join("config.json")
    }
}

impl FromStr for ConfDir {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self { path: PathBuf::from(s) })
    }
}

impl fmt::Display for ConfDir {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path.display())
    }
}

/// 保存在 `config.json` 中的应用配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// 上次扫描的图片目录
    pub image_folder: Option<PathBuf>,
    /// 默认显示的结果数量
    pub max_results: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self { image_folder: None, max_results: DEFAULT_LIMIT }
    }
}

impl AppConfig {
    /// 读取配置，任何错误都会得到默认配置
    pub fn load(path: &Path) -> Self {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) => {
                debug!("无法读取配置文件 {}: {}", path.display(), e);
                return Self::default();
            }
        };
        serde_json::from_str(&text).unwrap_or_else(|e| {
            warn!("配置文件 {} 格式错误，将使用默认配置: {}", path.display(), e);
            Self::default()
        })
    }

    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}
