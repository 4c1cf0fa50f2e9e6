use std::path::PathBuf;

use anyhow::anyhow;
use clap::Parser;
use log::info;
use tokio::task::block_in_place;

use crate::cli::SubCommandExtend;
use crate::config::{AppConfig, EngineOptions, Opts};
use crate::utils::BarProgress;

#[derive(Parser, Debug, Clone)]
pub struct ScanCommand {
    #[command(flatten)]
    pub engine: EngineOptions,
    /// 图片所在目录，不填则使用上次扫描的目录
    pub folder: Option<PathBuf>,
}

impl SubCommandExtend for ScanCommand {
    async fn run(&self, opts: &Opts) -> anyhow::Result<()> {
        let config_path = opts.conf_dir.app_config();
        let mut config = AppConfig::load(&config_path);
        let folder = self
            .folder
            .clone()
            .or_else(|| config.image_folder.clone())
            .ok_or_else(|| anyhow!("请指定图片目录"))?;

        let report = block_in_place(|| -> anyhow::Result<_> {
            let db = self.engine.builder(opts.conf_dir.clone())?.open()?;
            let pb = BarProgress::new();
            let report = db.reconcile(&folder, &pb)?;
            pb.finish_with_message("扫描完成");
            Ok(report)
        })?;

        let folder = std::path::absolute(&folder)?;
        if config.image_folder.as_ref() != Some(&folder) {
            info!("记住图片目录: {}", folder.display());
            config.image_folder = Some(folder);
            config.save(&config_path)?;
        }

        println!(
            "新增 {} 张图片，移除 {} 张，失败 {} 张",
            report.added, report.removed, report.failed
        );
        Ok(())
    }
}
