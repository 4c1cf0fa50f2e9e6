use clap::Parser;
use tokio::task::block_in_place;

use crate::cli::SubCommandExtend;
use crate::config::{AppConfig, Opts};
use crate::engine::ImageSearchBuilder;
use crate::store::LoadStatus;

#[derive(Parser, Debug, Clone)]
pub struct StatusCommand {}

impl SubCommandExtend for StatusCommand {
    async fn run(&self, opts: &Opts) -> anyhow::Result<()> {
        let db = block_in_place(|| ImageSearchBuilder::new(opts.conf_dir.clone()).open())?;
        let config = AppConfig::load(&opts.conf_dir.app_config());
        let status = db.status();

        println!("配置目录: {}", opts.conf_dir);
        if let Some(folder) = &config.image_folder {
            println!("图片目录: {}", folder.display());
        }
        println!("语义向量: {}", status.semantic);
        if let Some(dimension) = status.dimension {
            println!("向量维度: {}", dimension);
        }
        println!("调色板  : {}", status.palettes);
        for (name, load) in ["语义缓存", "调色板缓存"].iter().zip(db.load_status()) {
            if let LoadStatus::Corrupt(e) = load {
                println!("{}已损坏: {}", name, e);
            }
        }
        Ok(())
    }
}
