use std::fs;
use std::io;
use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use log::info;
use tokio::task::block_in_place;

use crate::cli::SubCommandExtend;
use crate::config::Opts;
use crate::engine::ImageSearchBuilder;
use crate::identity::Identity;
use crate::utils::read_line;

#[derive(Parser, Debug, Clone)]
pub struct DeleteCommand {
    /// 需要删除的图片
    pub path: PathBuf,
    /// 不再确认
    #[arg(short, long)]
    pub yes: bool,
    /// 只从缓存中移除，保留磁盘上的文件
    #[arg(long)]
    pub keep_file: bool,
}

impl SubCommandExtend for DeleteCommand {
    async fn run(&self, opts: &Opts) -> anyhow::Result<()> {
        let id = Identity::from_path(&self.path)?;
        if !self.yes && !self.keep_file {
            let answer = read_line(&format!("确认删除 {}？[y/N] ", id))?;
            if !answer.eq_ignore_ascii_case("y") {
                return Ok(());
            }
        }

        let present = block_in_place(|| -> Result<bool> {
            if !self.keep_file {
                match fs::remove_file(&self.path) {
                    Ok(()) => info!("已删除文件 {}", id),
                    Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                    Err(e) => return Err(e.into()),
                }
            }
            let db = ImageSearchBuilder::new(opts.conf_dir.clone()).open()?;
            Ok(db.delete(&id))
        })?;

        if present {
            println!("已从缓存中移除 {}", id);
        } else {
            println!("{} 不在缓存中", id);
        }
        Ok(())
    }
}
