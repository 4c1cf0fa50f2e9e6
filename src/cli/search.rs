use anyhow::Result;
use clap::Parser;
use tokio::task::block_in_place;

use crate::cli::SubCommandExtend;
use crate::config::{AppConfig, EngineOptions, Opts, OutputFormat, SearchOptions};
use crate::rank::Hit;

#[derive(Parser, Debug, Clone)]
pub struct SearchCommand {
    #[command(flatten)]
    pub engine: EngineOptions,
    #[command(flatten)]
    pub search: SearchOptions,
    /// 搜索的文本
    pub query: String,
}

impl SubCommandExtend for SearchCommand {
    async fn run(&self, opts: &Opts) -> anyhow::Result<()> {
        let count = result_count(&self.search, opts);
        let result = block_in_place(|| -> Result<_> {
            let db = self.engine.builder(opts.conf_dir.clone())?.open()?;
            Ok(db.search_text(&self.query, count)?)
        })?;
        print_result(&result, self.search.output_format)
    }
}

/// 命令行参数优先，否则使用配置文件中的结果数量
pub(crate) fn result_count(search: &SearchOptions, opts: &Opts) -> usize {
    search.count.unwrap_or_else(|| AppConfig::load(&opts.conf_dir.app_config()).max_results)
}

pub(crate) fn print_result(result: &[Hit], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(result)?)
        }
        OutputFormat::Table => {
            for hit in result {
                println!("{:.4}\t{}", hit.score, hit.path);
            }
        }
    }
    Ok(())
}
