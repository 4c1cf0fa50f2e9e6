use clap::Parser;
use log::warn;
use tokio::task::block_in_place;

use crate::cli::SubCommandExtend;
use crate::cli::search::{print_result, result_count};
use crate::color::{ColorQuery, MAX_QUERY_COLORS};
use crate::config::{EngineOptions, Opts, SearchOptions};

#[derive(Parser, Debug, Clone)]
pub struct ColorCommand {
    #[command(flatten)]
    pub engine: EngineOptions,
    #[command(flatten)]
    pub search: SearchOptions,
    /// 搜索的颜色，格式为 #rrggbb，最多 5 个，超出时只保留最后 5 个
    #[arg(required = true, value_name = "COLOR")]
    pub colors: Vec<String>,
}

impl SubCommandExtend for ColorCommand {
    async fn run(&self, opts: &Opts) -> anyhow::Result<()> {
        let query = ColorQuery::parse(&self.colors)?;
        if self.colors.len() > MAX_QUERY_COLORS {
            warn!("最多同时搜索 {} 个颜色，较早的颜色已被忽略", MAX_QUERY_COLORS);
        }
        let count = result_count(&self.search, opts);

        let result = block_in_place(|| -> anyhow::Result<_> {
            let db = self.engine.builder(opts.conf_dir.clone())?.open()?;
            Ok(db.search_color(&query, count))
        })?;
        print_result(&result, self.search.output_format)
    }
}
