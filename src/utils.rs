use std::io::{Read, Write};

use indicatif::{ProgressBar, ProgressStyle};

use crate::driver::{ItemStatus, Progress};
use crate::identity::Identity;

pub fn pb_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos:>7}/{len:7} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
}

/// 使用进度条显示批处理进度
pub struct BarProgress {
    pb: ProgressBar,
}

impl BarProgress {
    pub fn new() -> Self {
        Self { pb: ProgressBar::no_length().with_style(pb_style()) }
    }

    pub fn finish_with_message(&self, msg: &'static str) {
        self.pb.finish_with_message(msg);
    }
}

impl Default for BarProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl Progress for BarProgress {
    fn report(&self, index: usize, total: usize, id: &Identity, status: ItemStatus<'_>) {
        match status {
            ItemStatus::Started => {
                self.pb.set_length(total as u64);
                self.pb.set_position(index as u64);
                self.pb.set_message(id.file_name().to_owned());
            }
            ItemStatus::Extracted => self.pb.inc(1),
            ItemStatus::Failed(e) => {
                self.pb.println(format!("跳过 {}: {}", id, e));
                self.pb.inc(1);
            }
        }
    }
}

pub fn read_line(prompt: &str) -> anyhow::Result<String> {
    print!("{}", prompt);
    std::io::stdout().flush()?;
    let v = std::io::stdin()
        .bytes()
        .take_while(|c| c.as_ref().ok() != Some(&b'\n'))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(String::from_utf8(v)?.trim().to_owned())
}
