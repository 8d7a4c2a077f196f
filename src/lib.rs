// message_viewport — Scroll-stable chat history viewport
// Copyright (C) 2025  Simon Peter Rothgang
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as
// published by the Free Software Foundation, either version 3 of the
// License, or (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

pub mod anchor;
pub mod app;
pub mod config;
pub mod error;
pub mod history;
pub mod loader;
pub mod offsets;
pub mod ui;

use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "msgview", about = "Scroll-stable chat history viewer over a simulated remote")]
pub struct Cli {
    /// Half window: how many messages are kept on each side of the reference
    #[arg(long, default_value_t = config::DEFAULT_WINDOW_SIZE)]
    pub window_size: usize,

    /// Number of messages in the simulated remote history
    #[arg(long, default_value_t = 500)]
    pub messages: usize,

    /// Simulated fetch latency in milliseconds
    #[arg(long, default_value_t = 150)]
    pub latency_ms: u64,

    /// Make every n-th fetch fail (0 disables failures)
    #[arg(long, default_value_t = 0)]
    pub fail_every: usize,

    /// Where ids and scroll offsets are persisted (defaults to the data dir)
    #[arg(long)]
    pub state_file: Option<PathBuf>,

    /// Chat to open
    #[arg(long, default_value = "general")]
    pub chat: String,

    /// Thread inside the chat (main list when omitted)
    #[arg(long)]
    pub thread: Option<i64>,

    /// Message id that `j` jumps to
    #[arg(long)]
    pub jump: Option<i64>,

    /// Write tracing diagnostics to a file
    #[arg(long, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// Tracing filter directives (falls back to `RUST_LOG`, then `info`)
    #[arg(long, value_name = "FILTER")]
    pub log_filter: Option<String>,

    /// Append to the log file instead of truncating it
    #[arg(long)]
    pub log_append: bool,
}

impl Cli {
    #[must_use]
    pub fn viewport_config(&self) -> config::ViewportConfig {
        config::ViewportConfig::default().with_window_size(self.window_size)
    }

    #[must_use]
    pub fn thread_key(&self) -> history::ThreadKey {
        history::ThreadKey::new(self.chat.clone(), self.thread.unwrap_or(history::MAIN_THREAD_ID))
    }
}
