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

use clap::Parser;
use message_viewport::Cli;
use message_viewport::app::{App, terminal_config};
use message_viewport::error::AppError;
use message_viewport::history::HistoryStore;
use message_viewport::loader::memory::MemoryHistorySource;
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

#[allow(clippy::exit)]
fn main() {
    if let Err(err) = run() {
        if let Some(app_error) = extract_app_error(&err) {
            eprintln!("{}", app_error.user_message());
            tracing::error!("{err:#}");
            std::process::exit(app_error.exit_code());
        }
        eprintln!("{err:#}");
        std::process::exit(1);
    }
}

fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli)?;

    if cli.window_size == 0 {
        return Err(anyhow::Error::new(AppError::InvalidConfig));
    }

    let config = terminal_config(cli.viewport_config());
    let state_path = state_path(&cli);
    let store = match state_path.as_deref() {
        Some(path) => HistoryStore::load(path, config)
            .map_err(|err| anyhow::Error::new(AppError::StateUnreadable).context(format!("{err:#}")))?,
        None => HistoryStore::new(config),
    };

    let thread = cli.thread_key();
    let latency = Duration::from_millis(cli.latency_ms);
    let source = Arc::new(
        MemoryHistorySource::new()
            .with_generated(&thread, cli.messages)
            .with_latency(latency)
            .with_fail_every(cli.fail_every),
    );
    let jump_target = cli.jump.or_else(|| i64::try_from(cli.messages / 4).ok().filter(|id| *id > 0));

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async move {
        let mut app = App::new(thread, store.clone(), source, latency, jump_target);
        app.open_thread();
        let result = message_viewport::app::run_tui(&mut app).await;
        app.close_thread();
        app.offsets.flush();

        if let Some(path) = state_path.as_deref() {
            store.save(path).map_err(|err| {
                tracing::warn!("failed to persist state: {err:#}");
                anyhow::Error::new(AppError::StateUnwritable).context(format!("{err:#}"))
            })?;
        }
        result
    })
}

fn state_path(cli: &Cli) -> Option<PathBuf> {
    cli.state_file.clone().or_else(HistoryStore::default_state_path)
}

fn extract_app_error(err: &anyhow::Error) -> Option<AppError> {
    err.chain().find_map(|cause| cause.downcast_ref::<AppError>().cloned())
}

fn init_tracing(cli: &Cli) -> anyhow::Result<()> {
    let Some(path) = cli.log_file.as_ref() else {
        if std::env::var_os("RUST_LOG").is_some() {
            eprintln!(
                "RUST_LOG is set, but tracing is disabled without --log-file <PATH>. \
Use --log-file to enable diagnostics."
            );
        }
        return Ok(());
    };

    let directives = cli
        .log_filter
        .clone()
        .or_else(|| std::env::var("RUST_LOG").ok())
        .unwrap_or_else(|| "info".to_owned());
    let filter = tracing_subscriber::EnvFilter::try_new(directives.as_str())
        .map_err(|e| anyhow::anyhow!("invalid tracing filter `{directives}`: {e}"))?;

    let mut options = OpenOptions::new();
    options.create(true).write(true);
    if cli.log_append {
        options.append(true);
    } else {
        options.truncate(true);
    }
    let file = options
        .open(path)
        .map_err(|e| anyhow::anyhow!("failed to open log file {}: {e}", path.display()))?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(file)
        .with_ansi(false)
        .with_file(true)
        .with_line_number(true)
        .with_target(true)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to initialize tracing subscriber: {e}"))?;

    tracing::info!(
        target: "diagnostics",
        version = env!("CARGO_PKG_VERSION"),
        log_file = %path.display(),
        log_filter = %directives,
        log_append = cli.log_append,
        window_size = cli.window_size,
        "tracing enabled"
    );

    Ok(())
}
