pub mod cli;
pub mod commands;
pub mod config;
pub mod datetime;
pub mod listing;
pub mod panel;
pub mod remote;
pub mod render;
pub mod storage;
pub mod store;
pub mod task;
pub mod tasks;

use std::ffi::OsString;

use anyhow::Context;
use clap::Parser;
use tracing::{
  debug,
  info
};

#[tracing::instrument(skip_all)]
pub fn run(
  raw_args: Vec<OsString>
) -> anyhow::Result<()> {
  let pre =
    cli::preprocess_args(&raw_args)?;
  let cli = cli::GlobalCli::parse_from(
    pre.cleaned_args
  );

  cli::init_tracing(
    cli.verbose,
    cli.quiet
  )?;

  info!(
    verbose = cli.verbose,
    quiet = cli.quiet,
    "starting tally CLI"
  );
  debug!(?pre.rc_overrides, "preprocessed rc overrides");

  let mut cfg = config::Config::load(
    cli.config.as_deref()
  )?;
  cfg.apply_overrides(
    pre.rc_overrides.into_iter().chain(
      cli
        .rc_overrides
        .into_iter()
        .map(|kv| (kv.key, kv.value))
    )
  );

  let data_dir =
    config::resolve_data_dir(
      &cfg,
      cli.data.as_deref()
    )
    .context(
      "failed to resolve data \
       directory"
    )?;

  let storage =
    storage::FileStorage::open(
      &data_dir
    )
    .with_context(|| {
      format!(
        "failed to open storage at {}",
        data_dir.display()
      )
    })?;
  let mut tasks =
    tasks::TaskList::open(storage);

  let renderer =
    render::Renderer::new(&cfg)?;
  let command = cli
    .command
    .unwrap_or(cli::Command::List {
      filter: None
    });

  let mut out = std::io::stdout().lock();
  commands::dispatch(
    &mut tasks,
    &cfg,
    &renderer,
    command,
    &mut out
  )?;

  info!("done");
  Ok(())
}
