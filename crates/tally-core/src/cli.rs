use std::ffi::OsString;
use std::io::IsTerminal;
use std::path::PathBuf;

use anyhow::anyhow;
use clap::{ArgAction, Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::listing::Category;
use crate::tasks::TaskFilter;

#[derive(Debug, Clone)]
pub struct PreprocessedArgs {
    pub cleaned_args: Vec<OsString>,
    pub rc_overrides: Vec<(String, String)>,
}

#[derive(Debug, Clone)]
pub struct KeyVal {
    pub key: String,
    pub value: String,
}

impl std::str::FromStr for KeyVal {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (k, v) = s
            .split_once('=')
            .ok_or_else(|| anyhow!("expected KEY=VALUE, got: {s}"))?;
        Ok(Self {
            key: k.trim().to_string(),
            value: v.trim().to_string(),
        })
    }
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "tally",
    version,
    about = "Tally: local task tracking with a remote demo data browser",
    disable_help_subcommand = true
)]
pub struct GlobalCli {
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[arg(short = 'q', long = "quiet", action = ArgAction::Count, global = true)]
    pub quiet: u8,

    #[arg(
        long = "rc",
        value_parser = clap::builder::ValueParser::new(|s: &str| s.parse::<KeyVal>()),
        action = ArgAction::Append,
        global = true
    )]
    pub rc_overrides: Vec<KeyVal>,

    #[arg(long = "config", global = true)]
    pub config: Option<PathBuf>,

    #[arg(long = "data", global = true)]
    pub data: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Add a task
    Add {
        #[arg(required = true, num_args = 1.., trailing_var_arg = true)]
        title: Vec<String>,
    },
    /// Flip a task between active and completed
    Toggle { id: String },
    /// Delete a task
    #[command(alias = "rm")]
    Remove { id: String },
    /// Delete every task
    Clear,
    /// List tasks
    #[command(alias = "ls")]
    List {
        #[arg(short = 'f', long = "filter", value_parser = parse_task_filter)]
        filter: Option<TaskFilter>,
    },
    /// Show task counts
    Stats,
    /// Fetch and page through remote posts or users
    Browse {
        #[arg(value_parser = parse_category, default_value = "posts")]
        category: Category,

        #[arg(short = 's', long = "search")]
        search: Option<String>,

        #[arg(short = 'p', long = "page", default_value_t = 1)]
        page: usize,
    },
    /// Print the effective configuration
    ShowConfig,
}

fn parse_task_filter(s: &str) -> Result<TaskFilter, String> {
    s.parse::<TaskFilter>().map_err(|e| e.to_string())
}

fn parse_category(s: &str) -> Result<Category, String> {
    s.parse::<Category>().map_err(|e| e.to_string())
}

pub fn init_tracing(verbose: u8, quiet: u8) -> anyhow::Result<()> {
    let default_level = if quiet >= 2 {
        "error"
    } else if quiet == 1 {
        "warn"
    } else if verbose >= 3 {
        "trace"
    } else if verbose == 2 {
        "debug"
    } else if verbose == 1 {
        "info"
    } else {
        "warn"
    };

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .map_err(|e| anyhow!("invalid RUST_LOG / log filter: {e}"))?;

    let init_result = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_level(true)
        .with_ansi(std::io::stderr().is_terminal())
        .try_init();

    if let Err(err) = init_result {
        debug!(error = %err, "tracing subscriber already set, continuing");
    }

    Ok(())
}

/// Pulls positional `rc.KEY=VALUE` / `rc.KEY:VALUE` overrides out of the raw
/// arguments so clap never sees them.
#[tracing::instrument(skip_all)]
pub fn preprocess_args(raw: &[OsString]) -> anyhow::Result<PreprocessedArgs> {
    let mut cleaned = Vec::with_capacity(raw.len());
    let mut overrides: Vec<(String, String)> = Vec::new();

    let mut iter = raw.iter().cloned();
    if let Some(bin) = iter.next() {
        cleaned.push(bin);
    }

    for arg in iter {
        let s = arg.to_string_lossy();
        if let Some(rest) = s.strip_prefix("rc.") {
            let parsed = if let Some((k, v)) = rest.split_once('=') {
                Some((format!("rc.{k}"), v.to_string()))
            } else {
                rest.split_once(':')
                    .map(|(k, v)| (format!("rc.{k}"), v.to_string()))
            };

            if let Some((k, v)) = parsed {
                debug!(key = %k, value = %v, "captured positional rc override");
                overrides.push((k, v));
                continue;
            }
        }

        cleaned.push(arg);
    }

    Ok(PreprocessedArgs {
        cleaned_args: cleaned,
        rc_overrides: overrides,
    })
}

#[cfg(test)]
mod tests {
    use std::ffi::OsString;

    use clap::Parser;

    use super::{Command, GlobalCli, preprocess_args};
    use crate::listing::Category;
    use crate::tasks::TaskFilter;

    fn os(args: &[&str]) -> Vec<OsString> {
        args.iter().map(OsString::from).collect()
    }

    #[test]
    fn positional_rc_overrides_are_extracted() {
        let pre = preprocess_args(&os(&[
            "tally",
            "rc.color=off",
            "list",
            "rc.list.filter:active",
        ]))
        .unwrap();
        assert_eq!(pre.cleaned_args, os(&["tally", "list"]));
        assert_eq!(
            pre.rc_overrides,
            vec![
                ("rc.color".to_string(), "off".to_string()),
                ("rc.list.filter".to_string(), "active".to_string()),
            ]
        );
    }

    #[test]
    fn add_joins_words_and_accepts_flags_later() {
        let cli = GlobalCli::parse_from(["tally", "-v", "add", "Buy", "milk"]);
        assert_eq!(cli.verbose, 1);
        assert_eq!(
            cli.command,
            Some(Command::Add {
                title: vec!["Buy".to_string(), "milk".to_string()]
            })
        );
    }

    #[test]
    fn list_and_browse_parse_typed_values() {
        let cli = GlobalCli::parse_from(["tally", "list", "--filter", "completed"]);
        assert_eq!(
            cli.command,
            Some(Command::List {
                filter: Some(TaskFilter::Completed)
            })
        );

        let cli = GlobalCli::parse_from(["tally", "browse", "users", "-s", "ann", "-p", "2"]);
        assert_eq!(
            cli.command,
            Some(Command::Browse {
                category: Category::Users,
                search: Some("ann".to_string()),
                page: 2,
            })
        );

        assert!(GlobalCli::try_parse_from(["tally", "browse", "comments"]).is_err());
    }

    #[test]
    fn rc_flag_parses_key_values() {
        let cli = GlobalCli::parse_from(["tally", "--rc", "api.timeout_secs=3", "stats"]);
        assert_eq!(cli.rc_overrides.len(), 1);
        assert_eq!(cli.rc_overrides[0].key, "api.timeout_secs");
        assert_eq!(cli.rc_overrides[0].value, "3");
        assert_eq!(cli.command, Some(Command::Stats));
    }
}
