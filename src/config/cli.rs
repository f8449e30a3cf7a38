use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum, builder::BoolishValueParser};

/// Command-line arguments for the postrank binary.
#[derive(Debug, Parser)]
#[command(name = "postrank", version, about = "Ranked post view maintenance")]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "POSTRANK_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Keep the views up to date until interrupted.
    Run(RunArgs),
    /// Rebuild views from the primary store once and exit.
    Resync(ResyncArgs),
    /// Print the current content of a view as JSON.
    Inspect(InspectArgs),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ViewArg {
    Latest,
    Hottest,
}

impl ViewArg {
    pub fn as_str(self) -> &'static str {
        match self {
            ViewArg::Latest => "latest",
            ViewArg::Hottest => "hottest",
        }
    }
}

#[derive(Debug, Args, Default, Clone)]
pub struct RunArgs {
    #[command(flatten)]
    pub overrides: Overrides,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ResyncArgs {
    #[command(flatten)]
    pub overrides: Overrides,

    /// Only rebuild this view; every view when omitted.
    #[arg(long, value_enum)]
    pub view: Option<ViewArg>,
}

#[derive(Debug, Args, Clone)]
pub struct InspectArgs {
    #[command(flatten)]
    pub overrides: Overrides,

    /// View to print.
    #[arg(long, value_enum)]
    pub view: ViewArg,
}

#[derive(Debug, Args, Default, Clone)]
pub struct Overrides {
    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub log_json: Option<bool>,

    /// Override the database connection URL.
    #[arg(long = "database-url", value_name = "URL")]
    pub database_url: Option<String>,

    /// Override the redis connection URL.
    #[arg(long = "redis-url", value_name = "URL")]
    pub redis_url: Option<String>,

    /// Override the view capacity.
    #[arg(long = "cache-view-capacity", value_name = "COUNT")]
    pub cache_view_capacity: Option<u64>,
}
