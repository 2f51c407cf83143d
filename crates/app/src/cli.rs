use clap::{Parser, ValueEnum};

#[derive(Debug, Parser)]
#[command(author, version, about)]
pub struct Cli {
    #[arg(long, default_value = "serve")]
    pub mode: Mode,
    /// Post URL to harvest in fetch mode.
    #[arg(long)]
    pub url: Option<String>,
    #[arg(long)]
    pub account_id: Option<String>,
    #[arg(long)]
    pub access_token: Option<String>,
    #[arg(long, default_value_t = false)]
    pub mock: bool,
    #[arg(long, default_value_t = false)]
    pub pretty: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum Mode {
    Serve,
    Fetch,
}
