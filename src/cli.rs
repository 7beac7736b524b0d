use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "vidrelay")]
#[command(author, version, about = "Telegram bot that downloads media with yt-dlp and sends it back", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Commands {
    /// Run the bot (default)
    Run,

    /// Print the formats that would be offered for a URL, without downloading
    Formats {
        /// Media URL to inspect
        url: String,

        /// Path to a cookies file for sites that need a login
        #[arg(short, long)]
        cookies: Option<String>,
    },
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
