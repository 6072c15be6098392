use anyhow::Result;
use clap::Parser;

mod session;

use session::ChatSession;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Relay server base URL
    #[arg(long, default_value = "http://127.0.0.1:3000")]
    server: String,

    /// Name of the guide persona to converse with
    #[arg(long, default_value = "Lily")]
    name: String,

    /// Personality folded into the guide's instruction preamble
    #[arg(
        long,
        default_value = "a friendly guide who helps newcomers find their way around the lounge"
    )]
    personality: String,

    /// Request spoken audio for each reply and save it as an mp3
    #[arg(long)]
    voice: bool,

    /// Send a single message and exit instead of starting a session
    #[arg(short, long)]
    message: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut session = ChatSession::new(cli.server, cli.name, cli.personality, cli.voice);

    match cli.message {
        Some(message) => session.send(&message).await?,
        None => session.run().await?,
    }

    Ok(())
}
