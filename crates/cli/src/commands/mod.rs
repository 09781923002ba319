// CLI subcommand dispatch.

use clap::Subcommand;

pub mod manifest;
pub mod token;

#[derive(Subcommand)]
pub enum Command {
    /// Print the slash-command registration manifest
    Commands(manifest::ManifestArgs),
    /// Encode or decode interaction tokens
    Token(token::TokenArgs),
}

pub fn run(cmd: Command) -> anyhow::Result<()> {
    match cmd {
        Command::Commands(args) => manifest::run(args),
        Command::Token(args) => token::run(args),
    }
}
