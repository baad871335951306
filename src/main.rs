mod commands;
mod context;
mod duration;
mod error;
mod output;
mod secrets;
mod template;
mod traits;
mod vault;

use clap::{ArgAction, Parser, Subcommand};
use commands::{TemplateCommand, VaultArgs};
use context::Context;
use traits::LogLevel;

#[derive(Parser)]
#[command(name = "vaultify")]
#[command(about = "Render templates with secrets from HashiCorp Vault and record the secrets they consumed", long_about = None)]
#[command(version)]
struct Cli {
    /// Increase log verbosity (-v warnings, -vv info, -vvv debug, -vvvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(flatten)]
    vault: VaultArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render a template, fetching the secrets it references
    Template(TemplateCommand),
}

fn main() {
    let cli = Cli::parse();
    let ctx = Context::new(LogLevel::from_verbosity(cli.verbose));

    let result = match cli.command {
        Commands::Template(cmd) => cmd.execute(&ctx, &cli.vault),
    };

    if let Err(err) = result {
        ctx.output.error(&format!("{:#}", err));
        std::process::exit(1);
    }
}
