use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "plinth", about = "Inspect plinth plugin directories")]
#[command(version, propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Show or locate the host configuration
    Config(commands::config::ConfigArgs),
    /// Print the order plugins in a directory would load in
    Order(commands::order::OrderArgs),
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Config(args) => commands::config::run(args),
        Commands::Order(args) => commands::order::run(args),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_order_with_dir() {
        let cli = Cli::try_parse_from(["plinth", "order", "/srv/plugins"]).unwrap();
        match cli.command {
            Commands::Order(args) => {
                assert_eq!(args.dir.unwrap().to_str(), Some("/srv/plugins"));
            }
            _ => panic!("expected order command"),
        }
    }

    #[test]
    fn test_cli_verbose_is_global() {
        let cli = Cli::try_parse_from(["plinth", "config", "show", "--verbose"]).unwrap();
        assert!(cli.verbose);
    }

    #[test]
    fn test_cli_requires_subcommand() {
        assert!(Cli::try_parse_from(["plinth"]).is_err());
    }
}
