use anyhow::Result;
use clap::{Args, Subcommand};
use plinth_core::PluginHostConfig;

#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommands,
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Show the effective configuration
    Show,
    /// Show the configuration file path
    Path,
}

pub fn run(args: ConfigArgs) -> Result<()> {
    match args.command {
        ConfigCommands::Show => show_config(),
        ConfigCommands::Path => show_path(),
    }
}

fn show_config() -> Result<()> {
    let config = PluginHostConfig::load(&PluginHostConfig::default_path())?;
    println!("{}", render(&config)?);
    Ok(())
}

fn show_path() -> Result<()> {
    println!("Config file:      {:?}", PluginHostConfig::default_path());
    println!("Plugin directory: {:?}", plinth_paths::plugin_dir());
    Ok(())
}

fn render(config: &PluginHostConfig) -> Result<String> {
    Ok(toml::to_string_pretty(config)?)
}
