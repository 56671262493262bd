//! `plinth order` - resolve the load order of a plugin directory

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use comfy_table::{Cell, Color, ContentArrangement, Table, presets::UTF8_FULL_CONDENSED};
use plinth_core::{LoadOrder, ManifestLoader, PluginHostConfig, PluginManager};

#[derive(Args)]
pub struct OrderArgs {
    /// Plugin directory (defaults to the configured one)
    pub dir: Option<PathBuf>,
}

pub fn run(args: OrderArgs) -> Result<()> {
    let config = PluginHostConfig::load(&PluginHostConfig::default_path())?;
    let dir = args.dir.unwrap_or_else(|| config.plugin_dir.clone());

    tracing::debug!(dir = %dir.display(), "Resolving load order");
    let manager = PluginManager::new(config);
    manager.register_interface(Arc::new(ManifestLoader::new()));
    let plan = manager
        .plan_load(&dir)
        .with_context(|| format!("Could not read plugin directory {}", dir.display()))?;

    if plan.order.is_empty() && plan.excluded.is_empty() {
        println!("No plugins found in {}", dir.display());
        return Ok(());
    }

    println!("{}", order_table(&plan, &dir));
    if !plan.excluded.is_empty() {
        println!();
        println!("{}", excluded_table(&plan));
    }
    Ok(())
}

fn display_file(file: &Path, dir: &Path) -> String {
    file.strip_prefix(dir).unwrap_or(file).display().to_string()
}

fn order_table(plan: &LoadOrder, dir: &Path) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("#").fg(Color::Cyan),
        Cell::new("Plugin").fg(Color::Cyan),
        Cell::new("Version").fg(Color::Cyan),
        Cell::new("Depends on").fg(Color::Cyan),
        Cell::new("File").fg(Color::Cyan),
    ]);

    for (position, resolved) in plan.order.iter().enumerate() {
        let descriptor = &resolved.descriptor;
        let mut depends: Vec<String> = descriptor.depend.clone();
        depends.extend(descriptor.soft_depend.iter().map(|d| format!("{d} (soft)")));
        let depends = if depends.is_empty() {
            "-".to_string()
        } else {
            depends.join(", ")
        };

        table.add_row(vec![
            Cell::new(position + 1),
            Cell::new(&descriptor.name),
            Cell::new(&descriptor.version),
            Cell::new(depends),
            Cell::new(display_file(&resolved.file, dir)),
        ]);
    }

    table
}

fn excluded_table(plan: &LoadOrder) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("Excluded").fg(Color::Red),
        Cell::new("Reason").fg(Color::Red),
    ]);

    for excluded in &plan.excluded {
        table.add_row(vec![
            Cell::new(excluded.plugin().unwrap_or("?")),
            Cell::new(excluded.to_string()),
        ]);
    }

    table
}
