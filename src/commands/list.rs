//! Command: list every component in the catalog.
use anyhow::Result;

use super::CommandSetup;
use crate::cli::GlobalOpts;
use crate::config::catalog::Catalog;
use crate::logging::{Log, Logger};

/// Placeholder for a component without a category.
const NO_CATEGORY: &str = "-";

/// One aligned line per component: name, category, description.
#[must_use]
pub fn render_list(catalog: &Catalog) -> Vec<String> {
    let category_of = |c: &crate::config::catalog::Component| {
        c.category.clone().unwrap_or_else(|| NO_CATEGORY.to_string())
    };
    let name_width = catalog.iter().map(|c| c.name.len()).max().unwrap_or(0);
    let category_width = catalog
        .iter()
        .map(|c| category_of(c).len())
        .max()
        .unwrap_or(0);

    catalog
        .iter()
        .map(|c| {
            format!(
                "{:<name_width$}  {:<category_width$}  {}",
                c.name,
                category_of(c),
                c.description
            )
            .trim_end()
            .to_string()
        })
        .collect()
}

/// Run the list command.
///
/// # Errors
///
/// Returns an error if the catalog cannot be loaded.
pub fn run(global: &GlobalOpts, log: &Logger) -> Result<()> {
    let setup = CommandSetup::init(global, log)?;
    for line in render_list(&setup.config.catalog) {
        log.info(&line);
    }
    log.debug(&format!("{} components", setup.config.catalog.len()));
    Ok(())
}
