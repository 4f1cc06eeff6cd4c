use anyhow::Result;
use std::sync::Arc;

use super::{CommandSetup, run_tasks_to_completion};
use crate::cli::{GlobalOpts, RemoveOpts};
use crate::config::catalog::Catalog;
use crate::graph::dependents_of;
use crate::logging::{Log, Logger};
use crate::prompt::AutoPrompter;
use crate::resources::policy::ConflictMode;
use crate::tasks;

/// Catalog components outside `removing` that depend on a removed one.
fn remaining_dependents(catalog: &Catalog, removing: &[String]) -> Vec<(String, String)> {
    removing
        .iter()
        .flat_map(|name| {
            dependents_of(catalog, name)
                .into_iter()
                .filter(move |d| !removing.iter().any(|r| r == d))
                .map(move |d| (d.to_string(), name.clone()))
        })
        .collect()
}

/// Run the remove command.
///
/// Packages are never uninstalled; only managed links and services change.
///
/// # Errors
///
/// Returns an error if a component is unknown or any task fails.
pub fn run(global: &GlobalOpts, opts: &RemoveOpts, log: &Arc<Logger>) -> Result<()> {
    let setup = CommandSetup::init(global, log.as_ref())?;
    for name in &opts.components {
        setup.config.catalog.require(name)?;
    }

    for (dependent, name) in remaining_dependents(&setup.config.catalog, &opts.components) {
        log.warn(&format!("'{dependent}' depends on '{name}'"));
    }

    let ctx = setup.context(
        global,
        Arc::clone(log) as Arc<dyn Log>,
        ConflictMode::Skip,
        Arc::new(AutoPrompter::default()),
    );
    let result = run_tasks_to_completion(&tasks::remove_tasks(), &opts.components, &ctx, log);
    log.info("installed packages were left in place");
    result
}
