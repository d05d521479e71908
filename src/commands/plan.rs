use anyhow::Result;
use serverpack::{Config, DefaultsOracle, Installer, ManifestSource, ReconcileOptions};
use std::path::PathBuf;

pub async fn run(path: PathBuf, localpack: PathBuf, integrity: bool) -> Result<()> {
    let config = Config::load()?;
    let installer = Installer::new(&config, Box::new(DefaultsOracle))?;

    let options = ReconcileOptions {
        integrity: integrity || config.integrity.enabled,
        integrity_update: config.integrity.update_bias,
    };
    let plan = installer
        .plan(&path, &ManifestSource::Local(localpack), options)
        .await?;

    for change in &plan.changed {
        println!("  ~ {}", change.new.full_path());
    }
    for entry in &plan.new {
        println!("  + {}", entry.full_path());
    }
    for entry in &plan.removed {
        println!("  - {}", entry.full_path());
    }
    for entry in &plan.checksum_conflicts {
        println!("  ! {} (modified locally, changed by update)", entry.full_path());
    }
    for entry in &plan.integrity_failures {
        println!("  ! {} (modified locally)", entry.full_path());
    }

    println!();
    if plan.is_noop() {
        println!("✓ Up to date");
    } else {
        println!(
            "{} changed, {} new, {} removed, {} unchanged",
            plan.changed.len(),
            plan.new.len(),
            plan.removed.len(),
            plan.unchanged.len()
        );
    }
    Ok(())
}
