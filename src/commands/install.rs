use crate::InstallArgs;
use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};
use serverpack::{
    Config, DecisionOracle, DefaultsOracle, DownloadEvent, InstallOptions, Installer,
    ManifestSource, ProgressCallback, TerminalOracle,
};
use std::sync::Arc;

/// Create an indicatif-based download progress callback for CLI display
fn create_progress_callback() -> Result<ProgressCallback> {
    let pb = ProgressBar::new(0);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{bar:40.cyan/blue}] {pos}/{len} files {msg}")?
            .progress_chars("#>-"),
    );

    Ok(Arc::new(move |event: &DownloadEvent| match event {
        DownloadEvent::Progress(snapshot) => {
            pb.set_length(snapshot.total as u64);
            pb.set_position((snapshot.succeeded + snapshot.failed) as u64);
            if snapshot.failed > 0 {
                pb.set_message(format!("({} failed)", snapshot.failed));
            }
        }
        DownloadEvent::Failed { entry, error } => {
            pb.println(format!("  ✗ {}: {}", entry, error));
        }
        DownloadEvent::Finished(_) => pb.finish_and_clear(),
    }))
}

pub async fn run(args: InstallArgs, verbose: bool) -> Result<()> {
    let mut config = Config::load()?;
    if let Some(threads) = args.threads {
        config.download.threads = threads;
    }
    if args.integrity {
        config.integrity.enabled = true;
    }
    if args.integrity_update {
        config.integrity.update_bias = true;
    }
    if args.no_java {
        config.runtime.enabled = false;
    }
    if args.no_start_script {
        config.launch.generate_start_script = false;
    }

    let source = match (args.localpack, args.pack, args.version) {
        (Some(path), _, _) => ManifestSource::Local(path),
        (None, Some(pack), Some(version)) => ManifestSource::Remote { pack, version },
        _ => anyhow::bail!("Either --localpack or --pack with --version is required"),
    };

    let oracle: Box<dyn DecisionOracle> = if args.auto {
        Box::new(DefaultsOracle)
    } else {
        Box::new(TerminalOracle::new(verbose))
    };

    let installer = Installer::new(&config, oracle)?.with_progress(create_progress_callback()?);
    let options = InstallOptions::from_config(&config, args.path.clone(), source);

    println!("Installing into {}", args.path.display());
    let summary = installer.install(&options).await?;

    let plan = &summary.reconciliation;
    if summary.upgrade {
        println!(
            "This install has {} files changed, {} new files and {} deleted files",
            plan.changed.len(),
            plan.new.len(),
            plan.removed.len()
        );
    }
    for failure in &summary.cleanup.failures {
        eprintln!(
            "  ⚠ Error occurred whilst removing {}: {}",
            failure.path.display(),
            failure.error
        );
    }

    let downloads = &summary.downloads;
    println!(
        "Downloaded {} successful, {} failed, {} incomplete.",
        downloads.succeeded(),
        downloads.failed(),
        downloads.incomplete()
    );

    if let Some(error) = &summary.loader_error {
        eprintln!("  ⚠ {}", error);
        eprintln!("  The mod loader could not be installed. Please install it manually.");
    }
    for script in &summary.scripts {
        println!("  ✓ Wrote {}", script.display());
    }

    println!();
    println!(
        "✓ Installed {} ({})",
        summary.manifest.name, summary.manifest.release_type
    );
    Ok(())
}
