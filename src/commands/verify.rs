use anyhow::Result;
use serverpack::verify_installation;
use std::path::PathBuf;

pub fn run(path: PathBuf) -> Result<()> {
    println!("Verifying installation at {}", path.display());
    println!();

    let report = verify_installation(&path)?;

    for entry in &report.drifted {
        println!("  ✗ modified: {}", entry.full_path());
    }
    for entry in &report.missing {
        println!("  ✗ missing:  {}", entry.full_path());
    }

    println!();
    println!(
        "{} valid, {} modified, {} missing",
        report.valid.len(),
        report.drifted.len(),
        report.missing.len()
    );

    if !report.is_clean() {
        anyhow::bail!(
            "{} installed file(s) do not match the manifest",
            report.drifted.len() + report.missing.len()
        );
    }

    println!("✓ All files verified");
    Ok(())
}
