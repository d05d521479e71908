use anyhow::Result;
use serverpack::Config;

pub fn run(action: &crate::ConfigAction) -> Result<()> {
    use crate::ConfigAction;

    match action {
        ConfigAction::Show => show_config(),
        ConfigAction::Set { key, value } => set_config(key, value),
    }
}

fn show_config() -> Result<()> {
    let config = Config::load()?;
    let config_path = Config::default_path()?;

    println!();
    println!("╔══════════════════════════════════════════════════════════════════════════════╗");
    println!("║                        serverpack Configuration                              ║");
    println!("╚══════════════════════════════════════════════════════════════════════════════╝");
    println!();
    println!("  📁 Config file: {}", config_path.display());
    println!();

    section("Downloads");
    row("Threads", config.download.threads.to_string());
    row(
        "Progress interval",
        format!("{} ms", config.download.progress_interval_ms),
    );
    row("Verify downloads", format_bool(config.download.verify_downloads));
    row(
        "Connect timeout",
        format!("{} s", config.download.connect_timeout_secs),
    );
    row("User agent", config.download.user_agent.clone());
    end_section();

    section("Integrity");
    row("Check unchanged files", format_bool(config.integrity.enabled));
    row("Overwrite by default", format_bool(config.integrity.update_bias));
    end_section();

    section("Runtime");
    row("Download Java", format_bool(config.runtime.enabled));
    row("Default Java", config.runtime.default_java_version.clone());
    end_section();

    section("Endpoints");
    row("Modpacks API", config.api.modpacks_url.clone());
    row("Adoptium API", config.api.adoptium_url.clone());
    row("Forge maven", config.api.forge_maven_url.clone());
    row("Mojang manifest", config.api.mojang_manifest_url.clone());
    end_section();

    section("Launch");
    row("Start scripts", format_bool(config.launch.generate_start_script));
    end_section();

    println!("💡 Modify settings:");
    println!("   serverpack config set <key> <value>");
    println!();
    println!("   Example: serverpack config set download.threads 4");
    println!();

    Ok(())
}

fn section(title: &str) {
    let header = format!("┌─ {} ", title);
    let width = header.chars().count();
    println!("{}{}┐", header, "─".repeat(79_usize.saturating_sub(width)));
}

fn row(label: &str, value: String) {
    let line = format!("│  {:22} {}", format!("{}:", label), value);
    let width = line.chars().count();
    println!("{}{}│", line, " ".repeat(79_usize.saturating_sub(width)));
}

fn end_section() {
    println!("└{}┘", "─".repeat(78));
    println!();
}

fn format_bool(value: bool) -> String {
    if value {
        "✅ enabled".to_string()
    } else {
        "❌ disabled".to_string()
    }
}

fn set_config(key: &str, value: &str) -> Result<()> {
    let mut config = Config::load()?;

    println!();
    println!("⚙️  Updating configuration...");
    println!();

    config.set(key, value)?;
    config.save()?;

    println!("  ✓ {} = \"{}\"", key, value);
    println!();
    println!("✅ Configuration saved");
    println!();

    Ok(())
}
