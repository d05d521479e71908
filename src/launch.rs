//! Start script generation
//!
//! Writes `start.sh` and `start.bat` into the install root. Both ask the
//! operator to accept the Mojang EULA on first run, then start the server
//! with the memory limits from the manifest's `specs`.

use crate::manifest::Specs;
use crate::modloader::LaunchTarget;
use crate::Result;
use std::fs;
use std::path::{Path, PathBuf};

const EULA_URL: &str = "https://account.mojang.com/documents/minecraft_eula";

/// Write both start scripts, replacing existing ones
///
/// `java` is the java command as seen from the install root. Returns the
/// paths written.
pub fn write_start_scripts(
    root: &Path,
    specs: &Specs,
    target: &LaunchTarget,
    java: &Path,
) -> Result<Vec<PathBuf>> {
    let jvm_args = jvm_args(specs);

    let sh_path = root.join("start.sh");
    fs::write(&sh_path, shell_script(&jvm_args, target, java))?;
    make_executable(&sh_path)?;

    let bat_path = root.join("start.bat");
    fs::write(&bat_path, batch_script(&jvm_args, target, java))?;

    Ok(vec![sh_path, bat_path])
}

fn jvm_args(specs: &Specs) -> String {
    format!(
        "-server -XX:+UseG1GC -XX:+UnlockExperimentalVMOptions -Xmx{}M -Xms{}M",
        specs.recommended, specs.minimum
    )
}

fn shell_script(jvm_args: &str, target: &LaunchTarget, java: &Path) -> String {
    let launch = match target {
        LaunchTarget::Jar(jar) => format!("-jar {}", jar),
        LaunchTarget::ArgsFiles { unix, .. } => format!("@{}", unix),
    };
    let java = java.to_string_lossy().replace('\\', "/");
    let java = if java.contains('/') && !java.starts_with('/') {
        format!("./{}", java)
    } else {
        java
    };

    format!(
        "#!/usr/bin/env bash\n\
         cd \"$(dirname \"$0\")\"\n\
         if ! grep -qs \"eula=true\" eula.txt; then\n    \
         echo \"Do you agree to the Mojang EULA available at {eula} ?\"\n    \
         read -r -n 1 -p \"[y/n] \" EULA\n    \
         echo\n    \
         if [ \"$EULA\" = \"y\" ]; then\n        \
         echo \"eula=true\" > eula.txt\n    \
         else\n        \
         exit 1\n    \
         fi\n\
         fi\n\
         \"{java}\" {jvm_args} {launch} nogui \"$@\"\n",
        eula = EULA_URL,
        java = java,
        jvm_args = jvm_args,
        launch = launch,
    )
}

fn batch_script(jvm_args: &str, target: &LaunchTarget, java: &Path) -> String {
    let launch = match target {
        LaunchTarget::Jar(jar) => format!("-jar {}", jar),
        LaunchTarget::ArgsFiles { windows, .. } => format!("@{}", windows),
    };
    let java = java.to_string_lossy().replace('/', "\\");
    let java = if java == "java" { "java.exe".to_string() } else { java };

    [
        "@echo off".to_string(),
        "cd /d \"%~dp0\"".to_string(),
        "findstr /c:\"eula=true\" eula.txt >nul 2>&1 && goto START".to_string(),
        format!("echo Do you agree to the Mojang EULA available at {} ?", EULA_URL),
        "set /p EULA=[y/n] ".to_string(),
        "IF /I \"%EULA%\" NEQ \"y\" GOTO END".to_string(),
        "echo eula=true>eula.txt".to_string(),
        ":START".to_string(),
        format!("\"{}\" {} {} nogui %*", java, jvm_args, launch),
        ":END".to_string(),
        String::new(),
    ]
    .join("\r\n")
}

#[cfg(unix)]
fn make_executable(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o755))?;
    Ok(())
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) -> Result<()> {
    Ok(())
}
