//! Platform detection
//!
//! Maps the compile-time target onto the operating system and architecture
//! names used by the Adoptium API.
//!
//! # Examples
//!
//! ```
//! use serverpack::{detect_arch, detect_os};
//!
//! println!("{} / {}", detect_os(), detect_arch());
//! ```

use std::env;

/// Operating system name as Adoptium spells it: "linux", "mac" or "windows"
pub fn detect_os() -> String {
    os_name(env::consts::OS)
}

/// Architecture name as Adoptium spells it: "x64", "aarch64", ...
pub fn detect_arch() -> String {
    arch_name(env::consts::ARCH)
}

fn os_name(os: &str) -> String {
    match os {
        "macos" => "mac".to_string(),
        other => other.to_string(), // "linux" and "windows" already match
    }
}

fn arch_name(arch: &str) -> String {
    match arch {
        "x86_64" => "x64".to_string(),
        "x86" => "x32".to_string(),
        other => other.to_string(),
    }
}

/// File name of the java launcher on this platform
pub fn java_executable() -> &'static str {
    if cfg!(windows) {
        "java.exe"
    } else {
        "java"
    }
}
