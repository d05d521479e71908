//! Operator decisions
//!
//! The installer never resolves drift on its own: whenever a local file no
//! longer matches its recorded digest, or a run should continue despite
//! failures, it asks a [`DecisionOracle`]. The CLI uses [`TerminalOracle`]
//! interactively and [`DefaultsOracle`] with `--auto`.

use crate::entry::FileEntry;
use std::fmt;
use std::io::{self, BufRead, Write};

/// The two drift questions asked during reconciliation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriftPrompt {
    /// Files changed by the update whose installed copy was modified locally
    OverwriteChanged,
    /// Files unchanged by the update whose installed copy was modified locally
    OverwriteDrifted,
}

impl DriftPrompt {
    pub fn question(&self, count: usize) -> String {
        match self {
            DriftPrompt::OverwriteChanged => format!(
                "There are {} failed checksums on files to be updated. This may be as a result \
                 of manual config changes. Do you wish to overwrite them with the files from the update?",
                count
            ),
            DriftPrompt::OverwriteDrifted => format!(
                "There are {} failed checksums on already existing files. This may be as a result \
                 of manual config changes. Do you wish to overwrite them with the files from the update?",
                count
            ),
        }
    }
}

impl fmt::Display for DriftPrompt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DriftPrompt::OverwriteChanged => f.write_str("overwrite-changed"),
            DriftPrompt::OverwriteDrifted => f.write_str("overwrite-unchanged-drift"),
        }
    }
}

/// Source of yes/no answers for the install pipeline
pub trait DecisionOracle {
    /// Decide whether the drifted `subjects` may be overwritten
    fn decide(&self, prompt: DriftPrompt, subjects: &[FileEntry], default: bool) -> bool;

    /// Ask a free-form yes/no question
    fn confirm(&self, question: &str, default: bool) -> bool;
}

/// Non-interactive oracle that always takes the default answer
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultsOracle;

impl DecisionOracle for DefaultsOracle {
    fn decide(&self, _prompt: DriftPrompt, _subjects: &[FileEntry], default: bool) -> bool {
        default
    }

    fn confirm(&self, _question: &str, default: bool) -> bool {
        default
    }
}

/// Oracle that gives the same answer to every question
#[derive(Debug, Clone, Copy)]
pub struct FixedOracle(pub bool);

impl DecisionOracle for FixedOracle {
    fn decide(&self, _prompt: DriftPrompt, _subjects: &[FileEntry], _default: bool) -> bool {
        self.0
    }

    fn confirm(&self, _question: &str, _default: bool) -> bool {
        self.0
    }
}

/// Interactive oracle reading `y`/`n` answers from stdin
///
/// An empty answer, or a closed stdin, selects the default.
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalOracle {
    /// Print the affected paths before asking a drift question
    pub list_subjects: bool,
}

impl TerminalOracle {
    pub fn new(list_subjects: bool) -> Self {
        Self { list_subjects }
    }

    fn ask(&self, question: &str, default: bool) -> bool {
        let stdin = io::stdin();
        let mut input = stdin.lock();

        loop {
            print!("{} {} ", question, if default { "[Y/n]" } else { "[y/N]" });
            let _ = io::stdout().flush();

            let mut line = String::new();
            match input.read_line(&mut line) {
                Ok(0) | Err(_) => return default,
                Ok(_) => {}
            }

            if let Some(answer) = parse_answer(&line) {
                return answer.unwrap_or(default);
            }
            println!("Please answer 'y' or 'n'.");
        }
    }
}

impl DecisionOracle for TerminalOracle {
    fn decide(&self, prompt: DriftPrompt, subjects: &[FileEntry], default: bool) -> bool {
        if self.list_subjects {
            for entry in subjects {
                println!("  • {}", entry.full_path());
            }
        }
        self.ask(&prompt.question(subjects.len()), default)
    }

    fn confirm(&self, question: &str, default: bool) -> bool {
        self.ask(question, default)
    }
}

/// `Some(None)` for an empty answer, `Some(Some(b))` for yes/no, `None` otherwise
fn parse_answer(line: &str) -> Option<Option<bool>> {
    match line.trim().to_ascii_lowercase().as_str() {
        "" => Some(None),
        "y" | "yes" => Some(Some(true)),
        "n" | "no" => Some(Some(false)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_answer() {
        assert_eq!(parse_answer("\n"), Some(None));
        assert_eq!(parse_answer("Y\n"), Some(Some(true)));
        assert_eq!(parse_answer("  yes "), Some(Some(true)));
        assert_eq!(parse_answer("n"), Some(Some(false)));
        assert_eq!(parse_answer("NO\r\n"), Some(Some(false)));
        assert_eq!(parse_answer("maybe"), None);
    }

    #[test]
    fn test_defaults_oracle_follows_default() {
        let oracle = DefaultsOracle;
        assert!(oracle.decide(DriftPrompt::OverwriteDrifted, &[], true));
        assert!(!oracle.decide(DriftPrompt::OverwriteChanged, &[], false));
        assert!(oracle.confirm("continue?", true));
    }

    #[test]
    fn test_fixed_oracle_ignores_default() {
        assert!(!FixedOracle(false).decide(DriftPrompt::OverwriteDrifted, &[], true));
        assert!(FixedOracle(true).confirm("continue?", false));
    }

    #[test]
    fn test_question_mentions_count() {
        assert!(DriftPrompt::OverwriteChanged.question(3).contains("3 failed checksums"));
        assert!(DriftPrompt::OverwriteDrifted
            .question(1)
            .contains("already existing files"));
    }
}
