//! Handles all user-facing output for the CLI.
//!
//! Phase traces, transformed source and the transform listing are all printed
//! from here so every command formats the same way.

use crate::compiler::CompilePhase;
use difference::{Changeset, Difference};
use std::io::Write;
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

/// The printed module after one phase.
#[derive(Debug, Clone, PartialEq)]
pub struct PhaseSnapshot {
    pub phase: CompilePhase,
    pub source: String,
}

/// Prints each snapshot as a colored diff against the one before it. The
/// first snapshot is printed whole; phases that change nothing get a single
/// line.
pub fn print_trace(snapshots: &[PhaseSnapshot]) {
    let mut stdout = StandardStream::stdout(ColorChoice::Auto);
    let mut previous: Option<&str> = None;
    for snapshot in snapshots {
        let _ = stdout.set_color(ColorSpec::new().set_fg(Some(Color::Yellow)).set_bold(true));
        let _ = writeln!(stdout, "--- {} ---", snapshot.phase);
        let _ = stdout.reset();
        match previous {
            None => {
                let _ = writeln!(stdout, "{}", snapshot.source.trim_end());
            }
            Some(before) if before == snapshot.source => {
                let _ = writeln!(stdout, "(unchanged)");
            }
            Some(before) => {
                let changeset = Changeset::new(before, &snapshot.source, "\n");
                print_diff(&mut stdout, &changeset.diffs);
            }
        }
        let _ = writeln!(stdout);
        previous = Some(&snapshot.source);
    }
}

/// Lines of a trace without color, for tests and piping.
pub fn trace_lines(before: &str, after: &str) -> Vec<String> {
    let changeset = Changeset::new(before, after, "\n");
    let mut lines = Vec::new();
    for diff in &changeset.diffs {
        let (prefix, text) = match diff {
            Difference::Same(x) => (' ', x),
            Difference::Add(x) => ('+', x),
            Difference::Rem(x) => ('-', x),
        };
        lines.extend(text.lines().map(|line| format!("{}{}", prefix, line)));
    }
    lines
}

/// Prints `name  PHASE` rows, aligned.
pub fn print_transforms(rows: &[(String, Option<CompilePhase>)]) {
    let width = rows.iter().map(|(name, _)| name.len()).max().unwrap_or(0);
    let mut stdout = StandardStream::stdout(ColorChoice::Auto);
    for (name, phase) in rows {
        let _ = write!(stdout, "{:width$}  ", name, width = width);
        match phase {
            Some(phase) => {
                let _ = stdout.set_color(ColorSpec::new().set_fg(Some(Color::Green)));
                let _ = writeln!(stdout, "{}", phase);
            }
            None => {
                let _ = stdout.set_color(ColorSpec::new().set_fg(Some(Color::Cyan)));
                let _ = writeln!(stdout, "alias");
            }
        }
        let _ = stdout.reset();
    }
}

/// Prints a one-line summary in green, or red when there were errors.
pub fn print_summary(files: usize, errors: usize, warnings: usize) {
    let mut stdout = StandardStream::stdout(ColorChoice::Auto);
    let color = if errors > 0 { Color::Red } else { Color::Green };
    let _ = stdout.set_color(ColorSpec::new().set_fg(Some(color)).set_bold(true));
    let _ = writeln!(
        stdout,
        "{} file(s) compiled: {} error(s), {} warning(s)",
        files, errors, warnings
    );
    let _ = stdout.reset();
}

// ============================================================================
// PRIVATE HELPERS
// ============================================================================

fn print_diff(stdout: &mut StandardStream, diffs: &[Difference]) {
    for diff in diffs {
        let (prefix, text, color) = match diff {
            Difference::Same(x) => (' ', x, None),
            Difference::Add(x) => ('+', x, Some(Color::Green)),
            Difference::Rem(x) => ('-', x, Some(Color::Red)),
        };
        let _ = stdout.set_color(ColorSpec::new().set_fg(color));
        for line in text.lines() {
            let _ = writeln!(stdout, "{}{}", prefix, line);
        }
    }
    let _ = stdout.reset();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trace_lines_mark_additions_and_removals() {
        let lines = trace_lines("class A {\n}", "class A {\n    int x\n}");
        assert!(lines.contains(&"+    int x".to_string()));
        assert!(lines.iter().all(|l| !l.starts_with('-')));
    }
}
