//! Colored presentation of compile diagnostics.

use crate::errors::{CompileError, Severity, WarningCategory};
use std::fmt::{Display, Formatter, Result as FmtResult};
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

/// A compile error or warning prepared for the terminal.
pub struct Report<'a> {
    error: &'a CompileError,
}

impl<'a> Report<'a> {
    pub fn new(error: &'a CompileError) -> Self {
        Self { error }
    }

    fn label(&self) -> (&'static str, Color) {
        match self.error.severity {
            Severity::Error => ("error", Color::Red),
            Severity::Warning(_) => ("warning", Color::Yellow),
        }
    }

    fn location(&self) -> String {
        let info = &self.error.source_info;
        let pos = info.position;
        match (info.source_name.is_empty(), pos.is_known()) {
            (true, _) => String::new(),
            (false, true) => format!(" [{}:{}:{}]", info.source_name, pos.line, pos.column),
            (false, false) => format!(" [{}]", info.source_name),
        }
    }
}

fn category_name(category: WarningCategory) -> &'static str {
    match category {
        WarningCategory::None => "none",
        WarningCategory::LikelyErrors => "likely-errors",
        WarningCategory::PossibleErrors => "possible-errors",
        WarningCategory::Paranoia => "paranoia",
    }
}

impl Display for Report<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        let (label, _) = self.label();
        write!(f, "{}[{}]", label, self.error.diagnostic_info.error_code)?;
        if let Severity::Warning(category) = self.error.severity {
            write!(f, " ({})", category_name(category))?;
        }
        writeln!(f, "{}:", self.location())?;
        writeln!(f, "  {}", self.error)?;
        if let Some(help) = &self.error.diagnostic_info.help {
            writeln!(f, "  help: {}", help)?;
        }
        Ok(())
    }
}

/// Prints every report to standard error, colored when the terminal allows.
pub fn print_reports(errors: &[&CompileError]) {
    let mut stderr = StandardStream::stderr(ColorChoice::Auto);
    for error in errors {
        let report = Report::new(error);
        if print_colored(&mut stderr, &report).is_err() {
            eprint!("{}", report);
        }
    }
}

fn print_colored(writer: &mut impl WriteColor, report: &Report<'_>) -> std::io::Result<()> {
    let (label, color) = report.label();
    writer.set_color(ColorSpec::new().set_fg(Some(color)).set_bold(true))?;
    write!(writer, "{}", label)?;
    writer.reset()?;
    write!(writer, "[{}]", report.error.diagnostic_info.error_code)?;
    if let Severity::Warning(category) = report.error.severity {
        write!(writer, " ({})", category_name(category))?;
    }
    writeln!(writer, "{}:", report.location())?;
    writeln!(writer, "  {}", report.error)?;
    if let Some(help) = &report.error.diagnostic_info.help {
        writer.set_color(ColorSpec::new().set_fg(Some(Color::Cyan)))?;
        write!(writer, "  help")?;
        writer.reset()?;
        writeln!(writer, ": {}", help)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::SourcePos;
    use crate::errors::ErrorKind;

    #[test]
    fn plain_report_names_code_location_and_help() {
        let error = CompileError::new(
            ErrorKind::IncludesAndExcludes {
                annotation: "@ToString".into(),
            },
            Severity::Error,
            "Person.yaml",
            SourcePos::at(3, 1),
        );
        let text = Report::new(&error).to_string();
        assert!(text.starts_with("error[canopy::usage::includes_and_excludes] [Person.yaml:3:1]:"));
        assert!(text.contains("help: "));
    }
}
