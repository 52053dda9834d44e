//! Error rendering using ariadne
//!
//! Code generation errors carry a rendering of the offending AST node. The
//! rendering doubles as the report's source text, so the whole node is
//! underlined and annotated with the specific mismatch.

use crate::CodegenError;
use ariadne::{ColorGenerator, Label, Report, ReportKind, Source};
use std::io::Write;

const SOURCE_ID: &str = "<ast>";

/// Render an error with formatting to stderr
pub fn render_error(error: &CodegenError) {
    render_error_to_writer(error, &mut std::io::stderr(), true).ok();
}

/// Render an error to a specific writer
pub fn render_error_to(error: &CodegenError, writer: &mut dyn Write) -> std::io::Result<()> {
    render_error_to_writer(error, writer, true)
}

/// Render an error to a String
pub fn render_error_to_string(error: &CodegenError) -> String {
    let mut buf = Vec::new();
    render_error_to_writer(error, &mut buf, true).ok();
    String::from_utf8_lossy(&buf).to_string()
}

/// Render an error to a String without color codes (useful for tests)
pub fn render_error_to_string_no_color(error: &CodegenError) -> String {
    let mut buf = Vec::new();
    render_error_to_writer(error, &mut buf, false).ok();
    String::from_utf8_lossy(&buf).to_string()
}

fn render_error_to_writer(
    error: &CodegenError,
    writer: &mut dyn Write,
    use_color: bool,
) -> std::io::Result<()> {
    let source = error.node.as_str();
    let span = 0..source.chars().count();

    let mut colors = ColorGenerator::new();
    colors.next(); // Skip the first color.

    let headline = match &error.cause {
        Some(cause) => cause.to_string(),
        None => error.message.to_string(),
    };

    let mut report = Report::build(ReportKind::Error, (SOURCE_ID, span.clone()))
        .with_message(&headline)
        .with_config(ariadne::Config::default().with_color(use_color));

    report = report.with_label(
        Label::new((SOURCE_ID, span))
            .with_message(&headline)
            .with_color(colors.next()),
    );

    if error.cause.is_some() {
        report = report.with_note(error.message);
    }

    report
        .finish()
        .write((SOURCE_ID, Source::from(source)), &mut *writer)
}
