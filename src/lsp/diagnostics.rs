//! Конвертация проблем разбора в LSP диагностики

use tower_lsp::lsp_types::{Diagnostic, DiagnosticSeverity, NumberOrString, Position, Range};

use crate::core::{LineIndex, ParseIssue, ParseIssueKind};

pub const DIAGNOSTIC_SOURCE: &str = "bsl-intellisense";

fn issue_code(kind: ParseIssueKind) -> &'static str {
    match kind {
        ParseIssueKind::MalformedHeader => "malformed-header",
        ParseIssueKind::UnterminatedMethod => "unterminated-method",
        ParseIssueKind::UnexpectedTerminator => "unexpected-terminator",
        ParseIssueKind::MismatchedTerminator => "mismatched-terminator",
        ParseIssueKind::UnclosedBlock => "unclosed-block",
        ParseIssueKind::UnclosedRegion => "unclosed-region",
        ParseIssueKind::UnexpectedRegionEnd => "unexpected-region-end",
    }
}

fn issue_severity(kind: ParseIssueKind) -> DiagnosticSeverity {
    match kind {
        ParseIssueKind::UnclosedRegion | ParseIssueKind::UnexpectedRegionEnd => {
            DiagnosticSeverity::INFORMATION
        }
        _ => DiagnosticSeverity::WARNING,
    }
}

/// Конвертирует ParseIssue в LSP Diagnostic, подсвечивая всю строку
pub fn convert_to_lsp_diagnostic(issue: &ParseIssue, lines: &LineIndex<'_>) -> Diagnostic {
    let line_len = lines
        .line(issue.line)
        .map(|l| l.encode_utf16().count())
        .unwrap_or(0);
    Diagnostic {
        range: Range {
            start: Position::new(issue.line as u32, 0),
            end: Position::new(issue.line as u32, line_len as u32),
        },
        severity: Some(issue_severity(issue.kind)),
        code: Some(NumberOrString::String(issue_code(issue.kind).to_string())),
        code_description: None,
        source: Some(DIAGNOSTIC_SOURCE.to_string()),
        message: issue.kind.to_string(),
        related_information: None,
        tags: None,
        data: None,
    }
}

/// Конвертирует все проблемы модуля
pub fn convert_parse_issues(issues: &[ParseIssue], text: &str) -> Vec<Diagnostic> {
    let lines = LineIndex::new(text);
    issues
        .iter()
        .map(|issue| convert_to_lsp_diagnostic(issue, &lines))
        .collect()
}
