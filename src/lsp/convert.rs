//! Преобразования между типами движка и типами протокола LSP.
//!
//! Columns of the engine count chars; LSP counts UTF-16 units. For the
//! Cyrillic and Latin text of BSL modules both are equal, so columns are
//! passed through unchanged.

use std::path::Path;
use tower_lsp::lsp_types::{
    self as lsp, CompletionItem, CompletionItemKind, Documentation, Location, MarkupContent,
    MarkupKind, ParameterInformation, ParameterLabel, SignatureHelp, SignatureInformation,
    SymbolInformation, TextEdit, Url,
};

use crate::core::{FileLocation, LineIndex, Position};
use crate::parser::{Symbol, SymbolKind};
use crate::query::{FormatOptions, IndentEdit, SignatureInfo};
use crate::resolver::{CompletionCandidate, CompletionKind};

pub fn to_position(position: lsp::Position) -> Position {
    Position::new(position.line as usize, position.character as usize)
}

pub fn to_lsp_position(line: usize, column: usize) -> lsp::Position {
    lsp::Position::new(line as u32, column as u32)
}

pub fn markdown(value: String) -> MarkupContent {
    MarkupContent {
        kind: MarkupKind::Markdown,
        value,
    }
}

/// Location spanning `len` chars from `location`
pub fn to_location(location: &FileLocation, len: usize) -> Option<Location> {
    let uri = Url::from_file_path(&location.file).ok()?;
    Some(Location::new(
        uri,
        lsp::Range::new(
            to_lsp_position(location.line, location.column),
            to_lsp_position(location.line, location.column + len),
        ),
    ))
}

fn completion_item_kind(kind: CompletionKind) -> CompletionItemKind {
    match kind {
        CompletionKind::Procedure | CompletionKind::Function => CompletionItemKind::FUNCTION,
        CompletionKind::Method => CompletionItemKind::METHOD,
        CompletionKind::Variable => CompletionItemKind::VARIABLE,
        CompletionKind::Parameter => CompletionItemKind::VARIABLE,
        CompletionKind::Property => CompletionItemKind::PROPERTY,
        CompletionKind::Class => CompletionItemKind::CLASS,
        CompletionKind::Enum => CompletionItemKind::ENUM,
        CompletionKind::EnumValue => CompletionItemKind::ENUM_MEMBER,
    }
}

/// Completion items; `sort_text` keeps the engine's bucket order in the client
pub fn to_completion_items(candidates: Vec<CompletionCandidate>) -> Vec<CompletionItem> {
    candidates
        .into_iter()
        .enumerate()
        .map(|(idx, candidate)| CompletionItem {
            kind: Some(completion_item_kind(candidate.kind)),
            detail: candidate.detail,
            documentation: candidate
                .documentation
                .map(|doc| Documentation::MarkupContent(markdown(doc))),
            sort_text: Some(format!("{:05}", idx)),
            filter_text: Some(candidate.label.clone()),
            label: candidate.label,
            ..Default::default()
        })
        .collect()
}

pub fn to_signature_help(signature: SignatureInfo) -> SignatureHelp {
    let active = signature.active_parameter as u32;
    SignatureHelp {
        signatures: vec![SignatureInformation {
            label: signature.label,
            documentation: signature
                .documentation
                .map(|doc| Documentation::MarkupContent(markdown(doc))),
            parameters: Some(
                signature
                    .parameters
                    .into_iter()
                    .map(|p| ParameterInformation {
                        label: ParameterLabel::Simple(p.label),
                        documentation: p.documentation.map(Documentation::String),
                    })
                    .collect(),
            ),
            active_parameter: Some(active),
        }],
        active_signature: Some(0),
        active_parameter: Some(active),
    }
}

fn symbol_kind(kind: SymbolKind) -> lsp::SymbolKind {
    match kind {
        SymbolKind::Procedure | SymbolKind::Function => lsp::SymbolKind::FUNCTION,
        SymbolKind::Variable | SymbolKind::Parameter => lsp::SymbolKind::VARIABLE,
    }
}

/// Range from the declaration line to the end of its last line
pub fn symbol_range(symbol: &Symbol, lines: Option<&LineIndex<'_>>) -> lsp::Range {
    let range = &symbol.source_range;
    let end_column = lines
        .and_then(|l| l.line(range.end_line))
        .map(|l| l.chars().count())
        .unwrap_or(range.name_column + symbol.name.chars().count());
    lsp::Range::new(
        to_lsp_position(range.start_line, 0),
        to_lsp_position(range.end_line, end_column),
    )
}

#[allow(deprecated)]
pub fn to_symbol_information(symbol: &Symbol, lines: Option<&LineIndex<'_>>) -> Option<SymbolInformation> {
    let uri = Url::from_file_path(symbol.file()).ok()?;
    Some(SymbolInformation {
        name: symbol.name.clone(),
        kind: symbol_kind(symbol.kind),
        tags: None,
        deprecated: None,
        location: Location::new(uri, symbol_range(symbol, lines)),
        container_name: symbol.region.clone(),
    })
}

pub fn to_format_options(options: &lsp::FormattingOptions) -> FormatOptions {
    FormatOptions {
        tab_size: options.tab_size as usize,
        insert_spaces: options.insert_spaces,
    }
}

/// Each edit replaces the leading whitespace of its line
pub fn to_text_edits(edits: Vec<IndentEdit>) -> Vec<TextEdit> {
    edits
        .into_iter()
        .map(|edit| TextEdit {
            range: lsp::Range::new(
                to_lsp_position(edit.line, 0),
                to_lsp_position(edit.line, edit.old_len),
            ),
            new_text: edit.new_indent,
        })
        .collect()
}

pub fn file_path(uri: &Url) -> Option<std::path::PathBuf> {
    uri.to_file_path().ok()
}

pub fn is_source_file(path: &Path) -> bool {
    crate::parser::Dialect::from_path(path).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::CompletionSource;

    #[test]
    fn test_completion_items_keep_order() {
        let candidates = vec![
            CompletionCandidate {
                label: "Я".into(),
                kind: CompletionKind::Variable,
                source: CompletionSource::Local,
                detail: None,
                documentation: None,
            },
            CompletionCandidate {
                label: "А".into(),
                kind: CompletionKind::Method,
                source: CompletionSource::Catalog,
                detail: None,
                documentation: Some("doc".into()),
            },
        ];
        let items = to_completion_items(candidates);
        assert_eq!(items[0].sort_text.as_deref(), Some("00000"));
        assert_eq!(items[1].sort_text.as_deref(), Some("00001"));
        assert_eq!(items[1].kind, Some(CompletionItemKind::METHOD));
    }

    #[test]
    fn test_indent_edit_covers_leading_whitespace() {
        let edits = to_text_edits(vec![IndentEdit {
            line: 4,
            old_len: 2,
            new_indent: "\t".into(),
        }]);
        assert_eq!(edits[0].range.start, lsp::Position::new(4, 0));
        assert_eq!(edits[0].range.end, lsp::Position::new(4, 2));
        assert_eq!(edits[0].new_text, "\t");
    }

    #[test]
    fn test_position_roundtrip() {
        let pos = to_position(lsp::Position::new(3, 7));
        assert_eq!(pos, Position::new(3, 7));
    }
}
