//! Подсказка параметров вызова.

use serde::Serialize;
use std::sync::Arc;

use crate::catalog::{Catalog, CatalogEntry, CatalogEntryKind, Locale};
use crate::core::Position;
use crate::parser::Symbol;
use crate::resolver::{call_context, Resolution, Resolver};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParameterInfo {
    pub label: String,
    pub documentation: Option<String>,
}

/// Сигнатура вызываемого метода
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SignatureInfo {
    pub label: String,
    pub parameters: Vec<ParameterInfo>,
    pub active_parameter: usize,
    pub documentation: Option<String>,
}

impl SignatureInfo {
    fn from_symbol(symbol: &Symbol, active_parameter: usize) -> Option<Self> {
        if !symbol.kind.is_method() {
            return None;
        }
        Some(Self {
            label: symbol.signature_label(),
            parameters: symbol
                .params
                .iter()
                .map(|p| ParameterInfo {
                    label: p.to_string(),
                    documentation: None,
                })
                .collect(),
            active_parameter,
            documentation: symbol.documentation_text(),
        })
    }

    fn from_catalog(entry: &CatalogEntry, active_parameter: usize, locale: Locale) -> Option<Self> {
        if !entry.kind.is_callable() {
            return None;
        }
        Some(Self {
            label: entry.signature_label(locale),
            parameters: entry
                .parameters
                .iter()
                .map(|p| ParameterInfo {
                    label: p.to_string(),
                    documentation: p.description.clone(),
                })
                .collect(),
            active_parameter,
            documentation: entry.description.clone(),
        })
    }
}

/// The constructor with enough parameters for the active argument, else the first
fn pick_constructor(
    catalog: &Catalog,
    class: &CatalogEntry,
    active_parameter: usize,
) -> Option<Arc<CatalogEntry>> {
    let constructors = &catalog.class(&class.name)?.constructors;
    constructors
        .iter()
        .find(|c| c.parameters.len() > active_parameter)
        .or_else(|| constructors.first())
        .cloned()
}

/// Signature of the innermost unclosed call before `position`
pub fn signature_at(resolver: &Resolver<'_>, position: Position, locale: Locale) -> Option<SignatureInfo> {
    let line = resolver.line(position.line)?;
    let prefix_end = crate::core::position::char_to_byte(line, position.column);
    let call = call_context(&line[..prefix_end])?;

    match resolver.resolve_at(Position::new(position.line, call.callee_end))? {
        Resolution::Catalog(entry) if entry.kind == CatalogEntryKind::Class => {
            let constructor = pick_constructor(resolver.catalog(), &entry, call.active_parameter)?;
            SignatureInfo::from_catalog(&constructor, call.active_parameter, locale)
        }
        Resolution::Catalog(entry) => SignatureInfo::from_catalog(&entry, call.active_parameter, locale),
        resolution => resolution
            .symbol()
            .and_then(|s| SignatureInfo::from_symbol(s, call.active_parameter)),
    }
}
