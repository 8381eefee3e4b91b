//! Записи каталога стандартной библиотеки.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Язык отображаемых имён
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Locale {
    #[default]
    Ru,
    En,
}

/// Раздел каталога, в котором находится запись
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CatalogSection {
    GlobalContext,
    Classes,
    SystemEnums,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CatalogEntryKind {
    Method,
    Property,
    Class,
    Enum,
    EnumValue,
    Constructor,
}

impl CatalogEntryKind {
    pub fn is_callable(self) -> bool {
        matches!(self, CatalogEntryKind::Method | CatalogEntryKind::Constructor)
    }

    pub fn is_type(self) -> bool {
        matches!(self, CatalogEntryKind::Class | CatalogEntryKind::Enum)
    }
}

impl fmt::Display for CatalogEntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            CatalogEntryKind::Method => "method",
            CatalogEntryKind::Property => "property",
            CatalogEntryKind::Class => "class",
            CatalogEntryKind::Enum => "enum",
            CatalogEntryKind::EnumValue => "enum value",
            CatalogEntryKind::Constructor => "constructor",
        };
        f.write_str(text)
    }
}

/// Параметр встроенного метода или конструктора
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogParameter {
    pub name: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub type_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub optional: bool,
}

impl fmt::Display for CatalogParameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.optional {
            write!(f, "{}?", self.name)
        } else {
            write!(f, "{}", self.name)
        }
    }
}

/// Неизменяемое описание встроенного элемента языка
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub name: String,
    pub name_alternate: Option<String>,
    pub section: CatalogSection,
    pub kind: CatalogEntryKind,
    /// Class or enum owning a member entry
    pub owner: Option<String>,
    pub parameters: Vec<CatalogParameter>,
    pub return_description: Option<String>,
    /// Catalog class produced by a call or property read, for chained access
    pub return_type: Option<String>,
    pub description: Option<String>,
    pub availability: Vec<String>,
    /// Group inside the global context ("Функции работы со строками")
    pub segment: Option<String>,
}

impl CatalogEntry {
    /// Case-insensitive match against either locale
    pub fn matches_name(&self, name: &str) -> bool {
        let lower = name.to_lowercase();
        self.name.to_lowercase() == lower
            || self
                .name_alternate
                .as_ref()
                .map(|alt| alt.to_lowercase() == lower)
                .unwrap_or(false)
    }

    /// Name in the requested locale, falling back to the primary one
    pub fn display_name(&self, locale: Locale) -> &str {
        match locale {
            Locale::Ru => &self.name,
            Locale::En => self.name_alternate.as_deref().unwrap_or(&self.name),
        }
    }

    /// Names in both locales
    pub fn names(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.name.as_str()).chain(self.name_alternate.as_deref())
    }

    /// `Сообщить(ТекстСообщения, Статус?)` for callables, bare name otherwise
    pub fn signature_label(&self, locale: Locale) -> String {
        let name = self.display_name(locale);
        if !self.kind.is_callable() {
            return name.to_string();
        }
        let params: Vec<String> = self.parameters.iter().map(|p| p.to_string()).collect();
        format!("{}({})", name, params.join(", "))
    }

    /// Markdown text for hover and completion documentation
    pub fn documentation(&self, locale: Locale) -> String {
        let mut doc = format!("```bsl\n{}\n```", self.signature_label(locale));
        if let Some(description) = &self.description {
            doc.push_str("\n\n");
            doc.push_str(description);
        }
        let described: Vec<&CatalogParameter> = self
            .parameters
            .iter()
            .filter(|p| p.description.is_some() || p.type_name.is_some())
            .collect();
        if !described.is_empty() {
            doc.push_str("\n\n**Параметры:**");
            for param in described {
                doc.push_str(&format!("\n- `{}`", param.name));
                if let Some(type_name) = &param.type_name {
                    doc.push_str(&format!(" ({})", type_name));
                }
                if let Some(description) = &param.description {
                    doc.push_str(&format!(": {}", description));
                }
            }
        }
        if let Some(returns) = self.return_description.as_ref().or(self.return_type.as_ref()) {
            doc.push_str(&format!("\n\n**Возвращаемое значение:** {}", returns));
        }
        if !self.availability.is_empty() {
            doc.push_str(&format!("\n\n_Доступность: {}_", self.availability.join(", ")));
        }
        doc
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message() -> CatalogEntry {
        CatalogEntry {
            name: "Сообщить".into(),
            name_alternate: Some("Message".into()),
            section: CatalogSection::GlobalContext,
            kind: CatalogEntryKind::Method,
            owner: None,
            parameters: vec![
                CatalogParameter {
                    name: "ТекстСообщения".into(),
                    type_name: Some("Строка".into()),
                    description: None,
                    optional: false,
                },
                CatalogParameter {
                    name: "Статус".into(),
                    type_name: None,
                    description: None,
                    optional: true,
                },
            ],
            return_description: None,
            return_type: None,
            description: Some("Выводит сообщение.".into()),
            availability: vec!["Клиент".into()],
            segment: None,
        }
    }

    #[test]
    fn test_matches_either_locale() {
        let entry = message();
        assert!(entry.matches_name("сообщить"));
        assert!(entry.matches_name("MESSAGE"));
        assert!(!entry.matches_name("Сообщ"));
    }

    #[test]
    fn test_signature_label_per_locale() {
        let entry = message();
        assert_eq!(entry.signature_label(Locale::Ru), "Сообщить(ТекстСообщения, Статус?)");
        assert_eq!(entry.signature_label(Locale::En), "Message(ТекстСообщения, Статус?)");
    }

    #[test]
    fn test_documentation_mentions_description() {
        let doc = message().documentation(Locale::Ru);
        assert!(doc.contains("Выводит сообщение."));
        assert!(doc.contains("Доступность: Клиент"));
    }
}
