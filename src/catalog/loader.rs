/*!
# Catalog file format

JSON layout of a catalog file: section → entry name → record. Records use
camelCase keys; classes add `methods`, `properties` and `constructors`, enums
add `values`. Sections are `BTreeMap`s so that listings come out in a stable
order.
*/

use serde::Deserialize;
use std::collections::BTreeMap;

use super::entry::{CatalogEntry, CatalogEntryKind, CatalogParameter, CatalogSection};

/// Current version of the catalog file format
pub const CATALOG_FORMAT_VERSION: u32 = 1;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RawCatalog {
    pub version: u32,
    #[serde(default)]
    pub global_methods: BTreeMap<String, RawMember>,
    #[serde(default)]
    pub global_properties: BTreeMap<String, RawMember>,
    #[serde(default)]
    pub classes: BTreeMap<String, RawClass>,
    #[serde(default)]
    pub system_enums: BTreeMap<String, RawEnum>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RawMember {
    pub name: Option<String>,
    pub name_alternate_locale: Option<String>,
    #[serde(default)]
    pub parameters: Vec<CatalogParameter>,
    pub return_description: Option<String>,
    pub return_type: Option<String>,
    #[serde(default)]
    pub availability: Vec<String>,
    pub description: Option<String>,
    pub segment: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RawClass {
    pub name: Option<String>,
    pub name_alternate_locale: Option<String>,
    pub description: Option<String>,
    #[serde(default)]
    pub availability: Vec<String>,
    #[serde(default)]
    pub methods: BTreeMap<String, RawMember>,
    #[serde(default)]
    pub properties: BTreeMap<String, RawMember>,
    #[serde(default)]
    pub constructors: BTreeMap<String, RawMember>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RawEnum {
    pub name: Option<String>,
    pub name_alternate_locale: Option<String>,
    pub description: Option<String>,
    #[serde(default)]
    pub values: BTreeMap<String, RawMember>,
}

impl RawMember {
    /// Converts a record; the map key is used when `name` is absent
    pub fn into_entry(
        self,
        key: &str,
        section: CatalogSection,
        kind: CatalogEntryKind,
        owner: Option<&str>,
    ) -> CatalogEntry {
        CatalogEntry {
            name: self.name.unwrap_or_else(|| key.to_string()),
            name_alternate: self.name_alternate_locale.filter(|n| !n.is_empty()),
            section,
            kind,
            owner: owner.map(str::to_string),
            parameters: self.parameters,
            return_description: self.return_description,
            return_type: self.return_type,
            description: self.description,
            availability: self.availability,
            segment: self.segment,
        }
    }
}

impl RawClass {
    pub fn header_entry(&self, key: &str) -> CatalogEntry {
        CatalogEntry {
            name: self.name.clone().unwrap_or_else(|| key.to_string()),
            name_alternate: self.name_alternate_locale.clone().filter(|n| !n.is_empty()),
            section: CatalogSection::Classes,
            kind: CatalogEntryKind::Class,
            owner: None,
            parameters: Vec::new(),
            return_description: None,
            return_type: None,
            description: self.description.clone(),
            availability: self.availability.clone(),
            segment: None,
        }
    }
}

impl RawEnum {
    pub fn header_entry(&self, key: &str) -> CatalogEntry {
        CatalogEntry {
            name: self.name.clone().unwrap_or_else(|| key.to_string()),
            name_alternate: self.name_alternate_locale.clone().filter(|n| !n.is_empty()),
            section: CatalogSection::SystemEnums,
            kind: CatalogEntryKind::Enum,
            owner: None,
            parameters: Vec::new(),
            return_description: None,
            return_type: None,
            description: self.description.clone(),
            availability: Vec::new(),
            segment: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_catalog_deserializes_camel_case() {
        let json = r#"{
            "version": 1,
            "globalMethods": {
                "СтрДлина": {
                    "name": "СтрДлина",
                    "nameAlternateLocale": "StrLen",
                    "parameters": [{ "name": "Строка", "type": "Строка" }],
                    "returnType": "Число"
                }
            },
            "classes": {
                "Массив": { "nameAlternateLocale": "Array", "methods": { "Добавить": {} } }
            }
        }"#;
        let raw: RawCatalog = serde_json::from_str(json).unwrap();
        assert_eq!(raw.version, 1);
        let member = raw.global_methods.into_iter().next().unwrap();
        let entry = member
            .1
            .into_entry(&member.0, CatalogSection::GlobalContext, CatalogEntryKind::Method, None);
        assert_eq!(entry.name_alternate.as_deref(), Some("StrLen"));
        assert_eq!(entry.parameters[0].type_name.as_deref(), Some("Строка"));

        let (key, class) = raw.classes.into_iter().next().unwrap();
        assert_eq!(class.header_entry(&key).name, "Массив");
        assert!(class.methods.contains_key("Добавить"));
    }
}
