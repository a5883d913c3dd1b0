use std::collections::BTreeMap;
use serde::{Serialize, Deserialize};

/// Unit properties: standard attributes and free-form extension properties.
pub type Properties = BTreeMap<String, String>;

pub const TUID: &str = "tuid";
pub const CREATION_DATE: &str = "creationdate";
pub const CREATION_ID: &str = "creationid";
pub const PROJECT: &str = "project";
pub const CUSTOMER: &str = "customer";
pub const SUBJECT: &str = "subject";
pub const FLAG: &str = "x-flag";
pub const FLAG_VALUE: &str = "SW-Flag";

/// Property keys that are unit attributes rather than extension properties.
pub const STANDARD_ATTRIBUTES: [&str; 14] = [
    "tuid",
    "o-encoding",
    "datatype",
    "usagecount",
    "lastusagedate",
    "creationtool",
    "creationtoolversion",
    "creationdate",
    "creationid",
    "changedate",
    "segtype",
    "changeid",
    "o-tmf",
    "srclang",
];

pub fn is_standard_attribute(key: &str) -> bool {
    STANDARD_ATTRIBUTES.contains(&key)
}

/// Stored text of one variant: extracted plain text plus the raw markup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentText {
    pub plain: String,
    pub markup: String,
}

/// Language-specific text of a unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Variant {
    pub lang: String,
    pub markup: String,
    pub plain_text: String,
}

impl Variant {
    pub fn from_segment(lang: &str, segment: SegmentText) -> Self {
        Variant {
            lang: lang.to_string(),
            markup: segment.markup,
            plain_text: segment.plain,
        }
    }
}

/// A reconstructed translation unit: properties plus one variant per language.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranslationUnit {
    pub id: String,
    pub properties: Properties,
    pub variants: BTreeMap<String, Variant>,
}

impl TranslationUnit {
    pub fn new(id: impl Into<String>, properties: Properties) -> Self {
        TranslationUnit {
            id: id.into(),
            properties,
            variants: BTreeMap::new(),
        }
    }

    pub fn variant(&self, lang: &str) -> Option<&Variant> {
        self.variants.get(lang)
    }

    pub fn attributes(&self) -> impl Iterator<Item = (&String, &String)> {
        self.properties.iter().filter(|(k, _)| is_standard_attribute(k))
    }

    pub fn extension_properties(&self) -> impl Iterator<Item = (&String, &String)> {
        self.properties.iter().filter(|(k, _)| !is_standard_attribute(k))
    }
}

/// Incoming variant as handed over by a format codec.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariantRecord {
    pub lang: String,
    pub markup: String,
}

/// Incoming unit as handed over by a format codec. Plain text is derived
/// from the markup when the unit is stored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitRecord {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub properties: Properties,
    #[serde(default)]
    pub variants: Vec<VariantRecord>,
}

impl UnitRecord {
    pub fn new(id: impl Into<String>) -> Self {
        UnitRecord {
            id: Some(id.into()),
            ..Default::default()
        }
    }

    pub fn with_variant(mut self, lang: impl Into<String>, markup: impl Into<String>) -> Self {
        self.variants.push(VariantRecord {
            lang: lang.into(),
            markup: markup.into(),
        });
        self
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }
}

/// Append-only registries derived from stored units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Registry {
    Languages,
    Projects,
    Customers,
    Subjects,
}

impl Registry {
    pub fn as_str(&self) -> &'static str {
        match self {
            Registry::Languages => "language",
            Registry::Projects => "project",
            Registry::Customers => "customer",
            Registry::Subjects => "subject",
        }
    }

    /// Unit property that feeds this registry, if any.
    pub fn property(&self) -> Option<&'static str> {
        match self {
            Registry::Languages => None,
            Registry::Projects => Some(PROJECT),
            Registry::Customers => Some(CUSTOMER),
            Registry::Subjects => Some(SUBJECT),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attributes_and_extensions_partition_properties() {
        let mut props = Properties::new();
        props.insert("tuid".into(), "1".into());
        props.insert("creationdate".into(), "20240101T000000Z".into());
        props.insert("x-note".into(), "hello".into());
        let tu = TranslationUnit::new("1", props);

        let attrs: Vec<_> = tu.attributes().map(|(k, _)| k.as_str()).collect();
        let exts: Vec<_> = tu.extension_properties().map(|(k, _)| k.as_str()).collect();
        assert_eq!(attrs, vec!["creationdate", "tuid"]);
        assert_eq!(exts, vec!["x-note"]);
    }

    #[test]
    fn record_deserializes_with_missing_fields() {
        let record: UnitRecord =
            serde_json::from_str(r#"{"variants":[{"lang":"en","markup":"Hi"}]}"#).unwrap();
        assert!(record.id.is_none());
        assert!(record.properties.is_empty());
        assert_eq!(record.variants.len(), 1);
    }
}
