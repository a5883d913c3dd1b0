use std::collections::BTreeSet;
use std::io::Write;
use serde::{Deserialize, Serialize};
use crate::core::error::Result;
use crate::core::types::{Properties, TranslationUnit, UnitRecord, VariantRecord};
use crate::core::utils::tmx_date;

/// What to export and how to label it.
#[derive(Debug, Clone, Default)]
pub struct ExportOptions {
    /// Variant languages to keep; `None` keeps every language.
    pub languages: Option<BTreeSet<String>>,
    pub src_lang: String,
    pub properties: Properties,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportHeader {
    pub creation_tool: String,
    pub creation_tool_version: String,
    pub src_lang: String,
    pub creation_date: String,
    #[serde(default)]
    pub properties: Properties,
}

impl ExportHeader {
    pub fn new(src_lang: impl Into<String>, properties: Properties) -> Self {
        ExportHeader {
            creation_tool: env!("CARGO_PKG_NAME").to_string(),
            creation_tool_version: env!("CARGO_PKG_VERSION").to_string(),
            src_lang: src_lang.into(),
            creation_date: tmx_date(),
            properties,
        }
    }
}

/// Destination of an export.
pub trait UnitSink {
    fn begin(&mut self, _header: &ExportHeader) -> Result<()> {
        Ok(())
    }

    fn write_unit(&mut self, unit: &TranslationUnit) -> Result<()>;

    fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}

impl UnitSink for Vec<TranslationUnit> {
    fn write_unit(&mut self, unit: &TranslationUnit) -> Result<()> {
        self.push(unit.clone());
        Ok(())
    }
}

impl From<&TranslationUnit> for UnitRecord {
    fn from(unit: &TranslationUnit) -> Self {
        UnitRecord {
            id: Some(unit.id.clone()),
            properties: unit.properties.clone(),
            variants: unit
                .variants
                .values()
                .map(|variant| VariantRecord {
                    lang: variant.lang.clone(),
                    markup: variant.markup.clone(),
                })
                .collect(),
        }
    }
}

#[derive(Serialize)]
struct HeaderLine<'a> {
    header: &'a ExportHeader,
}

/// Writes the header, then one unit record per line. The output can be
/// read back with [`JsonLinesSource`](crate::transfer::import::JsonLinesSource).
pub struct JsonLinesSink<W: Write> {
    writer: W,
}

impl<W: Write> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        JsonLinesSink { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    fn write_line<T: Serialize>(&mut self, value: &T) -> Result<()> {
        serde_json::to_writer(&mut self.writer, value)?;
        self.writer.write_all(b"\n")?;
        Ok(())
    }
}

impl<W: Write> UnitSink for JsonLinesSink<W> {
    fn begin(&mut self, header: &ExportHeader) -> Result<()> {
        self.write_line(&HeaderLine { header })
    }

    fn write_unit(&mut self, unit: &TranslationUnit) -> Result<()> {
        self.write_line(&UnitRecord::from(unit))
    }

    fn finish(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}
