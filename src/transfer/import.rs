use std::io::{BufRead, Lines};
use serde_json::Value;
use crate::core::error::{Error, ErrorKind, Result};
use crate::core::types::UnitRecord;

/// Unit-level values an import writes onto every unit it stores.
/// Empty values leave the incoming properties alone.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportOptions {
    pub project: Option<String>,
    pub customer: Option<String>,
    pub subject: Option<String>,
}

impl ImportOptions {
    pub fn with_project(mut self, project: impl Into<String>) -> Self {
        self.project = Some(project.into());
        self
    }

    pub fn with_customer(mut self, customer: impl Into<String>) -> Self {
        self.customer = Some(customer.into());
        self
    }

    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }
}

/// Reads one JSON unit record per line. Blank lines and the header line
/// written by an export are skipped.
pub struct JsonLinesSource<R> {
    lines: Lines<R>,
    line_no: usize,
}

impl<R: BufRead> JsonLinesSource<R> {
    pub fn new(reader: R) -> Self {
        JsonLinesSource {
            lines: reader.lines(),
            line_no: 0,
        }
    }

    fn parse(&self, line: &str) -> Result<Option<UnitRecord>> {
        let value: Value = serde_json::from_str(line).map_err(|e| self.error(e))?;
        if value.get("header").is_some() {
            return Ok(None);
        }
        let record = serde_json::from_value(value).map_err(|e| self.error(e))?;
        Ok(Some(record))
    }

    fn error(&self, err: serde_json::Error) -> Error {
        Error::new(ErrorKind::Parse, format!("line {}: {}", self.line_no, err))
    }
}

impl<R: BufRead> Iterator for JsonLinesSource<R> {
    type Item = Result<UnitRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let line = match self.lines.next()? {
                Ok(line) => line,
                Err(err) => return Some(Err(err.into())),
            };
            self.line_no += 1;
            if line.trim().is_empty() {
                continue;
            }
            match self.parse(&line) {
                Ok(Some(record)) => return Some(Ok(record)),
                Ok(None) => continue,
                Err(err) => return Some(Err(err)),
            }
        }
    }
}
