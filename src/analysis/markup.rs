use quick_xml::events::Event;
use quick_xml::Reader;
use crate::core::error::{Error, ErrorKind, Result};

/// Inline elements whose content belongs to the plain text.
pub const TEXT_ELEMENTS: [&[u8]; 2] = [b"sub", b"hi"];

fn is_text_element(name: &[u8]) -> bool {
    TEXT_ELEMENTS.iter().any(|element| *element == name)
}

/// Plain text of a segment's raw markup.
///
/// Character data is kept at the top level and inside the elements listed
/// in [`TEXT_ELEMENTS`]; any other inline element is dropped together with
/// everything it contains.
pub fn extract_text(markup: &str) -> Result<String> {
    let wrapped = format!("<seg>{}</seg>", markup);
    let mut reader = Reader::from_str(&wrapped);

    let mut text = String::new();
    let mut depth = 0usize;
    let mut skip_depth = 0usize;

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                depth += 1;
                if skip_depth > 0 {
                    skip_depth += 1;
                } else if depth > 1 && !is_text_element(e.name().as_ref()) {
                    skip_depth = 1;
                }
            }
            Event::End(_) => {
                depth = depth.saturating_sub(1);
                skip_depth = skip_depth.saturating_sub(1);
            }
            Event::Text(e) if skip_depth == 0 => {
                text.push_str(&e.unescape()?);
            }
            Event::CData(e) if skip_depth == 0 => {
                let data = e.into_inner();
                let data = std::str::from_utf8(&data)
                    .map_err(|e| Error::new(ErrorKind::Parse, format!("Invalid UTF-8 in CDATA: {}", e)))?;
                text.push_str(data);
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if depth != 0 {
        return Err(Error::new(ErrorKind::Parse, "Malformed segment markup: unclosed element"));
    }
    Ok(text)
}
