//! Parsers dispatched by format tag, each a thin adapter producing
//! `{text, images[]}`. Treated as opaque by the Document Manager beyond
//! this contract; a parser failure surfaces as `ParseFailure` and never
//! panics across the boundary.

mod html;
mod markdown;
mod office;
mod pdf;

use crate::error::{CoreError, Result};
use crate::types::{DocType, ParsedDocument};

/// Parses raw file bytes according to `doc_type`. `url` is not handled here
/// — URL content is produced by the URL fetcher's own HTML-sniffing path.
pub fn parse(doc_type: DocType, data: &[u8]) -> Result<ParsedDocument> {
    match doc_type {
        DocType::Markdown => markdown::parse(data),
        DocType::Html => html::parse(data),
        DocType::Pdf => pdf::parse(data),
        DocType::Word => office::parse_word(data),
        DocType::Excel => office::parse_excel(data),
        DocType::Ppt => office::parse_ppt(data),
        DocType::Url => Err(CoreError::Validation("url is not a parser format".to_string())),
        other if other.is_video() => Err(CoreError::Validation("video types are handled by the video pipeline".to_string())),
        _ => unreachable!(),
    }
}
