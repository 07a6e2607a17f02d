//! HTML parser: strips markup to plain text and collects `<img src>`
//! references.

use scraper::{Html, Selector};

use crate::error::{CoreError, Result};
use crate::types::{ParsedDocument, ParsedImage};

pub fn parse(data: &[u8]) -> Result<ParsedDocument> {
    let html = String::from_utf8(data.to_vec()).map_err(|e| CoreError::Parse(format!("invalid UTF-8: {e}")))?;
    let document = Html::parse_document(&html);

    let body_selector = Selector::parse("body").unwrap();
    let text = if let Some(body) = document.select(&body_selector).next() {
        body.text().collect::<Vec<_>>().join(" ")
    } else {
        document.root_element().text().collect::<Vec<_>>().join(" ")
    };
    let text = normalize_whitespace(&text);

    let img_selector = Selector::parse("img").unwrap();
    let images: Vec<ParsedImage> = document
        .select(&img_selector)
        .filter_map(|el| {
            let src = el.value().attr("src")?;
            let alt = el.value().attr("alt").unwrap_or("").to_string();
            Some(ParsedImage { data: Vec::new(), alt: if alt.is_empty() { src.to_string() } else { alt } })
        })
        .collect();

    Ok(ParsedDocument { text, images })
}

/// Extracts the `<title>` element's text, if present.
pub fn extract_title(data: &[u8]) -> Option<String> {
    let html = String::from_utf8_lossy(data);
    let document = Html::parse_document(&html);
    let title_selector = Selector::parse("title").ok()?;
    let title = document.select(&title_selector).next()?.text().collect::<String>();
    let trimmed = title.trim();
    if trimmed.is_empty() { None } else { Some(trimmed.to_string()) }
}

fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
