//! Office document parsers: Word via `docx-rs`, Excel via `calamine`, and a
//! best-effort PowerPoint reader that walks the slide XML parts directly —
//! pptx has no dedicated reader in this stack, but it is itself a zip
//! archive of XML parts, so the slide text is reachable with `zip` +
//! `quick-xml` alone.

use std::io::Read as _;

use quick_xml::events::Event as XmlEvent;
use quick_xml::reader::Reader as XmlReader;

use crate::error::{CoreError, Result};
use crate::types::ParsedDocument;

pub fn parse_word(data: &[u8]) -> Result<ParsedDocument> {
    let doc = docx_rs::read_docx(data).map_err(|e| CoreError::Parse(format!("failed to read docx: {e:?}")))?;
    let json = serde_json::to_value(&doc.document).map_err(|e| CoreError::Parse(format!("failed to inspect docx structure: {e}")))?;

    let mut text = String::new();
    collect_docx_text(&json, &mut text);

    Ok(ParsedDocument { text: text.trim().to_string(), images: Vec::new() })
}

/// `docx-rs` exposes its paragraph tree as nested enums without a single
/// plain-text accessor, so we walk the serialized JSON looking for `"text"`
/// leaf fields — every run's text content surfaces under that key.
fn collect_docx_text(value: &serde_json::Value, out: &mut String) {
    match value {
        serde_json::Value::Object(map) => {
            if let Some(serde_json::Value::String(s)) = map.get("text") {
                out.push_str(s);
            }
            for (key, v) in map {
                if key == "text" {
                    continue;
                }
                collect_docx_text(v, out);
            }
            if map.contains_key("runs") || map.contains_key("children") {
                out.push('\n');
            }
        }
        serde_json::Value::Array(items) => {
            for item in items {
                collect_docx_text(item, out);
            }
        }
        _ => {}
    }
}

pub fn parse_excel(data: &[u8]) -> Result<ParsedDocument> {
    use calamine::Reader;

    let cursor = std::io::Cursor::new(data);
    let mut workbook: calamine::Xlsx<_> = calamine::Xlsx::new(cursor).map_err(|e| CoreError::Parse(format!("failed to open spreadsheet: {e}")))?;

    let mut text = String::new();
    let sheet_names = workbook.sheet_names().to_vec();
    for name in &sheet_names {
        let range = match workbook.worksheet_range(name) {
            Ok(range) => range,
            Err(e) => {
                tracing::warn!(sheet = %name, error = %e, "failed to read worksheet, skipping");
                continue;
            }
        };
        if !text.is_empty() {
            text.push_str("\n\n");
        }
        text.push_str(name);
        text.push('\n');
        for row in range.rows() {
            let cells: Vec<String> = row.iter().map(|cell| cell.to_string()).collect();
            text.push_str(&cells.join("\t"));
            text.push('\n');
        }
    }

    Ok(ParsedDocument { text, images: Vec::new() })
}

pub fn parse_ppt(data: &[u8]) -> Result<ParsedDocument> {
    let reader = std::io::Cursor::new(data);
    let mut archive = zip::ZipArchive::new(reader).map_err(|e| CoreError::Parse(format!("failed to open pptx archive: {e}")))?;

    let mut slide_indices: Vec<usize> = Vec::new();
    for i in 0..archive.len() {
        let name = archive.by_index(i).map_err(|e| CoreError::Parse(format!("failed to read archive entry: {e}")))?.name().to_string();
        if name.starts_with("ppt/slides/slide") && name.ends_with(".xml") {
            slide_indices.push(i);
        }
    }

    if slide_indices.is_empty() {
        return Err(CoreError::Parse("pptx archive has no slide parts".to_string()));
    }

    // Slide file names don't sort lexically in presentation order past
    // slide9 -> slide10, so sort by the numeric suffix instead.
    slide_indices.sort_by_key(|&i| {
        let name = archive.by_index(i).map(|f| f.name().to_string()).unwrap_or_default();
        slide_number(&name)
    });

    let mut text = String::new();
    for idx in slide_indices {
        let mut file = match archive.by_index(idx) {
            Ok(f) => f,
            Err(e) => {
                tracing::warn!(error = %e, "failed to open slide part, skipping");
                continue;
            }
        };
        let mut xml = String::new();
        if file.read_to_string(&mut xml).is_err() {
            tracing::warn!(slide = idx, "failed to read slide XML, skipping");
            continue;
        }
        let slide_text = extract_slide_text(&xml);
        if !slide_text.is_empty() {
            if !text.is_empty() {
                text.push_str("\n\n");
            }
            text.push_str(&slide_text);
        }
    }

    Ok(ParsedDocument { text, images: Vec::new() })
}

fn slide_number(name: &str) -> u32 {
    name.trim_start_matches("ppt/slides/slide").trim_end_matches(".xml").parse().unwrap_or(u32::MAX)
}

/// Pulls the text runs out of a slide's XML: every `<a:t>` element in the
/// DrawingML text body namespace.
fn extract_slide_text(xml: &str) -> String {
    let mut reader = XmlReader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut out = String::new();
    let mut in_run_text = false;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(XmlEvent::Start(e)) if e.local_name().as_ref() == b"t" => {
                in_run_text = true;
            }
            Ok(XmlEvent::End(e)) if e.local_name().as_ref() == b"t" => {
                in_run_text = false;
            }
            Ok(XmlEvent::Text(t)) if in_run_text => {
                if let Ok(unescaped) = t.unescape() {
                    if !out.is_empty() {
                        out.push(' ');
                    }
                    out.push_str(&unescaped);
                }
            }
            Ok(XmlEvent::Eof) => break,
            Err(_) => break,
            _ => {}
        }
        buf.clear();
    }

    out
}
