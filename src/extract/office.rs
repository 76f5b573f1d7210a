//! DOCX / PPTX / XLSX readers.
//!
//! All three are zip containers of XML parts. Only the text runs are needed,
//! so the parts are scanned with a handful of regexes instead of a full XML
//! parser.

use super::{io_error, malformed};
use crate::error::ExtractionError;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use zip::ZipArchive;

type Archive = ZipArchive<File>;

// ── Patterns ─────────────────────────────────────────────────────────────

static DOCX_PARAGRAPH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<w:p[\s>].*?</w:p>").unwrap());

/// A text run, or a tab / line break inside a paragraph.
static DOCX_RUN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)<w:t(?:\s[^>]*)?>(.*?)</w:t>|<w:(tab|br|cr)\b[^>]*/>").unwrap()
});

static DRAWING_TEXT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<a:t(?:\s[^>]*)?>(.*?)</a:t>").unwrap());

static SLIDE_PART: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^ppt/slides/slide(\d+)\.xml$").unwrap());

static SHEET_PART: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^xl/worksheets/sheet(\d+)\.xml$").unwrap());

static SHARED_STRING: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<si>(.*?)</si>|<si/>").unwrap());

static SHEET_TEXT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<t(?:\s[^>]*)?>(.*?)</t>").unwrap());

static ROW: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<row\b[^>]*>(.*?)</row>").unwrap());

static CELL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<c\b([^>]*?)(?:/>|>(.*?)</c>)").unwrap());

static CELL_TYPE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"\bt="([^"]*)""#).unwrap());

static CELL_VALUE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<v>(.*?)</v>").unwrap());

static ENTITY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"&(#x[0-9a-fA-F]+|#[0-9]+|[a-zA-Z]+);").unwrap());

// ── Readers ──────────────────────────────────────────────────────────────

/// One line per paragraph; empty paragraphs become blank lines.
pub(super) fn docx_text(path: &Path) -> Result<String, ExtractionError> {
    let mut archive = open(path)?;
    let xml = read_part(&mut archive, path, "word/document.xml")?;

    let paragraphs: Vec<String> = DOCX_PARAGRAPH
        .find_iter(&xml)
        .map(|p| {
            DOCX_RUN
                .captures_iter(p.as_str())
                .map(|c| match (c.get(1), c.get(2).map(|m| m.as_str())) {
                    (Some(text), _) => decode_entities(text.as_str()),
                    (None, Some("tab")) => "\t".to_string(),
                    _ => "\n".to_string(),
                })
                .collect()
        })
        .collect();
    Ok(paragraphs.join("\n"))
}

/// Slides in numeric order, runs joined by a space, slides by a blank line.
pub(super) fn pptx_text(path: &Path) -> Result<String, ExtractionError> {
    let mut archive = open(path)?;
    let slides = numbered_parts(&archive, &SLIDE_PART);

    let mut blocks = Vec::with_capacity(slides.len());
    for name in slides {
        let xml = read_part(&mut archive, path, &name)?;
        let runs: Vec<String> = DRAWING_TEXT
            .captures_iter(&xml)
            .map(|c| decode_entities(&c[1]))
            .filter(|t| !t.trim().is_empty())
            .collect();
        if !runs.is_empty() {
            blocks.push(runs.join(" "));
        }
    }
    Ok(blocks.join("\n\n"))
}

/// Cells joined by a space, rows by a newline, sheets by a blank line.
pub(super) fn xlsx_text(path: &Path) -> Result<String, ExtractionError> {
    let mut archive = open(path)?;
    let has_shared = archive.file_names().any(|n| n == "xl/sharedStrings.xml");
    let shared = if has_shared {
        shared_strings(&read_part(&mut archive, path, "xl/sharedStrings.xml")?)
    } else {
        Vec::new()
    };
    let sheets = numbered_parts(&archive, &SHEET_PART);

    let mut blocks = Vec::with_capacity(sheets.len());
    for name in sheets {
        let xml = read_part(&mut archive, path, &name)?;
        let rows: Vec<String> = ROW
            .captures_iter(&xml)
            .map(|row| {
                CELL.captures_iter(&row[1])
                    .filter_map(|cell| cell_text(&cell, &shared))
                    .collect::<Vec<_>>()
                    .join(" ")
            })
            .filter(|line| !line.is_empty())
            .collect();
        if !rows.is_empty() {
            blocks.push(rows.join("\n"));
        }
    }
    Ok(blocks.join("\n\n"))
}

// ── Helpers ──────────────────────────────────────────────────────────────

fn open(path: &Path) -> Result<Archive, ExtractionError> {
    let file = File::open(path).map_err(|e| io_error(path, e))?;
    ZipArchive::new(file).map_err(|e| malformed(path, format!("not a valid archive: {e}")))
}

fn read_part(archive: &mut Archive, path: &Path, name: &str) -> Result<String, ExtractionError> {
    let mut part = archive
        .by_name(name)
        .map_err(|e| malformed(path, format!("missing part '{name}': {e}")))?;
    let mut xml = String::new();
    part.read_to_string(&mut xml)
        .map_err(|e| malformed(path, format!("unreadable part '{name}': {e}")))?;
    Ok(xml)
}

/// Part names matching `pattern`, ordered by their captured number.
fn numbered_parts(archive: &Archive, pattern: &Regex) -> Vec<String> {
    let mut parts: Vec<(u32, String)> = archive
        .file_names()
        .filter_map(|name| {
            let n = pattern.captures(name)?.get(1)?.as_str().parse().ok()?;
            Some((n, name.to_string()))
        })
        .collect();
    parts.sort();
    parts.into_iter().map(|(_, name)| name).collect()
}

fn shared_strings(xml: &str) -> Vec<String> {
    SHARED_STRING
        .captures_iter(xml)
        .map(|si| match si.get(1) {
            Some(body) => SHEET_TEXT
                .captures_iter(body.as_str())
                .map(|t| decode_entities(&t[1]))
                .collect(),
            None => String::new(),
        })
        .collect()
}

fn cell_text(cell: &Captures<'_>, shared: &[String]) -> Option<String> {
    let attrs = cell.get(1).map_or("", |m| m.as_str());
    let body = cell.get(2)?.as_str();
    let kind = CELL_TYPE
        .captures(attrs)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str());

    let text = match kind {
        Some("s") => {
            let index: usize = CELL_VALUE.captures(body)?[1].trim().parse().ok()?;
            shared.get(index)?.clone()
        }
        Some("inlineStr") => SHEET_TEXT
            .captures_iter(body)
            .map(|t| decode_entities(&t[1]))
            .collect(),
        _ => decode_entities(&CELL_VALUE.captures(body)?[1]),
    };
    (!text.is_empty()).then_some(text)
}

/// Decode the predefined XML entities and numeric character references.
fn decode_entities(s: &str) -> String {
    if !s.contains('&') {
        return s.to_string();
    }
    ENTITY
        .replace_all(s, |c: &Captures<'_>| {
            let entity = &c[1];
            let decoded = match entity {
                "lt" => Some('<'),
                "gt" => Some('>'),
                "amp" => Some('&'),
                "quot" => Some('"'),
                "apos" => Some('\''),
                _ => entity
                    .strip_prefix("#x")
                    .or_else(|| entity.strip_prefix("#X"))
                    .and_then(|hex| u32::from_str_radix(hex, 16).ok())
                    .or_else(|| entity.strip_prefix('#').and_then(|d| d.parse().ok()))
                    .and_then(char::from_u32),
            };
            decoded.map_or_else(|| c[0].to_string(), String::from)
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;
    use zip::write::SimpleFileOptions;
    use zip::ZipWriter;

    fn archive(suffix: &str, parts: &[(&str, &str)]) -> NamedTempFile {
        let file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
        let mut zip = ZipWriter::new(file.reopen().unwrap());
        for (name, body) in parts {
            zip.start_file(*name, SimpleFileOptions::default()).unwrap();
            zip.write_all(body.as_bytes()).unwrap();
        }
        zip.finish().unwrap();
        file
    }

    #[test]
    fn entities_are_decoded_once() {
        assert_eq!(decode_entities("a &lt;b&gt; &amp;amp; &#233;&#x41;"), "a <b> &amp; \u{e9}A");
        assert_eq!(decode_entities("&bogus;"), "&bogus;");
        assert_eq!(decode_entities("plain"), "plain");
    }

    #[test]
    fn docx_paragraphs_become_lines() {
        let xml = r#"<w:document><w:body>
            <w:p><w:pPr><w:pStyle w:val="Title"/></w:pPr><w:r><w:t>Cell</w:t></w:r><w:r><w:t xml:space="preserve"> Biology</w:t></w:r></w:p>
            <w:p/>
            <w:p></w:p>
            <w:p><w:r><w:t>A</w:t><w:tab/><w:t>B &amp; C</w:t></w:r></w:p>
        </w:body></w:document>"#;
        let file = archive(".docx", &[("word/document.xml", xml)]);
        assert_eq!(docx_text(file.path()).unwrap(), "Cell Biology\n\nA\tB & C");
    }

    #[test]
    fn pptx_slides_in_numeric_order() {
        let slide = |t: &str| format!("<p:sld><a:p><a:r><a:t>{t}</a:t></a:r><a:r><a:t>end</a:t></a:r></a:p></p:sld>");
        let (s1, s2, s10) = (slide("one"), slide("two"), slide("ten"));
        let file = archive(
            ".pptx",
            &[
                ("ppt/slides/slide10.xml", s10.as_str()),
                ("ppt/slides/slide2.xml", s2.as_str()),
                ("ppt/slides/slide1.xml", s1.as_str()),
                ("ppt/slides/_rels/slide1.xml.rels", "<Relationships/>"),
            ],
        );
        assert_eq!(
            pptx_text(file.path()).unwrap(),
            "one end\n\ntwo end\n\nten end"
        );
    }

    #[test]
    fn xlsx_resolves_shared_strings() {
        let shared = r#"<sst><si><t>Name</t></si><si><r><t>Ad</t></r><r><t>a</t></r></si></sst>"#;
        let sheet = r#"<worksheet><sheetData>
            <row r="1"><c r="A1" t="s"><v>0</v></c><c r="B1" t="inlineStr"><is><t>Score</t></is></c></row>
            <row r="2"><c r="A2" t="s"><v>1</v></c><c r="B2" s="1"><v>42</v></c><c r="C2"/></row>
        </sheetData></worksheet>"#;
        let file = archive(
            ".xlsx",
            &[
                ("xl/sharedStrings.xml", shared),
                ("xl/worksheets/sheet1.xml", sheet),
                ("xl/worksheets/sheet2.xml", "<worksheet><sheetData><row><c><v>7</v></c></row></sheetData></worksheet>"),
            ],
        );
        assert_eq!(xlsx_text(file.path()).unwrap(), "Name Score\nAda 42\n\n7");
    }

    #[test]
    fn docx_without_body_is_malformed() {
        let file = archive(".docx", &[("word/other.xml", "<x/>")]);
        assert!(matches!(
            docx_text(file.path()),
            Err(ExtractionError::Malformed { .. })
        ));
    }

    #[test]
    fn non_zip_is_malformed() {
        let mut file = tempfile::Builder::new().suffix(".xlsx").tempfile().unwrap();
        file.write_all(b"not a zip").unwrap();
        assert!(matches!(
            xlsx_text(file.path()),
            Err(ExtractionError::Malformed { .. })
        ));
    }
}
