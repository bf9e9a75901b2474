//! Spreadsheet print-layout normalization
//!
//! Before conversion, every sheet in the uploaded workbook is rewritten to
//! "fit width to one page, unlimited pages of height" so the engine never
//! clips content horizontally. An xlsx file is a zip archive of XML parts;
//! only the `xl/worksheets/*.xml` parts are touched, everything else is
//! copied through raw. The file is rewritten in place, so downstream stages
//! read the normalized bytes.
//!
//! In OOXML terms the target state per sheet is:
//! `<sheetPr><pageSetUpPr fitToPage="1"/></sheetPr>` plus
//! `<pageSetup fitToWidth="1" fitToHeight="0"/>` (0 = no height constraint;
//! width governs pagination). Existing elements are rewritten with their
//! other attributes preserved; missing ones are inserted at schema-valid
//! positions. The transform is idempotent.

use std::io::{Cursor, Read, Write};
use std::path::Path;

use quick_xml::events::{BytesEnd, BytesStart, Event};
use quick_xml::{Reader, Writer};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

#[derive(Debug, thiserror::Error)]
pub enum NormalizeError {
    #[error("not a valid workbook archive: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("malformed worksheet XML: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("workbook contains no worksheets")]
    NoWorksheets,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Rewrite the workbook at `path` so every sheet fits its width to one page.
/// Overwrites the file; callers must read the normalized bytes afterwards,
/// not the original upload.
pub fn normalize_print_layout(path: &Path) -> Result<(), NormalizeError> {
    let bytes = std::fs::read(path)?;
    let rewritten = rewrite_workbook(&bytes)?;
    std::fs::write(path, rewritten)?;
    Ok(())
}

fn is_worksheet_entry(name: &str) -> bool {
    name.starts_with("xl/worksheets/") && name.ends_with(".xml") && !name.contains("_rels")
}

fn rewrite_workbook(bytes: &[u8]) -> Result<Vec<u8>, NormalizeError> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))?;
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    let mut worksheets = 0usize;

    for index in 0..archive.len() {
        let rewrite = {
            let entry = archive.by_index_raw(index)?;
            is_worksheet_entry(entry.name())
        };

        if rewrite {
            let mut entry = archive.by_index(index)?;
            let name = entry.name().to_string();
            let mut xml = Vec::with_capacity(entry.size() as usize);
            entry.read_to_end(&mut xml)?;
            drop(entry);

            let fitted = rewrite_sheet_xml(&xml)?;
            writer.start_file(name, options)?;
            writer.write_all(&fitted)?;
            worksheets += 1;
        } else {
            let entry = archive.by_index_raw(index)?;
            writer.raw_copy_file(entry)?;
        }
    }

    if worksheets == 0 {
        return Err(NormalizeError::NoWorksheets);
    }

    Ok(writer.finish()?.into_inner())
}

/// What the sheet already declares, gathered in a first pass so the second
/// pass knows what to rewrite and what to insert.
#[derive(Default)]
struct SheetLayout {
    has_sheet_pr: bool,
    has_page_setup_pr: bool,
    has_page_setup: bool,
    has_page_margins: bool,
}

fn scan_sheet(xml: &[u8]) -> Result<SheetLayout, NormalizeError> {
    let mut reader = Reader::from_reader(xml);
    let mut buf = Vec::new();
    let mut layout = SheetLayout::default();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) | Event::Empty(e) => match e.local_name().as_ref() {
                b"sheetPr" => layout.has_sheet_pr = true,
                b"pageSetUpPr" => layout.has_page_setup_pr = true,
                b"pageSetup" => layout.has_page_setup = true,
                b"pageMargins" => layout.has_page_margins = true,
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(layout)
}

fn rewrite_sheet_xml(xml: &[u8]) -> Result<Vec<u8>, NormalizeError> {
    let layout = scan_sheet(xml)?;

    let mut reader = Reader::from_reader(xml);
    let mut writer = Writer::new(Cursor::new(Vec::new()));
    let mut buf = Vec::new();
    let mut page_setup_written = layout.has_page_setup;

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"worksheet" => {
                    writer.write_event(Event::Start(e))?;
                    // sheetPr must be the first child of worksheet.
                    if !layout.has_sheet_pr {
                        writer.write_event(Event::Start(BytesStart::new("sheetPr")))?;
                        writer.write_event(Event::Empty(page_setup_pr_elem()))?;
                        writer.write_event(Event::End(BytesEnd::new("sheetPr")))?;
                    }
                }
                b"sheetPr" => {
                    writer.write_event(Event::Start(e))?;
                    if !layout.has_page_setup_pr {
                        writer.write_event(Event::Empty(page_setup_pr_elem()))?;
                    }
                }
                b"pageSetUpPr" => {
                    let fitted = with_attributes(&e, &[("fitToPage", "1")])?;
                    writer.write_event(Event::Start(fitted))?;
                }
                b"pageSetup" => {
                    let fitted =
                        with_attributes(&e, &[("fitToWidth", "1"), ("fitToHeight", "0")])?;
                    writer.write_event(Event::Start(fitted))?;
                }
                _ => writer.write_event(Event::Start(e))?,
            },
            Event::Empty(e) => match e.local_name().as_ref() {
                b"sheetPr" if !layout.has_page_setup_pr => {
                    // Expand the empty element so the flag can live inside it.
                    let end = owned_name(&e);
                    writer.write_event(Event::Start(e))?;
                    writer.write_event(Event::Empty(page_setup_pr_elem()))?;
                    writer.write_event(Event::End(BytesEnd::new(end)))?;
                }
                b"pageSetUpPr" => {
                    let fitted = with_attributes(&e, &[("fitToPage", "1")])?;
                    writer.write_event(Event::Empty(fitted))?;
                }
                b"pageSetup" => {
                    let fitted =
                        with_attributes(&e, &[("fitToWidth", "1"), ("fitToHeight", "0")])?;
                    writer.write_event(Event::Empty(fitted))?;
                }
                b"pageMargins" => {
                    writer.write_event(Event::Empty(e))?;
                    // Schema order: pageSetup directly follows pageMargins.
                    if !page_setup_written {
                        writer.write_event(Event::Empty(page_setup_elem()))?;
                        page_setup_written = true;
                    }
                }
                _ => writer.write_event(Event::Empty(e))?,
            },
            Event::End(e) => match e.local_name().as_ref() {
                b"pageMargins" => {
                    writer.write_event(Event::End(e))?;
                    if !page_setup_written {
                        writer.write_event(Event::Empty(page_setup_elem()))?;
                        page_setup_written = true;
                    }
                }
                b"worksheet" => {
                    // No pageMargins to anchor on; the sheet had no later
                    // print elements either, so closing position is valid.
                    if !page_setup_written {
                        writer.write_event(Event::Empty(page_setup_elem()))?;
                        page_setup_written = true;
                    }
                    writer.write_event(Event::End(e))?;
                }
                _ => writer.write_event(Event::End(e))?,
            },
            Event::Eof => break,
            other => writer.write_event(other)?,
        }
        buf.clear();
    }

    Ok(writer.into_inner().into_inner())
}

fn page_setup_pr_elem() -> BytesStart<'static> {
    let mut elem = BytesStart::new("pageSetUpPr");
    elem.push_attribute(("fitToPage", "1"));
    elem
}

fn page_setup_elem() -> BytesStart<'static> {
    let mut elem = BytesStart::new("pageSetup");
    elem.push_attribute(("fitToWidth", "1"));
    elem.push_attribute(("fitToHeight", "0"));
    elem
}

fn owned_name(e: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(e.name().as_ref()).into_owned()
}

/// Copy of `e` with the given attributes forced, all others preserved.
fn with_attributes(
    e: &BytesStart<'_>,
    forced: &[(&str, &str)],
) -> Result<BytesStart<'static>, NormalizeError> {
    let mut out = BytesStart::new(owned_name(e));

    for attr in e.attributes() {
        let attr = attr.map_err(quick_xml::Error::from)?;
        if !forced.iter().any(|(key, _)| key.as_bytes() == attr.key.as_ref()) {
            out.push_attribute(attr);
        }
    }
    for (key, value) in forced {
        out.push_attribute((*key, *value));
    }

    Ok(out)
}

/// Build a minimal but structurally valid xlsx for tests elsewhere in the
/// crate (pipeline and route tests stage real workbook bytes).
#[cfg(test)]
pub(crate) fn minimal_xlsx() -> Vec<u8> {
    let sheet = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><dimension ref="A1"/><sheetData><row r="1"><c r="A1"><v>1</v></c></row></sheetData><pageMargins left="0.7" right="0.7" top="0.75" bottom="0.75" header="0.3" footer="0.3"/></worksheet>"#;
    minimal_xlsx_with_sheet(sheet)
}

#[cfg(test)]
pub(crate) fn minimal_xlsx_with_sheet(sheet_xml: &str) -> Vec<u8> {
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));

    let parts: &[(&str, &str)] = &[
        (
            "[Content_Types].xml",
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/><Override PartName="/xl/worksheets/sheet1.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/></Types>"#,
        ),
        (
            "_rels/.rels",
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/></Relationships>"#,
        ),
        (
            "xl/workbook.xml",
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><sheets><sheet name="Sheet1" sheetId="1" r:id="rId1"/></sheets></workbook>"#,
        ),
        (
            "xl/_rels/workbook.xml.rels",
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/></Relationships>"#,
        ),
        ("xl/worksheets/sheet1.xml", sheet_xml),
    ];

    for (name, content) in parts {
        zip.start_file(*name, options).unwrap();
        zip.write_all(content.as_bytes()).unwrap();
    }

    zip.finish().unwrap().into_inner()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn rewrite(xml: &str) -> String {
        String::from_utf8(rewrite_sheet_xml(xml.as_bytes()).unwrap()).unwrap()
    }

    #[test]
    fn bare_sheet_gains_both_elements() {
        let out = rewrite(r#"<worksheet><sheetData/></worksheet>"#);
        assert!(out.contains(r#"<sheetPr><pageSetUpPr fitToPage="1"/></sheetPr>"#));
        assert!(out.contains(r#"<pageSetup fitToWidth="1" fitToHeight="0"/>"#));
        // sheetPr inserted as the first child
        assert!(out.starts_with(r#"<worksheet><sheetPr>"#));
    }

    #[test]
    fn page_setup_is_anchored_after_page_margins() {
        let out = rewrite(
            r#"<worksheet><sheetData/><pageMargins left="0.7" right="0.7" top="0.75" bottom="0.75" header="0.3" footer="0.3"/><headerFooter/></worksheet>"#,
        );
        let margins = out.find("<pageMargins").unwrap();
        let setup = out.find("<pageSetup").unwrap();
        let footer = out.find("<headerFooter").unwrap();
        assert!(margins < setup && setup < footer);
    }

    #[test]
    fn existing_page_setup_is_rewritten_and_other_attributes_survive() {
        let out = rewrite(
            r#"<worksheet><pageSetup orientation="landscape" fitToWidth="4" fitToHeight="7" paperSize="9"/></worksheet>"#,
        );
        assert!(out.contains(r#"orientation="landscape""#));
        assert!(out.contains(r#"paperSize="9""#));
        assert!(out.contains(r#"fitToWidth="1""#));
        assert!(out.contains(r#"fitToHeight="0""#));
        assert!(!out.contains(r#"fitToWidth="4""#));
    }

    #[test]
    fn existing_sheet_pr_keeps_its_attributes_and_children() {
        let out = rewrite(
            r#"<worksheet><sheetPr codeName="Sheet1"><tabColor rgb="FFFF0000"/></sheetPr></worksheet>"#,
        );
        assert!(out.contains(r#"codeName="Sheet1""#));
        assert!(out.contains("tabColor"));
        assert!(out.contains(r#"<pageSetUpPr fitToPage="1"/>"#));
    }

    #[test]
    fn empty_sheet_pr_is_expanded() {
        let out = rewrite(r#"<worksheet><sheetPr codeName="Hoja1"/></worksheet>"#);
        assert!(out
            .contains(r#"<sheetPr codeName="Hoja1"><pageSetUpPr fitToPage="1"/></sheetPr>"#));
    }

    #[test]
    fn existing_page_setup_pr_is_forced_on() {
        let out = rewrite(
            r#"<worksheet><sheetPr><pageSetUpPr fitToPage="0"/></sheetPr></worksheet>"#,
        );
        assert!(out.contains(r#"<pageSetUpPr fitToPage="1"/>"#));
        assert!(!out.contains(r#"fitToPage="0""#));
    }

    #[test]
    fn rewrite_is_idempotent() {
        let once = rewrite_sheet_xml(
            br#"<worksheet><sheetData/><pageMargins left="0.7" right="0.7" top="0.75" bottom="0.75" header="0.3" footer="0.3"/></worksheet>"#,
        )
        .unwrap();
        let twice = rewrite_sheet_xml(&once).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn whole_workbook_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("report.xlsx");
        std::fs::write(&path, minimal_xlsx()).unwrap();

        normalize_print_layout(&path).unwrap();

        let bytes = std::fs::read(&path).unwrap();
        let mut archive = ZipArchive::new(Cursor::new(&bytes[..])).unwrap();

        let mut sheet = String::new();
        archive
            .by_name("xl/worksheets/sheet1.xml")
            .unwrap()
            .read_to_string(&mut sheet)
            .unwrap();
        assert!(sheet.contains(r#"<pageSetUpPr fitToPage="1"/>"#));
        assert!(sheet.contains(r#"<pageSetup fitToWidth="1" fitToHeight="0"/>"#));

        // Untouched parts survive verbatim.
        let mut workbook = String::new();
        archive
            .by_name("xl/workbook.xml")
            .unwrap()
            .read_to_string(&mut workbook)
            .unwrap();
        assert!(workbook.contains("Sheet1"));
    }

    #[test]
    fn normalization_is_idempotent_at_the_file_level() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("report.xlsx");
        std::fs::write(&path, minimal_xlsx()).unwrap();

        normalize_print_layout(&path).unwrap();
        let once = std::fs::read(&path).unwrap();
        normalize_print_layout(&path).unwrap();
        let twice = std::fs::read(&path).unwrap();

        // Entry bytes must agree; archive metadata may differ, so compare parts.
        let sheet = |bytes: &[u8]| {
            let mut archive = ZipArchive::new(Cursor::new(bytes.to_vec())).unwrap();
            let mut out = String::new();
            archive
                .by_name("xl/worksheets/sheet1.xml")
                .unwrap()
                .read_to_string(&mut out)
                .unwrap();
            out
        };
        assert_eq!(sheet(&once), sheet(&twice));
    }

    #[test]
    fn garbage_is_rejected_as_invalid_archive() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("report.xlsx");
        std::fs::write(&path, b"this is not a zip file").unwrap();

        assert!(matches!(
            normalize_print_layout(&path),
            Err(NormalizeError::Archive(_))
        ));
    }

    #[test]
    fn zip_without_worksheets_is_rejected() {
        let options = SimpleFileOptions::default();
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        zip.start_file("hello.txt", options).unwrap();
        zip.write_all(b"hi").unwrap();
        let bytes = zip.finish().unwrap().into_inner();

        let dir = TempDir::new().unwrap();
        let path = dir.path().join("report.xlsx");
        std::fs::write(&path, bytes).unwrap();

        assert!(matches!(
            normalize_print_layout(&path),
            Err(NormalizeError::NoWorksheets)
        ));
    }
}
