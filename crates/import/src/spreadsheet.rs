use std::fmt::Display;
use std::io::Cursor;

use calamine::{Data, Range, Reader, Xls, Xlsx};
use chrono::{NaiveDateTime, NaiveTime};

use crate::grid::{is_blank_row, RawGrid};
use crate::parser::{FileKind, ParseError};

/// Decode a workbook into positional rows, skipping rows with no content.
pub(crate) fn read_workbook(data: &[u8], kind: FileKind, sheet: Option<&str>) -> Result<RawGrid, ParseError> {
    let range = match kind {
        FileKind::Xlsx => {
            let workbook = Xlsx::new(Cursor::new(data)).map_err(malformed)?;
            first_or_named_sheet(workbook, sheet)?
        }
        FileKind::Xls => {
            let workbook = Xls::new(Cursor::new(data)).map_err(malformed)?;
            first_or_named_sheet(workbook, sheet)?
        }
        FileKind::Xml => {
            return Err(ParseError::MalformedSpreadsheet("markup is not a workbook".to_string()))
        }
    };

    let total = range.height();
    let rows: Vec<Vec<String>> = range
        .rows()
        .map(|row| row.iter().map(cell_text).collect::<Vec<_>>())
        .filter(|row| !is_blank_row(row))
        .collect();

    if rows.len() < total {
        tracing::debug!(dropped = total - rows.len(), "skipped blank worksheet rows");
    }
    Ok(RawGrid::new(rows))
}

fn first_or_named_sheet<'a, R>(mut workbook: R, sheet: Option<&str>) -> Result<Range<Data>, ParseError>
where
    R: Reader<Cursor<&'a [u8]>>,
    R::Error: Display,
{
    match sheet {
        Some(name) => {
            if !workbook.sheet_names().iter().any(|s| s == name) {
                return Err(ParseError::SheetNotFound(name.to_string()));
            }
            workbook.worksheet_range(name).map_err(malformed)
        }
        None => match workbook.worksheet_range_at(0) {
            Some(range) => range.map_err(malformed),
            // A workbook without sheets has no rows to offer.
            None => Ok(Range::empty()),
        },
    }
}

fn malformed(err: impl Display) -> ParseError {
    ParseError::MalformedSpreadsheet(err.to_string())
}

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty | Data::Error(_) => String::new(),
        Data::String(s) => s.clone(),
        Data::Int(i) => i.to_string(),
        Data::Float(f) => f.to_string(),
        Data::Bool(b) => b.to_string(),
        Data::DateTime(dt) if dt.is_duration() => dt.as_f64().to_string(),
        // The workbook's date system (1900 or 1904) travels with the cell.
        Data::DateTime(dt) => match dt.as_datetime() {
            Some(value) => iso_date(value),
            None => dt.as_f64().to_string(),
        },
        Data::DateTimeIso(s) | Data::DurationIso(s) => s.clone(),
    }
}

/// `YYYY-MM-DD`, with `THH:MM:SS` only when there is a time part.
fn iso_date(value: NaiveDateTime) -> String {
    if value.time() == NaiveTime::MIN {
        value.format("%Y-%m-%d").to_string()
    } else {
        value.format("%Y-%m-%dT%H:%M:%S").to_string()
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use std::io::{Cursor, Write};

    use zip::write::SimpleFileOptions;
    use zip::{CompressionMethod, ZipWriter};

    fn escape(s: &str) -> String {
        s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
    }

    fn column_letter(idx: usize) -> char {
        (b'A' + idx as u8) as char
    }

    /// Build a minimal single-sheet `.xlsx` in memory. Cells that parse as numbers are
    /// written as numeric cells, everything else as inline strings; empty cells are omitted.
    pub fn xlsx(sheet_name: &str, rows: &[&[&str]]) -> Vec<u8> {
        build(sheet_name, rows, None)
    }

    /// Like [`xlsx`], but numbers in the first column carry the built-in date format.
    /// `date1904` switches the workbook to the 1904 date system.
    pub fn dated_xlsx(rows: &[&[&str]], date1904: bool) -> Vec<u8> {
        build("Sheet1", rows, Some(date1904))
    }

    fn build(sheet_name: &str, rows: &[&[&str]], dates: Option<bool>) -> Vec<u8> {
        let mut sheet = String::from(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><sheetData>"#,
        );
        for (r, row) in rows.iter().enumerate() {
            sheet.push_str(&format!(r#"<row r="{}">"#, r + 1));
            for (c, value) in row.iter().enumerate() {
                if value.is_empty() {
                    continue;
                }
                let reference = format!("{}{}", column_letter(c), r + 1);
                if value.parse::<f64>().is_ok() {
                    let style = if c == 0 && dates.is_some() { r#" s="1""# } else { "" };
                    sheet.push_str(&format!(r#"<c r="{reference}"{style}><v>{value}</v></c>"#));
                } else {
                    sheet.push_str(&format!(
                        r#"<c r="{reference}" t="inlineStr"><is><t>{}</t></is></c>"#,
                        escape(value)
                    ));
                }
            }
            sheet.push_str("</row>");
        }
        sheet.push_str("</sheetData></worksheet>");

        let workbook_pr = match dates {
            Some(true) => r#"<workbookPr date1904="1"/>"#,
            _ => "",
        };

        let mut parts: Vec<(&str, String)> = vec![
            (
                "[Content_Types].xml",
                r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/><Override PartName="/xl/worksheets/sheet1.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/></Types>"#
                    .to_string(),
            ),
            (
                "_rels/.rels",
                r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/></Relationships>"#
                    .to_string(),
            ),
            (
                "xl/workbook.xml",
                format!(
                    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">{workbook_pr}<sheets><sheet name="{}" sheetId="1" r:id="rId1"/></sheets></workbook>"#,
                    escape(sheet_name)
                ),
            ),
            (
                "xl/_rels/workbook.xml.rels",
                r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/></Relationships>"#
                    .to_string(),
            ),
            ("xl/worksheets/sheet1.xml", sheet),
        ];
        if dates.is_some() {
            // Style 1 is numFmtId 14, the locale short date.
            parts.push((
                "xl/styles.xml",
                r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<styleSheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><cellXfs count="2"><xf numFmtId="0"/><xf numFmtId="14" applyNumberFormat="1"/></cellXfs></styleSheet>"#
                    .to_string(),
            ));
        }

        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
        for (name, body) in parts {
            zip.start_file(name, options).unwrap();
            zip.write_all(body.as_bytes()).unwrap();
        }
        zip.finish().unwrap().into_inner()
    }
}
