//! Tolerant reader for XML exports.
//!
//! Banks and bookkeeping tools disagree on element names, so rows and cells are found by
//! trying an ordered list of strategies and keeping the first that yields anything.

use std::collections::HashMap;
use std::fmt::Display;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::grid::RawGrid;
use crate::parser::ParseError;

#[derive(Debug, Clone, Copy)]
enum RowStrategy {
    /// Every descendant with exactly this element name.
    Named(&'static str),
    /// Every direct child of the root element.
    RootChildren,
}

const ROW_STRATEGIES: [RowStrategy; 10] = [
    RowStrategy::Named("transaction"),
    RowStrategy::Named("Transaction"),
    RowStrategy::Named("TRANSACTION"),
    RowStrategy::Named("record"),
    RowStrategy::Named("Record"),
    RowStrategy::Named("RECORD"),
    RowStrategy::Named("row"),
    RowStrategy::Named("Row"),
    RowStrategy::Named("ROW"),
    RowStrategy::RootChildren,
];

#[derive(Debug, Clone, Copy)]
enum CellStrategy {
    Named(&'static str),
    /// Every direct child element; its tag name doubles as a column name.
    Children,
}

const CELL_STRATEGIES: [CellStrategy; 3] = [
    CellStrategy::Named("cell"),
    CellStrategy::Named("Cell"),
    CellStrategy::Children,
];

#[derive(Debug, Default)]
struct Element {
    name: String,
    nodes: Vec<Node>,
}

#[derive(Debug)]
enum Node {
    Element(Element),
    Text(String),
}

impl Element {
    fn new(start: &BytesStart<'_>) -> Self {
        Element {
            name: String::from_utf8_lossy(start.name().as_ref()).into_owned(),
            nodes: Vec::new(),
        }
    }

    fn children(&self) -> impl Iterator<Item = &Element> {
        self.nodes.iter().filter_map(|node| match node {
            Node::Element(e) => Some(e),
            Node::Text(_) => None,
        })
    }

    /// Descendants (not including `self`) named `name`, in document order.
    fn descendants_named<'a>(&'a self, name: &str, out: &mut Vec<&'a Element>) {
        for child in self.children() {
            if child.name == name {
                out.push(child);
            }
            child.descendants_named(name, out);
        }
    }

    fn text_content(&self) -> String {
        let mut text = String::new();
        self.collect_text(&mut text);
        text.trim().to_string()
    }

    fn collect_text(&self, out: &mut String) {
        for node in &self.nodes {
            match node {
                Node::Text(t) => out.push_str(t),
                Node::Element(e) => e.collect_text(out),
            }
        }
    }
}

/// Cells of one row, each paired with the tag name of the element it came from.
struct ExtractedRow {
    keyed: bool,
    cells: Vec<(String, String)>,
}

pub(crate) fn read_markup(data: &[u8]) -> Result<RawGrid, ParseError> {
    let root = parse_document(data)?;

    let Some((strategy, rows)) = ROW_STRATEGIES
        .iter()
        .map(|strategy| (strategy, find_rows(&root, *strategy)))
        .find(|(_, rows)| !rows.is_empty())
    else {
        tracing::debug!(root = %root.name, "markup holds no row elements");
        return Ok(RawGrid::default());
    };
    tracing::debug!(?strategy, rows = rows.len(), "discovered markup rows");

    let extracted: Vec<ExtractedRow> = rows.into_iter().map(extract_cells).collect();

    if extracted.iter().all(|row| row.keyed) {
        Ok(keyed_grid(extracted))
    } else {
        let rows = extracted
            .into_iter()
            .map(|row| row.cells.into_iter().map(|(_, text)| text).collect())
            .collect();
        Ok(RawGrid::new(rows))
    }
}

fn find_rows(root: &Element, strategy: RowStrategy) -> Vec<&Element> {
    match strategy {
        RowStrategy::Named(name) => {
            let mut found = Vec::new();
            root.descendants_named(name, &mut found);
            found
        }
        RowStrategy::RootChildren => root.children().collect(),
    }
}

fn extract_cells(row: &Element) -> ExtractedRow {
    for strategy in CELL_STRATEGIES {
        let found: Vec<&Element> = match strategy {
            CellStrategy::Named(name) => {
                let mut found = Vec::new();
                row.descendants_named(name, &mut found);
                found
            }
            CellStrategy::Children => row.children().collect(),
        };
        if !found.is_empty() {
            return ExtractedRow {
                keyed: matches!(strategy, CellStrategy::Children),
                cells: found.iter().map(|e| (e.name.clone(), e.text_content())).collect(),
            };
        }
    }
    ExtractedRow { keyed: true, cells: Vec::new() }
}

/// Align rows written as `<Date>..</Date><Income>..</Income>` by tag name, so a row that
/// omits or reorders a field still lines up with the others.
///
/// Columns appear in first-seen order; the n-th repeat of a tag inside one row goes to the
/// n-th column of that name.
fn keyed_grid(extracted: Vec<ExtractedRow>) -> RawGrid {
    let mut columns: Vec<String> = Vec::new();
    let mut placed: Vec<Vec<(usize, String)>> = Vec::with_capacity(extracted.len());

    for row in extracted {
        let mut seen: HashMap<String, usize> = HashMap::new();
        let mut cells = Vec::with_capacity(row.cells.len());
        for (name, text) in row.cells {
            let nth = seen.entry(name.clone()).or_insert(0);
            let existing = columns
                .iter()
                .enumerate()
                .filter(|(_, column)| **column == name)
                .nth(*nth)
                .map(|(idx, _)| idx);
            *nth += 1;
            let idx = match existing {
                Some(idx) => idx,
                None => {
                    columns.push(name);
                    columns.len() - 1
                }
            };
            cells.push((idx, text));
        }
        placed.push(cells);
    }

    let width = columns.len();
    let rows = placed
        .into_iter()
        .map(|cells| {
            let mut row = vec![String::new(); width];
            for (idx, text) in cells {
                row[idx] = text;
            }
            row
        })
        .collect();

    RawGrid {
        rows,
        element_names: (!columns.is_empty()).then_some(columns),
    }
}

fn malformed(reason: impl Display, position: u64) -> ParseError {
    ParseError::MalformedMarkup(format!("{reason} (at byte {position})"))
}

/// Build a small element tree, rejecting anything that is not a single well-formed document.
fn parse_document(data: &[u8]) -> Result<Element, ParseError> {
    let data = data.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(data);
    let text = std::str::from_utf8(data)
        .map_err(|e| ParseError::MalformedMarkup(format!("content is not valid UTF-8: {e}")))?;

    let mut reader = Reader::from_str(text);
    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;

    loop {
        let event = match reader.read_event() {
            Ok(event) => event,
            Err(err) => return Err(malformed(err, reader.error_position() as u64)),
        };
        let position = reader.buffer_position() as u64;

        match event {
            Event::Start(start) => {
                if stack.is_empty() && root.is_some() {
                    return Err(malformed("more than one root element", position));
                }
                stack.push(Element::new(&start));
            }
            Event::Empty(start) => attach(&mut stack, &mut root, Element::new(&start), position)?,
            Event::End(_) => {
                // quick-xml has already matched the closing name against the open one.
                let Some(element) = stack.pop() else {
                    return Err(malformed("closing tag without an open element", position));
                };
                attach(&mut stack, &mut root, element, position)?;
            }
            Event::Text(t) => {
                let text = t.unescape().map_err(|e| malformed(e, position))?;
                push_text(&mut stack, text.into_owned(), position)?;
            }
            Event::CData(c) => {
                push_text(&mut stack, String::from_utf8_lossy(&c).into_owned(), position)?;
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if let Some(open) = stack.last() {
        return Err(malformed(format!("unclosed element <{}>", open.name), reader.buffer_position() as u64));
    }
    root.ok_or_else(|| malformed("no root element", reader.buffer_position() as u64))
}

fn attach(
    stack: &mut [Element],
    root: &mut Option<Element>,
    element: Element,
    position: u64,
) -> Result<(), ParseError> {
    if let Some(parent) = stack.last_mut() {
        parent.nodes.push(Node::Element(element));
    } else if root.is_some() {
        return Err(malformed("more than one root element", position));
    } else {
        *root = Some(element);
    }
    Ok(())
}

fn push_text(stack: &mut [Element], text: String, position: u64) -> Result<(), ParseError> {
    match stack.last_mut() {
        Some(parent) => parent.nodes.push(Node::Text(text)),
        None if text.trim().is_empty() => {}
        None => return Err(malformed("text outside the root element", position)),
    }
    Ok(())
}
