//! Line and paragraph structuring.
//!
//! Runs over the markup one line at a time and groups lines into blocks:
//! headings, horizontal rules, nested lists, paragraphs, and "raw" lines that
//! already carry block-level HTML or a block directive delimiter. Blocks are
//! joined with newlines. Inline formatting is applied to the text of every
//! line on the way through.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::balance::{BLOCK_LEVEL_ELEMENTS, TOKEN_MARK};
use crate::inline::format_line;

/// Lines containing block-level tags or `{note}`/`{warning}` delimiters are
/// emitted as-is instead of being wrapped in a paragraph.
static BLOCK_LINE: Lazy<Regex> = Lazy::new(|| {
    let tags = BLOCK_LEVEL_ELEMENTS.join("|");
    Regex::new(&format!(
        r"(?i)</?(?:{tags})(?:[\s/>]|$)|\{{/?(?:note|warning)\}}"
    ))
    .expect("valid block line pattern")
});

// ------------------------------------------------------------------
// Heading ids
// ------------------------------------------------------------------

/// Generates unique heading ids for one render.
#[derive(Debug, Clone)]
pub struct HeadingIds {
    prefix: String,
    seen: HashMap<String, usize>,
}

impl HeadingIds {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            seen: HashMap::new(),
        }
    }

    /// Id for a heading with this text. Repeats get `_2`, `_3`, ...
    pub fn next_id(&mut self, text: &str) -> String {
        let base = format!("{}{}", self.prefix, slugify(text));
        let count = self.seen.entry(base.clone()).or_insert(0);
        *count += 1;
        if *count == 1 {
            base
        } else {
            format!("{base}_{count}")
        }
    }
}

fn slugify(text: &str) -> String {
    // Region placeholders sit between pairs of marks; skip them.
    let visible = text.split(TOKEN_MARK).step_by(2).collect::<String>();
    let mut slug = String::with_capacity(visible.len());
    for c in visible.trim().chars() {
        if c.is_whitespace() {
            slug.push('_');
        } else if c.is_alphanumeric() || matches!(c, '_' | '-' | '.') {
            slug.extend(c.to_lowercase());
        }
    }
    slug
}

// ------------------------------------------------------------------
// Line classification
// ------------------------------------------------------------------

#[derive(Debug, PartialEq, Eq)]
enum Line<'a> {
    Blank,
    Heading { level: usize, text: &'a str },
    Rule,
    ListItem { prefix: &'a str, text: &'a str },
    Raw(&'a str),
    Text(&'a str),
}

const LIST_MARKERS: &[char] = &['*', '#', ';', ':'];

fn classify(line: &str) -> Line<'_> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Line::Blank;
    }

    if trimmed.starts_with('=') && trimmed.ends_with('=') {
        let leading = trimmed.len() - trimmed.trim_start_matches('=').len();
        let trailing = trimmed.len() - trimmed.trim_end_matches('=').len();
        if leading + trailing < trimmed.len() {
            let level = leading.min(trailing).min(6);
            let text = trimmed[level..trimmed.len() - level].trim();
            if !text.is_empty() {
                return Line::Heading { level, text };
            }
        }
    }

    if trimmed.starts_with("----") && trimmed.chars().all(|c| c == '-') {
        return Line::Rule;
    }

    if line.starts_with(LIST_MARKERS) {
        let text = line.trim_start_matches(LIST_MARKERS);
        let prefix = &line[..line.len() - text.len()];
        return Line::ListItem { prefix, text };
    }

    if BLOCK_LINE.is_match(line) {
        Line::Raw(line)
    } else {
        Line::Text(line)
    }
}

// ------------------------------------------------------------------
// Lists
// ------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ListLevel {
    list: &'static str,
    item: &'static str,
}

fn list_level(marker: char) -> Option<ListLevel> {
    let (list, item) = match marker {
        '*' => ("ul", "li"),
        '#' => ("ol", "li"),
        ';' => ("dl", "dt"),
        ':' => ("dl", "dd"),
        _ => return None,
    };
    Some(ListLevel { list, item })
}

/// An open list. Every open level always has one open item.
#[derive(Debug, Default)]
struct ListState {
    html: String,
    levels: Vec<ListLevel>,
}

impl ListState {
    fn open_level(&mut self, level: ListLevel) {
        self.html
            .push_str(&format!("<{}><{}>", level.list, level.item));
        self.levels.push(level);
    }

    fn close_level(&mut self) {
        if let Some(level) = self.levels.pop() {
            self.html
                .push_str(&format!("</{}></{}>", level.item, level.list));
        }
    }

    /// Move to the nesting described by `prefix` and start a new item.
    fn item(&mut self, prefix: &str, text: &str) {
        let wanted: Vec<ListLevel> = prefix.chars().filter_map(list_level).collect();
        let common = self
            .levels
            .iter()
            .zip(&wanted)
            .take_while(|(open, want)| open.list == want.list)
            .count();

        while self.levels.len() > common {
            self.close_level();
        }

        if common == wanted.len() {
            if let (Some(open), Some(want)) = (self.levels.last_mut(), wanted.last()) {
                self.html
                    .push_str(&format!("</{}><{}>", open.item, want.item));
                open.item = want.item;
            }
        } else {
            for level in &wanted[common..] {
                self.open_level(*level);
            }
        }

        self.html.push_str(&format_line(text));
    }

    fn finish(mut self) -> String {
        while !self.levels.is_empty() {
            self.close_level();
        }
        self.html
    }
}

// ------------------------------------------------------------------
// Block assembly
// ------------------------------------------------------------------

#[derive(Debug, Default)]
struct BlockBuilder {
    blocks: Vec<String>,
    paragraph: Vec<String>,
    list: Option<ListState>,
}

impl BlockBuilder {
    fn flush_paragraph(&mut self) {
        if !self.paragraph.is_empty() {
            self.blocks
                .push(format!("<p>{}</p>", self.paragraph.join("\n")));
            self.paragraph.clear();
        }
    }

    fn close_list(&mut self) {
        if let Some(list) = self.list.take() {
            self.blocks.push(list.finish());
        }
    }

    fn end_block(&mut self) {
        self.flush_paragraph();
        self.close_list();
    }

    fn line(&mut self, line: &str, ids: &mut HeadingIds) {
        match classify(line) {
            Line::Blank => self.end_block(),
            Line::Heading { level, text } => {
                self.end_block();
                let id = ids.next_id(text);
                self.blocks.push(format!(
                    "<h{level} id=\"{id}\">{}</h{level}>",
                    format_line(text)
                ));
            }
            Line::Rule => {
                self.end_block();
                self.blocks.push("<hr>".to_string());
            }
            Line::ListItem { prefix, text } => {
                self.flush_paragraph();
                self.list
                    .get_or_insert_with(ListState::default)
                    .item(prefix, text);
            }
            Line::Raw(raw) => {
                self.end_block();
                self.blocks.push(format_line(raw));
            }
            Line::Text(text) => {
                self.close_list();
                self.paragraph.push(format_line(text));
            }
        }
    }

    fn finish(mut self) -> String {
        self.end_block();
        self.blocks.join("\n")
    }
}

/// Structure `text` into block-level HTML.
pub fn structure(text: &str, ids: &mut HeadingIds) -> String {
    let mut builder = BlockBuilder::default();
    for line in text.split('\n') {
        builder.line(line.strip_suffix('\r').unwrap_or(line), ids);
    }
    builder.finish()
}
