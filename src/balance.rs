//! Tag balancing and `{for}` region expansion.
//!
//! [`TagBalancer`] turns a string of HTML-ish tags and text into a properly
//! nested tree using a single left-to-right scan over an explicit stack of
//! open elements:
//!
//! - an opener is pushed (void and self-closed tags become leaves);
//! - a closer pops down to the nearest open element with the same name. Any
//!   element skipped on the way is force-closed there. Its own closer, if it
//!   shows up later, is absorbed. Inline formatting elements are reopened
//!   as soon as more content follows, so nothing ever cross-nests;
//! - a closer with no open element is dropped when that tag was opened
//!   earlier (a duplicate closer), otherwise kept as literal text;
//! - an opener past [`MAX_NESTING`] levels is ignored, and so is its closer;
//! - whatever is still open at the end of input is closed there.
//!
//! Malformed tag syntax never fails; it stays in the output as text.
//!
//! The `{for}` helpers work around the line/paragraph pass: [`strip_fors`]
//! swaps each delimiter for an opaque `\x07` token, [`unstrip_fors`] turns the
//! tokens into `<for>` tags after structuring, and
//! [`TagBalancer::expand_fors`] rewrites those into `div`/`span` wrappers.

use std::collections::{HashMap, HashSet};
use std::fmt;

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use crate::render_html::escape_html;
use crate::types::{Attribute, ContentNode, Element, ForRegion, OwnLine, RegionDisplay};

/// Elements that never have children or a closing tag.
pub const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param",
    "source", "track", "wbr",
];

/// Elements that make an enclosing `{for}` region render as a block.
pub const BLOCK_LEVEL_ELEMENTS: &[&str] = &[
    "address", "article", "aside", "blockquote", "caption", "center", "dd", "details", "div",
    "dl", "dt", "fieldset", "figcaption", "figure", "footer", "form", "h1", "h2", "h3", "h4",
    "h5", "h6", "header", "hr", "li", "main", "nav", "noscript", "ol", "p", "pre", "section",
    "table", "tbody", "td", "tfoot", "th", "thead", "tr", "ul",
];

/// Elements reopened after being force-closed, when content follows.
const FORMATTING_ELEMENTS: &[&str] = &[
    "a", "b", "big", "code", "em", "font", "i", "nobr", "s", "small", "strike", "strong", "tt",
    "u",
];

/// Control character reserved for region placeholders.
pub const TOKEN_MARK: char = '\u{7}';

const CLOSER_TOKEN: &str = "\u{7}/sf\u{7}";

/// Deepest element nesting the balancer builds. Openers past it are ignored
/// and their closers absorbed.
pub const MAX_NESTING: usize = 512;

pub fn is_void(name: &str) -> bool {
    VOID_ELEMENTS.contains(&name)
}

pub fn is_block_level(name: &str) -> bool {
    BLOCK_LEVEL_ELEMENTS.contains(&name)
}

/// Whether `html` opens any block-level element.
pub fn contains_block_level(html: &str) -> bool {
    tokenize(html)
        .iter()
        .any(|token| matches!(token, Token::Open { name, .. } if is_block_level(name)))
}

fn is_formatting(name: &str) -> bool {
    FORMATTING_ELEMENTS.contains(&name)
}

// ------------------------------------------------------------------
// Tokenizer
// ------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token<'a> {
    Text(&'a str),
    Open {
        name: String,
        attrs: Vec<Attribute>,
        self_closing: bool,
    },
    Close {
        name: String,
        raw: &'a str,
    },
}

fn tokenize(input: &str) -> Vec<Token<'_>> {
    let mut tokens = Vec::new();
    let mut text_start = 0;
    let mut pos = 0;

    while let Some(offset) = input[pos..].find('<') {
        let lt = pos + offset;
        match parse_tag(&input[lt..]) {
            Some((token, len)) => {
                if lt > text_start {
                    tokens.push(Token::Text(&input[text_start..lt]));
                }
                tokens.push(token);
                pos = lt + len;
                text_start = pos;
            }
            None => pos = lt + 1,
        }
    }

    if text_start < input.len() {
        tokens.push(Token::Text(&input[text_start..]));
    }
    tokens
}

/// Parse one tag at the start of `s` (which begins with `<`). Returns the
/// token and the number of bytes consumed, or `None` when the text is not a
/// tag and the `<` should be kept literally.
fn parse_tag(s: &str) -> Option<(Token<'_>, usize)> {
    let b = s.as_bytes();

    if s.starts_with("<!--") {
        let end = s.find("-->").map_or(s.len(), |e| e + 3);
        return Some((Token::Text(&s[..end]), end));
    }

    let mut i = 1;
    let closing = b.get(i) == Some(&b'/');
    if closing {
        i += 1;
    }

    let name_start = i;
    if !b.get(i).is_some_and(u8::is_ascii_alphabetic) {
        return None;
    }
    while b
        .get(i)
        .is_some_and(|c| c.is_ascii_alphanumeric() || matches!(c, b'-' | b':'))
    {
        i += 1;
    }
    let name = s[name_start..i].to_ascii_lowercase();

    if closing {
        i = skip_whitespace(b, i);
        return (b.get(i) == Some(&b'>')).then(|| {
            (
                Token::Close {
                    name,
                    raw: &s[..=i],
                },
                i + 1,
            )
        });
    }

    let mut attrs = Vec::new();
    loop {
        i = skip_whitespace(b, i);
        let c = *b.get(i)?;
        match c {
            b'>' => {
                let token = Token::Open {
                    name,
                    attrs,
                    self_closing: false,
                };
                return Some((token, i + 1));
            }
            b'/' if b.get(i + 1) == Some(&b'>') => {
                let token = Token::Open {
                    name,
                    attrs,
                    self_closing: true,
                };
                return Some((token, i + 2));
            }
            b'/' => i += 1,
            _ => {
                let attr_start = i;
                while b.get(i).is_some_and(|c| {
                    !c.is_ascii_whitespace() && !matches!(c, b'=' | b'>' | b'/' | b'"' | b'\'' | b'<')
                }) {
                    i += 1;
                }
                if i == attr_start {
                    return None;
                }
                let attr_name = s[attr_start..i].to_ascii_lowercase();

                let mut j = skip_whitespace(b, i);
                let value = if b.get(j) == Some(&b'=') {
                    j = skip_whitespace(b, j + 1);
                    let q = *b.get(j)?;
                    if q == b'"' || q == b'\'' {
                        let value_start = j + 1;
                        let value_end = value_start + s[value_start..].find(char::from(q))?;
                        i = value_end + 1;
                        &s[value_start..value_end]
                    } else {
                        let value_start = j;
                        while b.get(j).is_some_and(|c| !c.is_ascii_whitespace() && *c != b'>') {
                            j += 1;
                        }
                        i = j;
                        &s[value_start..j]
                    }
                } else {
                    ""
                };
                attrs.push(Attribute::new(attr_name, value));
            }
        }
    }
}

fn skip_whitespace(b: &[u8], mut i: usize) -> usize {
    while b.get(i).is_some_and(u8::is_ascii_whitespace) {
        i += 1;
    }
    i
}

// ------------------------------------------------------------------
// Tree construction
// ------------------------------------------------------------------

/// A fix the balancer applied to its input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Repair {
    /// An element was closed without its own closer.
    AutoClosed(String),
    /// A force-closed formatting element was reopened for following content.
    Reopened(String),
    /// A closer for an already-closed element was dropped.
    RedundantCloser(String),
    /// A closer with no opener at all was kept as text.
    LiteralCloser(String),
    /// An opener past [`MAX_NESTING`] was ignored.
    TooDeep(String),
}

impl fmt::Display for Repair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AutoClosed(tag) => write!(f, "auto-closed <{tag}>"),
            Self::Reopened(tag) => write!(f, "reopened <{tag}> after a misnested closer"),
            Self::RedundantCloser(tag) => write!(f, "dropped redundant </{tag}>"),
            Self::LiteralCloser(tag) => write!(f, "kept unmatched </{tag}> as text"),
            Self::TooDeep(tag) => write!(f, "ignored <{tag}> nested deeper than {MAX_NESTING}"),
        }
    }
}

/// An element closed early whose own closer may still arrive.
#[derive(Debug)]
struct OwedCloser {
    name: String,
    attrs: Vec<Attribute>,
    /// Stack height of the container the element was closed into.
    depth: usize,
    reopen: bool,
}

#[derive(Debug, Default)]
struct TreeBuilder {
    root: Vec<ContentNode>,
    stack: Vec<Element>,
    owed: Vec<OwedCloser>,
    opened: HashSet<String>,
    /// Ignored openers, by name, whose closers are still to come.
    flattened: HashMap<String, usize>,
    repairs: Vec<Repair>,
}

impl TreeBuilder {
    fn children(&mut self) -> &mut Vec<ContentNode> {
        match self.stack.last_mut() {
            Some(el) => &mut el.children,
            None => &mut self.root,
        }
    }

    fn append_text(&mut self, text: &str) {
        let children = self.children();
        if let Some(ContentNode::Text(prev)) = children.last_mut() {
            prev.push_str(text);
        } else {
            children.push(ContentNode::Text(text.to_string()));
        }
    }

    fn text(&mut self, text: &str) {
        if !text.trim().is_empty() {
            self.reconstruct();
        }
        self.append_text(text);
    }

    fn open(&mut self, name: String, attrs: Vec<Attribute>, self_closing: bool) {
        self.reconstruct();
        let el = Element::new(name, attrs);
        if self_closing || is_void(&el.name) {
            self.children().push(ContentNode::Element(el));
        } else if self.stack.len() >= MAX_NESTING {
            self.flatten(el.name);
        } else {
            self.opened.insert(el.name.clone());
            self.stack.push(el);
        }
    }

    fn flatten(&mut self, name: String) {
        self.repairs.push(Repair::TooDeep(name.clone()));
        *self.flattened.entry(name).or_insert(0) += 1;
    }

    fn close(&mut self, name: &str, raw: &str) {
        if let Some(count) = self.flattened.get_mut(name)
            && *count > 0
        {
            *count -= 1;
            return;
        }

        if let Some(pos) = self.stack.iter().rposition(|el| el.name == name) {
            let mut skipped = Vec::new();
            while self.stack.len() > pos + 1 {
                if let Some((tag, attrs)) = self.pop_and_attach() {
                    self.repairs.push(Repair::AutoClosed(tag.clone()));
                    let reopen = is_formatting(&tag);
                    skipped.push(OwedCloser {
                        name: tag,
                        attrs,
                        depth: pos,
                        reopen,
                    });
                }
            }
            self.pop_and_attach();
            // Outermost first, so reopening rebuilds the original nesting.
            skipped.reverse();
            self.owed.extend(skipped);
            self.prune_owed();
            return;
        }

        if let Some(idx) = self.owed.iter().rposition(|o| o.name == name) {
            self.owed.remove(idx);
            return;
        }

        if self.opened.contains(name) {
            self.repairs.push(Repair::RedundantCloser(name.to_string()));
        } else {
            self.repairs.push(Repair::LiteralCloser(name.to_string()));
            self.append_text(raw);
        }
    }

    /// Reopen force-closed formatting elements before new content.
    fn reconstruct(&mut self) {
        if !self.owed.iter().any(|o| o.reopen) {
            return;
        }
        let (reopen, keep): (Vec<_>, Vec<_>) =
            std::mem::take(&mut self.owed).into_iter().partition(|o| o.reopen);
        self.owed = keep;
        for owed in reopen {
            if self.stack.len() >= MAX_NESTING {
                self.flatten(owed.name);
                continue;
            }
            self.repairs.push(Repair::Reopened(owed.name.clone()));
            self.stack.push(Element::new(owed.name, owed.attrs));
        }
    }

    fn pop_and_attach(&mut self) -> Option<(String, Vec<Attribute>)> {
        let el = self.stack.pop()?;
        let info = (el.name.clone(), el.attrs.clone());
        self.children().push(ContentNode::Element(el));
        Some(info)
    }

    /// Forget owed closers whose container has itself been closed.
    fn prune_owed(&mut self) {
        let height = self.stack.len();
        self.owed.retain(|o| height >= o.depth);
    }

    fn finish(mut self) -> (Vec<ContentNode>, Vec<Repair>) {
        while let Some((tag, _)) = self.pop_and_attach() {
            self.repairs.push(Repair::AutoClosed(tag));
        }
        (self.root, self.repairs)
    }
}

// ------------------------------------------------------------------
// Public balancer
// ------------------------------------------------------------------

/// A balanced tree built from an HTML fragment.
///
/// ```
/// use wiki_markup::balance::TagBalancer;
///
/// let tree = TagBalancer::parse("<div><for><p>One</for></for></p></div>");
/// assert_eq!(tree.to_html(), "<div><for><p>One</p></for></div>");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagBalancer {
    nodes: Vec<ContentNode>,
    repairs: Vec<Repair>,
}

impl TagBalancer {
    pub fn parse(html: &str) -> Self {
        let mut builder = TreeBuilder::default();
        for token in tokenize(html) {
            match token {
                Token::Text(text) => builder.text(text),
                Token::Open {
                    name,
                    attrs,
                    self_closing,
                } => builder.open(name, attrs, self_closing),
                Token::Close { name, raw } => builder.close(&name, raw),
            }
        }
        let (nodes, repairs) = builder.finish();
        Self { nodes, repairs }
    }

    pub fn nodes(&self) -> &[ContentNode] {
        &self.nodes
    }

    pub fn repairs(&self) -> &[Repair] {
        &self.repairs
    }

    /// Rewrite every `<for>` element into `<div class="for">` when it has a
    /// block-level child, `<span class="for">` otherwise. Inner regions are
    /// expanded first. Returns the display chosen for each region in that
    /// order.
    pub fn expand_fors(&mut self) -> Vec<RegionDisplay> {
        let mut displays = Vec::new();
        expand_nodes(&mut self.nodes, &mut displays);
        displays
    }

    pub fn to_html(&self) -> String {
        let mut out = String::new();
        write_nodes(&self.nodes, &mut out);
        out
    }
}

impl fmt::Display for TagBalancer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_html())
    }
}

/// An element whose children are being expanded.
struct ExpandFrame {
    element: Option<Element>,
    pending: std::vec::IntoIter<ContentNode>,
    done: Vec<ContentNode>,
}

impl ExpandFrame {
    fn new(element: Option<Element>, children: Vec<ContentNode>) -> Self {
        Self {
            element,
            pending: children.into_iter(),
            done: Vec::new(),
        }
    }
}

/// Post-order walk over an explicit stack, so inner regions are decided
/// before the regions that contain them.
fn expand_nodes(nodes: &mut Vec<ContentNode>, displays: &mut Vec<RegionDisplay>) {
    let mut stack = vec![ExpandFrame::new(None, std::mem::take(nodes))];

    while let Some(mut frame) = stack.pop() {
        match frame.pending.next() {
            Some(ContentNode::Element(mut el)) => {
                let children = std::mem::take(&mut el.children);
                stack.push(frame);
                stack.push(ExpandFrame::new(Some(el), children));
            }
            Some(text) => {
                frame.done.push(text);
                stack.push(frame);
            }
            None => match (frame.element, stack.last_mut()) {
                (Some(mut el), Some(parent)) => {
                    el.children = frame.done;
                    if el.name == "for" {
                        displays.push(rewrite_for(&mut el));
                    }
                    parent.done.push(ContentNode::Element(el));
                }
                _ => *nodes = frame.done,
            },
        }
    }
}

fn rewrite_for(el: &mut Element) -> RegionDisplay {
    let has_block = el.children.iter().any(|child| {
        matches!(child, ContentNode::Element(c) if is_block_level(&c.name))
    });
    let display = if has_block {
        RegionDisplay::Block
    } else {
        RegionDisplay::Inline
    };
    el.name = display.tag().to_string();
    el.attrs.retain(|a| a.name != "class");
    el.attrs.insert(0, Attribute::new("class", "for"));
    display
}

enum WriteStep<'a> {
    Node(&'a ContentNode),
    Close(&'a str),
}

fn write_nodes(nodes: &[ContentNode], out: &mut String) {
    let mut work: Vec<WriteStep<'_>> = nodes.iter().rev().map(WriteStep::Node).collect();

    while let Some(step) = work.pop() {
        let el = match step {
            WriteStep::Close(name) => {
                out.push_str("</");
                out.push_str(name);
                out.push('>');
                continue;
            }
            WriteStep::Node(ContentNode::Text(text)) => {
                out.push_str(text);
                continue;
            }
            WriteStep::Node(ContentNode::Element(el)) => el,
        };

        out.push('<');
        out.push_str(&el.name);
        for attr in &el.attrs {
            out.push(' ');
            out.push_str(&attr.name);
            if !attr.value.is_empty() {
                out.push_str("=\"");
                out.push_str(&attr.value.replace('"', "&quot;"));
                out.push('"');
            }
        }
        out.push('>');
        if is_void(&el.name) {
            continue;
        }
        work.push(WriteStep::Close(&el.name));
        work.extend(el.children.iter().rev().map(WriteStep::Node));
    }
}

// ------------------------------------------------------------------
// {for} placeholders
// ------------------------------------------------------------------

static FOR_OR_CLOSER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(\s*)(\{for(?: +([^}]*))?\}|\{/for\})(\s*)").expect("valid {for} pattern")
});

static PARSED_TOKEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"<p>\s*\x07(\d+|/sf)\x07\s*</p>|\x07(\d+|/sf)\x07")
        .expect("valid region token pattern")
});

/// Markup with its `{for}` delimiters replaced by placeholder tokens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StrippedFors {
    pub text: String,
    pub regions: Vec<ForRegion>,
}

/// Where the delimiter in `caps` sits relative to its line and the input.
/// Trailing whitespace on the line does not count against it.
fn on_own_line(text: &str, caps: &Captures<'_>) -> OwnLine {
    let (Some(tag), Some(trailing)) = (caps.get(2), caps.get(4)) else {
        return OwnLine::default();
    };
    let (at_left, at_top) = match text[..tag.start()].chars().next_back() {
        Some(c) => (c == '\n', false),
        None => (true, true),
    };
    let at_bottom = trailing.end() == text.len();
    let at_right = at_bottom || trailing.as_str().contains('\n');
    OwnLine {
        on_own_line: at_left && at_right,
        at_top,
        at_bottom,
    }
}

/// Replace each `{for ...}` with `\x07N\x07` and each `{/for}` with
/// `\x07/sf\x07`, numbering regions from `first_index`.
///
/// A delimiter alone on its line gets blank lines around it so the
/// paragraph pass treats it as a separate block. Two such delimiters on
/// consecutive lines each add their own, which can leave an extra empty
/// paragraph between them.
pub fn strip_fors(text: &str, first_index: usize) -> StrippedFors {
    let mut regions = Vec::new();
    let mut out = String::with_capacity(text.len());
    let mut last = 0;

    for caps in FOR_OR_CLOSER.captures_iter(text) {
        let (Some(whole), Some(tag)) = (caps.get(0), caps.get(2)) else {
            continue;
        };
        out.push_str(&text[last..whole.start()]);
        last = whole.end();

        let own = on_own_line(text, &caps);
        let token = if tag.as_str().starts_with("{/") {
            CLOSER_TOKEN.to_string()
        } else {
            let index = first_index + regions.len();
            let targets = caps
                .get(3)
                .map(|m| {
                    m.as_str()
                        .split(',')
                        .map(|t| t.trim().to_string())
                        .filter(|t| !t.is_empty())
                        .collect()
                })
                .unwrap_or_default();
            regions.push(ForRegion { index, targets });
            format!("{TOKEN_MARK}{index}{TOKEN_MARK}")
        };

        if own.on_own_line {
            if !own.at_top {
                out.push_str("\n\n");
            }
            out.push_str(&token);
            if !own.at_bottom {
                out.push_str("\n\n");
            }
        } else {
            out.push_str(caps.get(1).map_or("", |m| m.as_str()));
            out.push_str(&token);
            out.push_str(caps.get(4).map_or("", |m| m.as_str()));
        }
    }

    out.push_str(&text[last..]);
    StrippedFors { text: out, regions }
}

/// The `<for>` tag a region placeholder turns back into.
fn for_open_tag(region: &ForRegion) -> String {
    if region.targets.is_empty() {
        "<for>".to_string()
    } else {
        format!("<for data-for=\"{}\">", escape_html(&region.targets.join(",")))
    }
}

/// Turn placeholder tokens in rendered HTML back into `<for>`/`</for>`
/// tags. A token that ended up alone in a paragraph takes the paragraph
/// with it. Unknown region indexes are dropped. A closer with no region open
/// before it is put back as literal `{/for}` text.
pub fn unstrip_fors(html: &str, regions: &[ForRegion]) -> String {
    let mut open = 0usize;
    PARSED_TOKEN
        .replace_all(html, |caps: &Captures<'_>| {
            let Some(token) = caps.get(1).or_else(|| caps.get(2)) else {
                return String::new();
            };
            if token.as_str() == "/sf" {
                if open == 0 {
                    return caps[0].replace(CLOSER_TOKEN, "{/for}");
                }
                open -= 1;
                return "</for>".to_string();
            }
            let region = token
                .as_str()
                .parse::<usize>()
                .ok()
                .and_then(|index| {
                    regions
                        .binary_search_by_key(&index, |r| r.index)
                        .ok()
                        .map(|i| &regions[i])
                });
            match region {
                Some(region) => {
                    open += 1;
                    for_open_tag(region)
                }
                None => String::new(),
            }
        })
        .into_owned()
}
