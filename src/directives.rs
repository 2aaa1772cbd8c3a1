//! Custom `{name ...}` directives.
//!
//! [`apply`] scans left to right. At every `{` it tries the entries of
//! [`DIRECTIVES`] in order and splices in the first match's HTML; text a
//! directive consumed is never looked at again by the same scan. Block
//! directives are paired in the same scan with a stack of open names, so a
//! `{button}` can live inside a `{warning}` inside a `{note}` at any depth.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

static KEY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^\{key (.+?)\}").expect("valid key pattern"));

static INLINE_SPAN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)^\{(menu|button|filepath|pref) (.*?)\}").expect("valid inline span pattern")
});

/// How a directive is recognized.
enum Matcher {
    /// `{name}...{/name}`, nesting-aware, rendered as `<div class="name">`.
    Block(&'static str),
    /// A regex anchored at the `{`, with a renderer for its captures.
    Inline {
        pattern: &'static Lazy<Regex>,
        render: fn(&Captures<'_>) -> String,
    },
}

/// One entry of the directive table.
pub struct Directive {
    pub name: &'static str,
    matcher: Matcher,
}

/// The directive table, in priority order.
pub static DIRECTIVES: [Directive; 4] = [
    Directive {
        name: "note",
        matcher: Matcher::Block("note"),
    },
    Directive {
        name: "warning",
        matcher: Matcher::Block("warning"),
    },
    Directive {
        name: "key",
        matcher: Matcher::Inline {
            pattern: &KEY,
            render: render_keys,
        },
    },
    Directive {
        name: "span",
        matcher: Matcher::Inline {
            pattern: &INLINE_SPAN,
            render: render_span,
        },
    },
];

impl Directive {
    /// Try this directive at the start of `at`. Returns the replacement
    /// HTML and the number of bytes consumed.
    fn try_match(&self, at: &str) -> Option<(String, usize)> {
        match &self.matcher {
            Matcher::Block(name) => {
                let body = at.strip_prefix('{')?.strip_prefix(name)?;
                body.starts_with('}')
                    .then(|| (format!("<div class=\"{name}\">"), name.len() + 2))
            }
            Matcher::Inline { pattern, render } => {
                let caps = pattern.captures(at)?;
                let consumed = caps.get(0)?.end();
                Some((render(&caps), consumed))
            }
        }
    }

    /// The block name and closer length when `at` starts with this block
    /// directive's `{/name}`.
    fn closer(&self, at: &str) -> Option<(&'static str, usize)> {
        let Matcher::Block(name) = self.matcher else {
            return None;
        };
        let body = at.strip_prefix("{/")?.strip_prefix(name)?;
        body.starts_with('}').then(|| (name, name.len() + 3))
    }
}

/// Replace every directive in `text` with its HTML.
///
/// A block closer ends the most recent open block of the same name and is
/// kept as text when none is open. A block left open at the end produces
/// only its opening `<div>`; the tag balancer closes it later.
pub fn apply(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut open_blocks: Vec<&'static str> = Vec::new();
    let mut rest = text;

    while let Some(pos) = rest.find('{') {
        out.push_str(&rest[..pos]);
        let at = &rest[pos..];

        let closer = DIRECTIVES.iter().find_map(|d| d.closer(at));
        if let Some((name, len)) = closer
            && let Some(i) = open_blocks.iter().rposition(|open| *open == name)
        {
            open_blocks.remove(i);
            out.push_str("</div>");
            rest = &at[len..];
            continue;
        }

        match DIRECTIVES.iter().find_map(|d| d.try_match(at).map(|m| (d, m))) {
            Some((directive, (html, consumed))) => {
                if let Matcher::Block(name) = directive.matcher {
                    open_blocks.push(name);
                }
                out.push_str(&html);
                rest = &at[consumed..];
            }
            None => {
                out.push('{');
                rest = &at[1..];
            }
        }
    }

    out.push_str(rest);
    out
}

/// Split `{key ...}` content on `+` outside double quotes. Segments are
/// trimmed; whitespace inside a segment is kept.
pub fn split_keys(content: &str) -> Vec<&str> {
    let mut keys = Vec::new();
    let mut in_quotes = false;
    let mut start = 0;
    for (i, c) in content.char_indices() {
        match c {
            '"' => in_quotes = !in_quotes,
            '+' if !in_quotes => {
                keys.push(content[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }
    keys.push(content[start..].trim());
    keys
}

fn render_keys(caps: &Captures<'_>) -> String {
    let content = caps.get(1).map_or("", |m| m.as_str());
    split_keys(content)
        .into_iter()
        .map(|key| format!("<span class=\"key\">{key}</span>"))
        .collect::<Vec<_>>()
        .join(" + ")
}

fn render_span(caps: &Captures<'_>) -> String {
    let name = caps.get(1).map_or("", |m| m.as_str());
    let content = caps.get(2).map_or("", |m| m.as_str());
    format!("<span class=\"{name}\">{}</span>", apply(content))
}
