//! Inline wiki formatting: apostrophe emphasis and external links.
//!
//! Applied one line at a time. Emphasis never spans lines: whatever is still
//! open at the end of a line is closed there.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use crate::render_html::escape_html;

static EXTERNAL_LINK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\[(https?://[^\s\]]+)(?:\s+([^\]]*))?\]").expect("valid external link pattern")
});

/// Format a single line of wiki text.
pub fn format_line(line: &str) -> String {
    let linked = external_links(line);
    emphasis(&linked)
}

/// `[http://host/path text]` becomes a `rel="nofollow"` anchor. Without text
/// the URL itself is shown.
pub fn external_links(line: &str) -> String {
    EXTERNAL_LINK
        .replace_all(line, |caps: &Captures<'_>| {
            let url = caps.get(1).map_or("", |m| m.as_str());
            let text = caps
                .get(2)
                .map(|m| m.as_str().trim())
                .filter(|t| !t.is_empty())
                .unwrap_or(url);
            format!("<a href=\"{}\" rel=\"nofollow\">{text}</a>", escape_html(url))
        })
        .into_owned()
}

/// Turn apostrophe runs into `<em>`/`<strong>`.
///
/// - `''` toggles `<em>`, `'''` toggles `<strong>`, `'''''` toggles both.
/// - A run of four is one literal apostrophe followed by `'''`.
/// - Longer runs keep the extra apostrophes as text before a `'''''`.
pub fn emphasis(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    let mut open: Vec<&'static str> = Vec::new();
    let mut chars = line.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        if c != '\'' {
            out.push(c);
            continue;
        }
        let mut run = 1;
        while chars.next_if(|&(_, c)| c == '\'').is_some() {
            run += 1;
        }
        match run {
            1 => out.push_str(&line[i..i + 1]),
            2 => toggle(&mut out, &mut open, "em"),
            3 => toggle(&mut out, &mut open, "strong"),
            4 => {
                out.push('\'');
                toggle(&mut out, &mut open, "strong");
            }
            _ => {
                for _ in 5..run {
                    out.push('\'');
                }
                let order = if open.last() == Some(&"em") {
                    ["em", "strong"]
                } else {
                    ["strong", "em"]
                };
                for tag in order {
                    toggle(&mut out, &mut open, tag);
                }
            }
        }
    }

    while let Some(tag) = open.pop() {
        out.push_str(&format!("</{tag}>"));
    }
    out
}

/// Open `tag`, or close it if already open. Tags opened inside it are
/// closed first and reopened afterwards so the output stays nested.
fn toggle(out: &mut String, open: &mut Vec<&'static str>, tag: &'static str) {
    let Some(pos) = open.iter().rposition(|t| *t == tag) else {
        out.push_str(&format!("<{tag}>"));
        open.push(tag);
        return;
    };
    let closed: Vec<_> = open.drain(pos..).collect();
    for t in closed.iter().rev() {
        out.push_str(&format!("</{t}>"));
    }
    for t in closed.into_iter().skip(1) {
        out.push_str(&format!("<{t}>"));
        open.push(t);
    }
}
