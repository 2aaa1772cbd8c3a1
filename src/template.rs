//! Template parameter binding, placeholder substitution and lookup.
//!
//! A template invocation `[[T:name|a|key=b|2=c]]` binds its arguments into a
//! [`ParameterMap`] with [`build_parameters`]; [`format_content`] then fills
//! the `{{{key}}}` placeholders of the template body before the body is
//! parsed as markup again.
//!
//! # Usage
//!
//! ```
//! use wiki_markup::template::{build_parameters, format_content};
//!
//! let params = build_parameters(&["2=one", "two"]);
//! assert_eq!(format_content("{{{1}}}:{{{2}}}", &params), "two:one");
//! ```

use std::collections::BTreeSet;

use crate::store::{ContentSource, find_document};
use crate::types::{ParameterMap, ResolvedReference};

/// Split an argument on its first unescaped `=`. `\=` stays part of the
/// text and is unescaped.
///
/// The key must look like a name (word characters, spaces, `.` and `-`).
/// Anything else, such as the `class="..."` of markup rendered into the
/// argument, leaves the argument positional.
fn split_keyed(arg: &str) -> Option<(&str, &str)> {
    let bytes = arg.as_bytes();
    let eq = (0..bytes.len()).find(|&i| bytes[i] == b'=' && (i == 0 || bytes[i - 1] != b'\\'))?;
    let key = arg[..eq].trim();
    let is_name = key
        .chars()
        .all(|c| c.is_alphanumeric() || matches!(c, '_' | ' ' | '.' | '-'));
    (!key.is_empty() && is_name).then(|| (key, &arg[eq + 1..]))
}

fn unescape(value: &str) -> String {
    value.replace("\\=", "=")
}

/// Bind template arguments to parameter keys.
///
/// - `key=value` binds `key` (trimmed) exactly as written, numeric or not.
/// - Every other argument is positional and takes the lowest integer from 1
///   up that no keyed argument anywhere in the list claims.
pub fn build_parameters<A: AsRef<str>>(args: &[A]) -> ParameterMap {
    let claimed: BTreeSet<usize> = args
        .iter()
        .filter_map(|arg| split_keyed(arg.as_ref()))
        .filter_map(|(key, _)| key.parse::<usize>().ok())
        .collect();

    let mut params = ParameterMap::new();
    let mut next = 1;
    for arg in args {
        let arg = arg.as_ref();
        match split_keyed(arg) {
            Some((key, value)) => {
                params.insert(key, unescape(value));
            }
            None => {
                while claimed.contains(&next) {
                    next += 1;
                }
                params.insert(next.to_string(), unescape(arg));
                next += 1;
            }
        }
    }
    params
}

/// A placeholder is on its own paragraph when only blank lines separate it
/// from the rest of the body.
fn is_own_paragraph(before: &str, after: &str) -> bool {
    let before = before.trim_end_matches([' ', '\t']);
    let after = after.trim_start_matches([' ', '\t']);
    (before.is_empty() || before.ends_with("\n\n")) && (after.is_empty() || after.starts_with("\n\n"))
}

/// Neutralize line-start markers so an inline value cannot turn the line it
/// lands on into a list, heading or rule.
fn protect_block_markers(value: &str) -> String {
    value
        .split('\n')
        .map(|line| {
            let entity = match line.chars().next() {
                Some('*') => "&#42;",
                Some('#') => "&#35;",
                Some(';') => "&#59;",
                Some(':') => "&#58;",
                Some('=') => "&#61;",
                Some('-') if line.starts_with("----") => "&#45;",
                _ => return line.to_string(),
            };
            format!("{entity}{}", &line[1..])
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Replace `{{{key}}}` and `{{{key|default}}}` placeholders in `body`.
///
/// - Bound keys are replaced with their value.
/// - Unbound keys use the default, or the empty string.
/// - An unclosed `{{{` is kept literally.
///
/// Values are inserted unescaped. A value keeps its block-level markup only
/// when its placeholder stands in a paragraph of its own.
pub fn format_content(body: &str, params: &ParameterMap) -> String {
    let mut result = String::with_capacity(body.len());
    let mut rest = body;

    while let Some(start_pos) = rest.find("{{{") {
        result.push_str(&rest[..start_pos]);

        let after_open = &rest[start_pos + 3..];
        if let Some(end_pos) = after_open.find("}}}") {
            let inner = &after_open[..end_pos];
            let (key, default) = match inner.split_once('|') {
                Some((key, default)) => (key.trim(), Some(default)),
                None => (inner.trim(), None),
            };
            let value = params.get(key).or(default).unwrap_or("");
            let after = &after_open[end_pos + 3..];
            let before = &body[..body.len() - rest.len() + start_pos];
            if is_own_paragraph(before, after) {
                result.push_str(value);
            } else {
                result.push_str(&protect_block_markers(value));
            }
            rest = after;
        } else {
            result.push_str("{{{");
            rest = after_open;
        }
    }

    result.push_str(rest);
    result
}

/// Find the approved `Template:<name>` document for `locale`, falling back to
/// `default_locale`.
///
/// A template that only has unapproved revisions resolves to
/// [`ResolvedReference::NotApproved`].
#[tracing::instrument(level = "debug", skip(source))]
pub fn resolve_template<S: ContentSource + ?Sized>(
    source: &S,
    name: &str,
    locale: &str,
    default_locale: &str,
) -> ResolvedReference {
    let title = format!("Template:{}", name.trim());
    if let Some((doc, found_in)) =
        find_document(source, &title, locale, default_locale, |doc| doc.approved)
    {
        tracing::debug!(%title, locale = %found_in, "template resolved");
        return ResolvedReference::Found {
            content: doc.content,
            locale: found_in,
        };
    }

    let title = name.trim().to_string();
    if find_document(source, &format!("Template:{title}"), locale, default_locale, |_| true).is_some() {
        ResolvedReference::NotApproved { title }
    } else {
        ResolvedReference::NotFound { title }
    }
}
