//! `[[...]]` references: scanning, parsing and resolution.
//!
//! The scanner finds each top-level `[[...]]` (nested references inside
//! arguments stay part of their parent), parses it into a [`Reference`] and
//! asks a callback for the HTML to splice in. Expanding templates and
//! includes needs a recursive parse, so that part lives in the driver; this
//! module only knows how to find, classify and place the results.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::render_html::{VideoSize, render_video};
use crate::store::{ContentSource, find_document, find_media};
use crate::types::{MediaKind, ResolvedReference, TemplateInvocation};

static EMPTY_PARAGRAPH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<p>\s*</p>").expect("valid empty paragraph pattern"));

/// A parsed `[[...]]` reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reference {
    /// `[[Template:name|args]]` or `[[T:name|args]]`
    Template(TemplateInvocation),
    /// `[[Include:title]]` or `[[I:title]]`
    Include { title: String },
    /// `[[V:title|width=..|height=..]]`
    Video { title: String, args: Vec<String> },
    /// `[[Image:title|alt|width=..]]`
    Image { title: String, args: Vec<String> },
    /// `[[Title]]`, `[[Title|text]]`, `[[Title#anchor|text]]`
    Link {
        title: String,
        anchor: Option<String>,
        text: Option<String>,
    },
}

impl Reference {
    /// Parse the text between `[[` and `]]`. Returns `None` for an empty
    /// target.
    pub fn parse(inner: &str) -> Option<Self> {
        let mut parts = split_args(inner).into_iter();
        let target = parts.next()?.trim();
        let args: Vec<String> = parts.map(str::to_string).collect();
        if target.is_empty() {
            return None;
        }

        let Some((prefix, rest)) = target.split_once(':') else {
            return Some(Self::link(target, args));
        };
        let title = rest.trim().to_string();
        let prefix = prefix.trim().to_ascii_lowercase();
        let known = matches!(
            prefix.as_str(),
            "template" | "t" | "include" | "i" | "v" | "video" | "image"
        );
        if known && title.is_empty() {
            return None;
        }
        Some(match prefix.as_str() {
            "template" | "t" => Self::Template(TemplateInvocation::new(title, args)),
            "include" | "i" => Self::Include { title },
            "v" | "video" => Self::Video { title, args },
            "image" => Self::Image { title, args },
            _ => Self::link(target, args),
        })
    }

    fn link(target: &str, args: Vec<String>) -> Self {
        let (title, anchor) = match target.split_once('#') {
            Some((title, anchor)) => (title.trim(), Some(anchor.trim().to_string())),
            None => (target, None),
        };
        let text = args
            .first()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty());
        Self::Link {
            title: title.to_string(),
            anchor,
            text,
        }
    }
}

/// Split reference content on `|`, ignoring pipes inside nested `[[ ]]`
/// references and `{{{ }}}` placeholders.
pub fn split_args(inner: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut links = 0usize;
    let mut placeholders = 0usize;
    let mut start = 0;
    let mut i = 0;

    while i < inner.len() {
        let rest = &inner[i..];
        if rest.starts_with("[[") {
            links += 1;
            i += 2;
        } else if rest.starts_with("]]") && links > 0 {
            links -= 1;
            i += 2;
        } else if rest.starts_with("{{{") {
            placeholders += 1;
            i += 3;
        } else if rest.starts_with("}}}") && placeholders > 0 {
            placeholders -= 1;
            i += 3;
        } else {
            if rest.starts_with('|') && links == 0 && placeholders == 0 {
                parts.push(&inner[start..i]);
                start = i + 1;
            }
            i += rest.chars().next().map_or(1, char::len_utf8);
        }
    }
    parts.push(&inner[start..]);
    parts
}

/// Find the `]]` closing a reference whose `[[` was just consumed. Returns
/// its byte offset in `after_open`.
fn find_close(after_open: &str) -> Option<usize> {
    let mut depth = 1usize;
    let mut i = 0;
    while i < after_open.len() {
        let rest = &after_open[i..];
        if rest.starts_with("[[") {
            depth += 1;
            i += 2;
        } else if rest.starts_with("]]") {
            depth -= 1;
            if depth == 0 {
                return Some(i);
            }
            i += 2;
        } else {
            i += rest.chars().next().map_or(1, char::len_utf8);
        }
    }
    None
}

/// HTML produced for one reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    pub html: String,
    /// Block fragments may not sit inside a paragraph.
    pub block: bool,
}

impl Fragment {
    pub fn inline(html: impl Into<String>) -> Self {
        Self {
            html: html.into(),
            block: false,
        }
    }

    pub fn block(html: impl Into<String>) -> Self {
        Self {
            html: html.into(),
            block: true,
        }
    }
}

/// Whether the end of `html` is inside an open `<p>`.
fn inside_paragraph(html: &str) -> bool {
    match (html.rfind("<p>"), html.rfind("</p>")) {
        (Some(open), Some(close)) => open > close,
        (Some(_), None) => true,
        _ => false,
    }
}

/// Replace every top-level reference in `html` with the fragment `expand`
/// returns for it.
///
/// A block fragment landing inside an open paragraph closes the paragraph
/// before itself and reopens one after. Unclosed `[[` and references that
/// do not parse are left as text.
pub fn replace_references(html: &str, mut expand: impl FnMut(&Reference) -> Fragment) -> String {
    let mut out = String::with_capacity(html.len());
    let mut rest = html;

    while let Some(start) = rest.find("[[") {
        out.push_str(&rest[..start]);
        let after_open = &rest[start + 2..];
        let Some(end) = find_close(after_open) else {
            out.push_str("[[");
            rest = after_open;
            continue;
        };
        let inner = &after_open[..end];
        match Reference::parse(inner) {
            Some(reference) => {
                let fragment = expand(&reference);
                if fragment.block && inside_paragraph(&out) {
                    out.push_str("</p>");
                    out.push_str(&fragment.html);
                    out.push_str("<p>");
                } else {
                    out.push_str(&fragment.html);
                }
            }
            None => {
                out.push_str("[[");
                out.push_str(inner);
                out.push_str("]]");
            }
        }
        rest = &after_open[end + 2..];
    }

    out.push_str(rest);
    out
}

/// Remove paragraphs left empty by block splicing.
pub fn drop_empty_paragraphs(html: &str) -> String {
    EMPTY_PARAGRAPH.replace_all(html, "").into_owned()
}

/// `key=value` arguments of a media reference.
pub fn named_arg<'a>(args: &'a [String], key: &str) -> Option<&'a str> {
    args.iter().find_map(|arg| {
        let (k, v) = arg.split_once('=')?;
        (k.trim() == key).then(|| v.trim())
    })
}

/// Find the document `title` for `locale`, falling back to the default
/// locale. Any revision counts, approved or not.
#[tracing::instrument(level = "debug", skip(source))]
pub fn resolve_include<S: ContentSource + ?Sized>(
    source: &S,
    title: &str,
    locale: &str,
    default_locale: &str,
) -> ResolvedReference {
    let title = title.trim();
    match find_document(source, title, locale, default_locale, |_| true) {
        Some((doc, found_in)) => ResolvedReference::Found {
            content: doc.content,
            locale: found_in,
        },
        None => ResolvedReference::NotFound {
            title: title.to_string(),
        },
    }
}

/// Resolve a video and render it. The content of a found reference is the
/// `<div class="video">` fragment.
#[tracing::instrument(level = "debug", skip(source))]
pub fn resolve_video<S: ContentSource + ?Sized>(
    source: &S,
    title: &str,
    locale: &str,
    default_locale: &str,
) -> ResolvedReference {
    let title = title.trim();
    match find_media(source, MediaKind::Video, title, locale, default_locale) {
        Some(asset) => ResolvedReference::Found {
            content: render_video(&asset, VideoSize::default()),
            locale: asset.locale,
        },
        None => ResolvedReference::NotFound {
            title: title.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::StoreBuilder;
    use pretty_assertions::assert_eq;

    fn echo(reference: &Reference) -> Fragment {
        match reference {
            Reference::Video { title, .. } => Fragment::block(format!("<div>{title}</div>")),
            other => Fragment::inline(format!("{other:?}")),
        }
    }

    #[test]
    fn parses_template_aliases() {
        let long = Reference::parse("Template:test|a|b=c").unwrap();
        let short = Reference::parse("T:test|a|b=c").unwrap();
        assert_eq!(long, short);
        assert_eq!(
            long,
            Reference::Template(TemplateInvocation::new(
                "test",
                vec!["a".into(), "b=c".into()]
            ))
        );
        let Reference::Template(invocation) = long else {
            panic!("expected a template reference");
        };
        assert_eq!(invocation.title(), "Template:test");
    }

    #[test]
    fn parses_include_and_video() {
        assert_eq!(
            Reference::parse("I:Test title").unwrap(),
            Reference::Include {
                title: "Test title".into()
            }
        );
        assert_eq!(
            Reference::parse("Include:Test title"),
            Reference::parse("I:Test title")
        );
        assert!(matches!(
            Reference::parse("V:Some title").unwrap(),
            Reference::Video { title, .. } if title == "Some title"
        ));
    }

    #[test]
    fn parses_links() {
        assert_eq!(
            Reference::parse("Installing Firefox#Windows|install it").unwrap(),
            Reference::Link {
                title: "Installing Firefox".into(),
                anchor: Some("Windows".into()),
                text: Some("install it".into())
            }
        );
        assert_eq!(
            Reference::parse("Help: the basics").unwrap(),
            Reference::Link {
                title: "Help: the basics".into(),
                anchor: None,
                text: None
            }
        );
    }

    #[test]
    fn empty_target_does_not_parse() {
        assert_eq!(Reference::parse(""), None);
        assert_eq!(Reference::parse("T:"), None);
    }

    #[test]
    fn args_ignore_nested_pipes() {
        assert_eq!(
            split_args("T:a|[[T:b|x|y]]|{{{1|d}}}|z"),
            vec!["T:a", "[[T:b|x|y]]", "{{{1|d}}}", "z"]
        );
    }

    #[test]
    fn nested_references_stay_in_parent() {
        let out = replace_references("a [[T:x|[[T:y]]]] b", echo);
        assert!(out.starts_with("a Template"));
        assert!(out.contains("[[T:y]]"));
        assert!(out.ends_with(" b"));
    }

    #[test]
    fn block_fragment_splits_paragraph() {
        let out = replace_references("<p>before [[V:clip]] after</p>", echo);
        assert_eq!(out, "<p>before </p><div>clip</div><p> after</p>");
    }

    #[test]
    fn block_fragment_outside_paragraph() {
        let out = replace_references("<p>x</p>[[V:clip]]", echo);
        assert_eq!(out, "<p>x</p><div>clip</div>");
    }

    #[test]
    fn unclosed_and_empty_are_literal() {
        assert_eq!(replace_references("a [[b", echo), "a [[b");
        assert_eq!(replace_references("a [[]] b", echo), "a [[]] b");
    }

    #[test]
    fn drops_empty_paragraphs() {
        assert_eq!(drop_empty_paragraphs("<p></p><div>v</div><p>\n</p>"), "<div>v</div>");
    }

    #[test]
    fn named_args() {
        let args = vec!["width=320".to_string(), " height = 240 ".to_string()];
        assert_eq!(named_arg(&args, "width"), Some("320"));
        assert_eq!(named_arg(&args, "height"), Some("240"));
        assert_eq!(named_arg(&args, "poster"), None);
    }

    #[test]
    fn include_falls_back_and_ignores_approval() {
        let store = StoreBuilder::new()
            .document("Test title", "en-US", "English content")
            .unapproved("Draft", "fr", "Brouillon")
            .build();
        assert_eq!(
            resolve_include(&store, "Test title", "fr", "en-US").content(),
            Some("English content")
        );
        assert_eq!(
            resolve_include(&store, "Draft", "fr", "en-US").content(),
            Some("Brouillon")
        );
        assert_eq!(
            resolve_include(&store, "Another title", "en-US", "en-US"),
            ResolvedReference::NotFound {
                title: "Another title".into()
            }
        );
    }

    #[test]
    fn video_resolves_with_fallback() {
        let store = StoreBuilder::new()
            .video("Some title", "en-US", Some("/v.webm"), Some("/v.ogv"), Some("/v.flv"))
            .build();
        let resolved = resolve_video(&store, "Some title", "fr", "en-US");
        let ResolvedReference::Found { content, locale } = resolved else {
            panic!("video should resolve");
        };
        assert_eq!(locale, "en-US");
        assert!(content.starts_with("<div class=\"video\"><video controls data-fallback=\"/v.flv\">"));
        assert_eq!(content.matches("<source").count(), 2);
    }

    #[test]
    fn missing_video() {
        let store = StoreBuilder::new().build();
        assert!(!resolve_video(&store, "Some title", "en-US", "en-US").is_found());
    }
}
