//! HTML fragment rendering for resolved references.
//!
//! Everything here builds small HTML strings with `format!`. Values that come
//! from the store or from markup arguments are escaped; the surrounding wiki
//! text is not, since raw HTML is allowed in wiki markup.

use crate::types::MediaAsset;

/// Escape HTML special characters for use inside an attribute value.
pub fn escape_html(s: &str) -> String {
    let mut escaped = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Escape text content. Quotes are left alone so user-visible messages
/// read exactly as written.
pub fn escape_text(s: &str) -> String {
    let mut escaped = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Optional size overrides from `[[V:title|width=..|height=..]]`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VideoSize<'a> {
    pub width: Option<&'a str>,
    pub height: Option<&'a str>,
}

/// Render a video asset as a `<div class="video">` block.
///
/// Sources are emitted webm first, then ogg. The flash encoding is not a
/// `<source>`; it is referenced from `data-fallback` for players that need it.
pub fn render_video(asset: &MediaAsset, size: VideoSize<'_>) -> String {
    let mut attrs = String::from(" controls");
    if let Some(flv) = &asset.flv {
        attrs.push_str(&format!(" data-fallback=\"{}\"", escape_html(flv)));
    }
    if let Some(poster) = &asset.poster {
        attrs.push_str(&format!(" poster=\"{}\"", escape_html(poster)));
    }
    if let Some(width) = size.width {
        attrs.push_str(&format!(" width=\"{}\"", escape_html(width)));
    }
    if let Some(height) = size.height {
        attrs.push_str(&format!(" height=\"{}\"", escape_html(height)));
    }

    let mut sources = String::new();
    for (url, mime) in [(&asset.webm, "video/webm"), (&asset.ogv, "video/ogg")] {
        if let Some(url) = url {
            sources.push_str(&format!(
                "<source src=\"{}\" type=\"{mime}\">",
                escape_html(url)
            ));
        }
    }

    format!("<div class=\"video\"><video{attrs}>{sources}</video></div>")
}

/// Options parsed from `[[Image:title|alt|width=..|height=..|title=..]]`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImageOptions<'a> {
    pub alt: Option<&'a str>,
    pub width: Option<&'a str>,
    pub height: Option<&'a str>,
    pub title: Option<&'a str>,
}

/// Render an `<img>` for an image asset with a known URL.
pub fn render_image(url: &str, asset_title: &str, opts: &ImageOptions<'_>) -> String {
    let alt = opts.alt.unwrap_or(asset_title);
    let mut html = format!(
        "<img src=\"{}\" alt=\"{}\"",
        escape_html(url),
        escape_html(alt)
    );
    for (name, value) in [
        ("width", opts.width),
        ("height", opts.height),
        ("title", opts.title),
    ] {
        if let Some(value) = value {
            html.push_str(&format!(" {name}=\"{}\"", escape_html(value)));
        }
    }
    html.push('>');
    html
}

/// Render an internal article link. Links to missing articles get
/// `class="new"`.
pub fn render_link(href: &str, text: &str, exists: bool) -> String {
    let class = if exists { "" } else { " class=\"new\"" };
    format!("<a href=\"{}\"{class}>{text}</a>", escape_html(href))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::MediaKind;
    use pretty_assertions::assert_eq;

    fn clip() -> MediaAsset {
        let mut asset = MediaAsset::new(MediaKind::Video, "Some title", "en-US");
        asset.webm = Some("/media/test.webm".into());
        asset.ogv = Some("/media/test.ogv".into());
        asset.flv = Some("/media/test.flv".into());
        asset
    }

    #[test]
    fn escapes() {
        assert_eq!(escape_html("a<b>&\"c\""), "a&lt;b&gt;&amp;&quot;c&quot;");
        assert_eq!(escape_text("\"a\" & <b>"), "\"a\" &amp; &lt;b&gt;");
    }

    #[test]
    fn video_with_all_formats() {
        assert_eq!(
            render_video(&clip(), VideoSize::default()),
            "<div class=\"video\"><video controls data-fallback=\"/media/test.flv\">\
             <source src=\"/media/test.webm\" type=\"video/webm\">\
             <source src=\"/media/test.ogv\" type=\"video/ogg\"></video></div>"
        );
    }

    #[test]
    fn video_size_and_poster() {
        let mut asset = clip();
        asset.flv = None;
        asset.ogv = None;
        asset.poster = Some("/p.png".into());
        let size = VideoSize {
            width: Some("320"),
            height: None,
        };
        assert_eq!(
            render_video(&asset, size),
            "<div class=\"video\"><video controls poster=\"/p.png\" width=\"320\">\
             <source src=\"/media/test.webm\" type=\"video/webm\"></video></div>"
        );
    }

    #[test]
    fn image_defaults_alt_to_title() {
        let html = render_image("/img/logo.png", "Logo", &ImageOptions::default());
        assert_eq!(html, "<img src=\"/img/logo.png\" alt=\"Logo\">");
    }

    #[test]
    fn image_with_options() {
        let opts = ImageOptions {
            alt: Some("The \"logo\""),
            width: Some("40"),
            height: None,
            title: Some("Hover"),
        };
        assert_eq!(
            render_image("/l.png", "Logo", &opts),
            "<img src=\"/l.png\" alt=\"The &quot;logo&quot;\" width=\"40\" title=\"Hover\">"
        );
    }

    #[test]
    fn links() {
        assert_eq!(render_link("/en-US/kb/A", "A", true), "<a href=\"/en-US/kb/A\">A</a>");
        assert_eq!(
            render_link("/en-US/kb/B", "B", false),
            "<a href=\"/en-US/kb/B\" class=\"new\">B</a>"
        );
    }
}
