//! Integration tests that render markup end-to-end against fixture stores.

use pretty_assertions::assert_eq;
use wiki_markup::{
    DiagnosticKind, MarkupDocument, MemoryStore, ParserConfig, ResolvedReference, Severity,
    WikiParser,
};

fn fixtures_dir() -> std::path::PathBuf {
    std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

fn read_fixture(name: &str) -> String {
    let path = fixtures_dir().join(name);
    std::fs::read_to_string(&path)
        .unwrap_or_else(|e| panic!("Failed to read fixture '{}': {}", path.display(), e))
}

fn parser() -> WikiParser<MemoryStore> {
    let store = MemoryStore::from_yaml_str(&read_fixture("store.yaml")).expect("store fixture loads");
    WikiParser::new(store)
}

fn flat(html: &str) -> String {
    html.replace('\n', "")
}

// ------------------------------------------------------------------
// Templates
// ------------------------------------------------------------------

#[test]
fn template_renders_content() {
    assert_eq!(parser().parse("[[Template:test]]", "en-US"), "<p>Test content</p>");
}

#[test]
fn template_locale_and_fallback() {
    let p = parser();
    assert_eq!(p.parse("[[T:locale]]", "en-US"), "<p>English content</p>");
    assert_eq!(p.parse("[[T:locale]]", "fr"), "<p>French content</p>");
    assert_eq!(p.parse("[[T:locale]]", "de"), "<p>English content</p>");
}

#[test]
fn template_missing_and_unapproved() {
    let p = parser();
    assert_eq!(
        p.parse("[[T:missing]]", "en-US"),
        "<p>The template \"missing\" does not exist or has no approved revision.</p>"
    );
    assert_eq!(
        p.parse("[[Template:new]]", "en-US"),
        "<p>The template \"new\" does not exist or has no approved revision.</p>"
    );
    assert_eq!(
        p.resolve_template("new", "en-US"),
        ResolvedReference::NotApproved { title: "new".into() }
    );
}

#[test]
fn template_params() {
    let p = parser();
    assert_eq!(p.parse("[[T:params|one|two]]", "en-US"), "<p>one:two</p>");
    assert_eq!(p.parse("[[T:params|two|one]]", "en-US"), "<p>two:one</p>");
    assert_eq!(p.parse("[[T:params|2=one|1=two]]", "en-US"), "<p>two:one</p>");
    assert_eq!(p.parse("[[T:params|2=two|1=one]]", "en-US"), "<p>one:two</p>");
    assert_eq!(p.parse("[[T:params|2=one|two]]", "en-US"), "<p>two:one</p>");
}

#[test]
fn template_body_wiki_markup() {
    let html = parser().parse("[[Template:markup|2=one|1=two]]", "en-US");
    assert_eq!(
        flat(&html),
        "<p>two:one<em>wiki</em><strong>markup</strong></p>"
    );
}

#[test]
fn template_args_inline_markup() {
    let html = parser().parse("[[Template:paragraphs|'''one'''|''two'']]", "en-US");
    assert_eq!(flat(&html), "<p><strong>one</strong></p><p><em>two</em></p>");
}

#[test]
fn template_args_block_markup_in_own_paragraph() {
    let html = parser().parse("[[Template:paragraphs|* ordered|# list]]", "en-US");
    assert_eq!(
        flat(&html),
        "<ul><li> ordered</li></ul><ol><li> list</li></ol>"
    );
}

#[test]
fn template_args_keep_outer_regions() {
    assert_eq!(
        parser().parse("[[T:params|{for mac}a{/for}|b]]", "en-US"),
        "<p><span class=\"for\" data-for=\"mac\">a</span>:b</p>"
    );
}

#[test]
fn template_body_with_note_and_region() {
    let html = parser().parse("[[T:os note|linux]]", "en-US");
    assert_eq!(
        flat(&html),
        "<div class=\"note\"><p><span class=\"for\" data-for=\"linux\">Only on linux.</span></p></div>"
    );
}

// ------------------------------------------------------------------
// Includes and media
// ------------------------------------------------------------------

#[test]
fn include_renders_document() {
    let p = parser();
    assert_eq!(p.parse("[[Include:Test title]]", "en-US"), "<p>Test content</p>");
    assert_eq!(
        p.parse("[[I:Another title]]", "en-US"),
        "<p>The document \"Another title\" does not exist.</p>"
    );
}

#[test]
fn include_locale_fallback() {
    let p = parser();
    assert_eq!(p.parse("[[I:Localized]]", "fr"), "<p>French content</p>");
    assert_eq!(p.parse("[[I:Localized]]", "ja"), "<p>English content</p>");
    assert_eq!(p.parse("[[I:Test title]]", "fr"), "<p>Test content</p>");
}

#[test]
fn video_english_and_fallback() {
    let want = "<div class=\"video\"><video controls \
                data-fallback=\"/uploads/gallery/videos/test.flv\" \
                poster=\"/uploads/gallery/videos/test.png\">\
                <source src=\"/uploads/gallery/videos/test.webm\" type=\"video/webm\">\
                <source src=\"/uploads/gallery/videos/test.ogv\" type=\"video/ogg\">\
                </video></div>";
    let p = parser();
    assert_eq!(p.parse("[[V:Some title]]", "en-US"), want);
    assert_eq!(p.parse("[[V:Some title]]", "fr"), want);
    assert!(p.resolve_video("Some title", "fr").is_found());
}

#[test]
fn video_missing() {
    let result = parser().render(&MarkupDocument::new("[[V:Nothing]]", "en-US"));
    assert_eq!(result.html, "<p>The video \"Nothing\" does not exist.</p>");
    assert_eq!(result.diagnostics[0].kind, DiagnosticKind::ReferenceNotFound);
    assert_eq!(result.diagnostics[0].severity, Severity::Warning);
}

// ------------------------------------------------------------------
// Directives mixed with links and formatting
// ------------------------------------------------------------------

#[test]
fn general_warning_note() {
    let html = parser().parse(
        "\n\n{warning}\n\nthis is a warning\n\n{note}this is a note{warning}!{/warning}{/note}\
         [[Installing Firefox]] '''internal''' ''link''{/warning}\n\n",
        "en-US",
    );
    assert_eq!(
        flat(&html),
        "<div class=\"warning\"><p>this is a warning</p>\
         <div class=\"note\">this is a note<div class=\"warning\">!</div></div>\
         <a href=\"/en-US/kb/Installing+Firefox\">Installing Firefox</a> \
         <strong>internal</strong> <em>link</em></div>"
    );
}

#[test]
fn warning_note_inline_custom() {
    let html = parser().parse(
        "\n\n{warning}\n\nthis is a {button warning}\n{note}this is a {menu note}\
         {warning}!{/warning}{/note}'''{filepath internal}''' ''{menu hi!}''{/warning}",
        "en-US",
    );
    let html = flat(&html);
    assert!(html.contains("<p>this is a <span class=\"button\">warning</span></p>"));
    assert!(html.contains(
        "<div class=\"note\">this is a <span class=\"menu\">note</span><div class=\"warning\">!</div></div>"
    ));
    assert!(html.contains("<strong><span class=\"filepath\">internal</span></strong>"));
    assert!(html.contains("<em><span class=\"menu\">hi!</span></em>"));
}

// ------------------------------------------------------------------
// Whole articles
// ------------------------------------------------------------------

#[test]
fn article_fixture_renders() {
    let doc = MarkupDocument::new(read_fixture("article.wiki"), "en-US");
    let result = parser().render(&doc);

    let problems: Vec<_> = result
        .diagnostics
        .iter()
        .filter(|d| d.severity >= Severity::Warning)
        .collect();
    assert!(problems.is_empty(), "Unexpected diagnostics: {problems:?}");

    let html = flat(&result.html);
    for fragment in [
        "<h1 id=\"w_installing_firefox\">Installing Firefox</h1>",
        "<div class=\"for\" data-for=\"win\"><p>Download the installer and run it.</p></div>",
        "<div class=\"for\" data-for=\"mac\"><p>Drag Firefox to the <em>Applications</em> folder.</p></div>",
        "<h2 id=\"w_keyboard_shortcuts\">Keyboard shortcuts</h2>",
        "<li> Quit: <span class=\"key\">Ctrl</span> + <span class=\"key\">Q</span></li>",
        "<div class=\"note\">Read <a href=\"/en-US/kb/Installing+Firefox\">this article</a> first.</div>",
        "<span class=\"for\" data-for=\"linux\">Only on linux.</span>",
        "width=\"320\"",
        "<p><img src=\"/uploads/gallery/images/firefox.png\" alt=\"Firefox\"></p>",
        "<hr>",
        "<p>See <a href=\"http://mozilla.org\" rel=\"nofollow\">Mozilla</a>.</p>",
    ] {
        assert!(html.contains(fragment), "missing {fragment:?} in {html}");
    }
    assert!(!html.contains('\u{7}'));
}

#[test]
fn config_fixture_applies() {
    let config = ParserConfig::from_yaml_str(&read_fixture("config.yaml")).expect("config loads");
    assert_eq!(config.max_depth, 4);
    let store = MemoryStore::from_yaml_str(&read_fixture("store.yaml")).expect("store loads");
    let p = WikiParser::with_config(store, config.with_default_locale("fr"));
    assert_eq!(p.config().default_locale, "fr");
    assert_eq!(p.config().max_depth, 4);
    assert_eq!(p.source().media_count(), 2);
    // French is now the fallback for every other locale.
    assert_eq!(p.parse("[[T:locale]]", "de"), "<p>French content</p>");
}

#[test]
fn json_store() {
    let store = MemoryStore::from_json_str(
        r#"{"documents":[{"title":"Template:hi","locale":"en-US","content":"Hello {{{name|there}}}"}]}"#,
    )
    .expect("json store loads");
    let p = WikiParser::new(store);
    assert_eq!(p.parse("[[T:hi]]", "en-US"), "<p>Hello there</p>");
    assert_eq!(p.parse("[[T:hi|name=Ann]]", "en-US"), "<p>Hello Ann</p>");
}

#[test]
fn concurrent_renders_are_independent() {
    let p = parser();
    let markup = read_fixture("article.wiki");
    let expected = p.parse(&markup, "en-US");

    std::thread::scope(|s| {
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let (p, markup) = (&p, &markup);
                s.spawn(move || {
                    let locale = if i % 2 == 0 { "en-US" } else { "fr" };
                    (locale, p.parse(markup, locale))
                })
            })
            .collect();
        for handle in handles {
            let (locale, html) = handle.join().expect("render thread panicked");
            if locale == "en-US" {
                assert_eq!(html, expected);
            } else {
                assert!(html.contains("<div class=\"video\">"));
            }
        }
    });
}
