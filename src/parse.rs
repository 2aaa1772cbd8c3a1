//! Top-level markup driver.
//!
//! A render runs these passes in a fixed order:
//!
//! 1. `{for}` delimiters are swapped for placeholder tokens.
//! 2. Lines are structured into paragraphs, headings and lists.
//! 3. Directives (`{note}`, `{key}`, ...) are replaced.
//! 4. `[[...]]` references are resolved. Template and include bodies go
//!    through passes 1 to 4 again, one level deeper.
//! 5. Placeholder tokens become `<for>` tags, the tags are balanced and every
//!    `<for>` is rewritten into a `div` or `span`.
//!
//! Nothing in a render fails. Problems are repaired or replaced with a
//! message in place and reported in [`RenderResult::diagnostics`].

use tracing::{debug, warn};

use crate::balance::{TOKEN_MARK, TagBalancer, contains_block_level, strip_fors, unstrip_fors};
use crate::blocks::{self, HeadingIds};
use crate::config::ParserConfig;
use crate::directives;
use crate::error::{Diagnostic, Severity};
use crate::references::{
    self, Fragment, Reference, named_arg, resolve_include, resolve_video,
};
use crate::render_html::{ImageOptions, VideoSize, escape_text, render_image, render_link, render_video};
use crate::store::{ContentSource, MemoryStore, find_document, find_media};
use crate::template::{self, build_parameters, format_content};
use crate::types::{
    ForRegion, MarkupDocument, MediaKind, ReferenceKind, ResolvedReference, TemplateInvocation,
};

/// Output of [`WikiParser::render`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderResult {
    pub html: String,
    pub diagnostics: Vec<Diagnostic>,
}

impl RenderResult {
    /// Diagnostics of [`Severity::Error`].
    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == Severity::Error)
    }
}

/// Renders wiki markup against a content store.
///
/// A parser holds no per-render state, so one instance can serve many
/// threads at once when its store is `Sync`.
///
/// ```
/// use wiki_markup::{StoreBuilder, WikiParser};
///
/// let store = StoreBuilder::new()
///     .template("key", "en-US", "{key {{{1}}}}")
///     .build();
/// let parser = WikiParser::new(store);
/// assert_eq!(
///     parser.parse("Press [[T:key|Ctrl+C]].", "fr"),
///     "<p>Press <span class=\"key\">Ctrl</span> + <span class=\"key\">C</span>.</p>"
/// );
/// ```
#[derive(Debug, Clone)]
pub struct WikiParser<S> {
    source: S,
    config: ParserConfig,
}

impl<S: ContentSource> WikiParser<S> {
    pub fn new(source: S) -> Self {
        Self::with_config(source, ParserConfig::default())
    }

    pub fn with_config(source: S, config: ParserConfig) -> Self {
        Self { source, config }
    }

    pub fn config(&self) -> &ParserConfig {
        &self.config
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Render `markup` for `locale` and return only the HTML.
    pub fn parse(&self, markup: &str, locale: &str) -> String {
        self.render(&MarkupDocument::new(markup, locale)).html
    }

    /// Render a document, collecting diagnostics.
    #[tracing::instrument(skip_all, fields(locale = %doc.locale, len = doc.source.len()))]
    pub fn render(&self, doc: &MarkupDocument) -> RenderResult {
        let mut pass = Pass::new(&self.source, &self.config, &doc.locale);

        let input = strip_marks(&doc.source);
        let structured = pass.run(&input);
        let hydrated = unstrip_fors(&structured, &pass.regions);

        let mut tree = TagBalancer::parse(&hydrated);
        let displays = tree.expand_fors();
        for repair in tree.repairs() {
            pass.diagnostics.push(Diagnostic::malformed(repair.to_string()));
        }
        debug!(
            regions = displays.len(),
            repairs = tree.repairs().len(),
            diagnostics = pass.diagnostics.len(),
            "render finished"
        );

        RenderResult {
            html: tree.to_html().trim().to_string(),
            diagnostics: pass.diagnostics,
        }
    }

    /// Resolve `Template:<name>` for `locale` with default-locale fallback.
    pub fn resolve_template(&self, name: &str, locale: &str) -> ResolvedReference {
        template::resolve_template(&self.source, name, locale, &self.config.default_locale)
    }

    /// Resolve an included document for `locale` with default-locale fallback.
    pub fn resolve_include(&self, title: &str, locale: &str) -> ResolvedReference {
        resolve_include(&self.source, title, locale, &self.config.default_locale)
    }

    /// Resolve and render a video for `locale` with default-locale fallback.
    pub fn resolve_video(&self, title: &str, locale: &str) -> ResolvedReference {
        resolve_video(&self.source, title, locale, &self.config.default_locale)
    }
}

/// Render `markup` with no content store: every template, include and media
/// reference renders its not-found message.
pub fn parse(markup: &str, locale: &str) -> RenderResult {
    WikiParser::new(MemoryStore::new()).render(&MarkupDocument::new(markup, locale))
}

/// The placeholder mark may not appear in input text.
fn strip_marks(text: &str) -> String {
    text.chars().filter(|&c| c != TOKEN_MARK).collect()
}

// ------------------------------------------------------------------
// Pass state
// ------------------------------------------------------------------

/// State for one top-level render, shared by every nested expansion.
struct Pass<'a, S: ?Sized> {
    source: &'a S,
    config: &'a ParserConfig,
    locale: &'a str,
    regions: Vec<ForRegion>,
    headings: HeadingIds,
    /// Titles of the templates and includes currently being expanded.
    expanding: Vec<String>,
    diagnostics: Vec<Diagnostic>,
}

impl<'a, S: ContentSource + ?Sized> Pass<'a, S> {
    fn new(source: &'a S, config: &'a ParserConfig, locale: &'a str) -> Self {
        Self {
            source,
            config,
            locale,
            regions: Vec::new(),
            headings: HeadingIds::new(config.heading_id_prefix.clone()),
            expanding: Vec::new(),
            diagnostics: Vec::new(),
        }
    }

    /// Passes 1 to 4 over `text`.
    fn run(&mut self, text: &str) -> String {
        let stripped = strip_fors(text, self.regions.len());
        self.regions.extend(stripped.regions);

        let structured = blocks::structure(&stripped.text, &mut self.headings);
        let directed = directives::apply(&structured);
        let resolved = references::replace_references(&directed, |r| self.expand(r));
        debug!(depth = self.expanding.len(), regions = self.regions.len(), "pass complete");
        references::drop_empty_paragraphs(&resolved)
    }

    fn expand(&mut self, reference: &Reference) -> Fragment {
        match reference {
            Reference::Template(invocation) => self.expand_template(invocation),
            Reference::Include { title } => self.expand_include(title),
            Reference::Video { title, args } => self.expand_video(title, args),
            Reference::Image { title, args } => self.expand_image(title, args),
            Reference::Link {
                title,
                anchor,
                text,
            } => self.expand_link(title, anchor.as_deref(), text.as_deref()),
        }
    }

    fn expand_template(&mut self, invocation: &TemplateInvocation) -> Fragment {
        let name = invocation.name.as_str();
        let key = invocation.title();
        if let Some(cut) = self.guard(ReferenceKind::Template, &key, name) {
            return cut;
        }
        let resolved =
            template::resolve_template(self.source, name, self.locale, &self.config.default_locale);
        let ResolvedReference::Found { content, .. } = resolved else {
            return self.missing(ReferenceKind::Template, name);
        };
        let params = build_parameters(&invocation.args);
        if !params.is_empty() {
            debug!(template = %name, params = params.len(), "parameters bound");
        }
        let body = format_content(strip_marks(&content).trim_end(), &params);
        self.expand_body(key, &body)
    }

    fn expand_include(&mut self, title: &str) -> Fragment {
        if let Some(cut) = self.guard(ReferenceKind::Include, title, title) {
            return cut;
        }
        let resolved = resolve_include(self.source, title, self.locale, &self.config.default_locale);
        let ResolvedReference::Found { content, .. } = resolved else {
            return self.missing(ReferenceKind::Include, title);
        };
        let body = strip_marks(&content);
        self.expand_body(title.to_string(), body.trim_end())
    }

    /// Parse a template or include body one level deeper. Single-line bodies
    /// render inline, without paragraph tags, unless they produced a
    /// block-level element.
    fn expand_body(&mut self, key: String, body: &str) -> Fragment {
        self.expanding.push(key);
        let html = self.run(body);
        self.expanding.pop();

        if body.contains('\n') {
            return Fragment::block(html);
        }
        let unwrapped = html.replace("<p>", "").replace("</p>", "");
        if contains_block_level(&unwrapped) {
            Fragment::block(html)
        } else {
            Fragment::inline(unwrapped.trim().to_string())
        }
    }

    fn expand_video(&mut self, title: &str, args: &[String]) -> Fragment {
        let found = find_media(
            self.source,
            MediaKind::Video,
            title,
            self.locale,
            &self.config.default_locale,
        );
        let Some(asset) = found else {
            return self.missing(ReferenceKind::Video, title);
        };
        let size = VideoSize {
            width: named_arg(args, "width"),
            height: named_arg(args, "height"),
        };
        Fragment::block(render_video(&asset, size))
    }

    fn expand_image(&mut self, title: &str, args: &[String]) -> Fragment {
        let found = find_media(
            self.source,
            MediaKind::Image,
            title,
            self.locale,
            &self.config.default_locale,
        );
        let Some(url) = found.and_then(|asset| asset.url) else {
            return self.missing(ReferenceKind::Image, title);
        };
        let opts = ImageOptions {
            alt: args
                .iter()
                .map(|a| a.trim())
                .find(|a| !a.is_empty() && !a.contains('=')),
            width: named_arg(args, "width"),
            height: named_arg(args, "height"),
            title: named_arg(args, "title"),
        };
        Fragment::inline(render_image(&url, title, &opts))
    }

    fn expand_link(&mut self, title: &str, anchor: Option<&str>, text: Option<&str>) -> Fragment {
        let fragment = anchor
            .map(|a| format!("#{}", a.replace(' ', "_")))
            .unwrap_or_default();
        if title.is_empty() {
            let shown = text.or(anchor).unwrap_or_default();
            return Fragment::inline(render_link(&fragment, shown, true));
        }

        let exists = find_document(
            self.source,
            title,
            self.locale,
            &self.config.default_locale,
            |_| true,
        )
        .is_some();
        let href = format!("{}{fragment}", self.config.article_href(title, self.locale));
        Fragment::inline(render_link(&href, text.unwrap_or(title), exists))
    }

    /// Refuse an expansion that would revisit `key` or exceed the depth
    /// bound. Returns the message to render in its place.
    fn guard(&mut self, kind: ReferenceKind, key: &str, shown: &str) -> Option<Fragment> {
        let cycle = self.expanding.iter().any(|k| k == key);
        let depth = self.expanding.len();
        if !cycle && depth < self.config.max_depth {
            return None;
        }
        let reason = if cycle {
            "references itself"
        } else {
            "is nested too deeply"
        };
        warn!(%key, depth, reason, "expansion cut off");
        self.diagnostics.push(Diagnostic::recursion(format!(
            "{key} {reason} (depth {depth})"
        )));
        Some(Fragment::inline(kind.missing_message(&escape_text(shown))))
    }

    fn missing(&mut self, kind: ReferenceKind, title: &str) -> Fragment {
        let message = kind.missing_message(title);
        warn!(?kind, %title, "reference not found");
        self.diagnostics.push(Diagnostic::not_found(message));
        Fragment::inline(kind.missing_message(&escape_text(title)))
    }
}
