//! Fluent builder for assembling a [`MemoryStore`] in code.
//!
//! Handy for tests and for embedding a small fixed set of templates without
//! writing a YAML fixture.

use crate::store::MemoryStore;
use crate::types::{MediaAsset, MediaKind};

/// Fluent builder for [`MemoryStore`].
///
/// # Example
///
/// ```
/// use wiki_markup::builder::StoreBuilder;
/// use wiki_markup::ContentSource;
///
/// let store = StoreBuilder::new()
///     .template("note", "en-US", "{note}{{{1}}}{/note}")
///     .document("Install", "fr", "Contenu")
///     .build();
///
/// assert!(store.lookup_document("Template:note", "en-US").is_some());
/// assert!(store.lookup_document("Install", "fr").is_some());
/// ```
pub struct StoreBuilder {
    store: MemoryStore,
    default_locale: String,
}

impl Default for StoreBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl StoreBuilder {
    pub fn new() -> Self {
        StoreBuilder {
            store: MemoryStore::new(),
            default_locale: "en-US".to_string(),
        }
    }

    /// Locale used by the `*_default` shortcuts.
    pub fn locale(mut self, locale: &str) -> Self {
        self.default_locale = locale.to_string();
        self
    }

    // -- Documents ------------------------------------------------------

    /// Add an approved document.
    pub fn document(mut self, title: &str, locale: &str, content: &str) -> Self {
        self.store.insert_document(title, locale, content, true);
        self
    }

    /// Add a document whose only revision is not yet approved.
    pub fn unapproved(mut self, title: &str, locale: &str, content: &str) -> Self {
        self.store.insert_document(title, locale, content, false);
        self
    }

    /// Add an approved `Template:<name>` document.
    pub fn template(mut self, name: &str, locale: &str, content: &str) -> Self {
        self.store
            .insert_document(format!("Template:{name}"), locale, content, true);
        self
    }

    /// Add an approved template in the builder's locale.
    pub fn template_default(self, name: &str, content: &str) -> Self {
        let locale = self.default_locale.clone();
        self.template(name, &locale, content)
    }

    /// Add an approved document in the builder's locale.
    pub fn document_default(self, title: &str, content: &str) -> Self {
        let locale = self.default_locale.clone();
        self.document(title, &locale, content)
    }

    // -- Media ----------------------------------------------------------

    /// Add a video with its encoded formats. Pass `None` for formats the
    /// asset does not have.
    pub fn video(
        mut self,
        title: &str,
        locale: &str,
        webm: Option<&str>,
        ogv: Option<&str>,
        flv: Option<&str>,
    ) -> Self {
        let mut asset = MediaAsset::new(MediaKind::Video, title, locale);
        asset.webm = webm.map(str::to_string);
        asset.ogv = ogv.map(str::to_string);
        asset.flv = flv.map(str::to_string);
        self.store.insert_media(asset);
        self
    }

    pub fn image(mut self, title: &str, locale: &str, url: &str) -> Self {
        let mut asset = MediaAsset::new(MediaKind::Image, title, locale);
        asset.url = Some(url.to_string());
        self.store.insert_media(asset);
        self
    }

    /// Add a fully specified media asset.
    pub fn media(mut self, asset: MediaAsset) -> Self {
        self.store.insert_media(asset);
        self
    }

    pub fn build(self) -> MemoryStore {
        self.store
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::ContentSource;

    #[test]
    fn template_is_prefixed() {
        let store = StoreBuilder::new().template("test", "en-US", "x").build();
        assert!(store.lookup_document("Template:test", "en-US").is_some());
        assert!(store.lookup_document("test", "en-US").is_none());
    }

    #[test]
    fn unapproved_flag_is_kept() {
        let store = StoreBuilder::new().unapproved("Template:new", "en-US", "draft").build();
        let doc = store.lookup_document("Template:new", "en-US").unwrap();
        assert!(!doc.approved);
    }

    #[test]
    fn default_locale_shortcuts() {
        let store = StoreBuilder::new()
            .locale("fr")
            .template_default("t", "French")
            .document_default("D", "Doc")
            .build();
        assert!(store.lookup_document("Template:t", "fr").is_some());
        assert!(store.lookup_document("D", "fr").is_some());
    }

    #[test]
    fn media_assets() {
        let store = StoreBuilder::new()
            .video("Clip", "en-US", Some("/v.webm"), None, Some("/v.flv"))
            .image("Logo", "en-US", "/logo.png")
            .build();
        let clip = store.lookup_media(MediaKind::Video, "Clip", "en-US").unwrap();
        assert_eq!(clip.webm.as_deref(), Some("/v.webm"));
        assert_eq!(clip.ogv, None);
        assert_eq!(clip.flv.as_deref(), Some("/v.flv"));
        let logo = store.lookup_media(MediaKind::Image, "Logo", "en-US").unwrap();
        assert_eq!(logo.url.as_deref(), Some("/logo.png"));
    }
}
