//! Read-only content lookups the parser depends on.
//!
//! The parser never talks to storage directly. It asks a [`ContentSource`]
//! for documents and media by exact title and locale; the locale fallback
//! policy lives in the resolvers, not in the store.

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::error::StoreError;
use crate::types::{DocumentContent, MediaAsset, MediaKind};

/// Lookup capabilities injected into [`crate::WikiParser`].
///
/// Implementations must be side-effect free from the parser's point of view.
pub trait ContentSource {
    /// The current revision of `title` in exactly `locale`, if any.
    fn lookup_document(&self, title: &str, locale: &str) -> Option<DocumentContent>;

    /// The media asset `title` of `kind` in exactly `locale`, if any.
    fn lookup_media(&self, kind: MediaKind, title: &str, locale: &str) -> Option<MediaAsset>;
}

impl<T: ContentSource + ?Sized> ContentSource for &T {
    fn lookup_document(&self, title: &str, locale: &str) -> Option<DocumentContent> {
        (**self).lookup_document(title, locale)
    }

    fn lookup_media(&self, kind: MediaKind, title: &str, locale: &str) -> Option<MediaAsset> {
        (**self).lookup_media(kind, title, locale)
    }
}

/// Locales to try for a lookup, in order: the requested one, then the
/// default when it differs.
pub(crate) fn fallback_locales<'a>(
    locale: &'a str,
    default_locale: &'a str,
) -> impl Iterator<Item = &'a str> {
    std::iter::once(locale).chain((default_locale != locale).then_some(default_locale))
}

/// Look up a document, falling back to `default_locale`. Returns the
/// document and the locale it was found in.
pub(crate) fn find_document<S: ContentSource + ?Sized>(
    source: &S,
    title: &str,
    locale: &str,
    default_locale: &str,
    accept: impl Fn(&DocumentContent) -> bool,
) -> Option<(DocumentContent, String)> {
    fallback_locales(locale, default_locale).find_map(|loc| {
        source
            .lookup_document(title, loc)
            .filter(|doc| accept(doc))
            .map(|doc| (doc, loc.to_string()))
    })
}

/// Look up a media asset, falling back to `default_locale`.
pub(crate) fn find_media<S: ContentSource + ?Sized>(
    source: &S,
    kind: MediaKind,
    title: &str,
    locale: &str,
    default_locale: &str,
) -> Option<MediaAsset> {
    fallback_locales(locale, default_locale)
        .find_map(|loc| source.lookup_media(kind, title, loc))
}

type DocKey = (String, String);
type MediaKey = (MediaKind, String, String);

/// An in-memory [`ContentSource`], keyed by `(locale, title)`.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    documents: BTreeMap<DocKey, DocumentContent>,
    media: BTreeMap<MediaKey, MediaAsset>,
}

/// On-disk fixture shape accepted by [`MemoryStore::from_yaml_str`] and
/// [`MemoryStore::from_json_str`].
#[derive(Debug, Deserialize)]
struct StoreFixture {
    #[serde(default)]
    documents: Vec<DocumentRecord>,
    #[serde(default)]
    media: Vec<MediaAsset>,
}

#[derive(Debug, Deserialize)]
struct DocumentRecord {
    title: String,
    locale: String,
    content: String,
    #[serde(default = "approved_default")]
    approved: bool,
}

fn approved_default() -> bool {
    true
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a store from YAML with `documents:` and `media:` lists.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, StoreError> {
        let fixture: StoreFixture = serde_yaml::from_str(yaml)?;
        Self::from_fixture(fixture)
    }

    /// Load a store from JSON with the same shape as the YAML form.
    pub fn from_json_str(json: &str) -> Result<Self, StoreError> {
        let fixture: StoreFixture = serde_json::from_str(json)?;
        Self::from_fixture(fixture)
    }

    fn from_fixture(fixture: StoreFixture) -> Result<Self, StoreError> {
        let mut store = Self::new();
        for record in fixture.documents {
            let key = (record.locale.clone(), record.title.clone());
            if store.documents.contains_key(&key) {
                return Err(StoreError::DuplicateDocument {
                    title: record.title,
                    locale: record.locale,
                });
            }
            store.documents.insert(
                key,
                DocumentContent {
                    content: record.content,
                    approved: record.approved,
                },
            );
        }
        for asset in fixture.media {
            store.insert_media(asset);
        }
        Ok(store)
    }

    /// Insert or replace a document revision.
    pub fn insert_document(
        &mut self,
        title: impl Into<String>,
        locale: impl Into<String>,
        content: impl Into<String>,
        approved: bool,
    ) -> &mut Self {
        self.documents.insert(
            (locale.into(), title.into()),
            DocumentContent {
                content: content.into(),
                approved,
            },
        );
        self
    }

    /// Insert or replace a media asset, keyed by its own kind, title and locale.
    pub fn insert_media(&mut self, asset: MediaAsset) -> &mut Self {
        self.media.insert(
            (asset.kind, asset.locale.clone(), asset.title.clone()),
            asset,
        );
        self
    }

    pub fn document_count(&self) -> usize {
        self.documents.len()
    }

    pub fn media_count(&self) -> usize {
        self.media.len()
    }
}

impl ContentSource for MemoryStore {
    fn lookup_document(&self, title: &str, locale: &str) -> Option<DocumentContent> {
        self.documents
            .get(&(locale.to_string(), title.to_string()))
            .cloned()
    }

    fn lookup_media(&self, kind: MediaKind, title: &str, locale: &str) -> Option<MediaAsset> {
        self.media
            .get(&(kind, locale.to_string(), title.to_string()))
            .cloned()
    }
}
