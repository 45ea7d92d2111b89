//! rekordbox document model
//!
//! The document has one `COLLECTION` holding every exported track once, and
//! a `PLAYLISTS` tree whose nodes only reference tracks by `TrackID`.
//! Playlists are merged one at a time; a track already in the collection is
//! referenced again but never re-added.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::track::{TrackId, TrackRecord};

/// `DJ_PLAYLISTS` version attribute
pub const DOCUMENT_VERSION: &str = "1.0.0";

/// Name of the playlist tree root node
pub const ROOT_NODE_NAME: &str = "ROOT";

/// `PRODUCT` header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Product {
    pub name: &'static str,
    pub version: &'static str,
    pub company: &'static str,
}

impl Product {
    pub const REKORDBOX: Product = Product {
        name: "rekordbox",
        version: "6.5.2",
        company: "AlphaTheta",
    };
}

/// Tracks already placed in the collection, by identifier.
///
/// First writer wins: once an identifier is in, later records with the same
/// identifier are ignored.
#[derive(Debug, Default)]
pub struct CollectionIndex {
    records: HashMap<TrackId, Arc<TrackRecord>>,
}

impl CollectionIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &TrackId) -> Option<&Arc<TrackRecord>> {
        self.records.get(id)
    }

    pub fn contains(&self, id: &TrackId) -> bool {
        self.records.contains_key(id)
    }

    /// Returns false if the identifier was already registered
    pub fn insert(&mut self, record: Arc<TrackRecord>) -> bool {
        if self.records.contains_key(&record.id) {
            return false;
        }
        self.records.insert(record.id.clone(), record);
        true
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// `COLLECTION` section
#[derive(Debug, Clone, Default)]
pub struct Collection {
    /// Declared `Entries`
    pub entries: usize,
    /// In order of first appearance
    pub tracks: Vec<Arc<TrackRecord>>,
}

/// Playlist `NODE` (Type 1)
#[derive(Debug, Clone, PartialEq)]
pub struct PlaylistNode {
    pub name: String,
    /// Declared `Entries`
    pub entries: usize,
    pub keys: Vec<TrackId>,
}

/// Root folder `NODE` (Type 0)
#[derive(Debug, Clone, PartialEq)]
pub struct PlaylistFolder {
    pub name: String,
    /// Declared `Count`
    pub count: usize,
    pub nodes: Vec<PlaylistNode>,
}

/// Complete `DJ_PLAYLISTS` document
#[derive(Debug, Clone)]
pub struct Document {
    pub version: &'static str,
    pub product: Product,
    pub collection: Collection,
    pub playlists: PlaylistFolder,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    pub fn new() -> Self {
        Self {
            version: DOCUMENT_VERSION,
            product: Product::REKORDBOX,
            collection: Collection::default(),
            playlists: PlaylistFolder {
                name: ROOT_NODE_NAME.to_string(),
                count: 0,
                nodes: Vec::new(),
            },
        }
    }

    /// Declared counts match children and every reference resolves
    pub fn is_consistent(&self) -> bool {
        let collection_ok = self.collection.entries == self.collection.tracks.len();
        let root_ok = self.playlists.count == self.playlists.nodes.len();
        let nodes_ok = self.playlists.nodes.iter().all(|node| {
            node.entries == node.keys.len()
                && node
                    .keys
                    .iter()
                    .all(|key| self.collection.tracks.iter().any(|t| &t.id == key))
        });
        collection_ok && root_ok && nodes_ok
    }
}

/// Merge one playlist into the document, creating the document if needed.
///
/// Every record gets a reference in a new playlist node, in the given order.
/// Records whose identifier is already in `index` are not added to the
/// collection again.
pub fn merge_playlist<I>(
    index: &mut CollectionIndex,
    document: Option<Document>,
    name: &str,
    records: I,
) -> Document
where
    I: IntoIterator<Item = Arc<TrackRecord>>,
{
    let mut document = document.unwrap_or_default();
    let mut node = PlaylistNode {
        name: name.to_string(),
        entries: 0,
        keys: Vec::new(),
    };

    for record in records {
        node.keys.push(record.id.clone());

        if index.contains(&record.id) {
            debug!("Track {} already in collection", record.id);
            continue;
        }
        document.collection.tracks.push(Arc::clone(&record));
        index.insert(record);
    }

    node.entries = node.keys.len();
    document.playlists.nodes.push(node);

    document.collection.entries = document.collection.tracks.len();
    document.playlists.count = document.playlists.nodes.len();

    document
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::track::{TrackContext, TrackId};

    fn record(library_id: i64, title: &str) -> Arc<TrackRecord> {
        Arc::new(TrackRecord {
            id: TrackId::from_library_id(library_id),
            context: TrackContext {
                library_id,
                title: title.to_string(),
                artist: String::new(),
                album: String::new(),
                genre: String::new(),
                duration: 200,
                sample_rate: 44_100,
                channels: 2,
                bpm: 124.0,
                location: format!("/music/{}.flac", library_id),
                key: None,
                rating: None,
                colour: None,
            },
            beat_grid: None,
            cue_points: Vec::new(),
        })
    }

    #[test]
    fn test_new_document_header() {
        let doc = merge_playlist(&mut CollectionIndex::new(), None, "Empty", Vec::new());
        assert_eq!(doc.version, "1.0.0");
        assert_eq!(doc.product, Product::REKORDBOX);
        assert_eq!(doc.playlists.name, "ROOT");
        assert_eq!(doc.playlists.count, 1);
        assert_eq!(doc.playlists.nodes[0].entries, 0);
        assert_eq!(doc.collection.entries, 0);
        assert!(doc.is_consistent());
    }

    #[test]
    fn test_dedup_across_playlists() {
        let mut index = CollectionIndex::new();
        let doc = merge_playlist(&mut index, None, "Warmup", vec![record(1, "One"), record(2, "Two")]);
        let doc = merge_playlist(&mut index, Some(doc), "Peak Time", vec![record(3, "Three"), record(1, "One")]);

        assert_eq!(doc.collection.tracks.len(), 3);
        assert_eq!(doc.collection.entries, 3);
        assert_eq!(index.len(), 3);

        let ids: Vec<&str> = doc.collection.tracks.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, ["0000000001", "0000000002", "0000000003"]);

        let peak = &doc.playlists.nodes[1];
        assert_eq!(peak.name, "Peak Time");
        assert_eq!(peak.entries, 2);
        assert_eq!(peak.keys[0].as_str(), "0000000003");
        assert_eq!(peak.keys[1].as_str(), "0000000001");
        assert_eq!(doc.playlists.count, 2);
        assert!(doc.is_consistent());
    }

    #[test]
    fn test_first_writer_wins() {
        let mut index = CollectionIndex::new();
        let doc = merge_playlist(&mut index, None, "A", vec![record(1, "Original")]);
        let doc = merge_playlist(&mut index, Some(doc), "B", vec![record(1, "Changed")]);

        assert_eq!(doc.collection.tracks.len(), 1);
        assert_eq!(doc.collection.tracks[0].context.title, "Original");
        assert_eq!(index.get(&TrackId::from_library_id(1)).unwrap().context.title, "Original");
        assert!(!index.insert(record(1, "Again")));
    }

    #[test]
    fn test_duplicate_within_playlist() {
        let mut index = CollectionIndex::new();
        let doc = merge_playlist(&mut index, None, "Loop", vec![record(4, "Four"), record(4, "Four")]);

        assert_eq!(doc.collection.entries, 1);
        assert_eq!(doc.playlists.nodes[0].entries, 2);
        assert!(doc.is_consistent());
    }

    #[test]
    fn test_inconsistent_document_detected() {
        let mut doc = merge_playlist(&mut CollectionIndex::new(), None, "A", vec![record(1, "One")]);
        doc.playlists.nodes[0].keys.push(TrackId::from_library_id(99));
        doc.playlists.nodes[0].entries += 1;
        assert!(!doc.is_consistent());
    }
}
