//! Per-run export state
//!
//! Owns everything that has to live across playlists: the offset resolver
//! and its warning batch, the identifier allocator, the collection index and
//! the document being built.

use std::sync::Arc;

use crate::collection::{merge_playlist, CollectionIndex, Document};
use crate::error::Result;
use crate::key::KeyNotation;
use crate::offset::{Mp3Decoder, OffsetResolver, OffsetWarning};
use crate::track::{RawTrack, TrackBuilder, TrackIdAllocator, TrackRecord};

pub struct ExportSession {
    offsets: OffsetResolver,
    ids: TrackIdAllocator,
    notation: KeyNotation,
    index: CollectionIndex,
    document: Option<Document>,
}

impl ExportSession {
    pub fn new(decoder: Mp3Decoder, notation: KeyNotation, ids: TrackIdAllocator) -> Self {
        Self {
            offsets: OffsetResolver::new(decoder),
            ids,
            notation,
            index: CollectionIndex::new(),
            document: None,
        }
    }

    /// Record already in the collection for this library row
    pub fn cached(&self, library_id: i64) -> Option<Arc<TrackRecord>> {
        let id = self.ids.lookup(library_id)?;
        self.index.get(id).cloned()
    }

    pub fn build(&mut self, raw: RawTrack) -> Result<Arc<TrackRecord>> {
        let mut builder = TrackBuilder::new(&mut self.offsets, &mut self.ids, self.notation);
        builder.build(raw).map(Arc::new)
    }

    /// Append a playlist node for `name` referencing `records` in order
    pub fn merge(&mut self, name: &str, records: Vec<Arc<TrackRecord>>) {
        let document = self.document.take();
        self.document = Some(merge_playlist(&mut self.index, document, name, records));
    }

    /// Offset warnings collected since the last call
    pub fn take_warnings(&mut self) -> Vec<OffsetWarning> {
        self.offsets.take_warnings()
    }

    pub fn index(&self) -> &CollectionIndex {
        &self.index
    }

    pub fn document(&self) -> Option<&Document> {
        self.document.as_ref()
    }

    /// The finished document, `None` if no playlist was merged
    pub fn finish(self) -> Option<Document> {
        self.document
    }
}
