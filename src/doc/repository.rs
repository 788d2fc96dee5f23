use std::collections::HashMap;
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::Mutex;

use chrono::Utc;
use tracing::{debug, warn};

use crate::doc::types::{BlockType, Document};
use crate::error::{Error, Result};
use crate::store::ContentStore;

/// The single aggregate key the whole document table lives under.
const DOCUMENTS_KEY: &str = "documents";

/// Fire-and-forget change signal. Carries no payload: consumers re-query
/// the repository rather than trusting an embedded diff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DocumentsChanged;

/// Load/save/delete over the content store, with the field-preservation
/// rules that keep partial writes from destroying data.
///
/// The whole table is one store entry, read-modify-written on every save,
/// so every write re-reads the table first; a save of one document can
/// never clobber concurrent in-process writes to other documents. The
/// store lock is held across the entire load-merge-save sequence, which
/// keeps it atomic on multi-threaded hosts.
pub struct DocumentRepository {
    store: Mutex<Box<dyn ContentStore>>,
    listeners: Mutex<Vec<Sender<DocumentsChanged>>>,
}

impl DocumentRepository {
    pub fn new(store: impl ContentStore + 'static) -> Self {
        Self {
            store: Mutex::new(Box::new(store)),
            listeners: Mutex::new(Vec::new()),
        }
    }

    /// Subscribe to change notifications. Every successful save or delete
    /// sends one `DocumentsChanged` to each live subscriber.
    pub fn subscribe(&self) -> Result<Receiver<DocumentsChanged>> {
        let (tx, rx) = channel();
        self.listeners.lock().map_err(|_| Error::Lock)?.push(tx);
        Ok(rx)
    }

    fn notify_changed(&self) {
        if let Ok(mut listeners) = self.listeners.lock() {
            listeners.retain(|tx| tx.send(DocumentsChanged).is_ok());
        }
    }

    fn parse_table(raw: Option<String>) -> HashMap<String, Document> {
        match raw {
            Some(json) => match serde_json::from_str(&json) {
                Ok(table) => table,
                Err(err) => {
                    // Historical behavior: a corrupt table reads as empty
                    // rather than blocking the app.
                    warn!(error = %err, "document table failed to parse, treating as empty");
                    HashMap::new()
                }
            },
            None => HashMap::new(),
        }
    }

    /// Every stored document, keyed by ID. Trashed documents are included;
    /// listing layers filter them out.
    pub fn load_all(&self) -> Result<HashMap<String, Document>> {
        let store = self.store.lock().map_err(|_| Error::Lock)?;
        Ok(Self::parse_table(store.get(DOCUMENTS_KEY)))
    }

    /// Read one document. A missing ID is `Ok(None)`, never an error.
    pub fn load(&self, id: &str) -> Result<Option<Document>> {
        Ok(self.load_all()?.remove(id))
    }

    /// Read a document, creating and persisting a default one when the ID
    /// is unknown (first navigation to a fresh URL).
    pub fn load_or_create(&self, id: &str) -> Result<Document> {
        if let Some(doc) = self.load(id)? {
            return Ok(doc);
        }
        let doc = Document::new(id);
        self.save(&doc)?;
        Ok(doc)
    }

    /// Merge `doc` into the stored record for `doc.id` and persist.
    ///
    /// Precedence rules:
    /// - `created` is pinned to the existing record's value;
    /// - `lastModified` is always refreshed to now;
    /// - `subdocuments`, `parentId`, `icon` and `cover` fall back to the
    ///   existing record when the incoming document omits them (`None`).
    ///   `Some(empty)` is an explicit clear and wins.
    ///
    /// Store failure (quota, I/O) propagates: a failed save must never
    /// look like a successful one.
    pub fn save(&self, doc: &Document) -> Result<Document> {
        let merged = {
            let mut store = self.store.lock().map_err(|_| Error::Lock)?;
            let mut table = Self::parse_table(store.get(DOCUMENTS_KEY));

            let mut merged = doc.clone();
            if let Some(existing) = table.get(&doc.id) {
                merged.created = existing.created;
                if merged.subdocuments.is_none() {
                    merged.subdocuments = existing.subdocuments.clone();
                }
                if merged.parent_id.is_none() {
                    merged.parent_id = existing.parent_id.clone();
                }
                if merged.icon.is_none() {
                    merged.icon = existing.icon.clone();
                }
                if merged.cover.is_none() {
                    merged.cover = existing.cover.clone();
                }
            }
            merged.last_modified = Utc::now();

            table.insert(merged.id.clone(), merged.clone());
            let raw = serde_json::to_string(&table)?;
            store.set(DOCUMENTS_KEY, &raw)?;
            merged
        };

        debug!(id = %merged.id, "document saved");
        self.notify_changed();
        Ok(merged)
    }

    /// Save an edited document, refusing to overwrite one that has been
    /// trashed out from under the editing session. The stored soft-delete
    /// state always wins over the caller's copy.
    ///
    /// Returns the document as persisted, or the stored record unchanged
    /// when the update was refused, or `None` when the ID no longer exists.
    pub fn update_document(&self, doc: &Document) -> Result<Option<Document>> {
        let Some(stored) = self.load(&doc.id)? else {
            return Ok(None);
        };
        if stored.is_deleted {
            return Ok(Some(stored));
        }
        let mut update = doc.clone();
        update.is_deleted = stored.is_deleted;
        update.deleted_at = stored.deleted_at;
        Ok(Some(self.save(&update)?))
    }

    /// Rename a document, keeping the title and the first heading block in
    /// sync within the same save.
    pub fn update_title(&self, id: &str, title: &str) -> Result<Option<Document>> {
        let Some(mut doc) = self.load(id)? else {
            return Ok(None);
        };
        if doc.is_deleted {
            return Ok(Some(doc));
        }
        doc.title = title.to_string();
        if let Some(first) = doc.blocks.first_mut() {
            if first.kind == BlockType::Heading1 {
                first.content = title.to_string();
            }
        }
        Ok(Some(self.save(&doc)?))
    }

    /// Remove a record unconditionally. Deleting an unknown ID is a no-op.
    pub fn delete(&self, id: &str) -> Result<()> {
        {
            let mut store = self.store.lock().map_err(|_| Error::Lock)?;
            let mut table = Self::parse_table(store.get(DOCUMENTS_KEY));
            if table.remove(id).is_none() {
                return Ok(());
            }
            let raw = serde_json::to_string(&table)?;
            store.set(DOCUMENTS_KEY, &raw)?;
        }
        debug!(id, "document deleted");
        self.notify_changed();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::doc::types::Block;
    use crate::store::MemoryStore;
    use chrono::{Duration, Utc};

    fn make_repo() -> DocumentRepository {
        DocumentRepository::new(MemoryStore::new())
    }

    fn make_doc(id: &str, title: &str) -> Document {
        Document::with_title(id, title)
    }

    #[test]
    fn load_missing_returns_none() {
        let repo = make_repo();
        assert!(repo.load("doc_missing").unwrap().is_none());
    }

    #[test]
    fn save_then_load_roundtrips() {
        let repo = make_repo();
        let doc = make_doc("doc_a", "Alpha");
        let saved = repo.save(&doc).unwrap();

        let loaded = repo.load("doc_a").unwrap().unwrap();
        assert_eq!(loaded, saved);
        assert_eq!(loaded.title, "Alpha");
        assert_eq!(loaded.blocks, doc.blocks);
    }

    #[test]
    fn created_is_pinned_across_saves() {
        let repo = make_repo();
        let first = repo.save(&make_doc("doc_a", "Alpha")).unwrap();

        // A later save supplying a different creation time must not win.
        let mut tampered = first.clone();
        tampered.created = Utc::now() + Duration::days(7);
        let second = repo.save(&tampered).unwrap();

        assert_eq!(second.created, first.created);
        assert!(second.last_modified >= first.last_modified);
    }

    #[test]
    fn omitted_fields_fall_back_to_stored_values() {
        let repo = make_repo();
        let mut doc = make_doc("doc_a", "Alpha");
        doc.icon = Some("🐇".to_string());
        doc.parent_id = Some("doc_parent".to_string());
        doc.subdocuments = Some(vec!["doc_child".to_string()]);
        repo.save(&doc).unwrap();

        // A partial update that omits icon/parent/subdocuments.
        let mut partial = make_doc("doc_a", "Alpha renamed");
        partial.icon = None;
        partial.parent_id = None;
        partial.subdocuments = None;
        let merged = repo.save(&partial).unwrap();

        assert_eq!(merged.icon.as_deref(), Some("🐇"));
        assert_eq!(merged.parent_id.as_deref(), Some("doc_parent"));
        assert_eq!(merged.subdocument_ids(), ["doc_child".to_string()]);
    }

    #[test]
    fn explicit_empty_subdocuments_clears_stored_list() {
        let repo = make_repo();
        let mut doc = make_doc("doc_a", "Alpha");
        doc.subdocuments = Some(vec!["doc_child".to_string()]);
        repo.save(&doc).unwrap();

        let mut cleared = doc.clone();
        cleared.subdocuments = Some(Vec::new());
        let merged = repo.save(&cleared).unwrap();
        assert_eq!(merged.subdocument_ids(), &[] as &[String]);
    }

    #[test]
    fn delete_is_idempotent() {
        let repo = make_repo();
        repo.save(&make_doc("doc_a", "Alpha")).unwrap();
        repo.delete("doc_a").unwrap();
        repo.delete("doc_a").unwrap();
        assert!(repo.load("doc_a").unwrap().is_none());
    }

    #[test]
    fn load_or_create_vivifies_default_document() {
        let repo = make_repo();
        let doc = repo.load_or_create("doc_from_url").unwrap();
        assert_eq!(doc.title, crate::doc::types::DEFAULT_TITLE);
        assert_eq!(doc.blocks.len(), 1);
        assert_eq!(doc.blocks[0].kind, BlockType::Heading1);
        // It was persisted, not just returned.
        assert!(repo.load("doc_from_url").unwrap().is_some());
    }

    #[test]
    fn load_or_create_keeps_existing_state_untouched() {
        let repo = make_repo();
        let mut doc = make_doc("doc_a", "Alpha");
        doc.blocks.push(Block::new("2", BlockType::Text, "body"));
        let saved = repo.save(&doc).unwrap();

        let loaded = repo.load_or_create("doc_a").unwrap();
        assert_eq!(loaded, saved);
    }

    #[test]
    fn update_document_refuses_trashed_record() {
        let repo = make_repo();
        let mut doc = repo.save(&make_doc("doc_a", "Alpha")).unwrap();
        doc.is_deleted = true;
        doc.deleted_at = Some(Utc::now());
        repo.save(&doc).unwrap();

        let mut edit = doc.clone();
        edit.is_deleted = false;
        edit.title = "Edited while trashed".to_string();
        let result = repo.update_document(&edit).unwrap().unwrap();

        assert!(result.is_deleted);
        assert_eq!(result.title, "Alpha");
    }

    #[test]
    fn update_title_syncs_first_heading_block() {
        let repo = make_repo();
        repo.save(&make_doc("doc_a", "Alpha")).unwrap();

        let renamed = repo.update_title("doc_a", "Beta").unwrap().unwrap();
        assert_eq!(renamed.title, "Beta");
        assert_eq!(renamed.blocks[0].content, "Beta");
    }

    #[test]
    fn corrupt_table_reads_as_empty() {
        let mut store = MemoryStore::new();
        store.set(DOCUMENTS_KEY, "this is not json").unwrap();
        let repo = DocumentRepository::new(store);
        assert!(repo.load_all().unwrap().is_empty());
    }

    #[test]
    fn quota_failure_propagates_from_save() {
        let repo = DocumentRepository::new(MemoryStore::with_capacity(32));
        let err = repo.save(&make_doc("doc_a", "Alpha")).unwrap_err();
        assert!(matches!(err, Error::CapacityExceeded { .. }));
    }

    #[test]
    fn listeners_hear_saves_and_deletes() {
        let repo = make_repo();
        let rx = repo.subscribe().unwrap();

        repo.save(&make_doc("doc_a", "Alpha")).unwrap();
        assert_eq!(rx.try_recv().unwrap(), DocumentsChanged);

        repo.delete("doc_a").unwrap();
        assert_eq!(rx.try_recv().unwrap(), DocumentsChanged);

        // Deleting a missing ID changes nothing and signals nothing.
        repo.delete("doc_a").unwrap();
        assert!(rx.try_recv().is_err());
    }
}
