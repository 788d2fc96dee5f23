//! Document tree and lifecycle management.
//!
//! Keeps the parent/child graph and the soft-delete set mutually
//! consistent: subdocument creation writes both sides of the link and
//! verifies them, trashing detaches a child from its parent's ID list,
//! and root listing double-checks links rather than trusting them.

use std::collections::{HashMap, HashSet};

use chrono::Utc;

use crate::blocks;
use crate::doc::repository::DocumentRepository;
use crate::doc::types::{
    generate_document_id, next_block_id, Block, BlockType, Document, NEW_SUBDOCUMENT_TITLE,
};
use crate::error::{Error, Result};

/// Lifecycle operations over the repository's parent/child graph.
pub struct DocumentTree<'r> {
    repo: &'r DocumentRepository,
}

impl<'r> DocumentTree<'r> {
    pub fn new(repo: &'r DocumentRepository) -> Self {
        Self { repo }
    }

    // ==================== Subdocument Creation ====================

    /// Allocate and persist a fresh child document linked to `parent_id`.
    fn spawn_child(&self, parent_id: &str, title: Option<&str>) -> Result<Document> {
        let title = title.unwrap_or(NEW_SUBDOCUMENT_TITLE);
        let mut child = Document::with_title(generate_document_id(), title);
        child.parent_id = Some(parent_id.to_string());
        child.subdocuments = Some(Vec::new());
        self.repo.save(&child)
    }

    /// Persist the parent with `updated_blocks` and the child appended to
    /// its subdocument list, then verify both records read back. Partial
    /// failure is detectable: verification failing surfaces as an error
    /// instead of a dangling link discovered later.
    fn attach_child(
        &self,
        parent_id: &str,
        updated_blocks: Vec<Block>,
        child_id: &str,
    ) -> Result<()> {
        let mut parent = self.repo.load(parent_id)?.ok_or(Error::MissingDocument {
            id: parent_id.to_string(),
        })?;
        let mut children = parent.subdocuments.take().unwrap_or_default();
        children.push(child_id.to_string());
        parent.subdocuments = Some(children);
        parent.blocks = updated_blocks;
        self.repo.save(&parent)?;

        for id in [parent_id, child_id] {
            if self.repo.load(id)?.is_none() {
                return Err(Error::MissingDocument { id: id.to_string() });
            }
        }
        Ok(())
    }

    /// Create a subdocument and append a referencing block at the end of
    /// the parent's stored block sequence. `title` defaults when absent.
    /// Returns the new document's ID.
    pub fn create_subdocument(&self, parent_id: &str, title: Option<&str>) -> Result<String> {
        let parent = self.repo.load(parent_id)?.ok_or(Error::MissingDocument {
            id: parent_id.to_string(),
        })?;
        let child = self.spawn_child(parent_id, title)?;

        let mut updated = parent.blocks.clone();
        updated.push(Block::new(next_block_id(), BlockType::Subdocument, &child.id));
        self.attach_child(parent_id, updated, &child.id)?;
        Ok(child.id)
    }

    /// Create a subdocument and insert its referencing block immediately
    /// after `anchor_id` in the caller's working sequence. Returns the
    /// updated sequence and the new document's ID.
    pub fn insert_subdocument_block(
        &self,
        parent_id: &str,
        working_blocks: &[Block],
        anchor_id: &str,
    ) -> Result<(Vec<Block>, String)> {
        let child = self.spawn_child(parent_id, None)?;
        let (updated, _) =
            blocks::insert_after(working_blocks, anchor_id, BlockType::Subdocument, &child.id);
        self.attach_child(parent_id, updated.clone(), &child.id)?;
        Ok((updated, child.id))
    }

    /// Create a subdocument by converting an existing block in place: the
    /// block's type becomes `subdocument` and its content becomes the new
    /// document's ID (the command-palette path).
    pub fn convert_block_to_subdocument(
        &self,
        parent_id: &str,
        working_blocks: &[Block],
        block_id: &str,
    ) -> Result<(Vec<Block>, String)> {
        let child = self.spawn_child(parent_id, None)?;
        let updated: Vec<Block> = working_blocks
            .iter()
            .map(|b| {
                if b.id == block_id {
                    let mut converted = b.clone();
                    converted.kind = BlockType::Subdocument;
                    converted.content = child.id.clone();
                    converted
                } else {
                    b.clone()
                }
            })
            .collect();
        self.attach_child(parent_id, updated.clone(), &child.id)?;
        Ok((updated, child.id))
    }

    // ==================== Trash Lifecycle ====================

    /// Soft-delete a document. A subdocument is also detached from its
    /// parent's child list, but the parent's referencing block stays and
    /// renders as "not found" until the document is restored or the block
    /// removed.
    ///
    /// Returns the ID to redirect to: the most-recently-modified remaining
    /// non-deleted root document, if any.
    pub fn move_to_trash(&self, doc_id: &str) -> Result<Option<String>> {
        let Some(mut doc) = self.repo.load(doc_id)? else {
            return Ok(None);
        };
        doc.is_deleted = true;
        doc.deleted_at = Some(Utc::now());
        self.repo.save(&doc)?;

        if let Some(parent_id) = doc.parent_id.as_deref() {
            if let Some(mut parent) = self.repo.load(parent_id)? {
                let children: Vec<String> = parent
                    .subdocument_ids()
                    .iter()
                    .filter(|id| *id != doc_id)
                    .cloned()
                    .collect();
                parent.subdocuments = Some(children);
                self.repo.save(&parent)?;
            }
        }

        self.find_next_parent(doc_id)
    }

    /// Bring a trashed document back.
    pub fn restore(&self, doc_id: &str) -> Result<()> {
        let Some(mut doc) = self.repo.load(doc_id)? else {
            return Ok(());
        };
        doc.is_deleted = false;
        doc.deleted_at = None;
        self.repo.save(&doc)?;
        Ok(())
    }

    /// Remove a record entirely. Irreversible.
    pub fn permanently_delete(&self, doc_id: &str) -> Result<()> {
        self.repo.delete(doc_id)
    }

    /// Permanently delete every currently-trashed document.
    pub fn empty_trash(&self) -> Result<usize> {
        let trashed = self.trashed_documents()?;
        for doc in &trashed {
            self.repo.delete(&doc.id)?;
        }
        Ok(trashed.len())
    }

    /// All trashed documents, most recently deleted first.
    pub fn trashed_documents(&self) -> Result<Vec<Document>> {
        let mut docs: Vec<Document> = self
            .repo
            .load_all()?
            .into_values()
            .filter(|doc| doc.is_deleted)
            .collect();
        docs.sort_by(|a, b| b.deleted_at.cmp(&a.deleted_at));
        Ok(docs)
    }

    pub fn trash_count(&self) -> Result<usize> {
        Ok(self
            .repo
            .load_all()?
            .values()
            .filter(|doc| doc.is_deleted)
            .count())
    }

    // ==================== Permanent Deletion With Links ====================

    /// Permanently delete a subdocument and scrub the parent: the child
    /// leaves the parent's ID list *and* the referencing block is removed
    /// from the parent's sequence. Returns the parent's ID as the
    /// redirect target, or `None` when the document has no parent.
    pub fn delete_subdocument(&self, doc_id: &str) -> Result<Option<String>> {
        let Some(doc) = self.repo.load(doc_id)? else {
            return Ok(None);
        };
        let Some(parent_id) = doc.parent_id.as_deref() else {
            return Ok(None);
        };
        let Some(mut parent) = self.repo.load(parent_id)? else {
            return Ok(None);
        };

        let children: Vec<String> = parent
            .subdocument_ids()
            .iter()
            .filter(|id| *id != doc_id)
            .cloned()
            .collect();
        parent.subdocuments = Some(children);
        parent.blocks.retain(|b| {
            !(b.kind == BlockType::Subdocument && b.content == doc_id)
        });
        self.repo.save(&parent)?;
        self.repo.delete(doc_id)?;
        Ok(Some(parent.id))
    }

    /// Permanently delete a document and every recursive descendant.
    /// Returns the redirect target computed before deletion.
    pub fn delete_with_children(&self, doc_id: &str) -> Result<Option<String>> {
        let table = self.repo.load_all()?;
        for id in all_subdocuments(&table, doc_id) {
            self.repo.delete(&id)?;
        }
        self.repo.delete(doc_id)?;
        Ok(next_parent_in(&table, doc_id))
    }

    // ==================== Listing & Search ====================

    /// Documents shown at the top level of the sidebar: no parent link,
    /// not referenced by any other document's child list (defensive
    /// double-check against inconsistent links), and not trashed. Most
    /// recently modified first.
    pub fn root_documents(&self) -> Result<Vec<Document>> {
        let table = self.repo.load_all()?;
        let referenced: HashSet<&String> = table
            .values()
            .flat_map(|doc| doc.subdocument_ids())
            .collect();

        let mut roots: Vec<Document> = table
            .values()
            .filter(|doc| {
                doc.parent_id.is_none() && !doc.is_deleted && !referenced.contains(&doc.id)
            })
            .cloned()
            .collect();
        roots.sort_by(|a, b| b.last_modified.cmp(&a.last_modified));
        Ok(roots)
    }

    /// The most-recently-modified non-deleted root other than `excluding`.
    pub fn find_next_parent(&self, excluding: &str) -> Result<Option<String>> {
        Ok(next_parent_in(&self.repo.load_all()?, excluding))
    }

    /// Recursive descendant IDs of `doc_id`, parents before their children.
    pub fn all_subdocuments(&self, doc_id: &str) -> Result<Vec<String>> {
        Ok(all_subdocuments(&self.repo.load_all()?, doc_id))
    }

    /// Case-insensitive title search over non-deleted roots. A root
    /// matches when its own title or any descendant's title contains the
    /// query. A blank query matches nothing.
    pub fn search(&self, query: &str) -> Result<Vec<Document>> {
        let term = query.trim().to_lowercase();
        if term.is_empty() {
            return Ok(Vec::new());
        }
        let table = self.repo.load_all()?;
        let mut results: Vec<Document> = table
            .values()
            .filter(|doc| {
                doc.parent_id.is_none()
                    && !doc.is_deleted
                    && title_matches(&table, doc, &term, &mut HashSet::new())
            })
            .cloned()
            .collect();
        results.sort_by(|a, b| b.last_modified.cmp(&a.last_modified));
        Ok(results)
    }
}

fn next_parent_in(table: &HashMap<String, Document>, excluding: &str) -> Option<String> {
    table
        .values()
        .filter(|doc| doc.parent_id.is_none() && !doc.is_deleted && doc.id != excluding)
        .max_by_key(|doc| doc.last_modified)
        .map(|doc| doc.id.clone())
}

fn all_subdocuments(table: &HashMap<String, Document>, doc_id: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut visited = HashSet::new();
    collect_subdocuments(table, doc_id, &mut out, &mut visited);
    out
}

fn collect_subdocuments(
    table: &HashMap<String, Document>,
    doc_id: &str,
    out: &mut Vec<String>,
    visited: &mut HashSet<String>,
) {
    if !visited.insert(doc_id.to_string()) {
        return;
    }
    let Some(doc) = table.get(doc_id) else {
        return;
    };
    for child_id in doc.subdocument_ids() {
        out.push(child_id.clone());
        collect_subdocuments(table, child_id, out, visited);
    }
}

fn title_matches(
    table: &HashMap<String, Document>,
    doc: &Document,
    term: &str,
    visited: &mut HashSet<String>,
) -> bool {
    if !visited.insert(doc.id.clone()) {
        return false;
    }
    if doc.title.to_lowercase().contains(term) {
        return true;
    }
    doc.subdocument_ids().iter().any(|child_id| {
        table
            .get(child_id)
            .is_some_and(|child| title_matches(table, child, term, visited))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn make_repo() -> DocumentRepository {
        DocumentRepository::new(MemoryStore::new())
    }

    fn save_root(repo: &DocumentRepository, id: &str, title: &str) -> Document {
        repo.save(&Document::with_title(id, title)).unwrap()
    }

    #[test]
    fn create_subdocument_links_both_sides() {
        let repo = make_repo();
        let tree = DocumentTree::new(&repo);
        save_root(&repo, "doc_p", "Parent");

        let child_id = tree.create_subdocument("doc_p", None).unwrap();

        let parent = repo.load("doc_p").unwrap().unwrap();
        let child = repo.load(&child_id).unwrap().unwrap();
        assert_eq!(parent.subdocument_ids(), [child_id.clone()]);
        assert_eq!(child.parent_id.as_deref(), Some("doc_p"));
        assert_eq!(child.title, NEW_SUBDOCUMENT_TITLE);

        let reference = parent.blocks.last().unwrap();
        assert_eq!(reference.kind, BlockType::Subdocument);
        assert_eq!(reference.content, child_id);
    }

    #[test]
    fn create_subdocument_accepts_custom_title() {
        let repo = make_repo();
        let tree = DocumentTree::new(&repo);
        save_root(&repo, "doc_p", "Parent");

        let child_id = tree.create_subdocument("doc_p", Some("Meeting notes")).unwrap();

        let child = repo.load(&child_id).unwrap().unwrap();
        assert_eq!(child.title, "Meeting notes");
        assert_eq!(child.blocks[0].content, "Meeting notes");
    }

    #[test]
    fn create_subdocument_without_parent_fails() {
        let repo = make_repo();
        let tree = DocumentTree::new(&repo);
        let err = tree.create_subdocument("doc_missing", None).unwrap_err();
        assert!(matches!(err, Error::MissingDocument { .. }));
    }

    #[test]
    fn convert_block_rewrites_it_in_place() {
        let repo = make_repo();
        let tree = DocumentTree::new(&repo);
        let mut parent = Document::with_title("doc_p", "Parent");
        parent.blocks.push(Block::new("2", BlockType::Text, ""));
        repo.save(&parent).unwrap();

        let (updated, child_id) = tree
            .convert_block_to_subdocument("doc_p", &parent.blocks, "2")
            .unwrap();

        assert_eq!(updated.len(), 2);
        assert_eq!(updated[1].kind, BlockType::Subdocument);
        assert_eq!(updated[1].content, child_id);

        let stored = repo.load("doc_p").unwrap().unwrap();
        assert_eq!(stored.blocks, updated);
        assert_eq!(stored.subdocument_ids(), [child_id]);
    }

    #[test]
    fn insert_subdocument_block_after_anchor() {
        let repo = make_repo();
        let tree = DocumentTree::new(&repo);
        let mut parent = Document::with_title("doc_p", "Parent");
        parent.blocks.push(Block::new("2", BlockType::Text, "tail"));
        repo.save(&parent).unwrap();

        let (updated, child_id) = tree
            .insert_subdocument_block("doc_p", &parent.blocks, "1")
            .unwrap();

        assert_eq!(updated.len(), 3);
        assert_eq!(updated[1].kind, BlockType::Subdocument);
        assert_eq!(updated[1].content, child_id);
        assert_eq!(updated[2].content, "tail");
    }

    #[test]
    fn move_to_trash_detaches_child_but_leaves_stale_block() {
        let repo = make_repo();
        let tree = DocumentTree::new(&repo);
        save_root(&repo, "doc_p", "Parent");
        let child_id = tree.create_subdocument("doc_p", None).unwrap();

        tree.move_to_trash(&child_id).unwrap();

        let child = repo.load(&child_id).unwrap().unwrap();
        assert!(child.is_deleted);
        assert!(child.deleted_at.is_some());

        let parent = repo.load("doc_p").unwrap().unwrap();
        assert_eq!(parent.subdocument_ids(), &[] as &[String]);
        // The referencing block intentionally stays; it renders as a
        // "document not found" placeholder until restore.
        assert!(parent
            .blocks
            .iter()
            .any(|b| b.kind == BlockType::Subdocument && b.content == child_id));
    }

    #[test]
    fn move_to_trash_redirects_to_most_recent_root() {
        let repo = make_repo();
        let tree = DocumentTree::new(&repo);
        save_root(&repo, "doc_old", "Older");
        let newer = save_root(&repo, "doc_new", "Newer");
        save_root(&repo, "doc_gone", "Going away");

        let redirect = tree.move_to_trash("doc_gone").unwrap();
        assert_eq!(redirect.as_deref(), Some(newer.id.as_str()));
    }

    #[test]
    fn move_to_trash_with_no_other_roots_redirects_nowhere() {
        let repo = make_repo();
        let tree = DocumentTree::new(&repo);
        save_root(&repo, "doc_only", "Only");
        assert_eq!(tree.move_to_trash("doc_only").unwrap(), None);
    }

    #[test]
    fn restore_clears_soft_delete_state() {
        let repo = make_repo();
        let tree = DocumentTree::new(&repo);
        save_root(&repo, "doc_a", "Alpha");
        tree.move_to_trash("doc_a").unwrap();

        tree.restore("doc_a").unwrap();
        let doc = repo.load("doc_a").unwrap().unwrap();
        assert!(!doc.is_deleted);
        assert_eq!(doc.deleted_at, None);
    }

    #[test]
    fn trashed_roots_never_appear_in_root_listing() {
        let repo = make_repo();
        let tree = DocumentTree::new(&repo);
        save_root(&repo, "doc_a", "Alpha");
        save_root(&repo, "doc_b", "Beta");
        tree.move_to_trash("doc_b").unwrap();

        let roots = tree.root_documents().unwrap();
        assert_eq!(roots.len(), 1);
        assert_eq!(roots[0].id, "doc_a");
        assert!(roots.iter().all(|doc| !doc.is_deleted));
    }

    #[test]
    fn root_listing_excludes_documents_referenced_as_children() {
        let repo = make_repo();
        let tree = DocumentTree::new(&repo);
        // Inconsistent link: "doc_orphan" carries no parentId but still
        // appears in another document's child list. The double-check must
        // keep it out of the root listing.
        save_root(&repo, "doc_orphan", "Orphan");
        let mut parent = Document::with_title("doc_p", "Parent");
        parent.subdocuments = Some(vec!["doc_orphan".to_string()]);
        repo.save(&parent).unwrap();

        let roots = tree.root_documents().unwrap();
        assert_eq!(roots.len(), 1);
        assert_eq!(roots[0].id, "doc_p");
    }

    #[test]
    fn empty_trash_removes_every_trashed_document() {
        let repo = make_repo();
        let tree = DocumentTree::new(&repo);
        save_root(&repo, "doc_a", "Alpha");
        save_root(&repo, "doc_b", "Beta");
        save_root(&repo, "doc_keep", "Keeper");
        tree.move_to_trash("doc_a").unwrap();
        tree.move_to_trash("doc_b").unwrap();

        assert_eq!(tree.trash_count().unwrap(), 2);
        assert_eq!(tree.empty_trash().unwrap(), 2);
        assert_eq!(tree.trash_count().unwrap(), 0);
        assert!(repo.load("doc_a").unwrap().is_none());
        assert!(repo.load("doc_keep").unwrap().is_some());
    }

    #[test]
    fn delete_subdocument_scrubs_parent_block_and_list() {
        let repo = make_repo();
        let tree = DocumentTree::new(&repo);
        save_root(&repo, "doc_p", "Parent");
        let child_id = tree.create_subdocument("doc_p", None).unwrap();

        let redirect = tree.delete_subdocument(&child_id).unwrap();
        assert_eq!(redirect.as_deref(), Some("doc_p"));
        assert!(repo.load(&child_id).unwrap().is_none());

        let parent = repo.load("doc_p").unwrap().unwrap();
        assert_eq!(parent.subdocument_ids(), &[] as &[String]);
        assert!(!parent
            .blocks
            .iter()
            .any(|b| b.kind == BlockType::Subdocument));
    }

    #[test]
    fn delete_with_children_removes_whole_subtree() {
        let repo = make_repo();
        let tree = DocumentTree::new(&repo);
        save_root(&repo, "doc_p", "Parent");
        save_root(&repo, "doc_other", "Other");
        let child_id = tree.create_subdocument("doc_p", None).unwrap();
        let grandchild_id = tree.create_subdocument(&child_id, None).unwrap();

        let redirect = tree.delete_with_children("doc_p").unwrap();
        assert_eq!(redirect.as_deref(), Some("doc_other"));
        assert!(repo.load("doc_p").unwrap().is_none());
        assert!(repo.load(&child_id).unwrap().is_none());
        assert!(repo.load(&grandchild_id).unwrap().is_none());
    }

    #[test]
    fn all_subdocuments_is_recursive() {
        let repo = make_repo();
        let tree = DocumentTree::new(&repo);
        save_root(&repo, "doc_p", "Parent");
        let child_id = tree.create_subdocument("doc_p", None).unwrap();
        let grandchild_id = tree.create_subdocument(&child_id, None).unwrap();

        let descendants = tree.all_subdocuments("doc_p").unwrap();
        assert_eq!(descendants, [child_id, grandchild_id]);
    }

    #[test]
    fn search_matches_descendant_titles() {
        let repo = make_repo();
        let tree = DocumentTree::new(&repo);
        save_root(&repo, "doc_p", "Projects");
        save_root(&repo, "doc_misc", "Miscellany");
        let child_id = tree.create_subdocument("doc_p", None).unwrap();
        repo.update_title(&child_id, "Quarterly budget").unwrap();

        let hits = tree.search("budget").unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "doc_p");

        assert!(tree.search("").unwrap().is_empty());
        assert!(tree.search("no such title").unwrap().is_empty());
    }
}
