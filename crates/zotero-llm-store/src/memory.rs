//! In-memory document store.
//!
//! Holds documents and collections in insertion order, counts calls per
//! operation, and can be told to fail specific operations for specific
//! identifiers. Used by orchestrator tests in place of the Web API.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use zotero_llm_core::{Collection, Document, DocumentStore, Error, NewDocument, Result};

/// Store operations, for call counting and failure injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOp {
    GetDocument,
    Children,
    ListCollections,
    CollectionDocuments,
    CreateCollection,
    /// Keyed by the new note's parent, or its first collection.
    CreateDocument,
    UpdateDocument,
    AllDocuments,
    Fulltext,
    Search,
}

#[derive(Default)]
struct State {
    documents: Vec<Document>,
    collections: Vec<Collection>,
    fulltext: HashMap<String, String>,
    next_key: u64,
    calls: HashMap<StoreOp, usize>,
    failures: HashSet<(StoreOp, String)>,
    failing_ops: HashSet<StoreOp>,
}

impl State {
    fn record(&mut self, op: StoreOp, id: &str) -> Result<()> {
        *self.calls.entry(op).or_default() += 1;
        if self.failing_ops.contains(&op) || self.failures.contains(&(op, id.to_string())) {
            return Err(Error::Store(format!("Simulated {:?} failure for {}", op, id)));
        }
        Ok(())
    }

    fn new_key(&mut self) -> String {
        self.next_key += 1;
        format!("MEM{:05}", self.next_key)
    }

    fn document(&self, id: &str) -> Option<&Document> {
        self.documents.iter().find(|d| d.key == id)
    }
}

/// In-memory [`DocumentStore`] for tests.
#[derive(Default)]
pub struct InMemoryStore {
    state: Mutex<State>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn with_collection(self, collection: Collection) -> Self {
        self.add_collection(collection);
        self
    }

    pub fn with_document(self, document: Document) -> Self {
        self.add_document(document);
        self
    }

    pub fn with_fulltext(self, attachment_id: &str, text: &str) -> Self {
        self.lock()
            .fulltext
            .insert(attachment_id.to_string(), text.to_string());
        self
    }

    pub fn add_collection(&self, collection: Collection) {
        self.lock().collections.push(collection);
    }

    pub fn add_document(&self, document: Document) {
        self.lock().documents.push(document);
    }

    /// Fail `op` whenever it is invoked for `id`.
    pub fn fail_on(&self, op: StoreOp, id: &str) {
        self.lock().failures.insert((op, id.to_string()));
    }

    /// Fail every invocation of `op`.
    pub fn fail_all(&self, op: StoreOp) {
        self.lock().failing_ops.insert(op);
    }

    /// Stop injecting failures.
    pub fn clear_failures(&self) {
        let mut state = self.lock();
        state.failures.clear();
        state.failing_ops.clear();
    }

    /// Current state of a document.
    pub fn document(&self, id: &str) -> Option<Document> {
        self.lock().document(id).cloned()
    }

    /// Child notes of a document, in creation order.
    pub fn notes_of(&self, parent_id: &str) -> Vec<Document> {
        self.lock()
            .documents
            .iter()
            .filter(|d| d.is_note() && d.parent_item.as_deref() == Some(parent_id))
            .cloned()
            .collect()
    }

    /// Standalone notes filed in a collection.
    pub fn notes_in_collection(&self, collection_id: &str) -> Vec<Document> {
        self.lock()
            .documents
            .iter()
            .filter(|d| d.is_note() && d.collections.iter().any(|c| c == collection_id))
            .cloned()
            .collect()
    }

    pub fn collections(&self) -> Vec<Collection> {
        self.lock().collections.clone()
    }

    /// Number of times `op` was invoked, including failed invocations.
    pub fn call_count(&self, op: StoreOp) -> usize {
        self.lock().calls.get(&op).copied().unwrap_or_default()
    }

    /// Number of write operations (creates and updates).
    pub fn write_count(&self) -> usize {
        self.call_count(StoreOp::CreateDocument)
            + self.call_count(StoreOp::UpdateDocument)
            + self.call_count(StoreOp::CreateCollection)
    }

    pub fn reset_counts(&self) {
        self.lock().calls.clear();
    }
}

#[async_trait]
impl DocumentStore for InMemoryStore {
    async fn get_document(&self, id: &str) -> Result<Document> {
        let mut state = self.lock();
        state.record(StoreOp::GetDocument, id)?;
        state
            .document(id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("/items/{}", id)))
    }

    async fn children(&self, id: &str) -> Result<Vec<Document>> {
        let mut state = self.lock();
        state.record(StoreOp::Children, id)?;
        Ok(state
            .documents
            .iter()
            .filter(|d| d.parent_item.as_deref() == Some(id))
            .cloned()
            .collect())
    }

    async fn list_collections(&self) -> Result<Vec<Collection>> {
        let mut state = self.lock();
        state.record(StoreOp::ListCollections, "")?;
        Ok(state.collections.clone())
    }

    async fn collection_documents(&self, collection_id: &str) -> Result<Vec<Document>> {
        let mut state = self.lock();
        state.record(StoreOp::CollectionDocuments, collection_id)?;
        Ok(state
            .documents
            .iter()
            .filter(|d| d.parent_item.is_none() && d.collections.iter().any(|c| c == collection_id))
            .cloned()
            .collect())
    }

    async fn create_collection(&self, name: &str, parent_id: Option<&str>) -> Result<String> {
        let mut state = self.lock();
        state.record(StoreOp::CreateCollection, name)?;
        let key = state.new_key();
        state
            .collections
            .push(Collection::new(key.clone(), name, parent_id));
        Ok(key)
    }

    async fn create_document(&self, doc: NewDocument) -> Result<String> {
        let mut state = self.lock();
        let owner = doc
            .parent_item
            .clone()
            .or_else(|| doc.collections.first().cloned())
            .unwrap_or_default();
        state.record(StoreOp::CreateDocument, &owner)?;

        let key = state.new_key();
        let mut document = Document::new(key.clone(), doc.item_type);
        document.version = 1;
        document.parent_item = doc.parent_item;
        document.note = doc.note;
        document.tags = doc.tags;
        document.collections = doc.collections;
        state.documents.push(document);
        Ok(key)
    }

    async fn update_document(&self, doc: &Document) -> Result<()> {
        let mut state = self.lock();
        state.record(StoreOp::UpdateDocument, &doc.key)?;
        let existing = state
            .documents
            .iter_mut()
            .find(|d| d.key == doc.key)
            .ok_or_else(|| Error::NotFound(format!("/items/{}", doc.key)))?;
        let version = existing.version + 1;
        *existing = doc.clone();
        existing.version = version;
        Ok(())
    }

    async fn all_documents(&self) -> Result<Vec<Document>> {
        let mut state = self.lock();
        state.record(StoreOp::AllDocuments, "")?;
        Ok(state.documents.clone())
    }

    async fn fulltext(&self, attachment_id: &str) -> Result<Option<String>> {
        let mut state = self.lock();
        state.record(StoreOp::Fulltext, attachment_id)?;
        Ok(state.fulltext.get(attachment_id).cloned())
    }

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<Document>> {
        let mut state = self.lock();
        state.record(StoreOp::Search, query)?;
        let needle = query.to_lowercase();
        Ok(state
            .documents
            .iter()
            .filter(|d| !d.is_attachment())
            .filter(|d| {
                d.title.to_lowercase().contains(&needle)
                    || d.author_names().to_lowercase().contains(&needle)
            })
            .take(limit)
            .cloned()
            .collect())
    }
}
