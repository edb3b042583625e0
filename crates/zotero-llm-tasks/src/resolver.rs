//! Collection path resolution.
//!
//! A collection path is the `/`-joined sequence of collection names from a
//! root to a node, e.g. `Machine Learning/Transformers`. Lookup matches
//! names case-insensitively and takes the first match at each level;
//! creation matches names exactly.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tracing::{debug, info, warn};

use zotero_llm_core::{Collection, DocumentStore, Error, Result};

/// Split a collection path into trimmed, non-empty segments.
pub fn split_path(path: &str) -> Vec<&str> {
    path.split('/')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect()
}

fn empty_path_error(path: &str) -> Error {
    Error::InvalidInput(format!("Empty collection path provided: '{}'", path))
}

/// In-memory view of the collection tree.
pub struct CollectionTree {
    collections: Vec<Collection>,
    by_key: HashMap<String, usize>,
}

impl CollectionTree {
    pub fn new(collections: Vec<Collection>) -> Self {
        let by_key = collections
            .iter()
            .enumerate()
            .map(|(i, c)| (c.key.clone(), i))
            .collect();
        Self {
            collections,
            by_key,
        }
    }

    pub fn get(&self, key: &str) -> Option<&Collection> {
        self.by_key.get(key).map(|&i| &self.collections[i])
    }

    /// Direct children of `parent`, or the roots when `parent` is `None`.
    pub fn children_of<'a>(&'a self, parent: Option<&'a str>) -> impl Iterator<Item = &'a Collection> {
        self.collections
            .iter()
            .filter(move |c| c.parent_collection.as_deref() == parent)
    }

    /// Look up a path, matching each segment case-insensitively.
    pub fn find(&self, path: &str) -> Result<String> {
        let segments = split_path(path);
        if segments.is_empty() {
            return Err(empty_path_error(path));
        }

        let mut parent: Option<&str> = None;
        for (level, segment) in segments.iter().enumerate() {
            let wanted = segment.to_lowercase();
            let mut level_nodes = self.children_of(parent).peekable();
            if level_nodes.peek().is_none() {
                warn!(
                    subsystem = "tasks",
                    component = "resolver",
                    collection_path = path,
                    level = level + 1,
                    "No subcollections to descend into"
                );
                return Err(Error::CollectionNotFound(path.to_string()));
            }

            let found = level_nodes
                .find(|c| c.name.to_lowercase() == wanted)
                .ok_or_else(|| {
                    warn!(
                        subsystem = "tasks",
                        component = "resolver",
                        collection_path = path,
                        segment,
                        level = level + 1,
                        "Collection segment not found"
                    );
                    Error::CollectionNotFound(path.to_string())
                })?;
            parent = Some(found.key.as_str());
        }

        parent
            .map(str::to_string)
            .ok_or_else(|| Error::CollectionNotFound(path.to_string()))
    }

    /// Every collection below `key`, depth-first in listing order.
    pub fn descendants(&self, key: &str) -> Vec<String> {
        let mut out = Vec::new();
        let mut visited = HashSet::from([key.to_string()]);
        self.collect_descendants(key, &mut out, &mut visited);
        out
    }

    fn collect_descendants(&self, key: &str, out: &mut Vec<String>, visited: &mut HashSet<String>) {
        for child in self.children_of(Some(key)) {
            if visited.insert(child.key.clone()) {
                out.push(child.key.clone());
                self.collect_descendants(&child.key, out, visited);
            }
        }
    }

    /// Full `/`-joined path of a collection, or its key if it is unknown.
    pub fn path_of(&self, key: &str) -> String {
        let mut names = Vec::new();
        let mut visited = HashSet::new();
        let mut current = Some(key);

        while let Some(k) = current {
            if !visited.insert(k) {
                break;
            }
            match self.get(k) {
                Some(c) => {
                    names.push(c.name.as_str());
                    current = c.parent_collection.as_deref();
                }
                None => {
                    if names.is_empty() {
                        return key.to_string();
                    }
                    break;
                }
            }
        }

        names.reverse();
        names.join("/")
    }
}

/// Maps collection paths to collection keys.
#[derive(Clone)]
pub struct PathResolver {
    store: Arc<dyn DocumentStore>,
}

impl PathResolver {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Resolve a path to an existing collection.
    pub async fn resolve(&self, path: &str) -> Result<String> {
        self.resolve_canonical(path).await.map(|(key, _)| key)
    }

    /// Resolve a path to an existing collection and its stored path, with
    /// names spelled as they are in the library.
    pub async fn resolve_canonical(&self, path: &str) -> Result<(String, String)> {
        if split_path(path).is_empty() {
            return Err(empty_path_error(path));
        }
        let tree = CollectionTree::new(self.store.list_collections().await?);
        let key = tree.find(path)?;
        let canonical = tree.path_of(&key);
        info!(
            subsystem = "tasks",
            component = "resolver",
            collection_path = path,
            canonical_path = %canonical,
            collection_id = %key,
            "Resolved collection path"
        );
        Ok((key, canonical))
    }

    /// Resolve a path, creating each missing segment under the previous one.
    ///
    /// Segments match existing names exactly (case-sensitive), unlike
    /// [`resolve`](Self::resolve).
    pub async fn resolve_or_create(&self, path: &str) -> Result<String> {
        let segments = split_path(path);
        if segments.is_empty() {
            return Err(empty_path_error(path));
        }

        let mut collections = self.store.list_collections().await?;
        let mut parent: Option<String> = None;

        for segment in segments {
            let existing = collections
                .iter()
                .find(|c| c.parent_collection == parent && c.name == segment)
                .map(|c| c.key.clone());

            let key = match existing {
                Some(key) => key,
                None => {
                    let key = self
                        .store
                        .create_collection(segment, parent.as_deref())
                        .await?;
                    info!(
                        subsystem = "tasks",
                        component = "resolver",
                        collection_path = path,
                        segment,
                        collection_id = %key,
                        "Created collection segment"
                    );
                    collections.push(Collection::new(key.clone(), segment, parent.as_deref()));
                    key
                }
            };
            debug!(subsystem = "tasks", component = "resolver", segment, collection_id = %key, "Segment resolved");
            parent = Some(key);
        }

        parent.ok_or_else(|| empty_path_error(path))
    }
}
