//! One-shot locators for sandbox documents.
//!
//! Each published document gets its own handle. A handle is released exactly
//! once by passing it back to [`ResourceStore::revoke`]; the controller does
//! this as soon as a newer document replaces it.

use crate::document::SandboxDocument;
use base64::Engine as Base64Engine;
use log::debug;
use std::collections::HashMap;

/// A live locator for one sandbox document. Not `Clone`: ownership tracks liveness.
#[derive(Debug, PartialEq, Eq)]
pub struct ResourceHandle {
    id: u64,
    generation: u64,
    url: String,
    digest: String,
}

impl ResourceHandle {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Opaque-origin URL that loads the document
    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn digest(&self) -> &str {
        &self.digest
    }
}

/// Issues and reclaims document handles.
#[derive(Debug, Default)]
pub struct ResourceStore {
    next_id: u64,
    live: HashMap<u64, u64>,
    issued: u64,
    revoked: u64,
}

impl ResourceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish `doc` under a fresh `data:` locator.
    ///
    /// `data:` documents load in an opaque origin, so the sandbox gets no
    /// access to the host's storage, cookies or scripts.
    pub fn publish(&mut self, doc: &SandboxDocument) -> ResourceHandle {
        self.next_id += 1;
        let id = self.next_id;
        let encoded = base64::engine::general_purpose::STANDARD.encode(doc.html().as_bytes());
        let url = format!("data:text/html;charset=utf-8;base64,{}#rfpreview-{}", encoded, id);
        self.live.insert(id, doc.generation());
        self.issued += 1;
        debug!(
            "published sandbox document #{} (generation {}, digest {})",
            id,
            doc.generation(),
            &doc.digest()[..12]
        );
        ResourceHandle {
            id,
            generation: doc.generation(),
            url,
            digest: doc.digest().to_string(),
        }
    }

    /// Release `handle`. Returns false if it was not live.
    pub fn revoke(&mut self, handle: ResourceHandle) -> bool {
        match self.live.remove(&handle.id) {
            Some(_) => {
                self.revoked += 1;
                debug!("revoked sandbox document #{}", handle.id);
                true
            }
            None => false,
        }
    }

    pub fn is_live(&self, handle: &ResourceHandle) -> bool {
        self.live.contains_key(&handle.id)
    }

    /// Handles published and not yet revoked
    pub fn outstanding(&self) -> usize {
        self.live.len()
    }

    pub fn issued(&self) -> u64 {
        self.issued
    }

    pub fn revoked(&self) -> u64 {
        self.revoked
    }
}
