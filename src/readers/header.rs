use std::collections::HashMap;
use std::sync::{Arc, Condvar, Mutex};

use crate::models::Bound;

/// Document metadata published once per stream: the `version` and
/// `generator` properties of the root element, the `bounds` boxes seen
/// before the first element, and whether the document is a change file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Header {
    properties: HashMap<String, String>,
    boxes: Vec<Bound>,
    has_multiple_object_versions: bool,
}

impl Header {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    pub fn set(&mut self, key: &str, value: &str) {
        self.properties.insert(key.to_owned(), value.to_owned());
    }

    pub fn version(&self) -> Option<&str> {
        self.get("version")
    }

    pub fn generator(&self) -> Option<&str> {
        self.get("generator")
    }

    pub fn add_box(&mut self, bound: Bound) {
        self.boxes.push(bound);
    }

    pub fn boxes(&self) -> &[Bound] {
        &self.boxes
    }

    /// True for change documents, which can carry several versions of the
    /// same object.
    pub fn has_multiple_object_versions(&self) -> bool {
        self.has_multiple_object_versions
    }

    pub fn set_has_multiple_object_versions(&mut self, value: bool) {
        self.has_multiple_object_versions = value;
    }
}

/// Write-once cell carrying the header from the parser thread to the
/// consumer. The first publication wins; later ones are rejected.
#[derive(Clone, Default)]
pub(crate) struct HeaderFuture {
    inner: Arc<HeaderCell>,
}

#[derive(Default)]
struct HeaderCell {
    value: Mutex<Option<Header>>,
    ready: Condvar,
}

impl HeaderFuture {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn publish(&self, header: Header) -> bool {
        let mut slot = self.inner.value.lock().unwrap_or_else(|e| e.into_inner());
        if slot.is_some() {
            return false;
        }
        *slot = Some(header);
        self.inner.ready.notify_all();
        true
    }

    /// Blocks until the header has been published.
    pub(crate) fn wait(&self) -> Header {
        let mut slot = self.inner.value.lock().unwrap_or_else(|e| e.into_inner());
        loop {
            if let Some(header) = slot.as_ref() {
                return header.clone();
            }
            slot = self
                .inner
                .ready
                .wait(slot)
                .unwrap_or_else(|e| e.into_inner());
        }
    }
}
