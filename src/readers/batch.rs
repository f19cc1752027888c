use crate::error::Error;
use crate::models::Element;

/// Target size of a batch. A batch is handed to the consumer once its
/// committed content passes 90 % of this.
pub(crate) const BATCH_TARGET_SIZE: usize = 2 * 1000 * 1000;

/// A group of committed elements carried from the parser thread to the
/// consumer in one queue operation.
///
/// Elements appear in document order. A batch only ever holds complete
/// elements; a partially parsed element lives in its builder until the
/// closing tag commits it.
#[derive(Debug)]
pub struct Batch {
    elements: Vec<Element>,
    committed_bytes: usize,
    target_size: usize,
}

impl Batch {
    pub(crate) fn new() -> Self {
        Self::with_target_size(BATCH_TARGET_SIZE)
    }

    pub(crate) fn with_target_size(target_size: usize) -> Self {
        Self {
            elements: Vec::new(),
            committed_bytes: 0,
            target_size,
        }
    }

    pub(crate) fn commit(&mut self, element: Element) {
        self.committed_bytes += element.estimated_size();
        self.elements.push(element);
    }

    pub(crate) fn is_full(&self) -> bool {
        self.committed_bytes > self.target_size / 10 * 9
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Approximate memory held by the committed elements.
    pub fn committed_bytes(&self) -> usize {
        self.committed_bytes
    }

    pub fn elements(&self) -> &[Element] {
        &self.elements
    }

    pub fn into_elements(self) -> Vec<Element> {
        self.elements
    }
}

impl IntoIterator for Batch {
    type Item = Element;
    type IntoIter = std::vec::IntoIter<Element>;

    fn into_iter(self) -> Self::IntoIter {
        self.elements.into_iter()
    }
}

/// What the parser thread puts on the output queue.
#[derive(Debug)]
pub(crate) enum OutputItem {
    Batch(Batch),
    Error(Error),
    Done,
}
