use crate::types::LinkTarget;

/// Lifecycle of a document. Content goes to the open page while one exists
/// and to the document buffer otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DocState {
    Initial,
    Opened,
    PageOpen,
    Closed,
}

#[derive(Debug, Clone)]
pub(crate) struct Page {
    pub(crate) content: Vec<u8>,
    /// Started in a non-default orientation.
    pub(crate) orientation_changed: bool,
    pub(crate) links: Vec<PageLink>,
}

impl Page {
    pub(crate) fn new(orientation_changed: bool) -> Self {
        Self {
            content: Vec::new(),
            orientation_changed,
            links: Vec::new(),
        }
    }
}

/// Clickable area in points, `y` measured from the bottom edge.
#[derive(Debug, Clone)]
pub(crate) struct PageLink {
    pub(crate) x: f64,
    pub(crate) y: f64,
    pub(crate) width: f64,
    pub(crate) height: f64,
    pub(crate) target: LinkTarget,
}

/// Destination of an internal link. Page 0 means not yet placed.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct LinkDest {
    pub(crate) page: usize,
    pub(crate) y: f64,
}
