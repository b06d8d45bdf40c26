use std::cell::RefCell;
use std::rc::Rc;

/// Identifies an element injected into the overlay
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ElementId(u64);

/// UI injected over the render surface
#[derive(Debug, Clone, PartialEq)]
pub enum OverlayElement {
    /// Clickable control that requests an immersive session start or end
    ActivationControl { label: String },
    /// Text shown when immersive mode is unavailable
    FallbackNotice { text: String },
}

/// Something the user did to an overlay element
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverlayAction {
    Activate(ElementId),
}

#[derive(Default)]
struct OverlayInner {
    next_id: u64,
    elements: Vec<(ElementId, OverlayElement)>,
    actions: Vec<OverlayAction>,
}

/// Shared list of overlay elements plus the queue of clicks on them.
///
/// The session manager inserts and removes elements; the egui layer draws
/// them and records clicks; the viewer drains the clicks once per frame.
#[derive(Clone, Default)]
pub struct Overlay {
    inner: Rc<RefCell<OverlayInner>>,
}

impl Overlay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, element: OverlayElement) -> ElementId {
        let mut inner = self.inner.borrow_mut();
        let id = ElementId(inner.next_id);
        inner.next_id += 1;
        inner.elements.push((id, element));
        id
    }

    pub fn remove(&self, id: ElementId) -> bool {
        let mut inner = self.inner.borrow_mut();
        let before = inner.elements.len();
        inner.elements.retain(|(entry, _)| *entry != id);
        inner.actions.retain(|OverlayAction::Activate(target)| *target != id);
        inner.elements.len() != before
    }

    pub fn set_label(&self, id: ElementId, new_label: &str) {
        let mut inner = self.inner.borrow_mut();
        if let Some((_, OverlayElement::ActivationControl { label })) =
            inner.elements.iter_mut().find(|(entry, _)| *entry == id)
        {
            *label = new_label.to_string();
        }
    }

    pub fn elements(&self) -> Vec<(ElementId, OverlayElement)> {
        self.inner.borrow().elements.clone()
    }

    pub fn has_activation_control(&self) -> bool {
        self.inner
            .borrow()
            .elements
            .iter()
            .any(|(_, e)| matches!(e, OverlayElement::ActivationControl { .. }))
    }

    pub fn has_fallback_notice(&self) -> bool {
        self.inner
            .borrow()
            .elements
            .iter()
            .any(|(_, e)| matches!(e, OverlayElement::FallbackNotice { .. }))
    }

    /// Record a click; ignored for elements that no longer exist
    pub fn activate(&self, id: ElementId) {
        let mut inner = self.inner.borrow_mut();
        if inner.elements.iter().any(|(entry, _)| *entry == id) {
            inner.actions.push(OverlayAction::Activate(id));
        }
    }

    pub fn take_actions(&self) -> Vec<OverlayAction> {
        std::mem::take(&mut self.inner.borrow_mut().actions)
    }
}
