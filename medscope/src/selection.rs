use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectionChange {
    Focused(String),
    Cleared,
}

/// Single-document focus. At most one id is ever selected.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Selection {
    selected: Option<String>,
}

impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Selecting the focused document again toggles it off; any other id
    /// replaces the current focus.
    pub fn select(&mut self, id: &str) -> SelectionChange {
        if self.selected.as_deref() == Some(id) {
            self.selected = None;
            SelectionChange::Cleared
        } else {
            self.selected = Some(id.to_string());
            SelectionChange::Focused(id.to_string())
        }
    }

    /// The 0-or-1 element selection.
    pub fn selection(&self) -> &[String] {
        self.selected.as_slice()
    }

    pub fn current(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    pub fn is_selected(&self, id: &str) -> bool {
        self.current() == Some(id)
    }

    pub fn clear(&mut self) {
        self.selected = None;
    }

    /// Drops `id` if it is the focused document. Returns whether it was.
    pub fn remove(&mut self, id: &str) -> bool {
        if self.is_selected(id) {
            self.selected = None;
            true
        } else {
            false
        }
    }
}
