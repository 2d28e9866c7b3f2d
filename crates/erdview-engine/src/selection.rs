//! Selection state driven by graph widget events

use erdview_core::ViewConfig;
use serde::{Deserialize, Serialize};

/// Payload a widget sends when the empty canvas is clicked
pub const BACKGROUND_PAYLOAD: &str = "background";

/// A click reported by the interactive view
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectionEvent {
    /// A node was clicked; carries its composite key
    Node(String),

    /// The background was clicked
    Background,
}

impl SelectionEvent {
    /// Interpret a raw widget payload. An empty payload is no event.
    pub fn from_payload(payload: &str) -> Option<Self> {
        match payload {
            "" => None,
            BACKGROUND_PAYLOAD => Some(Self::Background),
            key => Some(Self::Node(key.to_string())),
        }
    }
}

/// Currently selected table (composite key), if any
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    selected: Option<String>,
}

impl Selection {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn of(key: impl Into<String>) -> Self {
        Self {
            selected: Some(key.into()),
        }
    }

    pub fn selected(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    /// Next selection after an event
    ///
    /// Clicks are ignored when click events are disabled; a background click
    /// clears the selection only if the view is configured to.
    pub fn apply(&self, event: SelectionEvent, view: &ViewConfig) -> Self {
        if !view.click_events {
            return self.clone();
        }

        match event {
            SelectionEvent::Node(key) => Self::of(key),
            SelectionEvent::Background if view.background_click_clears_selection => Self::none(),
            SelectionEvent::Background => self.clone(),
        }
    }

    pub fn clear(&self) -> Self {
        Self::none()
    }
}
