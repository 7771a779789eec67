//! Window focus and document visibility, injected instead of read from globals.

use std::sync::atomic::{AtomicBool, Ordering};

use threadlive_core::Foreground;

pub use threadlive_core::FocusTransition;

pub trait Environment: Send + Sync {
    fn is_visible(&self) -> bool;
    fn has_focus(&self) -> bool;

    fn foreground(&self) -> Foreground {
        Foreground {
            visible: self.is_visible(),
            focused: self.has_focus(),
        }
    }
}

/// Environment backed by atomics, updated by whoever observes the window.
#[derive(Debug)]
pub struct SharedEnvironment {
    visible: AtomicBool,
    focused: AtomicBool,
}

impl SharedEnvironment {
    pub fn new(visible: bool, focused: bool) -> Self {
        Self {
            visible: AtomicBool::new(visible),
            focused: AtomicBool::new(focused),
        }
    }

    pub fn foregrounded() -> Self {
        Self::new(true, true)
    }

    pub fn set_visible(&self, visible: bool) {
        self.visible.store(visible, Ordering::SeqCst);
    }

    pub fn set_focused(&self, focused: bool) {
        self.focused.store(focused, Ordering::SeqCst);
    }

    /// Update the flags a transition implies.
    pub fn apply(&self, transition: FocusTransition) {
        match transition {
            FocusTransition::Focus => self.set_focused(true),
            FocusTransition::Blur => self.set_focused(false),
            FocusTransition::Visible => self.set_visible(true),
            FocusTransition::Hidden => self.set_visible(false),
        }
    }
}

impl Default for SharedEnvironment {
    fn default() -> Self {
        Self::foregrounded()
    }
}

impl Environment for SharedEnvironment {
    fn is_visible(&self) -> bool {
        self.visible.load(Ordering::SeqCst)
    }

    fn has_focus(&self) -> bool {
        self.focused.load(Ordering::SeqCst)
    }
}
