//! Navigation seam.
//!
//! The gateway ends a session by sending the user to the login route and ends
//! an impersonated view by reloading the whole application. Both are
//! front-end concerns, so they go through [`Navigator`].

use parking_lot::Mutex;

/// Where the application currently is, and how to move it.
pub trait Navigator: Send + Sync {
    /// Current route, e.g. `/dashboard`.
    fn location(&self) -> String;

    /// Navigate to `route`.
    fn redirect(&self, route: &str);

    /// Discard all application state and start over.
    fn reload(&self);
}

#[derive(Debug)]
struct NavigationState {
    location: String,
    redirects: Vec<String>,
    reloads: usize,
}

/// [`Navigator`] that only records what it was asked to do.
///
/// Used by headless clients (the CLI) and tests.
#[derive(Debug)]
pub struct MemoryNavigator {
    state: Mutex<NavigationState>,
}

impl MemoryNavigator {
    pub fn new(location: impl Into<String>) -> Self {
        Self {
            state: Mutex::new(NavigationState {
                location: location.into(),
                redirects: Vec::new(),
                reloads: 0,
            }),
        }
    }

    /// Every route passed to [`Navigator::redirect`], oldest first.
    pub fn redirects(&self) -> Vec<String> {
        self.state.lock().redirects.clone()
    }

    pub fn reload_count(&self) -> usize {
        self.state.lock().reloads
    }
}

impl Default for MemoryNavigator {
    fn default() -> Self {
        Self::new("/")
    }
}

impl Navigator for MemoryNavigator {
    fn location(&self) -> String {
        self.state.lock().location.clone()
    }

    fn redirect(&self, route: &str) {
        let mut state = self.state.lock();
        state.location = route.to_string();
        state.redirects.push(route.to_string());
    }

    fn reload(&self) {
        self.state.lock().reloads += 1;
    }
}
