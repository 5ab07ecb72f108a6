//! Terminal stand-in for the browser's login redirect

use std::sync::atomic::{AtomicBool, Ordering};

use session::Navigator;
use tracing::info;

/// Tells the user to sign in again and remembers that it did.
#[derive(Debug, Default)]
pub struct TerminalNavigator {
    redirected: AtomicBool,
}

impl TerminalNavigator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the session was terminated during this run.
    pub fn redirected(&self) -> bool {
        self.redirected.load(Ordering::SeqCst)
    }
}

impl Navigator for TerminalNavigator {
    fn redirect(&self, route: &str) {
        // One notice per run, however many requests hit the same dead session
        if !self.redirected.swap(true, Ordering::SeqCst) {
            eprintln!("session ended; sign in again with `marketplace login` ({route})");
        }
        info!(route, "redirected to login");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redirect_sets_flag() {
        let nav = TerminalNavigator::new();
        assert!(!nav.redirected());

        nav.redirect("/login");
        nav.redirect("/login");

        assert!(nav.redirected());
    }
}
