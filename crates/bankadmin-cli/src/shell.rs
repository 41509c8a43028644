//! Terminal rendering of session notices and navigation.

use bankadmin_core::auth::{Notice, SessionObserver};
use bankadmin_core::Route;

/// Prints notices to stderr. A terminal always "navigates" successfully:
/// there is no router to be missing, only a hint of what to run next.
pub struct ConsoleShell;

impl SessionObserver for ConsoleShell {
    fn notify(&self, notice: Notice) {
        let marker = match notice {
            Notice::LoginSucceeded { .. } => "✓",
            Notice::SessionEnded(_) => "•",
            _ => "✗",
        };
        eprintln!("{} {}", marker, notice);
    }

    fn navigate(&self, route: Route) -> bool {
        if route == Route::Login {
            eprintln!("  Run `bankadmin login` to sign in again.");
        } else {
            eprintln!("  → {} ({})", route.title(), route.path());
        }
        true
    }

    fn redirect(&self, route: Route) {
        self.navigate(route);
    }
}
