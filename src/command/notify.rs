//! User-facing notices.

/// Where informational, warning and error notices go.
pub trait Notifier: Send + Sync {
    fn info(&self, message: &str);
    fn warn(&self, message: &str);
    fn error(&self, message: &str);
}

/// Prints notices to the terminal; warnings and errors go to stderr.
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalNotifier;

impl Notifier for TerminalNotifier {
    fn info(&self, message: &str) {
        println!("{message}");
    }

    fn warn(&self, message: &str) {
        eprintln!("Warning: {message}");
    }

    fn error(&self, message: &str) {
        eprintln!("Error: {message}");
    }
}
