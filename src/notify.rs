use anyhow::Result;
use std::io::{self, Write};

pub trait Notifier {
    /// System-level notification. An error means the notification could not
    /// be shown; in-app alerts are delivered regardless.
    fn notify(&self, title: &str, body: &str) -> Result<()>;

    /// Audible cue.
    fn chime(&self);
}

/// Rings the terminal bell. Notifications are refused when disabled in the
/// config, which callers treat like a denied permission.
pub struct TerminalNotifier {
    pub notifications_enabled: bool,
    pub sound_enabled: bool,
}

impl Notifier for TerminalNotifier {
    fn notify(&self, title: &str, body: &str) -> Result<()> {
        if !self.notifications_enabled {
            anyhow::bail!("notifications are disabled");
        }
        log::info!("notification: {}: {}", title, body);
        self.chime();
        Ok(())
    }

    fn chime(&self) {
        if !self.sound_enabled {
            return;
        }
        let mut stdout = io::stdout();
        let _ = stdout.write_all(b"\x07");
        let _ = stdout.flush();
    }
}

#[cfg(test)]
pub mod testing {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Clone, Default)]
    pub struct RecordingNotifier {
        pub denied: bool,
        pub shown: Rc<RefCell<Vec<String>>>,
        pub chimes: Rc<RefCell<usize>>,
    }

    impl Notifier for RecordingNotifier {
        fn notify(&self, title: &str, body: &str) -> Result<()> {
            if self.denied {
                anyhow::bail!("permission denied");
            }
            self.shown.borrow_mut().push(format!("{title}: {body}"));
            Ok(())
        }

        fn chime(&self) {
            *self.chimes.borrow_mut() += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_notifications_are_refused() {
        let notifier = TerminalNotifier {
            notifications_enabled: false,
            sound_enabled: false,
        };
        assert!(notifier.notify("Study complete", "Take a break").is_err());
    }

    #[test]
    fn test_enabled_notifications_succeed() {
        let notifier = TerminalNotifier {
            notifications_enabled: true,
            sound_enabled: false,
        };
        assert!(notifier.notify("Study complete", "Take a break").is_ok());
    }
}
