//! Raw kernel notification records.

use std::ffi::{OsStr, OsString};

use inotify::{Event, EventMask, WatchDescriptor};

/// One kernel notification, parsed out of the event buffer.
///
/// Created by the buffer drain, consumed exactly once by the interpreter,
/// never mutated.
#[derive(Debug, Clone)]
pub struct RawEvent {
    /// Kernel handle of the directory the event occurred in.
    pub wd: WatchDescriptor,
    /// Notification kind bits.
    pub mask: EventMask,
    /// Kernel-assigned identifier linking the two halves of a rename.
    pub cookie: u32,
    /// Basename relative to the watched directory; empty for events about
    /// the watched directory itself.
    pub name: OsString,
}

impl RawEvent {
    /// Whether this event is about a directory.
    #[must_use]
    pub fn is_dir(&self) -> bool {
        self.mask.contains(EventMask::ISDIR)
    }
}

impl<'a> From<Event<&'a OsStr>> for RawEvent {
    fn from(event: Event<&'a OsStr>) -> Self {
        Self {
            wd: event.wd,
            mask: event.mask,
            cookie: event.cookie,
            name: event.name.map(OsString::from).unwrap_or_default(),
        }
    }
}
