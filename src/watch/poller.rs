//! Readiness multiplexer over the kernel notification source and the
//! one-shot stop wakeup.

use std::os::fd::AsFd;
use std::sync::Arc;

use nix::errno::Errno;
use nix::sys::epoll::{Epoll, EpollCreateFlags, EpollEvent, EpollFlags, EpollTimeout};
use nix::sys::eventfd::{EfdFlags, EventFd};

use crate::core::errors::{Result, TwError};

/// Which wakeup source fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wake {
    /// The kernel notification source has data.
    Notify,
    /// The stop wakeup was armed.
    Stop,
}

const NOTIFY_TOKEN: u64 = 0;
const STOP_TOKEN: u64 = 1;

/// Create the one-shot stop wakeup.
///
/// Armed exactly once by `WatcherHandle::stop` and never drained: a stop is
/// terminal for the watcher, so the readable state may persist.
pub fn new_wakeup() -> Result<Arc<EventFd>> {
    let efd = EventFd::from_value_and_flags(0, EfdFlags::EFD_NONBLOCK | EfdFlags::EFD_CLOEXEC)
        .map_err(|e| TwError::Init {
            component: "stop wakeup",
            source: e.into(),
        })?;
    Ok(Arc::new(efd))
}

/// Readiness wait over the notification fd and the stop wakeup.
///
/// The wait is unbounded; cancellation goes through the wakeup, not through
/// timeouts.
#[derive(Debug)]
pub struct ReadinessPoller {
    epoll: Epoll,
}

impl ReadinessPoller {
    /// Build the epoll instance and register both sources.
    pub fn new<F: AsFd>(notify: &F, wakeup: &EventFd) -> Result<Self> {
        let epoll = Epoll::new(EpollCreateFlags::EPOLL_CLOEXEC).map_err(|e| TwError::Init {
            component: "readiness multiplexer",
            source: e.into(),
        })?;
        epoll
            .add(notify, EpollEvent::new(EpollFlags::EPOLLIN, NOTIFY_TOKEN))
            .map_err(|e| TwError::Init {
                component: "notification source registration",
                source: e.into(),
            })?;
        epoll
            .add(wakeup, EpollEvent::new(EpollFlags::EPOLLIN, STOP_TOKEN))
            .map_err(|e| TwError::Init {
                component: "stop wakeup registration",
                source: e.into(),
            })?;
        Ok(Self { epoll })
    }

    /// Block until a source fires. Stop wins when both are ready.
    pub fn wait(&self) -> Result<Wake> {
        let mut ready = [EpollEvent::empty(); 2];
        loop {
            match self.epoll.wait(&mut ready, EpollTimeout::NONE) {
                Ok(0) => continue,
                Ok(n) => {
                    if ready[..n].iter().any(|e| e.data() == STOP_TOKEN) {
                        return Ok(Wake::Stop);
                    }
                    return Ok(Wake::Notify);
                }
                // A signal interrupting the wait is not a wakeup; stop goes
                // through the eventfd, so re-entering is safe.
                Err(Errno::EINTR) => continue,
                Err(e) => {
                    return Err(TwError::EventRead { source: e.into() });
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_eventfd() -> EventFd {
        EventFd::from_value_and_flags(0, EfdFlags::EFD_NONBLOCK | EfdFlags::EFD_CLOEXEC).unwrap()
    }

    #[test]
    fn armed_wakeup_returns_stop() {
        let notify = test_eventfd();
        let wakeup = new_wakeup().unwrap();
        let poller = ReadinessPoller::new(&notify, wakeup.as_ref()).unwrap();

        wakeup.arm().unwrap();
        assert_eq!(poller.wait().unwrap(), Wake::Stop);
        // The wakeup is never drained, so stop keeps winning.
        assert_eq!(poller.wait().unwrap(), Wake::Stop);
    }

    #[test]
    fn readable_notify_source_returns_notify() {
        let notify = test_eventfd();
        let wakeup = new_wakeup().unwrap();
        let poller = ReadinessPoller::new(&notify, wakeup.as_ref()).unwrap();

        notify.arm().unwrap();
        assert_eq!(poller.wait().unwrap(), Wake::Notify);
    }

    #[test]
    fn stop_wins_when_both_fire() {
        let notify = test_eventfd();
        let wakeup = new_wakeup().unwrap();
        let poller = ReadinessPoller::new(&notify, wakeup.as_ref()).unwrap();

        notify.arm().unwrap();
        wakeup.arm().unwrap();
        assert_eq!(poller.wait().unwrap(), Wake::Stop);
    }
}
