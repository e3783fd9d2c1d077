//! Readiness-driven event loop.
//!
//! One thread waits on the window-system connection and the grabbed input
//! device with a 100 ms timeout, so flag changes from signal handlers are
//! seen promptly. Every raw event is either forwarded to the virtual
//! device or swallowed, in arrival order.

use std::io;
use std::os::fd::RawFd;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use log::{debug, error, info, warn};

use crate::button::RawEvent;
use crate::engine::{Engine, Verdict};
use crate::error::{Error, Result};
use crate::rules::RuleStore;
use crate::window::WindowSystem;

/// Poll timeout in milliseconds.
const POLL_TIMEOUT_MS: libc::c_int = 100;

/// A grabbed raw input device.
pub trait InputSource {
    /// Descriptor that becomes readable when events are pending.
    fn raw_fd(&self) -> RawFd;

    /// Read the events currently available. `WouldBlock` means none.
    fn read_batch(&mut self) -> io::Result<Vec<RawEvent>>;
}

/// The virtual device that receives forwarded events.
pub trait OutputSink {
    /// Write one event followed by a synchronization marker.
    fn forward(&mut self, event: &RawEvent) -> Result<()>;
}

/// Process-wide flags shared with signal handlers.
#[derive(Debug, Clone)]
pub struct Controls {
    running: Arc<AtomicBool>,
    enabled: Arc<AtomicBool>,
}

impl Default for Controls {
    fn default() -> Self {
        Self::new()
    }
}

impl Controls {
    pub fn new() -> Self {
        Self {
            running: Arc::new(AtomicBool::new(true)),
            enabled: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
    }

    /// Flip the enabled flag, returning the new value.
    pub fn toggle(&self) -> bool {
        !self.enabled.fetch_xor(true, Ordering::SeqCst)
    }
}

/// Drives an [`Engine`] from an [`InputSource`] into an [`OutputSink`].
pub struct DispatchLoop<W, R, I, O> {
    engine: Engine<W, R>,
    source: I,
    sink: O,
    controls: Controls,
}

impl<W, R, I, O> DispatchLoop<W, R, I, O>
where
    W: WindowSystem,
    R: RuleStore,
    I: InputSource,
    O: OutputSink,
{
    pub fn new(engine: Engine<W, R>, source: I, sink: O, controls: Controls) -> Self {
        Self {
            engine,
            source,
            sink,
            controls,
        }
    }

    pub fn engine(&self) -> &Engine<W, R> {
        &self.engine
    }

    pub fn source_mut(&mut self) -> &mut I {
        &mut self.source
    }

    pub fn sink(&self) -> &O {
        &self.sink
    }

    pub fn controls(&self) -> &Controls {
        &self.controls
    }

    /// Run until [`Controls::stop`] is called or the input device fails.
    pub fn run(&mut self) -> Result<()> {
        let x_fd = self.engine.window_system().connection_fd();
        let mut fds = Vec::with_capacity(2);
        fds.push(libc::pollfd {
            fd: self.source.raw_fd(),
            events: libc::POLLIN,
            revents: 0,
        });
        if let Some(fd) = x_fd {
            fds.push(libc::pollfd {
                fd,
                events: libc::POLLIN,
                revents: 0,
            });
        }

        info!("dispatch loop started");
        while self.controls.is_running() {
            for pfd in fds.iter_mut() {
                pfd.revents = 0;
            }
            let ret = unsafe {
                libc::poll(fds.as_mut_ptr(), fds.len() as libc::nfds_t, POLL_TIMEOUT_MS)
            };
            if ret < 0 {
                let err = io::Error::last_os_error();
                if err.kind() == io::ErrorKind::Interrupted {
                    continue;
                }
                return Err(Error::Io(err));
            }
            if ret == 0 {
                continue;
            }

            if let Some(x) = fds.get(1)
                && x.revents & libc::POLLIN != 0
            {
                self.engine.window_system().drain_events();
            }
            if fds[0].revents & (libc::POLLIN | libc::POLLERR | libc::POLLHUP) != 0 {
                self.pump()?;
            }
        }
        info!("dispatch loop stopped");
        Ok(())
    }

    /// Read one batch from the source and handle every event in it.
    ///
    /// Returns the number of events read. Would-block and interrupted
    /// reads count as an empty batch; any other read error is returned.
    pub fn pump(&mut self) -> Result<usize> {
        let batch = match self.source.read_batch() {
            Ok(batch) => batch,
            Err(e)
                if matches!(
                    e.kind(),
                    io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
                ) =>
            {
                return Ok(0);
            }
            Err(e) => {
                error!("error reading from input device: {e}");
                return Err(Error::Io(e));
            }
        };

        for event in &batch {
            self.handle(event);
        }
        Ok(batch.len())
    }

    fn handle(&mut self, event: &RawEvent) {
        if !self.controls.is_enabled() || self.engine.is_dispatching() {
            self.forward(event);
            return;
        }
        match self.engine.process(event) {
            Verdict::Forward => self.forward(event),
            Verdict::Block => debug!("blocked {event:?}"),
        }
    }

    fn forward(&mut self, event: &RawEvent) {
        if let Err(e) = self.sink.forward(event) {
            warn!("failed to forward {event:?}: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::button::{BTN_RIGHT, EV_REL};
    use crate::dispatch::Timing;
    use crate::mock::{MockWindowSystem, RecordingSink, ScriptedSource};
    use crate::rules::Rules;

    type TestLoop = DispatchLoop<MockWindowSystem, Rules, ScriptedSource, RecordingSink>;

    fn test_loop() -> TestLoop {
        let engine = Engine::with_timing(
            MockWindowSystem::with_target("xterm", "XTerm"),
            Rules::new(),
            Timing::immediate(),
        );
        DispatchLoop::new(engine, ScriptedSource::new(), RecordingSink::new(), Controls::new())
    }

    #[test]
    fn test_controls_toggle() {
        let controls = Controls::new();
        assert!(controls.is_enabled());
        assert!(!controls.toggle());
        assert!(!controls.is_enabled());
        assert!(controls.toggle());

        let shared = controls.clone();
        shared.stop();
        assert!(!controls.is_running());
    }

    #[test]
    fn test_motion_is_forwarded_in_order() {
        let mut lp = test_loop();
        let batch = vec![
            RawEvent::new(EV_REL, 0, 4),
            RawEvent::new(EV_REL, 1, -2),
            RawEvent::syn(),
        ];
        lp.source_mut().push_batch(batch.clone());
        assert_eq!(lp.pump().unwrap(), 3);
        assert_eq!(lp.sink().events, batch);
    }

    #[test]
    fn test_blocked_events_are_not_forwarded() {
        let mut lp = test_loop();
        lp.source_mut().push_batch(vec![
            RawEvent::key(BTN_RIGHT, 1),
            RawEvent::syn(),
            RawEvent::new(EV_REL, 0, 1),
        ]);
        lp.pump().unwrap();
        assert_eq!(
            lp.sink().events,
            vec![RawEvent::syn(), RawEvent::new(EV_REL, 0, 1)]
        );
    }

    #[test]
    fn test_disabled_forwards_everything() {
        let mut lp = test_loop();
        lp.controls().set_enabled(false);
        lp.source_mut()
            .push_batch(vec![RawEvent::key(BTN_RIGHT, 1), RawEvent::key(BTN_RIGHT, 0)]);
        lp.pump().unwrap();
        assert_eq!(lp.sink().events.len(), 2);
        assert!(lp.engine().state().is_idle());
    }

    #[test]
    fn test_would_block_is_empty_batch() {
        let mut lp = test_loop();
        lp.source_mut().push_error(io::ErrorKind::WouldBlock);
        assert_eq!(lp.pump().unwrap(), 0);
        assert!(lp.source_mut().is_exhausted());
        // exhausted source also reports would-block
        assert_eq!(lp.pump().unwrap(), 0);
    }

    #[test]
    fn test_forward_failure_does_not_stop_batch() {
        let engine = Engine::with_timing(
            MockWindowSystem::with_target("xterm", "XTerm"),
            Rules::new(),
            Timing::immediate(),
        );
        let sink = RecordingSink {
            should_fail: true,
            ..RecordingSink::new()
        };
        let mut lp = DispatchLoop::new(engine, ScriptedSource::new(), sink, Controls::new());
        lp.source_mut().push_batch(vec![
            RawEvent::new(EV_REL, 0, 2),
            RawEvent::key(BTN_RIGHT, 1),
            RawEvent::key(BTN_RIGHT, 0),
        ]);

        assert_eq!(lp.pump().unwrap(), 3);
        assert!(lp.sink().events.is_empty());
        // the click behind the failed forward is still replayed
        assert_eq!(lp.engine().window_system().clicks().len(), 2);
        assert!(lp.engine().state().is_idle());
    }

    #[test]
    fn test_persistent_read_error_is_fatal() {
        let mut lp = test_loop();
        lp.source_mut().push_error(io::ErrorKind::NotFound);
        assert!(matches!(lp.pump(), Err(Error::Io(_))));
    }

    #[test]
    fn test_run_returns_when_stopped() {
        let mut lp = test_loop();
        lp.controls().stop();
        lp.run().unwrap();
    }
}
