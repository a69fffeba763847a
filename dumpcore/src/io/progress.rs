//! "Please wait" notifier shown while a core dump is produced.
//!
//! The message appears only if the pipeline is still running after a short
//! delay. Firing and cancellation share one mutex: once [`ProgressReporter::stop`]
//! returns, the notifier never writes again.

use std::io::Write;
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::thread;
use std::time::Duration;

use tracing::{debug, warn};

/// Start/stop pair for a delayed progress message.
pub trait ProgressReporter {
    type Handle;

    /// Schedule `text` to be shown after `delay`.
    fn start(&self, text: &str, delay: Duration) -> Self::Handle;

    /// Cancel the message. Safe whether or not it has fired yet.
    fn stop(&self, handle: Self::Handle);
}

/// Stops its notifier exactly once when dropped.
pub struct ProgressGuard<'a, P: ProgressReporter + ?Sized> {
    reporter: &'a P,
    handle: Option<P::Handle>,
}

impl<'a, P: ProgressReporter + ?Sized> ProgressGuard<'a, P> {
    pub fn start(reporter: &'a P, text: &str, delay: Duration) -> Self {
        let handle = reporter.start(text, delay);
        Self {
            reporter,
            handle: Some(handle),
        }
    }
}

impl<P: ProgressReporter + ?Sized> Drop for ProgressGuard<'_, P> {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            self.reporter.stop(handle);
        }
    }
}

#[derive(Debug, Default)]
struct NotifierState {
    cancelled: bool,
    fired: bool,
}

type SharedState = Arc<(Mutex<NotifierState>, Condvar)>;
type Sink = Arc<Mutex<Box<dyn Write + Send>>>;

/// Writes the message, then a dot per `tick`, to a terminal stream.
pub struct TerminalProgress {
    sink: Sink,
    tick: Duration,
}

pub struct TerminalHandle {
    state: SharedState,
    thread: Option<thread::JoinHandle<()>>,
}

impl TerminalProgress {
    pub fn stderr() -> Self {
        Self::with_writer(Box::new(std::io::stderr()))
    }

    pub fn with_writer(writer: Box<dyn Write + Send>) -> Self {
        Self {
            sink: Arc::new(Mutex::new(writer)),
            tick: Duration::from_secs(1),
        }
    }

    pub fn tick(mut self, tick: Duration) -> Self {
        self.tick = tick;
        self
    }
}

impl ProgressReporter for TerminalProgress {
    type Handle = TerminalHandle;

    fn start(&self, text: &str, delay: Duration) -> TerminalHandle {
        let state: SharedState = Arc::new((Mutex::new(NotifierState::default()), Condvar::new()));
        let thread_state = Arc::clone(&state);
        let sink = Arc::clone(&self.sink);
        let text = text.to_string();
        let tick = self.tick;

        let thread = thread::Builder::new()
            .name("dumpcore-progress".to_string())
            .spawn(move || run_notifier(&thread_state, &sink, &text, delay, tick));
        let thread = match thread {
            Ok(handle) => Some(handle),
            Err(err) => {
                warn!(err = %err, "failed to start progress notifier");
                None
            }
        };
        TerminalHandle { state, thread }
    }

    fn stop(&self, mut handle: TerminalHandle) {
        {
            let (lock, cvar) = &*handle.state;
            let mut state = lock.lock().unwrap_or_else(PoisonError::into_inner);
            state.cancelled = true;
            debug!(fired = state.fired, "stopping progress notifier");
            cvar.notify_all();
        }
        if let Some(thread) = handle.thread.take()
            && thread.join().is_err()
        {
            warn!("progress notifier thread panicked");
        }
    }
}

fn run_notifier(state: &SharedState, sink: &Sink, text: &str, delay: Duration, tick: Duration) {
    let (lock, cvar) = &**state;
    let guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
    let (mut guard, _) = cvar
        .wait_timeout_while(guard, delay, |s| !s.cancelled)
        .unwrap_or_else(PoisonError::into_inner);
    if guard.cancelled {
        return;
    }

    // Written under the state lock so a concurrent stop waits for us.
    guard.fired = true;
    emit(sink, text);
    loop {
        let (next, _) = cvar
            .wait_timeout_while(guard, tick, |s| !s.cancelled)
            .unwrap_or_else(PoisonError::into_inner);
        guard = next;
        if guard.cancelled {
            break;
        }
        emit(sink, ".");
    }
    emit(sink, "\n");
}

fn emit(sink: &Sink, text: &str) {
    let mut out = sink.lock().unwrap_or_else(PoisonError::into_inner);
    if let Err(err) = out.write_all(text.as_bytes()).and_then(|()| out.flush()) {
        warn!(err = %err, "failed to write progress message");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Default)]
    struct SharedBuf(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().expect("buf lock").extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl SharedBuf {
        fn contents(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().expect("buf lock")).into_owned()
        }
    }

    #[test]
    fn stop_before_delay_prints_nothing() {
        let buf = SharedBuf::default();
        let progress = TerminalProgress::with_writer(Box::new(buf.clone()));
        let handle = progress.start("please wait", Duration::from_secs(30));
        progress.stop(handle);
        assert_eq!(buf.contents(), "");
    }

    #[test]
    fn message_appears_after_delay_and_ends_with_newline() {
        let buf = SharedBuf::default();
        let progress =
            TerminalProgress::with_writer(Box::new(buf.clone())).tick(Duration::from_secs(30));
        let handle = progress.start("please wait", Duration::from_millis(10));
        thread::sleep(Duration::from_millis(300));
        progress.stop(handle);
        assert_eq!(buf.contents(), "please wait\n");
    }

    #[test]
    fn nothing_is_written_after_stop_returns() {
        let buf = SharedBuf::default();
        let progress =
            TerminalProgress::with_writer(Box::new(buf.clone())).tick(Duration::from_millis(5));
        let handle = progress.start("wait", Duration::from_millis(5));
        thread::sleep(Duration::from_millis(50));
        progress.stop(handle);
        let at_stop = buf.contents();
        thread::sleep(Duration::from_millis(50));
        assert_eq!(buf.contents(), at_stop);
        assert!(at_stop.starts_with("wait"));
        assert!(at_stop.ends_with('\n'));
    }

    #[test]
    fn guard_stops_exactly_once_on_drop() {
        struct Counting(Mutex<u32>);
        impl ProgressReporter for Counting {
            type Handle = ();
            fn start(&self, _text: &str, _delay: Duration) -> Self::Handle {}
            fn stop(&self, _handle: ()) {
                *self.0.lock().expect("lock") += 1;
            }
        }

        let reporter = Counting(Mutex::new(0));
        {
            let _guard = ProgressGuard::start(&reporter, "x", Duration::ZERO);
        }
        assert_eq!(*reporter.0.lock().expect("lock"), 1);
    }
}
