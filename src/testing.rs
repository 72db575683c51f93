//! Stand-ins for the terminal, for tests.

use crate::{Probe, WinSize};
use parking_lot::Mutex;
use std::io::{self, Write};
use std::sync::Arc;

/// An output stream that remembers everything written to it.
#[derive(Clone, Default)]
pub(crate) struct Capture {
    bytes: Arc<Mutex<Vec<u8>>>,
    fail: Arc<Mutex<bool>>,
}

impl Capture {
    /// Everything written since the last call.
    pub(crate) fn take(&self) -> String {
        let bytes = std::mem::take(&mut *self.bytes.lock());
        String::from_utf8(bytes).unwrap()
    }

    pub(crate) fn fail_next_write(&self) {
        *self.fail.lock() = true;
    }
}

impl Write for Capture {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if std::mem::replace(&mut *self.fail.lock(), false) {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "scripted failure"));
        }

        self.bytes.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// A window size probe whose answer can be changed at any time.
#[derive(Clone)]
pub(crate) struct Script {
    answer: Arc<Mutex<Result<Option<WinSize>, i32>>>,
}

impl Script {
    pub(crate) fn terminal(columns: u16, rows: u16) -> Script {
        Script::answering(Ok(Some(WinSize::new(rows, columns))))
    }

    pub(crate) fn headless() -> Script {
        Script::answering(Ok(None))
    }

    pub(crate) fn failing() -> Script {
        Script::answering(Err(libc::EIO))
    }

    fn answering(answer: Result<Option<WinSize>, i32>) -> Script {
        Script {
            answer: Arc::new(Mutex::new(answer)),
        }
    }

    pub(crate) fn set_terminal(&self, columns: u16, rows: u16) {
        *self.answer.lock() = Ok(Some(WinSize::new(rows, columns)));
    }

    pub(crate) fn set_headless(&self) {
        *self.answer.lock() = Ok(None);
    }

    pub(crate) fn set_failing(&self) {
        *self.answer.lock() = Err(libc::EIO);
    }
}

impl Probe for Script {
    fn size(&self) -> io::Result<Option<WinSize>> {
        (*self.answer.lock()).map_err(io::Error::from_raw_os_error)
    }
}
