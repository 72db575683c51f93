//! A progress bar pinned to the bottom row of the terminal.
//!
//! # Features
//!
//! - Ordinary output keeps scrolling above the bar, untouched.
//! - Re-layout on window resize (`SIGWINCH`).
//! - Terminal restored on `SIGINT`/`SIGTERM` and on explicit cleanup.
//! - Silent when not attached to a terminal.
//! - Shareable between threads.
//!
//! # Usage
//!
//! Unlike a bar that redraws "in place" on the current line, `talma` shrinks
//! the terminal's scrolling region by one row and draws into the row it freed.
//! Everything else you print keeps working as usual.
//!
//! ```
//! use talma::Progress;
//!
//! let progress = Progress::new(50)?;
//!
//! for n in 1..=50 {
//!     progress.render(n)?;
//!     println!("Step {} done", n);
//! }
//!
//! // Hand the bottom row back.
//! progress.cleanup()?;
//! # Ok::<(), talma::Error>(())
//! ```
//!
//! ## Resizing and Signals
//!
//! Call [`Progress::watch`] to spawn two listeners: one recomputes the layout
//! when the window changes size, the other restores the terminal and exits
//! when the process is interrupted or terminated.
//!
//! ```no_run
//! use talma::{Progress, Watch};
//!
//! let progress = Progress::new(100)?;
//! let _watchers = progress.watch(Watch::default().exit_code(130))?;
//! # Ok::<(), talma::Error>(())
//! ```
//!
//! See [`Watch`] for what happens when a resize can't be measured.
//!
//! ## Multiple Threads
//!
//! [`Progress`] is a cheap handle around shared state. Clone it and move the
//! clones wherever the work happens. Each redraw is written as one contiguous
//! chunk, so concurrent renders and resizes never tear the bottom row.
//!
//! ## Headless Mode
//!
//! If `stdout` is redirected to a file or a pipe, every operation becomes a
//! no-op. Nothing needs to be special-cased by the caller.
//!
//! # Caveats
//!
//! - Your terminal must support VT100 codes. Windows consoles are not supported.
//! - Only one bar. This is not a layout engine.
//! - Output written by other means must not use the bottom row itself.

#![doc(html_root_url = "https://docs.rs/talma/0.1.0")]

use log::{debug, info};
use parking_lot::Mutex;
use std::io::{self, Stdout, Write};
use std::num::NonZeroU64;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

mod ansi;
mod error;
mod layout;
mod term;
#[cfg(test)]
mod testing;
mod watch;

pub use error::Error;
pub use term::{Probe, Tty, WinSize};
pub use watch::{ResizeFailure, Watch, Watchers};

use layout::{Glyphs, Layout};

/// Construction-time settings for a [`Progress`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Options {
    /// The iteration count that constitutes 100%.
    pub total: u64,
    /// Fill for the completed part of the bar.
    pub done: String,
    /// Fill for the remaining part of the bar.
    pub pending: String,
}

impl Default for Options {
    fn default() -> Options {
        Options {
            total: 100,
            done: "#".to_string(),
            pending: ".".to_string(),
        }
    }
}

/// A handle to the bottom-row progress bar.
///
/// Clones refer to the same bar.
pub struct Progress<W = Stdout> {
    shared: Arc<Shared<W>>,
}

impl<W> Clone for Progress<W> {
    fn clone(&self) -> Progress<W> {
        Progress {
            shared: Arc::clone(&self.shared),
        }
    }
}

struct Shared<W> {
    /// Bar state and the stream it's drawn on, locked together so that a
    /// redraw always sees one resize event's worth of layout.
    inner: Mutex<Inner<W>>,
    probe: Box<dyn Probe>,
    /// Set exactly once, by the first cleanup.
    released: AtomicBool,
    /// Run by the first cleanup. Closes notification sources.
    closers: Mutex<Vec<Box<dyn FnOnce() + Send>>>,
}

struct Inner<W> {
    state: BarState,
    out: W,
}

struct BarState {
    total: NonZeroU64,
    glyphs: Glyphs,
    /// Last size the probe reported.
    size: Option<WinSize>,
    /// `None` while headless.
    layout: Option<Layout>,
    /// Set after a failed resize gave up on the terminal. Later resizes
    /// leave the bar headless.
    degraded: bool,
}

impl Progress<Stdout> {
    /// Reserve the bottom row of the terminal attached to `stdout`, with the
    /// default glyphs.
    ///
    /// Fails if `total` is `0`, or if the terminal could not be queried for
    /// reasons other than `stdout` not being a terminal.
    pub fn new(total: u64) -> Result<Progress<Stdout>, Error> {
        let options = Options {
            total,
            ..Options::default()
        };

        Progress::with_options(options, io::stdout(), Tty::stdout())
    }
}

impl<W: Write + Send> Progress<W> {
    /// Like [`Progress::new`], but with full control over the settings, the
    /// output stream, and where window sizes come from.
    pub fn with_options<P>(options: Options, out: W, probe: P) -> Result<Progress<W>, Error>
    where
        P: Probe + 'static,
    {
        let total = NonZeroU64::new(options.total).ok_or(Error::InvalidTotal)?;
        let state = BarState {
            total,
            glyphs: Glyphs {
                done: options.done,
                pending: options.pending,
            },
            size: None,
            layout: None,
            degraded: false,
        };

        let progress = Progress {
            shared: Arc::new(Shared {
                inner: Mutex::new(Inner { state, out }),
                probe: Box::new(probe),
                released: AtomicBool::new(false),
                closers: Mutex::new(Vec::new()),
            }),
        };

        progress.update_window_size()?;

        if progress.is_headless() {
            info!("Output is not a terminal; the progress bar will not be drawn.");
        }

        Ok(progress)
    }

    /// Declare how many steps constitute 100%.
    pub fn set_total(&self, total: u64) -> Result<(), Error> {
        let total = NonZeroU64::new(total).ok_or(Error::InvalidTotal)?;
        self.shared.inner.lock().state.total = total;
        Ok(())
    }

    /// The current total.
    pub fn total(&self) -> u64 {
        self.shared.inner.lock().state.total.get()
    }

    /// Is the bar inactive because there's no terminal to draw on?
    pub fn is_headless(&self) -> bool {
        self.shared.inner.lock().state.layout.is_none()
    }

    /// The window size seen by the most recent successful query.
    pub fn size(&self) -> Option<WinSize> {
        self.shared.inner.lock().state.size
    }

    /// Cells taken up by everything but the bar glyphs, `None` while headless.
    pub fn header_width(&self) -> Option<u16> {
        self.shared
            .inner
            .lock()
            .state
            .layout
            .map(|l| l.header_width())
    }

    /// Query the terminal again and re-reserve the bottom row to fit.
    ///
    /// Not being attached to a terminal is not an error here; nothing changes.
    pub fn update_window_size(&self) -> Result<(), Error> {
        let mut inner = self.shared.inner.lock();

        if self.shared.released.load(Ordering::SeqCst) || inner.state.degraded {
            return Ok(());
        }

        let size = match self.shared.probe.size().map_err(Error::TerminalQuery)? {
            Some(size) => size,
            None => return Ok(()),
        };

        let layout = match Layout::new(size.columns, size.rows) {
            Some(layout) => layout,
            None => return Ok(()),
        };

        debug!(
            "Window is {}x{}; header width {}.",
            size.columns,
            size.rows,
            layout.header_width()
        );

        inner.state.size = Some(size);
        inner.state.layout = Some(layout);

        let mut buf = String::new();
        ansi::reserve(&mut buf, layout.rows);
        inner.emit(&buf)
    }

    /// Redraw the bar at the given iteration.
    ///
    /// Counts beyond the total are drawn as 100%.
    pub fn render(&self, count: u64) -> Result<(), Error> {
        let mut inner = self.shared.inner.lock();

        if self.shared.released.load(Ordering::SeqCst) {
            return Ok(());
        }

        let layout = match inner.state.layout {
            Some(layout) => layout,
            None => return Ok(()),
        };

        let mut frame = String::new();
        ansi::frame_start(&mut frame);
        ansi::move_to_row(&mut frame, layout.rows);
        frame.push_str(&layout::line(
            &layout,
            &inner.state.glyphs,
            count,
            inner.state.total,
        ));
        frame.push_str(ansi::RESTORE_CURSOR);

        // If the frame doesn't make it out whole, the cursor still has to be
        // put back where the caller left it.
        let mut out = scopeguard::guard(&mut inner.out, |out| {
            let _ = out.write_all(ansi::RESTORE_CURSOR.as_bytes());
            let _ = out.flush();
        });
        write_flush(&mut **out, &frame)?;
        scopeguard::ScopeGuard::into_inner(out);

        Ok(())
    }

    /// Give the bottom row back to the terminal.
    ///
    /// Only the first call does anything, no matter how many threads race to
    /// make it. Afterwards, the bar is inert.
    pub fn cleanup(&self) -> Result<(), Error> {
        if self.shared.released.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        let closers = std::mem::take(&mut *self.shared.closers.lock());
        closers.into_iter().for_each(|close| close());

        let mut inner = self.shared.inner.lock();

        match inner.state.layout {
            None => Ok(()),
            Some(layout) => {
                debug!("Releasing the bottom row.");
                let mut buf = String::new();
                ansi::release(&mut buf, layout.rows);
                inner.emit(&buf)
            }
        }
    }

    /// Release the bottom row and stop drawing for good, without tearing the
    /// bar down.
    pub(crate) fn go_headless(&self) -> Result<(), Error> {
        let mut inner = self.shared.inner.lock();
        inner.state.degraded = true;

        match inner.state.layout.take() {
            None => Ok(()),
            Some(layout) => {
                info!("Switching the progress bar to headless mode.");
                let mut buf = String::new();
                ansi::release(&mut buf, layout.rows);
                inner.emit(&buf)
            }
        }
    }

    /// Register something for the first cleanup to run. If cleanup has
    /// already happened, it runs immediately.
    pub(crate) fn on_cleanup<F>(&self, close: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let mut closers = self.shared.closers.lock();

        if self.shared.released.load(Ordering::SeqCst) {
            drop(closers);
            close();
        } else {
            closers.push(Box::new(close));
        }
    }

    pub(crate) fn is_released(&self) -> bool {
        self.shared.released.load(Ordering::SeqCst)
    }
}

impl<W: Write> Inner<W> {
    fn emit(&mut self, bytes: &str) -> Result<(), Error> {
        write_flush(&mut self.out, bytes)
    }
}

fn write_flush<W: Write>(out: &mut W, bytes: &str) -> Result<(), Error> {
    out.write_all(bytes.as_bytes())?;
    out.flush()?;
    Ok(())
}
