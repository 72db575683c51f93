//! Background listeners for resize and termination notices.

use crate::{Error, Progress};
use log::{debug, warn};
use signal_hook::consts::signal::{SIGINT, SIGTERM, SIGWINCH};
use signal_hook::iterator::{Handle, Signals};
use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// What to do when the window size can't be measured after a resize.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResizeFailure {
    /// Release the bottom row and stop drawing. Later resizes don't bring
    /// the bar back.
    Headless,
    /// Keep drawing with the last known layout.
    KeepLayout,
    /// Restore the terminal and exit, as on a termination signal.
    Terminate,
}

/// Settings for [`Progress::watch`].
///
/// By default a termination signal restores the terminal and exits with
/// status `1`, and a failed resize query switches the bar to headless mode.
pub struct Watch {
    exit_code: i32,
    on_resize_error: ResizeFailure,
    errors: Option<Sender<Error>>,
    exit: Arc<dyn Fn(i32) + Send + Sync>,
}

impl Default for Watch {
    fn default() -> Watch {
        Watch {
            exit_code: 1,
            on_resize_error: ResizeFailure::Headless,
            errors: None,
            exit: Arc::new(exit_process),
        }
    }
}

impl Watch {
    /// The process exit status after a termination notice.
    pub fn exit_code(mut self, code: i32) -> Watch {
        self.exit_code = code;
        self
    }

    /// How to react when the window size can't be queried after a resize.
    pub fn on_resize_error(mut self, policy: ResizeFailure) -> Watch {
        self.on_resize_error = policy;
        self
    }

    /// Forward resize failures here, in addition to handling them.
    pub fn report_errors(mut self, errors: Sender<Error>) -> Watch {
        self.errors = Some(errors);
        self
    }

    /// Replace [`std::process::exit`] as the way the process ends.
    pub fn on_exit<F>(mut self, exit: F) -> Watch
    where
        F: Fn(i32) + Send + Sync + 'static,
    {
        self.exit = Arc::new(exit);
        self
    }
}

/// The two listener threads.
///
/// Dropping this detaches them.
pub struct Watchers {
    resize: JoinHandle<()>,
    terminate: JoinHandle<()>,
}

impl Watchers {
    /// Wait for both listeners to finish.
    ///
    /// For OS signals this happens after [`Progress::cleanup`]. Injected
    /// sources must also end, or deliver one more notice after cleanup.
    ///
    /// Both threads are always joined. The error is that of the first one
    /// which panicked.
    pub fn join(self) -> thread::Result<()> {
        let resize = self.resize.join();
        let terminate = self.terminate.join();

        if resize.is_err() {
            warn!("The resize listener panicked.");
        }
        if terminate.is_err() {
            warn!("The termination listener panicked.");
        }

        resize.and(terminate)
    }
}

/// OS signals, one `()` per delivery.
struct Notices(Signals);

impl Iterator for Notices {
    type Item = ();

    fn next(&mut self) -> Option<()> {
        self.0
            .forever()
            .next()
            .map(|signal| debug!("Received signal {}.", signal))
    }
}

impl<W: Write + Send + 'static> Progress<W> {
    /// Listen for `SIGWINCH`, `SIGINT` and `SIGTERM` in the background.
    ///
    /// The signal subscriptions are closed by the first [`Progress::cleanup`].
    /// From then on `SIGINT` and `SIGTERM` get their default action again.
    pub fn watch(&self, watch: Watch) -> Result<Watchers, Error> {
        let released = Arc::new(AtomicBool::new(false));

        for signal in &[SIGINT, SIGTERM] {
            signal_hook::flag::register_conditional_default(*signal, Arc::clone(&released))
                .map_err(Error::Signals)?;
        }

        let resize = Signals::new(&[SIGWINCH]).map_err(Error::Signals)?;
        let terminate = Signals::new(&[SIGINT, SIGTERM]).map_err(Error::Signals)?;
        let handles: [Handle; 2] = [resize.handle(), terminate.handle()];

        self.on_cleanup(move || {
            handles.iter().for_each(Handle::close);
            released.store(true, Ordering::SeqCst);
        });

        Ok(self.watch_with(watch, Notices(resize), Notices(terminate)))
    }

    /// Like [`Progress::watch`], but with any two notice sources in place of
    /// real signals. Each `()` yielded by `resize` triggers a re-layout; the
    /// first `()` yielded by `terminate` triggers cleanup and exit.
    ///
    /// ```
    /// use std::sync::mpsc::channel;
    /// use talma::{Progress, Watch};
    ///
    /// let progress = Progress::new(10)?;
    /// let (resize, resized) = channel();
    /// let (terminate, terminated) = channel::<()>();
    /// let watchers = progress.watch_with(Watch::default(), resized, terminated);
    ///
    /// resize.send(()).unwrap();
    /// drop(resize);
    /// progress.cleanup()?;
    /// drop(terminate);
    /// watchers.join().unwrap();
    /// # Ok::<(), talma::Error>(())
    /// ```
    pub fn watch_with<R, T>(&self, watch: Watch, resize: R, terminate: T) -> Watchers
    where
        R: IntoIterator<Item = ()>,
        R::IntoIter: Send + 'static,
        T: IntoIterator<Item = ()>,
        T::IntoIter: Send + 'static,
    {
        let Watch {
            exit_code,
            on_resize_error,
            errors,
            exit,
        } = watch;

        let resize = {
            let progress = self.clone();
            let exit = Arc::clone(&exit);
            let notices = resize.into_iter();

            thread::spawn(move || {
                for () in notices {
                    if progress.is_released() {
                        break;
                    }

                    if let Err(e) = progress.update_window_size() {
                        warn!("Could not update the window size: {}", e);

                        match on_resize_error {
                            ResizeFailure::KeepLayout => {}
                            ResizeFailure::Headless => {
                                if let Err(e) = progress.go_headless() {
                                    warn!("Could not release the bottom row: {}", e);
                                }
                            }
                            ResizeFailure::Terminate => {
                                shut_down(&progress, &*exit, exit_code);
                            }
                        }

                        if let Some(errors) = &errors {
                            let _ = errors.send(e);
                        }
                    }
                }
            })
        };

        let terminate = {
            let progress = self.clone();
            let mut notices = terminate.into_iter();

            thread::spawn(move || {
                if notices.next().is_some() && !progress.is_released() {
                    shut_down(&progress, &*exit, exit_code);
                }
            })
        };

        Watchers { resize, terminate }
    }
}

fn exit_process(code: i32) {
    std::process::exit(code)
}

fn shut_down<W>(progress: &Progress<W>, exit: &(dyn Fn(i32) + Send + Sync), code: i32)
where
    W: Write + Send,
{
    if let Err(e) = progress.cleanup() {
        warn!("Could not restore the terminal: {}", e);
    }

    debug!("Exiting with status {}.", code);
    exit(code);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Capture, Script};
    use crate::Options;
    use parking_lot::Mutex;
    use std::os::unix::process::ExitStatusExt;
    use std::process::{Command, Stdio};
    use std::sync::mpsc::{channel, Receiver};
    use test_log::test;

    fn bar(script: &Script, out: &Capture) -> Progress<Capture> {
        let options = Options {
            total: 10,
            ..Options::default()
        };
        let p = Progress::with_options(options, out.clone(), script.clone()).unwrap();
        out.take();
        p
    }

    /// Exit statuses arrive on the receiver instead of ending the process.
    fn recording_exit() -> (Watch, Receiver<i32>) {
        let (tx, rx) = channel();
        let tx = Mutex::new(tx);
        let watch = Watch::default().on_exit(move |code| {
            let _ = tx.lock().send(code);
        });
        (watch, rx)
    }

    fn exits(codes: &Receiver<i32>) -> Vec<i32> {
        codes.try_iter().collect()
    }

    const RELEASE: &str = "\x1B7\x1B[0;24r\x1B[24;0f\x1B[0K\x1B8";

    #[test]
    fn resize_notices_relayout() {
        let script = Script::terminal(80, 24);
        let out = Capture::default();
        let p = bar(&script, &out);
        let (watch, codes) = recording_exit();
        let (resize, resized) = channel();
        let (terminate, terminated) = channel::<()>();
        let watchers = p.watch_with(watch, resized, terminated);

        script.set_terminal(12, 40);
        resize.send(()).unwrap();
        drop(resize);
        drop(terminate);
        watchers.join().unwrap();

        assert_eq!(Some(9), p.header_width());
        assert_eq!("\x1BD\x1B7\x1B[0;39r\x1B8\x1B[1A", out.take());
        assert!(exits(&codes).is_empty());
    }

    #[test]
    fn terminate_notice_cleans_up_and_exits() {
        let out = Capture::default();
        let p = bar(&Script::terminal(80, 24), &out);
        let (watch, codes) = recording_exit();
        let (resize, resized) = channel::<()>();
        let (terminate, terminated) = channel();
        let watchers = p.watch_with(watch, resized, terminated);

        terminate.send(()).unwrap();
        drop(terminate);
        assert_eq!(1, codes.recv().unwrap());

        // The resize listener is parked until its next notice, which now
        // arrives after cleanup.
        resize.send(()).unwrap();
        drop(resize);
        watchers.join().unwrap();

        assert!(exits(&codes).is_empty());
        assert_eq!(RELEASE, out.take());

        p.render(3).unwrap();
        assert_eq!("", out.take());
    }

    #[test]
    fn explicit_cleanup_disarms_termination() {
        let out = Capture::default();
        let p = bar(&Script::terminal(80, 24), &out);
        let (watch, codes) = recording_exit();
        let (resize, resized) = channel::<()>();
        let (terminate, terminated) = channel();
        let watchers = p.watch_with(watch.exit_code(3), resized, terminated);

        p.cleanup().unwrap();
        terminate.send(()).unwrap();
        drop(terminate);
        drop(resize);
        watchers.join().unwrap();

        assert!(exits(&codes).is_empty());
        assert_eq!(RELEASE, out.take());
    }

    #[test]
    fn failed_resizes_degrade_to_headless() {
        let script = Script::terminal(80, 24);
        let out = Capture::default();
        let p = bar(&script, &out);
        let (errors, failures) = channel();
        let (watch, codes) = recording_exit();
        let (resize, resized) = channel();
        let (terminate, terminated) = channel::<()>();
        let watchers = p.watch_with(watch.report_errors(errors), resized, terminated);

        script.set_failing();
        resize.send(()).unwrap();
        drop(resize);
        drop(terminate);
        watchers.join().unwrap();

        assert!(matches!(failures.recv().unwrap(), Error::TerminalQuery(_)));
        assert!(p.is_headless());
        assert_eq!(RELEASE, out.take());
        assert!(exits(&codes).is_empty());

        p.render(5).unwrap();
        p.update_window_size().unwrap();
        assert!(p.is_headless());
        p.cleanup().unwrap();
        assert_eq!("", out.take());
    }

    #[test]
    fn recovered_terminals_stay_headless() {
        let script = Script::terminal(80, 24);
        let out = Capture::default();
        let p = bar(&script, &out);
        let (errors, failures) = channel();
        let (watch, _codes) = recording_exit();
        let (resize, resized) = channel();
        let (terminate, terminated) = channel::<()>();
        let watchers = p.watch_with(watch.report_errors(errors), resized, terminated);

        script.set_failing();
        resize.send(()).unwrap();
        failures.recv().unwrap();
        script.set_terminal(100, 50);
        resize.send(()).unwrap();
        drop(resize);
        drop(terminate);
        watchers.join().unwrap();

        assert!(p.is_headless());
        assert_eq!(RELEASE, out.take());
        p.render(7).unwrap();
        assert_eq!("", out.take());
    }

    #[test]
    fn panicking_listeners_surface_on_join() {
        let out = Capture::default();
        let p = bar(&Script::terminal(80, 24), &out);
        let (watch, _codes) = recording_exit();
        let broken = std::iter::from_fn(|| -> Option<()> { panic!("notice source failed") });
        let (terminate, terminated) = channel::<()>();
        let watchers = p.watch_with(watch, broken, terminated);

        drop(terminate);
        assert!(watchers.join().is_err());
    }

    const INTERRUPT_CHILD: &str = "TALMA_INTERRUPT_AFTER_CLEANUP";

    /// Runs itself again in a child process, which installs the real signal
    /// handlers, releases the bar and then interrupts itself.
    #[test]
    fn interrupts_after_cleanup_use_the_default_action() {
        if std::env::var_os(INTERRUPT_CHILD).is_some() {
            let progress = Progress::new(10).unwrap();
            let _watchers = progress.watch(Watch::default()).unwrap();
            progress.cleanup().unwrap();

            unsafe {
                libc::raise(libc::SIGINT);
            }
            std::thread::sleep(std::time::Duration::from_secs(2));
            return;
        }

        let status = Command::new(std::env::current_exe().unwrap())
            .args(&[
                "--exact",
                "watch::tests::interrupts_after_cleanup_use_the_default_action",
                "--nocapture",
            ])
            .env(INTERRUPT_CHILD, "1")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .unwrap();

        assert_eq!(Some(libc::SIGINT), status.signal());
    }

    #[test]
    fn failed_resizes_can_keep_the_layout() {
        let script = Script::terminal(80, 24);
        let out = Capture::default();
        let p = bar(&script, &out);
        let (watch, _) = recording_exit();
        let (resize, resized) = channel();
        let (terminate, terminated) = channel::<()>();
        let watchers = p.watch_with(
            watch.on_resize_error(ResizeFailure::KeepLayout),
            resized,
            terminated,
        );

        script.set_failing();
        resize.send(()).unwrap();
        drop(resize);
        drop(terminate);
        watchers.join().unwrap();

        assert!(!p.is_headless());
        assert_eq!("", out.take());
        p.render(10).unwrap();
        assert!(out.take().contains("\x1B[24;0HProgress: [\x1B[33m100%"));
    }

    #[test]
    fn failed_resizes_can_terminate() {
        let script = Script::terminal(80, 24);
        let out = Capture::default();
        let p = bar(&script, &out);
        let (watch, codes) = recording_exit();
        let (resize, resized) = channel();
        let (terminate, terminated) = channel::<()>();
        let watchers = p.watch_with(
            watch.on_resize_error(ResizeFailure::Terminate).exit_code(2),
            resized,
            terminated,
        );

        script.set_failing();
        resize.send(()).unwrap();
        drop(resize);
        drop(terminate);
        watchers.join().unwrap();

        assert_eq!(vec![2], exits(&codes));
        assert_eq!(RELEASE, out.take());
    }
}
