//! Terminal size queries.

use std::io;
use std::os::unix::io::RawFd;

/// The dimensions reported by the terminal device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WinSize {
    pub rows: u16,
    pub columns: u16,
    /// Width in pixels, `0` if the terminal doesn't say.
    pub x_pixels: u16,
    /// Height in pixels, `0` if the terminal doesn't say.
    pub y_pixels: u16,
}

impl WinSize {
    /// A size with no pixel information.
    pub fn new(rows: u16, columns: u16) -> WinSize {
        WinSize {
            rows,
            columns,
            x_pixels: 0,
            y_pixels: 0,
        }
    }
}

/// Something that can be asked for the current window size.
///
/// `Ok(None)` means "not a terminal", which is not an error: the bar simply
/// goes quiet. Only genuine device failures should come back as `Err`.
pub trait Probe: Send + Sync {
    fn size(&self) -> io::Result<Option<WinSize>>;
}

/// Queries a real terminal device with `TIOCGWINSZ`.
#[derive(Debug, Clone, Copy)]
pub struct Tty {
    fd: RawFd,
}

impl Tty {
    /// Probe whatever `stdout` is attached to.
    pub fn stdout() -> Tty {
        Tty {
            fd: libc::STDOUT_FILENO,
        }
    }

    /// Probe an arbitrary descriptor.
    pub fn from_fd(fd: RawFd) -> Tty {
        Tty { fd }
    }
}

impl Probe for Tty {
    fn size(&self) -> io::Result<Option<WinSize>> {
        let mut ws: libc::winsize = unsafe { std::mem::zeroed() };

        // SAFETY: `ws` is a valid, writable `winsize` for the whole call.
        let result = unsafe { libc::ioctl(self.fd, libc::TIOCGWINSZ, &mut ws) };

        if result == -1 {
            return match errno::errno().0 {
                // Redirected to a file or a pipe, or a device without a size.
                libc::ENOTTY | libc::ENODEV => Ok(None),
                code => Err(io::Error::from_raw_os_error(code)),
            };
        }

        Ok(Some(WinSize {
            rows: ws.ws_row,
            columns: ws.ws_col,
            x_pixels: ws.ws_xpixel,
            y_pixels: ws.ws_ypixel,
        }))
    }
}
