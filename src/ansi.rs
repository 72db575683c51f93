//! Raw VT100 control sequences.

use std::fmt::Write;

pub(crate) const SAVE_CURSOR: &str = "\x1B7";
pub(crate) const RESTORE_CURSOR: &str = "\x1B8";
const INDEX: &str = "\x1BD";
const CURSOR_UP: &str = "\x1B[1A";
const ERASE_LINE: &str = "\x1B[2K";
const ERASE_LINE_END: &str = "\x1B[0K";
const ERASE_BELOW: &str = "\x1B[0J";
const ERASE_ABOVE: &str = "\x1B[1J";
const ALT_SCREEN_ON: &str = "\x1B[?47h";
const ALT_SCREEN_OFF: &str = "\x1B[?47l";

/// Carve the bottom row out of the scrolling region.
pub(crate) fn reserve(buf: &mut String, rows: u16) {
    buf.push_str(INDEX);
    buf.push_str(SAVE_CURSOR);
    let _ = write!(buf, "\x1B[0;{}r", rows.saturating_sub(1));
    buf.push_str(RESTORE_CURSOR);
    buf.push_str(CURSOR_UP);
}

/// Give the bottom row back and blank it.
pub(crate) fn release(buf: &mut String, rows: u16) {
    buf.push_str(SAVE_CURSOR);
    let _ = write!(buf, "\x1B[0;{}r", rows);
    let _ = write!(buf, "\x1B[{};0f", rows);
    buf.push_str(ERASE_LINE_END);
    buf.push_str(RESTORE_CURSOR);
}

/// Everything a redraw emits before the bar itself. The alternate-screen
/// flip clears artifacts some emulators leave after the region changes.
/// The caller owes a [`RESTORE_CURSOR`] afterwards.
pub(crate) fn frame_start(buf: &mut String) {
    buf.push_str(SAVE_CURSOR);
    buf.push_str(ERASE_LINE);
    buf.push_str(ERASE_BELOW);
    buf.push_str(ALT_SCREEN_ON);
    buf.push_str(ERASE_ABOVE);
    buf.push_str(ALT_SCREEN_OFF);
}

pub(crate) fn move_to_row(buf: &mut String, row: u16) {
    let _ = write!(buf, "\x1B[{};0H", row);
}
