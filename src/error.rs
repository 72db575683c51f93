use std::io;
use thiserror::Error;

/// Everything that can go wrong while driving a [`crate::Progress`].
///
/// Note that "stdout is not a terminal" is not among these. That condition
/// switches the bar into headless mode instead.
#[derive(Debug, Error)]
pub enum Error {
    /// The terminal size query failed for a reason other than the output not
    /// being a terminal.
    #[error("could not query the terminal size: {0}")]
    TerminalQuery(#[source] io::Error),

    /// A total of zero iterations was given.
    #[error("the total number of iterations must be greater than zero")]
    InvalidTotal,

    /// Control codes could not be written.
    #[error("could not write to the terminal: {0}")]
    Write(#[from] io::Error),

    /// OS signal handlers could not be installed.
    #[error("could not register signal handlers: {0}")]
    Signals(#[source] io::Error),
}
