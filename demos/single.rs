//! A single bar with ordinary output scrolling above it.
//!
//! Try resizing the window while it runs, or pressing Ctrl-C.

use std::time::Duration;
use talma::{Progress, Watch};

const STEPS: u64 = 50;

fn main() -> Result<(), talma::Error> {
    env_logger::init();

    // Reserves the bottom row right away.
    let progress = Progress::new(STEPS)?;

    // Re-layout on resize, restore the terminal on Ctrl-C.
    let _watchers = progress.watch(Watch::default())?;

    for n in 1..=STEPS {
        progress.render(n)?;
        std::thread::sleep(Duration::from_millis(200));

        // Regular printing is unaffected by the bar.
        println!("Finished step {}", n);
    }

    progress.cleanup()?;
    println!("Complete!");
    Ok(())
}
