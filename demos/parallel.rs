//! Several threads sharing one bar.
//!
//! `Progress` is a handle to shared state, so unlike other progress bar
//! libraries no extra `Arc<Mutex<_>>` wrapping is needed.

use rand::Rng;
use rayon::prelude::*;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use talma::{Options, Progress, Tty, Watch};

const JOBS: u64 = 120;

fn main() -> Result<(), talma::Error> {
    env_logger::init();

    let options = Options {
        total: JOBS,
        done: "=".to_string(),
        pending: " ".to_string(),
    };
    let progress = Progress::with_options(options, std::io::stdout(), Tty::stdout())?;
    let _watchers = progress.watch(Watch::default().exit_code(130))?;
    let finished = AtomicU64::new(0);

    (0..JOBS)
        .into_par_iter()
        .try_for_each_with(progress.clone(), |p, n| {
            let wait = rand::thread_rng().gen_range(50, 400);
            std::thread::sleep(Duration::from_millis(wait));

            if rand::thread_rng().gen_ratio(1, 15) {
                println!("Job #{:03}: retrying", n);
            }

            let done = finished.fetch_add(1, Ordering::SeqCst) + 1;
            p.render(done)
        })?;

    progress.cleanup()?;
    println!("Complete!");
    Ok(())
}
