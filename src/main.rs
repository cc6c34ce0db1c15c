//! `bugtrack` (bt) - bug dashboard backend
//!
//! Local `SQLite` store with provider crawl, index and push.
//! Non-invasive design: no daemon, no network listener, no background processes.

use bugtrack::run;

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
