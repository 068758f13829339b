//! Hot Reload Example
//!
//! Loads a database into a registry, watches the file, and answers lookups
//! read from stdin. Replace the database file while it runs (write a new
//! file next to it, then `mv` it over) and later lookups use the new data.
//!
//! Usage:
//!   RUST_LOG=info cargo run --example reload_demo -- <path-to-database.dat>
//!
//! Then type one address per line.

use iploc::{LocatorRegistry, ReloadWatcher};
use std::env;
use std::io::{self, BufRead};
use std::path::Path;
use std::sync::Arc;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    if args.len() != 2 {
        eprintln!("Usage: {} <database.dat>", args[0]);
        std::process::exit(1);
    }
    let db_path = Path::new(&args[1]);

    let registry = Arc::new(
        LocatorRegistry::builder()
            .on_reload(|event| {
                if event.success {
                    eprintln!("-- now serving generation {}", event.generation);
                } else {
                    eprintln!(
                        "-- reload failed, still on generation {}: {}",
                        event.generation,
                        event.error.unwrap_or_default()
                    );
                }
            })
            .build(),
    );
    registry.initialize(db_path)?;

    if let Some(locator) = registry.snapshot() {
        let stats = locator.stats();
        eprintln!(
            "Loaded {}: {} ranges, {} bytes",
            db_path.display(),
            stats.ranges,
            stats.buffer_bytes
        );
    }

    let _watcher = ReloadWatcher::spawn(Arc::clone(&registry), db_path)?;

    for line in io::stdin().lock().lines() {
        let line = line?;
        let addr = line.trim();
        if addr.is_empty() {
            continue;
        }
        match registry.lookup(addr) {
            Ok(record) => println!("{}", serde_json::to_string(&record)?),
            Err(e) => eprintln!("{}: {}", addr, e),
        }
    }

    Ok(())
}
