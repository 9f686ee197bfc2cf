//! CLI smoke entry point.
//!
//! # Responsibility
//! - Provide a minimal executable to verify `staffdesk_core` linkage.
//! - Open a store (file path argument, or in-memory) and print collection counts.

use staffdesk_core::{Store, StoreConfig};
use std::process::ExitCode;

fn main() -> ExitCode {
    println!("staffdesk_core ping={}", staffdesk_core::ping());
    println!("staffdesk_core version={}", staffdesk_core::core_version());

    let config = match std::env::args().nth(1) {
        Some(path) => StoreConfig::with_database_path(path),
        None => StoreConfig::default(),
    };

    let store = match Store::open(config) {
        Ok(store) => store,
        Err(err) => {
            eprintln!("staffdesk open failed: {err}");
            return ExitCode::FAILURE;
        }
    };

    match store.collection_counts() {
        Ok(counts) => {
            for (collection, count) in counts {
                println!("{}={count}", collection.storage_key());
            }
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("staffdesk count failed: {err}");
            ExitCode::FAILURE
        }
    }
}
