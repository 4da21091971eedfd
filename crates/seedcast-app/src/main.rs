#![forbid(unsafe_code)]
#![deny(
    warnings,
    dead_code,
    unused,
    unused_imports,
    unused_must_use,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]

//! Binary entrypoint that wires the session services together and runs one
//! download, stream, or seed session to completion.

use std::process::ExitCode;

use seedcast_app::{report_fatal, run_app};

#[tokio::main]
async fn main() -> ExitCode {
    match run_app().await {
        Ok(code) => code,
        Err(err) => {
            report_fatal(&err);
            ExitCode::FAILURE
        }
    }
}
