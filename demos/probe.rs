//! Probe the antimalware provider and scan a file.
//!
//! On Windows this talks to the system AMSI provider; elsewhere it falls back
//! to the mock provider so the flow can still be followed.
//!
//! Run with: cargo run --example probe -- [path]

use amsibridge::prelude::*;
use std::fs::File;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "amsibridge=debug".into()),
        )
        .init();

    #[cfg(windows)]
    let context = ScanContext::system(Some("amsibridge-probe"))?;
    #[cfg(not(windows))]
    let context = ScanContext::new(
        amsibridge::backends::MockProvider::new(),
        Some("amsibridge-probe"),
    )?;

    println!("Application name: {}", context.application_name());
    println!("Provider available: {}", context.is_available());

    if let Some(path) = std::env::args().nth(1) {
        let mut file = File::open(&path)?;
        match context.has_malware_in_stream(&mut file, &path) {
            Ok(true) => println!("{path}: malware detected"),
            Ok(false) => println!("{path}: clean"),
            Err(AmsiError::PolicyBlocked { verdict, .. }) => {
                println!("{path}: scanning blocked by admin policy (verdict {verdict})")
            }
            Err(err) => return Err(err.into()),
        }
    }

    let report = context.scan_report(b"an ordinary buffer", "buffer.txt")?;
    println!("{}", report.to_json()?);

    context.dispose();
    Ok(())
}
