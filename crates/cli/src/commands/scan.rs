//! Body scan commands.

#![allow(clippy::print_stdout)]

use threadline_core::{ScanId, ScanPhase, ScanRecord};
use threadline_storefront::Storefront;

use super::CliError;

/// Run one capture against the simulated camera and print the saved record.
///
/// With `cancel_after`, the capture is abandoned after that many countdown
/// ticks and nothing is saved.
///
/// # Errors
///
/// Fails for guests, or if the flow refuses a transition.
pub async fn simulate(storefront: &Storefront, cancel_after: Option<u32>) -> Result<(), CliError> {
    let scan = storefront.scan();
    let mut phases = scan.subscribe();

    scan.acquire_camera().await?;
    println!("Camera ready");
    scan.begin_capture().await?;

    let mut ticks = 0;
    while phases.changed().await.is_ok() {
        let phase = *phases.borrow_and_update();
        match phase {
            ScanPhase::CountingDown(remaining) => {
                println!("{remaining}...");
                ticks += 1;
                if cancel_after == Some(ticks) {
                    scan.cancel().await?;
                }
            }
            ScanPhase::Completing => println!("Capturing..."),
            ScanPhase::Idle => break,
            ScanPhase::RequestingCamera | ScanPhase::Previewing => {}
        }
    }

    let Some(identity) = storefront.session().current_user() else {
        return Ok(());
    };
    match scan.history().latest(&identity.id).await? {
        Some(record) if cancel_after.is_none() => print_record(&record),
        _ => println!("No scan saved"),
    }
    Ok(())
}

/// List saved scans, newest first.
///
/// # Errors
///
/// Returns `InvalidArgument` without `--user`, or the backend's read error.
pub async fn history(storefront: &Storefront) -> Result<(), CliError> {
    let identity = storefront
        .session()
        .current_user()
        .ok_or_else(|| CliError::InvalidArgument("scan history needs --user".to_string()))?;

    let scans = storefront.scan().history().history(&identity.id).await?;
    if scans.is_empty() {
        println!("No scans yet");
    }
    for record in scans.iter() {
        print_record(record);
    }
    Ok(())
}

/// Show one saved scan, or with `save` write its report to the current
/// directory.
///
/// # Errors
///
/// Fails for guests, for an unknown scan id, or if the file cannot be written.
pub async fn report(storefront: &Storefront, id: &str, save: bool) -> Result<(), CliError> {
    let scan_id = ScanId::new(id);
    let scan = storefront.scan();
    if save {
        let report = scan.download_report(&scan_id).await?;
        std::fs::write(&report.file_name, &report.contents)?;
        println!("Report written to {}", report.file_name);
    } else {
        let record = scan.view_report(&scan_id).await?;
        print_record(&record);
        if let Some(m) = &record.measurements {
            println!("{}", serde_json::to_string_pretty(m)?);
        }
    }
    Ok(())
}

fn print_record(record: &ScanRecord) {
    println!(
        "{}  {}  {}  try-ons: {}",
        record.scan_id,
        record.timestamp.to_rfc3339(),
        record.device,
        record.try_on_count,
    );
}
