//! Backend health command.

use std::ops::ControlFlow;

use vexa_client::HealthReport;
use vexa_sync::PeriodicTask;

use crate::app::{failed, App};

pub(crate) async fn run(app: &App, watch: bool) -> miette::Result<()> {
    if !watch {
        let report = app
            .client
            .health()
            .await
            .map_err(|e| failed("check health", e))?;
        print_report(&report);
        return Ok(());
    }

    println!(
        "Checking {} every {}s. Press Ctrl-C to stop.",
        app.client.base_url(),
        app.sync.health_interval.as_secs()
    );

    let client = app.client.clone();
    let _task = PeriodicTask::spawn("health monitor", app.sync.health_interval, move |_| {
        let client = client.clone();
        async move {
            match client.health().await {
                Ok(report) => print_report(&report),
                Err(e) => println!("Backend unreachable: {}", e),
            }
            ControlFlow::Continue(())
        }
    });

    tokio::signal::ctrl_c()
        .await
        .map_err(|e| miette::miette!("Failed to wait for Ctrl-C: {}", e))?;
    Ok(())
}

fn print_report(report: &HealthReport) {
    if report.is_healthy() {
        println!("Backend: {}", report.status);
    } else {
        println!(
            "Backend: {} (degraded: {})",
            report.status,
            report.degraded_services().join(", ")
        );
    }
    for (service, state) in &report.services {
        println!("  {:<12} {}", service, state);
    }
}
