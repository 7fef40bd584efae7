//! Usage statistics command.

use vexa_client::ClientError;
use vexa_sync::{DashboardRefresher, DashboardStats};

use crate::app::{failed, signed_out, App};

pub(crate) async fn run(app: &App, watch: bool) -> miette::Result<()> {
    let refresher = DashboardRefresher::new(app.client.clone());

    if !watch {
        let stats = refresher
            .refresh()
            .await
            .map_err(|e| failed("load dashboard", e))?;
        print_stats(&stats);
        return Ok(());
    }

    if !app.client.guard().is_authenticated() {
        return Err(failed("load dashboard", ClientError::NotAuthenticated));
    }

    let mut updates = refresher.subscribe();
    let _task = refresher.spawn(app.sync.dashboard_interval);
    let session = signed_out(app.session());
    tokio::pin!(session);

    loop {
        tokio::select! {
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                let stats = updates.borrow_and_update().clone();
                print_stats(&stats);
            }
            _ = &mut session => {
                return Err(failed("refresh dashboard", ClientError::AuthExpired));
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }
    Ok(())
}

fn print_stats(stats: &DashboardStats) {
    let health = match stats.backend_healthy {
        Some(true) => "healthy",
        Some(false) => "unhealthy",
        None => "unknown",
    };

    println!("Vexa dashboard");
    println!("==============");
    println!("Questions asked:    {}", stats.queries_label());
    println!("LLM models:         {}", stats.llm_models);
    println!(
        "Fine-tuned models:  {} ({} training, {} ready)",
        stats.fine_tuned_models, stats.training_models, stats.ready_models
    );
    println!("Backend:            {}", health);
    println!();
}
