//! Fine-tuning commands.

use std::path::Path;

use vexa_client::{
    AccessGrant, AccessLevel, ClientError, DatasetType, FineTuneRequest, ModelUpdate, ResourceId,
    TrackedResource, TrainingDataset, TrainingParams, ValidationStatus,
};
use vexa_sync::{FineTunedModels, PollingSynchronizer};

use crate::app::{failed, signed_out, App};

/// List fine-tuned models.
pub(crate) async fn list(app: &App, specialization: Option<&str>) -> miette::Result<()> {
    let models = app
        .client
        .fine_tuned_models(specialization)
        .await
        .map_err(|e| failed("list fine-tuned models", e))?;

    if models.is_empty() {
        println!("No fine-tuned models yet.");
        println!();
        println!("To create one, run:");
        println!("  vexa train create <name> --base-model <model> --specialization <area>");
        return Ok(());
    }

    println!("Fine-tuned models:");
    for model in &models {
        println!("  {}", summary(model));
    }
    Ok(())
}

pub(crate) async fn create(
    app: &App,
    name: String,
    base_model: String,
    specialization: String,
    description: Option<String>,
) -> miette::Result<()> {
    let request = FineTuneRequest {
        model_name: name,
        base_model,
        specialization,
        description,
    };
    let model = app
        .actions
        .create_model(&request)
        .await
        .ok_or_else(|| miette::miette!("Model was not created"))?;

    println!("Model id: {}", model.id);
    println!();
    println!("Training needs a valid dataset. To upload one, run:");
    println!("  vexa train dataset upload {} <file>", model.id);
    println!();
    println!("Then start training with:");
    println!("  vexa train start {} --watch", model.id);
    Ok(())
}

pub(crate) async fn start(
    app: &App,
    id: &str,
    params: &TrainingParams,
    watch: bool,
) -> miette::Result<()> {
    let id = ResourceId::new(id);
    let sync = synchronizer(app);
    if !app.actions.start_training(&sync, &id, params).await {
        return Err(miette::miette!("Training of model {} was not started", id));
    }

    if watch {
        follow(app, &sync).await
    } else {
        println!("To follow progress, run:");
        println!("  vexa train watch {}", id);
        Ok(())
    }
}

pub(crate) async fn stop(app: &App, id: &str) -> miette::Result<()> {
    let id = ResourceId::new(id);
    if app.actions.stop_training(&id).await {
        Ok(())
    } else {
        Err(miette::miette!("Training of model {} was not stopped", id))
    }
}

pub(crate) async fn status(app: &App, id: &str) -> miette::Result<()> {
    let model = app
        .client
        .training_status(&ResourceId::new(id))
        .await
        .map_err(|e| failed("load training status", e))?;

    println!("{}", summary(&model));
    if let Some(done) = &model.completed_at {
        println!("Completed at: {}", done);
    }
    Ok(())
}

pub(crate) async fn logs(
    app: &App,
    id: &str,
    limit: u32,
    level: Option<&str>,
) -> miette::Result<()> {
    let entries = app
        .client
        .training_logs(&ResourceId::new(id), limit, level)
        .await
        .map_err(|e| failed("load training logs", e))?;

    if entries.is_empty() {
        println!("No log entries.");
        return Ok(());
    }

    // Backend returns newest first.
    for entry in entries.iter().rev() {
        let mut line = format!("{:<7} {}", entry.log_level, entry.message);
        if let Some(step) = entry.step {
            line.push_str(&format!(" step={}", step));
        }
        if let Some(loss) = &entry.loss {
            line.push_str(&format!(" loss={}", loss));
        }
        println!("{}", line);
    }
    Ok(())
}

/// Wait for the given models to finish training.
pub(crate) async fn watch(app: &App, ids: &[String]) -> miette::Result<()> {
    let sync = synchronizer(app);
    for id in ids {
        sync.track(ResourceId::new(id));
    }
    follow(app, &sync).await
}

pub(crate) async fn delete(app: &App, id: &str) -> miette::Result<()> {
    let id = ResourceId::new(id);
    let sync = synchronizer(app);
    if app.actions.delete_model(&sync, &id).await {
        Ok(())
    } else {
        Err(miette::miette!("Model {} was not deleted", id))
    }
}

pub(crate) async fn base_models(app: &App) -> miette::Result<()> {
    let models = app
        .client
        .base_models()
        .await
        .map_err(|e| failed("list base models", e))?;

    println!("Base models:");
    for (path, model) in models {
        println!("  {} ({})", model.name, path);
        if let Some(description) = &model.description {
            println!("      {}", description);
        }
        if !model.specializations.is_empty() {
            println!("      specializations: {}", model.specializations.join(", "));
        }
    }
    Ok(())
}

pub(crate) async fn update(app: &App, id: &str, update: &ModelUpdate) -> miette::Result<()> {
    let model = app
        .actions
        .update_model(&ResourceId::new(id), update)
        .await
        .ok_or_else(|| miette::miette!("Model {} was not updated", id))?;

    println!("  {}", summary(&model));
    Ok(())
}

pub(crate) async fn stats(app: &App, id: &str) -> miette::Result<()> {
    let stats = app
        .client
        .model_statistics(&ResourceId::new(id))
        .await
        .map_err(|e| failed("load model statistics", e))?;

    println!(
        "{} ({})",
        stats.model_name.as_deref().unwrap_or("unnamed"),
        stats.model_id
    );
    println!("  Status:         {}", stats.status);
    if let Some(base) = &stats.base_model {
        println!("  Base model:     {}", base);
    }
    if let Some(spec) = &stats.specialization {
        println!("  Specialization: {}", spec);
    }
    if let Some(size) = stats.model_size_bytes {
        println!("  Size:           {:.1} MB", size as f64 / (1024.0 * 1024.0));
    }
    println!("  Queries:        {}", stats.total_queries);
    if let Some(done) = &stats.completed_at {
        println!("  Completed at:   {}", done);
    }
    Ok(())
}

/// Upload a training file, inferring its type from the extension.
pub(crate) async fn dataset_upload(
    app: &App,
    id: &str,
    file: &Path,
    dataset_type: Option<DatasetType>,
    description: Option<&str>,
) -> miette::Result<()> {
    let dataset_type = match dataset_type {
        Some(kind) => kind,
        None => infer_dataset_type(file)?,
    };
    let dataset = app
        .actions
        .upload_dataset(&ResourceId::new(id), file, dataset_type, description)
        .await
        .ok_or_else(|| miette::miette!("Dataset {} was not uploaded", file.display()))?;

    println!("{}", dataset_line(&dataset));
    println!();
    if dataset.validation_status == ValidationStatus::Valid {
        println!("To start training, run:");
        println!("  vexa train start {} --watch", dataset.model_id);
    } else {
        println!("To see what is wrong, run:");
        println!("  vexa train dataset validate {}", dataset.id);
    }
    Ok(())
}

pub(crate) async fn dataset_list(app: &App, id: &str) -> miette::Result<()> {
    let datasets = app
        .client
        .datasets(&ResourceId::new(id))
        .await
        .map_err(|e| failed("list datasets", e))?;

    if datasets.is_empty() {
        println!("No datasets uploaded for model {}.", id);
        println!();
        println!("To upload one, run:");
        println!("  vexa train dataset upload {} <file>", id);
        return Ok(());
    }

    println!("Datasets:");
    for dataset in &datasets {
        println!("  {}", dataset_line(dataset));
    }
    Ok(())
}

pub(crate) async fn dataset_validate(app: &App, dataset_id: &str) -> miette::Result<()> {
    let report = app
        .client
        .validate_dataset(&ResourceId::new(dataset_id))
        .await
        .map_err(|e| failed("validate dataset", e))?;

    if report.is_valid {
        match report.row_count {
            Some(rows) => println!("Dataset {} is valid ({} rows).", dataset_id, rows),
            None => println!("Dataset {} is valid.", dataset_id),
        }
    } else {
        println!("Dataset {} is invalid:", dataset_id);
    }
    for error in &report.errors {
        println!("  error:   {}", error);
    }
    for warning in &report.warnings {
        println!("  warning: {}", warning);
    }
    Ok(())
}

pub(crate) async fn grant(
    app: &App,
    id: &str,
    user_id: i64,
    access_level: AccessLevel,
    expires_at: Option<String>,
) -> miette::Result<()> {
    let grant = AccessGrant {
        user_id,
        access_level,
        expires_at,
    };
    if app.actions.grant_access(&ResourceId::new(id), &grant).await {
        Ok(())
    } else {
        Err(miette::miette!("Access to model {} was not granted", id))
    }
}

pub(crate) async fn revoke(app: &App, id: &str, user_id: i64) -> miette::Result<()> {
    if app.actions.revoke_access(&ResourceId::new(id), user_id).await {
        Ok(())
    } else {
        Err(miette::miette!("Access to model {} was not revoked", id))
    }
}

pub(crate) async fn access(app: &App, id: &str) -> miette::Result<()> {
    let entries = app
        .client
        .access_list(&ResourceId::new(id))
        .await
        .map_err(|e| failed("list model access", e))?;

    println!("Access to model {}:", id);
    for entry in entries.iter().filter(|e| e.is_active) {
        let name = entry.username.as_deref().unwrap_or("?");
        let mut line = format!("  {:>4}  {:<16} {:<6}", entry.user_id, name, entry.access_level);
        if let Some(kind) = &entry.access_type {
            line.push_str(&format!(" ({})", kind));
        }
        if let Some(expires) = &entry.expires_at {
            line.push_str(&format!(" until {}", expires));
        }
        println!("{}", line);
    }
    Ok(())
}

fn infer_dataset_type(file: &Path) -> miette::Result<DatasetType> {
    file.extension()
        .and_then(|ext| ext.to_str())
        .and_then(DatasetType::from_extension)
        .ok_or_else(|| {
            miette::miette!(
                "Cannot tell the dataset type of {}. Use --type (jsonl, csv, pdf or txt).",
                file.display()
            )
        })
}

fn dataset_line(dataset: &TrainingDataset) -> String {
    let mut line = format!(
        "{:>4}  {:<24} {:<5} {:<7}",
        dataset.id.as_str(),
        dataset.filename,
        dataset.dataset_type,
        dataset.validation_status.as_str()
    );
    if let Some(rows) = dataset.row_count {
        line.push_str(&format!(" {} rows", rows));
    }
    line
}

fn synchronizer(app: &App) -> PollingSynchronizer {
    PollingSynchronizer::new(
        FineTunedModels::new(app.client.clone()),
        app.notifications.clone(),
        app.sync.training_interval,
    )
}

/// Poll until every watched model reached a terminal status.
async fn follow(app: &App, sync: &PollingSynchronizer) -> miette::Result<()> {
    if !app.client.guard().is_authenticated() {
        return Err(failed("watch training", ClientError::NotAuthenticated));
    }

    println!(
        "Watching {} model(s), checking every {}s. Press Ctrl-C to stop.",
        sync.watched().len(),
        app.sync.training_interval.as_secs()
    );

    let mut handle = sync.spawn();
    tokio::select! {
        _ = handle.finished() => {}
        _ = signed_out(app.session()) => {}
        _ = tokio::signal::ctrl_c() => {
            println!("Stopped watching.");
            return Ok(());
        }
    }

    if !app.client.guard().is_authenticated() {
        return Err(failed("watch training", ClientError::AuthExpired));
    }
    Ok(())
}

fn summary(model: &TrackedResource) -> String {
    let mut line = format!(
        "{:>4}  {:<24} {:<9}",
        model.id.as_str(),
        model.label(),
        model.status.as_str()
    );
    if !model.status.is_terminal() {
        line.push_str(&format!(" {}", progress_bar(model.progress)));
    }
    if let Some(spec) = &model.specialization {
        line.push_str(&format!("  [{}]", spec));
    }
    line
}

fn progress_bar(percent: u8) -> String {
    let filled = usize::from(percent.min(100)) / 5;
    format!("[{}{}] {:>3}%", "#".repeat(filled), "-".repeat(20 - filled), percent)
}

#[cfg(test)]
mod tests {
    use super::*;
    use vexa_client::ResourceStatus;

    #[test]
    fn test_progress_bar() {
        assert_eq!(progress_bar(0), format!("[{}]   0%", "-".repeat(20)));
        assert_eq!(progress_bar(50), format!("[{}{}]  50%", "#".repeat(10), "-".repeat(10)));
        assert_eq!(progress_bar(100), format!("[{}] 100%", "#".repeat(20)));
    }

    #[test]
    fn test_summary_hides_progress_when_done() {
        let done = TrackedResource::new("3", ResourceStatus::Completed).with_name("legal-bot");
        assert!(!summary(&done).contains('%'));
        let running = TrackedResource::new("4", ResourceStatus::Running).with_progress(40);
        assert!(summary(&running).contains("40%"));
    }

    #[test]
    fn test_dataset_type_from_file_name() {
        assert_eq!(
            infer_dataset_type(Path::new("data/manuals.JSONL")).unwrap(),
            DatasetType::Jsonl
        );
        assert_eq!(
            infer_dataset_type(Path::new("notes.txt")).unwrap(),
            DatasetType::Txt
        );
        assert!(infer_dataset_type(Path::new("slides.pptx")).is_err());
        assert!(infer_dataset_type(Path::new("README")).is_err());
    }
}
