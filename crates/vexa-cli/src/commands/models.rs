//! LLM model commands.

use crate::app::{failed, App};

/// List installed models.
pub(crate) async fn list(app: &App) -> miette::Result<()> {
    let models = app
        .client
        .models()
        .await
        .map_err(|e| failed("list models", e))?;

    if models.is_empty() {
        println!("No models installed on the backend.");
        return Ok(());
    }

    println!("Installed models:");
    for model in models {
        match model.size {
            Some(size) => println!("  - {} ({})", model.name, human_size(size)),
            None => println!("  - {}", model.name),
        }
    }
    Ok(())
}

pub(crate) async fn switch(app: &App, name: &str) -> miette::Result<()> {
    if app.actions.switch_model(name).await {
        Ok(())
    } else {
        Err(miette::miette!("Model was not switched"))
    }
}

fn human_size(bytes: u64) -> String {
    const GB: f64 = 1024.0 * 1024.0 * 1024.0;
    const MB: f64 = 1024.0 * 1024.0;
    let bytes = bytes as f64;
    if bytes >= GB {
        format!("{:.1} GB", bytes / GB)
    } else {
        format!("{:.0} MB", bytes / MB)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_human_size() {
        assert_eq!(human_size(4_661_224_676), "4.3 GB");
        assert_eq!(human_size(300 * 1024 * 1024), "300 MB");
    }
}
