//! Web search command.

use vexa_client::SearchKind;

use crate::app::{failed, App};

pub(crate) async fn run(app: &App, query: &str, weather: bool) -> miette::Result<()> {
    let kind = if weather {
        SearchKind::Weather
    } else {
        SearchKind::General
    };
    let result = app
        .client
        .search_web(query, kind)
        .await
        .map_err(|e| failed("search", e))?;

    if !result.success {
        return Err(miette::miette!("Search returned no results"));
    }

    let rendered = serde_json::to_string_pretty(&result.data)
        .map_err(|e| miette::miette!("Failed to render results: {}", e))?;
    println!("{}", rendered);
    Ok(())
}
