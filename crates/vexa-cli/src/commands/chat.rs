//! Chat and history commands.

use vexa_client::ResourceId;
use vexa_sync::AttachmentOutcome;

use crate::app::{failed, App};

pub(crate) async fn ask(
    app: &App,
    text: &str,
    context: Option<&str>,
    model: Option<&str>,
) -> miette::Result<()> {
    let model = model.map(ResourceId::new);
    let Some(outcome) = app
        .actions
        .send_message(text, context, model.as_ref())
        .await
    else {
        return Err(miette::miette!("No reply received"));
    };

    println!("{}", outcome.response.response_text);
    if let Some(used) = &outcome.response.model_used {
        println!();
        println!("(answered by {})", used);
    }
    if let AttachmentOutcome::Saved(path) = &outcome.attachment {
        println!("File saved to: {}", path.display());
    }
    Ok(())
}

pub(crate) async fn history(app: &App, skip: u32, limit: u32) -> miette::Result<()> {
    let queries = app
        .client
        .queries(skip, limit)
        .await
        .map_err(|e| failed("load history", e))?;

    if queries.is_empty() {
        println!("No questions yet.");
        return Ok(());
    }

    for query in queries {
        let when = query.timestamp.as_deref().unwrap_or("-");
        println!("#{} [{}] {}", query.id, when, query.query_text);
        if let Some(answer) = &query.response_text {
            println!("    {}", first_line(answer));
        }
    }
    Ok(())
}

pub(crate) async fn delete(app: &App, id: i64) -> miette::Result<()> {
    if app.actions.delete_query(id).await {
        Ok(())
    } else {
        Err(miette::miette!("Query #{} was not deleted", id))
    }
}

fn first_line(text: &str) -> &str {
    text.lines().next().unwrap_or("")
}
