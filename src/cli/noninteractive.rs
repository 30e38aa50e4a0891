use anyhow::Result;

use crate::chat::Completion;
use crate::core::session::ChatId;

pub async fn run(
    mut app: super::App,
    prompt: String,
    output_format: super::OutputFormat,
    session: Option<ChatId>,
) -> Result<()> {
    match &session {
        Some(id) => app.chat.switch_to(id).map_err(|e| anyhow::anyhow!("{e}"))?,
        None => {
            app.chat.new_chat().await;
        }
    }

    let Some(chat_id) = app.chat.submit(&prompt).await else {
        anyhow::bail!("Prompt is empty");
    };

    let completion = tokio::select! {
        event = app.events.recv() => match event {
            Some(event) => app.chat.apply(event).await,
            None => anyhow::bail!("Request task ended without a result"),
        },
        _ = tokio::signal::ctrl_c() => {
            app.chat.cancel(&chat_id);
            Completion::Cancelled
        }
    };

    match output_format {
        super::OutputFormat::Text => match completion {
            Completion::Answered(answer) => println!("{answer}"),
            Completion::Failed(e) => anyhow::bail!("{e}"),
            Completion::Cancelled | Completion::Stale => eprintln!("Cancelled."),
        },
        super::OutputFormat::Json => {
            let output = match completion {
                Completion::Answered(answer) => serde_json::json!({
                    "session": chat_id.as_str(),
                    "title": app.chat.store().display_title(&chat_id),
                    "answer": answer,
                }),
                Completion::Failed(e) => serde_json::json!({
                    "session": chat_id.as_str(),
                    "error": e.to_string(),
                }),
                Completion::Cancelled | Completion::Stale => serde_json::json!({
                    "session": chat_id.as_str(),
                    "cancelled": true,
                }),
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }

    Ok(())
}
