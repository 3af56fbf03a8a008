//! `ragpilot session`: start a new session or inspect the current one.

use ragpilot_core::SessionStore;

use crate::runtime::{self, CliResult};

/// Characters of each message shown by `session show`.
const PREVIEW_CHARS: usize = 200;

pub async fn new() -> CliResult<()> {
    let config = runtime::load_config()?;
    let sessions = runtime::open_sessions(&config);
    let previous = sessions.session_id().await;
    let had_messages = !sessions.history().await.is_empty();

    let session = sessions.reset().await?;
    if had_messages {
        println!(
            "Archived {previous} to {}",
            sessions.archive_path(&previous).display()
        );
    }
    println!("Started session {}", session.session_id);
    Ok(())
}

pub async fn show() -> CliResult<()> {
    let config = runtime::load_config()?;
    let sessions = runtime::open_sessions(&config);
    let session = sessions.snapshot().await;

    println!("Session  {}", session.session_id);
    println!("Created  {}", session.created_at.format("%Y-%m-%d %H:%M:%S UTC"));
    println!("Updated  {}", session.updated_at.format("%Y-%m-%d %H:%M:%S UTC"));
    println!("Messages {}", session.messages.len());

    for message in &session.messages {
        println!();
        println!("[{}] {}", message.role, preview(&message.content));
    }
    Ok(())
}

fn preview(text: &str) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    match flat.char_indices().nth(PREVIEW_CHARS) {
        Some((cut, _)) => format!("{}...", &flat[..cut]),
        None => flat,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preview_flattens_and_shortens() {
        assert_eq!(preview("fn main() {\n    run();\n}"), "fn main() { run(); }");
        let long = "é".repeat(PREVIEW_CHARS + 10);
        let shown = preview(&long);
        assert!(shown.ends_with("..."));
        assert_eq!(shown.chars().count(), PREVIEW_CHARS + 3);
    }
}
