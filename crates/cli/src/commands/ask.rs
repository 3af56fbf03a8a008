//! `ragpilot ask`: answer a single question.

use std::io::Write;

use crate::runtime::{self, CliResult};

pub async fn run(question: &str, stream: bool) -> CliResult<()> {
    let config = runtime::load_config()?;
    runtime::require_api_key(&config)?;
    let agent = runtime::build_agent(&config)?;

    let answer = if stream {
        let mut stdout = std::io::stdout();
        let answer = agent
            .ask_streaming(question, |delta| {
                print!("{delta}");
                let _ = stdout.flush();
            })
            .await?;
        println!();
        answer
    } else {
        let answer = agent.ask(question).await?;
        println!("{}", answer.answer);
        answer
    };

    if answer.context.is_truncated() {
        tracing::info!(
            warnings = answer.context.warnings.len(),
            "Context was trimmed to fit; run `ragpilot context` to see what was left out"
        );
    }
    if let Some(usage) = answer.usage {
        tracing::debug!(
            model = %answer.model,
            prompt_tokens = usage.prompt_tokens,
            completion_tokens = usage.completion_tokens,
            "Usage"
        );
    }
    Ok(())
}
