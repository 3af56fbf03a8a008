//! `ragpilot chat`: interactive session with persistent history.

use std::io::Write;

use ragpilot_core::SessionStore;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::runtime::{self, CliResult};

/// One line typed at the prompt.
#[derive(Debug, PartialEq)]
enum ChatInput<'a> {
    Question(&'a str),
    New,
    Help,
    Exit,
    Unknown(&'a str),
    Empty,
}

impl<'a> ChatInput<'a> {
    fn parse(line: &'a str) -> Self {
        let line = line.trim();
        match line {
            "" => Self::Empty,
            "/new" | "/reset" => Self::New,
            "/help" | "/?" => Self::Help,
            "/exit" | "/quit" | "exit" | "quit" => Self::Exit,
            cmd if cmd.starts_with('/') => Self::Unknown(cmd),
            question => Self::Question(question),
        }
    }
}

fn print_help() {
    println!();
    println!("  /new    Archive this session and start a new one (alias /reset)");
    println!("  /help   Show this help");
    println!("  /exit   Leave the chat");
    println!();
}

pub async fn run() -> CliResult<()> {
    let config = runtime::load_config()?;
    runtime::require_api_key(&config)?;
    let agent = runtime::build_agent(&config)?;
    let session_id = agent.sessions().session_id().await;
    let turns = agent.sessions().history().await.len();

    println!();
    println!("  ragpilot chat");
    println!();
    println!("  Provider:  {}", config.default_provider);
    println!("  Model:     {}", ragpilot_providers::resolve_model(&config));
    println!(
        "  Window:    {} tokens ({} reserved for the answer)",
        config.context.total_context_window, config.context.reserved_response_tokens
    );
    println!("  Session:   {session_id} ({turns} messages)");
    println!();
    println!("  Type your question and press Enter. /help lists commands.");
    println!();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = std::io::stdout();

    loop {
        print!("  You > ");
        stdout.flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };

        match ChatInput::parse(&line) {
            ChatInput::Empty => continue,
            ChatInput::Exit => break,
            ChatInput::Help => print_help(),
            ChatInput::New => {
                let session = agent.sessions().reset().await?;
                println!("  Started session {}", session.session_id);
                println!();
            }
            ChatInput::Unknown(cmd) => {
                eprintln!("  Unknown command {cmd}; try /help");
            }
            ChatInput::Question(question) => {
                println!();
                print!("  Assistant > ");
                stdout.flush()?;
                let result = agent
                    .ask_streaming(question, |delta| {
                        print!("{delta}");
                        let _ = std::io::stdout().flush();
                    })
                    .await;
                println!();
                if let Err(e) = result {
                    eprintln!("  [Error] {e}");
                }
                println!();
            }
        }
    }

    println!();
    println!("  Goodbye!");
    Ok(())
}
