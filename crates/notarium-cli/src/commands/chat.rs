//! Interactive chat command

use crate::app::ChatArgs;
use anyhow::Result;
use futures::StreamExt;
use notarium_core::{
    build_backend, format_context_summary, ChatOptions, ChatSession, Config, LazyEmbedder,
    VectorStore,
};
use std::io::Write;
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};
use tokio::io::{AsyncBufReadExt, BufReader};

const HELP: &str = "\
Commands:
  /help      Show this help
  /context   Show which notes informed the last answer
  /clear     Forget the conversation so far
  /exit      Leave the chat";

pub async fn run(args: ChatArgs, config: &Config) -> Result<()> {
    let store = VectorStore::open(&config.store_path)?;
    let embedder = LazyEmbedder::new(config.embedding.clone());
    let backend = build_backend(&config.chat)?;

    let options = ChatOptions::from_config(&config.chat, !args.no_rag);
    let mut session = ChatSession::new(backend, &store, &embedder, options);

    let mut stdout = StandardStream::stdout(ColorChoice::Auto);
    println!(
        "Chatting with {} ({}). Type /help for commands, /exit to quit.",
        config.chat.model,
        if args.no_rag { "no retrieval" } else { "vault retrieval on" }
    );

    let mut reader = BufReader::new(tokio::io::stdin());
    let mut line = String::new();

    loop {
        stdout.set_color(ColorSpec::new().set_fg(Some(Color::Green)).set_bold(true))?;
        write!(stdout, "> ")?;
        stdout.reset()?;
        stdout.flush()?;

        line.clear();
        if reader.read_line(&mut line).await? == 0 {
            break;
        }
        let input = line.trim();
        if input.is_empty() {
            continue;
        }

        match input {
            "/exit" | "/quit" => break,
            "/help" => {
                println!("{}", HELP);
                continue;
            }
            "/clear" => {
                session.clear();
                println!("Conversation cleared.");
                continue;
            }
            "/context" => {
                println!("{}", format_context_summary(session.last_context()));
                continue;
            }
            _ => {}
        }

        let mut reply = match session.send(input).await {
            Ok(reply) => reply,
            Err(e) => {
                eprintln!("Error: {}", e);
                continue;
            }
        };

        while let Some(fragment) = reply.next().await {
            match fragment {
                Ok(text) => {
                    write!(stdout, "{}", text)?;
                    stdout.flush()?;
                }
                Err(e) => {
                    eprintln!("\nError: {}", e);
                    break;
                }
            }
        }
        drop(reply);
        println!();

        if !args.no_rag && !session.last_context().is_empty() {
            stdout.set_color(ColorSpec::new().set_dimmed(true))?;
            writeln!(stdout, "{}", format_context_summary(session.last_context()))?;
            stdout.reset()?;
        }
        println!();
    }

    session.close();
    Ok(())
}
