//! Search command

use crate::app::SearchArgs;
use anyhow::Result;
use notarium_core::{search_context, Config, LazyEmbedder, VectorStore};
use std::io::Write;
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

pub async fn run(args: SearchArgs, config: &Config) -> Result<()> {
    let query = args.query.join(" ");
    if query.trim().is_empty() {
        anyhow::bail!("Empty query");
    }

    let store = VectorStore::open(&config.store_path)?;
    let embedder = LazyEmbedder::new(config.embedding.clone());

    let chunks = search_context(&store, &embedder, &query, args.limit).await?;

    if chunks.is_empty() {
        println!("No matching notes (is the vault ingested?)");
        return Ok(());
    }

    let mut stdout = StandardStream::stdout(ColorChoice::Auto);
    for (i, chunk) in chunks.iter().enumerate() {
        let score_pct = (chunk.score * 100.0) as u32;
        write!(stdout, "{:>3}% ", score_pct)?;
        stdout.set_color(ColorSpec::new().set_fg(Some(Color::Cyan)).set_bold(true))?;
        write!(stdout, "{}", chunk.title)?;
        stdout.reset()?;
        writeln!(stdout, "  {} [{}]", chunk.path, chunk.id())?;

        for line in chunk.text.lines().take(4) {
            writeln!(stdout, "  {}", line)?;
        }
        if chunk.text.lines().count() > 4 {
            writeln!(stdout, "  ...")?;
        }
        if i + 1 < chunks.len() {
            writeln!(stdout)?;
        }
    }

    Ok(())
}
