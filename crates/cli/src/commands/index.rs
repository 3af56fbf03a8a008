//! `ragpilot index`: build or refresh the project index.

use std::path::PathBuf;

use ragpilot_context::build_counter;
use ragpilot_index::{IndexBuilder, ProjectIndex};
use tracing::warn;

use crate::runtime::{self, CliResult};

pub async fn run(root: Option<PathBuf>, rebuild: bool) -> CliResult<()> {
    let config = runtime::load_config()?;
    let root = root.unwrap_or_else(|| config.index.root.clone());
    let index_path = &config.index.path;

    let previous = if rebuild {
        None
    } else {
        match ProjectIndex::load(index_path) {
            Ok(previous) => previous,
            Err(e) => {
                warn!(error = %e, "Ignoring unreadable index, rebuilding from scratch");
                None
            }
        }
    };

    let counter = build_counter(&config.tokenizer);
    let builder = IndexBuilder::new(config.index.clone(), counter);
    let (index, stats) = builder.build(&root, previous.as_ref())?;
    index.save(index_path)?;

    println!("Indexed {} into {}", root.display(), index_path.display());
    println!("  files indexed   {:>6}", stats.files_indexed);
    println!("  files unchanged {:>6}", stats.files_reused);
    println!("  files skipped   {:>6}", stats.files_skipped);
    println!("  chunks          {:>6}", stats.chunks);
    println!("  tokenizer       {:>6}", index.tokenizer);
    Ok(())
}
