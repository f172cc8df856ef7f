use std::fs;
use std::io::{self, BufRead, BufReader};
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use showdex::{Index, Schema, SearchRequest, WriterConfig};
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "showdex")]
#[command(about = "Embedded full-text search engine", long_about = None)]
struct Args {
    /// Index directory
    #[arg(long, env = "SHOWDEX_INDEX", default_value = "./index")]
    index: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create an index from a JSON schema file
    Create {
        #[arg(long)]
        schema: PathBuf,

        /// Open the index if it already exists with the same schema
        #[arg(long)]
        reuse: bool,
    },

    /// Add JSON-lines documents and commit
    Ingest {
        /// Input file; stdin when omitted
        input: Option<PathBuf>,

        /// Writer heap budget in bytes
        #[arg(long, env = "SHOWDEX_HEAP_SIZE", default_value = "52428800")]
        heap_size: usize,

        #[arg(long, env = "SHOWDEX_THREADS", default_value = "1")]
        threads: usize,

        /// Skip keys the schema does not declare
        #[arg(long)]
        ignore_unknown: bool,

        /// Keep going past documents that fail validation
        #[arg(long)]
        skip_invalid: bool,
    },

    /// Run a query and print matching documents as JSON lines
    Search {
        query: String,

        /// Fields searched by unqualified terms (comma-separated)
        #[arg(long, value_delimiter = ',')]
        fields: Vec<String>,

        #[arg(long, default_value = "10")]
        limit: usize,

        #[arg(long, default_value = "0")]
        offset: usize,

        /// Fast field to order by instead of relevance
        #[arg(long)]
        order_by: Option<String>,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();
    match args.command {
        Command::Create { schema, reuse } => {
            let text = fs::read_to_string(&schema)
                .with_context(|| format!("reading schema {}", schema.display()))?;
            let schema = Schema::from_json(&text).context("parsing schema")?;
            let index = Index::create(schema, Some(&args.index), reuse)?;
            info!(path = %args.index.display(), "Index ready");
            println!(
                "index at {} ({} fields)",
                args.index.display(),
                index.schema().num_fields()
            );
        }
        Command::Ingest {
            input,
            heap_size,
            threads,
            ignore_unknown,
            skip_invalid,
        } => {
            let index = Index::open(&args.index)?;
            let mut writer = index.writer_with_config(
                WriterConfig::new(heap_size, threads).with_ignore_unknown_fields(ignore_unknown),
            )?;

            let reader: Box<dyn BufRead> = match input {
                Some(path) => Box::new(BufReader::new(
                    fs::File::open(&path)
                        .with_context(|| format!("opening {}", path.display()))?,
                )),
                None => Box::new(BufReader::new(io::stdin())),
            };

            let mut added = 0u64;
            let mut skipped = 0u64;
            for (line_no, line) in reader.lines().enumerate() {
                let line = line?;
                if line.trim().is_empty() {
                    continue;
                }
                match writer.add_json(&line) {
                    Ok(_) => added += 1,
                    Err(e) if skip_invalid && e.is_validation() => {
                        warn!(line = line_no + 1, error = %e, "Skipping document");
                        skipped += 1;
                    }
                    Err(e) => bail!("line {}: {}", line_no + 1, e),
                }
            }
            let opstamp = writer.commit()?;
            println!("added {} documents, skipped {}, opstamp {}", added, skipped, opstamp);
        }
        Command::Search {
            query,
            fields,
            limit,
            offset,
            order_by,
        } => {
            let index = Index::open(&args.index)?;
            let default_fields: Vec<&str> = fields.iter().map(String::as_str).collect();
            let query = index.parse_query(&query, &default_fields)?;

            let mut request = SearchRequest::new(query)
                .with_limit(limit)
                .with_offset(offset);
            if let Some(field) = order_by {
                request = request.with_order_by(field);
            }

            let searcher = index.searcher();
            let result = searcher.execute(&request)?;
            for (key, address) in &result.hits {
                let doc = searcher.doc(*address)?;
                let mut line = doc.to_dict();
                if let (Some(object), Some(score)) = (line.as_object_mut(), key.score()) {
                    object.insert("_score".to_string(), serde_json::json!(score));
                }
                println!("{}", line);
            }
            if let Some(count) = result.count {
                eprintln!("{} matching documents", count);
            }
        }
    }
    Ok(())
}
