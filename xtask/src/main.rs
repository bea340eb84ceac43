//! Build automation tasks for statusbook
//!
//! Currently one task: regenerating the CLI reference from the clap
//! definitions so it cannot drift from the binary.

use clap::Parser;
use std::fs;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "xtask")]
#[command(about = "Build automation tasks for statusbook", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Parser)]
enum Command {
    /// Generate the CLI reference in markdown
    GenerateCliDocs {
        /// Output directory for generated documentation
        #[arg(short, long, default_value = "docs")]
        output_dir: String,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::GenerateCliDocs { output_dir } => generate_cli_docs(&output_dir)?,
    }

    Ok(())
}

fn generate_cli_docs(output_dir: &str) -> anyhow::Result<()> {
    println!("Generating CLI documentation...");

    let markdown = clap_markdown::help_markdown::<statusbook_cli::Cli>();

    let content = format!(
        r#"# statusbook CLI Reference

Generated from the CLI source on {}.

## Quick Start

```bash
# Load accounts, then their status updates
statusbook --database statusbook.db load-users accounts.csv
statusbook --database statusbook.db load-statuses status_updates.csv

# Large user files: one worker process per 1000-row chunk
statusbook --database statusbook.db load-users accounts.csv --strategy processes

# Interactive menu
statusbook --database statusbook.db
```

Input files are CSV with a header row:

- users: `USER_ID,EMAIL,NAME,LASTNAME`
- statuses: `STATUS_ID,USER_ID,STATUS_TEXT`

Rows with a missing required value are skipped. Ids already in the
database are reported and skipped, so reloading a file is safe.

## Commands

{}

## Environment Variables

- `STATUSBOOK_DATABASE` - Database file, or `:memory:` (default: `statusbook.db`)
- `STATUSBOOK_USER_BATCH_SIZE` - Users per insert batch (default: `32`)
- `STATUSBOOK_STATUS_BATCH_SIZE` - Statuses per insert batch (default: `100`)
- `STATUSBOOK_MAX_WORKERS` - Batches in flight at once (default: `4`)
- `STATUSBOOK_SHARD_ROWS` - Rows per worker process (default: `1000`)
- `STATUSBOOK_MAX_PROCESSES` - Worker processes at once (default: number of CPUs)
- `STATUSBOOK_LOG_LEVEL`, `STATUSBOOK_LOG_FORMAT`, `STATUSBOOK_LOG_OUTPUT` - Logging
- `RUST_LOG` - Extra filter directives

---

*To update, run `cargo xtask generate-cli-docs`.*
"#,
        chrono::Utc::now().format("%Y-%m-%d"),
        markdown
    );

    let output_path = PathBuf::from(output_dir);
    fs::create_dir_all(&output_path)?;

    let file_path = output_path.join("cli-reference.md");
    fs::write(&file_path, content)?;

    println!("✅ Generated CLI documentation at: {}", file_path.display());

    Ok(())
}
