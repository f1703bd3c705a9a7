use crate::config::{Fixture, DEFAULT_FIXTURE_NAME};
use anyhow::Result;
use clap::Args;
use colored::Colorize;
use std::fs;
use std::path::PathBuf;

#[derive(Debug, Args)]
pub struct InitArgs {
    /// Debounce applied to edits that do not specify one
    #[arg(short, long, default_value_t = 0)]
    pub debounce_ms: u64,

    /// Tab moves within the row and only stops editing on the row edge
    #[arg(long)]
    pub tab_stops_at_row_edge: bool,

    /// Force overwrite existing fixture
    #[arg(short, long)]
    pub force: bool,
}

pub fn init(args: InitArgs, cwd: &str) -> Result<()> {
    let fixture_path = PathBuf::from(cwd).join(DEFAULT_FIXTURE_NAME);

    if fixture_path.exists() && !args.force {
        println!(
            "{} {} already exists",
            "⚠️".yellow(),
            DEFAULT_FIXTURE_NAME.bright_white()
        );
        println!("Use --force to overwrite");
        return Ok(());
    }

    println!("{}", "📝 Writing example grid fixture...".bright_blue().bold());

    let mut fixture = Fixture::example();
    fixture.config.default_debounce_ms = args.debounce_ms;
    fixture.config.tab_stops_at_row_edge = args.tab_stops_at_row_edge;

    let fixture_json = serde_json::to_string_pretty(&fixture)?;
    fs::write(&fixture_path, fixture_json)?;

    println!("  {} Created {}", "✓".green(), DEFAULT_FIXTURE_NAME);
    println!();
    println!("Next steps:");
    println!("  1. Edit the script in {}", DEFAULT_FIXTURE_NAME);
    println!("  2. Run: gridline replay");

    Ok(())
}
