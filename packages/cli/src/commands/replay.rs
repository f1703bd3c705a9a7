use crate::config::{Action, Fixture, DEFAULT_FIXTURE_NAME};
use anyhow::Result;
use clap::Args;
use colored::Colorize;
use gridline_row_editing::{
    ColumnSet, FocusSink, GridEvent, GridEventKind, KeyDown, MaybeDeferred, MemoryRowStore,
    PagedView, RowEditError, RowEditingController, RowId, StopOutcome, TriggerMapper,
};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Args)]
pub struct ReplayArgs {
    /// Fixture file with columns, rows and the script to replay
    #[arg(default_value = DEFAULT_FIXTURE_NAME)]
    pub fixture: PathBuf,

    /// Print every grid event as it is published
    #[arg(short, long)]
    pub events: bool,

    /// Print the final rows as JSON
    #[arg(long)]
    pub json: bool,
}

struct PrintFocus;

impl FocusSink for PrintFocus {
    fn set_cell_focus(&self, id: &RowId, field: &str) {
        println!("      {} focus ({}, {})", "→".cyan(), id, field);
    }
}

pub async fn replay(args: ReplayArgs, cwd: &str) -> Result<()> {
    let path = PathBuf::from(cwd).join(&args.fixture);
    let fixture = Fixture::load(&path)?;
    tracing::debug!(
        "Loaded fixture {} with {} rows and {} actions",
        path.display(),
        fixture.rows.len(),
        fixture.script.len()
    );

    let store = Arc::new(MemoryRowStore::from_rows(fixture.rows.clone())?);
    let controller = build_controller(&fixture, store.clone(), Arc::new(fixture.column_set()));
    if args.events {
        print_events(&controller);
    }

    println!("{} {}", "▶ Replaying".bright_blue().bold(), path.display());
    let triggers = controller.triggers();
    for (step, action) in fixture.script.iter().enumerate() {
        println!("  {} {}", format!("{:>3}.", step + 1).dimmed(), action);
        match run_action(&controller, &triggers, action).await {
            Ok(note) => println!("      {} {}", "✓".green(), note),
            Err(err) => println!("      {} {}", "✗".red(), err),
        }
    }

    println!();
    print_rows(&store, &controller, args.json)
}

fn build_controller(
    fixture: &Fixture,
    store: Arc<MemoryRowStore>,
    columns: Arc<ColumnSet>,
) -> RowEditingController {
    let mut builder = RowEditingController::builder(store.clone(), columns.clone())
        .config(fixture.config.clone())
        .focus_sink(Arc::new(PrintFocus))
        .on_process_row_update_error(|err| {
            println!("      {} commit rejected: {}", "✗".red(), err);
        });

    if let Some(pagination) = fixture.pagination {
        let view = PagedView::new(store, columns).paginated(pagination.page_size, pagination.page);
        builder = builder.view(Arc::new(view));
    }

    if let Some(message) = fixture.reject_commits.clone() {
        builder = builder.process_row_update(move |_new_row, _old_row| {
            MaybeDeferred::Ready(Err(anyhow::anyhow!(message.clone())))
        });
    }

    builder.build()
}

async fn run_action(
    controller: &RowEditingController,
    triggers: &TriggerMapper,
    action: &Action,
) -> Result<String, RowEditError> {
    match action {
        Action::DoubleClick { id, field } => Ok(published(triggers.cell_double_click(id, field))),
        Action::KeyDown {
            id,
            field,
            key,
            modifiers,
        } => {
            let key = KeyDown::new(key).with_modifiers(*modifiers);
            Ok(published(triggers.cell_key_down(id, field, &key)))
        }
        Action::FocusOut { id, field, next } => {
            Ok(published(triggers.cell_focus_out(id, field, next.as_ref())))
        }
        Action::Start(params) => controller
            .start_row_edit_mode(params.clone())
            .map(|()| "editing".to_string()),
        Action::SetValue(params) => controller
            .set_edit_cell_value(params.clone())
            .map(|mut handle| match handle.try_result() {
                Some(true) => "valid".to_string(),
                Some(false) => "invalid".to_string(),
                None => "validating".to_string(),
            }),
        Action::Stop(params) => controller
            .stop_row_edit_mode(params.clone())
            .map(describe_stop),
        Action::Wait { ms } => {
            tokio::time::sleep(Duration::from_millis(*ms)).await;
            Ok("done".to_string())
        }
    }
}

fn published(published: bool) -> String {
    if published {
        "event published".to_string()
    } else {
        "ignored".to_string()
    }
}

fn describe_stop(outcome: StopOutcome) -> String {
    match outcome {
        StopOutcome::Discarded => "discarded".to_string(),
        StopOutcome::Committed => "committed".to_string(),
        StopOutcome::Committing => "committing".to_string(),
        StopOutcome::Rejected => "rejected".to_string(),
        StopOutcome::Blocked(block) => format!("dropped ({})", block),
    }
}

/// camelCase name of a serde enum value
fn name<T: Serialize>(value: &T) -> String {
    serde_json::to_value(value)
        .ok()
        .and_then(|value| value.as_str().map(str::to_string))
        .unwrap_or_default()
}

fn describe_event(event: &GridEvent) -> String {
    match event {
        GridEvent::RowEditStart(params) => format!(
            "rowEditStart ({}, {}) {}",
            params.id,
            params.field,
            name(&params.reason)
        ),
        GridEvent::RowEditStop(params) => format!(
            "rowEditStop ({}, {}) {}",
            params.id,
            params.field,
            name(&params.reason)
        ),
        GridEvent::EditCellPropsChange { id, field, props } => format!(
            "editCellPropsChange ({}, {}) {}",
            id,
            field,
            serde_json::to_string(props).unwrap_or_default()
        ),
        GridEvent::RowModesChange { id, mode } => {
            format!("rowModesChange {} → {}", id, name(mode))
        }
    }
}

fn print_events(controller: &RowEditingController) {
    let kinds = [
        GridEventKind::RowEditStart,
        GridEventKind::RowEditStop,
        GridEventKind::EditCellPropsChange,
        GridEventKind::RowModesChange,
    ];
    for kind in kinds {
        controller.subscribe_event(
            kind,
            Arc::new(|event: &GridEvent| {
                println!("      {} {}", "•".dimmed(), describe_event(event));
            }),
        );
    }
}

fn print_rows(store: &MemoryRowStore, controller: &RowEditingController, json: bool) -> Result<()> {
    let rows = store.snapshot();
    if json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    println!("{}", "Rows".bold());
    for row in &rows {
        let edit_props = RowId::of(row).and_then(|id| controller.edit_props(&id));
        let marker = if edit_props.is_some() { "✎".yellow() } else { " ".normal() };
        println!("  {} {}", marker, serde_json::to_string(row)?);

        for (field, props) in edit_props.unwrap_or_default() {
            let status = if props.is_processing_props {
                "validating".yellow()
            } else if props.error {
                "invalid".red()
            } else {
                "ok".green()
            };
            println!("      {} = {} {}", field, props.value, status);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_example_script_commits_row() {
        let fixture = Fixture::example();
        let store = Arc::new(MemoryRowStore::from_rows(fixture.rows.clone()).unwrap());
        let controller =
            build_controller(&fixture, store.clone(), Arc::new(fixture.column_set()));
        let triggers = controller.triggers();

        for action in &fixture.script {
            run_action(&controller, &triggers, action).await.unwrap();
        }

        let rows = store.snapshot();
        assert_eq!(rows[0]["currencyPair"], serde_json::json!("USD GBP"));
        assert!(!controller.is_editing(&RowId::from(0)));
    }

    #[tokio::test]
    async fn test_rejected_commit_keeps_row_editing() {
        let mut fixture = Fixture::example();
        fixture.reject_commits = Some("read only".to_string());
        let store = Arc::new(MemoryRowStore::from_rows(fixture.rows.clone()).unwrap());
        let controller =
            build_controller(&fixture, store.clone(), Arc::new(fixture.column_set()));
        let triggers = controller.triggers();

        for action in &fixture.script {
            run_action(&controller, &triggers, action).await.unwrap();
        }

        assert!(controller.is_editing(&RowId::from(0)));
        assert_eq!(store.snapshot()[0]["currencyPair"], serde_json::json!("USDGBP"));
    }

    #[test]
    fn test_invalid_value_blocks_stop() {
        let fixture = Fixture::example();
        let store = Arc::new(MemoryRowStore::from_rows(fixture.rows.clone()).unwrap());
        let controller =
            build_controller(&fixture, store.clone(), Arc::new(fixture.column_set()));
        let triggers = controller.triggers();
        let id = RowId::from(0);

        triggers.cell_double_click(&id, "currencyPair");
        let mut handle = controller
            .set_edit_cell_value(gridline_row_editing::EditCellValueParams::new(
                0,
                "currencyPair",
                "",
            ))
            .unwrap();
        assert_eq!(handle.try_result(), Some(false));

        let outcome = controller
            .stop_row_edit_mode(gridline_row_editing::StopRowEditModeParams::new(0))
            .unwrap();
        assert_eq!(describe_stop(outcome), "dropped (invalid cell)");
    }
}
