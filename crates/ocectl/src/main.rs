//! OCE Control - CLI client for the oced daemon

use anyhow::Result;
use clap::Parser;
use ocectl::cli::{Cli, Commands, NotesAction};
use ocectl::client::{parse_hints, OcedClient};
use ocectl::output;
use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match dispatch(cli).await {
        Ok(code) => code,
        Err(e) => {
            output::display_error(&format!("{:#}", e));
            ExitCode::FAILURE
        }
    }
}

async fn dispatch(cli: Cli) -> Result<ExitCode> {
    let client = OcedClient::new(&cli.url, cli.api_key);

    match cli.command {
        Commands::Health => {
            if client.health().await? {
                output::display_success(&format!("oced is up at {}", client.base_url()));
                Ok(ExitCode::SUCCESS)
            } else {
                output::display_error(&format!("oced at {} is not healthy", client.base_url()));
                Ok(ExitCode::FAILURE)
            }
        }
        Commands::Run {
            text,
            project,
            hints,
            json,
        } => {
            let hints = parse_hints(hints.as_deref())?;
            let response = client.run(&text, project.as_deref(), hints).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&response)?);
            } else {
                output::display_run(&response);
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::Notes { action } => {
            match action {
                NotesAction::Get { project } => {
                    output::display_notes(&client.notes(&project).await?);
                }
                NotesAction::Put {
                    project,
                    key,
                    value,
                } => {
                    let note = client.put_note(&project, &key, &value).await?;
                    output::display_success(&format!("Stored note for {}", note.project_id));
                    output::display_note(&note);
                }
                NotesAction::Purge { project } => {
                    let purged = client.purge_notes(&project).await?;
                    output::display_success(&format!(
                        "Removed {} note record(s) for {}",
                        purged.removed, purged.project_id
                    ));
                }
                NotesAction::PurgeAll => {
                    client.purge_all_notes().await?;
                    output::display_success("Removed all session notes");
                }
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}
