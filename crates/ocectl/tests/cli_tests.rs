//! Argument parsing tests for ocectl.

use clap::{CommandFactory, Parser};
use ocectl::cli::{Cli, Commands, NotesAction, DEFAULT_URL};

#[test]
fn test_cli_definition_is_consistent() {
    Cli::command().debug_assert();
}

#[test]
fn test_run_with_options() {
    let cli = Cli::try_parse_from([
        "ocectl",
        "--url",
        "http://oce.local:9000",
        "run",
        "Should we enter market A or B?",
        "--project",
        "p1",
        "--hints",
        r#"{"mode":"pro"}"#,
        "--json",
    ])
    .unwrap();
    assert_eq!(cli.url, "http://oce.local:9000");
    match cli.command {
        Commands::Run {
            text,
            project,
            hints,
            json,
        } => {
            assert_eq!(text, "Should we enter market A or B?");
            assert_eq!(project.as_deref(), Some("p1"));
            assert_eq!(hints.as_deref(), Some(r#"{"mode":"pro"}"#));
            assert!(json);
        }
        other => panic!("unexpected command: {:?}", other),
    }
}

#[test]
fn test_global_url_after_subcommand() {
    let cli = Cli::try_parse_from(["ocectl", "health", "--url", "http://h:1"]).unwrap();
    assert_eq!(cli.url, "http://h:1");
    assert!(matches!(cli.command, Commands::Health));
}

#[test]
fn test_default_url() {
    if std::env::var_os("OCE_URL").is_some() {
        return;
    }
    let cli = Cli::try_parse_from(["ocectl", "health"]).unwrap();
    assert_eq!(cli.url, DEFAULT_URL);
}

#[test]
fn test_notes_put() {
    let cli = Cli::try_parse_from(["ocectl", "notes", "put", "p2", "budget", "under 5000"]).unwrap();
    match cli.command {
        Commands::Notes {
            action:
                NotesAction::Put {
                    project,
                    key,
                    value,
                },
        } => {
            assert_eq!(project, "p2");
            assert_eq!(key, "budget");
            assert_eq!(value, "under 5000");
        }
        other => panic!("unexpected command: {:?}", other),
    }
}

#[test]
fn test_run_requires_text() {
    assert!(Cli::try_parse_from(["ocectl", "run"]).is_err());
}

#[test]
fn test_unknown_subcommand_rejected() {
    assert!(Cli::try_parse_from(["ocectl", "explode"]).is_err());
}
