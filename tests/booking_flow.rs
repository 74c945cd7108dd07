//! End-to-end flows through the command layer against real CSV files.

use std::fs;
use std::io::Cursor;
use std::path::Path;

use clap::Parser;

use fleetbook::cli::{OutputFormat, ShellLine};
use fleetbook::commands::{self, CommandError};
use fleetbook::engine::{Engine, EngineError, Policy};
use fleetbook::store::CsvStore;

fn open(dir: &Path) -> Engine {
    let store = CsvStore::open(dir, "reservas.csv", "mantenimiento.csv").unwrap();
    Engine::open(store, Policy::default()).unwrap()
}

fn run(engine: &mut Engine, line: &str) -> Result<String, CommandError> {
    run_as(engine, line, OutputFormat::Table)
}

fn run_as(engine: &mut Engine, line: &str, format: OutputFormat) -> Result<String, CommandError> {
    let words = shell_words::split(line).unwrap();
    let parsed = ShellLine::try_parse_from(words).unwrap();
    let mut out = Vec::new();
    commands::execute(engine, parsed.command, format, &mut out)?;
    Ok(String::from_utf8(out).unwrap())
}

fn shell(engine: &mut Engine, script: &str) -> (String, String) {
    let mut out = Vec::new();
    let mut err = Vec::new();
    commands::run_shell(
        engine,
        OutputFormat::Table,
        Cursor::new(script),
        &mut out,
        &mut err,
    )
    .unwrap();
    (String::from_utf8(out).unwrap(), String::from_utf8(err).unwrap())
}

const MICRA_MORNING: &str = "reserve --employee Berta --vehicle Micra \
     --start-date 2024-01-01 --start-time 09:00 --end-date 2024-01-01 --end-time 11:00";

#[test]
fn reserve_list_cancel() {
    let dir = tempfile::tempdir().unwrap();
    let mut engine = open(dir.path());

    let out = run(&mut engine, MICRA_MORNING).unwrap();
    assert!(out.contains("Berta - Micra (01/01/2024 09:00 - 01/01/2024 11:00)"));

    let err = run(
        &mut engine,
        "reserve --employee Pedro --vehicle Micra --start-date 2024-01-01 \
         --start-time 10:00 --end-date 2024-01-01 --end-time 12:00",
    )
    .unwrap_err();
    assert!(matches!(
        err,
        CommandError::Engine(EngineError::ReservationConflict(_))
    ));

    let listed = run(&mut engine, "list --vehicle micra").unwrap();
    assert_eq!(listed.lines().count(), 1);

    let out = run(
        &mut engine,
        "cancel 'Berta - Micra (01/01/2024 09:00 - 01/01/2024 11:00)'",
    )
    .unwrap();
    assert!(out.starts_with("Cancelled"));
    assert_eq!(run(&mut engine, "list").unwrap(), "No reservations.\n");

    let text = fs::read_to_string(dir.path().join("reservas.csv")).unwrap();
    assert_eq!(text, "Empleado,Vehículo,Inicio,Fin,Motivo\n");
}

#[test]
fn placeholder_selection_is_incomplete() {
    let dir = tempfile::tempdir().unwrap();
    let mut engine = open(dir.path());
    let err = run(
        &mut engine,
        "reserve --employee Seleccionar --vehicle Micra --start-date 2024-01-01 \
         --start-time 09:00 --end-date 2024-01-01 --end-time 10:00",
    )
    .unwrap_err();
    assert!(matches!(
        err,
        CommandError::Engine(EngineError::IncompleteInput("employee"))
    ));

    let err = run(
        &mut engine,
        "reserve --employee Berta --vehicle Micra --start-date 2024-01-01 \
         --end-date 2024-01-01 --end-time 10:00",
    )
    .unwrap_err();
    assert!(matches!(
        err,
        CommandError::Engine(EngineError::IncompleteInput("start"))
    ));

    let err = run(
        &mut engine,
        "reserve --employee Berta --vehicle Clio --start-date 2024-01-01 \
         --start-time 09:00 --end-date 2024-01-01 --end-time 10:00",
    )
    .unwrap_err();
    assert!(err.to_string().contains("Clio"));
}

#[test]
fn block_cancel_by_id_and_unblock() {
    let dir = tempfile::tempdir().unwrap();
    let mut engine = open(dir.path());
    run(&mut engine, MICRA_MORNING).unwrap();

    let out = run(
        &mut engine,
        "block --vehicle Micra --start-date 2024-01-01 --start-time 08:00 \
         --end-date 2024-01-01 --end-time 18:00 --reason ITV",
    )
    .unwrap();
    assert!(out.contains("overlaps reservation"));

    let reservation_id = engine.reservations()[0].id.to_string();
    run(&mut engine, &format!("cancel {reservation_id}")).unwrap();

    let block_id = engine.maintenance_blocks()[0].id.to_string();
    let listed = run(&mut engine, "maintenance").unwrap();
    assert!(listed.contains(&block_id));
    assert!(listed.contains("ITV"));

    run(&mut engine, &format!("unblock {block_id}")).unwrap();
    assert!(engine.is_empty());
}

#[test]
fn agenda_text_and_json() {
    let dir = tempfile::tempdir().unwrap();
    let mut engine = open(dir.path());
    assert_eq!(
        run(&mut engine, "agenda").unwrap(),
        "No hay registros para mostrar.\n"
    );

    run(&mut engine, MICRA_MORNING).unwrap();
    run(
        &mut engine,
        "block --vehicle Duster --start-date 2024-02-01 --start-time 08:00 \
         --end-date 2024-02-01 --end-time 18:00",
    )
    .unwrap();

    let json = run(&mut engine, "agenda --json").unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    let events = value["events"].as_array().unwrap();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0]["title"], "Micra - Berta");
    assert_eq!(events[0]["start"], "2024-01-01T09:00:00");
    assert_eq!(events[1]["title"], "Mantenimiento - Duster");
    assert_eq!(events[1]["color"], "#808080");
    assert_eq!(value["options"]["locale"], "es");
}

#[test]
fn export_to_directory_uses_download_name() {
    let dir = tempfile::tempdir().unwrap();
    let out_dir = tempfile::tempdir().unwrap();
    let mut engine = open(dir.path());
    run(&mut engine, MICRA_MORNING).unwrap();

    let cmd = format!("export reservations --output {}", out_dir.path().display());
    run(&mut engine, &cmd).unwrap();
    let exported = fs::read(out_dir.path().join("reservas_coches.csv")).unwrap();
    assert_eq!(exported, fs::read(dir.path().join("reservas.csv")).unwrap());

    let stdout = run(&mut engine, "export maintenance").unwrap();
    assert_eq!(stdout, "Vehículo,Inicio,Fin,Motivo\n");
}

#[test]
fn json_output_carries_ids() {
    let dir = tempfile::tempdir().unwrap();
    let mut engine = open(dir.path());
    let out = run_as(&mut engine, MICRA_MORNING, OutputFormat::Json).unwrap();
    let value: serde_json::Value = serde_json::from_str(&out).unwrap();
    assert_eq!(value["id"], engine.reservations()[0].id.to_string());
    assert_eq!(value["vehicle"], "Micra");
    assert_eq!(value["span"]["end"], "2024-01-01T11:00:00");

    let roster = run_as(&mut engine, "roster", OutputFormat::Json).unwrap();
    let value: serde_json::Value = serde_json::from_str(&roster).unwrap();
    assert_eq!(value["employees"].as_array().unwrap().len(), 15);
    assert_eq!(value["vehicles"][2]["color"], "#ff7f0e");
}

#[test]
fn shell_session_keeps_going_after_errors() {
    let dir = tempfile::tempdir().unwrap();
    let mut engine = open(dir.path());
    let script = format!(
        "# morning booking\n\
         {MICRA_MORNING}\n\
         {MICRA_MORNING}\n\
         cancel 'nobody'\n\
         frobnicate\n\
         list\n\
         exit\n\
         roster\n"
    );
    let (out, err) = shell(&mut engine, &script);

    assert_eq!(out.matches("Reserved").count(), 1);
    assert_eq!(out.matches("Berta - Micra").count(), 2); // reserved + listed
    assert!(!out.contains("Employees:"), "commands after exit must not run");
    assert_eq!(err.matches("Error:").count(), 2);
    assert!(err.contains("frobnicate"));
}

#[test]
fn two_sessions_do_not_lose_updates() {
    let dir = tempfile::tempdir().unwrap();
    let mut first = open(dir.path());
    let mut second = open(dir.path());

    run(&mut first, MICRA_MORNING).unwrap();
    let err = run(
        &mut second,
        "reserve --employee Pedro --vehicle Duster --start-date 2024-01-01 \
         --start-time 09:00 --end-date 2024-01-01 --end-time 11:00",
    )
    .unwrap_err();
    assert!(matches!(err, CommandError::Engine(EngineError::Storage(_))));

    run(&mut second, "reload").unwrap();
    run(
        &mut second,
        "reserve --employee Pedro --vehicle Duster --start-date 2024-01-01 \
         --start-time 09:00 --end-date 2024-01-01 --end-time 11:00",
    )
    .unwrap();
    assert_eq!(open(dir.path()).reservations().len(), 2);
}
