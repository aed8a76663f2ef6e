//! Command-line entry point: `chronoatlas <session.json>`.

use chronoatlas_app::{Replay, Session, SessionResult};
use std::process::ExitCode;

fn run(path: &str) -> SessionResult<()> {
    let session = Session::from_path(path)?;
    log::info!("Replaying {} steps from {}", session.steps.len(), path);
    let report = Replay::new(&session).run(&session)?;

    println!("{}", report.document.to_json()?);
    for notice in &report.notices {
        println!("notice: {}", notice);
    }
    let mut kinds: Vec<_> = report.visible.iter().collect();
    kinds.sort_by_key(|(kind, _)| format!("{:?}", kind));
    for (kind, ids) in kinds {
        println!("visible {:?}: {}", kind, ids.len());
    }
    if !report.clicked.is_empty() {
        println!("clicked: {}", report.clicked.join(", "));
    }
    println!("layers: {}", report.layers.join(" > "));
    Ok(())
}

fn main() -> ExitCode {
    env_logger::init();

    let Some(path) = std::env::args().nth(1) else {
        eprintln!("usage: chronoatlas <session.json>");
        return ExitCode::from(2);
    };
    match run(&path) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("Replay failed: {}", e);
            ExitCode::FAILURE
        }
    }
}
