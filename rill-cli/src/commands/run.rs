//! The `rill run` command.

use rill_eval::EvalSession;
use std::path::Path;

pub fn run(file: &str, strict: bool, read_only: bool) -> Result<(), String> {
    let mut session = EvalSession::new();
    session.read_only = read_only;

    let value = session
        .eval_file(Path::new(file))
        .map_err(|e| e.to_string())?;
    if strict {
        session.strict_force_value(&value).map_err(|e| e.to_string())?;
    }

    println!("{}", session.show_value(&value));
    session.print_stats();
    Ok(())
}
