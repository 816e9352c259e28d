//! The `rill eval` command.

use rill_eval::EvalSession;

pub fn run(expr: &str, strict: bool, read_only: bool) -> Result<(), String> {
    let mut session = EvalSession::new();
    session.read_only = read_only;

    let base_dir = std::env::current_dir().map_err(|e| e.to_string())?;
    let parsed = session
        .parse_str(expr, &base_dir)
        .map_err(|e| e.to_string())?;

    let value = session.eval(&parsed).map_err(|e| e.to_string())?;
    if strict {
        session.strict_force_value(&value).map_err(|e| e.to_string())?;
    }

    println!("{}", session.show_value(&value));
    session.print_stats();
    Ok(())
}
