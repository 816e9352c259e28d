//! The `rill repl` command.

use rill_eval::EvalSession;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

pub fn run() -> Result<(), String> {
    println!("rill REPL v{}", env!("CARGO_PKG_VERSION"));
    println!("Type :help for help, :quit to exit");
    println!();

    let mut rl = DefaultEditor::new().map_err(|e| e.to_string())?;

    // One session for the whole interaction: a failed evaluation leaves
    // its thunks restored, so later inputs can retry shared values.
    let session = EvalSession::new();
    let base_dir = std::env::current_dir().map_err(|e| e.to_string())?;

    loop {
        match rl.readline("rill> ") {
            Ok(line) => {
                let input = line.trim();
                if input.is_empty() {
                    continue;
                }
                let _ = rl.add_history_entry(input);

                match input {
                    ":quit" | ":q" => break,
                    ":help" | ":h" => {
                        println!("REPL commands:");
                        println!("  :help, :h    Show this help");
                        println!("  :quit, :q    Exit the REPL");
                        println!();
                        println!("Anything else is evaluated as a rill expression.");
                        continue;
                    }
                    _ => {}
                }

                let result = session
                    .parse_str(input, &base_dir)
                    .and_then(|expr| session.eval(&expr))
                    .and_then(|value| {
                        session.strict_force_value(&value)?;
                        Ok(value)
                    });

                match result {
                    Ok(value) => println!("{}", session.show_value(&value)),
                    Err(e) => eprintln!("error: {}", e),
                }
            }
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
            Err(e) => {
                eprintln!("error: {}", e);
                break;
            }
        }
    }

    session.print_stats();
    Ok(())
}
