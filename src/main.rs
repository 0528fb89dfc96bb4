use clap::Parser;
use goscript::{input_state, parse_expr, parse_file, Interpreter, ParserState};
use log::{debug, info};
use rustyline::error::ReadlineError;
use rustyline::{DefaultEditor, Result as ReplResult};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

/// Runs goscript programs, or starts a REPL when no script is given.
#[derive(Parser, Debug)]
#[command(name = "goscript", version, long_about = None)]
struct Args {
    /// Evaluate a single integer expression and print its value
    #[arg(short = 'e', long = "expr", value_name = "EXPR", conflicts_with = "script")]
    expr: Option<String>,

    /// Print the syntax tree before running
    #[arg(long)]
    dump_ast: bool,

    /// Script to run, must end in `.gs`
    script: Option<PathBuf>,
}

fn main() -> ExitCode {
    env_logger::init();
    let args = Args::parse();
    debug!("{args:?}");
    let result = match (&args.expr, &args.script) {
        (Some(expr), _) => run_expr(expr, args.dump_ast),
        (None, Some(script)) => run_script(script, args.dump_ast),
        (None, None) => run_repl().map_err(|err| err.to_string()),
    };
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(msg) => {
            eprintln!("{msg}");
            ExitCode::FAILURE
        }
    }
}

fn run_script(path: &Path, dump_ast: bool) -> Result<(), String> {
    if path.extension().and_then(|ext| ext.to_str()) != Some("gs") {
        return Err(format!("{}: not a goscript file", path.display()));
    }
    let src = std::fs::read_to_string(path).map_err(|err| format!("{}: {err}", path.display()))?;
    let name = path.display().to_string();
    let file = parse_file(&name, &src).map_err(|errors| errors.to_string())?;
    if dump_ast {
        println!("{file:#?}");
    }
    let stdout = std::io::stdout();
    Interpreter::new(stdout.lock())
        .execute(&file)
        .map_err(|err| err.to_string())
}

fn run_expr(expr: &str, dump_ast: bool) -> Result<(), String> {
    let file = parse_expr("<expr>", expr).map_err(|errors| errors.to_string())?;
    if dump_ast {
        println!("{file:#?}");
    }
    let value = Interpreter::new(std::io::sink())
        .evaluate(&file)
        .map_err(|err| err.to_string())?;
    println!("{value}");
    Ok(())
}

fn run_repl() -> ReplResult<()> {
    let mut rl = DefaultEditor::new()?;
    #[cfg(feature = "with-file-history")]
    if rl.load_history("history.txt").is_err() {
        println!("No previous history.");
    }
    let mut interpreter = Interpreter::new(std::io::stdout());
    let mut buffer = String::new();
    loop {
        let prompt = if buffer.is_empty() { ">> " } else { ".. " };
        match rl.readline(prompt) {
            Ok(line) => {
                rl.add_history_entry(line.as_str())?;
                buffer.push_str(&line);
                buffer.push('\n');
                if input_state(&buffer) == ParserState::ContinuationNeeded {
                    continue;
                }
                let src = std::mem::take(&mut buffer);
                match parse_file("<stdin>", &src) {
                    Ok(file) => match interpreter.execute_interactive(&file) {
                        Ok(Some(value)) => println!("{value}"),
                        Ok(None) => {}
                        Err(err) => eprintln!("{err}"),
                    },
                    Err(errors) => eprintln!("{errors}"),
                }
            }
            Err(ReadlineError::Interrupted) if !buffer.is_empty() => {
                info!("discarding incomplete input");
                buffer.clear();
            }
            Err(ReadlineError::Interrupted) => {
                println!("CTRL-C");
                break;
            }
            Err(ReadlineError::Eof) => {
                println!("CTRL-D");
                break;
            }
            Err(err) => {
                println!("Error: {:?}", err);
                break;
            }
        }
    }
    #[cfg(feature = "with-file-history")]
    rl.save_history("history.txt")?;
    Ok(())
}
