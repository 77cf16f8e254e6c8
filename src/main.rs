use clap::{Parser, Subcommand};
use mython_lang::{
    language::parser::parse_program,
    runtime::Interpreter,
    tools::diagnostics::{emit_syntax_errors, report_io_error, report_runtime_error},
};
use std::{
    fs,
    io::{self, Read, Write},
    path::{Path, PathBuf},
};

#[derive(Debug, Parser)]
#[command(
    name = "mython-lang",
    version,
    about = "Mython language CLI",
    arg_required_else_help = true
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Interpret a Mython source file (reads standard input when omitted)
    Run {
        #[arg(value_name = "FILE")]
        file: Option<PathBuf>,
    },
}

fn main() {
    let cli = Cli::parse();
    match cli.command {
        Commands::Run { file } => run_entry(file.as_deref()),
    }
}

fn run_entry(file: Option<&Path>) {
    let (name, source) = match load_source(file) {
        Ok(loaded) => loaded,
        Err((path, err)) => {
            report_io_error(&path, &err);
            std::process::exit(1);
        }
    };
    let program = match parse_program(&source) {
        Ok(program) => program,
        Err(errors) => {
            emit_syntax_errors(&name, &source, &errors);
            std::process::exit(1);
        }
    };
    let interpreter = Interpreter::new(program);
    let stdout = io::stdout();
    let mut output = stdout.lock();
    if let Err(err) = interpreter.run(&mut output) {
        let _ = output.flush();
        report_runtime_error(&err);
        std::process::exit(1);
    }
    let _ = output.flush();
}

fn load_source(file: Option<&Path>) -> Result<(String, String), (PathBuf, io::Error)> {
    match file {
        Some(path) if path.as_os_str() != "-" => match fs::read_to_string(path) {
            Ok(source) => Ok((path.display().to_string(), source)),
            Err(err) => Err((path.to_path_buf(), err)),
        },
        _ => {
            let mut source = String::new();
            match io::stdin().read_to_string(&mut source) {
                Ok(_) => Ok(("<stdin>".to_string(), source)),
                Err(err) => Err((PathBuf::from("<stdin>"), err)),
            }
        }
    }
}
