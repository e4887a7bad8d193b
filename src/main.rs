//! AliasVM CLI and REPL
//!
//! Usage:
//!   aliasvm run <file> [args...]   - Invoke an alias file, printing each command
//!   aliasvm check <file>           - Compile an alias file without running it
//!   aliasvm disasm <file>          - Print the compiled instruction listing
//!   aliasvm repl                   - Write and run a script interactively

use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand};
use colored::Colorize;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

use aliasvm::vm::DEFAULT_MAX_STEPS;
use aliasvm::{
    Alias, AliasError, AliasFile, ArgumentDeclaration, CommandError, ErrorKind, VmConfig,
    VERSION,
};

#[derive(Parser)]
#[command(name = "aliasvm", version, about = "Compile and run command alias scripts")]
struct Cli {
    /// Maximum instructions per invocation
    #[arg(long, global = true, value_name = "N")]
    max_steps: Option<u64>,

    /// Run without an instruction limit
    #[arg(long, global = true, conflicts_with = "max_steps")]
    unbounded: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Invoke an alias file
    Run {
        /// Alias file to load
        file: PathBuf,

        /// Raw arguments passed to the alias
        args: Vec<String>,
    },

    /// Compile an alias file and report errors
    Check {
        file: PathBuf,
    },

    /// Print the compiled program of an alias file
    Disasm {
        file: PathBuf,
    },

    /// Start the interactive script editor
    Repl,
}

impl Cli {
    fn vm_config(&self) -> VmConfig {
        if self.unbounded {
            VmConfig::unbounded()
        } else {
            VmConfig {
                max_steps: Some(self.max_steps.unwrap_or(DEFAULT_MAX_STEPS)),
            }
        }
    }
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"))
        .format_timestamp(None)
        .init();

    let cli = Cli::parse();
    if cli.no_color {
        colored::control::set_override(false);
    }
    let config = cli.vm_config();

    match cli.command {
        Command::Run { file, args } => run_file(&file, &args, config),
        Command::Check { file } => check_file(&file),
        Command::Disasm { file } => disasm_file(&file),
        Command::Repl => run_repl(config),
    }
}

fn fail(err: &AliasError) -> ! {
    eprintln!("{}", err.to_string().red());
    process::exit(1);
}

fn load(path: &Path) -> (AliasFile, Alias) {
    let file = AliasFile::load(path).unwrap_or_else(|e| fail(&e));
    let alias = file.compile().unwrap_or_else(|e| fail(&e));
    (file, alias)
}

/// Print a dispatched command
fn echo(command: &str) -> Result<(), CommandError> {
    println!("{} {}", ">".dimmed(), command.cyan());
    Ok(())
}

fn run_file(path: &Path, args: &[String], config: VmConfig) {
    let (file, alias) = load(path);
    let args: Vec<&str> = args.iter().map(String::as_str).collect();

    match alias.invoke(&args, &mut echo, config) {
        Ok(outcome) => {
            if !file.silent {
                println!(
                    "{}",
                    format!("({} commands, {} steps)", outcome.commands, outcome.steps).dimmed()
                );
            }
        }
        Err(e) => fail(&e),
    }
}

fn check_file(path: &Path) {
    let (file, alias) = load(path);
    println!(
        "{} {} ({} instructions, permission level {})",
        "ok:".green().bold(),
        alias.syntax(),
        alias.program().len(),
        file.permission_level
    );
}

fn disasm_file(path: &Path) {
    let (_, alias) = load(path);
    print!("{}", alias.program().disassemble(alias.name()));
}

fn run_repl(config: VmConfig) {
    println!(
        "{} {} - {}",
        "AliasVM".cyan().bold(),
        VERSION.cyan(),
        "command alias scripts".dimmed()
    );
    println!(
        "Type script lines, {} to execute, {} for help\n",
        ":run".yellow(),
        ":help".yellow()
    );

    let mut rl = match DefaultEditor::new() {
        Ok(rl) => rl,
        Err(e) => {
            eprintln!("{}: cannot start editor: {}", "error".red(), e);
            process::exit(1);
        }
    };

    let mut arguments: Vec<ArgumentDeclaration> = Vec::new();
    let mut lines: Vec<String> = Vec::new();
    let mut open_block = false;

    loop {
        let prompt = if open_block {
            format!("{} ", "...".green())
        } else {
            format!("{} ", "alias>".green().bold())
        };

        let line = match rl.readline(&prompt) {
            Ok(line) => line,
            Err(ReadlineError::Interrupted) => {
                println!("{}", "^C".dimmed());
                continue;
            }
            Err(ReadlineError::Eof) => {
                println!("{}", "Goodbye!".cyan());
                break;
            }
            Err(err) => {
                eprintln!("{}: {:?}", "error".red(), err);
                break;
            }
        };

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let _ = rl.add_history_entry(trimmed);

        let (command, rest) = trimmed
            .split_once(char::is_whitespace)
            .map_or((trimmed, ""), |(c, r)| (c, r.trim()));

        match command {
            "exit" | "quit" | ":quit" => {
                println!("{}", "Goodbye!".cyan());
                break;
            }
            ":help" => print_repl_help(),
            ":clear" => {
                lines.clear();
                arguments.clear();
                open_block = false;
                println!("{}", "Script cleared.".dimmed());
            }
            ":list" => {
                for (i, line) in lines.iter().enumerate() {
                    println!("{} {}", format!("{:>3}", i + 1).dimmed(), line);
                }
            }
            ":args" => match ArgumentDeclaration::parse_list(rest) {
                Ok(declared) => arguments = declared,
                Err(e) => eprintln!("{}", e.to_string().red()),
            },
            ":disasm" => match Alias::new("repl", arguments.clone(), &lines) {
                Ok(alias) => print!("{}", alias.program().disassemble("repl")),
                Err(e) => eprintln!("{}", e.to_string().red()),
            },
            ":run" => {
                let args: Vec<&str> = rest.split_whitespace().collect();
                let result = Alias::new("repl", arguments.clone(), &lines)
                    .and_then(|alias| alias.invoke(&args, &mut echo, config));
                match result {
                    Ok(outcome) => println!(
                        "{}",
                        format!("({} commands, {} steps)", outcome.commands, outcome.steps)
                            .dimmed()
                    ),
                    Err(e) => eprintln!("{}", e.to_string().red()),
                }
            }
            _ => {
                // Keep the line only if the script still compiles, allowing
                // for blocks that haven't been closed yet
                lines.push(line.clone());
                match aliasvm::compile(&arguments, &lines) {
                    Ok(_) => open_block = false,
                    Err(e) if matches!(e.kind, ErrorKind::UnterminatedBlock { .. }) => {
                        open_block = true;
                    }
                    Err(e) => {
                        lines.pop();
                        eprintln!("{}", e.to_string().red());
                    }
                }
            }
        }
    }
}

fn print_repl_help() {
    println!("{}", "REPL Commands:".yellow());
    println!("  :run [args]     Compile the script and run it");
    println!("  :args <decls>   Declare arguments, e.g. :args n:int_range(1,9) who:word");
    println!("  :list           Show the script");
    println!("  :disasm         Show the compiled program");
    println!("  :clear          Forget the script and arguments");
    println!("  exit, quit      Exit the REPL\n");
    println!("{}", "Script Examples:".yellow());
    println!("  i = 0");
    println!("  while i < 3");
    println!("  say {{$i}}");
    println!("  i = i + 1");
    println!("  end");
}
