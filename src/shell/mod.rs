//! Interactive command shell.
//!
//! Runs on the main thread and drives the core exclusively through the
//! `System` admission and query APIs. Until `initialize` succeeds, only
//! `initialize`, `help`, and `exit` are accepted. The scheduler worker runs
//! in the background from the moment initialization completes.

pub mod script;

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;

use crate::config::Config;
use crate::report::render_process_list;
use crate::system::System;

/// File paths resolved from the command line before the REPL starts.
pub struct ShellOptions {
    pub config_path: PathBuf,
    pub backing_store_path: PathBuf,
    pub report_path: PathBuf,
}

/// Runs the REPL until `exit` or end of input.
pub fn run(options: ShellOptions) {
    greeting();

    let mut system: Option<Arc<System>> = None;

    while let Some(line) = read_line("> ") {
        let input = line.trim();
        if input.is_empty() {
            continue;
        }

        let (command, rest) = split_command(input);
        match command {
            "exit" => break,
            "help" => show_help(),
            "initialize" => initialize(&mut system, &options),
            _ => {
                let Some(system) = system.as_ref() else {
                    println!("Emulator not initialized.");
                    continue;
                };
                dispatch(system, command, rest);
            }
        }
    }
}

fn dispatch(system: &Arc<System>, command: &str, rest: &str) {
    match command {
        "screen" => handle_screen(system, rest),
        "scheduler-start" => {
            system.scheduler_start();
            println!("Process generation started.");
        }
        "scheduler-stop" => {
            system.scheduler_stop();
            println!("Process generation stopped.");
        }
        "report-util" => match system.report_util() {
            Ok(path) => println!("Report saved to {}", path.display()),
            Err(err) => println!("could not write report: {err}"),
        },
        "process-smi" => system.process_smi().print(),
        "vmstat" => system.vmstat().print(),
        _ => println!("Unknown command"),
    }
}

fn initialize(system: &mut Option<Arc<System>>, options: &ShellOptions) {
    if system.is_some() {
        println!("Already initialized.");
        return;
    }

    let config = match Config::load(&options.config_path) {
        Ok(config) => config,
        Err(err) => {
            println!("{err}");
            return;
        }
    };

    match System::new(
        config,
        &options.backing_store_path,
        options.report_path.clone(),
    ) {
        Ok(built) => {
            built.start();
            *system = Some(Arc::new(built));
            println!("Initialized.");
        }
        Err(err) => println!("{err}"),
    }
}

fn handle_screen(system: &Arc<System>, param: &str) {
    let (sub, rest) = split_command(param);
    match sub {
        "-s" => screen_create(system, rest),
        "-c" => screen_create_scripted(system, rest),
        "-r" => screen_attach(system, rest),
        "-ls" => screen_list(system),
        _ => println!("Unknown command"),
    }
}

/// `screen -s <name> <memsize>`: starter-script process.
fn screen_create(system: &Arc<System>, rest: &str) {
    let mut tokens = rest.split_whitespace();
    let (Some(name), Some(size_token)) = (tokens.next(), tokens.next()) else {
        println!("invalid memory allocation");
        return;
    };
    let Ok(memory_size) = size_token.parse::<u32>() else {
        println!("invalid memory allocation");
        return;
    };

    match system.create_manual(name, memory_size) {
        Ok(_) => println!("Process {name} created."),
        Err(err) => println!("{err}"),
    }
}

/// `screen -c <name> <memsize> "<instructions>"`: user-scripted process.
fn screen_create_scripted(system: &Arc<System>, rest: &str) {
    let mut tokens = rest.splitn(3, char::is_whitespace);
    let (Some(name), Some(size_token)) = (tokens.next(), tokens.next()) else {
        println!("invalid memory allocation");
        return;
    };
    let Ok(memory_size) = size_token.parse::<u32>() else {
        println!("invalid memory allocation");
        return;
    };

    let code = tokens.next().unwrap_or("").trim();
    if code.len() < 2 || !code.starts_with('"') || !code.ends_with('"') {
        println!("invalid command");
        return;
    }
    let code = &code[1..code.len() - 1];

    let instructions = match script::parse_script(code) {
        Ok(instructions) => instructions,
        Err(err) => {
            println!("invalid command: {err}");
            return;
        }
    };

    match system.create_scripted(name, memory_size, instructions) {
        Ok(_) => println!("Process {name} created."),
        Err(err) => println!("{err}"),
    }
}

/// `screen -r <name>`: nested prompt showing the PCB view on demand.
fn screen_attach(system: &Arc<System>, name: &str) {
    let name = name.trim();
    if system.attach(name).is_none() {
        println!("process not found");
        return;
    }

    println!("Attached to {name}");
    while let Some(line) = read_line(&format!("{name}> ")) {
        match line.trim() {
            "process-smi" => match system.attach(name) {
                Some(view) => view.print(),
                None => {
                    println!("process not found");
                    break;
                }
            },
            "exit" => break,
            "" => {}
            _ => println!("Unknown command"),
        }
    }
}

/// `screen -ls`: utilization plus the full process list.
fn screen_list(system: &Arc<System>) {
    let utilization = system.utilization();
    println!("CPU Utilization: {:.2}%", utilization.percent);
    println!("Processes:");
    print!("{}", render_process_list(&system.list()));
}

fn greeting() {
    println!("=====================================");
    println!("            OS Emulator              ");
    println!("=====================================");
    println!("Type 'initialize' to start or 'help' for commands.\n");
}

fn show_help() {
    println!("\nAvailable Commands");
    println!("------------------");
    println!("initialize");
    println!("screen -s <name> <memsize>");
    println!("screen -c <name> <memsize> \"<instructions>\"");
    println!("screen -r <name>");
    println!("screen -ls");
    println!("scheduler-start");
    println!("scheduler-stop");
    println!("report-util");
    println!("process-smi");
    println!("vmstat");
    println!("exit\n");
    println!("Inside screen:");
    println!("  process-smi");
    println!("  exit\n");
}

/// Splits one input line into the leading command token and the rest.
fn split_command(input: &str) -> (&str, &str) {
    match input.split_once(char::is_whitespace) {
        Some((command, rest)) => (command, rest.trim_start()),
        None => (input, ""),
    }
}

/// Prompts and reads one line; `None` on end of input.
fn read_line(prompt: &str) -> Option<String> {
    print!("{prompt}");
    io::stdout().flush().ok();

    let mut line = String::new();
    match io::stdin().lock().read_line(&mut line) {
        Ok(0) | Err(_) => None,
        Ok(_) => Some(line),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_command_and_rest() {
        assert_eq!(split_command("screen -s p01 256"), ("screen", "-s p01 256"));
        assert_eq!(split_command("vmstat"), ("vmstat", ""));
    }
}
