extern crate clap;
extern crate dirs;
extern crate env_logger;
extern crate fnv;
extern crate log;
extern crate rustyline;
extern crate tricolor;

use std::fs::File;
use std::io;
use std::io::prelude::*;
use std::process;

use clap::{App, Arg, ArgMatches};

use rustyline::error::ReadlineError;
use rustyline::Editor;

use tricolor::HeapConfig;

mod error;
mod session;

use crate::error::{err_command, ExplorerError};
use crate::session::Session;

/// Read a file into a String
fn load_file(filename: &str) -> Result<String, io::Error> {
    let mut contents = String::new();

    File::open(filename)?.read_to_string(&mut contents)?;

    Ok(contents)
}

/// Run every command in a file, stopping at the first error
fn read_file(filename: &str, config: HeapConfig) -> Result<(), ExplorerError> {
    let contents = load_file(&filename)?;
    let mut session = Session::new(config);

    for (count, line) in contents.lines().enumerate() {
        match session.run(line) {
            Ok(Some(output)) => println!("{}", output),
            Ok(None) => (),
            // count starts at 0, line numbers start at 1
            Err(e) => return Err(e.at_line(count + 1)),
        }
    }

    Ok(())
}

/// Read a command at a time, printing the result
fn read_print_loop(config: HeapConfig) -> Result<(), ExplorerError> {
    // establish a repl input history file path
    let history_file = match dirs::home_dir() {
        Some(mut path) => {
            path.push(".tricolor_history");
            path.to_str().map(String::from)
        }
        None => None,
    };

    let mut reader = Editor::<()>::new();

    // Try to load the repl history file
    if let Some(ref path) = history_file {
        if let Err(err) = reader.load_history(&path) {
            eprintln!("Could not read history: {}", err);
        }
    }

    let mut session = Session::new(config);

    // repl
    loop {
        let readline = reader.readline("> ");

        match readline {
            // valid input
            Ok(line) => {
                reader.add_history_entry(line.as_str());

                match session.run(&line) {
                    Ok(Some(output)) => println!("{}", output),
                    Ok(None) => (),
                    Err(e) if e.is_fatal() => return Err(e),
                    Err(e) => println!("error: {}", e),
                }
            }

            // some kind of program termination condition
            Err(e) => {
                if let Some(ref path) = history_file {
                    reader.save_history(&path).unwrap_or_else(|err| {
                        eprintln!("could not save input history in {}: {}", path, err);
                    });
                }

                // EOF and ctrl-c are fine
                return match e {
                    ReadlineError::Eof | ReadlineError::Interrupted => Ok(()),
                    e => Err(ExplorerError::from(e)),
                };
            }
        }
    }
}

/// Parse an optional positive size flag
fn size_flag(matches: &ArgMatches, name: &str) -> Result<Option<usize>, ExplorerError> {
    match matches.value_of(name) {
        Some(value) => match value.parse::<usize>() {
            Ok(n) if n > 0 => Ok(Some(n)),
            _ => Err(err_command(&format!("--{} expects a positive integer", name))),
        },
        None => Ok(None),
    }
}

/// Environment settings, overridden by any command line flags
fn heap_config(matches: &ArgMatches) -> Result<HeapConfig, ExplorerError> {
    let mut config = HeapConfig::from_env();

    if let Some(n) = size_flag(matches, "cells-per-page")? {
        config.cells_per_page = n;
    }
    if let Some(n) = size_flag(matches, "roots-per-page")? {
        config.roots_per_page = n;
    }
    if let Some(n) = size_flag(matches, "page-limit")? {
        config.page_limit = Some(n);
    }

    Ok(config)
}

fn main() {
    env_logger::init();

    // parse command line arguments, an optional filename and heap sizing
    let matches = App::new("Tricolor Explorer")
        .about("Drive a tri-color heap one command at a time")
        .arg(
            Arg::with_name("filename")
                .help("Optional command file to run")
                .index(1),
        )
        .arg(
            Arg::with_name("cells-per-page")
                .long("cells-per-page")
                .takes_value(true)
                .help("Cons cells added per table growth step"),
        )
        .arg(
            Arg::with_name("roots-per-page")
                .long("roots-per-page")
                .takes_value(true)
                .help("Root entries added per root table growth step"),
        )
        .arg(
            Arg::with_name("page-limit")
                .long("page-limit")
                .takes_value(true)
                .help("Maximum number of pages the heap may allocate"),
        )
        .get_matches();

    let config = heap_config(&matches).unwrap_or_else(|err| {
        eprintln!("{}", err);
        process::exit(2);
    });

    if let Some(filename) = matches.value_of("filename") {
        // if a filename was specified, run its commands
        read_file(filename, config).unwrap_or_else(|err| {
            eprintln!("Terminated: {}", err);
            process::exit(1);
        });
    } else {
        // otherwise begin a repl
        read_print_loop(config).unwrap_or_else(|err| {
            eprintln!("Terminated: {}", err);
            process::exit(1);
        });
    }
}
