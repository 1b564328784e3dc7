extern crate clap;
#[macro_use] extern crate log;
extern crate fern;
extern crate chrono;
extern crate term_grid;

use clap::{Arg, ArgMatches, App};
use term_grid::{Grid, GridOptions, Direction, Filling, Cell};

use rcasm::assembler;
use rcasm::assembler::ast::Program;
use rcasm::assembler::lexer::Scanner;

use std::fs;
use std::io::Write;

fn main() {
    let args = process_arguments();
    initialize_logging(args.occurrences_of("verbose"));

    let ifile = args.value_of("INPUT").unwrap_or_default();
    debug!("Arguments:\n\tVerbosity: {}\n\tScan Only: {}\n\tJSON: {}\n\tOutfile: {}\n\tInfile: {}",
        level_for(args.occurrences_of("verbose")),
        args.is_present("tokens"),
        args.is_present("json"),
        args.value_of("output").unwrap_or("None"),
        ifile
    );

    // The whole source is read up front; the scanner works on memory only.
    let source = match fs::read_to_string(ifile) {
        Err(err) => {
            error!("fatal: unable to read input file `{}`: {}", ifile, err);
            std::process::exit(1);
        },
        Ok(text) => text,
    };

    let output = if args.is_present("tokens") {
        render_tokens(ifile, &source, args.is_present("json"))
    } else {
        let program = match assembler::parse(ifile, &source) {
            Err(err) => {
                error!("{}:{}", ifile, err);
                std::process::exit(1);
            },
            Ok(program) => program,
        };
        info!("parsed {} instruction(s) from `{}`", program.len(), ifile);

        if args.is_present("print-debug") {
            print_grid(&program);
        }

        if args.is_present("json") {
            to_json(&program)
        } else {
            program.to_string()
        }
    };

    let result = match args.value_of("output") {
        Some(filename) => fs::write(filename, output),
        None => std::io::stdout().write_all(output.as_bytes()),
    };
    if let Err(err) = result {
        error!("fatal: unable to write output: {}", err);
        std::process::exit(1);
    }
}

/// Lists every token up to and including the terminal one, one per line.
fn render_tokens(name: &str, source: &str, json: bool) -> String {
    let tokens: Vec<_> = Scanner::new(name, source).collect();
    if json {
        return to_json(&tokens);
    }
    tokens.iter()
        .map(|tok| format!("{:>4}: {}\n", tok.line, tok))
        .collect()
}

fn to_json<T: serde::Serialize>(value: &T) -> String {
    match serde_json::to_string_pretty(value) {
        Ok(mut text) => {
            text.push('\n');
            text
        },
        Err(err) => {
            error!("fatal: unable to serialize output: {}", err);
            std::process::exit(1);
        },
    }
}

fn print_grid(program: &Program) {
    let mut grid = Grid::new(GridOptions {
        filling:     Filling::Spaces(2),
        direction:   Direction::LeftToRight,
    });

    for (idx, ins) in program.iter().chain(program.end.iter()).enumerate() {
        let operands: Vec<String> = ins.operands.iter().map(|op| op.to_string()).collect();
        let refs: Vec<&str> = ins.operands.iter().flat_map(|op| op.expr.labels()).collect();
        grid.add(Cell::from(format!("{:04}:", idx)));
        grid.add(Cell::from(ins.labels.join(", ")));
        grid.add(Cell::from(ins.operation.to_string()));
        grid.add(Cell::from(operands.join(", ")));
        grid.add(Cell::from(format!("refs: {}", refs.join(" "))));
    }

    eprint!("{}", grid.fit_into_columns(5));
}

fn process_arguments() -> ArgMatches<'static> {
    App::new(clap::crate_name!())
        .version(clap::crate_version!())
        .about(clap::crate_description!())
        .arg(Arg::with_name("INPUT")
            .help("Sets the input file to use")
            .required(true)
            .multiple(false)
            .index(1))
        .arg(Arg::with_name("verbose")
            .short("v")
            .multiple(true)
            .takes_value(false)
            .help("Sets the level of verbosity"))
        .arg(Arg::with_name("output")
            .short("o")
            .takes_value(true)
            .help("write output to an outfile instead of STDOUT"))
        .arg(Arg::with_name("json")
            .short("j")
            .takes_value(false)
            .help("write the output as JSON"))
        .arg(Arg::with_name("tokens")
            .short("t")
            .takes_value(false)
            .help("scan only and list the tokens"))
        .arg(Arg::with_name("print-debug")
            .short("d")
            .alias("show")
            .takes_value(false)
            .help("prints the parsed instructions as a table to STDERR"))
        .get_matches()
}

fn level_for(verbosity: u64) -> log::LevelFilter {
    match verbosity {
        0 => log::LevelFilter::Error,
        1 => log::LevelFilter::Warn,
        2 => log::LevelFilter::Info,
        3 | _ => log::LevelFilter::Debug,
    }
}

fn initialize_logging(verbosity: u64) {
    fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "{}[{}][{}] {}",
                chrono::Local::now().format("[%Y-%m-%d][%H:%M:%S]"),
                record.target(),
                record.level(),
                message
            ))
        })
        .level(level_for(verbosity))
        .chain(std::io::stderr())
        .apply().ok();
}
