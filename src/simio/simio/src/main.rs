extern crate clap;
use crossbeam_channel::{bounded, select, unbounded, Receiver}; // Ctrl-C signalling
use log::{error, info};
use std::convert::TryFrom;
use std::io::{self, BufRead};
use std::rc::Rc;
use std::thread;

use anyhow::Context;
use simio_core::{expr, Registry, Simio};
use simio_peripherals::{register_all, SocketConnector};
use simio_protocol::Endpoint;

mod console;
mod peer;

use console::{Console, Outcome};
use peer::Responder;

/// Configures command-line interface using clap
fn get_cli_config<'a>() -> clap::ArgMatches<'a> {
    let description = "Simulated IO devices bridged to external peer processes";
    clap::App::new("simio")
        .version("0.1")
        .about(description)
        .arg(
            clap::Arg::with_name("exec")
                .short("e")
                .long("exec")
                .takes_value(true)
                .multiple(true)
                .number_of_values(1)
                .help("Run a console command before reading the script/stdin"),
        )
        .arg(
            clap::Arg::with_name("file")
                .short("f")
                .long("file")
                .takes_value(true)
                .help("Run console commands from a script file"),
        )
        .arg(
            clap::Arg::with_name("no-repl")
                .long("no-repl")
                .help("Exit after -e/-f commands instead of reading stdin"),
        )
        .subcommand(
            clap::SubCommand::with_name("peer")
                .about("Answer device requests on an endpoint")
                .arg(
                    clap::Arg::with_name("endpoint")
                        .required(true)
                        .index(1)
                        .help("ipc://<path> or tcp://<host>:<port>"),
                )
                .arg(
                    clap::Arg::with_name("xor")
                        .long("xor")
                        .takes_value(true)
                        .conflicts_with("constant")
                        .help("Reply with request ^ mask (default 0, echo)"),
                )
                .arg(
                    clap::Arg::with_name("constant")
                        .long("constant")
                        .takes_value(true)
                        .help("Reply with a fixed byte"),
                )
                .arg(
                    clap::Arg::with_name("count")
                        .long("count")
                        .takes_value(true)
                        .help("Stop after this many exchanges"),
                ),
        )
        .get_matches()
}

/// Install a Ctrl-C handler; a second Ctrl-C before the first is seen exits
fn stop_signal() -> anyhow::Result<Receiver<()>> {
    let (signal_sender, signal_receiver) = bounded(1);
    ctrlc::set_handler(move || {
        if signal_sender.is_full() {
            std::process::exit(-1); // Emergency exit if channel blocked
        }
        let _send_result = signal_sender.send(());
    })
    .context("installing signal handler")?;
    Ok(signal_receiver)
}

fn byte_arg(matches: &clap::ArgMatches, name: &str) -> anyhow::Result<Option<u8>> {
    matches
        .value_of(name)
        .map(|text| {
            let val = expr::eval(text).with_context(|| format!("--{} {}", name, text))?;
            u8::try_from(val).with_context(|| format!("--{} must fit in a byte", name))
        })
        .transpose()
}

fn run_peer(matches: &clap::ArgMatches) -> anyhow::Result<()> {
    let text = matches.value_of("endpoint").unwrap_or_default();
    let endpoint: Endpoint = text.parse()?;

    let responder = match byte_arg(matches, "constant")? {
        Some(byte) => Responder::Constant(byte),
        None => Responder::Xor(byte_arg(matches, "xor")?.unwrap_or(0)),
    };
    let count = matches
        .value_of("count")
        .map(|text| expr::eval(text).map(|val| val as usize))
        .transpose()
        .context("--count")?;

    let stop = stop_signal()?;
    let exchanges = peer::serve(&endpoint, responder, count, stop)?;
    println!("{} exchanges", exchanges);
    Ok(())
}

/// Run one console line, reporting failures without stopping
fn run_line(console: &mut Console, line: &str) -> bool {
    match console.execute(line) {
        Ok(Outcome::Text(text)) => {
            print!("{}", text);
            true
        }
        Ok(Outcome::Quit) => false,
        Err(e) => {
            error!("{}", e);
            eprintln!("error: {}", e);
            true
        }
    }
}

fn run_console(matches: &clap::ArgMatches) -> anyhow::Result<()> {
    let mut registry = Registry::new();
    register_all(&mut registry, Rc::new(SocketConnector));
    let mut console = Console::new(Simio::new(registry));

    for line in matches.values_of("exec").into_iter().flatten() {
        if !run_line(&mut console, line) {
            return Ok(());
        }
    }

    if let Some(path) = matches.value_of("file") {
        let script =
            std::fs::read_to_string(path).with_context(|| format!("reading script {}", path))?;
        for line in script.lines() {
            if !run_line(&mut console, line) {
                return Ok(());
            }
        }
    }

    if matches.is_present("no-repl") {
        return Ok(());
    }

    let stop = stop_signal()?;
    repl(&mut console, stdin_lines(), &stop)
}

/// Forward stdin lines from a reader thread so the console can wait on Ctrl-C too
fn stdin_lines() -> Receiver<io::Result<String>> {
    let (line_sender, line_receiver) = unbounded();
    thread::spawn(move || {
        for line in io::stdin().lock().lines() {
            if line_sender.send(line).is_err() {
                break;
            }
        }
    });
    line_receiver
}

/// Run console lines until input ends, `quit`, or a stop signal
fn repl(
    console: &mut Console,
    lines: Receiver<io::Result<String>>,
    stop: &Receiver<()>,
) -> anyhow::Result<()> {
    loop {
        select! {
            recv(lines) -> line => match line {
                Ok(line) => {
                    let line = line.context("reading stdin")?;
                    if !run_line(console, &line) {
                        return Ok(());
                    }
                }
                Err(_) => return Ok(()), // end of input
            },
            recv(stop) -> _ => {
                info!("Interrupted, leaving console");
                return Ok(());
            }
        }
    }
}

/// Main entry point for the simio host
fn main() {
    env_logger::init();

    // Parse command-line arguments
    let cli_matches = get_cli_config();

    let result = match cli_matches.subcommand_matches("peer") {
        Some(peer_matches) => run_peer(peer_matches),
        None => run_console(&cli_matches),
    };

    if let Err(e) = result {
        error!("{:#}", e);
        eprintln!("simio: {:#}", e);
        std::process::exit(1);
    }
}

#[cfg(test)]
mod repl_tests {
    use super::*;

    use std::time::Duration;

    use simio_peripherals::InprocConnector;

    fn console() -> Console {
        let mut registry = Registry::new();
        register_all(&mut registry, Rc::new(InprocConnector::new()));
        Console::new(Simio::new(registry))
    }

    #[test]
    fn test_stop_while_waiting_for_input() {
        let (line_sender, lines) = unbounded();
        let (stop_sender, stop) = bounded(1);

        let worker = thread::spawn(move || {
            let mut console = console();
            repl(&mut console, lines, &stop).is_ok()
        });
        line_sender.send(Ok("mw 0x03 0x08".to_string())).unwrap();
        thread::sleep(Duration::from_millis(50));
        stop_sender.send(()).unwrap();

        // Input stays open; only the stop signal can end the loop
        let (done_sender, done) = bounded(1);
        thread::spawn(move || {
            let _ = done_sender.send(worker.join().unwrap());
        });
        assert_eq!(done.recv_timeout(Duration::from_secs(2)), Ok(true));
        drop(line_sender);
    }

    #[test]
    fn test_quit_and_end_of_input() {
        let mut console = console();
        let (_stop_sender, stop) = bounded(1);

        let (line_sender, lines) = unbounded();
        line_sender.send(Ok("reset".to_string())).unwrap();
        line_sender.send(Ok("quit".to_string())).unwrap();
        line_sender.send(Ok("bogus".to_string())).unwrap();
        assert!(repl(&mut console, lines, &stop).is_ok());

        let (line_sender, lines) = unbounded();
        line_sender.send(Ok("reset".to_string())).unwrap();
        drop(line_sender);
        assert!(repl(&mut console, lines, &stop).is_ok());
    }
}
