// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2025 Daniel Negri
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

use chrono::Utc;
use clap::Parser;
use csv::Writer;
use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use thiserror::Error;
use ticket_reservation_rs::config::{DEFAULT_QUEUE_DEPTH, DEFAULT_WORKERS};
use ticket_reservation_rs::{
    Client, DispatchError, Dispatcher, DispatcherConfig, EngineConfig, EventId, ReservationEngine,
    ReservationError, Response,
};

/// Ticket Reservation - Run reservation commands concurrently
///
/// Creates a set of events, runs every command in FILE as its own concurrent
/// client, and writes the final event table to stdout as CSV.
#[derive(Parser, Debug)]
#[command(name = "ticket-reservation-rs")]
#[command(about = "Runs ticket reservation commands against a set of events", long_about = None)]
struct Args {
    /// Path to the command file
    ///
    /// One command per line: a single number lists events, `<event-id> <quantity>` reserves.
    /// Example: cargo run -- input.txt > events.csv
    #[arg(value_name = "FILE")]
    input: PathBuf,

    /// Number of events to create (named event0, event1, ...)
    #[arg(long, default_value_t = 3)]
    events: u64,

    /// Tickets per created event
    #[arg(long, default_value_t = 100)]
    tickets: u32,

    /// Dispatcher worker threads
    #[arg(long, env = "TICKETS_WORKERS", default_value_t = DEFAULT_WORKERS)]
    workers: usize,

    /// Requests that can be queued before clients block
    #[arg(long, env = "TICKETS_QUEUE_DEPTH", default_value_t = DEFAULT_QUEUE_DEPTH)]
    queue_depth: usize,

    /// How long a reservation waits for its turn, in milliseconds
    #[arg(long, env = "TICKETS_ADMISSION_TIMEOUT_MS", default_value_t = 5000)]
    admission_timeout_ms: u64,
}

impl Args {
    fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            admission_timeout: Duration::from_millis(self.admission_timeout_ms),
        }
    }

    fn dispatcher_config(&self) -> DispatcherConfig {
        DispatcherConfig {
            workers: self.workers,
            queue_depth: self.queue_depth,
        }
    }
}

/// Initialize the global `tracing` subscriber, writing to stderr.
///
/// Reads `RUST_LOG` for filtering and defaults to `info`.
fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn main() {
    init_tracing();

    // Parse command line arguments
    let args = Args::parse();

    let file = match File::open(&args.input) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("Error opening file '{}': {}", args.input.display(), e);
            process::exit(1);
        }
    };

    let commands = match parse_commands(BufReader::new(file)) {
        Ok(commands) => commands,
        Err(e) => {
            eprintln!("Error reading commands: {}", e);
            process::exit(1);
        }
    };

    let engine = Arc::new(ReservationEngine::with_config(args.engine_config()));
    if let Err(e) = create_events(&engine, args.events, args.tickets) {
        eprintln!("Error creating events: {}", e);
        process::exit(1);
    }

    let dispatcher = match Dispatcher::start(Arc::clone(&engine), args.dispatcher_config()) {
        Ok(dispatcher) => dispatcher,
        Err(e) => {
            eprintln!("Error starting dispatcher: {}", e);
            process::exit(1);
        }
    };

    tracing::info!(commands = commands.len(), "Running commands");
    let outcome = run_commands(&dispatcher.client(), &commands);
    dispatcher.shutdown();

    match outcome {
        Ok(responses) => {
            let rejected = responses.iter().filter(|r| !r.is_success()).count();
            tracing::info!(total = responses.len(), rejected, "All commands answered");
        }
        Err(e) => {
            eprintln!("Error dispatching commands: {}", e);
            process::exit(1);
        }
    }

    // Write results to stdout
    if let Err(e) = write_events(&engine, std::io::stdout()) {
        eprintln!("Error writing output: {}", e);
        process::exit(1);
    }
}

/// A parsed line of the command file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    List,
    Reserve { event_id: EventId, quantity: u32 },
}

#[derive(Debug, Error)]
enum CommandError {
    #[error("line {line}: invalid command {text:?}")]
    Invalid { line: usize, text: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Parse commands from a reader, one per line.
///
/// # Format
///
/// - `<n>`: a single number lists all events (the value itself is ignored).
/// - `<event-id> <quantity>`: reserve `quantity` tickets for the event.
/// - Blank lines are skipped.
///
/// ```text
/// 0
/// 1 4
/// 2 10
/// ```
///
/// # Errors
///
/// The whole file is rejected at the first malformed line, before any
/// command runs.
fn parse_commands<R: BufRead>(reader: R) -> Result<Vec<Command>, CommandError> {
    let mut commands = Vec::new();

    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        let invalid = || CommandError::Invalid {
            line: index + 1,
            text: line.clone(),
        };

        let fields: Vec<&str> = line.split_whitespace().collect();
        let command = match fields.as_slice() {
            [] => continue,
            [code] => {
                code.parse::<i64>().map_err(|_| invalid())?;
                Command::List
            }
            [event_id, quantity] => Command::Reserve {
                event_id: event_id.parse().map_err(|_| invalid())?,
                quantity: quantity.parse().map_err(|_| invalid())?,
            },
            _ => return Err(invalid()),
        };
        commands.push(command);
    }

    Ok(commands)
}

/// Create `count` events named `event0..` with `tickets` tickets each.
fn create_events(
    engine: &ReservationEngine,
    count: u64,
    tickets: u32,
) -> Result<(), ReservationError> {
    for i in 0..count {
        engine.create_event(format!("event{i}"), Utc::now(), tickets)?;
    }
    Ok(())
}

/// Run each command as its own concurrent client and wait for every response.
///
/// Responses are returned in command order.
fn run_commands(client: &Client, commands: &[Command]) -> Result<Vec<Response>, DispatchError> {
    thread::scope(|s| {
        let handles: Vec<_> = commands
            .iter()
            .map(|&command| {
                let client = client.clone();
                s.spawn(move || -> Result<Response, DispatchError> {
                    let pending = match command {
                        Command::List => client.list()?,
                        Command::Reserve { event_id, quantity } => {
                            client.reserve(event_id, quantity)?
                        }
                    };
                    let response = pending.wait()?;
                    tracing::info!(?command, message = %response.message, "Got response");
                    Ok(response)
                })
            })
            .collect();

        handles
            .into_iter()
            .map(|handle| handle.join().unwrap_or(Err(DispatchError::Disconnected)))
            .collect()
    })
}

/// Write the event table to a CSV writer.
///
/// # CSV Format
///
/// Columns: `id, name, date, total, available`
///
/// ```csv
/// id,name,date,total,available
/// 0,event0,2025-01-01T00:00:00Z,100,96
/// ```
///
/// # Errors
///
/// Returns a CSV error if writing fails.
fn write_events<W: Write>(engine: &ReservationEngine, writer: W) -> Result<(), csv::Error> {
    let mut wtr = Writer::from_writer(writer);

    for event in engine.list_events().iter() {
        wtr.serialize(event)?;
    }

    // Flush to ensure all data is written
    wtr.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn engine_with_events(count: u64, tickets: u32) -> Arc<ReservationEngine> {
        let engine = Arc::new(ReservationEngine::new());
        create_events(&engine, count, tickets).unwrap();
        engine
    }

    #[test]
    fn parse_list_and_reserve() {
        let input = "0\n1 4\n";
        let commands = parse_commands(Cursor::new(input)).unwrap();
        assert_eq!(
            commands,
            vec![
                Command::List,
                Command::Reserve {
                    event_id: EventId(1),
                    quantity: 4
                }
            ]
        );
    }

    #[test]
    fn parse_skips_blank_lines_and_whitespace() {
        let input = "\n   \n  2   10  \n";
        let commands = parse_commands(Cursor::new(input)).unwrap();
        assert_eq!(
            commands,
            vec![Command::Reserve {
                event_id: EventId(2),
                quantity: 10
            }]
        );
    }

    #[test]
    fn parse_rejects_malformed_lines() {
        for input in ["list\n", "1 x\n", "x 1\n", "1 -3\n", "1 2 3\n"] {
            let result = parse_commands(Cursor::new(input));
            assert!(
                matches!(result, Err(CommandError::Invalid { line: 1, .. })),
                "expected {input:?} to be rejected"
            );
        }
    }

    #[test]
    fn parse_reports_line_number() {
        let input = "0\n1 1\nbad line here\n";
        let err = parse_commands(Cursor::new(input)).unwrap_err();
        assert_eq!(
            err.to_string(),
            "line 3: invalid command \"bad line here\""
        );
    }

    #[test]
    fn create_events_names_sequentially() {
        let engine = engine_with_events(3, 100);
        let listing = engine.list_events();
        let names: Vec<&str> = listing.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["event0", "event1", "event2"]);
        assert!(listing.iter().all(|e| e.available_tickets == 100));
    }

    #[test]
    fn run_commands_answers_every_command() {
        let engine = engine_with_events(2, 10);
        let dispatcher = Dispatcher::start(Arc::clone(&engine), DispatcherConfig::default()).unwrap();

        let commands = vec![
            Command::Reserve {
                event_id: EventId(0),
                quantity: 4,
            },
            Command::List,
            Command::Reserve {
                event_id: EventId(7),
                quantity: 1,
            },
            Command::Reserve {
                event_id: EventId(1),
                quantity: 11,
            },
        ];
        let responses = run_commands(&dispatcher.client(), &commands).unwrap();
        dispatcher.shutdown();

        assert_eq!(responses.len(), 4);
        assert_eq!(responses[0].tickets().map(<[_]>::len), Some(4));
        assert!(responses[1].events().is_some());
        assert_eq!(responses[2].error(), Some(&ReservationError::NotFound));
        assert_eq!(
            responses[3].error(),
            Some(&ReservationError::InsufficientInventory)
        );
        assert_eq!(engine.get_event(EventId(0)).unwrap().available_tickets(), 6);
    }

    #[test]
    fn write_events_to_csv() {
        let engine = engine_with_events(2, 50);

        let mut output = Vec::new();
        write_events(&engine, &mut output).unwrap();

        let output_str = String::from_utf8(output).unwrap();
        let mut lines = output_str.lines();
        assert_eq!(lines.next(), Some("id,name,date,total,available"));
        assert!(lines.next().unwrap().starts_with("0,event0,"));
        assert!(lines.next().unwrap().ends_with(",50,50"));
        assert_eq!(lines.next(), None);
    }
}
