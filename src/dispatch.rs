use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use tracing::{debug, error};

use crate::backend::Backend;
use crate::command::Command;
use crate::commands::{CommandParser, Op, Table};
use crate::error::CommandError;
use crate::frame::Frame;

/// The reply to one command and whether the connection ends after it.
#[derive(Debug, PartialEq)]
pub struct Response {
    pub frame: Frame,
    pub close: bool,
}

impl Response {
    fn reply(frame: Frame) -> Response {
        Response {
            frame,
            close: false,
        }
    }
}

/// Resolves commands against the command table and runs them on a backend.
///
/// Every command gets exactly one reply. Nothing a command does, panics included, takes the
/// connection down; only `QUIT` asks for it to be closed.
#[derive(Clone)]
pub struct Dispatcher {
    table: Arc<Table>,
    backend: Arc<dyn Backend>,
}

impl Dispatcher {
    pub fn new(backend: Arc<dyn Backend>) -> Dispatcher {
        Dispatcher {
            table: Arc::new(Table::new()),
            backend,
        }
    }

    pub fn dispatch(&self, command: Command) -> Response {
        let inline = command.inline;
        let mut response = self.execute(command);
        if inline {
            response.frame = response.frame.into_inline();
        }
        response
    }

    fn execute(&self, command: Command) -> Response {
        let Some(entry) = self.table.get(&command.name.to_ascii_lowercase()) else {
            let name = String::from_utf8_lossy(&command.name);
            debug!(command = %name, "unknown command");
            return Response::reply(Frame::Error(format!("ERR unknown command '{name}'")));
        };

        if !entry.shape.accepts(command.args.len()) {
            return Response::reply(failure(
                entry.name,
                CommandError::WrongArity(entry.name.to_string()),
            ));
        }

        let handler = match entry.op {
            Op::Call(handler) => handler,
            Op::Quit => {
                return Response {
                    frame: Frame::ok(),
                    close: true,
                }
            }
        };

        let mut args = CommandParser::new(entry.name, command.args);
        let backend = &*self.backend;
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| handler(backend, &mut args)));

        match outcome {
            Ok(Ok(frame)) => Response::reply(frame),
            Ok(Err(err)) => Response::reply(failure(entry.name, err)),
            Err(payload) => {
                error!(
                    command = entry.name,
                    panic = panic_message(&*payload),
                    "command panicked"
                );
                Response::reply(Frame::Error("ERR internal error".to_string()))
            }
        }
    }
}

fn failure(command: &str, err: CommandError) -> Frame {
    if err.is_internal() {
        error!(command, error = %err, "command failed");
    } else {
        debug!(command, error = %err, "command rejected");
    }

    Frame::Error(format!("ERR {err}"))
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown")
}
