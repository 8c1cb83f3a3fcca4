use crate::backend::Backend;
use crate::commands::{CommandParser, Entry, Op, Shape, Table};
use crate::error::CommandError;
use crate::frame::Frame;

pub(super) fn register(table: &mut Table) {
    table.add(
        "ping",
        Shape::Fixed {
            required: 0,
            optional: 1,
        },
        ping,
    );
    table.add("echo", Shape::exactly(1), echo);
    table.insert(Entry {
        name: "quit",
        shape: Shape::exactly(0),
        op: Op::Quit,
    });
}

/// Returns PONG if no argument is provided, otherwise a copy of the argument as a bulk.
///
/// Ref: <https://redis.io/docs/latest/commands/ping/>
fn ping(_: &dyn Backend, args: &mut CommandParser) -> Result<Frame, CommandError> {
    match args.next_optional() {
        Some(message) => Ok(Frame::Bulk(message)),
        None => Ok(Frame::Simple("PONG".to_string())),
    }
}

/// Ref: <https://redis.io/docs/latest/commands/echo/>
fn echo(_: &dyn Backend, args: &mut CommandParser) -> Result<Frame, CommandError> {
    Ok(Frame::Bulk(args.next_bytes()?))
}
