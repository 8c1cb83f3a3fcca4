use crate::backend::Backend;
use crate::commands::{CommandParser, Shape, Table};
use crate::error::CommandError;
use crate::frame::Frame;
use crate::number;

pub(super) fn register(table: &mut Table) {
    table.add("keys", Shape::exactly(1), keys);
    table.add("exists", Shape::exactly(1), exists);
    table.add("get", Shape::exactly(1), get);
    table.add("set", Shape::exactly(2), set);
    table.add("del", Shape::at_least(1), del);
    table.add("incr", Shape::exactly(1), incr);
    table.add("incrby", Shape::exactly(2), incrby);
    table.add("decr", Shape::exactly(1), decr);
    table.add("decrby", Shape::exactly(2), decrby);
    table.add("incrbyfloat", Shape::exactly(2), incrbyfloat);
}

/// Returns all keys matching pattern.
///
/// Ref: <https://redis.io/docs/latest/commands/keys/>
fn keys(backend: &dyn Backend, args: &mut CommandParser) -> Result<Frame, CommandError> {
    let pattern = args.next_bytes()?;

    Ok(Frame::bulks(backend.keys(pattern)?))
}

/// Ref: <https://redis.io/docs/latest/commands/exists/>
fn exists(backend: &dyn Backend, args: &mut CommandParser) -> Result<Frame, CommandError> {
    let key = args.next_bytes()?;

    Ok(Frame::Integer(backend.exists(key)? as i64))
}

/// Get the value of key. If the key does not exist the special value nil is returned.
///
/// Ref: <https://redis.io/docs/latest/commands/get/>
fn get(backend: &dyn Backend, args: &mut CommandParser) -> Result<Frame, CommandError> {
    let key = args.next_bytes()?;

    Ok(backend.get(key)?.map_or(Frame::Null, Frame::Bulk))
}

/// Ref: <https://redis.io/docs/latest/commands/set/>
fn set(backend: &dyn Backend, args: &mut CommandParser) -> Result<Frame, CommandError> {
    let key = args.next_bytes()?;
    let value = args.next_bytes()?;

    backend.set(key, value)?;

    Ok(Frame::ok())
}

/// Removes the specified keys, whatever kind of value they hold. A key is ignored if it does
/// not exist.
///
/// Ref: <https://redis.io/docs/latest/commands/del/>
fn del(backend: &dyn Backend, args: &mut CommandParser) -> Result<Frame, CommandError> {
    let keys = args.remaining();

    Ok(Frame::Integer(backend.del(keys)? as i64))
}

/// Ref: <https://redis.io/docs/latest/commands/incr/>
fn incr(backend: &dyn Backend, args: &mut CommandParser) -> Result<Frame, CommandError> {
    let key = args.next_bytes()?;

    Ok(Frame::Integer(backend.incr_by(key, 1)?))
}

/// Ref: <https://redis.io/docs/latest/commands/incrby/>
fn incrby(backend: &dyn Backend, args: &mut CommandParser) -> Result<Frame, CommandError> {
    let key = args.next_bytes()?;
    let delta = args.next_integer()?;

    Ok(Frame::Integer(backend.incr_by(key, delta)?))
}

/// Ref: <https://redis.io/docs/latest/commands/decr/>
fn decr(backend: &dyn Backend, args: &mut CommandParser) -> Result<Frame, CommandError> {
    let key = args.next_bytes()?;

    Ok(Frame::Integer(backend.incr_by(key, -1)?))
}

/// Ref: <https://redis.io/docs/latest/commands/decrby/>
fn decrby(backend: &dyn Backend, args: &mut CommandParser) -> Result<Frame, CommandError> {
    let key = args.next_bytes()?;
    // i64::MIN has no positive counterpart.
    let delta = args
        .next_integer()?
        .checked_neg()
        .ok_or(CommandError::Overflow)?;

    Ok(Frame::Integer(backend.incr_by(key, delta)?))
}

/// Increment the string representing a floating point number stored at key by the specified
/// increment. The result is returned as a bulk string.
///
/// Ref: <https://redis.io/docs/latest/commands/incrbyfloat/>
fn incrbyfloat(backend: &dyn Backend, args: &mut CommandParser) -> Result<Frame, CommandError> {
    let key = args.next_bytes()?;
    let delta = args.next_float()?;

    let value = backend.incr_by_float(key, delta)?;

    Ok(Frame::Bulk(number::format_float(value)))
}
