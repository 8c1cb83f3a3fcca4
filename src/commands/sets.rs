use crate::backend::Backend;
use crate::commands::{CommandParser, Shape, Table};
use crate::error::CommandError;
use crate::frame::Frame;
use crate::number;

pub(super) fn register(table: &mut Table) {
    table.add("sadd", Shape::at_least(2), sadd);
    table.add("scard", Shape::exactly(1), scard);
    table.add("sismember", Shape::exactly(2), sismember);
    table.add("smembers", Shape::exactly(1), smembers);
    table.add("srem", Shape::at_least(2), srem);
    table.add("sdiff", Shape::at_least(1), sdiff);
    table.add("sdiffstore", Shape::at_least(2), sdiffstore);
    table.add("sinter", Shape::at_least(1), sinter);
    table.add("sinterstore", Shape::at_least(2), sinterstore);
    table.add("sunion", Shape::at_least(1), sunion);
    table.add("sunionstore", Shape::at_least(2), sunionstore);
    table.add("smove", Shape::exactly(3), smove);
    table.add("spop", Shape::exactly(1), spop);
    table.add(
        "srandmember",
        Shape::Fixed {
            required: 1,
            optional: 1,
        },
        srandmember,
    );
}

/// Add the specified members to the set stored at key. Replies with the number of members
/// that were not already present.
///
/// Ref: <https://redis.io/docs/latest/commands/sadd/>
fn sadd(backend: &dyn Backend, args: &mut CommandParser) -> Result<Frame, CommandError> {
    let key = args.next_bytes()?;
    let members = args.remaining();

    Ok(Frame::Integer(backend.sadd(key, members)? as i64))
}

/// Ref: <https://redis.io/docs/latest/commands/scard/>
fn scard(backend: &dyn Backend, args: &mut CommandParser) -> Result<Frame, CommandError> {
    let key = args.next_bytes()?;

    Ok(Frame::Integer(backend.scard(key)? as i64))
}

/// Ref: <https://redis.io/docs/latest/commands/sismember/>
fn sismember(backend: &dyn Backend, args: &mut CommandParser) -> Result<Frame, CommandError> {
    let key = args.next_bytes()?;
    let member = args.next_bytes()?;

    Ok(Frame::Integer(backend.sismember(key, member)? as i64))
}

/// Ref: <https://redis.io/docs/latest/commands/smembers/>
fn smembers(backend: &dyn Backend, args: &mut CommandParser) -> Result<Frame, CommandError> {
    let key = args.next_bytes()?;

    Ok(Frame::bulks(backend.smembers(key)?))
}

/// Ref: <https://redis.io/docs/latest/commands/srem/>
fn srem(backend: &dyn Backend, args: &mut CommandParser) -> Result<Frame, CommandError> {
    let key = args.next_bytes()?;
    let members = args.remaining();

    Ok(Frame::Integer(backend.srem(key, members)? as i64))
}

/// Ref: <https://redis.io/docs/latest/commands/sdiff/>
fn sdiff(backend: &dyn Backend, args: &mut CommandParser) -> Result<Frame, CommandError> {
    Ok(Frame::bulks(backend.sdiff(args.remaining())?))
}

/// Ref: <https://redis.io/docs/latest/commands/sdiffstore/>
fn sdiffstore(backend: &dyn Backend, args: &mut CommandParser) -> Result<Frame, CommandError> {
    let destination = args.next_bytes()?;
    let keys = args.remaining();

    Ok(Frame::Integer(backend.sdiffstore(destination, keys)? as i64))
}

/// Ref: <https://redis.io/docs/latest/commands/sinter/>
fn sinter(backend: &dyn Backend, args: &mut CommandParser) -> Result<Frame, CommandError> {
    Ok(Frame::bulks(backend.sinter(args.remaining())?))
}

/// Ref: <https://redis.io/docs/latest/commands/sinterstore/>
fn sinterstore(backend: &dyn Backend, args: &mut CommandParser) -> Result<Frame, CommandError> {
    let destination = args.next_bytes()?;
    let keys = args.remaining();

    Ok(Frame::Integer(backend.sinterstore(destination, keys)? as i64))
}

/// Ref: <https://redis.io/docs/latest/commands/sunion/>
fn sunion(backend: &dyn Backend, args: &mut CommandParser) -> Result<Frame, CommandError> {
    Ok(Frame::bulks(backend.sunion(args.remaining())?))
}

/// Ref: <https://redis.io/docs/latest/commands/sunionstore/>
fn sunionstore(backend: &dyn Backend, args: &mut CommandParser) -> Result<Frame, CommandError> {
    let destination = args.next_bytes()?;
    let keys = args.remaining();

    Ok(Frame::Integer(backend.sunionstore(destination, keys)? as i64))
}

/// Ref: <https://redis.io/docs/latest/commands/smove/>
fn smove(backend: &dyn Backend, args: &mut CommandParser) -> Result<Frame, CommandError> {
    let source = args.next_bytes()?;
    let destination = args.next_bytes()?;
    let member = args.next_bytes()?;

    Ok(Frame::Integer(backend.smove(source, destination, member)? as i64))
}

/// Ref: <https://redis.io/docs/latest/commands/spop/>
fn spop(backend: &dyn Backend, args: &mut CommandParser) -> Result<Frame, CommandError> {
    let key = args.next_bytes()?;

    Ok(backend.spop(key)?.map_or(Frame::Null, Frame::Bulk))
}

/// Ref: <https://redis.io/docs/latest/commands/srandmember/>
fn srandmember(backend: &dyn Backend, args: &mut CommandParser) -> Result<Frame, CommandError> {
    let key = args.next_bytes()?;
    let count = match args.next_optional() {
        Some(count) => Some(number::parse_integer(&count)?),
        None => None,
    };

    let members = backend.srandmember(key, count)?;

    match count {
        Some(_) => Ok(Frame::bulks(members)),
        None => Ok(members.into_iter().next().map_or(Frame::Null, Frame::Bulk)),
    }
}
