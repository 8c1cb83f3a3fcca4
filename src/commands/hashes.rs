use itertools::Itertools;

use crate::backend::Backend;
use crate::commands::{CommandParser, Shape, Table};
use crate::error::CommandError;
use crate::frame::Frame;
use crate::number;

pub(super) fn register(table: &mut Table) {
    table.add("hset", Shape::exactly(3), hset);
    table.add("hget", Shape::exactly(2), hget);
    table.add("hdel", Shape::at_least(2), hdel);
    table.add("hexists", Shape::exactly(2), hexists);
    table.add("hgetall", Shape::exactly(1), hgetall);
    table.add("hkeys", Shape::exactly(1), hkeys);
    table.add("hvals", Shape::exactly(1), hvals);
    table.add("hlen", Shape::exactly(1), hlen);
    table.add("hmget", Shape::at_least(2), hmget);
    table.add("hmset", Shape::at_least(3), hmset);
    table.add("hsetnx", Shape::exactly(3), hsetnx);
    table.add("hincrby", Shape::exactly(3), hincrby);
    table.add("hincrbyfloat", Shape::exactly(3), hincrbyfloat);
}

/// Sets field in the hash stored at key to value. Replies 1 when the field is new and 0 when
/// its value was overwritten.
///
/// Ref: <https://redis.io/docs/latest/commands/hset/>
fn hset(backend: &dyn Backend, args: &mut CommandParser) -> Result<Frame, CommandError> {
    let key = args.next_bytes()?;
    let field = args.next_bytes()?;
    let value = args.next_bytes()?;

    Ok(Frame::Integer(backend.hset(key, field, value)? as i64))
}

/// Ref: <https://redis.io/docs/latest/commands/hget/>
fn hget(backend: &dyn Backend, args: &mut CommandParser) -> Result<Frame, CommandError> {
    let key = args.next_bytes()?;
    let field = args.next_bytes()?;

    Ok(backend.hget(key, field)?.map_or(Frame::Null, Frame::Bulk))
}

/// Ref: <https://redis.io/docs/latest/commands/hdel/>
fn hdel(backend: &dyn Backend, args: &mut CommandParser) -> Result<Frame, CommandError> {
    let key = args.next_bytes()?;
    let fields = args.remaining();

    Ok(Frame::Integer(backend.hdel(key, fields)? as i64))
}

/// Ref: <https://redis.io/docs/latest/commands/hexists/>
fn hexists(backend: &dyn Backend, args: &mut CommandParser) -> Result<Frame, CommandError> {
    let key = args.next_bytes()?;
    let field = args.next_bytes()?;

    Ok(Frame::Integer(backend.hexists(key, field)? as i64))
}

/// Every field followed by its value, in field order.
///
/// Ref: <https://redis.io/docs/latest/commands/hgetall/>
fn hgetall(backend: &dyn Backend, args: &mut CommandParser) -> Result<Frame, CommandError> {
    let key = args.next_bytes()?;

    let entries = backend.hgetall(key)?;

    Ok(Frame::bulks(
        entries
            .into_iter()
            .flat_map(|(field, value)| [field, value]),
    ))
}

/// Ref: <https://redis.io/docs/latest/commands/hkeys/>
fn hkeys(backend: &dyn Backend, args: &mut CommandParser) -> Result<Frame, CommandError> {
    let key = args.next_bytes()?;

    Ok(Frame::bulks(backend.hkeys(key)?))
}

/// Ref: <https://redis.io/docs/latest/commands/hvals/>
fn hvals(backend: &dyn Backend, args: &mut CommandParser) -> Result<Frame, CommandError> {
    let key = args.next_bytes()?;

    Ok(Frame::bulks(backend.hvals(key)?))
}

/// Ref: <https://redis.io/docs/latest/commands/hlen/>
fn hlen(backend: &dyn Backend, args: &mut CommandParser) -> Result<Frame, CommandError> {
    let key = args.next_bytes()?;

    Ok(Frame::Integer(backend.hlen(key)? as i64))
}

/// Ref: <https://redis.io/docs/latest/commands/hmget/>
fn hmget(backend: &dyn Backend, args: &mut CommandParser) -> Result<Frame, CommandError> {
    let key = args.next_bytes()?;
    let fields = args.remaining();

    let values = backend.hmget(key, fields)?;

    Ok(Frame::Array(
        values
            .into_iter()
            .map(|value| value.map_or(Frame::Null, Frame::Bulk))
            .collect(),
    ))
}

/// Ref: <https://redis.io/docs/latest/commands/hmset/>
fn hmset(backend: &dyn Backend, args: &mut CommandParser) -> Result<Frame, CommandError> {
    let key = args.next_bytes()?;
    let rest = args.remaining();
    if rest.len() % 2 != 0 {
        return Err(args.wrong_arity());
    }

    backend.hmset(key, rest.into_iter().tuples().collect())?;

    Ok(Frame::ok())
}

/// Ref: <https://redis.io/docs/latest/commands/hsetnx/>
fn hsetnx(backend: &dyn Backend, args: &mut CommandParser) -> Result<Frame, CommandError> {
    let key = args.next_bytes()?;
    let field = args.next_bytes()?;
    let value = args.next_bytes()?;

    Ok(Frame::Integer(backend.hsetnx(key, field, value)? as i64))
}

/// Ref: <https://redis.io/docs/latest/commands/hincrby/>
fn hincrby(backend: &dyn Backend, args: &mut CommandParser) -> Result<Frame, CommandError> {
    let key = args.next_bytes()?;
    let field = args.next_bytes()?;
    let delta = args.next_integer()?;

    Ok(Frame::Integer(backend.hincrby(key, field, delta)?))
}

/// Ref: <https://redis.io/docs/latest/commands/hincrbyfloat/>
fn hincrbyfloat(backend: &dyn Backend, args: &mut CommandParser) -> Result<Frame, CommandError> {
    let key = args.next_bytes()?;
    let field = args.next_bytes()?;
    let delta = args.next_float()?;

    let value = backend.hincrbyfloat(key, field, delta)?;

    Ok(Frame::Bulk(number::format_float(value)))
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use crate::commands::tests::run;
    use crate::error::CommandError;
    use crate::frame::Frame;
    use crate::store::Store;

    fn bulk(s: &'static str) -> Frame {
        Frame::Bulk(Bytes::from(s))
    }

    #[test]
    fn set_and_read_back() {
        let store = Store::memory();

        assert_eq!(run(&store, "hset", &["h", "b", "2"]).unwrap(), Frame::Integer(1));
        assert_eq!(run(&store, "hset", &["h", "a", "1"]).unwrap(), Frame::Integer(1));
        assert_eq!(run(&store, "hset", &["h", "a", "3"]).unwrap(), Frame::Integer(0));

        assert_eq!(run(&store, "hget", &["h", "a"]).unwrap(), bulk("3"));
        assert_eq!(run(&store, "hget", &["h", "z"]).unwrap(), Frame::Null);
        assert_eq!(run(&store, "hexists", &["h", "b"]).unwrap(), Frame::Integer(1));
        assert_eq!(run(&store, "hlen", &["h"]).unwrap(), Frame::Integer(2));
        assert_eq!(
            run(&store, "hgetall", &["h"]).unwrap(),
            Frame::Array(vec![bulk("a"), bulk("3"), bulk("b"), bulk("2")])
        );
        assert_eq!(
            run(&store, "hkeys", &["h"]).unwrap(),
            Frame::Array(vec![bulk("a"), bulk("b")])
        );
        assert_eq!(
            run(&store, "hvals", &["h"]).unwrap(),
            Frame::Array(vec![bulk("3"), bulk("2")])
        );
        assert_eq!(
            run(&store, "hmget", &["h", "a", "z"]).unwrap(),
            Frame::Array(vec![bulk("3"), Frame::Null])
        );
    }

    #[test]
    fn hmset_needs_pairs() {
        let store = Store::memory();

        assert_eq!(
            run(&store, "hmset", &["h", "a", "1", "b", "2"]).unwrap(),
            Frame::ok()
        );
        assert_eq!(run(&store, "hlen", &["h"]).unwrap(), Frame::Integer(2));

        let err = run(&store, "hmset", &["h", "a", "1", "b"]).unwrap_err();
        assert_eq!(err.to_string(), "wrong number of arguments for 'hmset' command");
        assert_eq!(run(&store, "hget", &["h", "a"]).unwrap(), bulk("1"));
    }

    #[test]
    fn setnx_and_delete() {
        let store = Store::memory();

        assert_eq!(run(&store, "hsetnx", &["h", "a", "1"]).unwrap(), Frame::Integer(1));
        assert_eq!(run(&store, "hsetnx", &["h", "a", "2"]).unwrap(), Frame::Integer(0));
        assert_eq!(run(&store, "hget", &["h", "a"]).unwrap(), bulk("1"));

        assert_eq!(
            run(&store, "hdel", &["h", "a", "missing"]).unwrap(),
            Frame::Integer(1)
        );
        assert_eq!(run(&store, "exists", &["h"]).unwrap(), Frame::Integer(0));
    }

    #[test]
    fn increments() {
        let store = Store::memory();

        assert_eq!(run(&store, "hincrby", &["h", "n", "5"]).unwrap(), Frame::Integer(5));
        assert_eq!(run(&store, "hincrby", &["h", "n", "-7"]).unwrap(), Frame::Integer(-2));
        assert_eq!(
            run(&store, "hincrbyfloat", &["h", "f", "1.5"]).unwrap(),
            bulk("1.5")
        );
        assert!(matches!(
            run(&store, "hincrby", &["h", "f", "1"]),
            Err(CommandError::NotInteger)
        ));
        assert!(matches!(
            run(&store, "hincrbyfloat", &["h", "f", "nan"]),
            Err(CommandError::NotFloat)
        ));
    }
}
