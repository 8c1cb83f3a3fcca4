use bytes::Bytes;
use itertools::Itertools;

use crate::backend::{Backend, Limit};
use crate::commands::{CommandParser, Shape, Table};
use crate::error::CommandError;
use crate::frame::Frame;
use crate::number;

pub(super) fn register(table: &mut Table) {
    let range = Shape::Fixed {
        required: 3,
        optional: 1,
    };

    table.add("zadd", Shape::at_least(3), zadd);
    table.add("zcard", Shape::exactly(1), zcard);
    table.add("zscore", Shape::exactly(2), zscore);
    table.add("zrank", Shape::exactly(2), zrank);
    table.add("zrevrank", Shape::exactly(2), zrevrank);
    table.add("zrange", range, zrange);
    table.add("zrevrange", range, zrevrange);
    table.add("zrangebyscore", Shape::at_least(3), zrangebyscore);
    table.add("zrevrangebyscore", Shape::at_least(3), zrevrangebyscore);
    table.add("zcount", Shape::exactly(3), zcount);
    table.add("zincrby", Shape::exactly(3), zincrby);
    table.add("zrem", Shape::at_least(2), zrem);
    table.add("zremrangebyscore", Shape::exactly(3), zremrangebyscore);
    table.add("zremrangebyrank", Shape::exactly(3), zremrangebyrank);
    table.add("zunionstore", Shape::at_least(3), zunionstore);
    table.add("zinterstore", Shape::at_least(3), zinterstore);
}

/// Adds all the specified members with the specified scores to the sorted set stored at key.
/// If a member is already present its score is updated and it is reinserted at the right
/// position. Replies with the number of members that were new.
///
/// Every score is validated before anything is written.
///
/// Ref: <https://redis.io/docs/latest/commands/zadd/>
fn zadd(backend: &dyn Backend, args: &mut CommandParser) -> Result<Frame, CommandError> {
    let key = args.next_bytes()?;
    let pairs = args.remaining();
    if pairs.len() % 2 != 0 {
        return Err(args.wrong_arity());
    }

    let entries = pairs
        .into_iter()
        .tuples()
        .map(|(score, member)| Ok((number::parse_float(&score)?, member)))
        .collect::<Result<Vec<_>, CommandError>>()?;

    Ok(Frame::Integer(backend.zadd(key, entries)? as i64))
}

/// Ref: <https://redis.io/docs/latest/commands/zcard/>
fn zcard(backend: &dyn Backend, args: &mut CommandParser) -> Result<Frame, CommandError> {
    let key = args.next_bytes()?;

    Ok(Frame::Integer(backend.zcard(key)? as i64))
}

/// Ref: <https://redis.io/docs/latest/commands/zscore/>
fn zscore(backend: &dyn Backend, args: &mut CommandParser) -> Result<Frame, CommandError> {
    let key = args.next_bytes()?;
    let member = args.next_bytes()?;

    Ok(backend
        .zscore(key, member)?
        .map_or(Frame::Null, |score| Frame::Bulk(number::format_float(score))))
}

/// Ref: <https://redis.io/docs/latest/commands/zrank/>
fn zrank(backend: &dyn Backend, args: &mut CommandParser) -> Result<Frame, CommandError> {
    rank(backend, args, false)
}

/// Ref: <https://redis.io/docs/latest/commands/zrevrank/>
fn zrevrank(backend: &dyn Backend, args: &mut CommandParser) -> Result<Frame, CommandError> {
    rank(backend, args, true)
}

fn rank(
    backend: &dyn Backend,
    args: &mut CommandParser,
    descending: bool,
) -> Result<Frame, CommandError> {
    let key = args.next_bytes()?;
    let member = args.next_bytes()?;

    Ok(backend
        .zrank(key, member, descending)?
        .map_or(Frame::Null, |rank| Frame::Integer(rank as i64)))
}

/// Returns the elements between the `start` and `stop` positions. Negative positions count
/// from the end.
///
/// Ref: <https://redis.io/docs/latest/commands/zrange/>
fn zrange(backend: &dyn Backend, args: &mut CommandParser) -> Result<Frame, CommandError> {
    range(backend, args, false)
}

/// Ref: <https://redis.io/docs/latest/commands/zrevrange/>
fn zrevrange(backend: &dyn Backend, args: &mut CommandParser) -> Result<Frame, CommandError> {
    range(backend, args, true)
}

fn range(
    backend: &dyn Backend,
    args: &mut CommandParser,
    descending: bool,
) -> Result<Frame, CommandError> {
    let key = args.next_bytes()?;
    let start = args.next_integer()?;
    let stop = args.next_integer()?;
    let with_scores = match args.next_optional() {
        None => false,
        Some(token) if token.eq_ignore_ascii_case(b"withscores") => true,
        Some(_) => return Err(CommandError::Syntax),
    };

    let entries = backend.zrange(key, start, stop, descending)?;

    Ok(reply(entries, with_scores))
}

/// Returns all the elements with a score between `min` and `max`. A `(` prefix makes an
/// endpoint exclusive.
///
/// Ref: <https://redis.io/docs/latest/commands/zrangebyscore/>
fn zrangebyscore(backend: &dyn Backend, args: &mut CommandParser) -> Result<Frame, CommandError> {
    let key = args.next_bytes()?;
    let min = args.next_score_bound()?;
    let max = args.next_score_bound()?;
    let (with_scores, limit) = score_range_modifiers(&args.remaining())?;

    let entries = backend.zrangebyscore(key, min, max, false, limit)?;

    Ok(reply(entries, with_scores))
}

/// Like `ZRANGEBYSCORE` but walks the window from the highest score down, which is why `max`
/// comes first.
///
/// Ref: <https://redis.io/docs/latest/commands/zrevrangebyscore/>
fn zrevrangebyscore(
    backend: &dyn Backend,
    args: &mut CommandParser,
) -> Result<Frame, CommandError> {
    let key = args.next_bytes()?;
    let max = args.next_score_bound()?;
    let min = args.next_score_bound()?;
    let (with_scores, limit) = score_range_modifiers(&args.remaining())?;

    let entries = backend.zrangebyscore(key, min, max, true, limit)?;

    Ok(reply(entries, with_scores))
}

/// `[WITHSCORES] [LIMIT offset count]`, in that order only.
fn score_range_modifiers(modifiers: &[Bytes]) -> Result<(bool, Limit), CommandError> {
    let (with_scores, rest) = match modifiers.split_first() {
        Some((first, rest)) if first.eq_ignore_ascii_case(b"withscores") => (true, rest),
        _ => (false, modifiers),
    };

    let limit = match rest {
        [] => Limit::default(),
        [keyword, offset, count] if keyword.eq_ignore_ascii_case(b"limit") => {
            let offset = usize::try_from(number::parse_integer(offset)?)
                .map_err(|_| CommandError::NotInteger)?;
            let count = usize::try_from(number::parse_integer(count)?)
                .ok()
                .filter(|count| *count >= 1)
                .ok_or(CommandError::NotInteger)?;

            Limit {
                offset,
                count: Some(count),
            }
        }
        _ => return Err(CommandError::Syntax),
    };

    Ok((with_scores, limit))
}

/// Ref: <https://redis.io/docs/latest/commands/zcount/>
fn zcount(backend: &dyn Backend, args: &mut CommandParser) -> Result<Frame, CommandError> {
    let key = args.next_bytes()?;
    let min = args.next_score_bound()?;
    let max = args.next_score_bound()?;

    Ok(Frame::Integer(backend.zcount(key, min, max)? as i64))
}

/// Increments the score of member by increment. An absent member starts from 0.
///
/// Ref: <https://redis.io/docs/latest/commands/zincrby/>
fn zincrby(backend: &dyn Backend, args: &mut CommandParser) -> Result<Frame, CommandError> {
    let key = args.next_bytes()?;
    let delta = args.next_float()?;
    let member = args.next_bytes()?;

    let score = backend.zincrby(key, member, delta)?;

    Ok(Frame::Bulk(number::format_float(score)))
}

/// Ref: <https://redis.io/docs/latest/commands/zrem/>
fn zrem(backend: &dyn Backend, args: &mut CommandParser) -> Result<Frame, CommandError> {
    let key = args.next_bytes()?;
    let members = args.remaining();

    Ok(Frame::Integer(backend.zrem(key, members)? as i64))
}

/// Ref: <https://redis.io/docs/latest/commands/zremrangebyscore/>
fn zremrangebyscore(
    backend: &dyn Backend,
    args: &mut CommandParser,
) -> Result<Frame, CommandError> {
    let key = args.next_bytes()?;
    let min = args.next_score_bound()?;
    let max = args.next_score_bound()?;

    Ok(Frame::Integer(backend.zremrangebyscore(key, min, max)? as i64))
}

/// Ref: <https://redis.io/docs/latest/commands/zremrangebyrank/>
fn zremrangebyrank(
    backend: &dyn Backend,
    args: &mut CommandParser,
) -> Result<Frame, CommandError> {
    let key = args.next_bytes()?;
    let start = args.next_integer()?;
    let stop = args.next_integer()?;

    Ok(Frame::Integer(backend.zremrangebyrank(key, start, stop)? as i64))
}

/// Ref: <https://redis.io/docs/latest/commands/zunionstore/>
fn zunionstore(backend: &dyn Backend, args: &mut CommandParser) -> Result<Frame, CommandError> {
    let (destination, keys) = store_arguments(args)?;

    Ok(Frame::Integer(backend.zunionstore(destination, keys)? as i64))
}

/// Ref: <https://redis.io/docs/latest/commands/zinterstore/>
fn zinterstore(backend: &dyn Backend, args: &mut CommandParser) -> Result<Frame, CommandError> {
    let (destination, keys) = store_arguments(args)?;

    Ok(Frame::Integer(backend.zinterstore(destination, keys)? as i64))
}

/// `destination numkeys key [key ...]`
fn store_arguments(args: &mut CommandParser) -> Result<(Bytes, Vec<Bytes>), CommandError> {
    let destination = args.next_bytes()?;
    let count = args.next_integer()?;
    let keys = args.remaining();
    if usize::try_from(count).ok() != Some(keys.len()) {
        return Err(CommandError::Syntax);
    }

    Ok((destination, keys))
}

fn reply(entries: Vec<(Bytes, f64)>, with_scores: bool) -> Frame {
    if with_scores {
        Frame::bulks(
            entries
                .into_iter()
                .flat_map(|(member, score)| [member, number::format_float(score)]),
        )
    } else {
        Frame::bulks(entries.into_iter().map(|(member, _)| member))
    }
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

    fn bulks(items: &[&'static str]) -> Frame {
        Frame::bulks(items.iter().copied().map(Bytes::from))
    }

    fn seeded() -> Store {
        let store = Store::memory();
        run(&store, "zadd", &["z", "1", "a", "2", "b", "3", "c", "4", "d"]).unwrap();
        store
    }

    #[test]
    fn add_and_update() {
        let store = Store::memory();

        assert_eq!(
            run(&store, "zadd", &["z", "1", "a", "2", "b"]).unwrap(),
            Frame::Integer(2)
        );
        assert_eq!(
            run(&store, "zadd", &["z", "5", "a", "3", "c"]).unwrap(),
            Frame::Integer(1)
        );
        assert_eq!(run(&store, "zcard", &["z"]).unwrap(), Frame::Integer(3));
        assert_eq!(run(&store, "zscore", &["z", "a"]).unwrap(), bulk("5"));
        assert_eq!(run(&store, "zscore", &["z", "x"]).unwrap(), Frame::Null);
        assert_eq!(run(&store, "zrange", &["z", "0", "-1"]).unwrap(), bulks(&["b", "c", "a"]));
    }

    #[test]
    fn add_rejects_malformed_input_before_writing() {
        let store = seeded();

        assert!(matches!(
            run(&store, "zadd", &["z", "9", "a", "nope", "e"]),
            Err(CommandError::NotFloat)
        ));
        assert!(matches!(
            run(&store, "zadd", &["z", "9", "a", "8"]),
            Err(CommandError::WrongArity(_))
        ));
        assert_eq!(run(&store, "zscore", &["z", "a"]).unwrap(), bulk("1"));
        assert_eq!(run(&store, "zcard", &["z"]).unwrap(), Frame::Integer(4));
    }

    #[test]
    fn ranks() {
        let store = seeded();

        assert_eq!(run(&store, "zrank", &["z", "a"]).unwrap(), Frame::Integer(0));
        assert_eq!(run(&store, "zrank", &["z", "c"]).unwrap(), Frame::Integer(2));
        assert_eq!(run(&store, "zrevrank", &["z", "c"]).unwrap(), Frame::Integer(1));
        assert_eq!(run(&store, "zrank", &["z", "x"]).unwrap(), Frame::Null);
        assert_eq!(run(&store, "zrank", &["nope", "a"]).unwrap(), Frame::Null);
    }

    #[test]
    fn positional_ranges() {
        let store = seeded();

        assert_eq!(run(&store, "zrange", &["z", "1", "2"]).unwrap(), bulks(&["b", "c"]));
        assert_eq!(run(&store, "zrange", &["z", "-2", "100"]).unwrap(), bulks(&["c", "d"]));
        assert_eq!(run(&store, "zrevrange", &["z", "0", "1"]).unwrap(), bulks(&["d", "c"]));
        assert_eq!(
            run(&store, "zrange", &["z", "0", "1", "WithScores"]).unwrap(),
            bulks(&["a", "1", "b", "2"])
        );
        assert_eq!(run(&store, "zrange", &["z", "3", "1"]).unwrap(), bulks(&[]));
        assert!(matches!(
            run(&store, "zrange", &["z", "0", "1", "scores"]),
            Err(CommandError::Syntax)
        ));
        assert!(matches!(
            run(&store, "zrange", &["z", "zero", "1"]),
            Err(CommandError::NotInteger)
        ));
    }

    #[test]
    fn score_ranges() {
        let store = seeded();

        assert_eq!(
            run(&store, "zrangebyscore", &["z", "(1", "3"]).unwrap(),
            bulks(&["b", "c"])
        );
        assert_eq!(
            run(&store, "zrangebyscore", &["z", "-inf", "+INF", "withscores", "limit", "1", "2"])
                .unwrap(),
            bulks(&["b", "2", "c", "3"])
        );
        assert_eq!(
            run(&store, "zrevrangebyscore", &["z", "3", "(1"]).unwrap(),
            bulks(&["c", "b"])
        );
        assert_eq!(
            run(&store, "zrevrangebyscore", &["z", "inf", "-inf", "LIMIT", "0", "1"]).unwrap(),
            bulks(&["d"])
        );
        assert_eq!(run(&store, "zrangebyscore", &["z", "5", "1"]).unwrap(), bulks(&[]));
    }

    #[test]
    fn score_range_modifier_errors() {
        let store = seeded();

        assert!(matches!(
            run(&store, "zrangebyscore", &["z", "one", "3"]),
            Err(CommandError::InvalidScoreRange)
        ));
        assert!(matches!(
            run(&store, "zrangebyscore", &["z", "1", "3", "limit", "0", "1", "withscores"]),
            Err(CommandError::Syntax)
        ));
        assert!(matches!(
            run(&store, "zrangebyscore", &["z", "1", "3", "limit", "0"]),
            Err(CommandError::Syntax)
        ));
        assert!(matches!(
            run(&store, "zrangebyscore", &["z", "1", "3", "limit", "-1", "1"]),
            Err(CommandError::NotInteger)
        ));
        assert!(matches!(
            run(&store, "zrangebyscore", &["z", "1", "3", "limit", "0", "0"]),
            Err(CommandError::NotInteger)
        ));
    }

    #[test]
    fn count_and_increment() {
        let store = seeded();

        assert_eq!(run(&store, "zcount", &["z", "2", "(4"]).unwrap(), Frame::Integer(2));
        assert_eq!(run(&store, "zcount", &["nope", "-inf", "inf"]).unwrap(), Frame::Integer(0));

        assert_eq!(
            run(&store, "zincrby", &["z", "2.5", "a"]).unwrap(),
            bulk("3.5")
        );
        assert_eq!(
            run(&store, "zincrby", &["z", "7", "new"]).unwrap(),
            bulk("7")
        );
        assert_eq!(run(&store, "zrank", &["z", "a"]).unwrap(), Frame::Integer(2));

        run(&store, "zadd", &["z", "inf", "top"]).unwrap();
        assert!(matches!(
            run(&store, "zincrby", &["z", "-inf", "top"]),
            Err(CommandError::NanScore)
        ));
        assert_eq!(run(&store, "zscore", &["z", "top"]).unwrap(), bulk("inf"));
    }

    #[test]
    fn removals() {
        let store = seeded();

        assert_eq!(run(&store, "zrem", &["z", "a", "x"]).unwrap(), Frame::Integer(1));
        assert_eq!(
            run(&store, "zremrangebyscore", &["z", "(2", "3"]).unwrap(),
            Frame::Integer(1)
        );
        assert_eq!(run(&store, "zrange", &["z", "0", "-1"]).unwrap(), bulks(&["b", "d"]));
        assert_eq!(
            run(&store, "zremrangebyscore", &["nope", "-inf", "inf"]).unwrap(),
            Frame::Integer(0)
        );

        assert_eq!(run(&store, "zrem", &["z", "b", "d"]).unwrap(), Frame::Integer(2));
        assert_eq!(run(&store, "exists", &["z"]).unwrap(), Frame::Integer(0));
    }

    #[test]
    fn rank_ranges_and_aggregates_are_not_implemented() {
        let store = seeded();

        assert!(matches!(
            run(&store, "zremrangebyrank", &["z", "0", "1"]),
            Err(CommandError::NotImplemented)
        ));
        assert!(matches!(
            run(&store, "zunionstore", &["d", "2", "z", "y"]),
            Err(CommandError::NotImplemented)
        ));
        assert!(matches!(
            run(&store, "zinterstore", &["d", "2", "z"]),
            Err(CommandError::Syntax)
        ));
    }
}
