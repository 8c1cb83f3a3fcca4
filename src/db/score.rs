use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::ops::Bound;

/// A `(score, member)` entry of a sorted set's score index.
///
/// Entries order by score first (`f64::total_cmp`), then by member bytes. A key without a member
/// sorts after every entry sharing its score, which makes it usable as a range probe.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ScoreKey {
    pub score: f64,
    pub member: Option<Bytes>,
}

impl ScoreKey {
    pub fn new(score: f64, member: Bytes) -> ScoreKey {
        ScoreKey {
            score,
            member: Some(member),
        }
    }

    /// Sorts at or before every entry with `score`.
    pub fn before(score: f64) -> ScoreKey {
        ScoreKey::new(score, Bytes::new())
    }

    /// Sorts after every entry with `score`.
    pub fn after(score: f64) -> ScoreKey {
        ScoreKey {
            score,
            member: None,
        }
    }

    pub fn entry(&self) -> (Bytes, f64) {
        (self.member.clone().unwrap_or_default(), self.score)
    }
}

impl Ord for ScoreKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.score
            .total_cmp(&other.score)
            .then_with(|| match (&self.member, &other.member) {
                (Some(a), Some(b)) => a.cmp(b),
                (None, None) => Ordering::Equal,
                (None, Some(_)) => Ordering::Greater,
                (Some(_), None) => Ordering::Less,
            })
    }
}

impl PartialOrd for ScoreKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for ScoreKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for ScoreKey {}

/// One end of a score interval, as written by clients: `1.5`, `(1.5`, `-inf`, `+inf`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScoreBound {
    pub value: f64,
    pub inclusive: bool,
}

impl ScoreBound {
    pub fn inclusive(value: f64) -> ScoreBound {
        ScoreBound {
            value,
            inclusive: true,
        }
    }

    pub fn exclusive(value: f64) -> ScoreBound {
        ScoreBound {
            value,
            inclusive: false,
        }
    }

    /// Returns `None` when `bytes` is not a valid bound. NaN is never a valid bound.
    pub fn parse(bytes: &[u8]) -> Option<ScoreBound> {
        let text = std::str::from_utf8(bytes).ok()?.to_ascii_lowercase();
        let (inclusive, number) = match text.strip_prefix('(') {
            Some(rest) => (false, rest),
            None => (true, text.as_str()),
        };

        let value = match number {
            "-inf" => f64::NEG_INFINITY,
            "inf" | "+inf" => f64::INFINITY,
            _ => number.parse::<f64>().ok().filter(|value| !value.is_nan())?,
        };

        Some(ScoreBound { value, inclusive })
    }

    /// The index window holding every entry between `min` and `max`, or `None` if no entry can
    /// fall inside it.
    pub fn range(min: &ScoreBound, max: &ScoreBound) -> Option<(Bound<ScoreKey>, Bound<ScoreKey>)> {
        let lower = if min.inclusive {
            ScoreKey::before(min.value)
        } else {
            ScoreKey::after(min.value)
        };
        let upper = if max.inclusive {
            ScoreKey::after(max.value)
        } else {
            ScoreKey::before(max.value)
        };

        match lower.cmp(&upper) {
            Ordering::Greater => return None,
            Ordering::Equal if !min.inclusive || !max.inclusive => return None,
            _ => {}
        }

        let lower = if min.inclusive {
            Bound::Included(lower)
        } else {
            Bound::Excluded(lower)
        };
        let upper = if max.inclusive {
            Bound::Included(upper)
        } else {
            Bound::Excluded(upper)
        };

        Some((lower, upper))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn index(entries: &[(f64, &'static str)]) -> BTreeSet<ScoreKey> {
        entries
            .iter()
            .map(|&(score, member)| ScoreKey::new(score, Bytes::from(member)))
            .collect()
    }

    fn members(index: &BTreeSet<ScoreKey>, min: ScoreBound, max: ScoreBound) -> Vec<Bytes> {
        match ScoreBound::range(&min, &max) {
            Some(range) => index.range(range).map(|key| key.entry().0).collect(),
            None => vec![],
        }
    }

    #[test]
    fn orders_by_score_then_member() {
        let index = index(&[(2.0, "a"), (1.0, "z"), (1.0, "b"), (-1.0, "x")]);
        let order: Vec<_> = index.iter().map(|key| key.entry().0).collect();

        assert_eq!(order, vec!["x", "b", "z", "a"]);
    }

    #[test]
    fn probe_without_member_sorts_last() {
        assert!(ScoreKey::after(1.0) > ScoreKey::new(1.0, Bytes::from("zzzz")));
        assert!(ScoreKey::after(1.0) < ScoreKey::new(1.5, Bytes::new()));
        assert!(ScoreKey::before(1.0) <= ScoreKey::new(1.0, Bytes::new()));
    }

    #[test]
    fn parse_bounds() {
        assert_eq!(ScoreBound::parse(b"1.5"), Some(ScoreBound::inclusive(1.5)));
        assert_eq!(ScoreBound::parse(b"(1.5"), Some(ScoreBound::exclusive(1.5)));
        assert_eq!(
            ScoreBound::parse(b"-inf"),
            Some(ScoreBound::inclusive(f64::NEG_INFINITY))
        );
        assert_eq!(
            ScoreBound::parse(b"+INF"),
            Some(ScoreBound::inclusive(f64::INFINITY))
        );
        assert_eq!(
            ScoreBound::parse(b"(inf"),
            Some(ScoreBound::exclusive(f64::INFINITY))
        );
        assert_eq!(ScoreBound::parse(b"nan"), None);
        assert_eq!(ScoreBound::parse(b"abc"), None);
        assert_eq!(ScoreBound::parse(b"("), None);
    }

    #[test]
    fn inclusive_and_exclusive_windows() {
        let index = index(&[(1.0, "a"), (2.0, "b"), (2.0, "c"), (3.0, "d")]);

        assert_eq!(
            members(&index, ScoreBound::inclusive(2.0), ScoreBound::inclusive(2.0)),
            vec!["b", "c"]
        );
        assert_eq!(
            members(&index, ScoreBound::exclusive(1.0), ScoreBound::exclusive(3.0)),
            vec!["b", "c"]
        );
        assert_eq!(
            members(&index, ScoreBound::exclusive(2.0), ScoreBound::inclusive(3.0)),
            vec!["d"]
        );
        assert_eq!(
            members(&index, ScoreBound::inclusive(1.0), ScoreBound::exclusive(2.0)),
            vec!["a"]
        );
        assert_eq!(
            members(
                &index,
                ScoreBound::inclusive(f64::NEG_INFINITY),
                ScoreBound::inclusive(f64::INFINITY)
            ),
            vec!["a", "b", "c", "d"]
        );
    }

    #[test]
    fn empty_member_is_inside_inclusive_bounds() {
        let index = index(&[(2.0, ""), (2.0, "b")]);

        assert_eq!(
            members(&index, ScoreBound::inclusive(2.0), ScoreBound::inclusive(2.0)),
            vec!["", "b"]
        );
        assert!(members(&index, ScoreBound::inclusive(1.0), ScoreBound::exclusive(2.0)).is_empty());
    }

    #[test]
    fn empty_windows() {
        assert!(ScoreBound::range(&ScoreBound::inclusive(3.0), &ScoreBound::inclusive(1.0)).is_none());
        assert!(ScoreBound::range(&ScoreBound::exclusive(2.0), &ScoreBound::exclusive(2.0)).is_none());
        assert!(ScoreBound::range(&ScoreBound::inclusive(2.0), &ScoreBound::exclusive(2.0)).is_none());
        assert!(ScoreBound::range(&ScoreBound::inclusive(2.0), &ScoreBound::inclusive(2.0)).is_some());
    }
}
