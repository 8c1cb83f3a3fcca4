/// Glob matching for `KEYS`.
///
/// `*` matches any run of bytes (including none), `?` exactly one byte, `[abc]` one byte out of
/// the listed ones and `\x` the byte `x` literally. An unterminated `[` is an ordinary byte.
///
/// Every token other than `*` consumes exactly one key byte, so a mismatch only ever needs to
/// resume from the most recent `*`, one key byte further along.
pub fn matches(key: &[u8], pattern: &[u8]) -> bool {
    let (mut k, mut p) = (0, 0);
    // Pattern position just past the last `*`, and the key position that star stops before.
    let mut star: Option<(usize, usize)> = None;

    while k < key.len() {
        if pattern.get(p) == Some(&b'*') {
            p += 1;
            star = Some((p, k));
            continue;
        }

        if let Some((token, next)) = token(pattern, p) {
            if token.accepts(key[k]) {
                k += 1;
                p = next;
                continue;
            }
        }

        match star {
            Some((after, absorbed)) => {
                star = Some((after, absorbed + 1));
                p = after;
                k = absorbed + 1;
            }
            None => return false,
        }
    }

    pattern[p..].iter().all(|&byte| byte == b'*')
}

enum Token<'a> {
    Any,
    Byte(u8),
    Class(&'a [u8]),
}

impl Token<'_> {
    fn accepts(&self, byte: u8) -> bool {
        match self {
            Token::Any => true,
            Token::Byte(expected) => *expected == byte,
            Token::Class(bytes) => bytes.contains(&byte),
        }
    }
}

/// The single-byte token at `p` and the position after it. `p` must not point at a `*`.
fn token(pattern: &[u8], p: usize) -> Option<(Token<'_>, usize)> {
    let byte = *pattern.get(p)?;
    let token = match byte {
        b'?' => (Token::Any, p + 1),
        b'\\' => match pattern.get(p + 1) {
            Some(&escaped) => (Token::Byte(escaped), p + 2),
            None => (Token::Byte(b'\\'), p + 1),
        },
        b'[' => match pattern[p + 1..].iter().position(|&b| b == b']') {
            Some(end) => (Token::Class(&pattern[p + 1..p + 1 + end]), p + end + 2),
            None => (Token::Byte(b'['), p + 1),
        },
        _ => (Token::Byte(byte), p + 1),
    };
    Some(token)
}
