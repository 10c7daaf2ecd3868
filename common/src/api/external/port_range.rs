// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The port-range language used to declare rules.
//!
//! An expression is a sequence of tokens, each either a single port (`80`) or
//! an inclusive range (`1000-2000`).  Any token may be surrounded by ASCII
//! whitespace, including around the `-` of a range.  Tokens are separated by
//! whitespace, by a single comma, or by both: `"22, 80 443,1000 - 2000"` is
//! valid while `"80,,443"`, `",80"` and `"80,"` are not.
//!
//! Scanning is split in two layers.  [`tokens`] checks only the shape of the
//! expression and yields [`Token`]s holding the digit strings; it knows
//! nothing about the numeric range of a port.  [`parse_port_ranges`] runs the
//! same scan and turns each token into a [`PortRange`], rejecting endpoints
//! that do not fit in 16 bits and ranges that end before they start.

use serde::Deserialize;
use serde::Serialize;
use std::fmt;
use std::num::ParseIntError;

/// An inclusive range of L4 ports
///
/// A single port `p` is represented as the range `p-p`.  The start of a range
/// is never greater than its end; that invariant is enforced by every
/// constructor, including deserialization.
#[derive(
    Clone,
    Copy,
    Debug,
    Deserialize,
    Eq,
    Hash,
    Ord,
    PartialEq,
    PartialOrd,
    Serialize,
)]
#[serde(try_from = "PortRangeParts")]
pub struct PortRange {
    start: u16,
    end: u16,
}

impl PortRange {
    pub fn new(start: u16, end: u16) -> Result<PortRange, PortRangeError> {
        if end < start {
            return Err(PortRangeError::RangeOrder { start, end });
        }
        Ok(PortRange { start, end })
    }

    pub fn single(port: u16) -> PortRange {
        PortRange { start: port, end: port }
    }

    pub fn start(&self) -> u16 {
        self.start
    }

    pub fn end(&self) -> u16 {
        self.end
    }

    pub fn is_single(&self) -> bool {
        self.start == self.end
    }
}

impl fmt::Display for PortRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_single() {
            write!(f, "{}", self.start)
        } else {
            write!(f, "{}-{}", self.start, self.end)
        }
    }
}

#[derive(Deserialize)]
struct PortRangeParts {
    start: u16,
    end: u16,
}

impl TryFrom<PortRangeParts> for PortRange {
    type Error = PortRangeError;

    fn try_from(parts: PortRangeParts) -> Result<Self, Self::Error> {
        PortRange::new(parts.start, parts.end)
    }
}

/// Errors produced while scanning a port-range expression
#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
pub enum PortRangeError {
    /// The expression is empty, has text that is not part of any token, or
    /// has a range with a missing endpoint.
    #[error("incorrect port range(s) source")]
    Malformed,
    /// A range ends before it starts.
    #[error("incorrect port range(s) source: range {start}-{end} is inverted")]
    RangeOrder { start: u16, end: u16 },
    /// An endpoint does not fit in 16 bits.
    #[error(transparent)]
    Numeric(#[from] ParseIntError),
}

/// One token of a port-range expression, holding the endpoint digits exactly
/// as written
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Token<'a> {
    Single(&'a str),
    Range(&'a str, &'a str),
}

impl Token<'_> {
    /// Converts the token's digit strings into a [`PortRange`].
    pub fn to_port_range(&self) -> Result<PortRange, PortRangeError> {
        match self {
            Token::Single(port) => Ok(PortRange::single(port.parse()?)),
            Token::Range(start, end) => {
                let start = start.parse()?;
                let end = end.parse()?;
                PortRange::new(start, end)
            }
        }
    }
}

fn skip_whitespace(src: &str) -> &str {
    src.trim_start_matches(|c: char| c.is_ascii_whitespace())
}

fn split_digits(src: &str) -> (&str, &str) {
    let len = src.bytes().take_while(u8::is_ascii_digit).count();
    src.split_at(len)
}

/// Scans a single token off the front of `src`.
///
/// Returns the token together with whatever follows it, after any trailing
/// whitespace.  A `-` that is not followed by digits is not part of the
/// token: `"80-"` scans as `Single("80")` with `"-"` left over.
pub fn next_token(src: &str) -> Result<(Token<'_>, &str), PortRangeError> {
    let (first, after_first) = split_digits(skip_whitespace(src));
    if first.is_empty() {
        return Err(PortRangeError::Malformed);
    }

    let (token, rest) = match skip_whitespace(after_first).strip_prefix('-') {
        Some(after_dash) => {
            let (second, after_second) =
                split_digits(skip_whitespace(after_dash));
            if second.is_empty() {
                (Token::Single(first), after_first)
            } else {
                (Token::Range(first, second), after_second)
            }
        }
        None => (Token::Single(first), after_first),
    };

    Ok((token, skip_whitespace(rest)))
}

/// Iterator over the [`Token`]s of an expression; see [`tokens`]
///
/// Yields at most one error, after which it is exhausted.
#[derive(Clone, Debug)]
pub struct Tokens<'a> {
    rest: &'a str,
    started: bool,
    done: bool,
}

impl<'a> Iterator for Tokens<'a> {
    type Item = Result<Token<'a>, PortRangeError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        if self.started {
            if self.rest.is_empty() {
                self.done = true;
                return None;
            }
            self.rest = self.rest.strip_prefix(',').unwrap_or(self.rest);
        } else {
            self.started = true;
        }

        match next_token(self.rest) {
            Ok((token, rest)) => {
                self.rest = rest;
                Some(Ok(token))
            }
            Err(error) => {
                self.done = true;
                Some(Err(error))
            }
        }
    }
}

/// Splits a port-range expression into tokens, left to right.
///
/// An empty expression yields a single [`PortRangeError::Malformed`].
pub fn tokens(src: &str) -> Tokens<'_> {
    Tokens { rest: src, started: false, done: false }
}

/// Iterator over the [`PortRange`]s of an expression; see
/// [`parse_port_ranges`]
#[derive(Clone, Debug)]
pub struct PortRanges<'a> {
    tokens: Tokens<'a>,
    done: bool,
}

impl Iterator for PortRanges<'_> {
    type Item = Result<PortRange, PortRangeError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let item = self.tokens.next()?.and_then(|token| token.to_port_range());
        self.done = item.is_err();
        Some(item)
    }
}

/// Expands a port-range expression into [`PortRange`]s, in the order they
/// appear in `src`.
///
/// Ranges are neither sorted nor merged.  The iterator stops after the first
/// error; ranges produced before it are still valid.
pub fn parse_port_ranges(src: &str) -> PortRanges<'_> {
    PortRanges { tokens: tokens(src), done: false }
}

/// Expands `src` and hands each range to `f`, stopping at the first error.
///
/// Errors returned by `f` are propagated unchanged.
pub fn for_each_port_range<F, E>(src: &str, mut f: F) -> Result<(), E>
where
    F: FnMut(PortRange) -> Result<(), E>,
    E: From<PortRangeError>,
{
    for range in parse_port_ranges(src) {
        f(range?)?;
    }
    Ok(())
}

/// Returns true if `src` expands to at least one valid [`PortRange`].
pub fn is_port_ranges_valid(src: &str) -> bool {
    let mut count = 0;
    for range in parse_port_ranges(src) {
        if range.is_err() {
            return false;
        }
        count += 1;
    }
    count > 0
}
