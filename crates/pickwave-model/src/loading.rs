// Copyright (c) 2025 Felix Kahle.
//
// Permission is hereby granted, free of charge, to any person obtaining
// a copy of this software and associated documentation files (the
// "Software"), to deal in the Software without restriction, including
// without limitation the rights to use, copy, modify, merge, publish,
// distribute, sublicense, and/or sell copies of the Software, and to
// permit persons to whom the Software is furnished to do so, subject to
// the following conditions:
//
// The above copyright notice and this permission notice shall be
// included in all copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND,
// EXPRESS OR IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF
// MERCHANTABILITY, FITNESS FOR A PARTICULAR PURPOSE AND
// NONINFRINGEMENT. IN NO EVENT SHALL THE AUTHORS OR COPYRIGHT HOLDERS BE
// LIABLE FOR ANY CLAIM, DAMAGES OR OTHER LIABILITY, WHETHER IN AN ACTION
// OF CONTRACT, TORT OR OTHERWISE, ARISING FROM, OUT OF OR IN CONNECTION
// WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE SOFTWARE.

//! Problem instance loader for the wave-picking domain.
//!
//! This module turns whitespace-delimited text streams into a validated
//! `Instance`, mapping order demands, aisle stocks, and the wave-size bounds
//! into the compact layout consumed by the search engine.
//!
//! The expected format ignores line boundaries entirely; tokenization is
//! purely whitespace-driven:
//!
//! ```raw
//! O I A                       # orders, items, aisles
//! k item units ... (k pairs)  # one record per order
//! ...
//! l item units ... (l pairs)  # one record per aisle
//! ...
//! LB UB                       # wave-size interval
//! ```
//!
//! Order and aisle ids are assigned in file order starting at 0. Lines may
//! contain comments introduced by `#`, which are ignored during tokenization.
//! Token-level errors carry the ordinal of the offending token and
//! record-level errors name the offending record, so a malformed instance can
//! be located without re-parsing by hand. The loader feeds the parsed records
//! through `InstanceBuilder`, so builder validation (positive units, dense
//! item ids) applies uniformly to files and programmatic construction.

use crate::instance::{Instance, InstanceBuilder};
use pickwave_core::num::UnitNumeric;
use std::{
    fs::File,
    io::{BufRead, BufReader, Read},
    path::Path,
    str::FromStr,
};

/// Details about a failed token parsing attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseTokenError {
    /// The string token that failed to parse.
    pub token: String,
    /// The name of the type we tried to parse into (e.g., "u32").
    pub type_name: &'static str,
    /// The 1-based ordinal of the token in the input stream.
    pub token_ordinal: usize,
}

impl std::fmt::Display for ParseTokenError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Could not parse token #{} ('{}') as type {}",
            self.token_ordinal, self.token, self.type_name
        )
    }
}

impl std::error::Error for ParseTokenError {}

/// The error type for the instance loading process.
#[derive(Debug)]
pub enum InstanceLoadError {
    /// An I/O error occurred while reading the input stream.
    Io(std::io::Error),
    /// The input stream ended before all declared records were read.
    UnexpectedEof,
    /// A token could not be parsed into the expected numeric type.
    Parse(ParseTokenError),
    /// The declared dimensions leave nothing to solve (zero orders or zero
    /// aisles).
    InvalidDimensions,
    /// An order or aisle record references an item id outside `0..num_items`.
    ItemOutOfRange {
        /// The 0-based index of the offending record, counted in file order
        /// (orders first, then aisles).
        record: usize,
        /// The out-of-range item id.
        item: usize,
    },
    /// A demand or stock entry declares zero units (the format requires >= 1).
    InvalidUnits {
        /// The ordinal of the offending token.
        token_ordinal: usize,
    },
    /// The trailing wave bounds are inverted (`LB > UB`).
    InvalidWaveBounds,
}

impl std::fmt::Display for InstanceLoadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "I/O error: {e}"),
            Self::UnexpectedEof => write!(f, "Unexpected end of file while parsing instance"),
            Self::Parse(e) => write!(f, "Parse error: {}", e),
            Self::InvalidDimensions => {
                write!(f, "Problem dimensions (O and A) must be positive integers")
            }
            Self::ItemOutOfRange { record, item } => write!(
                f,
                "Record #{}: item id {} is out of range",
                record, item
            ),
            Self::InvalidUnits { token_ordinal } => {
                write!(f, "Token #{}: units must be at least 1", token_ordinal)
            }
            Self::InvalidWaveBounds => {
                write!(f, "Wave bounds are inverted (LB must not exceed UB)")
            }
        }
    }
}

impl std::error::Error for InstanceLoadError {}

impl From<std::io::Error> for InstanceLoadError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<ParseTokenError> for InstanceLoadError {
    fn from(e: ParseTokenError) -> Self {
        Self::Parse(e)
    }
}

/// A loader for wave-picking problem instances.
///
/// The loader is stateless; one value can parse any number of inputs. All
/// validation failures surface as `InstanceLoadError` before any search code
/// runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InstanceLoader;

impl InstanceLoader {
    /// Creates a new `InstanceLoader`.
    #[inline]
    pub fn new() -> Self {
        Self
    }

    /// Loads an instance from a type implementing `BufRead`.
    pub fn from_bufread<T, R>(&self, rdr: R) -> Result<Instance<T>, InstanceLoadError>
    where
        T: UnitNumeric + FromStr,
        R: BufRead,
    {
        let mut sc = Scanner::new(rdr);

        let num_orders: usize = sc.next()?;
        let num_items: usize = sc.next()?;
        let num_aisles: usize = sc.next()?;

        if num_orders == 0 || num_aisles == 0 {
            return Err(InstanceLoadError::InvalidDimensions);
        }

        let mut builder = InstanceBuilder::<T>::new(num_items);

        for record in 0..num_orders {
            let entries = self.read_record::<T, R>(&mut sc, num_items, record)?;
            builder.push_order(entries);
        }

        for record in 0..num_aisles {
            let entries = self.read_record::<T, R>(&mut sc, num_items, num_orders + record)?;
            builder.push_aisle(entries);
        }

        let lb: T = sc.next()?;
        let ub: T = sc.next()?;
        if lb > ub {
            return Err(InstanceLoadError::InvalidWaveBounds);
        }
        builder.wave_bounds(lb, ub);

        Ok(builder.build())
    }

    /// Reads one `k (item units)*k` record. `record` is the 0-based record
    /// index in file order, used for error reporting.
    fn read_record<T, R>(
        &self,
        sc: &mut Scanner<R>,
        num_items: usize,
        record: usize,
    ) -> Result<Vec<(usize, T)>, InstanceLoadError>
    where
        T: UnitNumeric + FromStr,
        R: BufRead,
    {
        let count: usize = sc.next()?;
        let mut entries = Vec::with_capacity(count);
        for _ in 0..count {
            let item: usize = sc.next()?;
            if item >= num_items {
                return Err(InstanceLoadError::ItemOutOfRange { record, item });
            }
            let units: T = sc.next()?;
            if units < T::one() {
                return Err(InstanceLoadError::InvalidUnits {
                    token_ordinal: sc.token_ordinal(),
                });
            }
            entries.push((item, units));
        }
        Ok(entries)
    }

    /// Loads an instance from a file path.
    #[inline]
    pub fn from_path<T, P>(&self, path: P) -> Result<Instance<T>, InstanceLoadError>
    where
        T: UnitNumeric + FromStr,
        P: AsRef<Path>,
    {
        let file = File::open(path)?;
        self.from_bufread(BufReader::new(file))
    }

    /// Loads an instance from a generic reader.
    #[inline]
    pub fn from_reader<T, R>(&self, r: R) -> Result<Instance<T>, InstanceLoadError>
    where
        T: UnitNumeric + FromStr,
        R: Read,
    {
        self.from_bufread(BufReader::new(r))
    }

    /// Loads an instance from a string slice.
    #[inline]
    pub fn from_str<T>(&self, s: &str) -> Result<Instance<T>, InstanceLoadError>
    where
        T: UnitNumeric + FromStr,
    {
        self.from_reader(s.as_bytes())
    }
}

/// A helper to read whitespace-delimited tokens from a generic reader.
struct Scanner<R> {
    rdr: R,
    buf: String,
    pos: usize,
    token_ordinal: usize,
}

impl<R: BufRead> Scanner<R> {
    /// Creates a new `Scanner` wrapping the given reader.
    #[inline]
    fn new(rdr: R) -> Self {
        Self {
            rdr,
            buf: String::new(),
            pos: 0,
            token_ordinal: 0,
        }
    }

    /// Returns the 1-based ordinal of the most recently returned token.
    #[inline]
    fn token_ordinal(&self) -> usize {
        self.token_ordinal
    }

    /// Refills the internal line buffer. Returns `Ok(true)` if data read,
    /// `Ok(false)` on EOF.
    #[inline]
    fn fill_line(&mut self) -> Result<bool, InstanceLoadError> {
        self.buf.clear();
        self.pos = 0;
        let n = self
            .rdr
            .read_line(&mut self.buf)
            .map_err(InstanceLoadError::Io)?;
        Ok(n > 0)
    }

    /// Reads the next token and parses it into `T`.
    /// Automatically skips whitespace and comments starting with '#'.
    fn next<T>(&mut self) -> Result<T, InstanceLoadError>
    where
        T: FromStr,
    {
        loop {
            // Refill buffer if empty or consumed
            if self.pos >= self.buf.len() && !self.fill_line()? {
                return Err(InstanceLoadError::UnexpectedEof);
            }

            // Skip whitespace and comments
            while self.pos < self.buf.len() {
                let remainder = &self.buf[self.pos..];

                // Found a comment? Skip to end of line immediately.
                if remainder.starts_with('#') {
                    self.pos = self.buf.len();
                    break;
                }

                let c = remainder.chars().next().unwrap();
                if !c.is_whitespace() {
                    break; // Found start of a token
                }

                self.pos += c.len_utf8();
            }

            // If we consumed the whole line (whitespace/comments), loop to get
            // the next line
            if self.pos >= self.buf.len() {
                continue;
            }

            // Find end of token
            let mut end = self.pos;
            while end < self.buf.len() {
                let remainder = &self.buf[end..];

                // Token ends at whitespace or start of a comment
                if remainder.starts_with('#') {
                    break;
                }

                let c = remainder.chars().next().unwrap();
                if c.is_whitespace() {
                    break;
                }
                end += c.len_utf8();
            }

            let token = &self.buf[self.pos..end];
            self.pos = end;

            if token.is_empty() {
                continue;
            }

            self.token_ordinal += 1;
            let ordinal = self.token_ordinal;
            return token.parse::<T>().map_err(|_| {
                InstanceLoadError::Parse(ParseTokenError {
                    token: token.to_owned(),
                    type_name: std::any::type_name::<T>(),
                    token_ordinal: ordinal,
                })
            });
        }
    }
}
