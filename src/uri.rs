use std::io::Write;

use crate::constant::{MAX_URI_PORT, MAX_URI_PORT_DIGITS};
use crate::error::{Error, Result};

/// Path reported when the input had an authority but no path segment.
const DEFAULT_PATH: &[u8] = b"/";

/// A sub-range of the owned URI buffer.
#[derive(Debug, Clone, Copy, Default)]
struct Span {
    start: usize,
    len: usize,
}

impl Span {
    fn new(start: usize, len: usize) -> Self {
        Self { start, len }
    }

    fn slice(self, buffer: &[u8]) -> &[u8] {
        buffer.get(self.start..self.start + self.len).unwrap_or(&[])
    }

    fn is_empty(self) -> bool {
        self.len == 0
    }
}

/// A parsed URI.
///
/// `Uri` owns a single contiguous buffer holding the full URI text. Every
/// accessor returns a sub-slice of that buffer (or the static `"/"` when the
/// input had no path), valid for as long as the `Uri` is alive. No accessor
/// copies or allocates.
///
/// The accepted grammar is `[scheme "://"] authority [path] ["?" query]`
/// where the authority is `host [":" port]`, the port is 1-5 decimal digits
/// no larger than 65535, the path begins with `/`, and the query runs to the
/// end of the input. No normalization or percent-decoding is performed.
///
/// ```
/// use zero_aio::Uri;
///
/// let uri = Uri::parse("https://example.com:8443/a/b?x=1").unwrap();
/// assert_eq!(uri.scheme(), b"https");
/// assert_eq!(uri.host_name(), b"example.com");
/// assert_eq!(uri.port(), 8443);
/// assert_eq!(uri.path(), b"/a/b");
/// assert_eq!(uri.query_string(), b"x=1");
/// ```
#[derive(Debug, Clone)]
pub struct Uri {
    buffer: Vec<u8>,
    scheme: Span,
    authority: Span,
    host_name: Span,
    port: u16,
    path: Span,
    path_and_query: Span,
    query_string: Span,
}

enum ParseState {
    Scheme,
    Authority,
    Path,
    QueryString,
    Finished,
}

impl Uri {
    /// Parse `input`, taking ownership of its bytes.
    ///
    /// On failure the buffer is dropped and no `Uri` exists.
    pub fn parse(input: impl Into<Vec<u8>>) -> Result<Self> {
        let mut uri = Self {
            buffer: input.into(),
            scheme: Span::default(),
            authority: Span::default(),
            host_name: Span::default(),
            port: 0,
            path: Span::default(),
            path_and_query: Span::default(),
            query_string: Span::default(),
        };
        let mut state = ParseState::Scheme;
        let mut cursor = 0;
        loop {
            state = match state {
                ParseState::Scheme => uri.parse_scheme(&mut cursor)?,
                ParseState::Authority => uri.parse_authority(&mut cursor)?,
                ParseState::Path => uri.parse_path(&mut cursor)?,
                ParseState::QueryString => uri.parse_query_string(&mut cursor)?,
                ParseState::Finished => return Ok(uri),
            };
        }
    }

    /// The scheme, without the `"://"`. Empty when the input had none.
    pub fn scheme(&self) -> &[u8] {
        self.scheme.slice(&self.buffer)
    }

    /// The authority: `host[:port]`.
    pub fn authority(&self) -> &[u8] {
        self.authority.slice(&self.buffer)
    }

    /// The authority minus any `:port` suffix.
    pub fn host_name(&self) -> &[u8] {
        self.host_name.slice(&self.buffer)
    }

    /// The port. `0` means the authority carried none.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// The path. `"/"` when the input had none.
    pub fn path(&self) -> &[u8] {
        if self.path.is_empty() {
            DEFAULT_PATH
        } else {
            self.path.slice(&self.buffer)
        }
    }

    /// The path and query together, `"?"` included. `"/"` when the input had
    /// neither.
    pub fn path_and_query(&self) -> &[u8] {
        if self.path_and_query.is_empty() {
            DEFAULT_PATH
        } else {
            self.path_and_query.slice(&self.buffer)
        }
    }

    /// The query string, without the leading `"?"`. Empty when absent.
    pub fn query_string(&self) -> &[u8] {
        self.query_string.slice(&self.buffer)
    }

    /// The full URI text.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer
    }

    /// Iterate over the query string's `key=value` pairs.
    ///
    /// Pairs are split on `&`; within a pair the first `=` separates key from
    /// value, and a pair without `=` has an empty value.
    pub fn query_params(&self) -> QueryParams<'_> {
        let query = self.query_string();
        QueryParams {
            remaining: (!query.is_empty()).then_some(query),
        }
    }

    /// Append every query parameter to `out`.
    pub fn query_string_params<'a>(&'a self, out: &mut Vec<QueryParam<'a>>) {
        out.extend(self.query_params());
    }

    fn remaining(&self, cursor: usize) -> &[u8] {
        self.buffer.get(cursor..).unwrap_or(&[])
    }

    fn parse_scheme(&mut self, cursor: &mut usize) -> Result<ParseState> {
        let rest = self.remaining(*cursor);
        let Some(colon) = rest.iter().position(|&b| b == b':') else {
            return Ok(ParseState::Authority);
        };
        if rest.get(colon + 1) != Some(&b'/') {
            // "host:port/..." style input, not a scheme
            return Ok(ParseState::Authority);
        }
        if rest.get(colon + 2) != Some(&b'/') {
            return Err(Error::MalformedUri("scheme must be followed by \"://\""));
        }
        self.scheme = Span::new(*cursor, colon);
        *cursor += colon + 3;
        Ok(ParseState::Authority)
    }

    fn parse_authority(&mut self, cursor: &mut usize) -> Result<ParseState> {
        let start = *cursor;
        let rest = self.remaining(start);
        if rest.is_empty() {
            return Err(Error::MalformedUri("authority is empty"));
        }
        let slash = rest.iter().position(|&b| b == b'/');
        let question = rest.iter().position(|&b| b == b'?');
        let (len, next) = match (slash, question) {
            (None, None) => (rest.len(), ParseState::Finished),
            (Some(s), None) => (s, ParseState::Path),
            (None, Some(q)) => (q, ParseState::QueryString),
            (Some(s), Some(q)) if s < q => (s, ParseState::Path),
            (Some(_), Some(q)) => (q, ParseState::QueryString),
        };
        self.authority = Span::new(start, len);
        let (host_name, port) = split_host_and_port(start, self.authority.slice(&self.buffer))?;
        self.host_name = host_name;
        self.port = port;
        *cursor = start + len;
        Ok(next)
    }

    fn parse_path(&mut self, cursor: &mut usize) -> Result<ParseState> {
        let start = *cursor;
        let rest_len = self.buffer.len().saturating_sub(start);
        self.path_and_query = Span::new(start, rest_len);
        if rest_len == 0 {
            return Err(Error::MalformedUri("path is empty"));
        }
        let question = self.remaining(start).iter().position(|&b| b == b'?');
        match question {
            None => {
                self.path = Span::new(start, rest_len);
                *cursor = start + rest_len;
                Ok(ParseState::Finished)
            }
            Some(question) => {
                self.path = Span::new(start, question);
                *cursor = start + question;
                Ok(ParseState::QueryString)
            }
        }
    }

    fn parse_query_string(&mut self, cursor: &mut usize) -> Result<ParseState> {
        let start = *cursor;
        if self.path_and_query.is_empty() {
            // Entered straight from the authority; there is no path segment.
            self.path_and_query = Span::new(start, self.buffer.len() - start);
        }
        // Skip the leading '?'.
        let len = self.buffer.len().saturating_sub(start + 1);
        self.query_string = Span::new(start + 1, len);
        *cursor = self.buffer.len();
        Ok(ParseState::Finished)
    }
}

/// Split `authority` (at absolute offset `start`) into a host span and a port.
fn split_host_and_port(start: usize, authority: &[u8]) -> Result<(Span, u16)> {
    match authority.iter().position(|&b| b == b':') {
        None => Ok((Span::new(start, authority.len()), 0)),
        Some(colon) => {
            let port = parse_port(authority.get(colon + 1..).unwrap_or(&[]))?;
            Ok((Span::new(start, colon), port))
        }
    }
}

fn parse_port(digits: &[u8]) -> Result<u16> {
    if digits.is_empty() {
        return Err(Error::MalformedUri("port has no digits"));
    }
    if digits.len() > MAX_URI_PORT_DIGITS {
        return Err(Error::MalformedUri("port has more than 5 digits"));
    }
    let mut value: u32 = 0;
    for &byte in digits {
        if !byte.is_ascii_digit() {
            return Err(Error::MalformedUri("port contains a non-digit"));
        }
        value = value * 10 + u32::from(byte - b'0');
    }
    if value > MAX_URI_PORT {
        return Err(Error::MalformedUri("port is larger than 65535"));
    }
    Ok(value as u16)
}

/// A single `key=value` pair split out of a query string.
///
/// Both fields borrow from the buffer the query string came from. `value` is
/// empty when the pair carried no `=`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryParam<'a> {
    pub key: &'a [u8],
    pub value: &'a [u8],
}

/// Iterator over the parameters of a query string, returned by
/// [`Uri::query_params`].
#[derive(Debug, Clone)]
pub struct QueryParams<'a> {
    remaining: Option<&'a [u8]>,
}

impl<'a> Iterator for QueryParams<'a> {
    type Item = QueryParam<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let rest = self.remaining.take()?;
        let pair = match rest.iter().position(|&b| b == b'&') {
            Some(amp) => {
                self.remaining = rest.get(amp + 1..);
                rest.get(..amp).unwrap_or(&[])
            }
            None => rest,
        };
        match pair.iter().position(|&b| b == b'=') {
            Some(eq) => Some(QueryParam {
                key: pair.get(..eq).unwrap_or(&[]),
                value: pair.get(eq + 1..).unwrap_or(&[]),
            }),
            None => Some(QueryParam {
                key: pair,
                value: &[],
            }),
        }
    }
}

/// Options for synthesizing a [`Uri`].
///
/// At most one of `query_string` and `query_params` may be set. The built
/// URI is produced by emitting the options into one buffer and re-parsing
/// it, so its accessors always reflect a round-tripped parse.
///
/// ```
/// use zero_aio::UriBuilder;
///
/// let uri = UriBuilder {
///     scheme: b"http",
///     host_name: b"localhost",
///     port: 8080,
///     path: b"/status",
///     ..Default::default()
/// }
/// .build()
/// .unwrap();
/// assert_eq!(uri.as_bytes(), b"http://localhost:8080/status");
/// ```
#[derive(Debug, Clone, Default)]
pub struct UriBuilder<'a> {
    pub scheme: &'a [u8],
    pub host_name: &'a [u8],
    pub port: u16,
    pub path: &'a [u8],
    /// A pre-encoded query string, without the leading `"?"`.
    pub query_string: &'a [u8],
    /// Parameters emitted as `key=value` joined by `&`.
    pub query_params: Vec<QueryParam<'a>>,
}

impl UriBuilder<'_> {
    /// Emit the options into a single buffer and parse it.
    pub fn build(&self) -> Result<Uri> {
        if !self.query_string.is_empty() && !self.query_params.is_empty() {
            return Err(Error::InvalidArgument(
                "query_string and query_params are mutually exclusive",
            ));
        }

        // Upper bound: "://" is 3 bytes, ":port" at most 6, "?" 1, and each
        // param needs at most "&" and "=" beyond its own bytes.
        let mut capacity = self.scheme.len()
            + 3
            + self.host_name.len()
            + 6
            + self.path.len()
            + 1
            + self.query_string.len();
        for param in &self.query_params {
            capacity += param.key.len() + param.value.len() + 2;
        }

        let mut buffer = Vec::with_capacity(capacity);
        if !self.scheme.is_empty() {
            buffer.extend_from_slice(self.scheme);
            buffer.extend_from_slice(b"://");
        }
        buffer.extend_from_slice(self.host_name);
        if self.port != 0 {
            write!(buffer, ":{}", self.port)?;
        }
        buffer.extend_from_slice(self.path);
        if !self.query_string.is_empty() {
            buffer.push(b'?');
            buffer.extend_from_slice(self.query_string);
        }
        for (index, param) in self.query_params.iter().enumerate() {
            buffer.push(if index == 0 { b'?' } else { b'&' });
            buffer.extend_from_slice(param.key);
            buffer.push(b'=');
            buffer.extend_from_slice(param.value);
        }
        Uri::parse(buffer)
    }
}
