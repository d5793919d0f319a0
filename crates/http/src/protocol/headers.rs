//! Ordered header container.
//!
//! Headers are kept as a plain list of name/value pairs so the wire order
//! survives parsing and formatting, duplicates included. Name matching is
//! ASCII case-insensitive, the original spelling of each name is kept for
//! output.

use std::fmt;
use std::slice;

/// A single header line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub name: String,
    pub value: String,
}

impl Header {
    pub fn new<N: Into<String>, V: Into<String>>(name: N, value: V) -> Self {
        Self { name: name.into(), value: value.into() }
    }

    #[inline]
    pub fn is(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    headers: Vec<Header>,
}

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self { headers: Vec::with_capacity(capacity) }
    }

    /// Value of the first header named `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.headers.iter().find(|header| header.is(name)).map(|header| header.value.as_str())
    }

    /// Values of every header named `name`, in wire order.
    pub fn get_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.headers.iter().filter(move |header| header.is(name)).map(|header| header.value.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.headers.iter().any(|header| header.is(name))
    }

    pub fn count(&self, name: &str) -> usize {
        self.headers.iter().filter(|header| header.is(name)).count()
    }

    /// Replaces the value of the first header named `name`, appending a new
    /// header when there is none.
    pub fn set_or_insert<N: Into<String>, V: Into<String>>(&mut self, name: N, value: V) {
        let name = name.into();
        let value = value.into();
        match self.headers.iter_mut().find(|header| header.is(&name)) {
            Some(header) => header.value = value,
            None => self.headers.push(Header { name, value }),
        }
    }

    /// Appends a header, keeping any existing ones with the same name.
    pub fn append<N: Into<String>, V: Into<String>>(&mut self, name: N, value: V) {
        self.headers.push(Header::new(name, value));
    }

    /// Removes every header named `name`, returns how many were removed.
    pub fn remove(&mut self, name: &str) -> usize {
        let before = self.headers.len();
        self.headers.retain(|header| !header.is(name));
        before - self.headers.len()
    }

    /// Whether any comma separated element of the `name` headers equals `token`.
    pub fn has_token(&self, name: &str, token: &str) -> bool {
        self.get_all(name).flat_map(|value| value.split(',')).any(|item| item.trim().eq_ignore_ascii_case(token))
    }

    pub fn len(&self) -> usize {
        self.headers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }

    pub fn iter(&self) -> slice::Iter<'_, Header> {
        self.headers.iter()
    }
}

impl<'a> IntoIterator for &'a Headers {
    type Item = &'a Header;
    type IntoIter = slice::Iter<'a, Header>;

    fn into_iter(self) -> Self::IntoIter {
        self.headers.iter()
    }
}

impl IntoIterator for Headers {
    type Item = Header;
    type IntoIter = std::vec::IntoIter<Header>;

    fn into_iter(self) -> Self::IntoIter {
        self.headers.into_iter()
    }
}

impl<N: Into<String>, V: Into<String>> FromIterator<(N, V)> for Headers {
    fn from_iter<T: IntoIterator<Item = (N, V)>>(iter: T) -> Self {
        Self { headers: iter.into_iter().map(|(name, value)| Header::new(name, value)).collect() }
    }
}

impl<N: Into<String>, V: Into<String>> Extend<(N, V)> for Headers {
    fn extend<T: IntoIterator<Item = (N, V)>>(&mut self, iter: T) {
        self.headers.extend(iter.into_iter().map(|(name, value)| Header::new(name, value)));
    }
}

impl fmt::Display for Headers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for header in &self.headers {
            writeln!(f, "{}: {}", header.name, header.value)?;
        }
        Ok(())
    }
}
