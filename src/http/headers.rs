//! HTTP headers handling
//!
//! Two shapes of header data live here:
//!
//! - [`Headers`] is the plain name/value map exchanged with handlers and
//!   returned by the client call. Keys are stored as given; order is irrelevant.
//! - [`Fields`] is the header section of a wire message. It keeps insertion
//!   order, allows repeated names and matches names case-insensitively.

use super::{Error, Result};
use std::collections::HashMap;
use std::fmt;

/// Header map handed to handlers and returned by the client
pub type Headers = HashMap<String, String>;

/// Header fields of an HTTP message
///
/// Fields are stored in insertion order and support:
/// - Case-insensitive header name lookups
/// - Multiple values for the same header name
/// - Replacing every value of a name with [`Fields::set`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Fields {
    fields: Vec<(String, String)>,
}

impl Fields {
    /// Create an empty field list
    pub fn new() -> Self {
        Fields { fields: Vec::new() }
    }

    /// Append a field, keeping any existing field with the same name
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.fields.push((name.into(), value.into()));
    }

    /// Set a field, replacing every existing field with the same name
    ///
    /// The first existing occurrence keeps its position so the emitted
    /// header order stays stable.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();

        let mut slot = None;
        let mut kept = 0;
        self.fields.retain(|(n, _)| {
            let matches = n.eq_ignore_ascii_case(&name);
            let keep = !matches || slot.is_none();
            if matches && slot.is_none() {
                slot = Some(kept);
            }
            if keep {
                kept += 1;
            }
            keep
        });

        match slot {
            Some(index) => self.fields[index] = (name, value),
            None => self.fields.push((name, value)),
        }
    }

    /// Get the first value for a field (case-insensitive)
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Get all values for a field (case-insensitive)
    pub fn get_all(&self, name: &str) -> Vec<&str> {
        self.fields
            .iter()
            .filter(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
            .collect()
    }

    /// Check if a field exists
    pub fn contains(&self, name: &str) -> bool {
        self.fields.iter().any(|(n, _)| n.eq_ignore_ascii_case(name))
    }

    /// Check whether a comma-separated field carries `token` (case-insensitive)
    ///
    /// Every occurrence of the field is searched, e.g. `Connection: close`
    /// or `Transfer-Encoding: gzip, chunked`.
    pub fn has_token(&self, name: &str, token: &str) -> bool {
        self.get_all(name)
            .into_iter()
            .flat_map(|value| value.split(','))
            .any(|t| t.trim().eq_ignore_ascii_case(token))
    }

    /// Remove all instances of a field (case-insensitive)
    pub fn remove(&mut self, name: &str) -> usize {
        let initial_len = self.fields.len();
        self.fields.retain(|(n, _)| !n.eq_ignore_ascii_case(name));
        initial_len - self.fields.len()
    }

    /// Get the number of fields
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Check if there are no fields
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Iterate over all fields
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    /// Materialize the fields as a [`Headers`] map
    ///
    /// Names keep their wire spelling. When a name repeats, the first value wins.
    pub fn to_headers(&self) -> Headers {
        let mut headers = Headers::with_capacity(self.fields.len());
        for (name, value) in &self.fields {
            headers
                .entry(name.clone())
                .or_insert_with(|| value.clone());
        }
        headers
    }

    /// Parse a header line into name and value
    pub fn parse_header_line(line: &str) -> Result<(String, String)> {
        if let Some(colon_pos) = line.find(':') {
            let raw_name = &line[..colon_pos];
            let value = line[colon_pos + 1..].trim().to_string();

            if raw_name.is_empty() {
                return Err(Error::InvalidHeader("Empty header name".to_string()));
            }
            if !raw_name.bytes().all(is_token_byte) {
                return Err(Error::InvalidHeader(format!(
                    "Invalid header name: {}",
                    raw_name
                )));
            }

            Ok((raw_name.to_string(), value))
        } else {
            Err(Error::InvalidHeader(format!("No colon in header: {}", line)))
        }
    }
}

/// RFC 9110 `tchar`
pub(crate) fn is_token_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b"!#$%&'*+-.^_`|~".contains(&b)
}

impl fmt::Display for Fields {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (name, value) in &self.fields {
            writeln!(f, "{}: {}", name, value)?;
        }
        Ok(())
    }
}

impl FromIterator<(String, String)> for Fields {
    fn from_iter<T: IntoIterator<Item = (String, String)>>(iter: T) -> Self {
        let mut fields = Fields::new();
        for (name, value) in iter {
            fields.insert(name, value);
        }
        fields
    }
}
