use std::collections;

use crate::decode::Decoder;

/// A case-insensitive header name -> raw value map. Header names are lowercased on insertion and
/// on lookup; the raw (un-decoded, e.g. RFC 2047 encoded-word) value is stored as-is.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Headers(collections::HashMap<String, String>);

impl Headers {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn insert(&mut self, name: impl AsRef<str>, value: impl Into<String>) -> &mut Self {
    self.0.insert(name.as_ref().to_lowercase(), value.into());
    self
  }

  pub fn get(&self, name: &str) -> Option<&str> {
    self.0.get(&name.to_lowercase()).map(String::as_str)
  }
}

impl FromIterator<(String, String)> for Headers {
  fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
    let mut headers = Self::new();
    for (name, value) in iter {
      headers.insert(name, value);
    }
    headers
  }
}

/// An immutable inbound message: the headers, the undecoded body, and the client-first delivery
/// path (host/IP strings, the nearest hop first).
#[derive(Clone, Debug, PartialEq)]
pub struct Message {
  headers: Headers,
  body: Vec<u8>,
  peer_address: Vec<String>,
}

impl Message {
  pub fn new(headers: Headers, body: impl Into<Vec<u8>>, peer_address: Vec<String>) -> Self {
    Self {
      headers,
      body: body.into(),
      peer_address,
    }
  }

  pub fn headers(&self) -> &Headers {
    &self.headers
  }

  pub fn body(&self) -> &[u8] {
    &self.body
  }

  pub fn peer_address(&self) -> &[String] {
    &self.peer_address
  }

  /// The `Subject` header, RFC-2047-decoded via `decoder`. Absent header decodes to an empty
  /// string, matching the `DecodeError` policy: the caller still gets a usable string.
  pub fn decoded_subject(&self, decoder: &dyn Decoder) -> String {
    decoder.decode_encoded_words(self.headers.get("subject").unwrap_or(""))
  }

  /// The body, decoded according to the `Content-Transfer-Encoding` header (identity when
  /// absent).
  pub fn decoded_body(&self, decoder: &dyn Decoder) -> String {
    let encoding = self.headers.get("content-transfer-encoding").unwrap_or("");
    decoder.decode_transfer(&self.body, encoding)
  }
}
