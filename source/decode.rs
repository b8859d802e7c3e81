// RFC 2047 header decoding and Content-Transfer-Encoding decoding are whole subsystems of their
// own and deliberately out of scope for this crate's core: the chain only depends on this trait.
// Applications that already own a MIME stack should implement it against that; `DefaultDecoder`
// below is a reasonable batteries-included option and is what this crate's own tests use.

use base64::Engine as _;

fn base64_engine() -> base64::engine::GeneralPurpose {
  base64::engine::GeneralPurpose::new(&base64::alphabet::STANDARD, base64::engine::general_purpose::PAD)
}

/// The two decoding operations the filters need from an embedding application's MIME stack.
/// Implementations must never fail outward: a decode that can't be performed should fall back to
/// the best-effort rendering of its input so the filter can still return a valid verdict.
pub trait Decoder: Send + Sync {
  /// RFC 2047 "encoded word" decoding of a raw header value (e.g. a `Subject` header).
  fn decode_encoded_words(&self, value: &str) -> String;

  /// Decodes a message body given the value of its `Content-Transfer-Encoding` header. An empty
  /// `encoding` means identity (no transfer encoding was applied).
  fn decode_transfer(&self, body: &[u8], encoding: &str) -> String;
}

/// A small, dependency-light decoder good enough to exercise the filters end to end: it
/// understands the common `=?charset?Q?...?=` / `=?charset?B?...?=` encoded-word forms and the
/// `base64` / `quoted-printable` / `7bit` / `8bit` / `binary` transfer encodings. Anything it
/// can't decode is returned as lossy UTF-8 of the original bytes rather than an error.
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultDecoder;

impl Decoder for DefaultDecoder {
  fn decode_encoded_words(&self, value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut rest = value;
    loop {
      match decode_one_encoded_word(rest) {
        Some((decoded, remainder)) => {
          out.push_str(&decoded);
          rest = remainder;
        }
        None => match rest.find("=?") {
          Some(next) => {
            out.push_str(&rest[..next]);
            rest = &rest[next..];
            if decode_one_encoded_word(rest).is_none() {
              // Not actually a well-formed encoded word; consume one byte to make progress.
              let mut chars = rest.chars();
              if let Some(char) = chars.next() {
                out.push(char);
              }
              rest = chars.as_str();
              if rest.is_empty() {
                break;
              }
            }
          }
          None => {
            out.push_str(rest);
            break;
          }
        },
      }
    }
    out
  }

  fn decode_transfer(&self, body: &[u8], encoding: &str) -> String {
    match encoding.trim().to_lowercase().as_str() {
      "base64" => {
        let stripped: Vec<u8> = body.iter().copied().filter(|b| !b.is_ascii_whitespace()).collect();
        match base64_engine().decode(&stripped) {
          Ok(decoded) => String::from_utf8_lossy(&decoded).into_owned(),
          Err(error) => {
            log::warn!("couldn't base64-decode message body: {error}");
            String::from_utf8_lossy(body).into_owned()
          }
        }
      }
      "quoted-printable" => decode_quoted_printable(body),
      "" | "7bit" | "8bit" | "binary" => String::from_utf8_lossy(body).into_owned(),
      other => {
        log::warn!("unknown transfer encoding {other:?}, treating as identity");
        String::from_utf8_lossy(body).into_owned()
      }
    }
  }
}

/// Decodes a single leading `=?charset?Q|B?text?=` encoded word, returning the decoded text and
/// the remainder of the input. Returns `None` if `value` doesn't start with a well-formed word.
fn decode_one_encoded_word(value: &str) -> Option<(String, &str)> {
  let rest = value.strip_prefix("=?")?;
  let (charset, rest) = rest.split_once('?')?;
  let (kind, rest) = rest.split_once('?')?;
  let (text, rest) = rest.split_once("?=")?;
  let bytes = match kind.to_ascii_uppercase().as_str() {
    "B" => {
      let stripped: Vec<u8> = text.bytes().filter(|b| !b.is_ascii_whitespace()).collect();
      base64_engine().decode(&stripped).ok()?
    }
    "Q" => decode_q_bytes(text),
    _ => return None,
  };
  Some((decode_charset(&bytes, charset), rest))
}

/// Decodes `bytes` according to an RFC 2047 charset label (e.g. `"ISO-8859-1"`, `"UTF-8"`),
/// falling back to lossy UTF-8 for an unrecognized label rather than failing the whole decode.
fn decode_charset(bytes: &[u8], charset: &str) -> String {
  let encoding = encoding_rs::Encoding::for_label(charset.as_bytes()).unwrap_or(encoding_rs::UTF_8);
  encoding.decode(bytes).0.into_owned()
}

/// RFC 2047's "Q" encoding: like quoted-printable, but `_` stands for a space. Returns raw bytes
/// so the caller can decode them according to the encoded word's declared charset.
fn decode_q_bytes(text: &str) -> Vec<u8> {
  let mut out = Vec::with_capacity(text.len());
  let mut bytes = text.bytes();
  while let Some(byte) = bytes.next() {
    match byte {
      b'_' => out.push(b' '),
      b'=' => match (bytes.next().and_then(hex_digit), bytes.next().and_then(hex_digit)) {
        (Some(high), Some(low)) => out.push(high << 4 | low),
        _ => out.push(b'='),
      },
      byte => out.push(byte),
    }
  }
  out
}

fn decode_quoted_printable(body: &[u8]) -> String {
  let mut out = Vec::with_capacity(body.len());
  let mut bytes = body.iter().copied().peekable();
  while let Some(byte) = bytes.next() {
    if byte == b'=' {
      match (bytes.next(), bytes.peek().copied()) {
        (Some(b'\r'), Some(b'\n')) => {
          bytes.next();
        }
        (Some(b'\n'), _) => (),
        (Some(high), _) => {
          if let (Some(high), Some(low)) = (hex_digit(high), bytes.next().and_then(hex_digit)) {
            out.push(high << 4 | low);
          }
        }
        (None, _) => (),
      }
    } else {
      out.push(byte);
    }
  }
  String::from_utf8_lossy(&out).into_owned()
}

fn hex_digit(byte: u8) -> Option<u8> {
  match byte {
    b'0'..=b'9' => Some(byte - b'0'),
    b'a'..=b'f' => Some(byte - b'a' + 10),
    b'A'..=b'F' => Some(byte - b'A' + 10),
    _ => None,
  }
}
