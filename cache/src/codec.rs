//! The payload format shared with other services reading the same keyspace.
//!
//! A value is serialized to text (JSON by default) and then optionally wrapped
//! in a compressed stream. JSON output matches the byte layout produced by Go's
//! `encoding/json` encoder: compact, newline-terminated, with `<`, `>` and `&`
//! escaped when `escape_html` is on and U+2028/U+2029 always escaped.

use std::io::{self, Read, Write};

use flate2::read::{GzDecoder, ZlibDecoder};
use flate2::write::{GzEncoder, ZlibEncoder};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::error::Category;
use serde_json::ser::Formatter;

use crate::error::{CacheError, Result};

/// The compressed framing wrapped around a payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Compression {
  #[default]
  None,
  /// The gzip container format.
  Gzip,
  /// zlib framing, shared with peers written in other languages.
  Zlib,
}

/// The text format of a payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Serializer {
  #[default]
  Json,
  /// Readable only by this library.
  Yaml,
}

/// Turns values into payload bytes and back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Codec {
  compression: Compression,
  serializer: Serializer,
  escape_html: bool,
}

impl Default for Codec {
  fn default() -> Self {
    Self {
      compression: Compression::None,
      serializer: Serializer::Json,
      escape_html: true,
    }
  }
}

impl Codec {
  pub fn new(compression: Compression, serializer: Serializer, escape_html: bool) -> Self {
    Self {
      compression,
      serializer,
      escape_html,
    }
  }

  pub fn compression(&self) -> Compression {
    self.compression
  }

  pub fn serializer(&self) -> Serializer {
    self.serializer
  }

  pub fn encode<T: Serialize + ?Sized>(&self, value: &T) -> Result<Vec<u8>> {
    match self.compression {
      Compression::None => {
        let mut buf = Vec::new();
        self.write_text(&mut buf, value)?;
        Ok(buf)
      }
      Compression::Gzip => {
        let mut encoder = GzEncoder::new(Vec::new(), flate2::Compression::default());
        self.write_text(&mut encoder, value)?;
        encoder.finish().map_err(encode_error)
      }
      Compression::Zlib => {
        let mut encoder = ZlibEncoder::new(Vec::new(), flate2::Compression::default());
        self.write_text(&mut encoder, value)?;
        encoder.finish().map_err(encode_error)
      }
    }
  }

  /// Decodes exactly one value from `payload`.
  ///
  /// Only the bytes making up the value are read, so a compressed stream whose
  /// trailer is missing still decodes.
  pub fn decode<T: DeserializeOwned>(&self, payload: &[u8]) -> Result<T> {
    match self.compression {
      Compression::None => self.read_text(payload),
      Compression::Gzip => self.read_text(GzDecoder::new(payload)),
      Compression::Zlib => self.read_text(ZlibDecoder::new(payload)),
    }
  }

  fn write_text<W: Write, T: Serialize + ?Sized>(&self, mut writer: W, value: &T) -> Result<()> {
    match self.serializer {
      Serializer::Json => {
        let formatter = GoJsonFormatter {
          escape_html: self.escape_html,
        };
        let mut ser = serde_json::Serializer::with_formatter(&mut writer, formatter);
        value.serialize(&mut ser).map_err(encode_error)?;
        writer.write_all(b"\n").map_err(encode_error)
      }
      Serializer::Yaml => serde_yaml::to_writer(writer, value).map_err(encode_error),
    }
  }

  fn read_text<R: Read, T: DeserializeOwned>(&self, reader: R) -> Result<T> {
    match self.serializer {
      Serializer::Json => {
        // Syntax is checked in full before the shape, so a malformed payload
        // is never reported as a type mismatch.
        let mut de = serde_json::Deserializer::from_reader(reader);
        let text = serde_json::Value::deserialize(&mut de).map_err(|e| CacheError::Decode(e.to_string()))?;
        serde_json::from_value(text).map_err(|e| match e.classify() {
          Category::Data => CacheError::type_mismatch::<T>(e.to_string()),
          Category::Io | Category::Syntax | Category::Eof => CacheError::Decode(e.to_string()),
        })
      }
      Serializer::Yaml => serde_yaml::from_reader(reader).map_err(|e| CacheError::Decode(e.to_string())),
    }
  }
}

fn encode_error(e: impl std::fmt::Display) -> CacheError {
  CacheError::Encode(e.to_string())
}

/// Compact JSON with the extra escapes Go's encoder applies to strings.
struct GoJsonFormatter {
  escape_html: bool,
}

impl Formatter for GoJsonFormatter {
  fn write_string_fragment<W>(&mut self, writer: &mut W, fragment: &str) -> io::Result<()>
  where
    W: ?Sized + Write,
  {
    let mut start = 0;
    for (i, ch) in fragment.char_indices() {
      let escaped = match ch {
        '<' if self.escape_html => "\\u003c",
        '>' if self.escape_html => "\\u003e",
        '&' if self.escape_html => "\\u0026",
        '\u{2028}' => "\\u2028",
        '\u{2029}' => "\\u2029",
        _ => continue,
      };
      writer.write_all(fragment[start..i].as_bytes())?;
      writer.write_all(escaped.as_bytes())?;
      start = i + ch.len_utf8();
    }
    writer.write_all(fragment[start..].as_bytes())
  }
}
