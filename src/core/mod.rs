//! Core XML parsing primitives
//!
//! This module contains the fundamental building blocks for XML parsing:
//! - Scanner: SIMD-accelerated delimiter detection using memchr
//! - Tokenizer: incremental token extraction over streaming buffer windows
//! - Entities: XML entity decoding with Cow (zero-copy when possible)
//! - Attributes: attribute parsing into spans
//! - Encoding: byte order mark handling and UTF-16 detection

pub mod attributes;
pub mod encoding;
pub mod entities;
pub mod scanner;
pub mod tokenizer;
