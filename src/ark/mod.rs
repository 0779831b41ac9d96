/// ARK identifier handling
///
/// The codec owns identifier generation and normalization, the assembler owns
/// the `ark:{naan}/{shoulder}{identifier}` string form.

pub mod ark_string;
pub mod codec;

pub use ark_string::{assemble, parse, parse_normalized, ArkParts, Malformed, ParsedArk};
pub use codec::{NormalizedSuffix, IDENTIFIER_LENGTH};
