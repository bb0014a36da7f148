/*!
A crate for cleaning up and rewriting PDF files.

Given the bytes of a PDF file and a set of [`CleanOptions`], this crate produces a new PDF
file that is equivalent to the input, or a deliberately reduced version of it. Along the way,
the document can be:
- reduced to a subset of its pages, in any order and with repetitions,
- stripped of unreachable objects and renumbered densely,
- deduplicated, merging objects (and optionally streams) with identical contents,
- decompressed, recompressed or hex-encoded,
- sanitized, dropping unbalanced or malformed operators from content streams,
- enriched with generated appearance streams for annotations,
- decrypted and re-encrypted with RC4 or AES,
- written with object streams and a cross-reference stream.

Damaged files are repaired while loading by scanning for object headers. Every problem that
is worked around is recorded as a [`Diagnostic`] and logged through the `log` crate. Only
a small set of conditions is fatal, see [`Error`].

The document model and the parser live in [`rinse_syntax`], the serializer in
[`rinse_write`].

## Safety
This crate forbids unsafe code via a crate-level attribute.

# Example
```no_run
use rinse::{CleanOptions, EncryptionMethod};

let options = CleanOptions {
    garbage: 3,
    compress: true,
    object_streams: true,
    encryption: EncryptionMethod::Aes256,
    user_password: "secret".to_string(),
    ..CleanOptions::default()
};

let diagnostics = rinse::clean_file("input.pdf", "output.pdf", &options).unwrap();

for diagnostic in &diagnostics {
    eprintln!("{diagnostic}");
}
```
*/

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod appearance;
mod context;
mod dedup;
mod encrypt;
mod error;
mod gc;
mod options;
mod pages;
mod pipeline;
mod sanitize;
mod streams;

pub use error::{Diagnostic, Diagnostics, Error, Result};
pub use options::{
    AppearanceMode, CleanOptions, EncryptionMethod, GarbageLevel, SanitizeMode, Settings,
};
pub use pipeline::{Cleaned, clean, clean_file};
pub use rinse_syntax;
pub use rinse_write;
