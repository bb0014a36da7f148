/*!
A crate for loading PDF files into an owned, mutable object graph.

This crate is the foundation of `rinse`. It takes the raw bytes of a PDF file and turns
them into a [`Document`]: an arena of indirect objects keyed by their
[`ObjRef`](object::ObjRef), together with the trailer dictionary. Unlike a viewer, which only
ever needs to read objects, a rewriting tool needs to prune, merge, recode and encrypt
objects in place, so every object is parsed eagerly into an owned representation.

The main entry point is [`load`], which:
- locates and parses the cross-reference table or stream, following `/Prev` chains,
- falls back to a full-file scan for object headers if the table is broken,
- expands objects stored inside object streams,
- authenticates a password and decrypts all strings and streams if the file is encrypted.

Besides loading, the crate also contains the building blocks shared by the writer and the
cleaning stages:
- [`filter`]: decoders and encoders for the standard stream filters.
- [`crypto`]: the standard security handler, both for decryption and encryption.
- [`content`]: a tokenizer for content streams.
- [`write`]: serialization of individual objects.

# Example
```no_run
use rinse_syntax::load;

let data = std::fs::read("document.pdf").unwrap();
let doc = load(&data, b"").unwrap();

for page in doc.pages() {
    println!("page {page}");
}
```
*/

#![forbid(unsafe_code)]

pub mod content;
pub mod crypto;
mod document;
pub mod filter;
mod load;
pub mod object;
mod parse;
pub mod reader;
mod repair;
pub mod trivia;
pub mod write;
mod xref;

pub use document::{Document, PageEntry, Version};
pub use load::{LoadError, load};
pub use parse::parse_object;
