/*!
A crate for serializing an in-memory PDF object graph into a file.

The writer takes a [`Document`] whose objects are final, meaning that all garbage collection,
recoding and encryption has already happened, and lays it out as a complete PDF file:
- the header, with the version raised as far as the used features require,
- every indirect object in ascending order of its reference,
- optionally, object streams packing small objects together (see [`ObjectStreamPlan`]),
- a classic cross-reference table, or a cross-reference stream when object streams are used,
- the trailer.

Objects are written under their own numbers, so the caller decides whether the output is
densely numbered.
*/

#![forbid(unsafe_code)]

mod objstm;
mod xref;

pub use objstm::ObjectStreamPlan;

use crate::xref::XRefEntry;
use log::debug;
use rinse_syntax::crypto::{EncryptionAlgorithm, SecurityHandler};
use rinse_syntax::object::dict::keys::{ENCRYPT, ID, INFO, LENGTH, ROOT};
use rinse_syntax::object::{Dict, ObjRef, Object};
use rinse_syntax::write::{Serializer, WriteDirect};
use rinse_syntax::{Document, Version};
use std::collections::BTreeMap;

/// Settings that influence the layout of the written file.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct WriteSettings {
    /// Put every dictionary entry on its own line.
    pub pretty: bool,
    /// Flate-compress object streams and cross-reference streams.
    pub compress_structure: bool,
}

/// Serialize a document.
///
/// If a `plan` is given, the objects it contains are packed into object streams and a
/// cross-reference stream is written. The `security` handler is only used to encrypt the
/// object streams themselves; all other objects must already be encrypted.
pub fn write(
    doc: &Document,
    settings: &WriteSettings,
    plan: Option<&ObjectStreamPlan>,
    security: Option<&SecurityHandler>,
) -> Vec<u8> {
    let version = output_version(doc, plan, security);
    let mut s = Serializer::new(settings.pretty);

    s.raw(format!("%PDF-{version}\n").as_bytes());
    // Marks the file as binary for transfer programs.
    s.raw(b"%\xE2\xE3\xCF\xD3\n");

    let mut entries = BTreeMap::new();

    for (id, object) in &doc.objects {
        if plan.is_some_and(|p| p.contains(*id)) {
            continue;
        }

        entries.insert(
            id.num,
            XRefEntry::Offset {
                offset: s.len(),
                generation: id.generation,
            },
        );
        write_indirect(&mut s, *id, object);
    }

    let mut next_num = doc.max_number() + 1;

    if let Some(plan) = plan {
        let mut containers = 0;

        for group in plan.groups() {
            let members = group
                .iter()
                .filter_map(|id| doc.get(*id).map(|object| (*id, object)))
                .collect::<Vec<_>>();

            if members.is_empty() {
                continue;
            }

            let container = ObjRef::new(next_num, 0);
            next_num += 1;
            containers += 1;

            let stream = objstm::pack(&members, container, settings, security);

            for (index, (id, _)) in (0_u32..).zip(&members) {
                entries.insert(
                    id.num,
                    XRefEntry::Compressed {
                        container: container.num,
                        index,
                    },
                );
            }

            entries.insert(
                container.num,
                XRefEntry::Offset {
                    offset: s.len(),
                    generation: 0,
                },
            );
            write_indirect(&mut s, container, &Object::Stream(stream));
        }

        debug!("packed {} objects into {containers} object streams", plan.len());

        let id = ObjRef::new(next_num, 0);
        xref::write_stream(
            &mut s,
            &mut entries,
            id,
            trailer_entries(doc),
            settings.compress_structure,
        );
    } else {
        xref::write_table(&mut s, &entries, trailer_entries(doc));
    }

    s.into_bytes()
}

/// Write an indirect object. The `Length` of a stream is always written as the direct
/// length of its payload.
pub(crate) fn write_indirect(s: &mut Serializer, id: ObjRef, object: &Object) {
    s.raw(format!("{} {} obj\n", id.num, id.generation).as_bytes());

    match object {
        Object::Stream(stream) => {
            let mut dict = stream.dict.clone();
            dict.insert(LENGTH, stream.data.len() as i64);

            dict.write_direct(s);
            s.raw(b"\nstream\n");
            s.raw(&stream.data);
            s.raw(b"\nendstream");
        }
        other => other.write_direct(s),
    }

    s.raw(b"\nendobj\n");
}

fn output_version(
    doc: &Document,
    plan: Option<&ObjectStreamPlan>,
    security: Option<&SecurityHandler>,
) -> Version {
    let mut version = doc.version;

    if plan.is_some() {
        version = version.max(Version::PDF_1_5);
    }

    let required = match security.map(SecurityHandler::algorithm) {
        Some(EncryptionAlgorithm::Rc4_128) => Version::PDF_1_4,
        Some(EncryptionAlgorithm::Aes128) => Version::PDF_1_6,
        Some(EncryptionAlgorithm::Aes256) => Version::PDF_2_0,
        _ => version,
    };

    version.max(required)
}

// The entries of the input trailer that are carried over. `Size` is added by the
// cross-reference writer.
fn trailer_entries(doc: &Document) -> Dict {
    let mut trailer = Dict::new();

    for key in [ROOT, INFO, ID, ENCRYPT] {
        if let Some(value) = doc.trailer.get(key) {
            trailer.insert(key, value.clone());
        }
    }

    trailer
}
