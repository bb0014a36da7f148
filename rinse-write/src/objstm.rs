//! Packing objects into object streams.

use crate::WriteSettings;
use rinse_syntax::crypto::{CryptTarget, SecurityHandler};
use rinse_syntax::object::dict::keys::{ENCRYPT, FIRST, N, OBJ_STM, TYPE};
use rinse_syntax::object::{Dict, Name, ObjRef, Object, Stream};
use rinse_syntax::write::{Serializer, WriteDirect};
use rinse_syntax::Document;
use rustc_hash::FxHashSet;
use std::io::Write as _;

const MAX_OBJECTS_PER_STREAM: usize = 100;

/// The objects of a document that are going to be stored inside object streams.
///
/// The plan has to be computed before the document is encrypted, because objects inside an
/// object stream must not have their strings encrypted individually.
#[derive(Debug, Clone, Default)]
pub struct ObjectStreamPlan {
    groups: Vec<Vec<ObjRef>>,
    members: FxHashSet<ObjRef>,
}

impl ObjectStreamPlan {
    /// Plan object streams for all eligible objects of the document.
    ///
    /// Streams, objects with a non-zero generation and the encryption dictionary are not
    /// eligible. The remaining objects are grouped in ascending order.
    pub fn new(doc: &Document) -> Self {
        let encrypt = doc.trailer.get_ref(ENCRYPT);

        let eligible = doc
            .objects
            .iter()
            .filter(|(id, object)| {
                id.generation == 0
                    && !matches!(object, Object::Stream(_))
                    && Some(**id) != encrypt
            })
            .map(|(id, _)| *id)
            .collect::<Vec<_>>();

        Self {
            members: eligible.iter().copied().collect(),
            groups: eligible
                .chunks(MAX_OBJECTS_PER_STREAM)
                .map(<[ObjRef]>::to_vec)
                .collect(),
        }
    }

    /// Whether the object is stored in an object stream.
    pub fn contains(&self, id: ObjRef) -> bool {
        self.members.contains(&id)
    }

    /// The groups of objects, each forming one object stream.
    pub fn groups(&self) -> &[Vec<ObjRef>] {
        &self.groups
    }

    /// The number of objects in the plan.
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Whether the plan contains no objects.
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

/// Build the object stream holding the given objects.
pub(crate) fn pack(
    members: &[(ObjRef, &Object)],
    container: ObjRef,
    settings: &WriteSettings,
    security: Option<&SecurityHandler>,
) -> Stream {
    let mut header = vec![];
    let mut body = Serializer::new(settings.pretty);

    for (i, (id, object)) in members.iter().enumerate() {
        if i > 0 {
            body.newline();
        }

        let _ = write!(header, "{} {} ", id.num, body.len());
        object.write_direct(&mut body);
    }

    header.pop();
    header.push(b'\n');

    let mut dict = Dict::new();
    dict.insert(TYPE, Name::new(OBJ_STM));
    dict.insert(N, members.len() as i64);
    dict.insert(FIRST, header.len() as i64);

    let mut data = header;
    data.extend_from_slice(body.as_bytes());

    let mut stream = Stream::new(dict, data);

    if settings.compress_structure {
        stream.compress();
    }

    if let Some(security) = security {
        stream.data = security.encrypt(container, &stream.data, CryptTarget::Stream);
    }

    stream.update_length();

    stream
}
