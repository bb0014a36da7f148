//! Loading a file into a [`Document`].

use crate::crypto::{DecryptionError, SecurityHandler};
use crate::document::{Document, Version};
use crate::object::dict::keys::{ENCRYPT, FIRST, ID, INFO, N, OBJ_STM, ROOT, XREF};
use crate::object::{Dict, ObjRef, Object};
use crate::parse::{read_indirect_object, read_object};
use crate::reader::Reader;
use crate::repair;
use crate::xref::{self, Entry};
use log::{debug, warn};
use rustc_hash::{FxHashMap, FxHashSet};
use std::collections::BTreeMap;
use std::fmt;

/// An error that prevents a file from being loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadError {
    /// The file is not a PDF or is damaged beyond repair.
    Malformed(String),
    /// The file is encrypted and the password is wrong.
    Authentication,
    /// The file uses an encryption scheme that is not supported.
    UnsupportedEncryption,
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Malformed(reason) => write!(f, "malformed document: {reason}"),
            Self::Authentication => write!(f, "the password is incorrect"),
            Self::UnsupportedEncryption => write!(f, "unsupported encryption"),
        }
    }
}

impl core::error::Error for LoadError {}

struct RawObjects {
    objects: BTreeMap<ObjRef, Object>,
    compressed: Vec<(u32, u32, u32)>,
    trailer: Dict,
    repaired: bool,
}

/// Load a document, decrypting it with the given password if it is encrypted.
///
/// If the cross-reference information is broken, the objects are recovered by scanning the
/// whole file.
pub fn load(data: &[u8], password: &[u8]) -> Result<Document, LoadError> {
    let version = Version::from_header(data).unwrap_or_else(|| {
        warn!("missing PDF header, assuming version {}", Version::default());
        Version::default()
    });

    if let Some(raw) = read_with_xref(data) {
        match finish(raw, version, password) {
            Err(LoadError::Malformed(reason)) => {
                warn!("{reason}, retrying with a full scan");
            }
            result => return result,
        }
    }

    let scanned = repair::scan(data)
        .ok_or_else(|| LoadError::Malformed("no document catalog found".to_string()))?;

    let raw = RawObjects {
        objects: scanned.objects,
        compressed: vec![],
        trailer: scanned.trailer,
        repaired: true,
    };

    finish(raw, version, password)
}

fn read_with_xref(data: &[u8]) -> Option<RawObjects> {
    let Some(start) = xref::find_startxref(data) else {
        warn!("startxref not found");
        return None;
    };

    let xref = xref::read_xref(data, start)?;

    if !xref.trailer.contains_key(ROOT) {
        warn!("trailer has no Root entry");
        return None;
    }

    let resolve_length = |id: ObjRef| match xref.entries.get(&id.num) {
        Some(Entry::Offset { offset, .. }) => {
            let mut r = Reader::new_at(data, *offset);
            let (_, length) = read_indirect_object(&mut r, &|_| None)?;
            usize::try_from(length.as_i64()?).ok()
        }
        _ => None,
    };

    let mut objects = BTreeMap::new();
    let mut compressed = vec![];

    for (num, entry) in &xref.entries {
        match *entry {
            Entry::Free => {}
            Entry::Offset { offset, generation } => {
                let mut r = Reader::new_at(data, offset);

                match read_indirect_object(&mut r, &resolve_length) {
                    Some((id, object)) if id.num == *num => {
                        if id.generation != generation {
                            warn!(
                                "object {num} has generation {} instead of {generation}",
                                id.generation
                            );
                        }

                        objects.insert(id, object);
                    }
                    _ => {
                        warn!("xref entry for object {num} points to invalid offset {offset}");
                        return None;
                    }
                }
            }
            Entry::Compressed { container, index } => compressed.push((*num, container, index)),
        }
    }

    Some(RawObjects {
        objects,
        compressed,
        trailer: xref.trailer,
        repaired: false,
    })
}

fn finish(raw: RawObjects, version: Version, password: &[u8]) -> Result<Document, LoadError> {
    let RawObjects {
        mut objects,
        compressed,
        trailer,
        repaired,
    } = raw;

    let encrypt_ref = trailer.get_ref(ENCRYPT);
    let security = open_security_handler(&objects, &trailer, password)?;

    if let Some(handler) = &security {
        for (id, object) in objects.iter_mut() {
            if Some(*id) != encrypt_ref {
                handler.decrypt_object(*id, object);
            }
        }
    }

    let containers = decode_object_streams(&objects);

    if repaired {
        // Objects found inside object streams only fill gaps left by top-level definitions.
        let mut defined: FxHashSet<u32> = objects.keys().map(|id| id.num).collect();

        for container in containers.values() {
            for (id, object) in container {
                if defined.insert(id.num) {
                    objects.insert(*id, object.clone());
                }
            }
        }
    } else {
        for (num, container, index) in compressed {
            let object = containers
                .get(&container)
                .and_then(|c| c.get(index as usize))
                .filter(|(id, _)| id.num == num);

            match object {
                Some((id, object)) => {
                    objects.insert(*id, object.clone());
                }
                None => warn!("object {num} not found in object stream {container}"),
            }
        }
    }

    objects.retain(|id, object| {
        let is_structural = object
            .as_stream()
            .is_some_and(|s| s.dict.has_type(XREF) || s.dict.has_type(OBJ_STM));

        !is_structural && Some(*id) != encrypt_ref
    });

    for object in objects.values_mut() {
        if let Object::Stream(stream) = object {
            stream.update_length();
        }
    }

    let trailer: Dict = trailer
        .into_iter()
        .filter(|(key, _)| [ROOT, INFO, ID].contains(&&**key))
        .collect();

    let doc = Document {
        version,
        objects,
        trailer,
        repaired,
        security,
    };

    if doc.catalog().is_none() {
        return Err(LoadError::Malformed("document catalog is missing".to_string()));
    }

    debug!(
        "loaded {} objects (version {}, repaired: {})",
        doc.objects.len(),
        doc.version,
        doc.repaired
    );

    Ok(doc)
}

fn open_security_handler(
    objects: &BTreeMap<ObjRef, Object>,
    trailer: &Dict,
    password: &[u8],
) -> Result<Option<SecurityHandler>, LoadError> {
    let encrypt = match trailer.get(ENCRYPT) {
        None | Some(Object::Null) => return Ok(None),
        Some(Object::Ref(id)) => objects.get(id).and_then(Object::as_dict),
        Some(other) => other.as_dict(),
    };

    let Some(encrypt) = encrypt else {
        return Err(LoadError::Malformed(
            "encryption dictionary is missing".to_string(),
        ));
    };

    let id = trailer
        .get_array(ID)
        .and_then(|id| id.first())
        .and_then(Object::as_string)
        .unwrap_or_default();

    match SecurityHandler::open(encrypt, id, password) {
        Ok(handler) => Ok(Some(handler)),
        Err(DecryptionError::IncorrectPassword) => Err(LoadError::Authentication),
        Err(DecryptionError::UnsupportedAlgorithm) => Err(LoadError::UnsupportedEncryption),
        Err(DecryptionError::InvalidEncryption) => Err(LoadError::Malformed(
            "invalid encryption dictionary".to_string(),
        )),
    }
}

/// Decode all object streams, returning their objects in order, keyed by container number.
fn decode_object_streams(
    objects: &BTreeMap<ObjRef, Object>,
) -> FxHashMap<u32, Vec<(ObjRef, Object)>> {
    let mut containers = FxHashMap::default();

    for (id, object) in objects {
        let Some(stream) = object.as_stream() else {
            continue;
        };

        if !stream.dict.has_type(OBJ_STM) {
            continue;
        }

        match read_object_stream(&stream.dict, stream.decoded().ok().as_deref()) {
            Some(contents) => {
                containers.insert(id.num, contents);
            }
            None => warn!("failed to read object stream {id}"),
        }
    }

    containers
}

fn read_object_stream(dict: &Dict, data: Option<&[u8]>) -> Option<Vec<(ObjRef, Object)>> {
    let data = data?;
    let count = usize::try_from(dict.get_i64(N)?).ok()?;
    let first = usize::try_from(dict.get_i64(FIRST)?).ok()?;

    let mut header = Reader::new(data);
    let mut offsets = Vec::with_capacity(count.min(4096));

    for _ in 0..count {
        header.skip_white_spaces_and_comments();
        let num = u32::try_from(header.read_unsigned()?).ok()?;
        header.skip_white_spaces_and_comments();
        let offset = usize::try_from(header.read_unsigned()?).ok()?;
        offsets.push((num, offset));
    }

    let mut contents = Vec::with_capacity(offsets.len());

    for (num, offset) in offsets {
        let mut r = Reader::new_at(data, first.checked_add(offset)?);
        let object = read_object(&mut r, true).unwrap_or_else(|| {
            warn!("failed to parse object {num} inside object stream");
            Object::Null
        });

        contents.push((ObjRef::new(num, 0), object));
    }

    Some(contents)
}

#[cfg(test)]
mod tests {
    use super::{LoadError, load};
    use crate::object::{ObjRef, Object};

    // Build a file with a correct cross-reference table from a list of object bodies.
    fn build(objects: &[&str], trailer: &str) -> Vec<u8> {
        let mut out = b"%PDF-1.4\n".to_vec();
        let mut offsets = vec![];

        for (i, body) in objects.iter().enumerate() {
            offsets.push(out.len());
            out.extend_from_slice(format!("{} 0 obj\n{body}\nendobj\n", i + 1).as_bytes());
        }

        let xref_offset = out.len();
        let size = objects.len() + 1;
        out.extend_from_slice(format!("xref\n0 {size}\n0000000000 65535 f \n").as_bytes());
        for offset in offsets {
            out.extend_from_slice(format!("{offset:010} 00000 n \n").as_bytes());
        }
        out.extend_from_slice(
            format!("trailer\n<< /Size {size} {trailer} >>\nstartxref\n{xref_offset}\n%%EOF\n")
                .as_bytes(),
        );

        out
    }

    const CATALOG: &str = "<< /Type /Catalog /Pages 2 0 R >>";
    const PAGES: &str = "<< /Type /Pages /Kids [3 0 R] /Count 1 >>";
    const PAGE: &str = "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 200 200] /Contents 4 0 R >>";

    #[test]
    fn simple_file() {
        let data = build(
            &[CATALOG, PAGES, PAGE, "<< /Length 5 0 R >>\nstream\n0 0 m\nendstream", "5"],
            "/Root 1 0 R /Info 6 0 R",
        );

        let doc = load(&data, b"").unwrap();

        assert!(!doc.repaired);
        assert_eq!(doc.version.to_string(), "1.4");
        assert_eq!(doc.pages(), vec![ObjRef::new(3, 0)]);

        let contents = doc.get(ObjRef::new(4, 0)).and_then(Object::as_stream).unwrap();
        assert_eq!(contents.data, b"0 0 m");
        assert_eq!(contents.dict.get_i64(b"Length"), Some(5));

        // Only Root, Info and ID survive in the trailer.
        assert_eq!(doc.trailer.len(), 2);
    }

    #[test]
    fn broken_startxref_uses_repair() {
        let data = build(&[CATALOG, PAGES, PAGE, "<< >>"], "/Root 1 0 R");
        let data = String::from_utf8(data)
            .unwrap()
            .replace("startxref", "startxreF")
            .into_bytes();

        let doc = load(&data, b"").unwrap();

        assert!(doc.repaired);
        assert_eq!(doc.pages().len(), 1);
    }

    #[test]
    fn object_streams_are_expanded() {
        let header = format!("3 0 5 {} ", PAGE.len() + 1);
        let content = format!("{header}{PAGE} << /Marker true >>");
        let objstm = format!(
            "<< /Type /ObjStm /N 2 /First {} /Length {} >>\nstream\n{content}\nendstream",
            header.len(),
            content.len()
        );

        // Without any cross-reference information, the repair scan has to pick up the
        // objects stored in the object stream.
        let mut data = b"%PDF-1.5\n".to_vec();
        for (num, body) in [
            (1, CATALOG),
            (2, PAGES),
            (4, "<< /Length 0 >>\nstream\n\nendstream"),
            (6, objstm.as_str()),
        ] {
            data.extend_from_slice(format!("{num} 0 obj\n{body}\nendobj\n").as_bytes());
        }
        data.extend_from_slice(b"trailer\n<< /Root 1 0 R >>\n%%EOF\n");

        let doc = load(&data, b"").unwrap();

        assert!(doc.repaired);
        assert!(doc.get(ObjRef::new(6, 0)).is_none());
        assert_eq!(doc.pages(), vec![ObjRef::new(3, 0)]);
        assert_eq!(
            doc.get(ObjRef::new(5, 0))
                .and_then(Object::as_dict)
                .and_then(|d| d.get_bool(b"Marker")),
            Some(true)
        );
    }

    #[test]
    fn garbage_is_malformed() {
        assert!(matches!(
            load(b"this is not a pdf", b""),
            Err(LoadError::Malformed(_))
        ));
    }
}
