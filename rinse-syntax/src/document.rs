//! The in-memory object graph of a document.

use crate::crypto::SecurityHandler;
use crate::object::dict::keys::{CROP_BOX, KIDS, MEDIA_BOX, PAGES, RESOURCES, ROOT, ROTATE, TYPE};
use crate::object::{Dict, ObjRef, Object};
use log::warn;
use rustc_hash::FxHashSet;
use std::collections::BTreeMap;
use std::fmt;

// Reference chains longer than this are treated as dangling.
const MAX_RESOLVE_DEPTH: usize = 32;

/// The attributes of a page that can be inherited from its ancestors in the page tree.
pub(crate) const INHERITABLE_ATTRIBUTES: [&[u8]; 4] = [RESOURCES, MEDIA_BOX, CROP_BOX, ROTATE];

static NULL: Object = Object::Null;

/// A PDF version.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Version {
    /// The major version.
    pub major: u8,
    /// The minor version.
    pub minor: u8,
}

impl Version {
    /// PDF 1.4.
    pub const PDF_1_4: Self = Self::new(1, 4);
    /// PDF 1.5, the first version with object and cross-reference streams.
    pub const PDF_1_5: Self = Self::new(1, 5);
    /// PDF 1.6, the first version with AES-128.
    pub const PDF_1_6: Self = Self::new(1, 6);
    /// PDF 1.7.
    pub const PDF_1_7: Self = Self::new(1, 7);
    /// PDF 2.0, the first version with AES-256 at revision 6.
    pub const PDF_2_0: Self = Self::new(2, 0);

    /// Create a new version.
    pub const fn new(major: u8, minor: u8) -> Self {
        Self { major, minor }
    }

    /// Parse a version from the `%PDF-x.y` header of a file.
    pub(crate) fn from_header(data: &[u8]) -> Option<Self> {
        let head = &data[..data.len().min(1024)];
        let pos = memchr::memmem::find(head, b"%PDF-")?;
        let rest = &head[pos + 5..];

        let major = *rest.first()?;
        let minor = *rest.get(2)?;

        if !major.is_ascii_digit() || rest.get(1) != Some(&b'.') || !minor.is_ascii_digit() {
            return None;
        }

        Some(Self::new(major - b'0', minor - b'0'))
    }
}

impl Default for Version {
    fn default() -> Self {
        Self::PDF_1_7
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// A page together with the attributes it inherits from its ancestors.
#[derive(Debug, Clone, PartialEq)]
pub struct PageEntry {
    /// The page object.
    pub page: ObjRef,
    /// The inheritable attributes that are defined on an ancestor but not on the page itself.
    pub inherited: Dict,
}

/// A loaded PDF document.
#[derive(Debug, Clone, Default)]
pub struct Document {
    /// The version from the file header.
    pub version: Version,
    /// All indirect objects, ordered by their reference.
    pub objects: BTreeMap<ObjRef, Object>,
    /// The trailer dictionary.
    pub trailer: Dict,
    /// Whether the cross-reference information was reconstructed by scanning the file.
    pub repaired: bool,
    /// The security handler of the input file, if it was encrypted.
    pub security: Option<SecurityHandler>,
}

impl Document {
    /// Return the object with the given reference.
    pub fn get(&self, id: ObjRef) -> Option<&Object> {
        self.objects.get(&id)
    }

    /// Return the object with the given reference mutably.
    pub fn get_mut(&mut self, id: ObjRef) -> Option<&mut Object> {
        self.objects.get_mut(&id)
    }

    /// Follow references until a direct object is reached.
    ///
    /// Dangling references and overly long reference chains resolve to the null object.
    pub fn resolve<'a>(&'a self, object: &'a Object) -> &'a Object {
        let mut current = object;

        for _ in 0..MAX_RESOLVE_DEPTH {
            match current {
                Object::Ref(id) => match self.objects.get(id) {
                    Some(next) => current = next,
                    None => return &NULL,
                },
                _ => return current,
            }
        }

        warn!("reference chain is too long");

        &NULL
    }

    /// Resolve a reference.
    pub fn resolve_ref(&self, id: ObjRef) -> &Object {
        self.objects
            .get(&id)
            .map(|o| self.resolve(o))
            .unwrap_or(&NULL)
    }

    /// Resolve an object into a dictionary. Stream dictionaries are returned as well.
    pub fn resolve_dict<'a>(&'a self, object: &'a Object) -> Option<&'a Dict> {
        self.resolve(object).as_dict()
    }

    /// Add a new object under the next free object number with generation 0.
    pub fn add_object(&mut self, object: impl Into<Object>) -> ObjRef {
        let id = ObjRef::new(self.max_number() + 1, 0);
        self.objects.insert(id, object.into());

        id
    }

    /// Insert an object under the given reference, returning the previous one.
    pub fn insert(&mut self, id: ObjRef, object: impl Into<Object>) -> Option<Object> {
        self.objects.insert(id, object.into())
    }

    /// Remove an object.
    pub fn remove(&mut self, id: ObjRef) -> Option<Object> {
        self.objects.remove(&id)
    }

    /// The highest object number in use, or 0 if there are no objects.
    pub fn max_number(&self) -> u32 {
        self.objects.last_key_value().map(|(id, _)| id.num).unwrap_or(0)
    }

    /// The reference of the document catalog.
    pub fn catalog_ref(&self) -> Option<ObjRef> {
        self.trailer.get_ref(ROOT)
    }

    /// The document catalog.
    pub fn catalog(&self) -> Option<&Dict> {
        self.resolve_dict(self.trailer.get(ROOT)?)
    }

    /// The reference of the root node of the page tree.
    pub fn pages_ref(&self) -> Option<ObjRef> {
        self.catalog()?.get_ref(PAGES)
    }

    /// All pages of the document, in order.
    pub fn pages(&self) -> Vec<ObjRef> {
        self.page_tree().into_iter().map(|e| e.page).collect()
    }

    /// Walk the page tree depth-first, collecting every page together with its inherited
    /// attributes.
    ///
    /// Every node is visited at most once, so cyclic trees terminate. `Count` entries are
    /// ignored.
    pub fn page_tree(&self) -> Vec<PageEntry> {
        let mut entries = vec![];
        let Some(root) = self.pages_ref() else {
            return entries;
        };

        let mut visited = FxHashSet::default();
        let mut stack = vec![(root, Dict::new())];

        while let Some((id, inherited)) = stack.pop() {
            if !visited.insert(id) {
                warn!("page tree node {id} is visited twice, ignoring it");
                continue;
            }

            let Some(node) = self.resolve_ref(id).as_dict() else {
                warn!("page tree node {id} is not a dictionary");
                continue;
            };

            let is_pages_node = match node.get_name(TYPE) {
                Some(ty) => &**ty == PAGES,
                None => node.contains_key(KIDS),
            };

            if is_pages_node {
                let mut inherited = inherited;

                for key in INHERITABLE_ATTRIBUTES {
                    if let Some(value) = node.get(key) {
                        inherited.insert(key, value.clone());
                    }
                }

                let kids = node.get(KIDS).map(|k| self.resolve(k));

                if let Some(Object::Array(kids)) = kids {
                    for kid in kids.iter().rev() {
                        match kid {
                            Object::Ref(kid) => stack.push((*kid, inherited.clone())),
                            _ => warn!("ignoring direct object in Kids of {id}"),
                        }
                    }
                }
            } else {
                let mut inherited = inherited;
                inherited.retain(|key, _| !node.contains_key(key));

                entries.push(PageEntry {
                    page: id,
                    inherited,
                });
            }
        }

        entries
    }
}

#[cfg(test)]
mod tests {
    use super::{Document, Version};
    use crate::object::{Dict, ObjRef, Object};

    fn dict(entries: &[(&str, Object)]) -> Object {
        let mut dict = Dict::new();
        for (key, value) in entries {
            dict.insert(*key, value.clone());
        }
        Object::Dict(dict)
    }

    fn r(num: u32) -> Object {
        Object::Ref(ObjRef::new(num, 0))
    }

    #[test]
    fn header_version() {
        assert_eq!(Version::from_header(b"%PDF-1.4\n"), Some(Version::new(1, 4)));
        assert_eq!(
            Version::from_header(b"garbage%PDF-2.0\n"),
            Some(Version::PDF_2_0)
        );
        assert_eq!(Version::from_header(b"%PDF-x"), None);
    }

    #[test]
    fn resolve_chains_and_dangling() {
        let mut doc = Document::default();
        doc.insert(ObjRef::new(1, 0), r(2));
        doc.insert(ObjRef::new(2, 0), 42);

        assert_eq!(doc.resolve(&r(1)), &Object::from(42));
        assert!(doc.resolve(&r(7)).is_null());

        // 3 -> 4 -> 3
        doc.insert(ObjRef::new(3, 0), r(4));
        doc.insert(ObjRef::new(4, 0), r(3));
        assert!(doc.resolve(&r(3)).is_null());
    }

    #[test]
    fn add_object_uses_next_number() {
        let mut doc = Document::default();
        doc.insert(ObjRef::new(5, 0), 1);

        assert_eq!(doc.add_object(2), ObjRef::new(6, 0));
        assert_eq!(doc.max_number(), 6);
    }

    #[test]
    fn page_tree_with_inheritance_and_cycle() {
        let mut doc = Document::default();
        doc.trailer.insert("Root", r(1));
        doc.insert(ObjRef::new(1, 0), dict(&[("Pages", r(2))]));
        doc.insert(
            ObjRef::new(2, 0),
            dict(&[
                ("Type", Object::Name("Pages".into())),
                ("Kids", Object::Array(vec![r(3), r(4)])),
                ("Rotate", 90.into()),
                ("MediaBox", Object::Array(vec![0.into(), 0.into(), 10.into(), 10.into()])),
            ]),
        );
        doc.insert(
            ObjRef::new(3, 0),
            dict(&[
                ("Type", Object::Name("Pages".into())),
                // Points back at the root.
                ("Kids", Object::Array(vec![r(5), r(2)])),
                ("Rotate", 180.into()),
            ]),
        );
        doc.insert(ObjRef::new(4, 0), dict(&[("Type", Object::Name("Page".into()))]));
        doc.insert(
            ObjRef::new(5, 0),
            dict(&[
                ("Type", Object::Name("Page".into())),
                ("MediaBox", Object::Array(vec![])),
            ]),
        );

        let tree = doc.page_tree();
        assert_eq!(doc.pages(), vec![ObjRef::new(5, 0), ObjRef::new(4, 0)]);

        assert_eq!(tree[0].inherited.get_i64(b"Rotate"), Some(180));
        assert!(!tree[0].inherited.contains_key(b"MediaBox"));
        assert_eq!(tree[1].inherited.get_i64(b"Rotate"), Some(90));
        assert!(tree[1].inherited.contains_key(b"MediaBox"));
    }
}
