//! Dictionaries.

use crate::object::{Name, ObjRef, Object};
use std::collections::BTreeMap;
use std::collections::btree_map;

/// A PDF dictionary.
///
/// Keys are kept in byte order, so iterating over a dictionary is deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Dict(BTreeMap<Name, Object>);

impl Dict {
    /// Create a new, empty dictionary.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of entries in the dictionary.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Checks whether the dictionary is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Checks whether the dictionary contains an entry with the given key.
    pub fn contains_key(&self, key: &[u8]) -> bool {
        self.0.contains_key(key)
    }

    /// Returns the value of the entry with the given key.
    pub fn get(&self, key: &[u8]) -> Option<&Object> {
        self.0.get(key)
    }

    /// Returns a mutable reference to the value of the entry with the given key.
    pub fn get_mut(&mut self, key: &[u8]) -> Option<&mut Object> {
        self.0.get_mut(key)
    }

    /// Inserts an entry, returning the previous value.
    pub fn insert(&mut self, key: impl Into<Name>, value: impl Into<Object>) -> Option<Object> {
        self.0.insert(key.into(), value.into())
    }

    /// Removes an entry, returning its value.
    pub fn remove(&mut self, key: &[u8]) -> Option<Object> {
        self.0.remove(key)
    }

    /// Retains only the entries for which the predicate returns `true`.
    pub fn retain(&mut self, mut f: impl FnMut(&Name, &mut Object) -> bool) {
        self.0.retain(|k, v| f(k, v));
    }

    /// Returns an iterator over the entries of the dictionary.
    pub fn iter(&self) -> btree_map::Iter<'_, Name, Object> {
        self.0.iter()
    }

    /// Returns a mutable iterator over the entries of the dictionary.
    pub fn iter_mut(&mut self) -> btree_map::IterMut<'_, Name, Object> {
        self.0.iter_mut()
    }

    /// Returns an iterator over the keys of the dictionary.
    pub fn keys(&self) -> impl Iterator<Item = &Name> {
        self.0.keys()
    }

    /// Returns the value of the entry as a name.
    pub fn get_name(&self, key: &[u8]) -> Option<&Name> {
        self.get(key)?.as_name()
    }

    /// Returns the value of the entry as an integer.
    pub fn get_i64(&self, key: &[u8]) -> Option<i64> {
        self.get(key)?.as_i64()
    }

    /// Returns the value of the entry as a number.
    pub fn get_f64(&self, key: &[u8]) -> Option<f64> {
        self.get(key)?.as_f64()
    }

    /// Returns the value of the entry as a boolean.
    pub fn get_bool(&self, key: &[u8]) -> Option<bool> {
        self.get(key)?.as_bool()
    }

    /// Returns the value of the entry as an object reference.
    pub fn get_ref(&self, key: &[u8]) -> Option<ObjRef> {
        self.get(key)?.as_obj_ref()
    }

    /// Returns the value of the entry as a dictionary.
    pub fn get_dict(&self, key: &[u8]) -> Option<&Dict> {
        self.get(key)?.as_dict()
    }

    /// Returns the value of the entry as an array.
    pub fn get_array(&self, key: &[u8]) -> Option<&[Object]> {
        self.get(key)?.as_array()
    }

    /// Returns the bytes of the entry if it is a string.
    pub fn get_string(&self, key: &[u8]) -> Option<&[u8]> {
        self.get(key)?.as_string()
    }

    /// Checks whether the `Type` entry of the dictionary has the given value.
    pub fn has_type(&self, ty: &[u8]) -> bool {
        self.get_name(keys::TYPE).is_some_and(|n| &**n == ty)
    }
}

impl FromIterator<(Name, Object)> for Dict {
    fn from_iter<T: IntoIterator<Item = (Name, Object)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for Dict {
    type Item = (Name, Object);
    type IntoIter = btree_map::IntoIter<Name, Object>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a Dict {
    type Item = (&'a Name, &'a Object);
    type IntoIter = btree_map::Iter<'a, Name, Object>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Names of dictionary keys and values used throughout the workspace.
#[allow(missing_docs)]
pub mod keys {
    macro_rules! key {
        ($i:ident, $e:expr) => {
            pub const $i: &[u8] = $e;
        };
    }

    // A
    key!(A, b"A");
    key!(ACRO_FORM, b"AcroForm");
    key!(AESV2, b"AESV2");
    key!(AESV3, b"AESV3");
    key!(ANNOTS, b"Annots");
    key!(AP, b"AP");
    key!(AS, b"AS");
    key!(ASCII_HEX_DECODE, b"ASCIIHexDecode");
    key!(ASCII_HEX_DECODE_ABBREVIATION, b"AHx");
    key!(ASCII85_DECODE, b"ASCII85Decode");
    key!(ASCII85_DECODE_ABBREVIATION, b"A85");

    // B
    key!(BASE_FONT, b"BaseFont");
    key!(BBOX, b"BBox");
    key!(BC, b"BC");
    key!(BG, b"BG");
    key!(BITS_PER_COMPONENT, b"BitsPerComponent");
    key!(BM, b"BM");
    key!(BORDER, b"Border");
    key!(BS, b"BS");

    // C
    key!(C, b"C");
    key!(CA, b"CA");
    key!(CA_NS, b"ca");
    key!(CATALOG, b"Catalog");
    key!(CCITTFAX_DECODE, b"CCITTFaxDecode");
    key!(CCITTFAX_DECODE_ABBREVIATION, b"CCF");
    key!(CF, b"CF");
    key!(CFM, b"CFM");
    key!(CHAR_PROCS, b"CharProcs");
    key!(CIRCLE, b"Circle");
    key!(COLORS, b"Colors");
    key!(COLUMNS, b"Columns");
    key!(CONTENTS, b"Contents");
    key!(COUNT, b"Count");
    key!(CROP_BOX, b"CropBox");
    key!(CRYPT, b"Crypt");

    // D
    key!(D, b"D");
    key!(DA, b"DA");
    key!(DCT_DECODE, b"DCTDecode");
    key!(DCT_DECODE_ABBREVIATION, b"DCT");
    key!(DECODE_PARMS, b"DecodeParms");
    key!(DECODE_PARMS_ABBREVIATION, b"DP");
    key!(DL, b"DL");

    // E
    key!(EARLY_CHANGE, b"EarlyChange");
    key!(ENCODING, b"Encoding");
    key!(ENCRYPT, b"Encrypt");
    key!(ENCRYPT_META_DATA, b"EncryptMetadata");
    key!(EXT_G_STATE, b"ExtGState");

    // F
    key!(F, b"F");
    key!(FILTER, b"Filter");
    key!(FILTER_ABBREVIATION, b"F");
    key!(FIRST, b"First");
    key!(FLATE_DECODE, b"FlateDecode");
    key!(FLATE_DECODE_ABBREVIATION, b"Fl");
    key!(FONT, b"Font");
    key!(FONT_DESCRIPTOR, b"FontDescriptor");
    key!(FONT_FILE, b"FontFile");
    key!(FONT_FILE2, b"FontFile2");
    key!(FONT_FILE3, b"FontFile3");
    key!(FORM, b"Form");
    key!(FREE_TEXT, b"FreeText");

    // H
    key!(HIGHLIGHT, b"Highlight");

    // I
    key!(IC, b"IC");
    key!(ID, b"ID");
    key!(IDENTITY, b"Identity");
    key!(IMAGE, b"Image");
    key!(INDEX, b"Index");
    key!(INFO, b"Info");
    key!(INK, b"Ink");
    key!(INK_LIST, b"InkList");

    // J
    key!(JBIG2_DECODE, b"JBIG2Decode");
    key!(JPX_DECODE, b"JPXDecode");

    // K
    key!(KIDS, b"Kids");

    // L
    key!(L, b"L");
    key!(LANG, b"Lang");
    key!(LENGTH, b"Length");
    key!(LENGTH1, b"Length1");
    key!(LENGTH2, b"Length2");
    key!(LENGTH3, b"Length3");
    key!(LINE, b"Line");
    key!(LINK, b"Link");
    key!(LZW_DECODE, b"LZWDecode");
    key!(LZW_DECODE_ABBREVIATION, b"LZW");

    // M
    key!(MARK_INFO, b"MarkInfo");
    key!(MATRIX, b"Matrix");
    key!(MEDIA_BOX, b"MediaBox");
    key!(METADATA, b"Metadata");
    key!(MK, b"MK");
    key!(MULTIPLY, b"Multiply");

    // N
    key!(N, b"N");
    key!(NAME, b"Name");

    // O
    key!(O, b"O");
    key!(OBJ_STM, b"ObjStm");
    key!(OC_PROPERTIES, b"OCProperties");
    key!(OE, b"OE");

    // P
    key!(P, b"P");
    key!(PAGE, b"Page");
    key!(PAGE_LAYOUT, b"PageLayout");
    key!(PAGE_MODE, b"PageMode");
    key!(PAGES, b"Pages");
    key!(PARENT, b"Parent");
    key!(PERMS, b"Perms");
    key!(POLYGON, b"Polygon");
    key!(POLY_LINE, b"PolyLine");
    key!(POPUP, b"Popup");
    key!(PREDICTOR, b"Predictor");
    key!(PREV, b"Prev");

    // Q
    key!(QUAD_POINTS, b"QuadPoints");

    // R
    key!(R, b"R");
    key!(RECT, b"Rect");
    key!(RESOURCES, b"Resources");
    key!(ROOT, b"Root");
    key!(ROTATE, b"Rotate");
    key!(RUN_LENGTH_DECODE, b"RunLengthDecode");
    key!(RUN_LENGTH_DECODE_ABBREVIATION, b"RL");

    // S
    key!(S, b"S");
    key!(SIZE, b"Size");
    key!(SQUARE, b"Square");
    key!(SQUIGGLY, b"Squiggly");
    key!(STANDARD, b"Standard");
    key!(STD_CF, b"StdCF");
    key!(STM_F, b"StmF");
    key!(STR_F, b"StrF");
    key!(STRIKE_OUT, b"StrikeOut");
    key!(SUBTYPE, b"Subtype");

    // T
    key!(TEXT, b"Text");
    key!(TYPE, b"Type");
    key!(TYPE3, b"Type3");

    // U
    key!(U, b"U");
    key!(UE, b"UE");
    key!(UNDERLINE, b"Underline");

    // V
    key!(V, b"V");
    key!(V2, b"V2");
    key!(VERTICES, b"Vertices");
    key!(VIEWER_PREFERENCES, b"ViewerPreferences");

    // W
    key!(W, b"W");
    key!(WIDGET, b"Widget");

    // X
    key!(X_OBJECT, b"XObject");
    key!(XREF, b"XRef");
    key!(XREF_STM, b"XRefStm");
}
