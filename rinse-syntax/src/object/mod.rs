//! The owned PDF object model.

pub mod dict;
mod name;
mod number;
mod r#ref;
mod stream;
mod string;

pub use dict::Dict;
pub use name::Name;
pub use number::Number;
pub use r#ref::ObjRef;
pub use stream::Stream;
pub use string::PdfString;

/// A PDF object.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub enum Object {
    /// The null object.
    #[default]
    Null,
    /// A boolean.
    Boolean(bool),
    /// A number.
    Number(Number),
    /// A string.
    String(PdfString),
    /// A name.
    Name(Name),
    /// An array.
    Array(Vec<Object>),
    /// A dictionary.
    Dict(Dict),
    /// A stream.
    Stream(Stream),
    /// A reference to an indirect object.
    Ref(ObjRef),
}

impl Object {
    /// Whether the object is the null object.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Returns the boolean value, if the object is a boolean.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Returns the integer value, if the object is an integral number.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Number(n) => n.as_i64(),
            _ => None,
        }
    }

    /// Returns the numeric value, if the object is a number.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(n.as_f64()),
            _ => None,
        }
    }

    /// Returns the bytes, if the object is a string.
    pub fn as_string(&self) -> Option<&[u8]> {
        match self {
            Self::String(s) => Some(s.as_bytes()),
            _ => None,
        }
    }

    /// Returns the name, if the object is a name.
    pub fn as_name(&self) -> Option<&Name> {
        match self {
            Self::Name(n) => Some(n),
            _ => None,
        }
    }

    /// Returns the elements, if the object is an array.
    pub fn as_array(&self) -> Option<&[Self]> {
        match self {
            Self::Array(a) => Some(a),
            _ => None,
        }
    }

    /// Returns the elements mutably, if the object is an array.
    pub fn as_array_mut(&mut self) -> Option<&mut Vec<Self>> {
        match self {
            Self::Array(a) => Some(a),
            _ => None,
        }
    }

    /// Returns the dictionary, if the object is a dictionary or a stream.
    pub fn as_dict(&self) -> Option<&Dict> {
        match self {
            Self::Dict(d) => Some(d),
            Self::Stream(s) => Some(&s.dict),
            _ => None,
        }
    }

    /// Returns the dictionary mutably, if the object is a dictionary or a stream.
    pub fn as_dict_mut(&mut self) -> Option<&mut Dict> {
        match self {
            Self::Dict(d) => Some(d),
            Self::Stream(s) => Some(&mut s.dict),
            _ => None,
        }
    }

    /// Returns the stream, if the object is a stream.
    pub fn as_stream(&self) -> Option<&Stream> {
        match self {
            Self::Stream(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the stream mutably, if the object is a stream.
    pub fn as_stream_mut(&mut self) -> Option<&mut Stream> {
        match self {
            Self::Stream(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the reference, if the object is a reference.
    pub fn as_obj_ref(&self) -> Option<ObjRef> {
        match self {
            Self::Ref(r) => Some(*r),
            _ => None,
        }
    }

    /// Call `f` for every reference contained in the object, recursively.
    pub fn for_each_ref(&self, f: &mut impl FnMut(ObjRef)) {
        match self {
            Self::Ref(r) => f(*r),
            Self::Array(a) => a.iter().for_each(|o| o.for_each_ref(f)),
            Self::Dict(d) => d.iter().for_each(|(_, o)| o.for_each_ref(f)),
            Self::Stream(s) => s.dict.iter().for_each(|(_, o)| o.for_each_ref(f)),
            _ => {}
        }
    }

    /// Rewrite every reference contained in the object, recursively.
    ///
    /// References for which `f` returns `None` are replaced with the null object.
    pub fn remap_refs(&mut self, f: &impl Fn(ObjRef) -> Option<ObjRef>) {
        match self {
            Self::Ref(r) => match f(*r) {
                Some(new) => *r = new,
                None => *self = Self::Null,
            },
            Self::Array(a) => a.iter_mut().for_each(|o| o.remap_refs(f)),
            Self::Dict(d) => d.iter_mut().for_each(|(_, o)| o.remap_refs(f)),
            Self::Stream(s) => s.dict.iter_mut().for_each(|(_, o)| o.remap_refs(f)),
            _ => {}
        }
    }

    /// Call `f` for every string contained in the object, recursively.
    pub fn for_each_string_mut(&mut self, f: &mut impl FnMut(&mut PdfString)) {
        match self {
            Self::String(s) => f(s),
            Self::Array(a) => a.iter_mut().for_each(|o| o.for_each_string_mut(f)),
            Self::Dict(d) => d.iter_mut().for_each(|(_, o)| o.for_each_string_mut(f)),
            Self::Stream(s) => s
                .dict
                .iter_mut()
                .for_each(|(_, o)| o.for_each_string_mut(f)),
            _ => {}
        }
    }
}

impl From<bool> for Object {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

impl From<i64> for Object {
    fn from(value: i64) -> Self {
        Self::Number(Number::Integer(value))
    }
}

impl From<i32> for Object {
    fn from(value: i32) -> Self {
        Self::Number(Number::Integer(i64::from(value)))
    }
}

impl From<f64> for Object {
    fn from(value: f64) -> Self {
        Self::Number(Number::Real(value))
    }
}

impl From<Number> for Object {
    fn from(value: Number) -> Self {
        Self::Number(value)
    }
}

impl From<PdfString> for Object {
    fn from(value: PdfString) -> Self {
        Self::String(value)
    }
}

impl From<Name> for Object {
    fn from(value: Name) -> Self {
        Self::Name(value)
    }
}

impl From<Vec<Self>> for Object {
    fn from(value: Vec<Self>) -> Self {
        Self::Array(value)
    }
}

impl From<Dict> for Object {
    fn from(value: Dict) -> Self {
        Self::Dict(value)
    }
}

impl From<Stream> for Object {
    fn from(value: Stream) -> Self {
        Self::Stream(value)
    }
}

impl From<ObjRef> for Object {
    fn from(value: ObjRef) -> Self {
        Self::Ref(value)
    }
}
