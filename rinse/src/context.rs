use crate::error::Diagnostics;
use crate::options::Settings;
use rinse_syntax::Document;
use rinse_syntax::object::ObjRef;
use rinse_syntax::object::dict::keys::METADATA;

/// The state threaded through all cleaning stages.
pub(crate) struct Context {
    pub(crate) doc: Document,
    pub(crate) settings: Settings,
    pub(crate) diagnostics: Diagnostics,
}

impl Context {
    pub(crate) fn new(doc: Document, settings: Settings) -> Self {
        Self {
            doc,
            settings,
            diagnostics: Diagnostics::default(),
        }
    }

    /// The catalog's metadata stream, if it is preserved.
    pub(crate) fn preserved_metadata(&self) -> Option<ObjRef> {
        if !self.settings.preserve_metadata {
            return None;
        }

        self.doc.catalog()?.get_ref(METADATA)
    }
}
