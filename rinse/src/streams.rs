//! Recoding stream payloads.

use crate::context::Context;
use crate::error::Diagnostic;
use crate::options::Settings;
use log::debug;
use rayon::prelude::*;
use rinse_syntax::filter::{self, FilterError};
use rinse_syntax::object::dict::keys::{
    ASCII_HEX_DECODE, FONT_FILE, FONT_FILE2, FONT_FILE3, IMAGE, LENGTH1, LENGTH2, LENGTH3,
    SUBTYPE,
};
use rinse_syntax::object::{Name, ObjRef, Object, Stream};
use rustc_hash::FxHashSet;

/// What a stream is used for, which decides whether it is compressed.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) enum Role {
    Font,
    Image,
    Metadata,
    Other,
}

/// The roles of all streams in a document, computed before the streams are recoded.
pub(crate) struct Roles {
    font_files: FxHashSet<ObjRef>,
    metadata: Option<ObjRef>,
}

impl Roles {
    pub(crate) fn new(ctx: &Context) -> Self {
        let mut font_files = FxHashSet::default();

        for object in ctx.doc.objects.values() {
            let Some(dict) = object.as_dict() else {
                continue;
            };

            for key in [FONT_FILE, FONT_FILE2, FONT_FILE3] {
                if let Some(id) = dict.get_ref(key) {
                    font_files.insert(id);
                }
            }
        }

        Self {
            font_files,
            metadata: ctx.preserved_metadata(),
        }
    }

    pub(crate) fn role(&self, id: ObjRef, stream: &Stream) -> Role {
        let dict = &stream.dict;

        if self.metadata == Some(id) {
            Role::Metadata
        } else if self.font_files.contains(&id)
            || [LENGTH1, LENGTH2, LENGTH3]
                .iter()
                .any(|key| dict.contains_key(key))
        {
            Role::Font
        } else if dict.get_name(SUBTYPE).is_some_and(|s| &**s == IMAGE) {
            Role::Image
        } else {
            Role::Other
        }
    }
}

/// Recode all streams according to the codec settings.
pub(crate) fn recode(ctx: &mut Context) {
    let settings = &ctx.settings;

    if !(settings.decompress
        || settings.compress
        || settings.compress_fonts
        || settings.compress_images
        || settings.ascii)
    {
        return;
    }

    let roles = Roles::new(ctx);
    let settings = &ctx.settings;

    let failures = ctx
        .doc
        .objects
        .par_iter_mut()
        .filter_map(|(id, object)| {
            let Object::Stream(stream) = object else {
                return None;
            };

            let role = roles.role(*id, stream);
            finish_stream(stream, role, settings)
                .err()
                .map(|err| (*id, err))
        })
        .collect::<Vec<_>>();

    debug!("recoded streams, {} could not be decoded", failures.len());

    for (object, err) in failures {
        ctx.diagnostics.push(Diagnostic::UnsupportedFilter {
            object,
            filter: err.filter_name().to_string(),
        });
    }
}

/// Bring a single stream into its final encoding.
///
/// If the filter chain can't be decoded, the stream is left unchanged.
pub(crate) fn finish_stream(
    stream: &mut Stream,
    role: Role,
    settings: &Settings,
) -> Result<(), FilterError> {
    if settings.decompress && stream.is_filtered() {
        let decoded = filter::decode_leading(stream)?;
        stream.data = decoded.data;
        stream.set_filters(decoded.remaining, decoded.remaining_params);
    }

    let compress = match role {
        Role::Font => settings.compress_fonts,
        Role::Image => settings.compress_images,
        Role::Metadata => false,
        Role::Other => settings.compress,
    };

    if compress && !stream.is_filtered() {
        stream.compress();
    }

    if settings.ascii && !is_ascii(&stream.data) {
        let mut filters = stream.filter_names();
        let mut params = stream.decode_params();
        filters.insert(0, Name::new(ASCII_HEX_DECODE));
        params.insert(0, None);

        stream.data = filter::ascii_hex_encode(&stream.data);
        stream.set_filters(filters, params);
    }

    stream.update_length();

    Ok(())
}

fn is_ascii(data: &[u8]) -> bool {
    data.iter()
        .all(|b| b.is_ascii_graphic() || b.is_ascii_whitespace())
}
