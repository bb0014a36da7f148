//! Setting up and applying the output encryption.

use crate::context::Context;
use crate::options::EncryptionMethod;
use log::debug;
use rayon::prelude::*;
use rinse_syntax::Document;
use rinse_syntax::crypto::SecurityHandler;
use rinse_syntax::object::dict::keys::{ENCRYPT, ID};
use rinse_syntax::object::{Object, PdfString};
use rinse_write::ObjectStreamPlan;

/// Encrypt all objects for the output, returning the security handler the writer needs.
///
/// Objects placed in an object stream by `plan` are not encrypted individually, as the writer
/// encrypts their container as a whole.
pub(crate) fn encrypt(
    ctx: &mut Context,
    plan: Option<&ObjectStreamPlan>,
) -> Option<SecurityHandler> {
    let settings = &ctx.settings;
    let doc = &mut ctx.doc;

    let handler = match (settings.encryption, settings.encryption.algorithm()) {
        (EncryptionMethod::Keep, _) => {
            let handler = doc.security.clone()?;
            restore_id(doc, handler.file_id());
            handler
        }
        (_, None) => return None,
        (_, Some(algorithm)) => {
            let id = ensure_id(doc);

            SecurityHandler::create(
                algorithm,
                &settings.owner_password,
                &settings.user_password,
                settings.permissions,
                &id,
            )
        }
    };

    let encrypt_ref = doc.add_object(handler.dict().clone());
    doc.trailer.insert(ENCRYPT, encrypt_ref);

    doc.objects
        .par_iter_mut()
        .filter(|(id, _)| **id != encrypt_ref && !plan.is_some_and(|p| p.contains(**id)))
        .for_each(|(id, object)| handler.encrypt_object(*id, object));

    debug!(
        "encrypted the document with revision {} of the standard security handler",
        handler.revision()
    );

    Some(handler)
}

/// Make sure the trailer has a file identifier, returning its first element.
fn ensure_id(doc: &mut Document) -> Vec<u8> {
    if let Some(first) = doc
        .trailer
        .get_array(ID)
        .filter(|id| id.len() == 2)
        .and_then(|id| id[0].as_string())
    {
        return first.to_vec();
    }

    let mut seed = rand::random::<[u8; 16]>().to_vec();
    seed.extend_from_slice(&(doc.objects.len() as u64).to_le_bytes());
    let id = md5::compute(&seed).0.to_vec();

    doc.trailer.insert(
        ID,
        vec![
            Object::from(PdfString::new_hex(id.clone())),
            Object::from(PdfString::new_hex(id.clone())),
        ],
    );

    id
}

/// Write back the file identifier a kept handler derived its key from.
fn restore_id(doc: &mut Document, file_id: &[u8]) {
    let current = doc
        .trailer
        .get_array(ID)
        .and_then(|id| id.first())
        .and_then(Object::as_string);

    if current == Some(file_id) {
        return;
    }

    if file_id.is_empty() {
        doc.trailer.remove(ID);
    } else {
        let id = Object::from(PdfString::new_hex(file_id.to_vec()));
        doc.trailer.insert(ID, vec![id.clone(), id]);
    }
}
