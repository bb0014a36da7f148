//! Reducing a document to a subset of its pages.

use crate::context::Context;
use crate::error::{Error, Result};
use log::debug;
use rinse_syntax::object::dict::keys::{
    COUNT, KIDS, LANG, MARK_INFO, METADATA, OC_PROPERTIES, PAGE_LAYOUT, PAGE_MODE, PAGES,
    PARENT, TYPE, VIEWER_PREFERENCES,
};
use rinse_syntax::object::{Dict, Name, Object};
use rustc_hash::FxHashSet;

// Catalog entries that can't point at removed pages.
const KEPT_CATALOG_ENTRIES: [&[u8]; 8] = [
    TYPE,
    PAGES,
    LANG,
    VIEWER_PREFERENCES,
    PAGE_LAYOUT,
    PAGE_MODE,
    MARK_INFO,
    OC_PROPERTIES,
];

/// Check that all 1-based page indices exist in a document with `count` pages.
pub(crate) fn check_range(pages: &[usize], count: usize) -> Result<()> {
    match pages.iter().find(|p| **p == 0 || **p > count) {
        Some(page) => Err(Error::PageRange { page: *page, count }),
        None => Ok(()),
    }
}

/// Rewrite the page tree so that it consists of exactly the requested pages.
pub(crate) fn select_pages(ctx: &mut Context) -> Result<()> {
    let Some(selection) = ctx.settings.pages.clone() else {
        return Ok(());
    };

    let doc = &mut ctx.doc;
    let tree = doc.page_tree();
    check_range(&selection, tree.len())?;

    let root = doc
        .pages_ref()
        .ok_or_else(|| Error::MalformedDocument("the page tree has no root".to_string()))?;

    let mut used = FxHashSet::default();
    let mut kids = Vec::with_capacity(selection.len());

    for index in &selection {
        let entry = &tree[index - 1];

        if used.insert(entry.page) {
            // Make the inherited attributes explicit, because the former ancestors are
            // detached.
            if let Some(page) = doc.get_mut(entry.page).and_then(Object::as_dict_mut) {
                for (key, value) in entry.inherited.iter() {
                    page.insert(key.clone(), value.clone());
                }

                page.insert(PARENT, root);
            }

            kids.push(Object::Ref(entry.page));
        } else {
            // A page object can only have one parent, so repeated pages become copies.
            let copy = match doc.resolve_ref(entry.page) {
                Object::Dict(page) => page.clone(),
                _ => continue,
            };

            let id = doc.add_object(copy);
            kids.push(Object::Ref(id));
        }
    }

    let mut node = Dict::new();
    node.insert(TYPE, Name::new(PAGES));
    node.insert(COUNT, kids.len() as i64);
    node.insert(KIDS, kids);
    doc.insert(root, node);

    let preserve_metadata = ctx.settings.preserve_metadata;
    if let Some(catalog_ref) = doc.catalog_ref()
        && let Some(catalog) = doc.get_mut(catalog_ref).and_then(Object::as_dict_mut)
    {
        catalog.retain(|key, _| {
            KEPT_CATALOG_ENTRIES.contains(&&**key) || (preserve_metadata && &**key == METADATA)
        });
    }

    debug!("selected {} of {} pages", selection.len(), tree.len());

    Ok(())
}
