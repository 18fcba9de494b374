//! Display name and description resolution.
//!
//! Names fold modifiers by ascending priority, descriptions by descending
//! priority. Ties keep modifier order.
use crate::catalog::{CatalogError, ItemCatalog, ItemInstance};
use crate::modifiers::Modifier;

/// Display name of `item` after every name transform.
///
/// # Errors
///
/// Returns [`CatalogError::UnknownItem`] when the item's template is missing.
pub fn get_display_name(item: &ItemInstance, catalog: &ItemCatalog) -> Result<String, CatalogError> {
    let template = catalog.get(&item.catalog_id)?;
    let mut ordered: Vec<&Modifier> = item.modifiers.iter().collect();
    ordered.sort_by_key(|m| m.priority());
    Ok(ordered
        .into_iter()
        .fold(template.name.clone(), |name, modifier| {
            modifier.modify_name(&name).unwrap_or(name)
        }))
}

/// Display description of `item` after every description transform.
///
/// # Errors
///
/// Returns [`CatalogError::UnknownItem`] when the item's template is missing.
pub fn get_display_description(
    item: &ItemInstance,
    catalog: &ItemCatalog,
) -> Result<String, CatalogError> {
    let template = catalog.get(&item.catalog_id)?;
    let mut ordered: Vec<&Modifier> = item.modifiers.iter().collect();
    ordered.sort_by_key(|m| std::cmp::Reverse(m.priority()));
    Ok(ordered
        .into_iter()
        .fold(template.description.clone(), |description, modifier| {
            modifier
                .modify_description(&description)
                .unwrap_or(description)
        }))
}
