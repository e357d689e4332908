//! Qualified names
//!
//! Catalog, schema, table, column, domain, UDT and routine names are all
//! joined through [`format_qualified_name`] so they format identically.

/// Join the non-empty parts with `.`
///
/// Absent (`None`) and empty parts are skipped; no parts yields `""`.
pub fn format_qualified_name(parts: &[Option<&str>]) -> String {
    parts
        .iter()
        .filter_map(|part| part.filter(|p| !p.is_empty()))
        .collect::<Vec<_>>()
        .join(".")
}

/// Like [`format_qualified_name`], but `None` when every part is absent
pub fn format_optional_qualified_name(parts: &[Option<&str>]) -> Option<String> {
    let name = format_qualified_name(parts);
    if name.is_empty() {
        None
    } else {
        Some(name)
    }
}
