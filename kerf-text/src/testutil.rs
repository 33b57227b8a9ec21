//! Shared helpers for unit tests.

/// Locate any usable system font, or `None` on fontless machines — tests
/// that need real shaping skip themselves then.
pub(crate) fn load_test_font() -> Option<Vec<u8>> {
    use font_kit::family_name::FamilyName;
    use font_kit::handle::Handle;
    use font_kit::properties::Properties;
    use font_kit::source::SystemSource;

    let source = SystemSource::new();
    let handle = source
        .select_best_match(
            &[FamilyName::SansSerif, FamilyName::Serif, FamilyName::Monospace],
            &Properties::new(),
        )
        .ok()?;
    match handle {
        Handle::Path { path, .. } => std::fs::read(path).ok(),
        Handle::Memory { bytes, .. } => Some(bytes.to_vec()),
    }
}
