#![forbid(unsafe_code)]

//! Transition filter: which completed transitions warrant a refresh.
//!
//! Most transition-completion events are cosmetic (color, opacity) and
//! re-measuring on every one of them would be wasted work. The filter
//! passes only properties whose name suggests the element box could have
//! moved or changed size.

/// Property-name fragments treated as geometry-affecting.
///
/// Matching is substring, not exact: `min-width`, `border-top-width`, and
/// `font-size` must all trigger.
const GEOMETRY_FRAGMENTS: [&str; 8] = [
    "top", "right", "bottom", "left", "width", "height", "size", "weight",
];

/// Whether a completed transition on `property_name` could have changed
/// element geometry.
#[must_use]
pub fn affects_geometry(property_name: &str) -> bool {
    GEOMETRY_FRAGMENTS
        .iter()
        .any(|fragment| property_name.contains(fragment))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn geometry_properties_pass() {
        for property in [
            "width",
            "height",
            "top",
            "left",
            "right",
            "bottom",
            "min-width",
            "max-height",
            "border-top-width",
            "font-size",
            "font-weight",
            "padding-left",
        ] {
            assert!(affects_geometry(property), "{property} should pass");
        }
    }

    #[test]
    fn cosmetic_properties_are_filtered_out() {
        for property in ["color", "opacity", "background-color", "transform", "visibility"] {
            assert!(!affects_geometry(property), "{property} should be filtered");
        }
    }

    #[test]
    fn empty_name_is_filtered_out() {
        assert!(!affects_geometry(""));
    }
}
