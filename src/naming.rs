//! Field-name normalization
//!
//! Grammars name their fields in snake case (`ihdr_len`, `bit_depth`);
//! documents use lower camel case (`ihdrLen`, `bitDepth`).

/// Convert a snake-case identifier to lower camel case.
///
/// The first segment keeps its casing apart from a lowercased first
/// character, later segments get an uppercased first character. Humps
/// already present inside a segment are left alone, which makes the
/// conversion idempotent: `fooBar_baz` and `fooBarBaz` both map to
/// `fooBarBaz`.
pub fn to_lower_camel_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for segment in name.split('_').filter(|s| !s.is_empty()) {
        let mut chars = segment.chars();
        if let Some(first) = chars.next() {
            if out.is_empty() {
                out.extend(first.to_lowercase());
            } else {
                out.extend(first.to_uppercase());
            }
            out.push_str(chars.as_str());
        }
    }
    out
}

/// Upper camel case as used for format titles.
///
/// Unlike [`to_lower_camel_case`] this lowercases the tail of each
/// segment, so `PNG_file` becomes `PngFile`.
pub fn to_camel_case(name: &str) -> String {
    name.to_lowercase()
        .split('_')
        .map(|segment| {
            let mut chars = segment.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lower_camel_case() {
        assert_eq!(to_lower_camel_case("width"), "width");
        assert_eq!(to_lower_camel_case("bit_depth"), "bitDepth");
        assert_eq!(to_lower_camel_case("ihdr_len"), "ihdrLen");
        assert_eq!(to_lower_camel_case("Color_type"), "colorType");
        assert_eq!(to_lower_camel_case("a_1b"), "a1b");
    }

    #[test]
    fn test_lower_camel_case_keeps_humps() {
        assert_eq!(to_lower_camel_case("fooBar_baz"), "fooBarBaz");
        assert_eq!(to_lower_camel_case("IHDR_crc"), "iHDRCrc");
    }

    #[test]
    fn test_lower_camel_case_stray_underscores() {
        assert_eq!(to_lower_camel_case("__foo"), "foo");
        assert_eq!(to_lower_camel_case("foo__bar_"), "fooBar");
        assert_eq!(to_lower_camel_case(""), "");
        assert_eq!(to_lower_camel_case("___"), "");
    }

    #[test]
    fn test_lower_camel_case_idempotent() {
        let names = [
            "width",
            "bit_depth",
            "compression_method_x",
            "IHDR_crc",
            "fooBar_baz",
            "_private_field",
            "a__b__c",
            "x_1_y_2",
        ];
        for name in names {
            let once = to_lower_camel_case(name);
            assert_eq!(to_lower_camel_case(&once), once, "not idempotent for {name}");
        }
    }

    #[test]
    fn test_camel_case() {
        assert_eq!(to_camel_case("png_file"), "PngFile");
        assert_eq!(to_camel_case("PNG_file"), "PngFile");
        assert_eq!(to_camel_case("Portable Network Graphics"), "Portable network graphics");
    }
}
