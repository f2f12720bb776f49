//! Identifier case conversions shared by the resolver and the emitters.

/// Converts a snake_case or camelCase name to PascalCase.
pub fn to_pascal_case(s: &str) -> String {
    s.split(|c: char| c == '_' || c == '-' || c == '.')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                None => String::new(),
                Some(first) => first.to_uppercase().chain(chars).collect(),
            }
        })
        .collect()
}

/// Converts a PascalCase or camelCase name to snake_case.
pub fn to_snake_case(s: &str) -> String {
    let mut result = String::new();
    let mut prev_lower = false;
    for c in s.chars() {
        if c.is_uppercase() {
            if prev_lower {
                result.push('_');
            }
            result.extend(c.to_lowercase());
            prev_lower = false;
        } else {
            result.push(c);
            prev_lower = c.is_lowercase() || c.is_ascii_digit();
        }
    }
    result
}

/// Converts a name to camelCase.
pub fn to_camel_case(s: &str) -> String {
    let pascal = to_pascal_case(s);
    let mut chars = pascal.chars();
    match chars.next() {
        None => String::new(),
        Some(first) => first.to_lowercase().chain(chars).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_case_conversions() {
        assert_eq!(to_pascal_case("genome_id"), "GenomeId");
        assert_eq!(to_pascal_case("Genome"), "Genome");
        assert_eq!(to_pascal_case("myType"), "MyType");
        assert_eq!(to_snake_case("GenomeSet"), "genome_set");
        assert_eq!(to_snake_case("genome_id"), "genome_id");
        assert_eq!(to_snake_case("HTTPServer"), "httpserver");
        assert_eq!(to_camel_case("run_job"), "runJob");
    }

    #[test]
    fn test_pascal_case_is_lossy() {
        // Distinct IDL names can map onto one class name.
        assert_eq!(to_pascal_case("foo_bar"), to_pascal_case("FooBar"));
    }
}
