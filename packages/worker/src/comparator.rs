use common::Value;

/// Default absolute tolerance for numeric comparison.
pub const DEFAULT_TOLERANCE: f64 = 1e-6;

/// Decide pass/fail for a produced value against the expected value.
///
/// If both sides are numeric sequences of equal length, they compare
/// element-wise within an absolute tolerance; a single differing element
/// fails the case, and a length mismatch is a fail, never an error.
/// Everything else falls back to exact equality of canonical forms. Many
/// problems are numeric (tolerance needed) while others are exact, hence the
/// dual policy.
pub fn outputs_match(actual: &Value, expected: &Value, tolerance: f64) -> bool {
    if let (Some(lhs), Some(rhs)) = (actual.as_numeric_sequence(), expected.as_numeric_sequence())
    {
        return lhs.len() == rhs.len()
            && lhs.iter().zip(&rhs).all(|(a, b)| (a - b).abs() <= tolerance);
    }
    actual.to_string() == expected.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compare(actual: &str, expected: &str) -> bool {
        let actual = Value::parse(actual).into_comparison_form();
        let expected = Value::parse(expected).into_comparison_form();
        outputs_match(&actual, &expected, DEFAULT_TOLERANCE)
    }

    #[test]
    fn test_numeric_within_tolerance() {
        assert!(compare("[1.0000005, 2]", "[1, 2]"));
        assert!(compare("[1, 2, 3]", "[1, 2, 3]"));
    }

    #[test]
    fn test_numeric_outside_tolerance() {
        // One differing element fails the whole case.
        assert!(!compare("[1.00001, 2]", "[1, 2]"));
        assert!(!compare("[1, 2, 3.1]", "[1, 2, 3]"));
    }

    #[test]
    fn test_length_mismatch_fails() {
        assert!(!compare("[1, 2]", "[1, 2, 3]"));
        assert!(!compare("[]", "[1]"));
    }

    #[test]
    fn test_scalar_against_scalar() {
        // A produced 5 against the stored text "5".
        assert!(compare("5", "5"));
        assert!(compare("5.0000001", "5"));
        assert!(!compare("6", "5"));
    }

    #[test]
    fn test_non_numeric_exact() {
        assert!(compare("\"abc\"", "'abc'"));
        assert!(!compare("\"abc\"", "\"abd\""));
        assert!(compare("[\"a\", \"b\"]", "['a', 'b']"));
    }

    #[test]
    fn test_mixed_shapes_fall_back_to_canonical() {
        // A numeric and a textual sequence never tolerance-compare.
        assert!(!compare("[1, 2]", "[\"1\", \"x\"]"));
        // But numerals parsed from different encodings agree canonically.
        assert!(compare("[1, \"a\"]", "[1.0, 'a']"));
    }

    #[test]
    fn test_mappings_compare_canonically() {
        assert!(compare("{'a': 1, 'b': 2}", "{\"b\": 2, \"a\": 1}"));
        assert!(!compare("{'a': 1}", "{'a': 2}"));
    }
}
