//! Quote-aware CSV line splitting shared by ingest and the archive clients.

/// Split a CSV line respecting quoted fields (handles commas inside quotes).
/// Returns owned strings because quoted fields need unquoting.
pub fn csv_split(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '"' => {
                if in_quotes {
                    // Check for escaped quote ("")
                    if chars.peek() == Some(&'"') {
                        current.push('"');
                        chars.next();
                    } else {
                        in_quotes = false;
                    }
                } else {
                    in_quotes = true;
                }
            }
            ',' if !in_quotes => {
                fields.push(current.clone());
                current.clear();
            }
            _ => current.push(ch),
        }
    }
    fields.push(current);
    fields
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_split() {
        assert_eq!(csv_split("a,b,c"), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_quoted_comma() {
        assert_eq!(
            csv_split(r#"636017000,"OCEAN, STAR",LR"#),
            vec!["636017000", "OCEAN, STAR", "LR"]
        );
    }

    #[test]
    fn test_escaped_quote() {
        assert_eq!(csv_split(r#""say ""hi""",x"#), vec![r#"say "hi""#, "x"]);
    }

    #[test]
    fn test_trailing_empty_field() {
        assert_eq!(csv_split("a,b,"), vec!["a", "b", ""]);
    }
}
