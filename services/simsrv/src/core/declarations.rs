//! Variable Declaration Loading
//!
//! Parses tab-separated declaration files into [`SimVariable`] entries. A
//! declaration row names a variable and its type tag; a type tag may carry
//! an inclusive `[low..high]` range suffix that expands into one entry per
//! element, e.g. `Alarms` with `BOOL[0..3]` becomes `Alarms[0]` through
//! `Alarms[3]`. Plain bracket sizes such as `STRING[20]` are type tags,
//! not ranges.

use crate::core::variable::SimVariable;
use crate::utils::error::{ErrorExt, Result, SimSrvError};
use csv::ReaderBuilder;
use std::path::Path;
use tracing::debug;

/// A type token split into its tag and optional element range.
#[derive(Debug, Clone, PartialEq, Eq)]
struct TypeToken {
    tag: String,
    range: Option<(i64, i64)>,
}

/// Split a declaration type token.
///
/// A bracket group containing `..` is an element range; any other token,
/// brackets included, is the type tag itself.
fn parse_type_token(token: &str) -> Result<TypeToken> {
    let Some(open) = token.find('[') else {
        return Ok(TypeToken {
            tag: token.trim().to_string(),
            range: None,
        });
    };

    let Some(close) = token[open..].find(']').map(|rel| open + rel) else {
        if token[open..].contains("..") {
            return Err(SimSrvError::DeclarationError(format!(
                "Unterminated range in type token '{token}'"
            )));
        }
        return Ok(TypeToken {
            tag: token.trim().to_string(),
            range: None,
        });
    };

    let inner = &token[open + 1..close];
    let Some((low_text, high_text)) = inner.split_once("..") else {
        // Bracket carries a size, e.g. STRING[20]
        return Ok(TypeToken {
            tag: token.trim().to_string(),
            range: None,
        });
    };

    let low: i64 = low_text.trim().parse().map_err(|_| {
        SimSrvError::DeclarationError(format!("Bad range start in type token '{token}'"))
    })?;
    let high: i64 = high_text.trim().parse().map_err(|_| {
        SimSrvError::DeclarationError(format!("Bad range end in type token '{token}'"))
    })?;
    if low > high {
        return Err(SimSrvError::DeclarationError(format!(
            "Inverted range {low}..{high} in type token '{token}'"
        )));
    }

    Ok(TypeToken {
        tag: token[..open].trim().to_string(),
        range: Some((low, high)),
    })
}

/// Parse tab-separated declaration content into variables.
///
/// The first row is a header. Rows with fewer than two fields or an empty
/// name are skipped; a malformed range fails the whole parse.
pub fn parse_declarations(content: &str) -> Result<Vec<SimVariable>> {
    let mut reader = ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(true)
        .flexible(true) // Allow variable number of fields
        .from_reader(content.as_bytes());

    let mut variables = Vec::new();

    for result in reader.records() {
        let record = result.declaration_error("Failed to parse declaration row")?;

        if record.len() < 2 {
            continue; // Skip invalid rows
        }

        let name = record.get(0).unwrap_or("").trim();
        if name.is_empty() {
            continue;
        }

        let token = parse_type_token(record.get(1).unwrap_or("").trim())?;
        let type_text = (!token.tag.is_empty()).then(|| token.tag.clone());

        match token.range {
            Some((low, high)) => {
                for index in low..=high {
                    let mut var = SimVariable::new(format!("{name}[{index}]"));
                    var.type_text = type_text.clone();
                    var.low_index = Some(low);
                    var.high_index = Some(high);
                    variables.push(var);
                }
            }
            None => {
                let mut var = SimVariable::new(name);
                var.type_text = type_text;
                variables.push(var);
            }
        }
    }

    debug!(count = variables.len(), "Parsed variable declarations");
    Ok(variables)
}

/// Load and parse a declaration file.
pub async fn load_declaration_file(path: impl AsRef<Path>) -> Result<Vec<SimVariable>> {
    let path = path.as_ref();
    let content = tokio::fs::read_to_string(path)
        .await
        .declaration_error(&format!(
            "Failed to read declaration file: {}",
            path.display()
        ))?;
    parse_declarations(&content)
}

#[cfg(test)]
mod tests {
    use super::*;

    // ===== Phase 1: Type token parsing =====

    #[test]
    fn test_plain_type_token() {
        let token = parse_type_token("INT").unwrap();
        assert_eq!(token.tag, "INT");
        assert!(token.range.is_none());
    }

    #[test]
    fn test_string_size_is_not_a_range() {
        let token = parse_type_token("STRING[20]").unwrap();
        assert_eq!(token.tag, "STRING[20]");
        assert!(token.range.is_none());
    }

    #[test]
    fn test_range_token() {
        let token = parse_type_token("BOOL[0..3]").unwrap();
        assert_eq!(token.tag, "BOOL");
        assert_eq!(token.range, Some((0, 3)));
    }

    #[test]
    fn test_range_token_with_negative_bounds() {
        let token = parse_type_token("INT[-2..2]").unwrap();
        assert_eq!(token.tag, "INT");
        assert_eq!(token.range, Some((-2, 2)));
    }

    #[test]
    fn test_malformed_ranges_are_errors() {
        assert!(matches!(
            parse_type_token("INT[3..0]"),
            Err(SimSrvError::DeclarationError(_))
        ));
        assert!(matches!(
            parse_type_token("INT[a..b]"),
            Err(SimSrvError::DeclarationError(_))
        ));
        assert!(matches!(
            parse_type_token("INT[0..5"),
            Err(SimSrvError::DeclarationError(_))
        ));
    }

    // ===== Phase 2: Row parsing =====

    #[test]
    fn test_parse_basic_declarations() {
        let content = "Name\tType\nMotor.Speed\tINT\nStatus.Text\tSTRING[20]\n";
        let variables = parse_declarations(content).unwrap();

        assert_eq!(variables.len(), 2);
        assert_eq!(variables[0].name, "Motor.Speed");
        assert_eq!(variables[0].type_text.as_deref(), Some("INT"));
        assert_eq!(variables[1].name, "Status.Text");
        assert_eq!(variables[1].type_text.as_deref(), Some("STRING[20]"));
    }

    #[test]
    fn test_range_declaration_expands_per_element() {
        let content = "Name\tType\nAlarms\tBOOL[0..3]\n";
        let variables = parse_declarations(content).unwrap();

        assert_eq!(variables.len(), 4);
        assert_eq!(variables[0].name, "Alarms[0]");
        assert_eq!(variables[3].name, "Alarms[3]");
        for var in &variables {
            assert_eq!(var.type_text.as_deref(), Some("BOOL"));
            assert_eq!(var.low_index, Some(0));
            assert_eq!(var.high_index, Some(3));
        }
    }

    #[test]
    fn test_short_and_nameless_rows_are_skipped() {
        let content = "Name\tType\n\nMotor.Speed\tINT\nlonely\n\tINT\n";
        let variables = parse_declarations(content).unwrap();

        assert_eq!(variables.len(), 1);
        assert_eq!(variables[0].name, "Motor.Speed");
    }

    #[test]
    fn test_extra_fields_are_ignored() {
        let content = "Name\tType\tComment\nMotor.Speed\tINT\tspindle speed\n";
        let variables = parse_declarations(content).unwrap();

        assert_eq!(variables.len(), 1);
        assert_eq!(variables[0].type_text.as_deref(), Some("INT"));
    }

    #[test]
    fn test_empty_type_field_stays_undeclared() {
        let content = "Name\tType\nMystery\t\n";
        let variables = parse_declarations(content).unwrap();

        assert_eq!(variables.len(), 1);
        assert!(variables[0].type_text.is_none());
    }

    #[test]
    fn test_malformed_range_fails_the_parse() {
        let content = "Name\tType\nAlarms\tBOOL[3..0]\n";
        assert!(matches!(
            parse_declarations(content),
            Err(SimSrvError::DeclarationError(_))
        ));
    }

    // ===== Phase 3: File loading =====

    #[tokio::test]
    async fn test_load_declaration_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("variables.tsv");
        tokio::fs::write(&path, "Name\tType\nMotor.Speed\tINT\n")
            .await
            .unwrap();

        let variables = load_declaration_file(&path).await.unwrap();
        assert_eq!(variables.len(), 1);
        assert_eq!(variables[0].name, "Motor.Speed");
    }

    #[tokio::test]
    async fn test_load_missing_file_is_declaration_error() {
        let err = load_declaration_file("/nonexistent/variables.tsv")
            .await
            .unwrap_err();
        assert!(matches!(err, SimSrvError::DeclarationError(_)));
    }
}
