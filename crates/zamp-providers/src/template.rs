//! Query template filling
//!
//! Templates reference parameters as `{{.name}}` (whitespace inside the braces
//! is allowed). Every tag must name a supplied parameter.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::collections::HashMap;
use zamp_query::{DataError, Result};

static TAG: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\{\{\s*\.([A-Za-z_][A-Za-z0-9_]*)\s*\}\}").expect("valid template tag pattern")
});

/// Substitute parameters into a query template
pub fn fill_template(template: &str, params: &HashMap<String, String>) -> Result<String> {
    let remainder = TAG.replace_all(template, "");
    if remainder.contains("{{") || remainder.contains("}}") {
        return Err(DataError::TemplateParsingFailed(format!(
            "malformed tag in template: {}",
            template
        )));
    }

    let mut missing = Vec::new();
    let filled = TAG.replace_all(template, |caps: &Captures| {
        let name = &caps[1];
        match params.get(name) {
            Some(value) => value.clone(),
            None => {
                missing.push(name.to_string());
                String::new()
            }
        }
    });

    if !missing.is_empty() {
        return Err(DataError::TemplateParsingFailed(format!(
            "no value for {}",
            missing.join(", ")
        )));
    }

    Ok(filled.into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use zamp_query::ErrorKind;

    fn params(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_fill() {
        let sql = fill_template(
            "SELECT * FROM {{.zamp_table_name_1}} WHERE region = '{{ .region }}'",
            &params(&[("zamp_table_name_1", "\"cat\".\"s\".\"t\""), ("region", "eu")]),
        )
        .unwrap();

        assert_eq!(sql, "SELECT * FROM \"cat\".\"s\".\"t\" WHERE region = 'eu'");
    }

    #[test]
    fn test_no_tags() {
        assert_eq!(
            fill_template("SELECT 1", &HashMap::new()).unwrap(),
            "SELECT 1"
        );
    }

    #[test]
    fn test_malformed_tag() {
        let err = fill_template("SELECT * FROM {{.table", &HashMap::new()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TemplateParsingFailed);

        let err = fill_template("SELECT * FROM {{table}}", &params(&[("table", "t")]))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TemplateParsingFailed);
    }

    #[test]
    fn test_missing_param() {
        let err = fill_template("SELECT * FROM {{.t}}", &HashMap::new()).unwrap_err();
        assert!(err.to_string().contains("no value for t"));
    }
}
