//! Rewriting of `%(name)s` placeholders into driver-native positional markers.

use featureserver_core::Value;

use crate::connection::{Params, StoreError, UNDEFINED_PARAMETER};

const MALFORMED_PLACEHOLDER: &str = "42601";

/// A statement rewritten for a positional driver.
#[derive(Debug, Clone, PartialEq)]
pub struct PositionalStatement {
    /// SQL with positional markers.
    pub sql: String,
    /// Values in marker order.
    pub values: Vec<Value>,
}

/// Replace each `%(name)s` in `sql` with `marker(position)`.
///
/// Positions are one-based and assigned on first use, so a name repeated in
/// the statement reuses its marker. `%%` collapses to a literal `%`.
///
/// # Errors
/// Returns an [`UNDEFINED_PARAMETER`] error for a name missing from
/// `params`, and a syntax error for an unterminated placeholder.
///
/// # Examples
/// ```
/// use featureserver_core::Value;
/// use featureserver_store::{Params, placeholder::bind_positional};
///
/// let mut params = Params::new();
/// params.bind("a", 1);
/// let rewritten = bind_positional("x = %(a)s OR y = %(a)s", &params, |n| format!("?{n}"))?;
/// assert_eq!(rewritten.sql, "x = ?1 OR y = ?1");
/// assert_eq!(rewritten.values, vec![Value::Integer(1)]);
/// # Ok::<(), featureserver_store::StoreError>(())
/// ```
pub fn bind_positional(
    sql: &str,
    params: &Params,
    marker: impl Fn(usize) -> String,
) -> Result<PositionalStatement, StoreError> {
    let mut text = String::with_capacity(sql.len());
    let mut names: Vec<String> = Vec::new();
    let mut values = Vec::new();
    let mut chars = sql.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch != '%' {
            text.push(ch);
            continue;
        }
        match chars.peek() {
            Some('%') => {
                chars.next();
                text.push('%');
            }
            Some('(') => {
                chars.next();
                let name: String = chars.by_ref().take_while(|c| *c != ')').collect();
                if chars.next() != Some('s') {
                    return Err(StoreError::with_code(
                        MALFORMED_PLACEHOLDER,
                        format!("malformed placeholder for parameter {name:?}"),
                    ));
                }
                if let Some(index) = names.iter().position(|n| *n == name) {
                    text.push_str(&marker(index + 1));
                    continue;
                }
                let value = params.get(&name).ok_or_else(|| {
                    StoreError::with_code(
                        UNDEFINED_PARAMETER,
                        format!("no value bound for parameter {name:?}"),
                    )
                })?;
                values.push(value.clone());
                names.push(name);
                text.push_str(&marker(names.len()));
            }
            _ => text.push('%'),
        }
    }

    Ok(PositionalStatement { sql: text, values })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn numbered(position: usize) -> String {
        format!("${position}")
    }

    #[rstest]
    fn numbers_placeholders_in_first_use_order() {
        let mut params = Params::new();
        params.bind("b", 2);
        params.bind("a", "x");
        let rewritten =
            bind_positional("a = %(a)s AND b > %(b)s", &params, numbered).expect("bound");
        assert_eq!(rewritten.sql, "a = $1 AND b > $2");
        assert_eq!(rewritten.values, vec![Value::from("x"), Value::Integer(2)]);
    }

    #[rstest]
    fn keeps_literal_percent_signs() {
        let rewritten = bind_positional("name LIKE 'a%%' OR name LIKE '%b'", &Params::new(), numbered)
            .expect("no placeholders");
        assert_eq!(rewritten.sql, "name LIKE 'a%' OR name LIKE '%b'");
        assert!(rewritten.values.is_empty());
    }

    #[rstest]
    fn rejects_unbound_names() {
        let err = bind_positional("gid = %(fs_fid)s", &Params::new(), numbered)
            .expect_err("missing binding");
        assert_eq!(err.code.as_deref(), Some(UNDEFINED_PARAMETER));
    }

    #[rstest]
    fn rejects_unterminated_placeholders() {
        let mut params = Params::new();
        params.bind("a", 1);
        let err = bind_positional("x = %(a", &params, numbered).expect_err("unterminated");
        assert_eq!(err.code.as_deref(), Some(MALFORMED_PLACEHOLDER));
    }
}
