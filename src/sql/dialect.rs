use std::fmt::Debug;
use std::sync::LazyLock;

use regex::Regex;

use super::errors::DialectError;

/// Engine-specific SQL capabilities.
///
/// The rest of the crate never branches on which engine it is talking to;
/// anything that differs between engines goes through this trait.
pub trait Dialect: Debug + Send + Sync {
    fn name(&self) -> &'static str;

    /// Quote an identifier, escaping embedded quote characters.
    fn quote_identifier(&self, ident: &str) -> String;

    /// Quote a string literal.
    fn string_literal(&self, value: &str) -> String {
        format!("'{}'", value.replace('\'', "''"))
    }

    /// Translate generic SQL into this dialect.
    fn translate(&self, generic_sql: &str) -> Result<String, DialectError>;

    /// Statement materializing `select_sql` as `quoted_table`.
    fn create_table_as(&self, quoted_table: &str, select_sql: &str) -> String {
        format!("CREATE TABLE {} AS {}", quoted_table, select_sql)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Segment<'a> {
    Code(&'a str),
    Literal(&'a str),
    QuotedIdentifier(&'a str),
}

/// Split SQL into code, string literals and quoted identifiers so rewrites
/// never touch the inside of a literal.
fn segments(sql: &str) -> Result<Vec<Segment<'_>>, DialectError> {
    let bytes = sql.as_bytes();
    let mut out = Vec::new();
    let mut code_start = 0;
    let mut i = 0;

    while i < bytes.len() {
        let quote = bytes[i];
        if quote != b'\'' && quote != b'"' && quote != b'`' {
            i += 1;
            continue;
        }
        if code_start < i {
            out.push(Segment::Code(&sql[code_start..i]));
        }
        let start = i;
        i += 1;
        loop {
            if i >= bytes.len() {
                return Err(if quote == b'\'' {
                    DialectError::UnterminatedLiteral(start)
                } else {
                    DialectError::UnterminatedIdentifier(start)
                });
            }
            if bytes[i] == quote {
                // Doubled quote is an escaped quote
                if i + 1 < bytes.len() && bytes[i + 1] == quote {
                    i += 2;
                    continue;
                }
                i += 1;
                break;
            }
            if quote == b'`' && bytes[i] == b'\\' {
                i += 2;
                continue;
            }
            i += 1;
        }
        let text = &sql[start..i];
        out.push(if quote == b'\'' {
            Segment::Literal(text)
        } else {
            Segment::QuotedIdentifier(text)
        });
        code_start = i;
    }
    if code_start < bytes.len() {
        out.push(Segment::Code(&sql[code_start..]));
    }
    Ok(out)
}

/// Apply `rewrite` to code segments only and stitch the SQL back together.
fn rewrite_code<F>(sql: &str, rewrite: F) -> Result<String, DialectError>
where
    F: Fn(&str) -> String,
{
    let mut out = String::with_capacity(sql.len());
    for segment in segments(sql)? {
        match segment {
            Segment::Code(code) => out.push_str(&rewrite(code)),
            Segment::Literal(text) | Segment::QuotedIdentifier(text) => out.push_str(text),
        }
    }
    Ok(out)
}

/// SQLite accepts the generic SQL as is; translation only validates quoting.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteDialect;

impl Dialect for SqliteDialect {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn quote_identifier(&self, ident: &str) -> String {
        format!("\"{}\"", ident.replace('"', "\"\""))
    }

    fn translate(&self, generic_sql: &str) -> Result<String, DialectError> {
        segments(generic_sql)?;
        Ok(generic_sql.to_string())
    }
}

static CAST_DOUBLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bAS\s+DOUBLE\b").expect("valid regex"));
static CAST_VARCHAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bAS\s+VARCHAR\b").expect("valid regex"));

/// ClickHouse: backtick identifiers, ClickHouse type names and an explicit
/// table engine when materializing.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClickHouseDialect;

impl Dialect for ClickHouseDialect {
    fn name(&self) -> &'static str {
        "clickhouse"
    }

    fn quote_identifier(&self, ident: &str) -> String {
        format!("`{}`", ident.replace('\\', "\\\\").replace('`', "\\`"))
    }

    fn translate(&self, generic_sql: &str) -> Result<String, DialectError> {
        rewrite_code(generic_sql, |code| {
            let code = CAST_DOUBLE.replace_all(code, "AS Float64");
            CAST_VARCHAR.replace_all(&code, "AS String").into_owned()
        })
    }

    fn create_table_as(&self, quoted_table: &str, select_sql: &str) -> String {
        format!(
            "CREATE TABLE {} ENGINE = Memory AS {}",
            quoted_table, select_sql
        )
    }
}
