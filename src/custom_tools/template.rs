use serde_json::{Map, Value};

const BLOCK_HEADER: &str = "-- tool:";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TemplateError {
    #[error("line {0}: SQL outside a '-- tool: <name>' block")]
    Orphan(usize),
    #[error("query block '{0}' is empty")]
    EmptyBlock(String),
    #[error("query block header on line {0} has no name")]
    Unnamed(usize),
    #[error("no query blocks found")]
    NoBlocks,
    #[error("missing value for parameter :{0}")]
    MissingParam(String),
    #[error("parameter :{0} must be a string, number, boolean or null")]
    UnsupportedValue(String),
}

#[derive(Debug, Clone, PartialEq)]
enum Piece {
    Text(String),
    Param(String),
}

/// One named, parameterised SQL statement.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryBlock {
    pub name: String,
    pub sql: String,
    pieces: Vec<Piece>,
}

impl QueryBlock {
    fn new(name: String, sql: String) -> Self {
        let pieces = split_placeholders(&sql);
        Self { name, sql, pieces }
    }

    /// Placeholder names in first-use order, without repeats.
    pub fn params(&self) -> Vec<String> {
        let mut params: Vec<String> = Vec::new();
        for piece in &self.pieces {
            if let Piece::Param(name) = piece {
                if !params.contains(name) {
                    params.push(name.clone());
                }
            }
        }
        params
    }

    /// Substitute every placeholder with a SQL literal.
    pub fn render(&self, args: &Map<String, Value>) -> Result<String, TemplateError> {
        let mut sql = String::with_capacity(self.sql.len());
        for piece in &self.pieces {
            match piece {
                Piece::Text(text) => sql.push_str(text),
                Piece::Param(name) => {
                    let value = args
                        .get(name)
                        .ok_or_else(|| TemplateError::MissingParam(name.clone()))?;
                    sql.push_str(&literal(name, value)?);
                }
            }
        }
        Ok(sql)
    }
}

fn literal(name: &str, value: &Value) -> Result<String, TemplateError> {
    match value {
        Value::Null => Ok("NULL".to_string()),
        Value::Bool(true) => Ok("TRUE".to_string()),
        Value::Bool(false) => Ok("FALSE".to_string()),
        Value::Number(n) => Ok(n.to_string()),
        Value::String(s) => Ok(format!("'{}'", s.replace('\'', "''"))),
        Value::Array(_) | Value::Object(_) => Err(TemplateError::UnsupportedValue(name.to_string())),
    }
}

/// Split SQL into literal text and `:name` placeholders. Quoted text,
/// `--` comments and `::` casts are left alone.
fn split_placeholders(sql: &str) -> Vec<Piece> {
    let chars: Vec<char> = sql.chars().collect();
    let mut pieces = Vec::new();
    let mut text = String::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            '\'' | '"' => {
                text.push(c);
                i += 1;
                while i < chars.len() {
                    text.push(chars[i]);
                    if chars[i] == c {
                        if chars.get(i + 1) == Some(&c) {
                            text.push(c);
                            i += 2;
                            continue;
                        }
                        i += 1;
                        break;
                    }
                    i += 1;
                }
            }
            '-' if chars.get(i + 1) == Some(&'-') => {
                while i < chars.len() && chars[i] != '\n' {
                    text.push(chars[i]);
                    i += 1;
                }
            }
            ':' if chars.get(i + 1) == Some(&':') => {
                text.push_str("::");
                i += 2;
            }
            ':' if chars.get(i + 1).is_some_and(|n| n.is_alphabetic() || *n == '_') => {
                let start = i + 1;
                i = start;
                while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                if !text.is_empty() {
                    pieces.push(Piece::Text(std::mem::take(&mut text)));
                }
                pieces.push(Piece::Param(chars[start..i].iter().collect()));
            }
            _ => {
                text.push(c);
                i += 1;
            }
        }
    }

    if !text.is_empty() {
        pieces.push(Piece::Text(text));
    }
    pieces
}

/// Parse tool code into query blocks. Each block starts with a
/// `-- tool: <name>` line; comment and blank lines may precede the first.
pub fn parse_blocks(source: &str) -> Result<Vec<QueryBlock>, TemplateError> {
    let mut blocks = Vec::new();
    let mut current: Option<(String, Vec<&str>)> = None;

    for (idx, line) in source.lines().enumerate() {
        let trimmed = line.trim();
        if let Some(name) = trimmed.strip_prefix(BLOCK_HEADER) {
            let name = name.trim();
            if name.is_empty() {
                return Err(TemplateError::Unnamed(idx + 1));
            }
            if let Some((prev, lines)) = current.take() {
                blocks.push(finish_block(prev, &lines)?);
            }
            current = Some((name.to_string(), Vec::new()));
            continue;
        }

        match current.as_mut() {
            Some((_, lines)) => lines.push(line),
            None if trimmed.is_empty() || trimmed.starts_with("--") => {}
            None => return Err(TemplateError::Orphan(idx + 1)),
        }
    }

    if let Some((name, lines)) = current {
        blocks.push(finish_block(name, &lines)?);
    }
    if blocks.is_empty() {
        return Err(TemplateError::NoBlocks);
    }
    Ok(blocks)
}

fn finish_block(name: String, lines: &[&str]) -> Result<QueryBlock, TemplateError> {
    let sql = lines.join("\n");
    let sql = sql.trim().trim_end_matches(';').trim_end();
    let has_statement = sql
        .lines()
        .any(|l| !l.trim().is_empty() && !l.trim().starts_with("--"));
    if !has_statement {
        return Err(TemplateError::EmptyBlock(name));
    }
    Ok(QueryBlock::new(name, sql.to_string()))
}
