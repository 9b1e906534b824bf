//! Source lint for custom tool code.
//!
//! This is a denylist over tokens, meant to catch accidental misuse. It is
//! not a security boundary: obfuscated names, indirect references and
//! resource exhaustion all pass.

const RESTRICTED_MODULES: &[&str] = &["subprocess", "os", "sys", "pty", "shutil"];
const RESTRICTED_NAMES: &[&str] = &["system", "popen", "spawn", "eval", "exec"];
const DYNAMIC_EVAL: &[&str] = &["eval", "exec", "__import__"];
const RESTRICTED_CHAINS: &[&str] = &[
    "eval",
    "exec",
    "__import__",
    "subprocess",
    "os.system",
    "os.popen",
    "os.spawn",
    "os.fork",
    "pty.spawn",
];
const MUTATING_KEYWORDS: &[&str] = &[
    "DROP", "DELETE", "INSERT", "UPDATE", "ALTER", "TRUNCATE", "ATTACH", "PRAGMA", "CREATE",
    "VACUUM", "REINDEX",
];
/// Mutating only when they open a statement; elsewhere they are functions.
const MUTATING_STATEMENT_STARTS: &[&str] = &["REPLACE"];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("syntax error: {0}")]
    Syntax(String),
    #[error("imports restricted module '{0}'")]
    RestrictedImport(String),
    #[error("imports restricted name '{0}'")]
    RestrictedName(String),
    #[error("calls restricted function '{0}'")]
    RestrictedCall(String),
    #[error("contains data-modifying statement '{0}'")]
    MutatingStatement(String),
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Dot,
    LParen,
    Comma,
    /// End of a line or statement.
    Break,
    Other,
}

fn tokenize(source: &str) -> Result<Vec<Token>, ValidationError> {
    let chars: Vec<char> = source.chars().collect();
    let mut tokens = Vec::new();
    let mut line = 1;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            '\n' => {
                line += 1;
                tokens.push(Token::Break);
                i += 1;
            }
            ';' => {
                tokens.push(Token::Break);
                i += 1;
            }
            c if c.is_whitespace() => i += 1,
            '#' => {
                while i < chars.len() && chars[i] != '\n' {
                    i += 1;
                }
            }
            '-' if chars.get(i + 1) == Some(&'-') => {
                while i < chars.len() && chars[i] != '\n' {
                    i += 1;
                }
            }
            '/' if chars.get(i + 1) == Some(&'*') => {
                let start = line;
                i += 2;
                loop {
                    match chars.get(i) {
                        None => {
                            return Err(ValidationError::Syntax(format!(
                                "unterminated block comment starting on line {}",
                                start
                            )))
                        }
                        Some('*') if chars.get(i + 1) == Some(&'/') => {
                            i += 2;
                            break;
                        }
                        Some('\n') => {
                            line += 1;
                            i += 1;
                        }
                        Some(_) => i += 1,
                    }
                }
            }
            '\'' | '"' => {
                let start = line;
                i += 1;
                loop {
                    match chars.get(i) {
                        None => {
                            return Err(ValidationError::Syntax(format!(
                                "unterminated string literal starting on line {}",
                                start
                            )))
                        }
                        // SQL quotes have no backslash escapes.
                        Some('\\') if c == '"' => i += 2,
                        Some(&q) if q == c => {
                            // A doubled quote is an escaped quote.
                            if chars.get(i + 1) == Some(&c) {
                                i += 2;
                            } else {
                                i += 1;
                                break;
                            }
                        }
                        Some('\n') => {
                            line += 1;
                            i += 1;
                        }
                        Some(_) => i += 1,
                    }
                }
                tokens.push(Token::Other);
            }
            c if c.is_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                tokens.push(Token::Ident(chars[start..i].iter().collect()));
            }
            '.' => {
                tokens.push(Token::Dot);
                i += 1;
            }
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ',' => {
                tokens.push(Token::Comma);
                i += 1;
            }
            _ => {
                tokens.push(Token::Other);
                i += 1;
            }
        }
    }

    Ok(tokens)
}

/// Read `a.b.c` starting at `start`. Returns the joined path (empty when
/// `start` is not an identifier) and the index just past it.
fn dotted(tokens: &[Token], start: usize) -> (String, usize) {
    let mut path = String::new();
    let mut i = start;
    while let Some(Token::Ident(name)) = tokens.get(i) {
        if !path.is_empty() {
            path.push('.');
        }
        path.push_str(name);
        i += 1;
        if tokens.get(i) == Some(&Token::Dot) && matches!(tokens.get(i + 1), Some(Token::Ident(_))) {
            i += 1;
        } else {
            break;
        }
    }
    (path, i)
}

fn is_ident(token: Option<&Token>, word: &str) -> bool {
    matches!(token, Some(Token::Ident(w)) if w == word)
}

fn check_import(tokens: &[Token], mut i: usize) -> Result<usize, ValidationError> {
    loop {
        let (path, next) = dotted(tokens, i);
        if path.is_empty() {
            return Ok(i);
        }
        let root = path.split('.').next().unwrap_or_default();
        if RESTRICTED_MODULES.contains(&root) {
            return Err(ValidationError::RestrictedImport(path));
        }
        i = next;
        if is_ident(tokens.get(i), "as") {
            i += 2;
        }
        if tokens.get(i) == Some(&Token::Comma) {
            i += 1;
        } else {
            return Ok(i);
        }
    }
}

fn check_from_import(tokens: &[Token], module: &str, mut i: usize) -> Result<usize, ValidationError> {
    if module.split('.').any(|seg| RESTRICTED_MODULES.contains(&seg)) {
        return Err(ValidationError::RestrictedImport(module.to_string()));
    }
    let mut after_as = false;
    while let Some(token) = tokens.get(i) {
        match token {
            Token::Break => break,
            Token::Ident(name) if name == "as" => after_as = true,
            Token::Ident(name) => {
                if !after_as && RESTRICTED_NAMES.contains(&name.as_str()) {
                    return Err(ValidationError::RestrictedName(name.clone()));
                }
                after_as = false;
            }
            _ => {}
        }
        i += 1;
    }
    Ok(i)
}

/// Reject sources that import process-control modules, call dynamic
/// evaluation primitives, or modify data.
pub fn validate(source: &str) -> Result<(), ValidationError> {
    let tokens = tokenize(source)?;

    let mut i = 0;
    while i < tokens.len() {
        let Token::Ident(word) = &tokens[i] else {
            i += 1;
            continue;
        };

        if word == "import" {
            i = check_import(&tokens, i + 1)?;
            continue;
        }

        if word == "from" {
            let (module, next) = dotted(&tokens, i + 1);
            if !module.is_empty() && is_ident(tokens.get(next), "import") {
                i = check_from_import(&tokens, &module, next + 1)?;
                continue;
            }
        }

        // Calls on an expression result (`f().eval(`) have no named root.
        if i > 0 && tokens[i - 1] == Token::Dot {
            i += 1;
            continue;
        }

        let (chain, next) = dotted(&tokens, i);
        if tokens.get(next) == Some(&Token::LParen) {
            let restricted = if chain.contains('.') {
                RESTRICTED_CHAINS.iter().any(|bad| chain.contains(bad))
            } else {
                DYNAMIC_EVAL.contains(&chain.as_str())
            };
            if restricted {
                return Err(ValidationError::RestrictedCall(chain));
            }
        }
        i = next.max(i + 1);
    }

    for (i, token) in tokens.iter().enumerate() {
        let Token::Ident(word) = token else {
            continue;
        };
        let upper = word.to_ascii_uppercase();
        if MUTATING_KEYWORDS.contains(&upper.as_str()) {
            return Err(ValidationError::MutatingStatement(upper));
        }
        let opens_statement = i == 0 || tokens[i - 1] == Token::Break;
        if opens_statement
            && tokens.get(i + 1) != Some(&Token::LParen)
            && MUTATING_STATEMENT_STARTS.contains(&upper.as_str())
        {
            return Err(ValidationError::MutatingStatement(upper));
        }
    }

    Ok(())
}
