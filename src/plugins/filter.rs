//! `-k` / `-m` selection expressions
//!
//! Grammar, loosest binding first:
//!
//! ```text
//! expr    := and ("or" and)*
//! and     := not ("and" not)*
//! not     := "not" not | "(" expr ")" | WORD
//! ```
//!
//! In a keyword expression a word matches when it is a case-insensitive
//! substring of any of the test's keywords. In a mark expression a word
//! matches a mark name exactly.

use crate::suite::CollectedTest;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FilterError {
    #[error("invalid {kind} expression {input:?}: {reason}")]
    Syntax {
        kind: &'static str,
        input: String,
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    Word(String),
    Not(Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Open,
    Close,
    And,
    Or,
    Not,
    Word(String),
}

fn tokenize(input: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut word = String::new();

    let flush = |word: &mut String, tokens: &mut Vec<Token>| {
        if word.is_empty() {
            return;
        }
        tokens.push(match word.as_str() {
            "and" => Token::And,
            "or" => Token::Or,
            "not" => Token::Not,
            _ => Token::Word(word.clone()),
        });
        word.clear();
    };

    for c in input.chars() {
        match c {
            '(' | ')' => {
                flush(&mut word, &mut tokens);
                tokens.push(if c == '(' { Token::Open } else { Token::Close });
            }
            c if c.is_whitespace() => flush(&mut word, &mut tokens),
            c => word.push(c),
        }
    }
    flush(&mut word, &mut tokens);
    tokens
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn expr(&mut self) -> Result<Expr, String> {
        let mut left = self.and()?;
        while self.peek() == Some(&Token::Or) {
            self.pos += 1;
            left = Expr::Or(Box::new(left), Box::new(self.and()?));
        }
        Ok(left)
    }

    fn and(&mut self) -> Result<Expr, String> {
        let mut left = self.not()?;
        while self.peek() == Some(&Token::And) {
            self.pos += 1;
            left = Expr::And(Box::new(left), Box::new(self.not()?));
        }
        Ok(left)
    }

    fn not(&mut self) -> Result<Expr, String> {
        match self.next() {
            Some(Token::Not) => Ok(Expr::Not(Box::new(self.not()?))),
            Some(Token::Open) => {
                let inner = self.expr()?;
                match self.next() {
                    Some(Token::Close) => Ok(inner),
                    _ => Err("missing closing parenthesis".to_string()),
                }
            }
            Some(Token::Word(word)) => Ok(Expr::Word(word)),
            Some(other) => Err(format!("unexpected {other:?}")),
            None => Err("unexpected end of expression".to_string()),
        }
    }
}

impl Expr {
    /// Parse an expression; `kind` only flavors error messages
    pub fn parse(kind: &'static str, input: &str) -> Result<Self, FilterError> {
        let syntax = |reason: String| FilterError::Syntax {
            kind,
            input: input.to_string(),
            reason,
        };

        let mut parser = Parser {
            tokens: tokenize(input),
            pos: 0,
        };
        let expr = parser.expr().map_err(syntax)?;
        if let Some(extra) = parser.peek() {
            return Err(syntax(format!("unexpected {extra:?} after expression")));
        }
        Ok(expr)
    }

    /// Evaluate with `word` deciding each leaf
    pub fn eval(&self, word: &impl Fn(&str) -> bool) -> bool {
        match self {
            Expr::Word(w) => word(w),
            Expr::Not(inner) => !inner.eval(word),
            Expr::And(a, b) => a.eval(word) && b.eval(word),
            Expr::Or(a, b) => a.eval(word) || b.eval(word),
        }
    }
}

/// Combined keyword and mark selection
#[derive(Debug, Clone, Default)]
pub struct Filter {
    keyword: Option<(String, Expr)>,
    marks: Option<(String, Expr)>,
}

impl Filter {
    /// Blank expressions select everything
    pub fn new(keyword: Option<&str>, marks: Option<&str>) -> Result<Self, FilterError> {
        let parse = |kind, raw: Option<&str>| -> Result<Option<(String, Expr)>, FilterError> {
            match raw.map(str::trim).filter(|s| !s.is_empty()) {
                Some(text) => Ok(Some((text.to_string(), Expr::parse(kind, text)?))),
                None => Ok(None),
            }
        };

        Ok(Self {
            keyword: parse("keyword", keyword)?,
            marks: parse("mark", marks)?,
        })
    }

    pub fn keyword(&self) -> Option<&str> {
        self.keyword.as_ref().map(|(raw, _)| raw.as_str())
    }

    pub fn marks(&self) -> Option<&str> {
        self.marks.as_ref().map(|(raw, _)| raw.as_str())
    }

    pub fn selects(&self, test: &CollectedTest) -> bool {
        let keyword_ok = self.keyword.as_ref().map_or(true, |(_, expr)| {
            let keywords: Vec<String> = test
                .keywords()
                .into_iter()
                .map(|k| k.to_lowercase())
                .collect();
            expr.eval(&|word: &str| {
                let word = word.to_lowercase();
                keywords.iter().any(|k| k.contains(&word))
            })
        });

        let marks_ok = self.marks.as_ref().map_or(true, |(_, expr)| {
            expr.eval(&|word: &str| test.marks.iter().any(|m| m == word))
        });

        keyword_ok && marks_ok
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn word(w: &str) -> Box<Expr> {
        Box::new(Expr::Word(w.to_string()))
    }

    #[test]
    fn test_precedence() {
        let expr = Expr::parse("keyword", "a or b and not c").unwrap();
        assert_eq!(
            expr,
            Expr::Or(word("a"), Box::new(Expr::And(word("b"), Box::new(Expr::Not(word("c"))))))
        );
    }

    #[test]
    fn test_parentheses() {
        let expr = Expr::parse("keyword", "(a or b) and c").unwrap();
        assert_eq!(
            expr,
            Expr::And(Box::new(Expr::Or(word("a"), word("b"))), word("c"))
        );
    }

    #[test]
    fn test_words_keep_punctuation() {
        let expr = Expr::parse("keyword", "extend[smaller]").unwrap();
        assert_eq!(expr, Expr::Word("extend[smaller]".to_string()));
    }

    #[test]
    fn test_syntax_errors() {
        for bad in ["a and", "(a or b", "a b", "not", ")"] {
            let err = Expr::parse("keyword", bad).unwrap_err();
            assert!(err.to_string().contains("keyword expression"), "{bad}: {err}");
        }
    }

    #[test]
    fn test_eval() {
        let expr = Expr::parse("mark", "cinder and not slow").unwrap();
        assert!(expr.eval(&|w: &str| w == "cinder"));
        assert!(!expr.eval(&|w: &str| w == "cinder" || w == "slow"));
    }

    #[test]
    fn test_blank_filter_selects_all() {
        let filter = Filter::new(Some("  "), None).unwrap();
        assert!(filter.keyword().is_none());
        assert!(filter.marks().is_none());
    }
}
