//! Recursive-descent parser for the supported SELECT subset.
//!
//! Grammar:
//!
//! ```text
//! statement  := SELECT projection FROM name [WHERE or_expr] [LIMIT number] [';']
//! projection := '*' | COUNT '(' '*' ')' | name (',' name)*
//! or_expr    := and_expr (OR and_expr)*
//! and_expr   := primary (AND primary)*
//! primary    := '(' or_expr ')' | name op literal
//! ```

use litescan_error::{Result, ScanError};

use crate::ast::{CompareOp, Expr, Literal, Projection, SelectStatement, Statement};
use crate::token::{tokenize, Sym, Token};

/// Parse one statement. INSERT/UPDATE/DELETE are recognized but carry no
/// body; everything else is a syntax error.
pub fn parse_statement(sql: &str) -> Result<Statement> {
    let tokens = tokenize(sql)?;
    let mut parser = Parser { tokens, pos: 0 };

    let Some(first) = parser.peek().cloned() else {
        return Err(ScanError::syntax(""));
    };
    if first.is_keyword("SELECT") {
        parser.advance();
        let select = parser.select_body()?;
        parser.finish()?;
        return Ok(Statement::Select(select));
    }
    for (kw, stmt) in [
        ("INSERT", Statement::Insert),
        ("UPDATE", Statement::Update),
        ("DELETE", Statement::Delete),
    ] {
        if first.is_keyword(kw) {
            return Ok(stmt);
        }
    }
    Err(ScanError::syntax(first.describe()))
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<&Token> {
        let token = self.tokens.get(self.pos);
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn expect_symbol(&mut self, sym: Sym) -> Result<()> {
        match self.advance() {
            Some(Token::Symbol(got)) if *got == sym => Ok(()),
            Some(other) => Err(ScanError::syntax(other.describe())),
            None => Err(ScanError::syntax("")),
        }
    }

    fn expect_ident(&mut self) -> Result<String> {
        match self.advance() {
            Some(token) => token
                .ident()
                .map(str::to_owned)
                .ok_or_else(|| ScanError::syntax(token.describe())),
            None => Err(ScanError::syntax("")),
        }
    }

    fn select_body(&mut self) -> Result<SelectStatement> {
        let projection = self.projection()?;

        match self.advance() {
            Some(token) if token.is_keyword("FROM") => {}
            Some(other) => return Err(ScanError::syntax(other.describe())),
            None => return Err(ScanError::syntax("")),
        }
        let table = self.expect_ident()?;

        let where_clause = if self.peek().is_some_and(|t| t.is_keyword("WHERE")) {
            self.advance();
            Some(self.or_expr()?)
        } else {
            None
        };

        let limit = if self.peek().is_some_and(|t| t.is_keyword("LIMIT")) {
            self.advance();
            match self.advance() {
                Some(Token::Number(n)) => Some(n.parse().map_err(|_| ScanError::syntax(n.clone()))?),
                Some(other) => return Err(ScanError::syntax(other.describe())),
                None => return Err(ScanError::syntax("")),
            }
        } else {
            None
        };

        Ok(SelectStatement {
            projection,
            table,
            where_clause,
            limit,
        })
    }

    fn projection(&mut self) -> Result<Projection> {
        if matches!(self.peek(), Some(Token::Symbol(Sym::Star))) {
            self.advance();
            return Ok(Projection::Star);
        }

        // A name followed by '(' is a function call; only COUNT(*) is legal.
        if let Some(Token::Ident(word)) = self.peek() {
            let is_call = matches!(
                self.tokens.get(self.pos + 1),
                Some(Token::Symbol(Sym::LParen))
            );
            if is_call {
                let name = word.clone();
                if !name.eq_ignore_ascii_case("COUNT") {
                    return Err(ScanError::UnsupportedFunction { name });
                }
                self.advance();
                self.expect_symbol(Sym::LParen)?;
                self.expect_symbol(Sym::Star)?;
                self.expect_symbol(Sym::RParen)?;
                return Ok(Projection::CountStar);
            }
        }

        let mut columns = vec![self.expect_ident()?];
        while matches!(self.peek(), Some(Token::Symbol(Sym::Comma))) {
            self.advance();
            columns.push(self.expect_ident()?);
        }
        Ok(Projection::Columns(columns))
    }

    fn or_expr(&mut self) -> Result<Expr> {
        let mut left = self.and_expr()?;
        while self.peek().is_some_and(|t| t.is_keyword("OR")) {
            self.advance();
            let right = self.and_expr()?;
            left = Expr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn and_expr(&mut self) -> Result<Expr> {
        let mut left = self.primary()?;
        while self.peek().is_some_and(|t| t.is_keyword("AND")) {
            self.advance();
            let right = self.primary()?;
            left = Expr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn primary(&mut self) -> Result<Expr> {
        if matches!(self.peek(), Some(Token::Symbol(Sym::LParen))) {
            self.advance();
            let inner = self.or_expr()?;
            self.expect_symbol(Sym::RParen)?;
            return Ok(inner);
        }
        self.comparison()
    }

    fn comparison(&mut self) -> Result<Expr> {
        let column = self.expect_ident()?;
        let op = match self.advance() {
            Some(Token::Symbol(sym)) => match sym {
                Sym::Eq => CompareOp::Eq,
                Sym::NotEq => CompareOp::NotEq,
                Sym::Lt => CompareOp::Lt,
                Sym::LtEq => CompareOp::LtEq,
                Sym::Gt => CompareOp::Gt,
                Sym::GtEq => CompareOp::GtEq,
                other => {
                    return Err(ScanError::UnsupportedOperator {
                        op: other.as_str().to_owned(),
                    })
                }
            },
            Some(other) => return Err(ScanError::syntax(other.describe())),
            None => return Err(ScanError::syntax("")),
        };
        let literal = match self.advance() {
            Some(Token::StringLit(s)) => Literal::String(s.clone()),
            Some(Token::Number(n)) => Literal::Number(n.clone()),
            // A bare word on the right compares against its own spelling.
            Some(Token::Ident(s) | Token::QuotedIdent(s)) => Literal::String(s.clone()),
            Some(other) => return Err(ScanError::syntax(other.describe())),
            None => return Err(ScanError::syntax("")),
        };
        Ok(Expr::Comparison {
            column,
            op,
            literal,
        })
    }

    fn finish(&mut self) -> Result<()> {
        if matches!(self.peek(), Some(Token::Symbol(Sym::Semicolon))) {
            self.advance();
        }
        match self.peek() {
            None => Ok(()),
            Some(extra) => Err(ScanError::syntax(extra.describe())),
        }
    }
}
