//! Recursive-descent parser from locale-dependent formula text to
//! [`Expression`]. Unknown identifiers fail the parse; a failed parse never
//! returns a partial tree — see [`parse`].

use crate::binary::BinaryOp;
use crate::error::{ParseError, ParseResult};
use crate::expr::Expression;
use crate::lexer::{tokenize, Spanned, Token};
use crate::locale::Locale;
use crate::value::Value;

struct Parser<'a> {
    tokens: Vec<Spanned>,
    pos: usize,
    locale: &'a Locale,
}

/// Parse a formula. Returns `None` on any parse failure — callers should
/// treat that as "invalid formula, leave the step unchanged", per the
/// engine's no-partial-tree contract.
pub fn parse(input: &str, locale: &Locale) -> Option<Expression> {
    match try_parse(input, locale) {
        Ok(expr) => Some(expr),
        Err(e) => {
            log::debug!("formula parse failed: {e}");
            None
        }
    }
}

/// Like [`parse`], but surfaces the failure reason for diagnostics (e.g. the
/// CLI's formula-check command).
pub fn try_parse(input: &str, locale: &Locale) -> ParseResult<Expression> {
    let trimmed = input.trim_start();
    if !trimmed.starts_with('=') {
        return Err(ParseError::new("formula must start with '='", 0));
    }
    let tokens = tokenize(trimmed, locale)?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        locale,
    };
    parser.expect(&Token::Eq)?;
    let expr = parser.logic()?;
    if parser.pos != parser.tokens.len() {
        return Err(ParseError::new("unexpected trailing input", parser.current_position()));
    }
    Ok(expr)
}

impl<'a> Parser<'a> {
    fn current(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|s| &s.token)
    }

    fn current_position(&self) -> usize {
        self.tokens
            .get(self.pos)
            .map(|s| s.position)
            .unwrap_or(usize::MAX)
    }

    fn advance(&mut self) -> Option<Token> {
        let t = self.tokens.get(self.pos).map(|s| s.token.clone());
        if t.is_some() {
            self.pos += 1;
        }
        t
    }

    fn expect(&mut self, expected: &Token) -> ParseResult<()> {
        match self.advance() {
            Some(t) if t == *expected => Ok(()),
            Some(t) => Err(ParseError::new(
                format!("expected {expected:?}, found {t:?}"),
                self.current_position(),
            )),
            None => Err(ParseError::new("unexpected end of formula", self.current_position())),
        }
    }

    // logic := concat ( cmp concat )*
    fn logic(&mut self) -> ParseResult<Expression> {
        let mut lhs = self.concat()?;
        loop {
            let op = match self.current() {
                Some(Token::Gt) => BinaryOp::Gt,
                Some(Token::Lt) => BinaryOp::Lt,
                Some(Token::Ge) => BinaryOp::Ge,
                Some(Token::Le) => BinaryOp::Le,
                Some(Token::Eq) => BinaryOp::Eq,
                Some(Token::Ne) => BinaryOp::Ne,
                _ => break,
            };
            self.advance();
            let rhs = self.concat()?;
            lhs = Expression::binary(op, lhs, rhs);
        }
        Ok(lhs)
    }

    // concat := add ( '&' add )*
    fn concat(&mut self) -> ParseResult<Expression> {
        let mut lhs = self.add()?;
        while matches!(self.current(), Some(Token::Amp)) {
            self.advance();
            let rhs = self.add()?;
            lhs = Expression::binary(BinaryOp::Concat, lhs, rhs);
        }
        Ok(lhs)
    }

    // add := factor ( ('+'|'-') factor )*
    fn add(&mut self) -> ParseResult<Expression> {
        let mut lhs = self.factor()?;
        loop {
            let op = match self.current() {
                Some(Token::Plus) => BinaryOp::Add,
                Some(Token::Minus) => BinaryOp::Sub,
                _ => break,
            };
            self.advance();
            let rhs = self.factor()?;
            lhs = Expression::binary(op, lhs, rhs);
        }
        Ok(lhs)
    }

    // factor := exponent ( ('*'|'/') exponent )*
    fn factor(&mut self) -> ParseResult<Expression> {
        let mut lhs = self.exponent()?;
        loop {
            let op = match self.current() {
                Some(Token::Star) => BinaryOp::Mul,
                Some(Token::Slash) => BinaryOp::Div,
                _ => break,
            };
            self.advance();
            let rhs = self.exponent()?;
            lhs = Expression::binary(op, lhs, rhs);
        }
        Ok(lhs)
    }

    // exponent := value ( '^' value )*
    fn exponent(&mut self) -> ParseResult<Expression> {
        let mut lhs = self.value()?;
        while matches!(self.current(), Some(Token::Caret)) {
            self.advance();
            let rhs = self.value()?;
            lhs = Expression::binary(BinaryOp::Pow, lhs, rhs);
        }
        Ok(lhs)
    }

    // value := percentage | string | call | currentCell | constant | sibling | '(' logic ')'
    fn value(&mut self) -> ParseResult<Expression> {
        match self.current().cloned() {
            Some(Token::Number(_)) | Some(Token::Minus) => self.percentage(),
            Some(Token::Str(s)) => {
                self.advance();
                Ok(Expression::literal(Value::string(s)))
            }
            Some(Token::Sibling(name)) => {
                self.advance();
                Ok(Expression::sibling(name.as_str()))
            }
            Some(Token::LParen) => {
                self.advance();
                let inner = self.logic()?;
                self.expect(&Token::RParen)?;
                Ok(inner)
            }
            Some(Token::Ident(name)) => self.ident_value(name),
            other => Err(ParseError::new(
                format!("unexpected token {other:?}"),
                self.current_position(),
            )),
        }
    }

    // percentage := ('-'? number) ('%')? — `%` rewrites `x%` into `x/100`.
    fn percentage(&mut self) -> ParseResult<Expression> {
        let negative = matches!(self.current(), Some(Token::Minus));
        if negative {
            self.advance();
        }
        let text = match self.advance() {
            Some(Token::Number(n)) => n,
            other => {
                return Err(ParseError::new(
                    format!("expected number, found {other:?}"),
                    self.current_position(),
                ))
            }
        };
        let mut n: f64 = text
            .parse()
            .map_err(|_| ParseError::new(format!("invalid number literal '{text}'"), self.current_position()))?;
        if negative {
            n = -n;
        }
        let literal = if n.fract() == 0.0 && n.abs() < 1e15 {
            Value::Int(n as i64)
        } else {
            Value::double(n)
        };
        let expr = Expression::literal(literal);
        if matches!(self.current(), Some(Token::Percent)) {
            self.advance();
            Ok(Expression::binary(
                BinaryOp::Div,
                expr,
                Expression::literal(100i64),
            ))
        } else {
            Ok(expr)
        }
    }

    fn ident_value(&mut self, name: String) -> ParseResult<Expression> {
        self.advance();
        if matches!(self.current(), Some(Token::LParen)) {
            return self.call(name);
        }
        if self.locale.is_current_cell_identifier(&name) {
            return Ok(Expression::Identity);
        }
        if let Some(value) = self.locale.lookup_constant(&name) {
            return Ok(Expression::literal(value.clone()));
        }
        Err(ParseError::new(
            format!("unknown identifier '{name}'"),
            self.current_position(),
        ))
    }

    // call := funcName '(' (logic (sep logic)*)? ')'
    fn call(&mut self, name: String) -> ParseResult<Expression> {
        let function = self
            .locale
            .lookup_function(&name)
            .ok_or_else(|| ParseError::new(format!("unknown function '{name}'"), self.current_position()))?;
        self.expect(&Token::LParen)?;
        let mut args = Vec::new();
        if !matches!(self.current(), Some(Token::RParen)) {
            args.push(self.logic()?);
            while matches!(self.current(), Some(Token::Sep)) {
                self.advance();
                args.push(self.logic()?);
            }
        }
        self.expect(&Token::RParen)?;
        Ok(Expression::call(function, args))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::column::Column;
    use crate::function::Function;

    fn eval(formula: &str, row: &[Value], columns: &[Column]) -> Value {
        let locale = Locale::english();
        let expr = parse(formula, &locale).expect("should parse");
        expr.apply(row, columns, None)
    }

    #[test]
    fn parses_and_evaluates_concat_and_arithmetic() {
        let columns = vec![Column::new("Name")];
        let row = vec![Value::string("ada")];
        let value = eval(r#"=UPPER([@Name]) & " " & (1+2)"#, &row, &columns);
        assert_eq!(value, Value::string("ADA 3"));
    }

    #[test]
    fn precedence_is_standard() {
        let value = eval("=1+2*3", &[], &[]);
        assert_eq!(value, Value::Int(7));
    }

    #[test]
    fn percent_rewrites_to_division() {
        let value = eval("=50%", &[], &[]);
        assert_eq!(value, Value::Double(0.5));
    }

    #[test]
    fn current_cell_identifier_resolves_identity() {
        let locale = Locale::english();
        let expr = parse("=RC*2", &locale).unwrap();
        assert_eq!(expr.apply(&[], &[], Some(&Value::Int(4))), Value::Int(8));
    }

    #[test]
    fn unknown_identifier_fails_parse_not_partial_tree() {
        let locale = Locale::english();
        assert!(parse("=NOPE(1)", &locale).is_none());
        assert!(parse("=nope", &locale).is_none());
    }

    #[test]
    fn locale_specific_separators_are_respected() {
        let mut locale = Locale::english();
        locale.decimal_separator = ',';
        locale.argument_separator = ';';
        let expr = parse("=ROUND(1,5;1)", &locale).unwrap();
        assert_eq!(expr, Expression::call(
            Function::Round,
            vec![Expression::literal(Value::Double(1.5)), Expression::literal(1i64)]
        ));
    }

    #[test]
    fn comparison_and_function_call() {
        let value = eval("=IF(1<2, \"yes\", \"no\")", &[], &[]);
        assert_eq!(value, Value::string("yes"));
    }
}
