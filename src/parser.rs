use std::collections::HashMap;
use std::mem;

use crate::ast::{ASTNode, Expression, Function, Prototype};
use crate::lexer::{Lexer, Token};

#[derive(Debug, PartialEq, Clone, thiserror::Error)]
pub enum ParseError {
    #[error("unknown token {0} when expecting an expression")]
    ExpectedExpression(Token),
    #[error("expected {expected}, found {found}")]
    Unexpected { expected: &'static str, found: Token },
    #[error("malformed number literal '{0}'")]
    MalformedNumber(String),
    #[error("duplicate parameter '{param}' in prototype of {name}")]
    DuplicateParameter { name: String, param: String },
}

pub type PartialParseResult = Result<Expression, ParseError>;

/// Recursive-descent parser holding one token of lookahead.
///
/// Binary operators are handled by precedence climbing over
/// `operator_precedence`; any token not in the table is not an operator.
#[derive(Debug, Clone)]
pub struct Parser<'a> {
    lexer: Lexer<'a>,
    current: Token,
    pub operator_precedence: HashMap<char, i32>,
}

impl<'a> Parser<'a> {
    pub fn new(source: &'a str) -> Self {
        let mut lexer = Lexer::new(source);
        let current = lexer.next_token();

        let mut operator_precedence = HashMap::new();
        operator_precedence.insert('<', 10);
        operator_precedence.insert('+', 20);
        operator_precedence.insert('-', 20);
        operator_precedence.insert('*', 40);

        Parser {
            lexer,
            current,
            operator_precedence,
        }
    }

    /// Parse every top-level form in `source`, stopping at the first error.
    pub fn parse_str(source: &str) -> Result<Vec<ASTNode>, ParseError> {
        let mut parser = Parser::new(source);
        let mut ast = Vec::new();
        while let Some(node) = parser.parse_top_level()? {
            ast.push(node);
        }
        Ok(ast)
    }

    /// Consume the current token, returning it.
    pub fn advance(&mut self) -> Token {
        let next = self.lexer.next_token();
        mem::replace(&mut self.current, next)
    }

    /// Recover after a failed parse by dropping one token, unless the current
    /// token already starts a new top-level form.
    pub fn synchronize(&mut self) {
        match self.current {
            Token::Eof | Token::Def | Token::Extern => {}
            _ => {
                self.advance();
            }
        }
    }

    fn current_operator(&self) -> Option<(char, i32)> {
        match self.current {
            Token::Punct(op) => self
                .operator_precedence
                .get(&op)
                .map(|&precedence| (op, precedence)),
            _ => None,
        }
    }

    fn token_precedence(&self) -> i32 {
        self.current_operator()
            .map_or(-1, |(_, precedence)| precedence)
    }

    fn expect_punct(&mut self, punct: char, expected: &'static str) -> Result<(), ParseError> {
        if self.current == Token::Punct(punct) {
            self.advance();
            Ok(())
        } else {
            Err(ParseError::Unexpected {
                expected,
                found: self.current.clone(),
            })
        }
    }

    fn expect_ident(&mut self, expected: &'static str) -> Result<String, ParseError> {
        if let Token::Ident(_) = self.current {
            if let Token::Ident(ident) = self.advance() {
                return Ok(ident);
            }
        }
        Err(ParseError::Unexpected {
            expected,
            found: self.current.clone(),
        })
    }

    fn parse_number(&mut self) -> PartialParseResult {
        match self.advance() {
            Token::Number(num) => Ok(Expression::Literal(num)),
            Token::MalformedNumber(text) => Err(ParseError::MalformedNumber(text)),
            found => Err(ParseError::ExpectedExpression(found)),
        }
    }

    fn parse_identifier(&mut self) -> PartialParseResult {
        let ident = self.expect_ident("identifier")?;

        if self.current != Token::Punct('(') {
            return Ok(Expression::Variable(ident));
        }
        self.advance();

        let mut args = Vec::new();
        if self.current != Token::Punct(')') {
            loop {
                args.push(self.parse_expression()?);

                match self.current {
                    Token::Punct(')') => break,
                    Token::Punct(',') => {
                        self.advance();
                    }
                    _ => {
                        return Err(ParseError::Unexpected {
                            expected: "')' or ',' in argument list",
                            found: self.current.clone(),
                        })
                    }
                }
            }
        }
        self.advance();

        Ok(Expression::Call(ident, args))
    }

    fn parse_nested(&mut self) -> PartialParseResult {
        self.expect_punct('(', "'('")?;
        let res = self.parse_expression()?;
        self.expect_punct(')', "')'")?;
        Ok(res)
    }

    fn parse_primary(&mut self) -> PartialParseResult {
        match self.current {
            Token::Number(_) | Token::MalformedNumber(_) => self.parse_number(),
            Token::Ident(_) => self.parse_identifier(),
            Token::Punct('(') => self.parse_nested(),
            _ => Err(ParseError::ExpectedExpression(self.current.clone())),
        }
    }

    fn parse_rhs(&mut self, expr_precedence: i32, lhs: Expression) -> PartialParseResult {
        let mut result = lhs;

        loop {
            let (operator, precedence) = match self.current_operator() {
                Some((op, pr)) if pr >= expr_precedence => (op, pr),
                _ => return Ok(result),
            };
            self.advance();

            let mut rhs = self.parse_primary()?;

            if precedence < self.token_precedence() {
                rhs = self.parse_rhs(precedence + 1, rhs)?;
            }

            result = Expression::Binary(operator, Box::new(result), Box::new(rhs));
        }
    }

    pub fn parse_expression(&mut self) -> PartialParseResult {
        let lhs = self.parse_primary()?;
        self.parse_rhs(0, lhs)
    }

    pub fn parse_prototype(&mut self) -> Result<Prototype, ParseError> {
        let name = self.expect_ident("function name in prototype")?;
        self.expect_punct('(', "'(' in prototype")?;

        let mut args: Vec<String> = Vec::new();
        while let Token::Ident(arg) = &self.current {
            if args.contains(arg) {
                return Err(ParseError::DuplicateParameter {
                    name,
                    param: arg.clone(),
                });
            }
            args.push(arg.clone());
            self.advance();
        }

        self.expect_punct(')', "')' in prototype")?;

        Ok(Prototype { name, args })
    }

    pub fn parse_definition(&mut self) -> Result<Function, ParseError> {
        self.advance();
        let prototype = self.parse_prototype()?;
        let body = self.parse_expression()?;
        Ok(Function { prototype, body })
    }

    pub fn parse_extern(&mut self) -> Result<Prototype, ParseError> {
        self.advance();
        self.parse_prototype()
    }

    pub fn parse_top_level_expression(&mut self) -> Result<Function, ParseError> {
        let body = self.parse_expression()?;
        Ok(Function {
            prototype: Prototype::anonymous(),
            body,
        })
    }

    /// Parse the next top-level form, or `None` once the input is exhausted.
    /// Stray `;` separators between forms are skipped.
    pub fn parse_top_level(&mut self) -> Result<Option<ASTNode>, ParseError> {
        while self.current == Token::Punct(';') {
            self.advance();
        }

        let node = match self.current {
            Token::Eof => return Ok(None),
            Token::Def => ASTNode::Function(self.parse_definition()?),
            Token::Extern => ASTNode::Extern(self.parse_extern()?),
            _ => ASTNode::Expression(self.parse_top_level_expression()?),
        };
        Ok(Some(node))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn num(value: f64) -> Box<Expression> {
        Box::new(Expression::Literal(value))
    }

    fn var(name: &str) -> Box<Expression> {
        Box::new(Expression::Variable(name.to_string()))
    }

    fn parse_expr(input: &str) -> PartialParseResult {
        Parser::new(input).parse_expression()
    }

    #[test]
    fn parse_expr_works() {
        let res = parse_expr("x + 1 * (2 - 3)").unwrap();
        let target = Expression::Binary(
            '+',
            var("x"),
            Box::new(Expression::Binary(
                '*',
                num(1.0),
                Box::new(Expression::Binary('-', num(2.0), num(3.0))),
            )),
        );
        assert_eq!(res, target);
    }

    #[test]
    fn multiplication_binds_tighter() {
        let res = parse_expr("1+2*3").unwrap();
        let target = Expression::Binary(
            '+',
            num(1.0),
            Box::new(Expression::Binary('*', num(2.0), num(3.0))),
        );
        assert_eq!(res, target);
    }

    #[test]
    fn parentheses_override_precedence() {
        let res = parse_expr("(1+2)*3").unwrap();
        let target = Expression::Binary(
            '*',
            Box::new(Expression::Binary('+', num(1.0), num(2.0))),
            num(3.0),
        );
        assert_eq!(res, target);
    }

    #[test]
    fn equal_precedence_is_left_associative() {
        let res = parse_expr("1-2-3").unwrap();
        let target = Expression::Binary(
            '-',
            Box::new(Expression::Binary('-', num(1.0), num(2.0))),
            num(3.0),
        );
        assert_eq!(res, target);
    }

    #[test]
    fn comparison_binds_loosest() {
        let res = parse_expr("a < b + 1").unwrap();
        let target = Expression::Binary(
            '<',
            var("a"),
            Box::new(Expression::Binary('+', var("b"), num(1.0))),
        );
        assert_eq!(res, target);
    }

    #[test]
    fn mixed_chain_climbs_and_falls_back() {
        // a*b + c*d - e
        let res = parse_expr("a*b+c*d-e").unwrap();
        let target = Expression::Binary(
            '-',
            Box::new(Expression::Binary(
                '+',
                Box::new(Expression::Binary('*', var("a"), var("b"))),
                Box::new(Expression::Binary('*', var("c"), var("d"))),
            )),
            var("e"),
        );
        assert_eq!(res, target);
    }

    #[test]
    fn unknown_operator_ends_expression() {
        let mut parser = Parser::new("a / b");
        assert_eq!(parser.parse_expression().unwrap(), *var("a"));
        assert_eq!(parser.current, Token::Punct('/'));
    }

    #[test]
    fn calls_parse_arguments_in_order() {
        let res = parse_expr("foo(1, x + 2, bar())").unwrap();
        let target = Expression::Call(
            "foo".to_string(),
            vec![
                Expression::Literal(1.0),
                Expression::Binary('+', var("x"), num(2.0)),
                Expression::Call("bar".to_string(), vec![]),
            ],
        );
        assert_eq!(res, target);
    }

    #[test]
    fn unclosed_call_is_an_error() {
        assert_eq!(
            parse_expr("foo(1 2)"),
            Err(ParseError::Unexpected {
                expected: "')' or ',' in argument list",
                found: Token::Number(2.0),
            })
        );
    }

    #[test]
    fn unclosed_paren_is_an_error() {
        assert_eq!(
            parse_expr("(1 + 2"),
            Err(ParseError::Unexpected {
                expected: "')'",
                found: Token::Eof,
            })
        );
    }

    #[test]
    fn missing_primary_is_an_error() {
        assert_eq!(
            parse_expr("1 + )"),
            Err(ParseError::ExpectedExpression(Token::Punct(')')))
        );
    }

    #[test]
    fn malformed_number_is_rejected() {
        assert_eq!(
            parse_expr("1.2.3"),
            Err(ParseError::MalformedNumber("1.2.3".to_string()))
        );
    }

    #[test]
    fn parse_definition_works() {
        let ast = Parser::parse_str("def average(x y) (x + y) * 5").unwrap();
        let target = vec![ASTNode::Function(Function {
            prototype: Prototype {
                name: "average".to_string(),
                args: vec!["x".to_string(), "y".to_string()],
            },
            body: Expression::Binary(
                '*',
                Box::new(Expression::Binary('+', var("x"), var("y"))),
                num(5.0),
            ),
        })];
        assert_eq!(ast, target);
    }

    #[test]
    fn parse_extern_and_top_level_expression() {
        let ast = Parser::parse_str("extern sin(a); sin(1);").unwrap();
        let target = vec![
            ASTNode::Extern(Prototype {
                name: "sin".to_string(),
                args: vec!["a".to_string()],
            }),
            ASTNode::Expression(Function {
                prototype: Prototype::anonymous(),
                body: Expression::Call("sin".to_string(), vec![Expression::Literal(1.0)]),
            }),
        ];
        assert_eq!(ast, target);
    }

    #[test]
    fn prototype_requires_a_name() {
        assert_eq!(
            Parser::parse_str("def (x) x"),
            Err(ParseError::Unexpected {
                expected: "function name in prototype",
                found: Token::Punct('('),
            })
        );
    }

    #[test]
    fn prototype_rejects_duplicate_parameters() {
        assert_eq!(
            Parser::parse_str("def f(x x) x"),
            Err(ParseError::DuplicateParameter {
                name: "f".to_string(),
                param: "x".to_string(),
            })
        );
    }

    #[test]
    fn prototype_parameters_are_not_comma_separated() {
        assert_eq!(
            Parser::parse_str("extern f(a, b)"),
            Err(ParseError::Unexpected {
                expected: "')' in prototype",
                found: Token::Punct(','),
            })
        );
    }

    #[test]
    fn synchronize_skips_one_token() {
        let mut parser = Parser::new("def bad( ) def good(x) x");
        assert_eq!(
            parser.parse_top_level(),
            Err(ParseError::ExpectedExpression(Token::Def))
        );
        parser.synchronize();
        let good = parser.parse_top_level().unwrap().unwrap();
        assert_eq!(good.name(), "good");
        assert_eq!(parser.parse_top_level(), Ok(None));
    }

    #[test]
    fn synchronize_drops_offending_token() {
        let mut parser = Parser::new(") 4");
        assert!(parser.parse_top_level().is_err());
        parser.synchronize();
        assert_eq!(parser.current, Token::Number(4.0));
    }
}
