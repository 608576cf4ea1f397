//! Recursive-descent, precedence-climbing parser producing the AST in
//! `crate::ast`.
use std::io::Cursor;

use crate::ast::*;
use crate::scanner::{Scanner, StringPart, Token, TokenWithLocation};
use crate::util::{Location, Source};

use super::precedence::{get_binary_precedence, get_unary_precedence};
use super::result::{ParseErr, ParseErrKind, ParseResult};

/// Scan `text` and parse the resulting tokens into a module.
pub(crate) fn parse_text(text: &str) -> ParseResult {
    let source = Source::new(Cursor::new(text));
    let scanner = Scanner::new(source);
    let tokens = scanner.scan()?;
    Parser::new(tokens).parse_module()
}

pub(crate) struct Parser {
    tokens: Vec<TokenWithLocation>,
    pos: usize,
}

/// Statement keywords that close the current block (the parser never
/// consumes these itself; callers peek for them to know when to stop).
fn is_block_end(token: &Token) -> bool {
    matches!(
        token,
        Token::End | Token::Else | Token::Catch | Token::Finally | Token::EndOfInput
    )
}

impl Parser {
    pub(crate) fn new(tokens: Vec<TokenWithLocation>) -> Self {
        Self { tokens, pos: 0 }
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)].token
    }

    fn peek_at(&self, offset: usize) -> &Token {
        let i = (self.pos + offset).min(self.tokens.len() - 1);
        &self.tokens[i].token
    }

    fn loc(&self) -> Location {
        self.tokens[self.pos.min(self.tokens.len() - 1)].start
    }

    fn advance(&mut self) -> TokenWithLocation {
        let t = self.tokens[self.pos.min(self.tokens.len() - 1)].clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        t
    }

    fn check(&self, token: &Token) -> bool {
        self.peek() == token
    }

    fn matches(&mut self, token: &Token) -> bool {
        if self.check(token) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: Token, what: &str) -> Result<TokenWithLocation, ParseErr> {
        if self.check(&token) {
            Ok(self.advance())
        } else {
            let found = self.tokens[self.pos.min(self.tokens.len() - 1)].clone();
            Err(ParseErr::new(ParseErrKind::ExpectedToken {
                expected: what.to_string(),
                found,
            }))
        }
    }

    fn skip_separators(&mut self) {
        while matches!(self.peek(), Token::Newline | Token::Semicolon | Token::Comment(_)) {
            self.advance();
        }
    }

    fn expect_identifier(&mut self) -> Result<String, ParseErr> {
        match self.peek().clone() {
            Token::Identifier(name) => {
                self.advance();
                Ok(name)
            }
            _ => {
                let found = self.tokens[self.pos.min(self.tokens.len() - 1)].clone();
                Err(ParseErr::new(ParseErrKind::ExpectedToken {
                    expected: "identifier".to_string(),
                    found,
                }))
            }
        }
    }

    pub(crate) fn parse_module(&mut self) -> ParseResult {
        let body = self.parse_block()?;
        self.expect(Token::EndOfInput, "end of input")?;
        Ok(Module { body })
    }

    /// Parses statements until a block-closing keyword or end of input.
    fn parse_block(&mut self) -> Result<Block, ParseErr> {
        let mut stmts = Vec::new();
        self.skip_separators();
        while !is_block_end(self.peek()) {
            stmts.push(self.parse_stmt()?);
            self.skip_separators();
        }
        Ok(stmts)
    }

    fn parse_stmt(&mut self) -> Result<Stmt, ParseErr> {
        let location = self.loc();
        let kind = match self.peek().clone() {
            Token::While => self.parse_while()?,
            Token::If => self.parse_if()?,
            Token::Break => {
                self.advance();
                StmtKind::Break
            }
            Token::Continue => {
                self.advance();
                StmtKind::Continue
            }
            Token::Function => {
                let decl = self.parse_function_decl()?;
                StmtKind::FunctionDecl(decl)
            }
            Token::Return => {
                self.advance();
                let value = if matches!(self.peek(), Token::Newline | Token::Semicolon | Token::EndOfInput)
                    || is_block_end(self.peek())
                {
                    None
                } else {
                    Some(self.parse_expr()?)
                };
                StmtKind::Return(value)
            }
            Token::For => self.parse_for_each()?,
            Token::Try => self.parse_try()?,
            Token::Raise => {
                self.advance();
                let expr = self.parse_expr()?;
                StmtKind::Raise(expr)
            }
            _ => StmtKind::Expr(self.parse_expr()?),
        };
        Ok(Stmt::new(kind, location))
    }

    fn parse_while(&mut self) -> Result<StmtKind, ParseErr> {
        self.advance(); // поки
        let condition = self.parse_expr()?;
        let body = self.parse_block()?;
        self.expect(Token::End, "кінець")?;
        Ok(StmtKind::While { condition, body })
    }

    /// Parses the `якщо ... (або якщо ...)* (інакше ...)? кінець` chain.
    /// `або якщо` is recognized by the parser as the two-token sequence
    /// `Or If` rather than by the scanner, since `або` on its own is the
    /// ordinary logical-or keyword (§9 open question resolution style:
    /// resolve lookahead ambiguity at the layer that already has full
    /// token context instead of teaching the scanner to backtrack).
    fn parse_if(&mut self) -> Result<StmtKind, ParseErr> {
        self.advance(); // якщо
        let condition = self.parse_expr()?;
        let then_block = self.parse_block()?;

        let else_block = if matches!(self.peek(), Token::Or) && matches!(self.peek_at(1), Token::If)
        {
            self.advance(); // або
            let nested = self.parse_if()?;
            let location = self.loc();
            Some(vec![Stmt::new(nested, location)])
        } else if self.matches(&Token::Else) {
            let block = self.parse_block()?;
            self.expect(Token::End, "кінець")?;
            Some(block)
        } else {
            self.expect(Token::End, "кінець")?;
            None
        };

        Ok(StmtKind::If { condition, then_block, else_block })
    }

    fn parse_for_each(&mut self) -> Result<StmtKind, ParseErr> {
        self.advance(); // для
        self.expect(Token::Each, "кожного")?;
        let var_name = self.expect_identifier()?;
        self.expect(Token::In, "в")?;
        let iterable = self.parse_expr()?;
        let body = self.parse_block()?;
        self.expect(Token::End, "кінець")?;
        Ok(StmtKind::ForEach { var_name, iterable, body })
    }

    fn parse_try(&mut self) -> Result<StmtKind, ParseErr> {
        self.advance(); // спробувати
        let try_block = self.parse_block()?;
        let mut catches = Vec::new();
        while self.check(&Token::Catch) {
            let location = self.loc();
            self.advance();
            let exc_type = self.parse_expr()?;
            let binding = if let Token::Identifier(name) = self.peek().clone() {
                self.advance();
                Some(name)
            } else {
                None
            };
            let body = self.parse_block()?;
            catches.push(Catch { exc_type, binding, body, location });
        }
        let finally_block = if self.matches(&Token::Finally) {
            Some(self.parse_block()?)
        } else {
            None
        };
        self.expect(Token::End, "кінець")?;
        Ok(StmtKind::TryCatch { try_block, catches, finally_block })
    }

    fn parse_function_decl(&mut self) -> Result<FunctionDecl, ParseErr> {
        let location = self.loc();
        self.advance(); // функція
        let name = self.expect_identifier()?;
        self.expect(Token::LeftParen, "(")?;
        let (params, variadic) = self.parse_params()?;
        self.expect(Token::RightParen, ")")?;
        let body = self.parse_block()?;
        self.expect(Token::End, "кінець")?;
        Ok(FunctionDecl::new(name, params, variadic, body, location))
    }

    fn parse_params(&mut self) -> Result<(Vec<Param>, Option<String>), ParseErr> {
        let mut params = Vec::new();
        let mut variadic = None;
        let mut seen = std::collections::HashSet::new();
        while !self.check(&Token::RightParen) {
            if self.matches(&Token::Star) {
                let name = self.expect_identifier()?;
                if !seen.insert(name.clone()) {
                    return Err(ParseErr::new(ParseErrKind::DuplicateParameter(name)));
                }
                variadic = Some(name);
            } else {
                let name = self.expect_identifier()?;
                if !seen.insert(name.clone()) {
                    return Err(ParseErr::new(ParseErrKind::DuplicateParameter(name)));
                }
                let default = if self.matches(&Token::Equal) {
                    Some(self.parse_expr()?)
                } else {
                    None
                };
                params.push(Param { name, default });
            }
            if !self.matches(&Token::Comma) {
                break;
            }
        }
        Ok((params, variadic))
    }

    // -- Expressions ------------------------------------------------

    fn parse_expr(&mut self) -> Result<Expr, ParseErr> {
        self.parse_assignment()
    }

    fn parse_assignment(&mut self) -> Result<Expr, ParseErr> {
        let location = self.loc();
        let expr = self.parse_binary(0)?;
        let op = match self.peek() {
            Token::Equal => Some(AssignOp::Assign),
            Token::PlusEqual => Some(AssignOp::Inplace(crate::util::InplaceOperator::Add)),
            Token::MinusEqual => Some(AssignOp::Inplace(crate::util::InplaceOperator::Subtract)),
            Token::StarEqual => Some(AssignOp::Inplace(crate::util::InplaceOperator::Multiply)),
            Token::SlashEqual => Some(AssignOp::Inplace(crate::util::InplaceOperator::Divide)),
            Token::BackslashEqual => Some(AssignOp::Inplace(crate::util::InplaceOperator::FloorDiv)),
            Token::PercentEqual => Some(AssignOp::Inplace(crate::util::InplaceOperator::Modulo)),
            _ => None,
        };
        if let Some(op) = op {
            self.advance();
            let value = self.parse_assignment()?;
            Ok(Expr::new(
                ExprKind::Assignment { target: Box::new(expr), op, value: Box::new(value) },
                location,
            ))
        } else {
            Ok(expr)
        }
    }

    fn parse_binary(&mut self, min_prec: u8) -> Result<Expr, ParseErr> {
        let mut lhs = self.parse_unary()?;
        loop {
            let token = self.peek().clone();
            let prec = get_binary_precedence(&token);
            if prec == 0 || prec < min_prec {
                break;
            }
            let location = self.loc();
            self.advance();
            let rhs = self.parse_binary(prec + 1)?;
            lhs = self.combine(token, lhs, rhs, location)?;
        }
        Ok(lhs)
    }

    fn combine(
        &self,
        token: Token,
        lhs: Expr,
        rhs: Expr,
        location: Location,
    ) -> Result<Expr, ParseErr> {
        use crate::util::{BinaryOperator as B, CompareOperator as C, LogicalOperator as L};
        let kind = match token {
            Token::Plus => ExprKind::Binary { op: B::Add, lhs: Box::new(lhs), rhs: Box::new(rhs) },
            Token::Minus => {
                ExprKind::Binary { op: B::Subtract, lhs: Box::new(lhs), rhs: Box::new(rhs) }
            }
            Token::Star => {
                ExprKind::Binary { op: B::Multiply, lhs: Box::new(lhs), rhs: Box::new(rhs) }
            }
            Token::Slash => {
                ExprKind::Binary { op: B::Divide, lhs: Box::new(lhs), rhs: Box::new(rhs) }
            }
            Token::Backslash => {
                ExprKind::Binary { op: B::FloorDiv, lhs: Box::new(lhs), rhs: Box::new(rhs) }
            }
            Token::Percent => {
                ExprKind::Binary { op: B::Modulo, lhs: Box::new(lhs), rhs: Box::new(rhs) }
            }
            Token::EqualEqual => {
                ExprKind::Compare { op: C::Eq, lhs: Box::new(lhs), rhs: Box::new(rhs) }
            }
            Token::NotEqual => {
                ExprKind::Compare { op: C::NotEq, lhs: Box::new(lhs), rhs: Box::new(rhs) }
            }
            Token::Greater => {
                ExprKind::Compare { op: C::Gt, lhs: Box::new(lhs), rhs: Box::new(rhs) }
            }
            Token::GreaterEqual => {
                ExprKind::Compare { op: C::Ge, lhs: Box::new(lhs), rhs: Box::new(rhs) }
            }
            Token::Less => ExprKind::Compare { op: C::Lt, lhs: Box::new(lhs), rhs: Box::new(rhs) },
            Token::LessEqual => {
                ExprKind::Compare { op: C::Le, lhs: Box::new(lhs), rhs: Box::new(rhs) }
            }
            Token::Is => {
                // `є не` is recognized here as the two-token sequence
                // `Is Not` (§9 open question); a standalone identity-
                // inequality spelling isn't tokenized separately, so
                // this is the one place the combination is collapsed.
                if self.check(&Token::Not) {
                    ExprKind::Compare { op: C::IsNot, lhs: Box::new(lhs), rhs: Box::new(rhs) }
                } else {
                    ExprKind::Compare { op: C::Is, lhs: Box::new(lhs), rhs: Box::new(rhs) }
                }
            }
            Token::And => ExprKind::Logical { op: L::And, lhs: Box::new(lhs), rhs: Box::new(rhs) },
            Token::Or => ExprKind::Logical { op: L::Or, lhs: Box::new(lhs), rhs: Box::new(rhs) },
            _ => unreachable!("combine called with non-operator token"),
        };
        Ok(Expr::new(kind, location))
    }

    fn parse_unary(&mut self) -> Result<Expr, ParseErr> {
        let location = self.loc();
        let token = self.peek().clone();
        let prec = get_unary_precedence(&token);
        if prec > 0 {
            use crate::util::UnaryOperator as U;
            let op = match token {
                Token::Plus => U::Plus,
                Token::Minus => U::Minus,
                Token::Not => U::Not,
                _ => unreachable!(),
            };
            self.advance();
            let operand = self.parse_unary()?;
            return Ok(Expr::new(
                ExprKind::Unary { op, operand: Box::new(operand) },
                location,
            ));
        }
        // `є не` consumed the `Not` as part of `combine`'s lookahead, so
        // a bare leading `не` here is genuine unary-not, already handled
        // above via `get_unary_precedence`.
        self.parse_postfix()
    }

    fn parse_postfix(&mut self) -> Result<Expr, ParseErr> {
        let mut expr = self.parse_primary()?;
        loop {
            match self.peek().clone() {
                Token::LeftParen => {
                    let location = self.loc();
                    self.advance();
                    let (args, kwargs) = self.parse_call_args()?;
                    self.expect(Token::RightParen, ")")?;
                    expr = Expr::new(
                        ExprKind::Call { callable: Box::new(expr), args, kwargs },
                        location,
                    );
                }
                Token::Dot => {
                    let location = self.loc();
                    self.advance();
                    let name = self.expect_identifier()?;
                    expr = Expr::new(
                        ExprKind::Attribute { object: Box::new(expr), name },
                        location,
                    );
                }
                _ => break,
            }
        }
        Ok(expr)
    }

    fn parse_call_args(&mut self) -> Result<(Vec<Expr>, Vec<(String, Expr)>), ParseErr> {
        let mut args = Vec::new();
        let mut kwargs: Vec<(String, Expr)> = Vec::new();
        while !self.check(&Token::RightParen) {
            if let Token::Identifier(name) = self.peek().clone() {
                if matches!(self.peek_at(1), Token::Equal) {
                    self.advance();
                    self.advance();
                    let value = self.parse_expr()?;
                    if kwargs.iter().any(|(n, _)| n == &name) {
                        return Err(ParseErr::new(ParseErrKind::RepeatedNamedArgument(name)));
                    }
                    kwargs.push((name, value));
                    if !self.matches(&Token::Comma) {
                        break;
                    }
                    continue;
                }
            }
            args.push(self.parse_expr()?);
            if !self.matches(&Token::Comma) {
                break;
            }
        }
        Ok((args, kwargs))
    }

    fn parse_primary(&mut self) -> Result<Expr, ParseErr> {
        let location = self.loc();
        let token = self.peek().clone();
        let expr = match token {
            Token::True => {
                self.advance();
                Expr::new(ExprKind::Literal(Literal::Bool(true)), location)
            }
            Token::False => {
                self.advance();
                Expr::new(ExprKind::Literal(Literal::Bool(false)), location)
            }
            Token::Nil => {
                self.advance();
                Expr::new(ExprKind::Literal(Literal::Nil), location)
            }
            Token::Int(text) => {
                self.advance();
                Expr::new(ExprKind::Literal(Literal::Int(text.parse().unwrap())), location)
            }
            Token::Float(text) => {
                self.advance();
                Expr::new(ExprKind::Literal(Literal::Float(text.parse().unwrap())), location)
            }
            Token::Str(parts) => {
                self.advance();
                self.build_string_literal(parts, location)?
            }
            Token::Identifier(name) => {
                self.advance();
                Expr::variable(name, location)
            }
            Token::LeftParen => {
                self.advance();
                let inner = self.parse_expr()?;
                self.expect(Token::RightParen, ")")?;
                Expr::new(ExprKind::Paren(Box::new(inner)), location)
            }
            Token::LeftSquareBracket => {
                self.advance();
                let mut items = Vec::new();
                while !self.check(&Token::RightSquareBracket) {
                    items.push(self.parse_expr()?);
                    if !self.matches(&Token::Comma) {
                        break;
                    }
                }
                self.expect(Token::RightSquareBracket, "]")?;
                Expr::new(ExprKind::List(items), location)
            }
            Token::Function => {
                let decl = self.parse_function_decl()?;
                Expr::new(ExprKind::FunctionLiteral(decl), location)
            }
            _ => {
                let found = self.tokens[self.pos.min(self.tokens.len() - 1)].clone();
                return Err(ParseErr::new(ParseErrKind::ExpectedExpression(found)));
            }
        };

        Ok(expr)
    }

    fn build_string_literal(
        &mut self,
        parts: Vec<StringPart>,
        location: Location,
    ) -> Result<Expr, ParseErr> {
        if parts.len() == 1 {
            if let StringPart::Literal(s) = &parts[0] {
                return Ok(Expr::new(ExprKind::Literal(Literal::Str(s.clone())), location));
            }
        }
        let mut built = Vec::with_capacity(parts.len());
        for part in parts {
            match part {
                StringPart::Literal(s) => built.push(InterpolatedPart::Literal(s)),
                StringPart::Group(src) => {
                    let sub_module = parse_text(&src)?;
                    let expr = match sub_module.body.into_iter().next() {
                        Some(Stmt { kind: StmtKind::Expr(e), .. }) => e,
                        _ => return Err(ParseErr::new(ParseErrKind::ExpectedExpression(
                            self.tokens[self.pos.min(self.tokens.len() - 1)].clone(),
                        ))),
                    };
                    built.push(InterpolatedPart::Group(Box::new(expr)));
                }
            }
        }
        Ok(Expr::new(ExprKind::Interpolated(built), location))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_arithmetic_precedence() {
        let module = parse_text("1 + 2 * 3").unwrap();
        assert_eq!(module.body.len(), 1);
    }

    #[test]
    fn parses_if_else() {
        let module = parse_text("якщо істина а = 1 інакше а = 2 кінець").unwrap();
        assert_eq!(module.body.len(), 1);
        match &module.body[0].kind {
            StmtKind::If { else_block, .. } => assert!(else_block.is_some()),
            other => panic!("expected if statement, got {other:?}"),
        }
    }

    #[test]
    fn parses_else_if_chain() {
        let module =
            parse_text("якщо хиба а = 1 або якщо істина а = 2 інакше а = 3 кінець").unwrap();
        match &module.body[0].kind {
            StmtKind::If { else_block: Some(block), .. } => {
                assert_eq!(block.len(), 1);
                assert!(matches!(block[0].kind, StmtKind::If { .. }));
            }
            other => panic!("expected nested if, got {other:?}"),
        }
    }

    #[test]
    fn parses_function_with_defaults_and_variadic() {
        let module = parse_text("функція f(x, y=10, *решта) повернути x кінець").unwrap();
        match &module.body[0].kind {
            StmtKind::FunctionDecl(decl) => {
                assert_eq!(decl.params.len(), 2);
                assert_eq!(decl.variadic.as_deref(), Some("решта"));
            }
            other => panic!("expected function decl, got {other:?}"),
        }
    }

    #[test]
    fn parses_named_call_arguments() {
        let module = parse_text("f(1, z=5)").unwrap();
        match &module.body[0].kind {
            StmtKind::Expr(Expr { kind: ExprKind::Call { args, kwargs, .. }, .. }) => {
                assert_eq!(args.len(), 1);
                assert_eq!(kwargs.len(), 1);
            }
            other => panic!("expected call, got {other:?}"),
        }
    }

    #[test]
    fn rejects_repeated_named_argument() {
        let result = parse_text("f(1, y=2, y=3)");
        assert!(result.is_err());
    }

    #[test]
    fn parses_attribute_and_method_call() {
        let module = parse_text("[3, 2].впорядкувати()").unwrap();
        match &module.body[0].kind {
            StmtKind::Expr(Expr { kind: ExprKind::Call { callable, .. }, .. }) => {
                match &callable.kind {
                    ExprKind::Attribute { name, .. } => assert_eq!(name, "впорядкувати"),
                    other => panic!("expected attribute callable, got {other:?}"),
                }
            }
            other => panic!("expected call, got {other:?}"),
        }
    }
}
