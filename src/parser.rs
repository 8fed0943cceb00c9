/// Recursive-descent parser producing the canonical AST.
///
/// Grammar (informal):
/// ```text
/// module     := (function_decl | var_decl | array_decl)*
/// function   := ret_type ident "(" params? ")" block
/// ret_type   := "none" | "void" | scalar_type
/// params     := param ("," param)*
/// param      := scalar_type ("[" "]")? ident
/// var_decl   := scalar_type ident ("=" expr)? ";"
/// array_decl := scalar_type "[" expr? "]" ident ("=" array_lit)? ";"
/// stmt       := var_decl | array_decl | if | while | for
///             | "break" ";" | "continue" ";" | "return" expr? ";"
///             | (lvalue assign_op expr | expr) ";"
/// expr       := or_expr
/// or_expr    := and_expr ("or" and_expr)*
/// and_expr   := equality ("and" equality)*
/// equality   := relational (("==" | "!=") relational)*
/// relational := additive (("<" | "<=" | ">" | ">=") additive)*
/// additive   := multiplicative (("+" | "-") multiplicative)*
/// multiplic. := unary (("*" | "/" | "%") unary)*
/// unary      := ("+" | "-" | "not") unary | postfix
/// postfix    := primary ("[" expr "]")*
/// primary    := int | float | "true" | "false" | "none" | ident
///             | ident "(" args? ")" | "(" expr ")" | "[" args? "]"
/// ```
use crate::ast::*;
use crate::decimal::BigFloat;
use crate::errors::{ParseError, Span};
use crate::lexer::{Token, TokenKind};

pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Parser { tokens, pos: 0 }
    }

    pub fn parse_module(&mut self) -> Result<Module, ParseError> {
        let mut stmts = Vec::new();
        while !self.at_eof() {
            stmts.push(self.parse_top_level()?);
        }
        Ok(stmts)
    }

    // -- token helpers --------------------------------------------------

    fn cur(&self) -> &Token {
        &self.tokens[self.pos]
    }

    fn at_eof(&self) -> bool {
        matches!(self.cur().kind, TokenKind::Eof)
    }

    fn advance(&mut self) -> Token {
        let t = self.tokens[self.pos].clone();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        t
    }

    fn check(&self, kind: &TokenKind) -> bool {
        std::mem::discriminant(&self.cur().kind) == std::mem::discriminant(kind)
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: TokenKind, what: &str) -> Result<Token, ParseError> {
        if self.check(&kind) {
            Ok(self.advance())
        } else {
            Err(ParseError::UnexpectedToken {
                expected: what.to_string(),
                found: format!("{:?}", self.cur().kind),
                span: self.cur().span,
            })
        }
    }

    fn expect_identifier(&mut self) -> Result<(String, Span), ParseError> {
        match self.cur().kind.clone() {
            TokenKind::Identifier(name) => {
                let span = self.cur().span;
                self.advance();
                Ok((name, span))
            }
            _ => Err(ParseError::UnexpectedToken {
                expected: "identifier".to_string(),
                found: format!("{:?}", self.cur().kind),
                span: self.cur().span,
            }),
        }
    }

    fn is_type_start(&self) -> bool {
        matches!(
            self.cur().kind,
            TokenKind::KwInt | TokenKind::KwLong | TokenKind::KwBool | TokenKind::KwFloat | TokenKind::KwStruct
        )
    }

    /// A top-level declaration always opens with a type keyword: either a
    /// scalar type (var/array decl or a scalar-returning function) or
    /// `none`/`void` (a function returning nothing — the two are synonyms).
    fn is_top_level_type_start(&self) -> bool {
        self.is_type_start() || matches!(self.cur().kind, TokenKind::KwNone | TokenKind::KwVoid)
    }

    fn parse_scalar_type(&mut self) -> Result<ScalarType, ParseError> {
        let t = match self.cur().kind {
            TokenKind::KwInt => ScalarType::Int,
            TokenKind::KwLong => ScalarType::Long,
            TokenKind::KwBool => ScalarType::Bool,
            TokenKind::KwFloat => ScalarType::Float,
            _ => {
                return Err(ParseError::UnexpectedToken {
                    expected: "a type".to_string(),
                    found: format!("{:?}", self.cur().kind),
                    span: self.cur().span,
                })
            }
        };
        self.advance();
        Ok(t)
    }

    /// `none` and `void` are synonyms for "this declaration yields nothing" —
    /// `void` only ever appears here, as a function's return type.
    fn parse_return_type(&mut self) -> Result<TypeVar, ParseError> {
        if self.eat(&TokenKind::KwNone) || self.eat(&TokenKind::KwVoid) {
            return Ok(TypeVar::None);
        }
        let scalar = self.parse_scalar_type()?;
        Ok(scalar_to_typevar(scalar))
    }

    // -- top level --------------------------------------------------------

    /// Top-level items all start with a return/var type, so the function-vs-
    /// declaration choice can only be made after the type and name are both
    /// in hand: `int main() { ... }` vs `int total;` vs `int[5] a = [...];`.
    fn parse_top_level(&mut self) -> Result<Stmt, ParseError> {
        let start = self.cur().span;
        let return_ty = self.parse_return_type()?;
        if self.check(&TokenKind::LBracket) {
            // An array-typed declaration; only scalar element types make
            // sense here, which `parse_return_type` already guarantees
            // unless `none`/`void` was used as an (invalid) element type.
            let scalar = typevar_to_scalar(return_ty, start)?;
            return self.parse_array_decl_tail(scalar, start);
        }
        let (name, _) = self.expect_identifier()?;
        if self.check(&TokenKind::LParen) {
            self.parse_function_decl_tail(name, return_ty, start)
        } else {
            let scalar = typevar_to_scalar(return_ty, start)?;
            self.parse_var_decl_tail(name, scalar, start)
        }
    }

    fn parse_function_decl_tail(&mut self, name: String, return_ty: TypeVar, start: Span) -> Result<Stmt, ParseError> {
        self.expect(TokenKind::LParen, "'('")?;
        let mut params = Vec::new();
        if !self.check(&TokenKind::RParen) {
            loop {
                let scalar = self.parse_scalar_type()?;
                let is_array = self.eat(&TokenKind::LBracket);
                if is_array {
                    self.expect(TokenKind::RBracket, "']'")?;
                }
                let (pname, _) = self.expect_identifier()?;
                let ty = if is_array { TypeVar::array_of(scalar) } else { scalar_to_typevar(scalar) };
                params.push((pname, ty));
                if !self.eat(&TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(TokenKind::RParen, "')'")?;
        let body = self.parse_block()?;
        let span = start.merge(self.tokens[self.pos.saturating_sub(1)].span);
        Ok(Stmt::FunctionDecl { name, params, return_ty, body, span })
    }

    fn parse_block(&mut self) -> Result<Vec<Stmt>, ParseError> {
        self.expect(TokenKind::LBrace, "'{'")?;
        let mut stmts = Vec::new();
        while !self.check(&TokenKind::RBrace) {
            if self.at_eof() {
                return Err(ParseError::UnexpectedEof { context: "block".to_string(), span: self.cur().span });
            }
            stmts.push(self.parse_stmt()?);
        }
        self.advance(); // '}'
        Ok(stmts)
    }

    // -- statements --------------------------------------------------------

    fn parse_stmt(&mut self) -> Result<Stmt, ParseError> {
        match self.cur().kind {
            TokenKind::KwIf => self.parse_if(),
            TokenKind::KwWhile => self.parse_while(),
            TokenKind::KwFor => self.parse_for(),
            TokenKind::KwBreak => {
                let span = self.cur().span;
                self.advance();
                self.expect(TokenKind::Semi, "';'")?;
                Ok(Stmt::Break(span))
            }
            TokenKind::KwContinue => {
                let span = self.cur().span;
                self.advance();
                self.expect(TokenKind::Semi, "';'")?;
                Ok(Stmt::Continue(span))
            }
            TokenKind::KwReturn => {
                let start = self.cur().span;
                self.advance();
                let value = if self.check(&TokenKind::Semi) { None } else { Some(self.parse_expr()?) };
                let end = self.cur().span;
                self.expect(TokenKind::Semi, "';'")?;
                Ok(Stmt::Return(value, start.merge(end)))
            }
            _ if self.is_type_start() => self.parse_decl_stmt(),
            _ => self.parse_expr_or_assign_stmt(),
        }
    }

    fn parse_decl_stmt(&mut self) -> Result<Stmt, ParseError> {
        let start = self.cur().span;
        let scalar = self.parse_scalar_type()?;
        if self.check(&TokenKind::LBracket) {
            self.parse_array_decl_tail(scalar, start)
        } else {
            let (name, _) = self.expect_identifier()?;
            self.parse_var_decl_tail(name, scalar, start)
        }
    }

    /// Shared tail for `type[size?] name (= init)? ;`, entered once the
    /// leading scalar type has already been consumed by the caller.
    fn parse_array_decl_tail(&mut self, scalar: ScalarType, start: Span) -> Result<Stmt, ParseError> {
        self.expect(TokenKind::LBracket, "'['")?;
        let size = if self.check(&TokenKind::RBracket) { None } else { Some(self.parse_expr()?) };
        self.expect(TokenKind::RBracket, "']'")?;
        let (name, _) = self.expect_identifier()?;
        let init = if self.eat(&TokenKind::Assign) { Some(self.parse_expr()?) } else { None };
        let end = self.cur().span;
        self.expect(TokenKind::Semi, "';'")?;
        Ok(Stmt::ArrayDecl { name, elem_ty: scalar, size, init, span: start.merge(end) })
    }

    /// Shared tail for `type name (= init)? ;`, entered once the leading
    /// scalar type and the identifier have already been consumed.
    fn parse_var_decl_tail(&mut self, name: String, scalar: ScalarType, start: Span) -> Result<Stmt, ParseError> {
        let init = if self.eat(&TokenKind::Assign) { Some(self.parse_expr()?) } else { None };
        let end = self.cur().span;
        self.expect(TokenKind::Semi, "';'")?;
        Ok(Stmt::VarDecl { name, ty: scalar_to_typevar(scalar), init, span: start.merge(end) })
    }

    fn parse_if(&mut self) -> Result<Stmt, ParseError> {
        let start = self.cur().span;
        self.advance(); // if
        self.expect(TokenKind::LParen, "'('")?;
        let cond = self.parse_expr()?;
        self.expect(TokenKind::RParen, "')'")?;
        let body = self.parse_block()?;
        let mut branches = vec![(cond, body)];
        while matches!(self.cur().kind, TokenKind::KwElif) {
            self.advance();
            self.expect(TokenKind::LParen, "'('")?;
            let c = self.parse_expr()?;
            self.expect(TokenKind::RParen, "')'")?;
            let b = self.parse_block()?;
            branches.push((c, b));
        }
        let else_body = if matches!(self.cur().kind, TokenKind::KwElse) {
            self.advance();
            Some(self.parse_block()?)
        } else {
            None
        };
        let end = self.tokens[self.pos.saturating_sub(1)].span;
        Ok(Stmt::If { branches, else_body, span: start.merge(end) })
    }

    fn parse_while(&mut self) -> Result<Stmt, ParseError> {
        let start = self.cur().span;
        self.advance();
        self.expect(TokenKind::LParen, "'('")?;
        let cond = self.parse_expr()?;
        self.expect(TokenKind::RParen, "')'")?;
        let body = self.parse_block()?;
        let end = self.tokens[self.pos.saturating_sub(1)].span;
        Ok(Stmt::While { cond, body, span: start.merge(end) })
    }

    fn parse_for(&mut self) -> Result<Stmt, ParseError> {
        let start = self.cur().span;
        self.advance();
        self.expect(TokenKind::LParen, "'('")?;
        let init = if self.check(&TokenKind::Semi) {
            None
        } else {
            Some(Box::new(self.parse_for_clause_stmt()?))
        };
        self.expect(TokenKind::Semi, "';'")?;
        let cond = if self.check(&TokenKind::Semi) { None } else { Some(self.parse_expr()?) };
        self.expect(TokenKind::Semi, "';'")?;
        let incr = if self.check(&TokenKind::RParen) {
            None
        } else {
            Some(Box::new(self.parse_for_clause_stmt()?))
        };
        self.expect(TokenKind::RParen, "')'")?;
        let body = self.parse_block()?;
        let end = self.tokens[self.pos.saturating_sub(1)].span;
        Ok(Stmt::For { init, cond, incr, body, span: start.merge(end) })
    }

    /// A single statement inside `for(...)` parens, without a trailing `;`.
    fn parse_for_clause_stmt(&mut self) -> Result<Stmt, ParseError> {
        if self.is_type_start() {
            let start = self.cur().span;
            let scalar = self.parse_scalar_type()?;
            let (name, _) = self.expect_identifier()?;
            let init = if self.eat(&TokenKind::Assign) { Some(self.parse_expr()?) } else { None };
            let end = self.tokens[self.pos.saturating_sub(1)].span;
            Ok(Stmt::VarDecl { name, ty: scalar_to_typevar(scalar), init, span: start.merge(end) })
        } else {
            self.parse_assign_or_expr(false)
        }
    }

    fn parse_expr_or_assign_stmt(&mut self) -> Result<Stmt, ParseError> {
        let stmt = self.parse_assign_or_expr(true)?;
        Ok(stmt)
    }

    fn parse_assign_or_expr(&mut self, consume_semi: bool) -> Result<Stmt, ParseError> {
        let start = self.cur().span;
        let expr = self.parse_expr()?;
        let assign_op = match self.cur().kind {
            TokenKind::Assign => Some(None),
            TokenKind::PlusEq => Some(Some(BinOp::Add)),
            TokenKind::MinusEq => Some(Some(BinOp::Sub)),
            TokenKind::StarEq => Some(Some(BinOp::Mul)),
            TokenKind::SlashEq => Some(Some(BinOp::Div)),
            TokenKind::PercentEq => Some(Some(BinOp::Mod)),
            _ => None,
        };
        let stmt = if let Some(compound) = assign_op {
            self.advance();
            let target = expr_to_target(expr)?;
            let rhs = self.parse_expr()?;
            let value = match compound {
                None => rhs,
                Some(op) => Expr::Binary {
                    op,
                    left: Box::new(target_to_expr(&target)),
                    right: Box::new(rhs),
                    span: start,
                },
            };
            let end = self.tokens[self.pos.saturating_sub(1)].span;
            Stmt::Assign { target, value, span: start.merge(end) }
        } else {
            Stmt::ExprStmt(expr)
        };
        if consume_semi {
            self.expect(TokenKind::Semi, "';'")?;
        }
        Ok(stmt)
    }

    // -- expressions, precedence climbing ---------------------------------

    fn parse_expr(&mut self) -> Result<Expr, ParseError> {
        self.parse_or()
    }

    fn parse_or(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_and()?;
        while matches!(self.cur().kind, TokenKind::KwOr) {
            self.advance();
            let right = self.parse_and()?;
            let span = left.span().merge(right.span());
            left = Expr::Binary { op: BinOp::Or, left: Box::new(left), right: Box::new(right), span };
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_equality()?;
        while matches!(self.cur().kind, TokenKind::KwAnd) {
            self.advance();
            let right = self.parse_equality()?;
            let span = left.span().merge(right.span());
            left = Expr::Binary { op: BinOp::And, left: Box::new(left), right: Box::new(right), span };
        }
        Ok(left)
    }

    fn parse_equality(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_relational()?;
        loop {
            let op = match self.cur().kind {
                TokenKind::EqEq => BinOp::Eq,
                TokenKind::NotEq => BinOp::Ne,
                _ => break,
            };
            self.advance();
            let right = self.parse_relational()?;
            let span = left.span().merge(right.span());
            left = Expr::Binary { op, left: Box::new(left), right: Box::new(right), span };
        }
        Ok(left)
    }

    fn parse_relational(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_additive()?;
        loop {
            let op = match self.cur().kind {
                TokenKind::Lt => BinOp::Lt,
                TokenKind::Le => BinOp::Le,
                TokenKind::Gt => BinOp::Gt,
                TokenKind::Ge => BinOp::Ge,
                _ => break,
            };
            self.advance();
            let right = self.parse_additive()?;
            let span = left.span().merge(right.span());
            left = Expr::Binary { op, left: Box::new(left), right: Box::new(right), span };
        }
        Ok(left)
    }

    fn parse_additive(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_multiplicative()?;
        loop {
            let op = match self.cur().kind {
                TokenKind::Plus => BinOp::Add,
                TokenKind::Minus => BinOp::Sub,
                _ => break,
            };
            self.advance();
            let right = self.parse_multiplicative()?;
            let span = left.span().merge(right.span());
            left = Expr::Binary { op, left: Box::new(left), right: Box::new(right), span };
        }
        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_unary()?;
        loop {
            let op = match self.cur().kind {
                TokenKind::Star => BinOp::Mul,
                TokenKind::Slash => BinOp::Div,
                TokenKind::Percent => BinOp::Mod,
                _ => break,
            };
            self.advance();
            let right = self.parse_unary()?;
            let span = left.span().merge(right.span());
            left = Expr::Binary { op, left: Box::new(left), right: Box::new(right), span };
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expr, ParseError> {
        let op = match self.cur().kind {
            TokenKind::Plus => Some(UnOp::Pos),
            TokenKind::Minus => Some(UnOp::Neg),
            TokenKind::KwNot => Some(UnOp::Not),
            _ => None,
        };
        if let Some(op) = op {
            let start = self.cur().span;
            self.advance();
            let operand = self.parse_unary()?;
            let span = start.merge(operand.span());
            return Ok(Expr::Unary { op, operand: Box::new(operand), span });
        }
        self.parse_postfix()
    }

    fn parse_postfix(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.parse_primary()?;
        loop {
            if self.eat(&TokenKind::LBracket) {
                let index = self.parse_expr()?;
                let end = self.cur().span;
                self.expect(TokenKind::RBracket, "']'")?;
                let span = expr.span().merge(end);
                expr = Expr::Index { array: Box::new(expr), index: Box::new(index), span };
            } else {
                break;
            }
        }
        Ok(expr)
    }

    fn parse_primary(&mut self) -> Result<Expr, ParseError> {
        let span = self.cur().span;
        match self.cur().kind.clone() {
            TokenKind::IntLit(v) => {
                self.advance();
                Ok(Expr::IntLit(v, span))
            }
            TokenKind::FloatLit(text) => {
                self.advance();
                Ok(Expr::FloatLit(BigFloat::parse(&text), span))
            }
            TokenKind::KwTrue => {
                self.advance();
                Ok(Expr::BoolLit(true, span))
            }
            TokenKind::KwFalse => {
                self.advance();
                Ok(Expr::BoolLit(false, span))
            }
            TokenKind::KwNone => {
                self.advance();
                Ok(Expr::NoneLit(span))
            }
            TokenKind::Identifier(name) => {
                self.advance();
                if self.eat(&TokenKind::LParen) {
                    let mut args = Vec::new();
                    if !self.check(&TokenKind::RParen) {
                        loop {
                            args.push(self.parse_expr()?);
                            if !self.eat(&TokenKind::Comma) {
                                break;
                            }
                        }
                    }
                    let end = self.cur().span;
                    self.expect(TokenKind::RParen, "')'")?;
                    Ok(Expr::Call { callee: name, args, span: span.merge(end) })
                } else {
                    Ok(Expr::Identifier(name, span))
                }
            }
            TokenKind::LParen => {
                self.advance();
                let inner = self.parse_expr()?;
                self.expect(TokenKind::RParen, "')'")?;
                Ok(inner)
            }
            TokenKind::LBracket => {
                self.advance();
                let mut items = Vec::new();
                if !self.check(&TokenKind::RBracket) {
                    loop {
                        items.push(self.parse_expr()?);
                        if !self.eat(&TokenKind::Comma) {
                            break;
                        }
                    }
                }
                let end = self.cur().span;
                self.expect(TokenKind::RBracket, "']'")?;
                Ok(Expr::ArrayLit(items, span.merge(end)))
            }
            _ => Err(ParseError::UnexpectedToken {
                expected: "an expression".to_string(),
                found: format!("{:?}", self.cur().kind),
                span,
            }),
        }
    }
}

fn scalar_to_typevar(s: ScalarType) -> TypeVar {
    match s {
        ScalarType::Int => TypeVar::Int,
        ScalarType::Long => TypeVar::Long,
        ScalarType::Bool => TypeVar::Bool,
        ScalarType::Float => TypeVar::Float,
    }
}

/// `none`/`void` can only appear as a return type; reaching this means one
/// was used where a variable or array's element type is expected instead.
fn typevar_to_scalar(ty: TypeVar, span: Span) -> Result<ScalarType, ParseError> {
    match ty {
        TypeVar::Int => Ok(ScalarType::Int),
        TypeVar::Long => Ok(ScalarType::Long),
        TypeVar::Bool => Ok(ScalarType::Bool),
        TypeVar::Float => Ok(ScalarType::Float),
        _ => Err(ParseError::InvalidSyntax { context: "variable or array element type".to_string(), span }),
    }
}

fn expr_to_target(expr: Expr) -> Result<AssignTarget, ParseError> {
    match expr {
        Expr::Identifier(name, _) => Ok(AssignTarget::Name(name)),
        Expr::Index { array, index, .. } => Ok(AssignTarget::Index { array, index }),
        other => Err(ParseError::InvalidSyntax {
            context: "assignment target".to_string(),
            span: other.span(),
        }),
    }
}

fn target_to_expr(target: &AssignTarget) -> Expr {
    match target {
        AssignTarget::Name(name) => Expr::Identifier(name.clone(), Span::default()),
        AssignTarget::Index { array, index } => {
            Expr::Index { array: array.clone(), index: index.clone(), span: Span::default() }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::Lexer;

    fn parse(src: &str) -> Module {
        let tokens = Lexer::new(src).tokenize().unwrap();
        Parser::new(tokens).parse_module().unwrap()
    }

    #[test]
    fn parses_var_decl_and_return() {
        let m = parse("int main() { int x = 1 + 2; return x; }");
        assert_eq!(m.len(), 1);
    }

    #[test]
    fn parses_if_elif_else() {
        let m = parse("int main() { if (1 < 2) { } elif (2 < 3) { } else { } return 0; }");
        assert_eq!(m.len(), 1);
    }

    #[test]
    fn parses_array_decl_and_index() {
        let m = parse("int main() { int[5] a = [1,2,3,4,5]; a[0] = a[1]; return a[0]; }");
        assert_eq!(m.len(), 1);
    }

    #[test]
    fn parses_c_style_for() {
        let m = parse("int main() { int s = 0; for (int i = 0; i < 10; i += 1) { s += i; } return s; }");
        assert_eq!(m.len(), 1);
    }

    #[test]
    fn parses_void_function_and_top_level_vars() {
        let m = parse("int counter; void main() { counter = 1; return; }");
        assert_eq!(m.len(), 2);
        assert!(matches!(m[0], Stmt::VarDecl { .. }));
        assert!(matches!(m[1], Stmt::FunctionDecl { ref name, .. } if name == "main"));
    }

    #[test]
    fn parses_function_with_array_param() {
        let m = parse("int sum(int[] a) { return a[0]; }");
        assert_eq!(m.len(), 1);
    }
}
