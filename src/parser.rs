//! 字段键的语法分析器
//!
//! ## 解析流程图
//!
//! ```text
//! parse()
//!   ├─ 以 '_' 开头 → 没有概念 id
//!   │                 ├─ parse_field_spec()
//!   │                 └─ parse_suffix()
//!   │
//!   └─ 以数字开头 → parse_field_spec()
//!        ├─ 输入结束 → 变量字段选择器（至少两个 id）
//!        └─ 遇到 '_' → 前面的单个数字是概念 id
//!                      ├─ parse_field_spec()
//!                      └─ parse_suffix()
//! ```
//!
//! ## 支持的键
//!
//! ```text
//! 93_170                      简单字段
//! 50_157_input0               复合控件的一端
//! 50_157_operator             运算符选择
//! 1_142OR151OR152_operator    变量字段
//! 142OR151OR152               变量字段选择器
//! ```

use crate::ast::ConceptId;
use crate::field_key::{FieldKey, FieldSpec, KeyShape, Suffix};
use crate::token::{Span, Token, TokenKind};

pub struct Parser<'a> {
    tokens: &'a [Token<'a>],
    position: usize,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{message}")]
pub struct ParseError {
    pub message: String,
    pub span: Option<Span>,
}

impl ParseError {
    fn new(message: String, span: Option<Span>) -> Self {
        Self { message, span }
    }

    fn at_position(message: String, span: Span) -> Self {
        Self { message, span: Some(span) }
    }
}

impl<'a> Parser<'a> {
    pub fn new(tokens: &'a [Token<'a>]) -> Self {
        Self {
            tokens,
            position: 0,
        }
    }

    /// 返回当前 token，不推进位置
    fn peek(&self) -> Option<&Token<'a>> {
        self.tokens.get(self.position)
    }

    /// 返回当前 token 并推进位置
    fn advance(&mut self) -> Option<&Token<'a>> {
        if self.position < self.tokens.len() {
            let token = &self.tokens[self.position];
            self.position += 1;
            Some(token)
        } else {
            None
        }
    }

    /// 检查当前 token 是否匹配给定类型
    fn match_token(&self, kind: &TokenKind) -> bool {
        if let Some(token) = self.peek() {
            std::mem::discriminant(&token.kind) == std::mem::discriminant(kind)
        } else {
            false
        }
    }

    /// 期望特定类型的 token 并推进，否则返回错误
    fn expect(&mut self, expected: TokenKind) -> Result<Span, ParseError> {
        match self.peek() {
            Some(token) if std::mem::discriminant(&token.kind) == std::mem::discriminant(&expected) => {
                let span = token.span;
                self.position += 1;
                Ok(span)
            }
            Some(token) => Err(ParseError::at_position(
                format!("Expected {:?}, found {:?}", expected, token.kind),
                token.span,
            )),
            None => Err(ParseError::new(
                format!("Expected {:?}, but reached end of key", expected),
                None,
            )),
        }
    }

    /// 期望输入已经结束
    fn expect_end(&self) -> Result<(), ParseError> {
        match self.peek() {
            None => Ok(()),
            Some(token) => Err(ParseError::at_position(
                format!("Expected end of key, found {:?}", token.kind),
                token.span,
            )),
        }
    }

    pub fn parse(&mut self) -> Result<KeyShape, ParseError> {
        let Some(first) = self.peek() else {
            return Err(ParseError::new("Empty field key".to_string(), None));
        };
        let (bare, leading_span) = (first.kind == TokenKind::Underscore, first.span);

        if bare {
            self.advance(); // 消费 '_'
            return self.parse_field_key(None);
        }

        let leading = self.parse_field_spec()?;

        if self.peek().is_none() {
            if leading.is_variable() {
                return Ok(KeyShape::VariableSelector(leading));
            }
            return Err(ParseError::at_position(
                "A single field id is not a field key".to_string(),
                leading_span,
            ));
        }

        self.expect(TokenKind::Underscore)?;

        // '_' 之前的部分只能是单个数字形式的概念 id
        if leading.is_variable() {
            return Err(ParseError::at_position(
                "Concept id cannot list several ids".to_string(),
                leading_span,
            ));
        }
        let concept_id = leading.ids()[0].parse::<ConceptId>().map_err(|e| {
            ParseError::at_position(format!("Invalid concept id: {}", e), leading_span)
        })?;

        self.parse_field_key(Some(concept_id))
    }

    /// 解析概念 id 之后的部分：字段说明和可选后缀
    fn parse_field_key(&mut self, concept_id: Option<ConceptId>) -> Result<KeyShape, ParseError> {
        let spec = self.parse_field_spec()?;
        let suffix = self.parse_suffix()?;
        self.expect_end()?;

        Ok(KeyShape::Field(FieldKey {
            concept_id,
            spec,
            suffix,
        }))
    }

    /// 解析 `数字 (OR 数字)*`
    fn parse_field_spec(&mut self) -> Result<FieldSpec, ParseError> {
        let mut ids = vec![self.parse_number()?];
        while self.match_token(&TokenKind::Or) {
            self.advance(); // 消费 "OR"
            ids.push(self.parse_number()?);
        }
        FieldSpec::new(ids).ok_or_else(|| ParseError::new("Missing field id".to_string(), None))
    }

    fn parse_number(&mut self) -> Result<String, ParseError> {
        match self.advance() {
            Some(Token { kind: TokenKind::Number(digits), .. }) => Ok(digits.to_string()),
            Some(token) => Err(ParseError::at_position(
                format!("Expected field id, found {:?}", token.kind),
                token.span,
            )),
            None => Err(ParseError::new(
                "Expected field id, but reached end of key".to_string(),
                None,
            )),
        }
    }

    /// 解析 `_input0`、`_input1` 或 `_operator`
    fn parse_suffix(&mut self) -> Result<Option<Suffix>, ParseError> {
        if !self.match_token(&TokenKind::Underscore) {
            return Ok(None);
        }
        self.advance(); // 消费 '_'

        match self.advance() {
            Some(Token { kind: TokenKind::Input0, .. }) => Ok(Some(Suffix::Input0)),
            Some(Token { kind: TokenKind::Input1, .. }) => Ok(Some(Suffix::Input1)),
            Some(Token { kind: TokenKind::Operator, .. }) => Ok(Some(Suffix::Operator)),
            Some(token) => Err(ParseError::at_position(
                format!("Unknown key suffix {:?}", token.kind),
                token.span,
            )),
            None => Err(ParseError::new(
                "Expected key suffix, but reached end of key".to_string(),
                None,
            )),
        }
    }
}
