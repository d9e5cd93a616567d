//! 字段键（field key）的词法分析器
//!
//! 字段键的形如 `93_170`、`50_157_input0`、`1_142OR151OR152_operator`
//! 或单独的 `142OR151OR152`。

use crate::token::{Span, Token, TokenKind};

pub struct Lexer<'a> {
    input: &'a str,
    /// 输入字符串中的当前位置（字节索引）
    position: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Lexer { input, position: 0 }
    }

    /// 返回当前位置的字符，不推进位置
    fn peek(&self) -> Option<char> {
        self.input[self.position..].chars().next()
    }

    /// 返回下一个位置的字符，不推进位置
    fn peek_next(&self) -> Option<char> {
        self.input[self.position..].chars().nth(1)
    }

    /// 推进位置一个字符并返回该字符
    fn bump(&mut self) -> Option<char> {
        let c = self.peek();
        if let Some(c) = c {
            self.position += c.len_utf8();
        }
        c
    }

    /// 读取数字序列，保留原始文本（字段 id 可能超出整数范围）
    fn read_number(&mut self, start: usize) -> Token<'a> {
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() {
                self.bump();
            } else {
                break;
            }
        }
        Token {
            kind: TokenKind::Number(&self.input[start..self.position]),
            span: Span::new(start, self.position),
        }
    }

    /// 读取后缀关键字
    /// 注意：第一个字母已经被调用者消费
    fn read_identifier(&mut self, start: usize) -> Token<'a> {
        while let Some(c) = self.peek() {
            if c.is_ascii_alphanumeric() {
                self.bump();
            } else {
                break;
            }
        }
        let literal = &self.input[start..self.position];
        Token {
            kind: match_keyword(literal),
            span: Span::new(start, self.position),
        }
    }
}

fn match_keyword(s: &str) -> TokenKind<'_> {
    match s {
        "input0" => TokenKind::Input0,
        "input1" => TokenKind::Input1,
        "operator" => TokenKind::Operator,
        _ => TokenKind::Illegal,
    }
}

impl<'a> Iterator for Lexer<'a> {
    type Item = Token<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let start = self.position;

        let Some(c) = self.bump() else {
            return None; // 到达输入末尾
        };

        let token = match c {
            '_' => Token { kind: TokenKind::Underscore, span: Span::new(start, self.position) },
            // 只有紧跟数字的大写 "OR" 才是字段 id 的分隔符
            'O' if self.peek() == Some('R') && self.peek_next().is_some_and(|n| n.is_ascii_digit()) => {
                self.bump();
                Token { kind: TokenKind::Or, span: Span::new(start, self.position) }
            }
            c if c.is_ascii_digit() => self.read_number(start),
            c if c.is_ascii_alphabetic() => self.read_identifier(start),
            _ => Token { kind: TokenKind::Illegal, span: Span::new(start, self.position) },
        };
        Some(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_field_key() {
        let mut lexer = Lexer::new("93_170");

        assert_eq!(lexer.next().unwrap().kind, TokenKind::Number("93"));
        assert_eq!(lexer.next().unwrap().kind, TokenKind::Underscore);
        assert_eq!(lexer.next().unwrap().kind, TokenKind::Number("170"));
        assert_eq!(lexer.next(), None);
    }

    #[test]
    fn test_suffix_keywords() {
        let input = "50_157_input0 50_157_input1 50_157_operator";
        for (key, suffix) in input.split(' ').zip([TokenKind::Input0, TokenKind::Input1, TokenKind::Operator]) {
            let kinds: Vec<_> = Lexer::new(key).map(|t| t.kind).collect();
            assert_eq!(
                kinds,
                vec![
                    TokenKind::Number("50"),
                    TokenKind::Underscore,
                    TokenKind::Number("157"),
                    TokenKind::Underscore,
                    suffix,
                ]
            );
        }
    }

    #[test]
    fn test_variable_field_ids() {
        let kinds: Vec<_> = Lexer::new("1_142OR151OR152_operator").map(|t| t.kind).collect();
        assert_eq!(
            kinds,
            vec![
                TokenKind::Number("1"),
                TokenKind::Underscore,
                TokenKind::Number("142"),
                TokenKind::Or,
                TokenKind::Number("151"),
                TokenKind::Or,
                TokenKind::Number("152"),
                TokenKind::Underscore,
                TokenKind::Operator,
            ]
        );
    }

    #[test]
    fn test_dangling_or_is_illegal() {
        let kinds: Vec<_> = Lexer::new("142OR").map(|t| t.kind).collect();
        assert_eq!(kinds, vec![TokenKind::Number("142"), TokenKind::Illegal]);
    }

    #[test]
    fn test_unknown_characters() {
        let kinds: Vec<_> = Lexer::new("32-x_or").map(|t| t.kind).collect();
        assert_eq!(
            kinds,
            vec![
                TokenKind::Number("32"),
                TokenKind::Illegal,
                TokenKind::Illegal,
                TokenKind::Underscore,
                TokenKind::Illegal,
            ]
        );
    }

    #[test]
    fn test_spans() {
        let tokens: Vec<_> = Lexer::new("1_142OR151").collect();
        assert_eq!(tokens[3].span, Span::new(5, 7));
        assert_eq!(tokens[4].span, Span::new(7, 10));
    }
}
