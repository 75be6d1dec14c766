//
//  Copyright (C) 2022-2024  Chase Ruskin
//
//  This program is free software: you can redistribute it and/or modify
//  it under the terms of the GNU General Public License as published by
//  the Free Software Foundation, either version 3 of the License, or
//  (at your option) any later version.
//
//  This program is distributed in the hope that it will be useful,
//  but WITHOUT ANY WARRANTY; without even the implied warranty of
//  MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
//  GNU General Public License for more details.
//
//  You should have received a copy of the GNU General Public License
//  along with this program.  If not, see <http://www.gnu.org/licenses/>.
//

//! A coarse tokenizer shared by the HDL scanners.
//!
//! Only words and single-character symbols survive; comments, strings,
//! character literals, and compiler directives are dropped.

use std::fmt::Display;
use std::iter::Peekable;

#[derive(Debug, PartialEq, Clone)]
pub enum Token {
    Word(String),
    Symbol(char),
}

impl Token {
    /// Checks if the token is the word `s`.
    pub fn is_word(&self, s: &str) -> bool {
        match self {
            Self::Word(w) => w == s,
            Self::Symbol(_) => false,
        }
    }

    pub fn is_symbol(&self, c: char) -> bool {
        self == &Self::Symbol(c)
    }

    pub fn as_word(&self) -> Option<&str> {
        match self {
            Self::Word(w) => Some(w.as_str()),
            Self::Symbol(_) => None,
        }
    }
}

impl Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Word(w) => write!(f, "{}", w),
            Self::Symbol(c) => write!(f, "{}", c),
        }
    }
}

/// The lexical conventions of a language.
#[derive(Debug, PartialEq)]
pub struct Syntax {
    /// Characters that start a comment running to the end of the line.
    pub line_comment: &'static str,
    /// Identifiers are case-insensitive and are lowercased.
    pub fold_case: bool,
    /// Verilog-family conventions: directives, attributes, escaped identifiers.
    pub verilog: bool,
}

pub const VHDL_SYNTAX: Syntax = Syntax {
    line_comment: "--",
    fold_case: true,
    verilog: false,
};

pub const VERILOG_SYNTAX: Syntax = Syntax {
    line_comment: "//",
    fold_case: false,
    verilog: true,
};

/// Directives whose remaining line is not code.
const LINE_DIRECTIVES: [&str; 10] = [
    "define",
    "include",
    "timescale",
    "ifdef",
    "ifndef",
    "elsif",
    "undef",
    "default_nettype",
    "pragma",
    "line",
];

/// Helps keep the lookahead available as the characters are consumed.
pub struct TrainCar<T>
where
    T: Iterator<Item = char> + Clone,
{
    contents: Peekable<T>,
}

impl<T> TrainCar<T>
where
    T: Iterator<Item = char> + Clone,
{
    pub fn new(s: T) -> Self {
        Self {
            contents: s.peekable(),
        }
    }

    pub fn consume(&mut self) -> Option<char> {
        self.contents.next()
    }

    pub fn peek(&mut self) -> Option<&char> {
        self.contents.peek()
    }

    /// References the char `n` places after the next one without consuming anything.
    pub fn peek_nth(&self, n: usize) -> Option<char> {
        self.contents.clone().nth(n)
    }

    /// Checks if the remaining characters begin with `s`.
    pub fn starts_with(&self, s: &str) -> bool {
        s.chars().enumerate().all(|(i, c)| self.peek_nth(i) == Some(c))
    }

    /// Consumes characters through the first occurrence of `end` or to the end of input.
    pub fn skip_through(&mut self, end: &str) {
        while self.peek_nth(0).is_some() {
            if self.starts_with(end) == true {
                for _ in 0..end.chars().count() {
                    self.consume();
                }
                return;
            }
            self.consume();
        }
    }

    /// Consumes characters until the end of the current line, honoring
    /// backslash line continuations when `continued` is set.
    pub fn skip_line(&mut self, continued: bool) {
        let mut escaped = false;
        while let Some(c) = self.consume() {
            if c == '\n' && escaped == false {
                return;
            }
            if c.is_whitespace() == false || c == '\n' {
                escaped = continued && c == '\\';
            }
        }
    }
}

fn is_word_char(c: char, syntax: &Syntax) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || (syntax.verilog && c == '$')
}

/// Splits `s` into words and symbols.
pub fn tokenize(s: &str, syntax: &Syntax) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut car = TrainCar::new(s.chars());

    while let Some(c) = car.peek_nth(0) {
        if c.is_whitespace() == true {
            car.consume();
        } else if car.starts_with(syntax.line_comment) == true {
            car.skip_line(false);
        } else if car.starts_with("/*") == true {
            car.skip_through("*/");
        } else if c == '"' {
            car.consume();
            while let Some(d) = car.consume() {
                match d {
                    '"' => break,
                    '\\' if syntax.verilog => {
                        car.consume();
                    }
                    _ => (),
                }
            }
        } else if syntax.verilog == false && c == '\'' && car.peek_nth(2) == Some('\'') {
            // character literal
            for _ in 0..3 {
                car.consume();
            }
        } else if syntax.verilog == true && c == '`' {
            car.consume();
            let mut directive = String::new();
            while let Some(d) = car.peek_nth(0) {
                if is_word_char(d, syntax) == false {
                    break;
                }
                directive.push(d);
                car.consume();
            }
            if LINE_DIRECTIVES.contains(&directive.as_str()) {
                car.skip_line(directive == "define");
            }
        } else if syntax.verilog == true
            && c == '('
            && car.peek_nth(1) == Some('*')
            && car.peek_nth(2) != Some(')')
        {
            // attribute instance
            car.skip_through("*)");
        } else if syntax.verilog == true && c == '\\' {
            car.consume();
            let mut word = String::new();
            while let Some(d) = car.peek_nth(0) {
                if d.is_whitespace() == true {
                    break;
                }
                word.push(d);
                car.consume();
            }
            tokens.push(Token::Word(word));
        } else if is_word_char(c, syntax) == true {
            let mut word = String::new();
            while let Some(d) = car.peek_nth(0) {
                if is_word_char(d, syntax) == false {
                    break;
                }
                word.push(d);
                car.consume();
            }
            tokens.push(Token::Word(match syntax.fold_case {
                true => word.to_lowercase(),
                false => word,
            }));
        } else {
            car.consume();
            tokens.push(Token::Symbol(c));
        }
    }
    tokens
}

/// Returns the index just past the parenthesized group opening at `i`.
///
/// If `i` is not an opening parenthesis, `i` is returned unchanged.
pub fn skip_group(tokens: &[Token], i: usize) -> usize {
    if tokens.get(i).map_or(true, |t| t.is_symbol('(') == false) {
        return i;
    }
    let mut depth = 0;
    let mut j = i;
    while let Some(t) = tokens.get(j) {
        if t.is_symbol('(') {
            depth += 1;
        } else if t.is_symbol(')') {
            depth -= 1;
            if depth == 0 {
                return j + 1;
            }
        }
        j += 1;
    }
    j
}

#[cfg(test)]
mod test {
    use super::*;

    fn words(tokens: &[Token]) -> Vec<String> {
        tokens.iter().map(|t| t.to_string()).collect()
    }

    #[test]
    fn vhdl_comments_and_literals() {
        let s = "-- header\nENTITY Foo IS /* block\n comment */ port(a : in bit := '('); \"str--\" END;";
        let tokens = tokenize(s, &VHDL_SYNTAX);
        assert_eq!(
            words(&tokens),
            vec!["entity", "foo", "is", "port", "(", "a", ":", "in", "bit", ":", "=", ")", ";", "end", ";"]
        );
    }

    #[test]
    fn verilog_directives_and_attributes() {
        let s = "`timescale 1ns/1ps\n`define W \\\n 8\n(* keep *) module Top; always @(*) x = `W; endmodule // done";
        let tokens = tokenize(s, &VERILOG_SYNTAX);
        assert_eq!(
            words(&tokens),
            vec!["module", "Top", ";", "always", "@", "(", "*", ")", "x", "=", ";", "endmodule"]
        );
    }

    #[test]
    fn group_skipping() {
        let tokens = tokenize("#(.W(8)) u0 (a)", &VERILOG_SYNTAX);
        assert_eq!(skip_group(&tokens, 1), 8);
        assert_eq!(tokens[8], Token::Word(String::from("u0")));
        assert_eq!(skip_group(&tokens, 0), 0);
    }
}
