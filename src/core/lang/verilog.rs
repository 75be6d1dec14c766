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

use super::lexer::{self, Token, VERILOG_SYNTAX};
use super::{DesignUnit, Reference, UnitKind};

/// Reserved words that can never name a module or an instance.
const KEYWORDS: &[&str] = &[
    "always", "always_comb", "always_ff", "always_latch", "and", "assert", "assign", "assume",
    "automatic", "begin", "bit", "break", "buf", "byte", "case", "casex", "casez", "class",
    "const", "continue", "cover", "default", "defparam", "disable", "do", "else", "end",
    "endcase", "endclass", "endfunction", "endgenerate", "endinterface", "endmodule",
    "endpackage", "endprogram", "endtask", "enum", "export", "extends", "for", "foreach",
    "forever", "fork", "function", "generate", "genvar", "if", "import", "initial", "inout",
    "input", "int", "integer", "interface", "join", "localparam", "logic", "longint", "modport",
    "module", "nand", "negedge", "new", "nor", "not", "or", "output", "package", "packed",
    "parameter", "posedge", "priority", "program", "real", "reg", "repeat", "return",
    "shortint", "signed", "static", "string", "struct", "supply0", "supply1", "task", "time",
    "tri", "typedef", "union", "unique", "unsigned", "var", "virtual", "void", "wait", "while",
    "wire", "xnor", "xor",
];

/// Words after which a new statement begins.
const STATEMENT_BREAKS: &[&str] = &[
    "begin",
    "end",
    "else",
    "generate",
    "endgenerate",
    "endcase",
    "endfunction",
    "endtask",
    "join",
];

fn is_keyword(s: &str) -> bool {
    KEYWORDS.contains(&s)
}

fn word_at(tokens: &[Token], i: usize) -> Option<&str> {
    tokens.get(i).and_then(|t| t.as_word())
}

fn is_symbol_at(tokens: &[Token], i: usize, c: char) -> bool {
    tokens.get(i).map_or(false, |t| t.is_symbol(c))
}

/// Checks if the token at `i` is the first of a statement.
fn at_statement_start(tokens: &[Token], i: usize) -> bool {
    if i == 0 {
        return true;
    }
    match &tokens[i - 1] {
        Token::Symbol(c) => *c == ';',
        Token::Word(w) => {
            STATEMENT_BREAKS.contains(&w.as_str())
                // named block: `begin : label`
                || (i >= 3
                    && tokens[i - 2].is_symbol(':')
                    && STATEMENT_BREAKS.contains(&word_at(tokens, i - 3).unwrap_or_default()))
        }
    }
}

/// Checks for an instantiation `type [#(...)] name [[...]] (` starting at `i`.
fn is_instantiation(tokens: &[Token], i: usize) -> bool {
    let mut j = i + 1;
    if is_symbol_at(tokens, j, '#') {
        j = lexer::skip_group(tokens, j + 1);
    }
    match word_at(tokens, j) {
        Some(w) if is_keyword(w) == false => j += 1,
        _ => return false,
    }
    if is_symbol_at(tokens, j, '[') {
        while let Some(t) = tokens.get(j) {
            j += 1;
            if t.is_symbol(']') {
                break;
            }
        }
    }
    is_symbol_at(tokens, j, '(')
}

/// Finds the modules, interfaces, and packages declared and the units
/// referenced in Verilog or SystemVerilog source code.
pub fn scan(text: &str) -> (Vec<DesignUnit>, Vec<Reference>) {
    let tokens = lexer::tokenize(text, &VERILOG_SYNTAX);
    let mut units = Vec::new();
    let mut refs = Vec::new();
    let mut owner: Option<String> = None;

    let mut i = 0;
    while i < tokens.len() {
        let word = match tokens[i].as_word() {
            Some(w) => w,
            None => {
                i += 1;
                continue;
            }
        };
        match word {
            "module" | "macromodule" => {
                if let Some(name) = word_at(&tokens, i + 1) {
                    let mut j = i + 2;
                    // header package imports
                    while word_at(&tokens, j) == Some("import") {
                        while let Some(t) = tokens.get(j) {
                            j += 1;
                            if t.is_symbol(';') {
                                break;
                            }
                        }
                    }
                    if is_symbol_at(&tokens, j, '#') {
                        j = lexer::skip_group(&tokens, j + 1);
                    }
                    let ports = is_symbol_at(&tokens, j, '(') && is_symbol_at(&tokens, j + 1, ')') == false;
                    units.push(DesignUnit::new(name, UnitKind::Module).ports(ports));
                    owner = Some(name.to_string());
                    i += 2;
                    continue;
                }
            }
            "interface" | "package" if word_at(&tokens, i + 1) != Some("class") => {
                if let Some(name) = word_at(&tokens, i + 1) {
                    let kind = match word {
                        "interface" => UnitKind::Interface,
                        _ => UnitKind::Package,
                    };
                    units.push(DesignUnit::new(name, kind));
                    owner = Some(name.to_string());
                    i += 2;
                    continue;
                }
            }
            "endmodule" | "endinterface" | "endpackage" => owner = None,
            _ => {
                if is_symbol_at(&tokens, i + 1, ':') && is_symbol_at(&tokens, i + 2, ':') {
                    // scoped reference such as `import pkg::*;`
                    refs.push(Reference::new(owner.as_deref(), word));
                    i += 3;
                    continue;
                }
                if is_keyword(word) == false
                    && at_statement_start(&tokens, i) == true
                    && is_instantiation(&tokens, i) == true
                {
                    refs.push(Reference::new(owner.as_deref(), word));
                }
            }
        }
        i += 1;
    }
    (units, refs)
}

#[cfg(test)]
mod test {
    use super::*;

    const TOP: &str = r#"
`timescale 1ns/1ps
module Top #(parameter W = 8) (
    input wire clk,
    input wire [W-1:0] a,
    output reg [W-1:0] y
);
    import alu_pkg::*;
    wire [W-1:0] sum;

    Adder #(.W(W)) u_add (.a(a), .y(sum));

    generate
        for (genvar i = 0; i < W; i++) begin : g_bits
            Bit_Cell cell [1:0] (.d(sum[i]));
        end
    endgenerate

    always @(posedge clk) begin
        y <= sum;
        $display("%d", y);
    end
endmodule
"#;

    const TB: &str = r#"
module top_tb;
    reg clk;
    Top dut (.clk(clk));
    initial begin
        clk = 0;
    end
endmodule

module empty_tb();
endmodule
"#;

    #[test]
    fn scan_module() {
        let (units, refs) = scan(TOP);
        assert_eq!(units, vec![DesignUnit::new("Top", UnitKind::Module).ports(true)]);
        let targets: Vec<(Option<&str>, &str)> = refs
            .iter()
            .map(|r| (r.get_owner(), r.get_target()))
            .collect();
        assert_eq!(
            targets,
            vec![
                (Some("top"), "alu_pkg"),
                (Some("top"), "adder"),
                (Some("top"), "bit_cell"),
            ]
        );
    }

    #[test]
    fn scan_testbenches() {
        let (units, refs) = scan(TB);
        assert_eq!(units.len(), 2);
        assert_eq!(units.iter().any(|u| u.has_ports()), false);
        assert_eq!(refs, vec![Reference::new(Some("top_tb"), "top")]);
    }

    #[test]
    fn scan_package_and_interface() {
        let (units, refs) = scan(
            "package alu_pkg;\n typedef logic [7:0] byte_t;\nendpackage\ninterface bus_if (input clk);\n logic valid;\nendinterface\n",
        );
        assert_eq!(
            units,
            vec![
                DesignUnit::new("alu_pkg", UnitKind::Package),
                DesignUnit::new("bus_if", UnitKind::Interface),
            ]
        );
        assert!(refs.is_empty());
    }

    #[test]
    fn calls_are_not_instances() {
        let (_, refs) = scan("module m;\n initial begin\n do_task(1);\n x = f(2);\n end\n my_t v;\nendmodule\n");
        assert!(refs.is_empty());
    }
}
