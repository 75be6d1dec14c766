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

use super::lexer::{self, Token, VHDL_SYNTAX};
use super::{DesignUnit, Reference, UnitKind};

fn word_at(tokens: &[Token], i: usize) -> Option<&str> {
    tokens.get(i).and_then(|t| t.as_word())
}

fn is_word_at(tokens: &[Token], i: usize, s: &str) -> bool {
    tokens.get(i).map_or(false, |t| t.is_word(s))
}

/// Collects a selected name like `work.alu` starting at `i`.
fn selected_name(tokens: &[Token], i: usize) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut j = i;
    while let Some(w) = word_at(tokens, j) {
        parts.push(w);
        if tokens.get(j + 1).map_or(false, |t| t.is_symbol('.')) == false {
            break;
        }
        j += 2;
    }
    parts
}

/// Checks for a port clause in the entity header beginning at `i`.
fn entity_has_ports(tokens: &[Token], i: usize) -> bool {
    let mut depth: usize = 0;
    for (j, t) in tokens.iter().enumerate().skip(i) {
        if t.is_symbol('(') {
            depth += 1;
        } else if t.is_symbol(')') {
            depth = depth.saturating_sub(1);
        } else if depth == 0 {
            if t.is_word("port") && tokens.get(j + 1).map_or(false, |n| n.is_symbol('(')) {
                return true;
            }
            if t.is_word("end") || t.is_word("begin") {
                return false;
            }
        }
    }
    false
}

/// Finds the primary units declared and the units referenced in VHDL source code.
///
/// References made inside an architecture belong to the architecture's entity.
pub fn scan(text: &str) -> (Vec<DesignUnit>, Vec<Reference>) {
    let tokens = lexer::tokenize(text, &VHDL_SYNTAX);
    let mut units = Vec::new();
    let mut refs = Vec::new();
    let mut owner: Option<String> = None;

    let mut i = 0;
    while i < tokens.len() {
        let t = &tokens[i];
        let after_colon = i > 0 && tokens[i - 1].is_symbol(':');

        if t.is_word("entity") && after_colon == false && is_word_at(&tokens, i + 2, "is") {
            if let Some(name) = word_at(&tokens, i + 1) {
                units.push(
                    DesignUnit::new(name, UnitKind::Entity).ports(entity_has_ports(&tokens, i + 3)),
                );
                owner = Some(name.to_string());
                i += 3;
                continue;
            }
        } else if t.is_word("package") && is_word_at(&tokens, i + 1, "body") {
            owner = word_at(&tokens, i + 2).map(|s| s.to_string());
            i += 3;
            continue;
        } else if t.is_word("package") && is_word_at(&tokens, i + 2, "is") {
            if let Some(name) = word_at(&tokens, i + 1) {
                units.push(DesignUnit::new(name, UnitKind::Package));
                owner = Some(name.to_string());
                i += 3;
                continue;
            }
        } else if t.is_word("architecture") && is_word_at(&tokens, i + 2, "of") {
            if let Some(entity) = word_at(&tokens, i + 3) {
                // the architecture can only be analyzed after its entity
                refs.push(Reference::new(None, entity));
                owner = Some(entity.to_string());
                i += 4;
                continue;
            }
        } else if t.is_word("use") {
            let start = match is_word_at(&tokens, i + 1, "entity") {
                true => i + 2,
                false => i + 1,
            };
            let parts = selected_name(&tokens, start);
            if is_word_at(&tokens, i + 1, "entity") == true {
                if let Some(target) = parts.last() {
                    refs.push(Reference::new(owner.as_deref(), target));
                }
            } else if let Some(target) = parts.get(1) {
                refs.push(Reference::new(None, target));
            }
        } else if t.is_symbol(':') && i > 0 && tokens[i - 1].as_word().is_some() {
            // instantiations
            if is_word_at(&tokens, i + 1, "entity") {
                if let Some(target) = selected_name(&tokens, i + 2).last() {
                    refs.push(Reference::new(owner.as_deref(), target));
                }
            } else if is_word_at(&tokens, i + 1, "component") {
                if let Some(target) = word_at(&tokens, i + 2) {
                    refs.push(Reference::new(owner.as_deref(), target));
                }
            } else if let Some(target) = word_at(&tokens, i + 1) {
                let is_map = (is_word_at(&tokens, i + 2, "port") || is_word_at(&tokens, i + 2, "generic"))
                    && is_word_at(&tokens, i + 3, "map");
                if is_map == true {
                    refs.push(Reference::new(owner.as_deref(), target));
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

    const ALU: &str = r#"
library ieee;
use ieee.std_logic_1164.all;
use work.alu_pkg.all;

entity ALU is
    generic (
        WIDTH : positive := 8
    );
    port (
        a, b : in std_logic_vector(WIDTH-1 downto 0);
        y : out std_logic_vector(WIDTH-1 downto 0)
    );
end entity ALU;

architecture rtl of alu is
    signal carry : std_logic;
    component adder port (x : in bit); end component;
begin
    u_add : entity work.adder
        generic map (WIDTH => WIDTH)
        port map (a => a, b => b, y => y);

    u_mux : component mux2 port map (a, b, y);

    u_and : and_gate port map (a(0), b(0), carry);
end architecture;
"#;

    const TB: &str = r#"
entity alu_tb is
end entity;

architecture sim of alu_tb is
begin
    dut : entity work.alu port map (a => a);
end architecture;
"#;

    #[test]
    fn scan_entity_with_references() {
        let (units, refs) = scan(ALU);
        assert_eq!(units, vec![DesignUnit::new("alu", UnitKind::Entity).ports(true)]);
        let targets: Vec<(Option<&str>, &str)> = refs
            .iter()
            .map(|r| (r.get_owner(), r.get_target()))
            .collect();
        assert_eq!(
            targets,
            vec![
                (None, "std_logic_1164"),
                (None, "alu_pkg"),
                (None, "alu"),
                (Some("alu"), "adder"),
                (Some("alu"), "mux2"),
                (Some("alu"), "and_gate"),
            ]
        );
    }

    #[test]
    fn scan_testbench() {
        let (units, refs) = scan(TB);
        assert_eq!(units.len(), 1);
        assert_eq!(units[0].has_ports(), false);
        assert_eq!(units[0].get_key(), "alu_tb");
        assert!(refs.contains(&Reference::new(Some("alu_tb"), "alu")));
    }

    #[test]
    fn scan_package() {
        let (units, refs) = scan(
            "package alu_pkg is\n constant W : natural := 8;\nend package;\npackage body alu_pkg is\nend package body;\n",
        );
        assert_eq!(units, vec![DesignUnit::new("alu_pkg", UnitKind::Package)]);
        assert!(refs.is_empty());
    }

    #[test]
    fn signal_declarations_are_not_instances() {
        let (_, refs) = scan("architecture a of e is\n signal s : counter;\nbegin\n s_reg : process(clk) begin end process;\nend;");
        assert_eq!(refs, vec![Reference::new(None, "e")]);
    }
}
