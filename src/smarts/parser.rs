use std::collections::BTreeMap;

use petgraph::graph::NodeIndex;

use crate::element::{self, AROMATIC_SYMBOLS, BARE_AROMATIC_SYMBOLS};
use crate::mol::Mol;

use super::error::SmartsError;
use super::query::{AtomExpr, BondExpr};
use super::Smarts;

/// Deepest `$(...)` nesting accepted.
const MAX_NESTING: usize = 32;
/// Most operands a single bracket atom or bond expression may combine.
const MAX_TERMS: usize = 256;

/// Parse result before the graph is split into fragments. Atom indices are
/// source order.
pub(super) struct Parsed {
    pub mol: Mol<AtomExpr, BondExpr>,
    pub atom_classes: Vec<u16>,
    pub recursive: Vec<Smarts>,
}

struct RingOpening {
    atom: NodeIndex,
    bond: Option<BondExpr>,
    pos: usize,
}

struct Parser {
    chars: Vec<char>,
    pos: usize,
    /// Position of this text inside the outermost pattern.
    offset: usize,
    /// `$(...)` levels enclosing this text.
    depth: usize,
    /// Operands combined so far in the expression starting at `expr_start`.
    terms: usize,
    expr_start: usize,
    mol: Mol<AtomExpr, BondExpr>,
    atom_classes: Vec<u16>,
    recursive: Vec<Smarts>,
}

impl Parser {
    fn new(input: &str, offset: usize, depth: usize) -> Self {
        Self {
            chars: input.chars().collect(),
            pos: 0,
            offset,
            depth,
            terms: 0,
            expr_start: 0,
            mol: Mol::new(),
            atom_classes: Vec::new(),
            recursive: Vec::new(),
        }
    }

    fn syntax(&self, msg: impl Into<String>, pos: usize, len: usize) -> SmartsError {
        SmartsError::syntax(msg, pos, len).offset(self.offset)
    }

    fn semantics(&self, msg: impl Into<String>, pos: usize, len: usize) -> SmartsError {
        SmartsError::semantics(msg, pos, len).offset(self.offset)
    }

    fn begin_expr(&mut self, start: usize) {
        self.terms = 1;
        self.expr_start = start;
    }

    fn add_term(&mut self) -> Result<(), SmartsError> {
        self.terms += 1;
        if self.terms > MAX_TERMS {
            let start = self.expr_start;
            return Err(self.syntax("expression nested too deeply", start, self.pos - start));
        }
        Ok(())
    }

    /// Consumes a run of `!` and reports whether it negates.
    fn skip_negations(&mut self) -> bool {
        let mut negate = false;
        while self.peek() == Some('!') {
            self.pos += 1;
            negate = !negate;
        }
        negate
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, ahead: usize) -> Option<char> {
        self.chars.get(self.pos + ahead).copied()
    }

    fn parse_number(&mut self) -> Option<u32> {
        let start = self.pos;
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.pos += 1;
        }
        if self.pos == start {
            return None;
        }
        let s: String = self.chars[start..self.pos].iter().collect();
        // Saturate absurdly long numbers so the range check below rejects them.
        Some(s.parse().unwrap_or(u32::MAX))
    }

    fn parse_u8(&mut self, start: usize) -> Result<Option<u8>, SmartsError> {
        match self.parse_number() {
            None => Ok(None),
            Some(n) => u8::try_from(n)
                .map(Some)
                .map_err(|_| self.syntax("number out of range", start, self.pos - start)),
        }
    }

    fn parse(mut self) -> Result<Parsed, SmartsError> {
        let mut current: Option<NodeIndex> = None;
        let mut branches: Vec<(NodeIndex, Option<BondExpr>, usize)> = Vec::new();
        let mut pending: Option<(BondExpr, usize)> = None;
        let mut rings: BTreeMap<u16, RingOpening> = BTreeMap::new();

        while let Some(ch) = self.peek() {
            match ch {
                '(' => {
                    let Some(cur) = current else {
                        return Err(self.syntax("branch without preceding atom", self.pos, 1));
                    };
                    branches.push((cur, pending.take().map(|(b, _)| b), self.pos));
                    self.pos += 1;
                }
                ')' => {
                    let Some((prev, saved, _)) = branches.pop() else {
                        return Err(self.syntax("unmatched ')'", self.pos, 1));
                    };
                    if let Some((_, pos)) = pending {
                        return Err(self.syntax("bond without following atom", pos, 1));
                    }
                    current = Some(prev);
                    pending = saved.map(|b| (b, self.pos));
                    self.pos += 1;
                }
                '.' => {
                    if let Some((_, pos)) = pending {
                        return Err(self.syntax("bond without following atom", pos, 1));
                    }
                    current = None;
                    self.pos += 1;
                }
                '-' | '=' | '#' | '$' | ':' | '~' | '@' | '/' | '\\' | '!' => {
                    let start = self.pos;
                    if current.is_none() {
                        return Err(self.syntax("bond without preceding atom", start, 1));
                    }
                    if pending.is_some() {
                        return Err(self.syntax("consecutive bond expressions", start, 1));
                    }
                    let bond = self.parse_bond_expr()?;
                    pending = Some((bond, start));
                }
                '0'..='9' | '%' => {
                    let start = self.pos;
                    let digit = self.parse_ring_digit()?;
                    let Some(cur) = current else {
                        return Err(self.syntax("ring closure without preceding atom", start, 1));
                    };
                    let bond = pending.take().map(|(b, _)| b);
                    match rings.remove(&digit) {
                        Some(open) => {
                            let len = self.pos - start;
                            if open.atom == cur {
                                let msg = "ring bond to the same atom";
                                return Err(self.semantics(msg, start, len));
                            }
                            if self.mol.bond_between(open.atom, cur).is_some() {
                                return Err(self.semantics(
                                    "ring bond duplicates an existing bond",
                                    start,
                                    len,
                                ));
                            }
                            let expr = bond.or(open.bond).unwrap_or_else(BondExpr::implicit);
                            self.mol.add_bond(open.atom, cur, expr);
                        }
                        None => {
                            rings.insert(
                                digit,
                                RingOpening {
                                    atom: cur,
                                    bond,
                                    pos: start,
                                },
                            );
                        }
                    }
                }
                _ => {
                    let (expr, class) = if ch == '[' {
                        self.parse_bracket_atom()?
                    } else {
                        (self.parse_bare_atom()?, 0)
                    };
                    let idx = self.mol.add_atom(expr);
                    self.atom_classes.push(class);
                    if let Some(prev) = current {
                        let bond = pending.take().map_or_else(BondExpr::implicit, |(b, _)| b);
                        self.mol.add_bond(prev, idx, bond);
                    }
                    current = Some(idx);
                }
            }
        }

        if let Some((_, _, pos)) = branches.pop() {
            return Err(self.syntax("unmatched '('", pos, 1));
        }
        if let Some((_, pos)) = pending {
            return Err(self.syntax("bond without following atom", pos, 1));
        }
        if let Some(open) = rings.values().next() {
            return Err(self.syntax("unclosed ring bond", open.pos, 1));
        }

        Ok(Parsed {
            mol: self.mol,
            atom_classes: self.atom_classes,
            recursive: self.recursive,
        })
    }

    fn parse_ring_digit(&mut self) -> Result<u16, SmartsError> {
        let start = self.pos;
        if self.peek() == Some('%') {
            self.pos += 1;
            match (
                self.peek().and_then(|c| c.to_digit(10)),
                self.peek_at(1).and_then(|c| c.to_digit(10)),
            ) {
                (Some(a), Some(b)) => {
                    self.pos += 2;
                    Ok((a * 10 + b) as u16)
                }
                _ => Err(self.syntax("expected two digits after '%'", start, 1)),
            }
        } else {
            let d = self
                .peek()
                .and_then(|c| c.to_digit(10))
                .ok_or_else(|| self.syntax("expected ring bond digit", start, 1))?;
            self.pos += 1;
            Ok(d as u16)
        }
    }

    // Bond expressions: `;` < `,` < `&`/implicit < `!`.

    fn parse_bond_expr(&mut self) -> Result<BondExpr, SmartsError> {
        self.begin_expr(self.pos);
        let mut expr = self.parse_bond_or()?;
        while self.peek() == Some(';') {
            self.pos += 1;
            self.add_term()?;
            let right = self.parse_bond_or()?;
            expr = BondExpr::and_lo(expr, right);
        }
        Ok(expr)
    }

    fn parse_bond_or(&mut self) -> Result<BondExpr, SmartsError> {
        let mut expr = self.parse_bond_and_hi()?;
        while self.peek() == Some(',') {
            self.pos += 1;
            self.add_term()?;
            let right = self.parse_bond_and_hi()?;
            expr = BondExpr::or(expr, right);
        }
        Ok(expr)
    }

    fn parse_bond_and_hi(&mut self) -> Result<BondExpr, SmartsError> {
        let mut expr = self.parse_bond_not()?;
        loop {
            match self.peek() {
                Some('&') => self.pos += 1,
                Some(c) if is_bond_start(c) => {}
                _ => break,
            }
            self.add_term()?;
            let right = self.parse_bond_not()?;
            expr = BondExpr::and_hi(expr, right);
        }
        Ok(expr)
    }

    fn parse_bond_not(&mut self) -> Result<BondExpr, SmartsError> {
        let negate = self.skip_negations();
        let expr = self.parse_bond_primitive()?;
        Ok(if negate { BondExpr::not(expr) } else { expr })
    }

    fn parse_bond_primitive(&mut self) -> Result<BondExpr, SmartsError> {
        let pos = self.pos;
        let Some(ch) = self.peek() else {
            return Err(self.syntax("expected bond primitive", pos, 0));
        };
        let expr = match ch {
            '-' => BondExpr::Single,
            '=' => BondExpr::Double,
            '#' => BondExpr::Triple,
            '$' => BondExpr::Quadruple,
            ':' => BondExpr::Aromatic,
            '~' => BondExpr::True,
            '@' => BondExpr::Ring,
            '/' => BondExpr::Up,
            '\\' => BondExpr::Down,
            _ => {
                let msg = format!("expected bond primitive, found '{ch}'");
                return Err(self.syntax(msg, pos, 1));
            }
        };
        self.pos += 1;
        Ok(expr)
    }

    fn parse_bare_atom(&mut self) -> Result<AtomExpr, SmartsError> {
        let start = self.pos;
        let Some(ch) = self.peek() else {
            return Err(self.syntax("expected atom", start, 0));
        };
        match ch {
            '*' => {
                self.pos += 1;
                return Ok(AtomExpr::True);
            }
            'a' => {
                self.pos += 1;
                return Ok(AtomExpr::Aromatic);
            }
            'A' => {
                self.pos += 1;
                return Ok(AtomExpr::Aliphatic);
            }
            _ => {}
        }

        if ch.is_ascii_lowercase() {
            let symbol = BARE_AROMATIC_SYMBOLS.iter().find(|(s, _)| s.starts_with(ch));
            if let Some(&(sym, num)) = symbol {
                self.pos += sym.len();
                return Ok(AtomExpr::AromaticElement(num));
            }
        } else if ch.is_ascii_uppercase() {
            let two: String = [Some(ch), self.peek_at(1)].into_iter().flatten().collect();
            let (symbol, len) = if two == "Cl" || two == "Br" {
                (two, 2)
            } else {
                (ch.to_string(), 1)
            };
            if let Some(num) =
                element::atomic_num_from_symbol(&symbol).filter(|&n| element::is_organic_subset(n))
            {
                self.pos += len;
                return Ok(AtomExpr::AliphaticElement(num));
            }
        }

        Err(self.syntax(format!("unexpected character '{ch}'"), start, 1))
    }

    /// Parses `[...]`, returning the expression and its `:n` class.
    fn parse_bracket_atom(&mut self) -> Result<(AtomExpr, u16), SmartsError> {
        let open = self.pos;
        self.pos += 1;
        if self.peek() == Some(']') {
            return Err(self.syntax("empty bracket atom", open, 2));
        }
        self.begin_expr(open);
        let expr = self.parse_atom_and_lo(open)?;
        match self.peek() {
            Some(']') => self.pos += 1,
            Some(c) => {
                let msg = format!("unexpected character '{c}' in bracket atom");
                return Err(self.syntax(msg, self.pos, 1));
            }
            None => return Err(self.syntax("unclosed bracket atom", open, self.pos - open)),
        }
        let class = expr.atom_class().unwrap_or(0);
        Ok((expr, class))
    }

    // Atom expressions: `;` < `,` < `&`/implicit < `!`.

    fn parse_atom_and_lo(&mut self, open: usize) -> Result<AtomExpr, SmartsError> {
        let mut expr = self.parse_atom_or(open)?;
        while self.peek() == Some(';') {
            self.pos += 1;
            self.add_term()?;
            let right = self.parse_atom_or(open)?;
            expr = AtomExpr::and_lo(expr, right);
        }
        Ok(expr)
    }

    fn parse_atom_or(&mut self, open: usize) -> Result<AtomExpr, SmartsError> {
        let mut expr = self.parse_atom_and_hi(open)?;
        while self.peek() == Some(',') {
            self.pos += 1;
            self.add_term()?;
            let right = self.parse_atom_and_hi(open)?;
            expr = AtomExpr::or(expr, right);
        }
        Ok(expr)
    }

    fn parse_atom_and_hi(&mut self, open: usize) -> Result<AtomExpr, SmartsError> {
        let mut expr = self.parse_atom_not(open)?;
        loop {
            match self.peek() {
                Some('&') => self.pos += 1,
                Some(']' | ',' | ';') | None => break,
                Some(_) => {}
            }
            self.add_term()?;
            let right = self.parse_atom_not(open)?;
            expr = AtomExpr::and_hi(expr, right);
        }
        Ok(expr)
    }

    fn parse_atom_not(&mut self, open: usize) -> Result<AtomExpr, SmartsError> {
        let negate = self.skip_negations();
        let expr = self.parse_atom_primitive(open)?;
        Ok(if negate { AtomExpr::not(expr) } else { expr })
    }

    /// True when `H` at the current position names the element: it is the
    /// first primitive in the bracket (an isotope may precede it) and is not
    /// followed by another primitive.
    fn is_hydrogen_atom(&self, open: usize) -> bool {
        let only_isotope_before = self.chars[open + 1..self.pos]
            .iter()
            .all(|c| c.is_ascii_digit());
        only_isotope_before && matches!(self.peek_at(1), Some(']' | '+' | '-' | ':'))
    }

    fn parse_atom_primitive(&mut self, open: usize) -> Result<AtomExpr, SmartsError> {
        let start = self.pos;
        let Some(ch) = self.peek() else {
            return Err(self.syntax("unclosed bracket atom", open, start - open));
        };

        // Two-letter element symbols win over one-letter primitives.
        if ch.is_ascii_uppercase() {
            if let Some(next) = self.peek_at(1).filter(|c| c.is_ascii_lowercase()) {
                let two: String = [ch, next].iter().collect();
                if let Some(num) = element::atomic_num_from_symbol(&two) {
                    self.pos += 2;
                    return Ok(AtomExpr::AliphaticElement(num));
                }
            }
        }

        match ch {
            '*' => {
                self.pos += 1;
                Ok(AtomExpr::True)
            }
            'a' if self.peek_at(1) != Some('s') => {
                self.pos += 1;
                Ok(AtomExpr::Aromatic)
            }
            'A' => {
                self.pos += 1;
                Ok(AtomExpr::Aliphatic)
            }
            'H' if self.is_hydrogen_atom(open) => {
                self.pos += 1;
                Ok(AtomExpr::AtomicNumber(1))
            }
            'H' => {
                self.pos += 1;
                Ok(AtomExpr::TotalH(self.parse_u8(start)?.unwrap_or(1)))
            }
            'h' => {
                self.pos += 1;
                Ok(AtomExpr::ImplicitH(self.parse_u8(start)?))
            }
            'D' => {
                self.pos += 1;
                Ok(AtomExpr::Degree(self.parse_u8(start)?.unwrap_or(1)))
            }
            'v' => {
                self.pos += 1;
                Ok(AtomExpr::Valence(self.parse_u8(start)?.unwrap_or(1)))
            }
            'X' => {
                self.pos += 1;
                Ok(AtomExpr::Connectivity(self.parse_u8(start)?.unwrap_or(1)))
            }
            'R' => {
                self.pos += 1;
                Ok(match self.parse_u8(start)? {
                    None => AtomExpr::Cyclic,
                    Some(0) => AtomExpr::Acyclic,
                    Some(n) => AtomExpr::RingMembership(n),
                })
            }
            'r' => {
                self.pos += 1;
                Ok(match self.parse_u8(start)? {
                    None => AtomExpr::Cyclic,
                    Some(0) => AtomExpr::Acyclic,
                    Some(n) => AtomExpr::RingSize(n),
                })
            }
            'x' => {
                self.pos += 1;
                Ok(AtomExpr::RingConnectivity(self.parse_u8(start)?))
            }
            '#' => {
                self.pos += 1;
                match self.parse_u8(start)? {
                    Some(n) if n <= 118 => Ok(AtomExpr::AtomicNumber(n)),
                    _ => {
                        let len = self.pos - start;
                        Err(self.syntax("expected atomic number after '#'", start, len))
                    }
                }
            }
            '+' | '-' => self.parse_charge(ch),
            '@' => {
                self.pos += 1;
                let clockwise = self.peek() == Some('@');
                if clockwise {
                    self.pos += 1;
                }
                Ok(AtomExpr::Chirality { clockwise })
            }
            ':' => {
                self.pos += 1;
                let class = self
                    .parse_number()
                    .and_then(|n| u16::try_from(n).ok())
                    .ok_or_else(|| self.syntax("expected atom class after ':'", start, 1))?;
                Ok(AtomExpr::AtomClass(class))
            }
            '$' => self.parse_recursive(),
            '0'..='9' => {
                let mass = self
                    .parse_number()
                    .and_then(|n| u16::try_from(n).ok())
                    .ok_or_else(|| self.syntax("isotope out of range", start, self.pos - start))?;
                Ok(AtomExpr::Isotope(mass))
            }
            c if c.is_ascii_lowercase() => {
                let rest: String = self.chars[self.pos..].iter().take(2).collect();
                let found = AROMATIC_SYMBOLS
                    .iter()
                    .chain(BARE_AROMATIC_SYMBOLS.iter())
                    .find(|(sym, _)| rest.starts_with(sym));
                match found {
                    Some(&(sym, num)) => {
                        self.pos += sym.len();
                        Ok(AtomExpr::AromaticElement(num))
                    }
                    None => Err(self.syntax(format!("unknown atom primitive '{c}'"), start, 1)),
                }
            }
            c if c.is_ascii_uppercase() => match element::atomic_num_from_symbol(&c.to_string()) {
                Some(num) => {
                    self.pos += 1;
                    Ok(AtomExpr::AliphaticElement(num))
                }
                None => Err(self.syntax(format!("unknown element '{c}'"), start, 1)),
            },
            c => Err(self.syntax(format!("unexpected character '{c}' in bracket atom"), start, 1)),
        }
    }

    fn parse_charge(&mut self, sign: char) -> Result<AtomExpr, SmartsError> {
        let start = self.pos;
        self.pos += 1;
        let magnitude = match self.parse_u8(start)? {
            Some(n) => n,
            None => {
                let mut n = 1u8;
                while self.peek() == Some(sign) {
                    self.pos += 1;
                    n = n.saturating_add(1);
                }
                n
            }
        };
        let magnitude = i8::try_from(magnitude)
            .map_err(|_| self.syntax("charge out of range", start, self.pos - start))?;
        Ok(AtomExpr::Charge(if sign == '+' { magnitude } else { -magnitude }))
    }

    fn parse_recursive(&mut self) -> Result<AtomExpr, SmartsError> {
        let start = self.pos;
        if self.peek_at(1) != Some('(') {
            return Err(self.syntax("expected '(' after '$'", start, 1));
        }
        if self.depth >= MAX_NESTING {
            return Err(self.syntax("expression nested too deeply", start, 2));
        }
        self.pos += 2;
        let inner_start = self.pos;
        let mut depth = 1;
        while let Some(c) = self.peek() {
            match c {
                '(' => depth += 1,
                ')' => {
                    depth -= 1;
                    if depth == 0 {
                        break;
                    }
                }
                _ => {}
            }
            self.pos += 1;
        }
        if depth != 0 {
            return Err(self.syntax("unclosed recursive SMARTS", start, self.pos - start));
        }
        let inner: String = self.chars[inner_start..self.pos].iter().collect();
        self.pos += 1;

        if inner.is_empty() {
            return Err(self.syntax("empty recursive SMARTS", start, self.pos - start));
        }
        let sub = super::compile_at(&inner, self.offset + inner_start, self.depth + 1)?;
        if sub.num_fragments() != 1 {
            return Err(self.semantics(
                "recursive SMARTS must be a single connected fragment",
                start,
                self.pos - start,
            ));
        }
        self.recursive.push(sub);
        Ok(AtomExpr::Recursive(self.recursive.len() - 1))
    }
}

fn is_bond_start(c: char) -> bool {
    matches!(c, '-' | '=' | '#' | '$' | ':' | '~' | '@' | '/' | '\\' | '!')
}

/// Parses `input` into a source-ordered query graph. `offset` shifts error
/// positions for patterns nested inside `$(...)`, `depth` counts those levels.
pub(super) fn parse(input: &str, offset: usize, depth: usize) -> Result<Parsed, SmartsError> {
    Parser::new(input, offset, depth).parse()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::smarts::error::SmartsErrorKind;

    fn atom_expr(smarts: &str) -> AtomExpr {
        let parsed = parse(smarts, 0, 0).unwrap();
        parsed.mol.atom(NodeIndex::new(0)).clone()
    }

    fn bond_expr(smarts: &str) -> BondExpr {
        let parsed = parse(smarts, 0, 0).unwrap();
        let e = parsed.mol.bonds().next().unwrap();
        parsed.mol.bond(e).clone()
    }

    #[test]
    fn bare_atoms() {
        assert_eq!(atom_expr("C"), AtomExpr::AliphaticElement(6));
        assert_eq!(atom_expr("c"), AtomExpr::AromaticElement(6));
        assert_eq!(atom_expr("Cl"), AtomExpr::AliphaticElement(17));
        assert_eq!(atom_expr("*"), AtomExpr::True);
        assert_eq!(atom_expr("a"), AtomExpr::Aromatic);
        assert_eq!(atom_expr("A"), AtomExpr::Aliphatic);
    }

    #[test]
    fn implicit_and_is_high_precedence() {
        assert_eq!(
            atom_expr("[CH3]"),
            AtomExpr::and_hi(AtomExpr::AliphaticElement(6), AtomExpr::TotalH(3))
        );
        assert_eq!(
            atom_expr("[13C]"),
            AtomExpr::and_hi(AtomExpr::Isotope(13), AtomExpr::AliphaticElement(6))
        );
    }

    #[test]
    fn operator_precedence() {
        // c,n;!R  =>  (c OR n) AND-low (NOT R)
        assert_eq!(
            atom_expr("[c,n;!R]"),
            AtomExpr::and_lo(
                AtomExpr::or(AtomExpr::AromaticElement(6), AtomExpr::AromaticElement(7)),
                AtomExpr::not(AtomExpr::Cyclic)
            )
        );
        // N&H1,O  =>  (N AND-hi H1) OR O
        assert_eq!(
            atom_expr("[N&H1,O]"),
            AtomExpr::or(
                AtomExpr::and_hi(AtomExpr::AliphaticElement(7), AtomExpr::TotalH(1)),
                AtomExpr::AliphaticElement(8)
            )
        );
    }

    #[test]
    fn combinators_are_left_associative() {
        assert_eq!(
            atom_expr("[C,N,O]"),
            AtomExpr::or(
                AtomExpr::or(AtomExpr::AliphaticElement(6), AtomExpr::AliphaticElement(7)),
                AtomExpr::AliphaticElement(8)
            )
        );
    }

    #[test]
    fn counted_primitives() {
        assert_eq!(atom_expr("[D3]"), AtomExpr::Degree(3));
        assert_eq!(atom_expr("[v4]"), AtomExpr::Valence(4));
        assert_eq!(atom_expr("[X2]"), AtomExpr::Connectivity(2));
        assert_eq!(atom_expr("[R]"), AtomExpr::Cyclic);
        assert_eq!(atom_expr("[R0]"), AtomExpr::Acyclic);
        assert_eq!(atom_expr("[R2]"), AtomExpr::RingMembership(2));
        assert_eq!(atom_expr("[r6]"), AtomExpr::RingSize(6));
        assert_eq!(atom_expr("[x]"), AtomExpr::RingConnectivity(None));
        assert_eq!(atom_expr("[x3]"), AtomExpr::RingConnectivity(Some(3)));
        assert_eq!(atom_expr("[h]"), AtomExpr::ImplicitH(None));
        assert_eq!(atom_expr("[h2]"), AtomExpr::ImplicitH(Some(2)));
        assert_eq!(atom_expr("[#7]"), AtomExpr::AtomicNumber(7));
    }

    #[test]
    fn charges() {
        assert_eq!(atom_expr("[+]"), AtomExpr::Charge(1));
        assert_eq!(atom_expr("[++]"), AtomExpr::Charge(2));
        assert_eq!(atom_expr("[-2]"), AtomExpr::Charge(-2));
        assert_eq!(
            atom_expr("[N+]"),
            AtomExpr::and_hi(AtomExpr::AliphaticElement(7), AtomExpr::Charge(1))
        );
    }

    #[test]
    fn hydrogen_atom_versus_count() {
        assert_eq!(atom_expr("[H]"), AtomExpr::AtomicNumber(1));
        assert_eq!(
            atom_expr("[2H]"),
            AtomExpr::and_hi(AtomExpr::Isotope(2), AtomExpr::AtomicNumber(1))
        );
        assert_eq!(
            atom_expr("[H+]"),
            AtomExpr::and_hi(AtomExpr::AtomicNumber(1), AtomExpr::Charge(1))
        );
        assert_eq!(
            atom_expr("[OH]"),
            AtomExpr::and_hi(AtomExpr::AliphaticElement(8), AtomExpr::TotalH(1))
        );
    }

    #[test]
    fn two_letter_symbols_in_brackets() {
        assert_eq!(atom_expr("[Na]"), AtomExpr::AliphaticElement(11));
        assert_eq!(atom_expr("[se]"), AtomExpr::AromaticElement(34));
        assert_eq!(atom_expr("[as]"), AtomExpr::AromaticElement(33));
        assert_eq!(atom_expr("[Rb]"), AtomExpr::AliphaticElement(37));
    }

    #[test]
    fn atom_class_and_chirality() {
        let parsed = parse("[C:1][C@@H:12]", 0, 0).unwrap();
        assert_eq!(parsed.atom_classes, vec![1, 12]);
        assert_eq!(
            parsed.mol.atom(NodeIndex::new(1)).clone(),
            AtomExpr::and_hi(
                AtomExpr::and_hi(
                    AtomExpr::and_hi(
                        AtomExpr::AliphaticElement(6),
                        AtomExpr::Chirality { clockwise: true }
                    ),
                    AtomExpr::TotalH(1)
                ),
                AtomExpr::AtomClass(12)
            )
        );
    }

    #[test]
    fn bonds() {
        assert_eq!(bond_expr("CC"), BondExpr::implicit());
        assert_eq!(bond_expr("C=C"), BondExpr::Double);
        assert_eq!(bond_expr("C$C"), BondExpr::Quadruple);
        assert_eq!(bond_expr("C~C"), BondExpr::True);
        assert_eq!(bond_expr("C!@C"), BondExpr::not(BondExpr::Ring));
        assert_eq!(
            bond_expr("C-,=C"),
            BondExpr::or(BondExpr::Single, BondExpr::Double)
        );
        assert_eq!(
            bond_expr("C-@C"),
            BondExpr::and_hi(BondExpr::Single, BondExpr::Ring)
        );
        assert_eq!(
            bond_expr("C=,#;@C"),
            BondExpr::and_lo(BondExpr::or(BondExpr::Double, BondExpr::Triple), BondExpr::Ring)
        );
    }

    #[test]
    fn branches_and_rings() {
        let parsed = parse("C1CC(=O)C1", 0, 0).unwrap();
        assert_eq!(parsed.mol.atom_count(), 5);
        assert_eq!(parsed.mol.bond_count(), 5);
        let carbonyl = parsed
            .mol
            .bond_between(NodeIndex::new(2), NodeIndex::new(3))
            .unwrap();
        assert_eq!(parsed.mol.bond(carbonyl), &BondExpr::Double);
        let closure = parsed
            .mol
            .bond_between(NodeIndex::new(0), NodeIndex::new(4))
            .unwrap();
        assert_eq!(parsed.mol.bond(closure), &BondExpr::implicit());
    }

    #[test]
    fn ring_bond_expression_from_either_end() {
        let parsed = parse("C=1CCC1", 0, 0).unwrap();
        let e = parsed
            .mol
            .bond_between(NodeIndex::new(0), NodeIndex::new(3))
            .unwrap();
        assert_eq!(parsed.mol.bond(e), &BondExpr::Double);
        let parsed = parse("C%10CCC=%10", 0, 0).unwrap();
        let e = parsed
            .mol
            .bond_between(NodeIndex::new(0), NodeIndex::new(3))
            .unwrap();
        assert_eq!(parsed.mol.bond(e), &BondExpr::Double);
    }

    #[test]
    fn recursive_is_compiled_into_table() {
        let parsed = parse("[$(C=O),$(c1ccccc1)]N", 0, 0).unwrap();
        assert_eq!(parsed.recursive.len(), 2);
        assert_eq!(parsed.recursive[0].num_atoms(), 2);
        assert_eq!(parsed.recursive[1].num_atoms(), 6);
        assert_eq!(
            parsed.mol.atom(NodeIndex::new(0)).clone(),
            AtomExpr::or(AtomExpr::Recursive(0), AtomExpr::Recursive(1))
        );
    }

    #[test]
    fn syntax_errors() {
        let cases = [
            ("fdsgsgd", 0),
            ("C(C", 1),
            ("CC)", 2),
            ("[CH3", 0),
            ("C1CC", 1),
            ("C=", 1),
            ("[]", 0),
            ("[C;]", 3),
            ("[#]", 1),
            ("[$(C]", 1),
            ("[$()]", 1),
            ("(C)", 0),
            ("[Q]", 1),
        ];
        for (smarts, pos) in cases {
            let err = parse(smarts, 0, 0)
                .err()
                .unwrap_or_else(|| panic!("{smarts:?} should fail"));
            assert_eq!(err.kind, SmartsErrorKind::Syntax, "{smarts:?}: {err}");
            assert_eq!(err.pos, pos, "{smarts:?}: {err}");
        }
    }

    #[test]
    fn semantic_errors() {
        for smarts in ["C11", "C1C1", "[$(C.C)]"] {
            let err = parse(smarts, 0, 0)
                .err()
                .unwrap_or_else(|| panic!("{smarts:?} should fail"));
            assert_eq!(err.kind, SmartsErrorKind::Semantics, "{smarts:?}");
        }
    }

    #[test]
    fn nested_error_positions_are_absolute() {
        let err = parse("CC[$(C[)]", 0, 0).err().unwrap();
        assert_eq!(err.pos, 6);
    }

    #[test]
    fn negation_runs_collapse() {
        let atom = |smarts: &str| parse(smarts, 0, 0).unwrap().mol.atom(NodeIndex::new(0)).clone();
        assert_eq!(atom("[!!C]"), AtomExpr::AliphaticElement(6));
        assert_eq!(atom("[!!!C]"), AtomExpr::not(AtomExpr::AliphaticElement(6)));

        let parsed = parse("C!!!=C", 0, 0).unwrap();
        let bond = parsed.mol.bonds().next().unwrap();
        assert_eq!(parsed.mol.bond(bond).clone(), BondExpr::not(BondExpr::Double));
    }

    #[test]
    fn long_negation_runs_do_not_recurse() {
        let even = format!("[{}C]", "!".repeat(200_000));
        let parsed = parse(&even, 0, 0).unwrap();
        assert_eq!(
            parsed.mol.atom(NodeIndex::new(0)).clone(),
            AtomExpr::AliphaticElement(6)
        );

        let odd = format!("C{}-C", "!".repeat(100_001));
        assert!(parse(&odd, 0, 0).is_ok());
    }

    #[test]
    fn oversized_expressions_are_rejected() {
        let terms = vec!["C"; 100_000].join(",");
        let err = parse(&format!("C[{terms}]"), 0, 0).err().unwrap();
        assert_eq!(err.kind, SmartsErrorKind::Syntax);
        assert_eq!(err.pos, 1);
        assert!(err.message.contains("nested too deeply"), "{err}");

        let bonds = vec!["-"; 10_000].join(",");
        let err = parse(&format!("C{bonds}C"), 0, 0).err().unwrap();
        assert_eq!(err.pos, 1);

        let fits = vec!["C"; MAX_TERMS].join(",");
        assert!(parse(&format!("[{fits}]"), 0, 0).is_ok());
    }

    #[test]
    fn deep_recursive_nesting_is_rejected() {
        let depth = 1000;
        let smarts = format!("{}C{}", "[$(".repeat(depth), ")]".repeat(depth));
        let err = parse(&smarts, 0, 0).err().unwrap();
        assert_eq!(err.kind, SmartsErrorKind::Syntax);
        assert_eq!(err.pos, 3 * MAX_NESTING + 1);

        let ok = format!("{}C{}", "[$(".repeat(MAX_NESTING), ")]".repeat(MAX_NESTING));
        assert!(parse(&ok, 0, 0).is_ok());
    }
}
