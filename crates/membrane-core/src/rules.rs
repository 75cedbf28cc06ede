//! Evolution rules for membrane systems.
//!
//! A [`Rule`] is a tagged variant matched exhaustively by the engines:
//!
//! | Variant        | Meaning                                                      |
//! |----------------|--------------------------------------------------------------|
//! | `Rewrite`      | consume `left_side`, produce `right_side` routed HERE/IN/OUT |
//! | `Dissolving`   | a `Rewrite` that also flags its region for dissolution       |
//! | `Priority`     | ordered pair; the weak member runs only when the strong one is inapplicable |
//! | `Transport`    | symport/antiport object transport across one membrane        |
//!
//! ## String grammar
//!
//! Whitespace is stripped before parsing.
//!
//! - rewriting: `aab -> IN: bb OUT: a HERE: c` — the optional `#` directly
//!   after `->` marks a dissolving rule; sections may appear in any order,
//!   repeat (counts accumulate) or be left out; a single extra `>` separates
//!   the strong and weak members of a priority rule.
//! - transport: `IN: aa`, `OUT: b`, or both sections in either order
//!   (both present and non-empty makes the rule an antiport).
//!
//! [`Rule::parse_base`] / [`Rule::parse_transport`] read these forms and the
//! `Display` impl re-encodes any rule into a string the same grammar accepts.

use std::collections::BTreeMap;
use std::fmt;

use crate::error::FormatError;
use crate::multiset::Multiset;

// ─────────────────────────────────────────────
// Directions and kinds
// ─────────────────────────────────────────────

/// Routing target of one produced object in a rewriting rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Direction {
    Here,
    In,
    Out,
}

/// Transport discipline of a symport/antiport rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportKind {
    Antiport,
    SymportIn,
    SymportOut,
}

impl TransportKind {
    fn name(self) -> &'static str {
        match self {
            TransportKind::Antiport => "antiport",
            TransportKind::SymportIn => "symport-in",
            TransportKind::SymportOut => "symport-out",
        }
    }
}

// ─────────────────────────────────────────────
// Rewriting rules
// ─────────────────────────────────────────────

/// Right-hand side of a rewriting rule: produced symbol, routing direction,
/// multiplicity.
pub type RightSide = BTreeMap<(char, Direction), usize>;

/// Object rewriting rule: `left_side` is consumed from the region,
/// `right_side` is produced and routed per entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewriteRule {
    pub left_side:  Multiset,
    pub right_side: RightSide,
}

impl RewriteRule {
    pub fn new(left_side: Multiset, right_side: RightSide) -> Self {
        Self { left_side, right_side }
    }

    /// Total multiplicity consumed by one application.
    pub fn weight(&self) -> usize {
        self.left_side.len()
    }

    /// `true` iff any produced object is routed inward.
    pub fn has_in_object(&self) -> bool {
        self.right_side.keys().any(|&(_, d)| d == Direction::In)
    }

    fn render_side(&self, dir: Direction) -> String {
        let mut out = String::new();
        for (&(s, d), &count) in &self.right_side {
            if d == dir {
                for _ in 0..count {
                    out.push(s);
                }
            }
        }
        out
    }
}

// ─────────────────────────────────────────────
// Transport rules
// ─────────────────────────────────────────────

/// Symport/antiport rule: pure transport of objects across the region's
/// membrane, with no rewriting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportRule {
    pub kind:     TransportKind,
    pub imported: Option<Multiset>,
    pub exported: Option<Multiset>,
}

impl TransportRule {
    /// Build a transport rule, rejecting combinations its kind could not
    /// execute (an antiport needs both sides, a symport needs its own).
    pub fn new(
        kind: TransportKind,
        imported: Option<Multiset>,
        exported: Option<Multiset>,
    ) -> Result<Self, FormatError> {
        if imported.is_none() && exported.is_none() {
            return Err(FormatError::EmptyTransportRule);
        }
        let missing = |side| FormatError::MissingTransportSide { kind: kind.name(), side };
        match kind {
            TransportKind::Antiport => {
                if imported.is_none() {
                    return Err(missing("imported"));
                }
                if exported.is_none() {
                    return Err(missing("exported"));
                }
            }
            TransportKind::SymportIn => {
                if imported.is_none() {
                    return Err(missing("imported"));
                }
            }
            TransportKind::SymportOut => {
                if exported.is_none() {
                    return Err(missing("exported"));
                }
            }
        }
        Ok(Self { kind, imported, exported })
    }

    /// Import count, export count, or the larger of both, by kind.
    pub fn weight(&self) -> usize {
        let imp = self.imported.as_ref().map_or(0, Multiset::len);
        let exp = self.exported.as_ref().map_or(0, Multiset::len);
        match self.kind {
            TransportKind::Antiport => imp.max(exp),
            TransportKind::SymportIn => imp,
            TransportKind::SymportOut => exp,
        }
    }
}

// ─────────────────────────────────────────────
// Rule
// ─────────────────────────────────────────────

/// One evolution rule attached to a region.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rule {
    Rewrite(RewriteRule),
    Dissolving(RewriteRule),
    Priority { strong: Box<Rule>, weak: Box<Rule> },
    Transport(TransportRule),
}

impl Rule {
    /// Build a priority pair. Only rewriting rules (dissolving included) may
    /// be members; nesting priorities or mixing in transport rules fails.
    pub fn priority(strong: Rule, weak: Rule) -> Result<Rule, FormatError> {
        let is_member = |r: &Rule| matches!(r, Rule::Rewrite(_) | Rule::Dissolving(_));
        if !is_member(&strong) || !is_member(&weak) {
            return Err(FormatError::InvalidPriorityOperand);
        }
        Ok(Rule::Priority { strong: Box::new(strong), weak: Box::new(weak) })
    }

    pub fn is_dissolving(&self) -> bool {
        matches!(self, Rule::Dissolving(_))
    }

    // ── Parsing: rewriting grammar ─────────────────────

    /// Parse a base-model rule string (rewriting grammar, optionally one
    /// priority separator).
    pub fn parse_base(input: &str) -> Result<Rule, FormatError> {
        let chars: Vec<char> = input.chars().filter(|c| !c.is_whitespace()).collect();

        // A '>' not preceded by '-' separates the priority members; the '>'
        // of an arrow never does.
        let separators: Vec<usize> = chars
            .iter()
            .enumerate()
            .filter(|&(i, &c)| c == '>' && (i == 0 || chars[i - 1] != '-'))
            .map(|(i, _)| i)
            .collect();

        match separators.as_slice() {
            [] => parse_rewrite(&chars, 0),
            [at] => {
                let strong = parse_rewrite(&chars[..*at], 0)?;
                let weak = parse_rewrite(&chars[at + 1..], at + 1)?;
                Rule::priority(strong, weak)
            }
            _ => Err(FormatError::ExtraPrioritySeparator),
        }
    }

    // ── Parsing: transport grammar ─────────────────────

    /// Parse a symport/antiport rule string.
    pub fn parse_transport(input: &str) -> Result<Rule, FormatError> {
        let chars: Vec<char> = input.chars().filter(|c| !c.is_whitespace()).collect();
        let mut imported: Option<Multiset> = None;
        let mut exported: Option<Multiset> = None;

        let mut pos = 0;
        while pos < chars.len() {
            if let Some(next) = match_keyword(&chars, pos, "IN:") {
                if imported.is_some() {
                    return Err(FormatError::DuplicateTransportSection("IN"));
                }
                let (ms, next) = take_symbols(&chars, next);
                imported = Some(ms);
                pos = next;
            } else if let Some(next) = match_keyword(&chars, pos, "OUT:") {
                if exported.is_some() {
                    return Err(FormatError::DuplicateTransportSection("OUT"));
                }
                let (ms, next) = take_symbols(&chars, next);
                exported = Some(ms);
                pos = next;
            } else {
                return Err(FormatError::UnexpectedChar { ch: chars[pos], pos });
            }
        }

        // An empty section is the same as an absent one.
        let imported = imported.filter(|m| !m.is_empty());
        let exported = exported.filter(|m| !m.is_empty());
        let kind = match (&imported, &exported) {
            (Some(_), Some(_)) => TransportKind::Antiport,
            (Some(_), None) => TransportKind::SymportIn,
            (None, Some(_)) => TransportKind::SymportOut,
            (None, None) => return Err(FormatError::EmptyTransportRule),
        };
        Ok(Rule::Transport(TransportRule::new(kind, imported, exported)?))
    }
}

// ─────────────────────────────────────────────
// Grammar helpers
// ─────────────────────────────────────────────

/// Parse one rewriting rule from whitespace-stripped chars. `offset` shifts
/// reported error positions to the enclosing string.
fn parse_rewrite(chars: &[char], offset: usize) -> Result<Rule, FormatError> {
    let arrow = chars
        .windows(2)
        .position(|w| w == ['-', '>'])
        .ok_or(FormatError::MissingArrow)?;

    let mut left_side = Multiset::new();
    for (i, &c) in chars[..arrow].iter().enumerate() {
        if c.is_ascii_lowercase() {
            left_side.add(c, 1);
        } else {
            return Err(FormatError::UnexpectedChar { ch: c, pos: offset + i });
        }
    }

    let mut pos = arrow + 2;
    let dissolving = chars.get(pos) == Some(&'#');
    if dissolving {
        pos += 1;
    }

    let mut right_side = RightSide::new();
    while pos < chars.len() {
        let (dir, next) = if let Some(next) = match_keyword(chars, pos, "IN:") {
            (Direction::In, next)
        } else if let Some(next) = match_keyword(chars, pos, "OUT:") {
            (Direction::Out, next)
        } else if let Some(next) = match_keyword(chars, pos, "HERE:") {
            (Direction::Here, next)
        } else {
            return Err(FormatError::UnexpectedChar { ch: chars[pos], pos: offset + pos });
        };
        pos = next;
        while pos < chars.len() && chars[pos].is_ascii_lowercase() {
            *right_side.entry((chars[pos], dir)).or_insert(0) += 1;
            pos += 1;
        }
    }

    let rule = RewriteRule::new(left_side, right_side);
    Ok(if dissolving { Rule::Dissolving(rule) } else { Rule::Rewrite(rule) })
}

/// Return the position after `keyword` when it starts at `pos`.
fn match_keyword(chars: &[char], pos: usize, keyword: &str) -> Option<usize> {
    let k: Vec<char> = keyword.chars().collect();
    if chars.len() - pos >= k.len() && chars[pos..pos + k.len()] == k[..] {
        Some(pos + k.len())
    } else {
        None
    }
}

/// Consume lowercase symbols starting at `pos` into a multiset.
fn take_symbols(chars: &[char], mut pos: usize) -> (Multiset, usize) {
    let mut ms = Multiset::new();
    while pos < chars.len() && chars[pos].is_ascii_lowercase() {
        ms.add(chars[pos], 1);
        pos += 1;
    }
    (ms, pos)
}

// ─────────────────────────────────────────────
// Encoding
// ─────────────────────────────────────────────

impl fmt::Display for Rule {
    /// Canonical, re-parseable form: sections in `IN OUT HERE` order, symbols
    /// in sorted order.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rule::Rewrite(r) => write_rewrite(f, r, false),
            Rule::Dissolving(r) => write_rewrite(f, r, true),
            Rule::Priority { strong, weak } => write!(f, "{strong} > {weak}"),
            Rule::Transport(t) => {
                let imp = t.imported.as_ref();
                let exp = t.exported.as_ref();
                match t.kind {
                    TransportKind::Antiport => write!(
                        f,
                        "IN: {} OUT: {}",
                        imp.map(Multiset::to_string).unwrap_or_default(),
                        exp.map(Multiset::to_string).unwrap_or_default(),
                    ),
                    TransportKind::SymportIn => {
                        write!(f, "IN: {}", imp.map(Multiset::to_string).unwrap_or_default())
                    }
                    TransportKind::SymportOut => {
                        write!(f, "OUT: {}", exp.map(Multiset::to_string).unwrap_or_default())
                    }
                }
            }
        }
    }
}

fn write_rewrite(f: &mut fmt::Formatter<'_>, rule: &RewriteRule, dissolving: bool) -> fmt::Result {
    write!(
        f,
        "{} -> {}IN: {} OUT: {} HERE: {}",
        rule.left_side,
        if dissolving { "# " } else { "" },
        rule.render_side(Direction::In),
        rule.render_side(Direction::Out),
        rule.render_side(Direction::Here),
    )
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(pairs: &[(char, usize)]) -> Multiset {
        pairs.iter().copied().collect()
    }

    fn right(entries: &[(char, Direction, usize)]) -> RightSide {
        entries.iter().map(|&(s, d, c)| ((s, d), c)).collect()
    }

    #[test]
    fn rewrite_weight_is_left_side_length() {
        let r = RewriteRule::new(ms(&[('a', 2), ('b', 1)]), right(&[('a', Direction::Here, 1)]));
        assert_eq!(r.weight(), 3);
        assert!(!r.has_in_object());
        let r = RewriteRule::new(ms(&[('a', 1)]), right(&[('b', Direction::In, 2)]));
        assert!(r.has_in_object());
    }

    #[test]
    fn priority_members_must_be_rewriting_rules() {
        let a = Rule::Rewrite(RewriteRule::new(ms(&[('a', 2)]), RightSide::new()));
        let b = Rule::Dissolving(RewriteRule::new(ms(&[('c', 1)]), RightSide::new()));
        let p = Rule::priority(a.clone(), b.clone()).unwrap();
        assert!(matches!(p, Rule::Priority { .. }));

        assert_eq!(
            Rule::priority(p, b.clone()),
            Err(FormatError::InvalidPriorityOperand)
        );
        let t = Rule::Transport(
            TransportRule::new(TransportKind::SymportIn, Some(ms(&[('a', 1)])), None).unwrap(),
        );
        assert_eq!(Rule::priority(t, a), Err(FormatError::InvalidPriorityOperand));
    }

    #[test]
    fn transport_weight_by_kind() {
        let anti =
            TransportRule::new(TransportKind::Antiport, Some(ms(&[('a', 2)])), Some(ms(&[('b', 1)])))
                .unwrap();
        assert_eq!(anti.weight(), 2);

        let sym_in =
            TransportRule::new(TransportKind::SymportIn, Some(ms(&[('a', 3)])), None).unwrap();
        assert_eq!(sym_in.weight(), 3);
        assert!(sym_in.exported.is_none());

        let sym_out =
            TransportRule::new(TransportKind::SymportOut, None, Some(ms(&[('e', 2)]))).unwrap();
        assert_eq!(sym_out.weight(), 2);
        assert!(sym_out.imported.is_none());
    }

    #[test]
    fn transport_rejects_missing_sides() {
        assert_eq!(
            TransportRule::new(TransportKind::Antiport, None, None),
            Err(FormatError::EmptyTransportRule)
        );
        assert!(TransportRule::new(TransportKind::Antiport, Some(ms(&[('a', 1)])), None).is_err());
        assert!(TransportRule::new(TransportKind::SymportIn, None, Some(ms(&[('a', 1)]))).is_err());
    }

    #[test]
    fn parse_plain_rewrite() {
        let rule = Rule::parse_base("aaa -> IN: bb OUT: a HERE:").unwrap();
        let Rule::Rewrite(r) = rule else { panic!("expected rewrite") };
        assert_eq!(r.left_side, ms(&[('a', 3)]));
        assert_eq!(
            r.right_side,
            right(&[('b', Direction::In, 2), ('a', Direction::Out, 1)])
        );
    }

    #[test]
    fn parse_interleaved_whitespace_and_repeated_sections() {
        let rule = Rule::parse_base("aaa a-> IN:a bb OUT:c a HERE:dd").unwrap();
        let Rule::Rewrite(r) = rule else { panic!("expected rewrite") };
        assert_eq!(r.left_side, ms(&[('a', 4)]));
        assert_eq!(
            r.right_side,
            right(&[
                ('a', Direction::In, 1),
                ('b', Direction::In, 2),
                ('a', Direction::Out, 1),
                ('c', Direction::Out, 1),
                ('d', Direction::Here, 2),
            ])
        );

        let rule = Rule::parse_base("a  b c -> IN: b b b OUT:aaHERE: aa aa").unwrap();
        let Rule::Rewrite(r) = rule else { panic!("expected rewrite") };
        assert_eq!(r.left_side, ms(&[('a', 1), ('b', 1), ('c', 1)]));
        assert_eq!(
            r.right_side,
            right(&[
                ('b', Direction::In, 3),
                ('a', Direction::Out, 2),
                ('a', Direction::Here, 4),
            ])
        );
    }

    #[test]
    fn parse_dissolving_marker() {
        let rule = Rule::parse_base("a-># IN:abb OUT:ca HERE:dd").unwrap();
        let Rule::Dissolving(r) = rule else { panic!("expected dissolving") };
        assert_eq!(r.left_side, ms(&[('a', 1)]));
        assert_eq!(r.right_side.len(), 5);

        // '#' belongs right after the arrow, nowhere else
        assert!(Rule::parse_base("aaa #-> IN: bb").is_err());
    }

    #[test]
    fn parse_priority_pair() {
        let rule = Rule::parse_base("a-># IN:abb OUT:ca HERE:dd > b -> IN: OUT:c HERE:").unwrap();
        let Rule::Priority { strong, weak } = rule else { panic!("expected priority") };
        assert!(strong.is_dissolving());
        let Rule::Rewrite(w) = *weak else { panic!("expected rewrite weak member") };
        assert_eq!(w.left_side, ms(&[('b', 1)]));
        assert_eq!(w.right_side, right(&[('c', Direction::Out, 1)]));

        assert_eq!(
            Rule::parse_base("a -> HERE:b > b -> HERE:c > c -> HERE:d"),
            Err(FormatError::ExtraPrioritySeparator)
        );
    }

    #[test]
    fn parse_rejects_malformed_rewrites() {
        assert_eq!(Rule::parse_base("abc"), Err(FormatError::MissingArrow));
        assert!(matches!(
            Rule::parse_base("aBa -> HERE:c"),
            Err(FormatError::UnexpectedChar { ch: 'B', .. })
        ));
        assert!(matches!(
            Rule::parse_base("a -> FOO:c"),
            Err(FormatError::UnexpectedChar { .. })
        ));
    }

    #[test]
    fn parse_transport_forms() {
        let Rule::Transport(t) = Rule::parse_transport("     IN:aaaOUT:       b").unwrap() else {
            panic!("expected transport")
        };
        assert_eq!(t.kind, TransportKind::Antiport);
        assert_eq!(t.imported, Some(ms(&[('a', 3)])));
        assert_eq!(t.exported, Some(ms(&[('b', 1)])));

        let Rule::Transport(t) = Rule::parse_transport("OUT:c cc cIN:aa a").unwrap() else {
            panic!("expected transport")
        };
        assert_eq!(t.kind, TransportKind::Antiport);
        assert_eq!(t.exported, Some(ms(&[('c', 4)])));
        assert_eq!(t.imported, Some(ms(&[('a', 3)])));

        let Rule::Transport(t) = Rule::parse_transport("   IN: aaa").unwrap() else {
            panic!("expected transport")
        };
        assert_eq!(t.kind, TransportKind::SymportIn);
        assert!(t.exported.is_none());

        let Rule::Transport(t) = Rule::parse_transport("   OUT: cdcd").unwrap() else {
            panic!("expected transport")
        };
        assert_eq!(t.kind, TransportKind::SymportOut);
        assert_eq!(t.exported, Some(ms(&[('c', 2), ('d', 2)])));
    }

    #[test]
    fn parse_transport_rejections() {
        assert_eq!(
            Rule::parse_transport("IN:a IN:b"),
            Err(FormatError::DuplicateTransportSection("IN"))
        );
        assert_eq!(
            Rule::parse_transport("OUT:abb OUT:b"),
            Err(FormatError::DuplicateTransportSection("OUT"))
        );
        assert_eq!(Rule::parse_transport("IN: OUT:"), Err(FormatError::EmptyTransportRule));
        assert!(matches!(
            Rule::parse_transport("xyz"),
            Err(FormatError::UnexpectedChar { .. })
        ));
    }

    #[test]
    fn encode_parse_round_trip() {
        let strings = [
            "aaa -> IN: bb OUT: a HERE:",
            "a -> # IN: abb OUT: ac HERE: dd",
            "a -> # IN: abb OUT: ac HERE: dd > b -> IN: OUT: c HERE:",
        ];
        for s in strings {
            let rule = Rule::parse_base(s).unwrap();
            let reparsed = Rule::parse_base(&rule.to_string()).unwrap();
            assert_eq!(rule, reparsed, "round trip of {s:?} via {:?}", rule.to_string());
        }

        for s in ["IN:aaa OUT:b", "IN: aaa", "OUT: cdcd"] {
            let rule = Rule::parse_transport(s).unwrap();
            let reparsed = Rule::parse_transport(&rule.to_string()).unwrap();
            assert_eq!(rule, reparsed);
        }
    }
}
