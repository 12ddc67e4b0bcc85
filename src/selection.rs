use std::fmt;
use std::ops::RangeInclusive;
use std::str::FromStr;

use crate::topology::{Atom, Topology};
use crate::Error;

// Invariant: A selection is evaluated against atom indices of one frame. Atoms beyond the end
// of a mask are dropped, so `is_included` returning `None` means that no atom at that index or
// beyond is selected.
/// A selection of atoms.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub enum AtomSelection {
    /// Include all atoms.
    #[default]
    All,
    /// A mask of the positions to include in the selection.
    ///
    /// If the value of the mask at an index `n` is `true`, the position at that same index `n` is
    /// included in the selection.
    Mask(Vec<bool>),
}

impl AtomSelection {
    /// Create a boolean mask from a list of indices.
    pub fn from_index_list(indices: &[u32]) -> Self {
        let max = match indices.iter().max() {
            Some(&max) => max as usize + 1,
            None => return Self::Mask(Vec::new()),
        };
        let mut mask = vec![false; max];
        for &idx in indices {
            mask[idx as usize] = true;
        }

        Self::Mask(mask)
    }

    /// Determine whether some index `idx` is included in this [`AtomSelection`].
    ///
    /// Will return [`None`] once the index is beyond the scope of this `AtomSelection`.
    pub fn is_included(&self, idx: usize) -> Option<bool> {
        match self {
            AtomSelection::All => Some(true),
            AtomSelection::Mask(mask) => mask.get(idx).copied(),
        }
    }

    /// Returns the number of atoms selected from a frame of `natoms` atoms.
    pub fn count(&self, natoms: usize) -> usize {
        match self {
            AtomSelection::All => natoms,
            AtomSelection::Mask(mask) => mask.iter().take(natoms).filter(|&&m| m).count(),
        }
    }
}

/// An atom selection query, such as `name CA and resid 10:20`.
///
/// Queries combine keyword terms with `and`, `or`, `not` and parentheses. `and` binds tighter
/// than `or`. Keywords are case-insensitive, values are not.
///
/// | term | selects |
/// |---|---|
/// | `all`, `none` | every atom, no atom |
/// | `protein` | atoms in standard amino acid residues |
/// | `backbone` | `N`, `CA`, `C` and `O` of protein residues |
/// | `name`, `resname`, `chain`, `element` `<value>...` | atoms with any of the values |
/// | `resid <n\|a:b\|a-b>...` | residue numbers, ranges inclusive |
/// | `index <n\|a:b\|a-b>...` | zero-based atom indices, ranges inclusive |
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Query {
    All,
    None,
    Protein,
    Backbone,
    Name(Vec<String>),
    Resname(Vec<String>),
    Chain(Vec<String>),
    Element(Vec<String>),
    Resid(Vec<RangeInclusive<i32>>),
    Index(Vec<RangeInclusive<usize>>),
    Not(Box<Query>),
    And(Box<Query>, Box<Query>),
    Or(Box<Query>, Box<Query>),
}

const PROTEIN_RESIDUES: &[&str] = &[
    "ALA", "ARG", "ASN", "ASP", "CYS", "GLN", "GLU", "GLY", "HIS", "ILE", "LEU", "LYS", "MET",
    "PHE", "PRO", "SER", "THR", "TRP", "TYR", "VAL", // The standard twenty.
    "HID", "HIE", "HIP", "HSD", "HSE", "HSP", "CYX", "CYM", "ASH", "GLH", "LYN", "ACE", "NME",
    "NMA",
];

const BACKBONE_NAMES: &[&str] = &["N", "CA", "C", "O"];

impl Query {
    pub fn parse(query: &str) -> crate::Result<Self> {
        let tokens = tokenize(query);
        let mut parser = QueryParser {
            query,
            tokens: &tokens,
            pos: 0,
        };
        let expr = parser.parse_or()?;
        match parser.peek() {
            None => Ok(expr),
            Some(token) => Err(parser.error(format!("unexpected {token:?}"))),
        }
    }

    /// Whether this query is the plain `all` query.
    pub fn is_all(&self) -> bool {
        matches!(self, Query::All)
    }

    /// Determine whether the atom at index `idx` matches this query.
    pub fn matches(&self, idx: usize, atom: &Atom) -> bool {
        fn any(values: &[String], field: &str) -> bool {
            values.iter().any(|v| v == field)
        }
        match self {
            Query::All => true,
            Query::None => false,
            Query::Protein => PROTEIN_RESIDUES.contains(&atom.resname.as_str()),
            Query::Backbone => {
                PROTEIN_RESIDUES.contains(&atom.resname.as_str())
                    && BACKBONE_NAMES.contains(&atom.name.as_str())
            }
            Query::Name(names) => any(names, &atom.name),
            Query::Resname(names) => any(names, &atom.resname),
            Query::Chain(ids) => any(ids, &atom.chain),
            Query::Element(elements) => elements
                .iter()
                .any(|e| e.eq_ignore_ascii_case(&atom.element)),
            Query::Resid(ranges) => ranges.iter().any(|r| r.contains(&atom.resid)),
            Query::Index(ranges) => ranges.iter().any(|r| r.contains(&idx)),
            Query::Not(inner) => !inner.matches(idx, atom),
            Query::And(a, b) => a.matches(idx, atom) && b.matches(idx, atom),
            Query::Or(a, b) => a.matches(idx, atom) || b.matches(idx, atom),
        }
    }

    /// Evaluate this query against the atoms of a [`Topology`].
    pub fn evaluate(&self, topology: &Topology) -> AtomSelection {
        if self.is_all() {
            return AtomSelection::All;
        }
        let mask = topology
            .atoms
            .iter()
            .enumerate()
            .map(|(idx, atom)| self.matches(idx, atom))
            .collect();
        AtomSelection::Mask(mask)
    }
}

impl FromStr for Query {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn ranges<T: fmt::Display>(rs: &[RangeInclusive<T>]) -> String {
            rs.iter()
                .map(|r| format!("{}:{}", r.start(), r.end()))
                .collect::<Vec<_>>()
                .join(" ")
        }
        match self {
            Query::All => write!(f, "all"),
            Query::None => write!(f, "none"),
            Query::Protein => write!(f, "protein"),
            Query::Backbone => write!(f, "backbone"),
            Query::Name(v) => write!(f, "name {}", v.join(" ")),
            Query::Resname(v) => write!(f, "resname {}", v.join(" ")),
            Query::Chain(v) => write!(f, "chain {}", v.join(" ")),
            Query::Element(v) => write!(f, "element {}", v.join(" ")),
            Query::Resid(r) => write!(f, "resid {}", ranges(r)),
            Query::Index(r) => write!(f, "index {}", ranges(r)),
            Query::Not(q) => write!(f, "not ({q})"),
            Query::And(a, b) => write!(f, "({a}) and ({b})"),
            Query::Or(a, b) => write!(f, "({a}) or ({b})"),
        }
    }
}

fn tokenize(query: &str) -> Vec<String> {
    query
        .replace('(', " ( ")
        .replace(')', " ) ")
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

fn is_operator(token: &str) -> bool {
    matches!(
        token.to_ascii_lowercase().as_str(),
        "and" | "or" | "not" | "(" | ")"
    )
}

struct QueryParser<'q, 't> {
    query: &'q str,
    tokens: &'t [String],
    pos: usize,
}

impl QueryParser<'_, '_> {
    fn error(&self, reason: impl Into<String>) -> Error {
        Error::Selection {
            query: self.query.to_string(),
            reason: reason.into(),
        }
    }

    fn peek(&self) -> Option<&str> {
        self.tokens.get(self.pos).map(String::as_str)
    }

    fn peek_keyword(&self) -> Option<String> {
        self.peek().map(str::to_ascii_lowercase)
    }

    // or = and ("or" and)*
    fn parse_or(&mut self) -> crate::Result<Query> {
        let mut left = self.parse_and()?;
        while self.peek_keyword().as_deref() == Some("or") {
            self.pos += 1;
            let right = self.parse_and()?;
            left = Query::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    // and = not ("and" not)*
    fn parse_and(&mut self) -> crate::Result<Query> {
        let mut left = self.parse_not()?;
        while self.peek_keyword().as_deref() == Some("and") {
            self.pos += 1;
            let right = self.parse_not()?;
            left = Query::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    // not = "not" not | term
    fn parse_not(&mut self) -> crate::Result<Query> {
        if self.peek_keyword().as_deref() == Some("not") {
            self.pos += 1;
            let inner = self.parse_not()?;
            return Ok(Query::Not(Box::new(inner)));
        }
        self.parse_term()
    }

    // term = "(" or ")" | keyword values*
    fn parse_term(&mut self) -> crate::Result<Query> {
        let keyword = self
            .peek_keyword()
            .ok_or_else(|| self.error("unexpected end of selection"))?;
        self.pos += 1;
        let query = match keyword.as_str() {
            "(" => {
                let inner = self.parse_or()?;
                if self.peek() != Some(")") {
                    return Err(self.error("missing closing parenthesis"));
                }
                self.pos += 1;
                inner
            }
            "all" => Query::All,
            "none" => Query::None,
            "protein" => Query::Protein,
            "backbone" => Query::Backbone,
            "name" => Query::Name(self.values(&keyword)?),
            "resname" => Query::Resname(self.values(&keyword)?),
            "chain" | "chainid" => Query::Chain(self.values(&keyword)?),
            "element" => Query::Element(self.values(&keyword)?),
            "resid" | "resnum" => Query::Resid(self.ranges(&keyword)?),
            "index" => Query::Index(self.ranges(&keyword)?),
            other => return Err(self.error(format!("unknown keyword {other:?}"))),
        };
        Ok(query)
    }

    /// Consume the values following a keyword, up to the next operator.
    fn values(&mut self, keyword: &str) -> crate::Result<Vec<String>> {
        let start = self.pos;
        while self.peek().is_some_and(|token| !is_operator(token)) {
            self.pos += 1;
        }
        if start == self.pos {
            return Err(self.error(format!("{keyword:?} needs at least one value")));
        }
        Ok(self.tokens[start..self.pos].to_vec())
    }

    fn ranges<T>(&mut self, keyword: &str) -> crate::Result<Vec<RangeInclusive<T>>>
    where
        T: FromStr + PartialOrd,
    {
        self.values(keyword)?
            .iter()
            .map(|value| {
                parse_range(value)
                    .ok_or_else(|| self.error(format!("invalid {keyword} value {value:?}")))
            })
            .collect()
    }
}

/// Parse `n`, `a:b` or `a-b` into an inclusive range.
fn parse_range<T: FromStr + PartialOrd>(value: &str) -> Option<RangeInclusive<T>> {
    // A leading '-' is a sign, not a range separator.
    let split = value
        .char_indices()
        .skip(1)
        .find(|&(_, c)| c == ':' || c == '-')
        .map(|(i, _)| i);
    let range = match split {
        Some(i) => {
            let start = value[..i].parse().ok()?;
            let end = value[i + 1..].parse().ok()?;
            start..=end
        }
        None => {
            let single: T = value.parse().ok()?;
            let end = value.parse().ok()?;
            single..=end
        }
    };
    if range.start() > range.end() {
        return None;
    }
    Some(range)
}
