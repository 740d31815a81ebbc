//! Selector predicates over constraint snapshots
//!
//! Grammar (keywords are case-insensitive):
//!
//! ```text
//! selector := conjunction ( OR conjunction )*
//! conjunction := clause ( AND clause )*
//! clause := field op value | field IN { value, ... }
//! field := tier | scope | family
//! op := = | == | != | < | <= | > | >=
//! ```
//!
//! `∈`, `≤`, `≥`, `&&` and `||` are accepted as aliases. An empty selector or
//! `*` matches everything. `scope = B` also matches GLOBAL records.

use crate::ContractError;
use std::collections::BTreeSet;
use std::fmt;
use stratum_domain::{Constraint, ConstraintId, FamilyId, Scope, Tier};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Op {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    In,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Word(String),
    Op(Op),
    Open,
    Close,
    Comma,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Word(w) => write!(f, "'{}'", w),
            Token::Op(op) => write!(f, "operator {:?}", op),
            Token::Open => f.write_str("'{'"),
            Token::Close => f.write_str("'}'"),
            Token::Comma => f.write_str("','"),
        }
    }
}

/// One parsed clause
#[derive(Debug, Clone, PartialEq, Eq)]
enum Predicate {
    Tier(BTreeSet<Tier>),
    Scope { scopes: BTreeSet<Scope>, negated: bool },
    Family { families: BTreeSet<FamilyId>, negated: bool },
}

impl Predicate {
    fn matches(&self, record: &Constraint) -> bool {
        match self {
            Predicate::Tier(tiers) => tiers.contains(&record.tier),
            Predicate::Scope { scopes, negated: false } => {
                record.scope == Scope::Global || scopes.contains(&record.scope)
            }
            Predicate::Scope { scopes, negated: true } => !scopes.contains(&record.scope),
            Predicate::Family { families, negated } => families.contains(&record.family) != *negated,
        }
    }
}

/// A parsed selector: a disjunction of conjunctions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selector {
    source: String,
    any_of: Vec<Vec<Predicate>>,
}

impl Selector {
    /// Selector matching every record
    pub fn all() -> Self {
        Self {
            source: "*".to_string(),
            any_of: vec![Vec::new()],
        }
    }

    /// Parse selector text
    ///
    /// # Examples
    ///
    /// ```
    /// use stratum_contracts::Selector;
    ///
    /// assert!(Selector::parse("scope=B AND tier<=2").is_ok());
    /// assert!(Selector::parse("tier in {0,1,2} AND scope = B").is_ok());
    /// assert!(Selector::parse("colour = red").is_err());
    /// ```
    pub fn parse(input: &str) -> Result<Self, ContractError> {
        let source = input.trim();
        if source.is_empty() || source == "*" {
            return Ok(Self::all());
        }

        let error = |message: String| ContractError::Selector {
            selector: source.to_string(),
            message,
        };

        let tokens = lex(source).map_err(error)?;
        let mut parser = Parser { tokens, pos: 0 };
        let mut any_of = vec![parser.conjunction().map_err(error)?];
        while parser.eat_keyword("OR") {
            any_of.push(parser.conjunction().map_err(error)?);
        }
        if let Some(token) = parser.peek() {
            return Err(error(format!("unexpected {}", token)));
        }

        Ok(Self {
            source: source.to_string(),
            any_of,
        })
    }

    /// Selector text as written
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Whether a record satisfies the selector
    pub fn matches(&self, record: &Constraint) -> bool {
        self.any_of
            .iter()
            .any(|clauses| clauses.iter().all(|p| p.matches(record)))
    }

    /// Whether some record in `family` at `tier` could satisfy the selector
    ///
    /// Scope clauses are treated as satisfiable since the scope is unknown.
    pub fn may_match(&self, family: &FamilyId, tier: Tier) -> bool {
        self.any_of.iter().any(|clauses| {
            clauses.iter().all(|p| match p {
                Predicate::Tier(tiers) => tiers.contains(&tier),
                Predicate::Scope { .. } => true,
                Predicate::Family { families, negated } => families.contains(family) != *negated,
            })
        })
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

impl std::str::FromStr for Selector {
    type Err = ContractError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '.' | '-' | '*')
}

fn lex(input: &str) -> Result<Vec<Token>, String> {
    let mut tokens = Vec::new();
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        let token = match c {
            c if c.is_whitespace() => continue,
            '{' | '[' => Token::Open,
            '}' | ']' => Token::Close,
            ',' => Token::Comma,
            '∈' => Token::Op(Op::In),
            '≤' => Token::Op(Op::Le),
            '≥' => Token::Op(Op::Ge),
            '=' => {
                chars.next_if_eq(&'=');
                Token::Op(Op::Eq)
            }
            '!' if chars.next_if_eq(&'=').is_some() => Token::Op(Op::Ne),
            '<' if chars.next_if_eq(&'=').is_some() => Token::Op(Op::Le),
            '<' => Token::Op(Op::Lt),
            '>' if chars.next_if_eq(&'=').is_some() => Token::Op(Op::Ge),
            '>' => Token::Op(Op::Gt),
            '&' if chars.next_if_eq(&'&').is_some() => Token::Word("AND".to_string()),
            '|' if chars.next_if_eq(&'|').is_some() => Token::Word("OR".to_string()),
            c if is_word_char(c) => {
                let mut word = String::from(c);
                while let Some(next) = chars.next_if(|n| is_word_char(*n)) {
                    word.push(next);
                }
                Token::Word(word)
            }
            other => return Err(format!("unexpected character '{}'", other)),
        };
        tokens.push(token);
    }

    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn eat_keyword(&mut self, keyword: &str) -> bool {
        match self.peek() {
            Some(Token::Word(w)) if w.eq_ignore_ascii_case(keyword) => {
                self.pos += 1;
                true
            }
            _ => false,
        }
    }

    fn word(&mut self, expected: &str) -> Result<String, String> {
        match self.next() {
            Some(Token::Word(w)) => Ok(w),
            Some(other) => Err(format!("expected {}, found {}", expected, other)),
            None => Err(format!("expected {}, found end of input", expected)),
        }
    }

    fn conjunction(&mut self) -> Result<Vec<Predicate>, String> {
        let mut clauses = vec![self.clause()?];
        while self.eat_keyword("AND") {
            clauses.push(self.clause()?);
        }
        Ok(clauses)
    }

    fn clause(&mut self) -> Result<Predicate, String> {
        let field = self.word("field")?.to_ascii_lowercase();

        let op = if self.eat_keyword("IN") {
            Op::In
        } else {
            match self.next() {
                Some(Token::Op(op)) => op,
                Some(other) => return Err(format!("expected operator after {}, found {}", field, other)),
                None => return Err(format!("expected operator after {}", field)),
            }
        };

        let values = if op == Op::In {
            self.set()?
        } else {
            vec![self.word("value")?]
        };

        match field.as_str() {
            "tier" => tier_predicate(op, &values),
            "scope" => {
                let scopes = values
                    .iter()
                    .map(|v| Scope::parse(v).ok_or_else(|| format!("invalid scope '{}'", v)))
                    .collect::<Result<BTreeSet<_>, _>>()?;
                Ok(Predicate::Scope {
                    scopes,
                    negated: negation(op, "scope")?,
                })
            }
            "family" | "id" => {
                let families = values
                    .iter()
                    .map(|v| {
                        ConstraintId::parse(v)
                            .map(|id| id.family())
                            .map_err(|e| e.to_string())
                    })
                    .collect::<Result<BTreeSet<_>, _>>()?;
                Ok(Predicate::Family {
                    families,
                    negated: negation(op, "family")?,
                })
            }
            other => Err(format!("unknown field '{}'", other)),
        }
    }

    fn set(&mut self) -> Result<Vec<String>, String> {
        match self.next() {
            Some(Token::Open) => {}
            _ => return Err("expected '{' after IN".to_string()),
        }
        let mut values = Vec::new();
        loop {
            values.push(self.word("set member")?);
            match self.next() {
                Some(Token::Comma) => continue,
                Some(Token::Close) => return Ok(values),
                _ => return Err("unterminated set".to_string()),
            }
        }
    }
}

fn negation(op: Op, field: &str) -> Result<bool, String> {
    match op {
        Op::Eq | Op::In => Ok(false),
        Op::Ne => Ok(true),
        _ => Err(format!("{} supports only =, != and IN", field)),
    }
}

fn tier_predicate(op: Op, values: &[String]) -> Result<Predicate, String> {
    let tiers = values
        .iter()
        .map(|v| Tier::parse(v).ok_or_else(|| format!("invalid tier '{}'", v)))
        .collect::<Result<Vec<_>, _>>()?;

    let selected: BTreeSet<Tier> = match op {
        Op::Eq | Op::In => tiers.into_iter().collect(),
        _ => {
            let level = tiers[0].level();
            Tier::ALL
                .into_iter()
                .filter(|t| match op {
                    Op::Ne => t.level() != level,
                    Op::Lt => t.level() < level,
                    Op::Le => t.level() <= level,
                    Op::Gt => t.level() > level,
                    _ => t.level() >= level,
                })
                .collect()
        }
    };
    Ok(Predicate::Tier(selected))
}

#[cfg(test)]
mod tests {
    use super::*;
    use stratum_domain::{Candidate, ReviewState};

    fn record(id: &str, tier: Tier, scope: Scope) -> Constraint {
        let id = ConstraintId::parse(id).unwrap();
        Constraint::from_candidate(
            Candidate::new(id.clone(), "s", tier, scope),
            id.clone(),
            id.family(),
            0,
            ReviewState::Clear,
            0,
        )
    }

    #[test]
    fn test_tier_and_scope() {
        let selector = Selector::parse("scope=B AND tier<=2").unwrap();
        assert!(selector.matches(&record("C1", Tier::Established, Scope::B)));
        assert!(selector.matches(&record("C2", Tier::Frozen, Scope::Global)));
        assert!(!selector.matches(&record("C3", Tier::Speculative, Scope::B)));
        assert!(!selector.matches(&record("C4", Tier::Frozen, Scope::A)));
    }

    #[test]
    fn test_set_syntax() {
        let ascii = Selector::parse("tier in {0,1,2} AND scope = B").unwrap();
        let unicode = Selector::parse("tier ∈ {FROZEN, FALSIFIED, ESTABLISHED} && scope == B").unwrap();
        for tier in Tier::ALL {
            let r = record("C1", tier, Scope::B);
            assert_eq!(ascii.matches(&r), unicode.matches(&r));
        }
    }

    #[test]
    fn test_disjunction_and_negation() {
        let selector = Selector::parse("family = C498 OR scope != A").unwrap();
        assert!(selector.matches(&record("C498.b", Tier::Established, Scope::A)));
        assert!(selector.matches(&record("C2", Tier::Established, Scope::Ht)));
        assert!(!selector.matches(&record("C3", Tier::Established, Scope::A)));
    }

    #[test]
    fn test_may_match() {
        let selector = Selector::parse("tier < 2 AND scope = HT").unwrap();
        let family = FamilyId::new("C9");
        assert!(selector.may_match(&family, Tier::Frozen));
        assert!(!selector.may_match(&family, Tier::Established));
        assert!(Selector::all().may_match(&family, Tier::Exploratory));
    }

    #[test]
    fn test_parse_errors() {
        for bad in [
            "tier",
            "tier <=",
            "tier = 9",
            "scope < B",
            "colour = red",
            "tier in {0,1",
            "tier = 1 AND",
            "tier = 1 scope = B",
            "(tier = 1)",
        ] {
            assert!(Selector::parse(bad).is_err(), "accepted '{}'", bad);
        }
    }

    #[test]
    fn test_empty_matches_everything() {
        let selector = Selector::parse("  ").unwrap();
        assert_eq!(selector.as_str(), "*");
        assert!(selector.matches(&record("C1", Tier::Exploratory, Scope::Azc)));
    }
}
