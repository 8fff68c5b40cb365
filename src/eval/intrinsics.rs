//! Intrinsic info
//!
//! The ordered catalogue of primitive combiners. A primitive object
//! refers to its implementation by index into this catalogue.
use std::fmt;

/// How a primitive receives its operands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    /// Bound directly: receives the unevaluated operand tree
    Operative,
    /// Bound wrapped in an applicative: receives evaluated operands
    Applicative,
}

/// Number of operands a primitive accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Exact(usize),
    AtLeast(usize),
    Between(usize, usize),
}

impl Arity {
    pub fn accepts(self, count: usize) -> bool {
        match self {
            Arity::Exact(n) => count == n,
            Arity::AtLeast(n) => count >= n,
            Arity::Between(min, max) => count >= min && count <= max,
        }
    }
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arity::Exact(n) => write!(f, "{}", n),
            Arity::AtLeast(n) => write!(f, "at least {}", n),
            Arity::Between(min, max) => write!(f, "{} to {}", min, max),
        }
    }
}

pub struct Intrinsic {
    name: &'static str,
    kind: Kind,
    arity: Arity,
}

impl Intrinsic {
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn kind(&self) -> Kind {
        self.kind
    }

    pub fn arity(&self) -> Arity {
        self.arity
    }
}

lazy_static! {
    static ref INTRINSICS: Vec<Intrinsic> = vec![
        Intrinsic { // 0
            name: "vau",
            kind: Kind::Operative,
            arity: Arity::AtLeast(2),
        },
        Intrinsic { // 1
            name: "define",
            kind: Kind::Operative,
            arity: Arity::Exact(2),
        },
        Intrinsic { // 2
            name: "if",
            kind: Kind::Operative,
            arity: Arity::Exact(3),
        },
        Intrinsic { // 3
            name: "sequence",
            kind: Kind::Operative,
            arity: Arity::AtLeast(0),
        },
        Intrinsic { // 4
            name: "wrap",
            kind: Kind::Applicative,
            arity: Arity::Exact(1),
        },
        Intrinsic { // 5
            name: "unwrap",
            kind: Kind::Applicative,
            arity: Arity::Exact(1),
        },
        Intrinsic { // 6
            name: "eval",
            kind: Kind::Applicative,
            arity: Arity::Exact(2),
        },
        Intrinsic { // 7
            name: "make-environment",
            kind: Kind::Applicative,
            arity: Arity::Between(0, 1),
        },
        Intrinsic { // 8
            name: "cons",
            kind: Kind::Applicative,
            arity: Arity::Exact(2),
        },
        Intrinsic { // 9
            name: "car",
            kind: Kind::Applicative,
            arity: Arity::Exact(1),
        },
        Intrinsic { // 10
            name: "cdr",
            kind: Kind::Applicative,
            arity: Arity::Exact(1),
        },
        Intrinsic { // 11
            name: "list",
            kind: Kind::Applicative,
            arity: Arity::AtLeast(0),
        },
        Intrinsic { // 12
            name: "eq?",
            kind: Kind::Applicative,
            arity: Arity::Exact(2),
        },
        Intrinsic { // 13
            name: "null?",
            kind: Kind::Applicative,
            arity: Arity::Exact(1),
        },
        Intrinsic { // 14
            name: "pair?",
            kind: Kind::Applicative,
            arity: Arity::Exact(1),
        },
        Intrinsic { // 15
            name: "symbol?",
            kind: Kind::Applicative,
            arity: Arity::Exact(1),
        },
        Intrinsic { // 16
            name: "operative?",
            kind: Kind::Applicative,
            arity: Arity::Exact(1),
        },
        Intrinsic { // 17
            name: "applicative?",
            kind: Kind::Applicative,
            arity: Arity::Exact(1),
        },
        Intrinsic { // 18
            name: "make-vector",
            kind: Kind::Applicative,
            arity: Arity::Exact(2),
        },
        Intrinsic { // 19
            name: "vector-length",
            kind: Kind::Applicative,
            arity: Arity::Exact(1),
        },
        Intrinsic { // 20
            name: "vector-ref",
            kind: Kind::Applicative,
            arity: Arity::Exact(2),
        },
        Intrinsic { // 21
            name: "vector-set!",
            kind: Kind::Applicative,
            arity: Arity::Exact(3),
        },
        Intrinsic { // 22
            name: "+",
            kind: Kind::Applicative,
            arity: Arity::AtLeast(0),
        },
        Intrinsic { // 23
            name: "-",
            kind: Kind::Applicative,
            arity: Arity::AtLeast(1),
        },
        Intrinsic { // 24
            name: "*",
            kind: Kind::Applicative,
            arity: Arity::AtLeast(0),
        },
        Intrinsic { // 25
            name: "<",
            kind: Kind::Applicative,
            arity: Arity::Exact(2),
        },
        Intrinsic { // 26
            name: "=",
            kind: Kind::Applicative,
            arity: Arity::Exact(2),
        },
        Intrinsic { // 27
            name: "write",
            kind: Kind::Applicative,
            arity: Arity::Exact(2),
        },
        Intrinsic { // 28
            name: "newline",
            kind: Kind::Applicative,
            arity: Arity::Exact(1),
        },
        Intrinsic { // 29
            name: "read",
            kind: Kind::Applicative,
            arity: Arity::Exact(1),
        },
    ];
}

/// Find the index of the intrinsic with the specified name
pub fn index(name: &str) -> Option<usize> {
    INTRINSICS.iter().position(|i| i.name == name)
}

/// Find the catalogue entry for the intrinsic at the given index
pub fn intrinsic(index: usize) -> &'static Intrinsic {
    &INTRINSICS[index]
}

/// Retrieve the whole ordered catalogue of intrinsics
pub fn catalogue() -> &'static [Intrinsic] {
    &INTRINSICS
}
