//! Script crate - atom script compiler for the Sandlang cellular automaton
//!
//! Turns a text script declaring material types ("atoms"), their properties
//! and pattern-matching rules into an immutable [`WorldDefinition`] that the
//! simulation interprets.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                    Script Compiler                       │
//! ├─────────────────────────────────────────────────────────┤
//! │  Lexer                                                   │
//! │  ├── Strips // and /* */ comments                       │
//! │  └── Numbered, trimmed lines                            │
//! ├─────────────────────────────────────────────────────────┤
//! │  Compiler (state machine)                                │
//! │  ├── atom / ruleset / section blocks                    │
//! │  ├── match { } -> { } rule phases and pattern rows      │
//! │  └── Statements parsed with nom                         │
//! ├─────────────────────────────────────────────────────────┤
//! │  Expressions                                             │
//! │  ├── [prop] and [prop - x, y] property reads            │
//! │  ├── [$r'min'max'step] random constants                 │
//! │  └── Compiled with fasteval                             │
//! ├─────────────────────────────────────────────────────────┤
//! │  World Definition                                        │
//! │  ├── AtomTypes by id / name / alias / key               │
//! │  ├── Global defaults and preload colors                 │
//! │  └── Designated empty atom                              │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```rust
//! let world = script::compile(
//!     r#"
//! atom Empty {
//! }
//! atom Sand {
//!     section update {
//!         match (0, 0, 1, 2) {
//!             pattern
//!             x
//!             _
//!         }
//!         -> {
//!             pattern
//!             _
//!             x
//!         }
//!     }
//! }
//! "#,
//! )
//! .unwrap();
//!
//! assert_eq!(world.atom_by_name("Sand").unwrap().rules.len(), 1);
//! ```

mod atom;
mod compiler;
mod error;
mod expr;
mod lexer;
mod rule;
mod statement;
mod world;

pub use atom::{
    AtomColor, AtomId, AtomType, Color, ColorRange, ColorRule, Extension, ExtensionKind, SetMember,
};
pub use compiler::{compile, compile_file, Compiler};
pub use error::{CompileErrorKind, Error, Result};
pub use expr::{is_truthy, CompiledExpr, EvalError, ExprError, ExprMode, Lookup, RandomRange, VarSlot, VarSource};
pub use rule::{EffectSymbol, MatchSymbol, Rule, RuleId, Step, Symmetry};
pub use world::{ReachReport, WorldDefinition, EMPTY_ATOM_NAME};

// Re-export glam for convenience
pub use glam;
