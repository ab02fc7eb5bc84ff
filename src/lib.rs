#![forbid(unsafe_code)]
//! lazytab: lazily evaluated, statically typed expressions over indexed
//! datasets.
//!
//! Build expressions from dataset fields and literals; every composition is
//! type- and scope-checked on the spot. Nothing reads data until one of the
//! [`Evaluator`](lazytab_exec::Evaluator) terminal operations runs.

pub use lazytab_core;
pub use lazytab_exec;
pub use lazytab_expr;
pub use lazytab_io;
pub use lazytab_planner;

pub mod prelude {
    pub use lazytab_core::prelude::*;
    pub use lazytab_exec::{Evaluator, ExecutionBackend, LocalBackend, MaterializeMode};
    pub use lazytab_expr::{
        array, coalesce, if_else, interval, lit, lit_typed, mapping, missing, or_missing, set,
        structure, tuple, Expr, FieldRef, IntoExpr,
    };
    pub use lazytab_io::{DatasetProvider, MemoryDataset, MemoryProvider};
}
