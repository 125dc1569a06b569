//! # QuarryDB scripting VM
//!
//! A small dynamically typed language for working with documents stored in a
//! [`quarry_core::Database`]. Scripts are compiled to stack bytecode and run
//! by an interpreter that owns an operand stack, call frames and an output
//! buffer.
//!
//! - [`compile`] turns source into a reusable [`Program`]
//! - [`Vm`] executes programs, holds registered [`ForeignFunction`]s and
//!   constants, and optionally an attached database used by the `db_*` and
//!   `kv_*` built-ins
//!
//! ```rust
//! use quarry_core::Database;
//! use quarry_vm::Vm;
//!
//! let db = Database::open_in_memory().unwrap();
//! let mut vm = Vm::with_database(&db);
//! let result = vm
//!     .run(
//!         r#"
//!         db_create('users');
//!         db_store('users', {name: 'ann', age: 31});
//!         $u = db_fetch_by_id('users', 0);
//!         print $u.name, ' is ', $u.age;
//!         "#,
//!     )
//!     .unwrap();
//! assert_eq!(result.text(), "ann is 31");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod ast;
mod builtins;
mod bytecode;
mod compiler;
mod config;
mod error;
mod lexer;
mod machine;
mod ops;
mod parser;
mod vm;

pub use bytecode::Program;
pub use compiler::compile;
pub use config::{VmConfig, DEFAULT_MAX_CALL_DEPTH};
pub use error::{VmError, VmResult};
pub use quarry_codec::Value;
pub use vm::{CallContext, ExecutionResult, ForeignFunction, Vm};
