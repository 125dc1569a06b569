//! Public interpreter handle and the foreign-function interface.

use crate::bytecode::Program;
use crate::compiler;
use crate::config::VmConfig;
use crate::error::{VmError, VmResult};
use crate::machine::Machine;
use quarry_codec::Value;
use quarry_core::Database;
use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;
use tracing::debug;

/// A host function callable from scripts.
///
/// Arguments are borrowed for the duration of the call only. The function
/// produces exactly one result value or fails; a failure aborts the script
/// with a runtime error.
pub trait ForeignFunction {
    /// Runs the function.
    fn call(&self, ctx: &mut CallContext<'_>, args: &[Value]) -> VmResult<Value>;
}

impl<F> ForeignFunction for F
where
    F: Fn(&mut CallContext<'_>, &[Value]) -> VmResult<Value>,
{
    fn call(&self, ctx: &mut CallContext<'_>, args: &[Value]) -> VmResult<Value> {
        self(ctx, args)
    }
}

/// What a function sees of the running script.
pub struct CallContext<'a> {
    name: &'a str,
    output: &'a mut Vec<u8>,
    db: Option<&'a Database>,
    records: &'a mut HashMap<String, Option<u64>>,
}

impl<'a> CallContext<'a> {
    pub(crate) fn new(
        name: &'a str,
        output: &'a mut Vec<u8>,
        db: Option<&'a Database>,
        records: &'a mut HashMap<String, Option<u64>>,
    ) -> Self {
        Self {
            name,
            output,
            db,
            records,
        }
    }

    /// Name the function was called under.
    #[must_use]
    pub fn name(&self) -> &str {
        self.name
    }

    /// Appends bytes to the script output.
    pub fn echo(&mut self, bytes: &[u8]) {
        self.output.extend_from_slice(bytes);
    }

    /// Output produced so far.
    #[must_use]
    pub fn output(&self) -> &[u8] {
        self.output
    }

    /// The database the VM is attached to, if any.
    #[must_use]
    pub fn database(&self) -> Option<&'a Database> {
        self.db
    }

    /// Builds a runtime error prefixed with the function name.
    pub fn error(&self, message: impl fmt::Display) -> VmError {
        VmError::runtime(format!("{}(): {message}", self.name))
    }

    pub(crate) fn require_database(&self) -> VmResult<&'a Database> {
        self.db
            .ok_or_else(|| self.error("no database is attached to this VM"))
    }

    /// Id of the last record `db_fetch` returned from `collection`.
    pub(crate) fn record_cursor(&mut self, collection: &str) -> &mut Option<u64> {
        self.records.entry(collection.to_string()).or_default()
    }

    pub(crate) fn forget_record_cursor(&mut self, collection: &str) {
        self.records.remove(collection);
    }
}

/// Successful script run.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionResult {
    /// Everything the script printed, byte for byte.
    pub output: Vec<u8>,
    /// Value of a top-level `return`, or null.
    pub value: Value,
}

impl ExecutionResult {
    /// The output as text; invalid UTF-8 is replaced.
    #[must_use]
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.output)
    }
}

type ConstantFn<'db> = Box<dyn Fn() -> Value + 'db>;

/// A script interpreter, optionally attached to a [`Database`].
///
/// Registered functions and constants belong to this instance only. The
/// per-collection record cursors used by `db_fetch` persist across runs until
/// reset.
///
/// ```
/// use quarry_vm::Vm;
///
/// let mut vm = Vm::new();
/// let result = vm.run("$x = 6 * 7; print $x;").unwrap();
/// assert_eq!(result.output, b"42");
/// ```
pub struct Vm<'db> {
    pub(crate) config: VmConfig,
    pub(crate) db: Option<&'db Database>,
    pub(crate) functions: HashMap<String, Box<dyn ForeignFunction + 'db>>,
    pub(crate) constants: HashMap<String, ConstantFn<'db>>,
    pub(crate) records: HashMap<String, Option<u64>>,
}

impl Default for Vm<'_> {
    fn default() -> Self {
        Self::with_config(VmConfig::default())
    }
}

impl<'db> Vm<'db> {
    /// Creates a VM without a database.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a VM with explicit limits.
    #[must_use]
    pub fn with_config(config: VmConfig) -> Self {
        Self {
            config,
            db: None,
            functions: HashMap::new(),
            constants: HashMap::new(),
            records: HashMap::new(),
        }
    }

    /// Creates a VM whose `db_*` and `kv_*` functions use `db`.
    #[must_use]
    pub fn with_database(db: &'db Database) -> Self {
        let mut vm = Self::new();
        vm.db = Some(db);
        vm
    }

    /// Attaches a database, replacing any previous one.
    pub fn attach(&mut self, db: &'db Database) {
        self.db = Some(db);
        self.records.clear();
    }

    /// Returns the limits in effect.
    #[must_use]
    pub fn config(&self) -> VmConfig {
        self.config
    }

    /// Registers a closure under `name`.
    ///
    /// A registered function takes precedence over a built-in of the same
    /// name; a function defined by the script itself takes precedence over
    /// both.
    pub fn register_function<F>(&mut self, name: &str, function: F)
    where
        F: Fn(&mut CallContext<'_>, &[Value]) -> VmResult<Value> + 'db,
    {
        self.register_foreign(name, Box::new(function));
    }

    /// Registers any [`ForeignFunction`] implementation under `name`.
    pub fn register_foreign(&mut self, name: &str, function: Box<dyn ForeignFunction + 'db>) {
        debug!(name, "foreign function registered");
        self.functions.insert(name.to_string(), function);
    }

    /// Removes a registered function. Returns `true` if it existed.
    pub fn unregister_function(&mut self, name: &str) -> bool {
        self.functions.remove(name).is_some()
    }

    /// Registers a constant expander, evaluated every time a script reads
    /// the bare identifier `name`.
    pub fn register_constant<F>(&mut self, name: &str, expand: F)
    where
        F: Fn() -> Value + 'db,
    {
        self.constants.insert(name.to_string(), Box::new(expand));
    }

    /// Compiles a script.
    ///
    /// # Errors
    ///
    /// Returns [`VmError::Compile`] for invalid source.
    pub fn compile(&self, source: &str) -> VmResult<Program> {
        compiler::compile(source)
    }

    /// Runs a compiled program.
    ///
    /// # Errors
    ///
    /// Returns [`VmError::Runtime`] carrying the output produced before the
    /// failure. Writes the script made before failing are not undone here;
    /// they belong to whatever transaction was open.
    pub fn execute(&mut self, program: &Program) -> VmResult<ExecutionResult> {
        let result = Machine::new(self, program).run();
        match &result {
            Ok(done) => debug!(bytes = done.output.len(), "script finished"),
            Err(err) => debug!(error = %err, "script aborted"),
        }
        result
    }

    /// Compiles and runs `source`.
    ///
    /// # Errors
    ///
    /// See [`Vm::compile`] and [`Vm::execute`].
    pub fn run(&mut self, source: &str) -> VmResult<ExecutionResult> {
        let program = self.compile(source)?;
        self.execute(&program)
    }
}

impl fmt::Debug for Vm<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Vm")
            .field("config", &self.config)
            .field("database", &self.db.is_some())
            .field("functions", &self.functions.keys().collect::<Vec<_>>())
            .field("constants", &self.constants.keys().collect::<Vec<_>>())
            .finish()
    }
}
