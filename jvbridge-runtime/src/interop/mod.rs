//! Embedding API - the surface a host uses to drive the runtime
//!
//! Design: One `Engine` owns the `Main` and `Base` modules, the anchor
//! table and captured output. It is deliberately not `Send`: every call
//! runs on the thread that created it.
//!
//! Architecture:
//! - `compile` parses source fragments into one `Program`
//! - `run` evaluates a program in `Main`
//! - `call` / `call_named` invoke functions with full dispatch
//! - property, module and reflection helpers mirror `getproperty`,
//!   `names`, `repr` and `typeof`

#[cfg(test)]
mod tests;

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::builtins::{self, print};
use crate::error::{RuntimeError, RuntimeResult};
use crate::eval::Interpreter;
use crate::frontend::{self, ast::Expr};
use crate::gc::{AnchorId, AnchorTable};
use crate::logging::{debug, log_compile, log_parse_error, log_runtime_error, log_runtime_init};
use crate::{time_block, traced_fn};
use crate::objects::{Kwargs, Module, Type, Value};

/// Deepest nesting of user-defined function calls; the interpreter grows
/// its stack on demand, so this is the only recursion limit
pub const MAX_CALL_DEPTH: usize = 128;

/// Parsed statements of one or more source fragments
#[derive(Debug, Clone)]
pub struct Program {
    statements: Rc<Vec<Expr>>,
    fragments: usize,
}

impl Program {
    pub fn statement_count(&self) -> usize {
        self.statements.len()
    }

    pub fn fragment_count(&self) -> usize {
        self.fragments
    }
}

/// Call-depth slot held for the duration of one call
pub(crate) struct CallDepth<'a> {
    depth: &'a Cell<usize>,
}

impl Drop for CallDepth<'_> {
    fn drop(&mut self) {
        self.depth.set(self.depth.get() - 1);
    }
}

pub struct Engine {
    main: Rc<Module>,
    base: Rc<Module>,
    anchors: AnchorTable,
    output: RefCell<String>,
    depth: Cell<usize>,
}

impl Engine {
    pub fn new() -> Self {
        let base = Module::new("Base");
        builtins::install(&base);
        log_runtime_init(base.names().len());
        Self {
            main: Rc::new(Module::new("Main")),
            base: Rc::new(base),
            anchors: AnchorTable::new(),
            output: RefCell::new(String::new()),
            depth: Cell::new(0),
        }
    }

    pub fn main(&self) -> &Rc<Module> {
        &self.main
    }

    pub fn base(&self) -> &Rc<Module> {
        &self.base
    }

    pub fn anchors(&self) -> &AnchorTable {
        &self.anchors
    }

    // ========================================================================
    // Output
    // ========================================================================

    /// Append text printed by user code
    pub fn write_output(&self, text: &str) {
        self.output.borrow_mut().push_str(text);
    }

    /// Everything printed since the last call
    pub fn take_output(&self) -> String {
        std::mem::take(&mut *self.output.borrow_mut())
    }

    // ========================================================================
    // Evaluation
    // ========================================================================

    /// Parse fragments into a single program; a syntax error names the
    /// offending fragment's position
    pub fn compile<S: AsRef<str>>(&self, fragments: &[S]) -> RuntimeResult<Program> {
        let statements = time_block!("compile", {
            let mut statements = Vec::new();
            for fragment in fragments {
                match frontend::parse(fragment.as_ref()) {
                    Ok(parsed) => statements.extend(parsed),
                    Err(err) => {
                        log_parse_error(err.line, err.column, &err.message);
                        return Err(err.into());
                    }
                }
            }
            statements
        });
        log_compile(fragments.len(), statements.len());
        Ok(Program {
            statements: Rc::new(statements),
            fragments: fragments.len(),
        })
    }

    /// Evaluate a program in `Main`, yielding the value of its last statement
    pub fn run(&self, program: &Program) -> RuntimeResult<Value> {
        let _span = traced_fn!("run");
        Interpreter::new(self)
            .run(&program.statements)
            .map_err(|err| self.raised(err))
    }

    pub fn eval(&self, source: &str) -> RuntimeResult<Value> {
        let program = self.compile(&[source])?;
        self.run(&program)
    }

    pub fn call(&self, f: &Value, args: &[Value], kwargs: &Kwargs) -> RuntimeResult<Value> {
        let _span = traced_fn!("call");
        Interpreter::new(self)
            .call(f, args, kwargs)
            .map_err(|err| self.raised(err))
    }

    /// Call a function looked up by (possibly dotted) name at call time
    pub fn call_named(&self, name: &str, args: &[Value], kwargs: &Kwargs) -> RuntimeResult<Value> {
        let f = self.resolve(name)?;
        self.call(&f, args, kwargs)
    }

    /// `Base.Multimedia.display`, `Main.f`, or a bare name from `Base`
    pub fn resolve(&self, name: &str) -> RuntimeResult<Value> {
        let undefined = || RuntimeError::UndefVar {
            name: name.to_string(),
        };
        match name.rsplit_once('.') {
            Some((path, member)) => self.module(path)?.get(member).ok_or_else(undefined),
            None => self
                .base
                .get(name)
                .or_else(|| self.main.get(name))
                .ok_or_else(undefined),
        }
    }

    fn raised(&self, err: RuntimeError) -> RuntimeError {
        log_runtime_error(err.kind(), &err.to_string());
        err
    }

    pub(crate) fn enter_call(&self) -> RuntimeResult<CallDepth<'_>> {
        let depth = self.depth.get();
        if depth >= MAX_CALL_DEPTH {
            return Err(RuntimeError::Error(format!(
                "StackOverflowError: call depth exceeded {MAX_CALL_DEPTH}"
            )));
        }
        self.depth.set(depth + 1);
        Ok(CallDepth { depth: &self.depth })
    }

    // ========================================================================
    // Properties and modules
    // ========================================================================

    pub fn get_property(&self, value: &Value, name: &str) -> RuntimeResult<Value> {
        builtins::get_property(value, name)
    }

    pub fn set_property(&self, target: &Value, name: &str, value: &Value) -> RuntimeResult<()> {
        builtins::set_property(target, name, value)
    }

    pub fn has_property(&self, value: &Value, name: &str) -> bool {
        builtins::has_property(value, name)
    }

    pub fn property_names(&self, value: &Value) -> Vec<String> {
        builtins::property_names(value)
    }

    /// Module by dotted path: `Main`, `Base`, `Core`, `Base.Multimedia`
    pub fn module(&self, path: &str) -> RuntimeResult<Rc<Module>> {
        let mut parts = path.split('.');
        let mut current = match parts.next() {
            Some("Main") => Rc::clone(&self.main),
            Some("Base" | "Core") => Rc::clone(&self.base),
            _ => {
                return Err(RuntimeError::UndefVar {
                    name: path.to_string(),
                })
            }
        };
        for part in parts {
            current = match current.get(part) {
                Some(Value::Module(inner)) => inner,
                _ => {
                    return Err(RuntimeError::UndefVar {
                        name: format!("{}.{part}", current.path),
                    })
                }
            };
        }
        Ok(current)
    }

    /// Names bound in a module, sorted
    pub fn module_names(&self, path: &str) -> RuntimeResult<Vec<String>> {
        Ok(self.module(path)?.names())
    }

    // ========================================================================
    // Reflection
    // ========================================================================

    pub fn repr(&self, value: &Value) -> String {
        print::repr(value)
    }

    pub fn type_of(&self, value: &Value) -> Type {
        value.type_of()
    }

    // ========================================================================
    // Anchors
    // ========================================================================

    pub fn pin(&self, value: &Value) -> AnchorId {
        self.anchors.pin(value)
    }

    pub fn release(&self, id: AnchorId) -> bool {
        self.anchors.release(id)
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        debug!(target: "runtime", live = self.anchors.live(), "engine shutting down");
        self.anchors.clear();
    }
}
