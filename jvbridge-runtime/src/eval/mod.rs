//! Tree-walking interpreter
//!
//! Programs run in the global scope of `Main`. Name resolution goes from
//! the local scope chain to `Main` and finally to `Base`; `Main`, `Base`
//! and `Core` always name the modules themselves.
//!
//! Control flow (`return`, `break`, `continue`) travels as the error side
//! of `Result` so `?` unwinds it through nested blocks.

mod scope;

#[cfg(test)]
mod tests;

use std::rc::Rc;

pub use scope::Scope;

use crate::builtins::{
    assign_index, collect_values, concat, construct, egal, get_property, index_value,
    infer_elem_type, length_of, print, set_property, size_along,
};
use crate::error::{RuntimeError, RuntimeResult};
use crate::frontend::ast::{Expr, ParamDef};
use crate::interop::Engine;
use crate::logging::{log_builtin_call, log_method_call, trace_span};
use crate::objects::{
    Abstract, Ctor, Function, FunctionKind, Kwargs, Method, Param, StructDef, Type, Value,
};

/// Remaining stack below which evaluation continues on a fresh segment
const STACK_RED_ZONE: usize = 128 * 1024;
const STACK_GROW_SIZE: usize = 4 * 1024 * 1024;

/// Innermost local scope; `None` at top level
pub type Env = Option<Rc<Scope>>;

/// Non-local exit from a block
#[derive(Debug)]
pub(crate) enum Unwind {
    Error(RuntimeError),
    Return(Value),
    Break,
    Continue,
}

impl From<RuntimeError> for Unwind {
    fn from(err: RuntimeError) -> Self {
        Unwind::Error(err)
    }
}

impl Unwind {
    /// Settle an unwind that escaped every enclosing construct
    pub(crate) fn into_error(self) -> RuntimeError {
        match self {
            Unwind::Error(err) => err,
            Unwind::Return(_) => RuntimeError::Error("\"return\" outside of a function".to_string()),
            Unwind::Break => RuntimeError::Error("break or continue outside loop".to_string()),
            Unwind::Continue => RuntimeError::Error("break or continue outside loop".to_string()),
        }
    }
}

type Flow = Result<Value, Unwind>;

fn fail<T>(err: RuntimeError) -> Result<T, Unwind> {
    Err(Unwind::Error(err))
}

pub(crate) struct Interpreter<'a> {
    engine: &'a Engine,
    /// Collection, dimension and index count of each open `x[...]`
    indexing: Vec<(Value, usize, usize)>,
}

impl<'a> Interpreter<'a> {
    pub(crate) fn new(engine: &'a Engine) -> Self {
        Self {
            engine,
            indexing: Vec::new(),
        }
    }

    /// Run top-level statements, yielding the last value
    pub(crate) fn run(&mut self, program: &[Expr]) -> RuntimeResult<Value> {
        self.exec_block(program, &None).map_err(Unwind::into_error)
    }

    fn exec_block(&mut self, body: &[Expr], env: &Env) -> Flow {
        let mut last = Value::Nothing;
        for stmt in body {
            last = self.eval(stmt, env)?;
        }
        Ok(last)
    }

    fn eval(&mut self, expr: &Expr, env: &Env) -> Flow {
        stacker::maybe_grow(STACK_RED_ZONE, STACK_GROW_SIZE, || self.eval_inner(expr, env))
    }

    fn eval_inner(&mut self, expr: &Expr, env: &Env) -> Flow {
        match expr {
            Expr::Literal(value) => Ok(value.clone()),
            Expr::Ident(name) => Ok(self.lookup(name, env)?),
            Expr::Interpolate(parts) => {
                let values = self.eval_args(parts, env)?;
                Ok(concat(&values)?)
            }
            Expr::Tuple(items) => Ok(Value::tuple(self.eval_args(items, env)?)),
            Expr::Vector(items) => {
                let values = self.eval_args(items, env)?;
                Ok(Value::vector(&infer_elem_type(&values), &values)?)
            }
            Expr::Comprehension {
                body,
                var,
                iter,
                filter,
            } => self.eval_comprehension(body, var, iter, filter.as_deref(), env),
            Expr::Call {
                callee,
                args,
                kwargs,
            } => {
                let f = self.eval(callee, env)?;
                let args = self.eval_args(args, env)?;
                let kwargs = kwargs
                    .iter()
                    .map(|(name, value)| Ok((name.clone(), self.eval(value, env)?)))
                    .collect::<Result<Vec<_>, Unwind>>()?;
                Ok(self.call(&f, &args, &kwargs)?)
            }
            Expr::Splat(_) => fail(RuntimeError::Error(
                "\"...\" expression outside call".to_string(),
            )),
            Expr::Index { target, indices } => {
                let collection = self.eval(target, env)?;
                let indices = self.eval_indices(&collection, indices, env)?;
                Ok(index_value(&collection, &indices)?)
            }
            Expr::Field { target, name } => {
                let value = self.eval(target, env)?;
                Ok(get_property(&value, name)?)
            }
            Expr::Curly { target, params } => {
                let base = self.eval(target, env)?;
                let params = self.eval_args(params, env)?;
                Ok(apply_type(&base, &params)?)
            }
            Expr::TypeAssert { value, ty } => {
                let value = self.eval(value, env)?;
                let ty = self.eval_type(ty, env)?;
                if !value.isa(&ty) {
                    return fail(RuntimeError::TypeMismatch {
                        context: "typeassert".to_string(),
                        expected: ty.to_string(),
                        got: value.type_of().to_string(),
                    });
                }
                Ok(value)
            }
            Expr::Comparison { operands, ops } => self.eval_comparison(operands, ops, env),
            Expr::And(lhs, rhs) => {
                let lhs = self.eval(lhs, env)?;
                match lhs {
                    Value::Bool(false) => Ok(lhs),
                    Value::Bool(true) => self.eval(rhs, env),
                    other => fail(RuntimeError::not_boolean("&&", &other)),
                }
            }
            Expr::Or(lhs, rhs) => {
                let lhs = self.eval(lhs, env)?;
                match lhs {
                    Value::Bool(true) => Ok(lhs),
                    Value::Bool(false) => self.eval(rhs, env),
                    other => fail(RuntimeError::not_boolean("||", &other)),
                }
            }
            Expr::If {
                branches,
                otherwise,
            } => {
                for (cond, body) in branches {
                    if self.eval_condition("if", cond, env)? {
                        return self.exec_block(body, env);
                    }
                }
                match otherwise {
                    Some(body) => self.exec_block(body, env),
                    None => Ok(Value::Nothing),
                }
            }
            Expr::While { cond, body } => {
                while self.eval_condition("while", cond, env)? {
                    let scope = Scope::block(env.clone());
                    match self.exec_block(body, &Some(scope)) {
                        Ok(_) | Err(Unwind::Continue) => {}
                        Err(Unwind::Break) => break,
                        Err(other) => return Err(other),
                    }
                }
                Ok(Value::Nothing)
            }
            Expr::For { var, iter, body } => self.eval_for(var, iter, body, env),
            Expr::Block(body) => self.exec_block(body, env),
            Expr::Assign { target, value } => {
                let value = self.eval(value, env)?;
                self.assign(target, value.clone(), env)?;
                Ok(value)
            }
            Expr::Const(assign) => self.eval_const(assign, env),
            Expr::Global(names) => {
                if let Some(scope) = env {
                    for name in names {
                        scope.declare_global(name);
                    }
                }
                Ok(Value::Nothing)
            }
            Expr::Local(names) => {
                if let Some(scope) = env {
                    for name in names {
                        scope.declare(name, Value::Nothing);
                    }
                }
                Ok(Value::Nothing)
            }
            Expr::FunctionDef { name, params, body } => {
                let method = self.method(params, body, env)?;
                Ok(self.define_function(name, method, env)?)
            }
            Expr::Lambda { params, body } => {
                let method = self.method(params, body, env)?;
                Ok(Value::Function(Rc::new(Function::generic("#lambda", method))))
            }
            Expr::StructDef {
                name,
                mutable,
                fields,
            } => Ok(self.define_struct(name, *mutable, fields, env)?),
            Expr::Return(value) => {
                let value = match value {
                    Some(expr) => self.eval(expr, env)?,
                    None => Value::Nothing,
                };
                Err(Unwind::Return(value))
            }
            Expr::Break => Err(Unwind::Break),
            Expr::Continue => Err(Unwind::Continue),
            Expr::End => Ok(Value::Int64(self.index_extent("end")?)),
            Expr::Colon => Ok(Value::Range(1, self.index_extent(":")?)),
        }
    }

    // ========================================================================
    // Names
    // ========================================================================

    fn lookup(&self, name: &str, env: &Env) -> RuntimeResult<Value> {
        if let Some(value) = env.as_ref().and_then(|scope| scope.lookup(name)) {
            return Ok(value);
        }
        if let Some(value) = self.engine.main().get(name) {
            return Ok(value);
        }
        match name {
            "Main" => return Ok(Value::Module(Rc::clone(self.engine.main()))),
            "Base" | "Core" => return Ok(Value::Module(Rc::clone(self.engine.base()))),
            _ => {}
        }
        self.engine
            .base()
            .get(name)
            .ok_or_else(|| RuntimeError::UndefVar {
                name: name.to_string(),
            })
    }

    fn assign_name(&self, name: &str, value: Value, env: &Env) {
        let Some(scope) = env else {
            self.engine.main().set(name, value);
            return;
        };
        if scope.is_global(name) {
            self.engine.main().set(name, value);
            return;
        }
        if scope.assign_existing(name, &value) {
            return;
        }
        if !scope.in_function() && self.engine.main().contains(name) {
            // top-level loops update existing globals
            self.engine.main().set(name, value);
        } else {
            scope.declare(name, value);
        }
    }

    fn assign(&mut self, target: &Expr, value: Value, env: &Env) -> Result<(), Unwind> {
        match target {
            Expr::Ident(name) => self.assign_name(name, value, env),
            Expr::Index { target, indices } => {
                let collection = self.eval(target, env)?;
                let indices = self.eval_indices(&collection, indices, env)?;
                assign_index(&collection, &value, &indices)?;
            }
            Expr::Field { target, name } => {
                let object = self.eval(target, env)?;
                set_property(&object, name, &value)?;
            }
            Expr::Tuple(targets) => {
                let items = collect_values(&value)?;
                if items.len() < targets.len() {
                    return fail(RuntimeError::Bounds {
                        container: print::repr(&value),
                        index: (items.len() + 1).to_string(),
                    });
                }
                for (target, item) in targets.iter().zip(items) {
                    self.assign(target, item, env)?;
                }
            }
            _ => {
                return fail(RuntimeError::Error(
                    "invalid assignment location".to_string(),
                ))
            }
        }
        Ok(())
    }

    fn eval_const(&mut self, assign: &Expr, env: &Env) -> Flow {
        let Expr::Assign { target, value } = assign else {
            return fail(RuntimeError::Error("expected assignment after \"const\"".to_string()));
        };
        let Expr::Ident(name) = target.as_ref() else {
            return fail(RuntimeError::Error("invalid \"const\" target".to_string()));
        };
        if env.is_some() {
            return fail(RuntimeError::Error(
                "unsupported `const` declaration on local variable".to_string(),
            ));
        }
        let value = self.eval(value, env)?;
        if let Some(existing) = self.engine.main().get(name) {
            if !egal(&existing, &value) {
                return fail(RuntimeError::Redefinition(name.clone()));
            }
        }
        self.engine.main().set(name, value.clone());
        Ok(value)
    }

    // ========================================================================
    // Definitions
    // ========================================================================

    fn eval_type(&mut self, expr: &Expr, env: &Env) -> Result<Type, Unwind> {
        match self.eval(expr, env)? {
            Value::Type(ty) => Ok(ty),
            other => fail(RuntimeError::TypeMismatch {
                context: "type annotation".to_string(),
                expected: "Type".to_string(),
                got: other.type_of().to_string(),
            }),
        }
    }

    fn method(&mut self, params: &[ParamDef], body: &Rc<Vec<Expr>>, env: &Env) -> Result<Method, Unwind> {
        let params = params
            .iter()
            .map(|p| {
                let ty = match &p.ty {
                    Some(expr) => self.eval_type(expr, env)?,
                    None => Type::Any,
                };
                Ok(Param {
                    name: p.name.clone(),
                    ty,
                })
            })
            .collect::<Result<Vec<_>, Unwind>>()?;
        Ok(Method {
            params,
            body: Rc::clone(body),
            env: env.clone(),
        })
    }

    /// Add a method to the generic function `name`, creating it on first use
    fn define_function(&self, name: &str, method: Method, env: &Env) -> RuntimeResult<Value> {
        let local = env.as_ref().filter(|scope| !scope.is_global(name));
        let existing = match local {
            Some(scope) => scope.local_value(name),
            None => self.engine.main().get(name),
        };
        match existing {
            Some(Value::Function(f)) if matches!(f.kind, FunctionKind::Generic(_)) => {
                f.add_method(method)?;
                Ok(Value::Function(f))
            }
            Some(_) => Err(RuntimeError::Error(format!(
                "cannot define function {name}; it already has a value"
            ))),
            None => {
                let f = Value::Function(Rc::new(Function::generic(name, method)));
                match local {
                    Some(scope) => scope.declare(name, f.clone()),
                    None => self.engine.main().set(name, f.clone()),
                }
                Ok(f)
            }
        }
    }

    fn define_struct(
        &mut self,
        name: &str,
        mutable: bool,
        fields: &[ParamDef],
        env: &Env,
    ) -> Result<Value, Unwind> {
        if env.is_some() {
            return fail(RuntimeError::Error(
                "\"struct\" expression not at top level".to_string(),
            ));
        }
        let fields = fields
            .iter()
            .map(|field| {
                let ty = match &field.ty {
                    Some(expr) => self.eval_type(expr, env)?,
                    None => Type::Any,
                };
                Ok((field.name.clone(), ty))
            })
            .collect::<Result<Vec<_>, Unwind>>()?;
        let def = StructDef {
            name: name.to_string(),
            mutable,
            fields,
        };
        match self.engine.main().get(name) {
            Some(Value::Type(Type::Struct(existing))) if existing.same_layout(&def) => {}
            Some(_) => return fail(RuntimeError::Redefinition(name.to_string())),
            None => self
                .engine
                .main()
                .set(name, Value::Type(Type::Struct(Rc::new(def)))),
        }
        Ok(Value::Nothing)
    }

    // ========================================================================
    // Calls
    // ========================================================================

    /// Arguments with `xs...` spliced in
    fn eval_args(&mut self, items: &[Expr], env: &Env) -> Result<Vec<Value>, Unwind> {
        let mut values = Vec::with_capacity(items.len());
        for item in items {
            match item {
                Expr::Splat(inner) => {
                    let spread = self.eval(inner, env)?;
                    values.extend(collect_values(&spread)?);
                }
                _ => values.push(self.eval(item, env)?),
            }
        }
        Ok(values)
    }

    pub(crate) fn call(&mut self, f: &Value, args: &[Value], kwargs: &Kwargs) -> RuntimeResult<Value> {
        match f {
            Value::Function(func) => match &func.kind {
                FunctionKind::Builtin(builtin) => {
                    log_builtin_call(&func.name, args.len());
                    builtin(self.engine, args, kwargs)
                }
                FunctionKind::Generic(_) => self.call_generic(func, args, kwargs),
            },
            Value::Type(ty) if kwargs.is_empty() => construct(ty, args),
            other => Err(RuntimeError::method(&print::repr(other), args)),
        }
    }

    fn call_generic(&mut self, func: &Function, args: &[Value], kwargs: &Kwargs) -> RuntimeResult<Value> {
        let method = func
            .select(args)
            .filter(|_| kwargs.is_empty())
            .ok_or_else(|| RuntimeError::method(&func.name, args))?;
        let _depth = self.engine.enter_call()?;
        let _span = trace_span!(target: "eval", "method", name = %func.name).entered();
        log_method_call(&func.name, args.len());

        let scope = Scope::function(method.env.clone());
        for (param, arg) in method.params.iter().zip(args) {
            scope.declare(&param.name, arg.clone());
        }
        // indices of the caller do not leak into the callee
        let saved = std::mem::take(&mut self.indexing);
        let result = stacker::maybe_grow(STACK_RED_ZONE, STACK_GROW_SIZE, || {
            self.exec_block(&method.body, &Some(scope))
        });
        self.indexing = saved;
        match result {
            Ok(value) | Err(Unwind::Return(value)) => Ok(value),
            Err(other) => Err(other.into_error()),
        }
    }

    // ========================================================================
    // Control flow
    // ========================================================================

    fn eval_condition(&mut self, context: &str, cond: &Expr, env: &Env) -> Result<bool, Unwind> {
        match self.eval(cond, env)? {
            Value::Bool(b) => Ok(b),
            other => fail(RuntimeError::not_boolean(context, &other)),
        }
    }

    fn eval_comparison(&mut self, operands: &[Expr], ops: &[String], env: &Env) -> Flow {
        let mut lhs = self.eval(&operands[0], env)?;
        let mut result = Value::Bool(true);
        for (i, op) in ops.iter().enumerate() {
            if i > 0 {
                match result {
                    Value::Bool(true) => {}
                    Value::Bool(false) => return Ok(result),
                    other => return fail(RuntimeError::not_boolean("comparison", &other)),
                }
            }
            let rhs = self.eval(&operands[i + 1], env)?;
            let f = self.lookup(op, env)?;
            result = self.call(&f, &[lhs, rhs.clone()], &[])?;
            lhs = rhs;
        }
        Ok(result)
    }

    fn eval_for(&mut self, var: &Expr, iter: &Expr, body: &[Expr], env: &Env) -> Flow {
        let iterable = self.eval(iter, env)?;
        let items: Box<dyn Iterator<Item = Value>> = match iterable {
            Value::Range(start, stop) => Box::new((start..=stop).map(Value::Int64)),
            other => Box::new(collect_values(&other)?.into_iter()),
        };
        for item in items {
            let scope = Scope::block(env.clone());
            bind_loop_var(var, item, &scope)?;
            match self.exec_block(body, &Some(scope)) {
                Ok(_) | Err(Unwind::Continue) => {}
                Err(Unwind::Break) => break,
                Err(other) => return Err(other),
            }
        }
        Ok(Value::Nothing)
    }

    fn eval_comprehension(
        &mut self,
        body: &Expr,
        var: &Expr,
        iter: &Expr,
        filter: Option<&Expr>,
        env: &Env,
    ) -> Flow {
        let iterable = self.eval(iter, env)?;
        let mut results = Vec::new();
        for item in collect_values(&iterable)? {
            let scope = Scope::block(env.clone());
            bind_loop_var(var, item, &scope)?;
            let inner = Some(scope);
            if let Some(cond) = filter {
                if !self.eval_condition("comprehension filter", cond, &inner)? {
                    continue;
                }
            }
            results.push(self.eval(body, &inner)?);
        }
        Ok(Value::vector(&infer_elem_type(&results), &results)?)
    }

    // ========================================================================
    // Indexing
    // ========================================================================

    fn eval_indices(&mut self, collection: &Value, indices: &[Expr], env: &Env) -> Result<Vec<Value>, Unwind> {
        let mut values = Vec::with_capacity(indices.len());
        for (dim, index) in indices.iter().enumerate() {
            self.indexing.push((collection.clone(), dim, indices.len()));
            let value = self.eval(index, env);
            self.indexing.pop();
            values.push(value?);
        }
        Ok(values)
    }

    /// Extent of the innermost open index position, for `end` and `:`
    fn index_extent(&self, what: &str) -> RuntimeResult<i64> {
        let Some((collection, dim, count)) = self.indexing.last() else {
            return Err(RuntimeError::Error(format!("`{what}` outside of indexing")));
        };
        if *count == 1 {
            return length_of(collection)
                .map(|n| n as i64)
                .ok_or_else(|| RuntimeError::method("lastindex", std::slice::from_ref(collection)));
        }
        size_along(collection, &Value::Int64(*dim as i64 + 1))
    }
}

fn bind_loop_var(var: &Expr, item: Value, scope: &Scope) -> RuntimeResult<()> {
    match var {
        Expr::Ident(name) => scope.declare(name, item),
        Expr::Tuple(names) => {
            let parts = collect_values(&item)?;
            if parts.len() < names.len() {
                return Err(RuntimeError::Bounds {
                    container: print::repr(&item),
                    index: (parts.len() + 1).to_string(),
                });
            }
            for (name, part) in names.iter().zip(parts) {
                bind_loop_var(name, part, scope)?;
            }
        }
        _ => return Err(RuntimeError::Error("invalid iteration variable".to_string())),
    }
    Ok(())
}

/// `T{A, B}` for the parametric types the runtime knows
pub(crate) fn apply_type(base: &Value, params: &[Value]) -> RuntimeResult<Value> {
    let Value::Type(base) = base else {
        return Err(RuntimeError::TypeMismatch {
            context: "type application".to_string(),
            expected: "Type".to_string(),
            got: base.type_of().to_string(),
        });
    };
    let types: Option<Vec<Type>> = params.iter().map(|p| p.as_type().cloned()).collect();
    let ty = match (base, types.as_deref(), params) {
        (Type::UnionAll(Ctor::Vector), Some([elem]), _) => Type::vector(elem.clone()),
        (Type::UnionAll(Ctor::Matrix), Some([elem]), _) => Type::Array(Box::new(elem.clone()), 2),
        (Type::UnionAll(Ctor::Array), _, [Value::Type(elem), rank]) => match rank.as_i64() {
            Some(n) if n >= 0 && !matches!(rank, Value::Bool(_)) => {
                Type::Array(Box::new(elem.clone()), n as usize)
            }
            _ => return Err(invalid_application(base, params)),
        },
        (Type::UnionAll(Ctor::Dict), Some([k, v]), _) => Type::dict(k.clone(), v.clone()),
        (Type::UnionAll(Ctor::Pair), Some([a, b]), _) => {
            Type::Pair(Box::new(a.clone()), Box::new(b.clone()))
        }
        (Type::UnionAll(Ctor::Complex), Some([Type::Float32]), _) => Type::ComplexF32,
        (Type::UnionAll(Ctor::Complex), Some([Type::Float64]), _) => Type::ComplexF64,
        (Type::Abstract(Abstract::Tuple), Some(items), _) => Type::Tuple(items.to_vec()),
        _ => return Err(invalid_application(base, params)),
    };
    Ok(Value::Type(ty))
}

fn invalid_application(base: &Type, params: &[Value]) -> RuntimeError {
    let params: Vec<String> = params.iter().map(print::repr).collect();
    RuntimeError::Error(format!(
        "TypeError: invalid type application {base}{{{}}}",
        params.join(", ")
    ))
}
