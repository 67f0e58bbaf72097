//! Syntax tree
//!
//! Operators are plain calls by name (`a + b` is `Call("+", [a, b])`);
//! only forms with their own evaluation rules get dedicated nodes.

use std::rc::Rc;

use crate::objects::Value;

#[derive(Debug, Clone)]
pub enum Expr {
    Literal(Value),
    Ident(String),
    /// String with `$` interpolation, concatenated at run time
    Interpolate(Vec<Expr>),
    Tuple(Vec<Expr>),
    Vector(Vec<Expr>),
    Comprehension {
        body: Box<Expr>,
        var: Box<Expr>,
        iter: Box<Expr>,
        filter: Option<Box<Expr>>,
    },
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
        kwargs: Vec<(String, Expr)>,
    },
    /// `xs...` inside a call
    Splat(Box<Expr>),
    Index {
        target: Box<Expr>,
        indices: Vec<Expr>,
    },
    Field {
        target: Box<Expr>,
        name: String,
    },
    /// `T{A, B}`
    Curly {
        target: Box<Expr>,
        params: Vec<Expr>,
    },
    /// `x::T`
    TypeAssert {
        value: Box<Expr>,
        ty: Box<Expr>,
    },
    /// `a < b <= c`
    Comparison {
        operands: Vec<Expr>,
        ops: Vec<String>,
    },
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    If {
        branches: Vec<(Expr, Vec<Expr>)>,
        otherwise: Option<Vec<Expr>>,
    },
    While {
        cond: Box<Expr>,
        body: Vec<Expr>,
    },
    For {
        var: Box<Expr>,
        iter: Box<Expr>,
        body: Vec<Expr>,
    },
    Block(Vec<Expr>),
    Assign {
        target: Box<Expr>,
        value: Box<Expr>,
    },
    Const(Box<Expr>),
    Global(Vec<String>),
    Local(Vec<String>),
    FunctionDef {
        name: String,
        params: Vec<ParamDef>,
        body: Rc<Vec<Expr>>,
    },
    Lambda {
        params: Vec<ParamDef>,
        body: Rc<Vec<Expr>>,
    },
    StructDef {
        name: String,
        mutable: bool,
        fields: Vec<ParamDef>,
    },
    Return(Option<Box<Expr>>),
    Break,
    Continue,
    /// `end` inside an index expression
    End,
    /// Bare `:` inside an index expression
    Colon,
}

/// Torn down with an explicit stack: operator chains nest arbitrarily deep
impl Drop for Expr {
    fn drop(&mut self) {
        let mut stack = Vec::new();
        self.take_children(&mut stack);
        while let Some(mut expr) = stack.pop() {
            expr.take_children(&mut stack);
        }
    }
}

/// Parameter or struct field with an optional `::T` annotation
#[derive(Debug, Clone)]
pub struct ParamDef {
    pub name: String,
    pub ty: Option<Expr>,
}

impl Expr {
    /// Move the expression out, leaving a leaf in its place
    pub(crate) fn take(&mut self) -> Expr {
        std::mem::replace(self, Expr::Break)
    }

    /// Move every direct subexpression onto `stack`, leaving leaves behind
    fn take_children(&mut self, stack: &mut Vec<Expr>) {
        match self {
            Expr::Literal(_)
            | Expr::Ident(_)
            | Expr::Global(_)
            | Expr::Local(_)
            | Expr::Break
            | Expr::Continue
            | Expr::End
            | Expr::Colon => {}
            Expr::Interpolate(items)
            | Expr::Tuple(items)
            | Expr::Vector(items)
            | Expr::Block(items) => stack.append(items),
            Expr::Comprehension {
                body,
                var,
                iter,
                filter,
            } => {
                stack.push(Expr::take(body));
                stack.push(Expr::take(var));
                stack.push(Expr::take(iter));
                if let Some(filter) = filter {
                    stack.push(Expr::take(filter));
                }
            }
            Expr::Call {
                callee,
                args,
                kwargs,
            } => {
                stack.push(Expr::take(callee));
                stack.append(args);
                stack.extend(kwargs.drain(..).map(|(_, value)| value));
            }
            Expr::Splat(inner) | Expr::Const(inner) | Expr::Return(Some(inner)) => {
                stack.push(Expr::take(inner))
            }
            Expr::Return(None) => {}
            Expr::Index { target, indices: items }
            | Expr::Curly { target, params: items } => {
                stack.push(Expr::take(target));
                stack.append(items);
            }
            Expr::Field { target, .. } => stack.push(Expr::take(target)),
            Expr::TypeAssert { value: a, ty: b }
            | Expr::And(a, b)
            | Expr::Or(a, b)
            | Expr::Assign { target: a, value: b } => {
                stack.push(Expr::take(a));
                stack.push(Expr::take(b));
            }
            Expr::Comparison { operands, .. } => stack.append(operands),
            Expr::If {
                branches,
                otherwise,
            } => {
                for (cond, body) in branches.drain(..) {
                    stack.push(cond);
                    stack.extend(body);
                }
                if let Some(body) = otherwise {
                    stack.append(body);
                }
            }
            Expr::While { cond, body } => {
                stack.push(Expr::take(cond));
                stack.append(body);
            }
            Expr::For { var, iter, body } => {
                stack.push(Expr::take(var));
                stack.push(Expr::take(iter));
                stack.append(body);
            }
            Expr::FunctionDef { params, body, .. } | Expr::Lambda { params, body } => {
                stack.extend(params.iter_mut().filter_map(|p| p.ty.take()));
                if let Some(body) = Rc::get_mut(body) {
                    stack.append(body);
                }
            }
            Expr::StructDef { fields, .. } => {
                stack.extend(fields.iter_mut().filter_map(|f| f.ty.take()));
            }
        }
    }

    pub(crate) fn call(name: &str, args: Vec<Expr>) -> Expr {
        Expr::Call {
            callee: Box::new(Expr::Ident(name.to_string())),
            args,
            kwargs: Vec::new(),
        }
    }

    pub(crate) fn is_number_literal(&self) -> bool {
        matches!(self, Expr::Literal(v) if v.is_number())
    }
}
