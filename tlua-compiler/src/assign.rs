use std::fmt;

use crate::access::apply_genparams;
use crate::types::{
    describe, FunctionType, Primitive, TableType, TupleType, Type, TypeTable,
};

/// Outcome of the assignability judgment `L <- R`. Messages accumulate
/// bottom-up: the innermost mismatch is pushed first and each enclosing
/// layer adds a positional crumb, so displaying the stack in reverse
/// reads from outer context down to root cause.
#[derive(Debug, Clone)]
pub struct AssignResult {
    pub yes: bool,
    pub messages: Vec<String>,
}

impl AssignResult {
    pub fn pass() -> Self {
        Self {
            yes: true,
            messages: Vec::new(),
        }
    }

    pub fn fail<S: Into<String>>(message: S) -> Self {
        Self {
            yes: false,
            messages: vec![message.into()],
        }
    }

    pub fn fail_all(messages: Vec<String>) -> Self {
        Self {
            yes: false,
            messages,
        }
    }

    pub fn push<S: Into<String>>(&mut self, message: S) {
        self.messages.push(message.into());
    }
}

impl fmt::Display for AssignResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, message) in self.messages.iter().rev().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{message}")?;
        }
        Ok(())
    }
}

fn cannot(table: &TypeTable, lhs: &Type, rhs: &Type) -> String {
    format!(
        "Cannot assign `{}` to `{}`",
        describe(table, rhs),
        describe(table, lhs)
    )
}

/// Structural subtyping: may a value of type `rhs` flow into a location
/// typed `lhs`?
pub fn is_assignable(table: &TypeTable, lhs: &Type, rhs: &Type) -> AssignResult {
    if lhs == rhs {
        return AssignResult::pass();
    }

    match rhs {
        Type::Any => return AssignResult::pass(),
        Type::Void => {
            return match lhs {
                Type::Void | Type::Any => AssignResult::pass(),
                _ => AssignResult::fail(cannot(table, lhs, rhs)),
            };
        }
        Type::Sum(sum) => {
            let mut warnings = Vec::new();
            for member in &sum.types {
                let mut result = is_assignable(table, lhs, member);
                if !result.yes {
                    result.push(cannot(table, lhs, rhs));
                    return result;
                }
                warnings.append(&mut result.messages);
            }
            return AssignResult {
                yes: true,
                messages: warnings,
            };
        }
        Type::Deferred(deferred) => {
            if let Type::Deferred(left) = lhs {
                if left.id == deferred.id && left.args == deferred.args {
                    return AssignResult::pass();
                }
            }
            return is_assignable(table, lhs, &table.resolve(deferred));
        }
        Type::Product(product) => {
            let mut collected = Vec::new();
            for component in &product.types {
                let result = is_assignable(table, lhs, component);
                if result.yes {
                    return result;
                }
                collected.extend(result.messages);
            }
            collected.push(cannot(table, lhs, rhs));
            return AssignResult::fail_all(collected);
        }
        _ => {}
    }

    match lhs {
        Type::Any => return AssignResult::pass(),
        Type::Deferred(deferred) => {
            return is_assignable(table, &table.resolve(deferred), rhs);
        }
        Type::Sum(sum) => {
            for member in &sum.types {
                if is_assignable(table, member, rhs).yes {
                    return AssignResult::pass();
                }
            }
            return AssignResult::fail(cannot(table, lhs, rhs));
        }
        Type::Product(product) => {
            for component in &product.types {
                let mut result = is_assignable(table, component, rhs);
                if !result.yes {
                    result.push(cannot(table, lhs, rhs));
                    return result;
                }
            }
            return AssignResult::pass();
        }
        Type::Tuple(expected) if !matches!(rhs, Type::Tuple(_)) => {
            // One value flowing into a multi-value location fills the
            // first position; the rest must tolerate nil.
            let singleton = TupleType {
                types: vec![rhs.clone()],
                variadic: false,
            };
            let mut result = tuple_assignable(table, expected, &singleton);
            if !result.yes {
                result.push(cannot(table, lhs, rhs));
            }
            return result;
        }
        _ => {}
    }

    match rhs {
        Type::Primitive(primitive) => match lhs {
            Type::Primitive(expected) if expected == primitive => AssignResult::pass(),
            _ => AssignResult::fail(cannot(table, lhs, rhs)),
        },
        Type::Literal(value) => {
            if let Type::Literal(expected) = lhs {
                if expected == value {
                    AssignResult::pass()
                } else {
                    AssignResult::fail(cannot(table, lhs, rhs))
                }
            } else {
                let mut result = is_assignable(table, lhs, &Type::Primitive(value.primitive()));
                if !result.yes {
                    result.push(cannot(table, lhs, rhs));
                }
                result
            }
        }
        Type::Function(function) => {
            if let Type::Function(expected) = lhs {
                let mut result = function_assignable(table, expected, function);
                if !result.yes {
                    result.push(cannot(table, lhs, rhs));
                }
                result
            } else {
                AssignResult::fail(cannot(table, lhs, rhs))
            }
        }
        Type::Tuple(tuple) => {
            if let Type::Tuple(expected) = lhs {
                let mut result = tuple_assignable(table, expected, tuple);
                if !result.yes {
                    result.push(cannot(table, lhs, rhs));
                }
                result
            } else {
                // A multi-value result flowing into one location takes
                // its first value.
                let first = first_value(tuple);
                if matches!(lhs, Type::Void) && first.is_none() {
                    return AssignResult::pass();
                }
                let first = first.unwrap_or(Type::Primitive(Primitive::Nil));
                let mut result = is_assignable(table, lhs, &first);
                if !result.yes {
                    result.push(cannot(table, lhs, rhs));
                }
                result
            }
        }
        Type::Table(tbl) => {
            if let Type::Table(expected) = lhs {
                let mut result = table_assignable(table, expected, tbl);
                if !result.yes {
                    result.push(cannot(table, lhs, rhs));
                }
                result
            } else {
                AssignResult::fail(cannot(table, lhs, rhs))
            }
        }
        Type::Nominal(id) => match lhs {
            Type::Nominal(expected) if expected == id => AssignResult::pass(),
            _ => AssignResult::fail(cannot(table, lhs, rhs)),
        },
        _ => AssignResult::fail(cannot(table, lhs, rhs)),
    }
}

fn first_value(tuple: &TupleType) -> Option<Type> {
    match tuple.types.first() {
        Some(Type::Tuple(inner)) => first_value(inner),
        Some(ty) => Some(ty.clone()),
        None if tuple.variadic => Some(Type::Any),
        None => None,
    }
}

/// Substitute a function's generic parameters by their bounds, yielding
/// a monomorphic signature for comparison.
fn instantiate_bounds(table: &TypeTable, function: &FunctionType) -> FunctionType {
    if function.genparams.is_empty() {
        return function.clone();
    }

    let bounds: Vec<Option<Type>> = function
        .genparams
        .iter()
        .map(|genparam| Some(genparam.ty.clone()))
        .collect();

    let params = function
        .params
        .iter()
        .map(|param| apply_genparams(table, &bounds, &function.nominals, None, param))
        .collect();
    let ret = apply_genparams(table, &bounds, &function.nominals, None, &function.ret);

    FunctionType {
        genparams: Vec::new(),
        nominals: Vec::new(),
        params,
        ret: Box::new(ret),
        variadic: function.variadic,
    }
}

fn function_assignable(table: &TypeTable, lhs: &FunctionType, rhs: &FunctionType) -> AssignResult {
    let lhs = instantiate_bounds(table, lhs);
    let rhs = instantiate_bounds(table, rhs);

    if rhs.params.len() < lhs.params.len() && !rhs.variadic {
        return AssignResult::fail(format!(
            "Function must accept at least {} parameters",
            lhs.params.len()
        ));
    }

    if lhs.variadic && !rhs.variadic {
        return AssignResult::fail("Function must be variadic");
    }

    let shared = lhs.params.len().min(rhs.params.len());
    for i in 0..shared {
        let mut result = is_assignable(table, &lhs.params[i], &rhs.params[i]);
        if !result.yes {
            result.push(format!("At parameter {i}"));
            return result;
        }
    }

    let nil = Type::Primitive(Primitive::Nil);
    for i in lhs.params.len()..rhs.params.len() {
        let mut result = is_assignable(table, &rhs.params[i], &nil);
        if !result.yes {
            result.push(format!("At parameter {i}"));
            return result;
        }
    }

    let mut result = is_assignable(table, &lhs.ret, &rhs.ret);
    if !result.yes {
        result.push("At return type");
        return result;
    }

    AssignResult::pass()
}

fn tuple_assignable(table: &TypeTable, lhs: &TupleType, rhs: &TupleType) -> AssignResult {
    // A trailing tuple in the value list splices into it.
    let mut rhs_types = rhs.types.clone();
    let mut rhs_variadic = rhs.variadic;
    if let Some(Type::Tuple(inner)) = rhs_types.last() {
        let inner = inner.clone();
        rhs_types.pop();
        rhs_variadic = rhs_variadic || inner.variadic;
        rhs_types.extend(inner.types);
    }

    let nil = Type::Primitive(Primitive::Nil);
    for (i, expected) in lhs.types.iter().enumerate() {
        let value = match rhs_types.get(i) {
            Some(value) => value,
            None if rhs_variadic => continue,
            None => &nil,
        };
        let mut result = is_assignable(table, expected, value);
        if !result.yes {
            result.push(format!("At value {i}"));
            return result;
        }
    }

    if rhs_types.len() > lhs.types.len() && !lhs.variadic {
        return AssignResult::fail("Too many values");
    }

    AssignResult::pass()
}

fn table_assignable(table: &TypeTable, lhs: &TableType, rhs: &TableType) -> AssignResult {
    let string = Type::Primitive(Primitive::String);

    for index in &lhs.indexes {
        for value in &rhs.indexes {
            if is_assignable(table, &index.key, &value.key).yes {
                let mut result = is_assignable(table, &index.val, &value.val);
                if !result.yes {
                    result.push(format!("At index `{}`", describe(table, &value.key)));
                    return result;
                }
            }
        }

        if is_assignable(table, &index.key, &string).yes {
            for field in &rhs.fields {
                let mut result = is_assignable(table, &index.val, &field.ty);
                if !result.yes {
                    result.push(format!("At field '{}'", field.name));
                    return result;
                }
            }
        }
    }

    let nil = Type::Primitive(Primitive::Nil);
    for field in &lhs.fields {
        match rhs.field(&field.name) {
            Some(value) => {
                let mut result = is_assignable(table, &field.ty, &value.ty);
                if !result.yes {
                    result.push(format!("At field '{}'", field.name));
                    return result;
                }
            }
            None => {
                if !is_assignable(table, &field.ty, &nil).yes {
                    return AssignResult::fail(format!("Missing field '{}'", field.name));
                }
            }
        }
    }

    AssignResult::pass()
}
