use std::collections::HashMap;

use crate::assign::{is_assignable, AssignResult};
use crate::types::{
    describe, union, DeferId, FunctionType, KeyValPair, LiteralValue, NameType, Primitive,
    ProductType, TableType, TupleType, Type, TypeTable,
};

/// Callback that resolves a module name to its export type. Installed on
/// the root scope and consulted when a `$require` type is substituted.
pub type PackageTypeFn = dyn Fn(&str) -> Type;

/// Look up field `key` on `ty`. Primitives go through the root scope's
/// metatable map, sums take the union of per-member results, deferred and
/// nominal references resolve first. `None` means the field is absent;
/// `notes` then explains why, innermost reason first.
pub fn field_of(
    table: &TypeTable,
    metatables: &HashMap<Primitive, Type>,
    ty: &Type,
    key: &str,
    notes: &mut Vec<String>,
) -> Option<Type> {
    match ty {
        Type::Any => Some(Type::Any),
        Type::Primitive(primitive) => match metatables.get(primitive) {
            Some(metatable) => field_of(table, metatables, &metatable.clone(), key, notes),
            None => {
                notes.push(format!(
                    "Type `{}` has no metatable",
                    describe(table, ty)
                ));
                None
            }
        },
        Type::Literal(value) => field_of(
            table,
            metatables,
            &Type::Primitive(value.primitive()),
            key,
            notes,
        ),
        Type::Table(tbl) => match tbl.field(key) {
            Some(field) => Some(field.ty.clone()),
            None => index_of(table, &Type::Table(tbl.clone()), &Type::Primitive(Primitive::String), notes),
        },
        Type::Sum(sum) => {
            let mut found: Option<Type> = None;
            for member in &sum.types {
                match field_of(table, metatables, member, key, notes) {
                    Some(ty) => {
                        found = Some(match found {
                            Some(existing) => union(table, &existing, &ty),
                            None => ty,
                        });
                    }
                    None => {
                        notes.push(format!(
                            "Cannot find field '{}' in `{}`",
                            key,
                            describe(table, member)
                        ));
                    }
                }
            }
            found
        }
        Type::Deferred(deferred) => {
            let result = field_of(table, metatables, &table.resolve(deferred), key, notes);
            if !notes.is_empty() {
                notes.push(format!("In deferred type '{}'", table.name(deferred.id)));
            }
            result
        }
        Type::Nominal(id) => field_of(table, metatables, &table.get(*id), key, notes),
        _ => {
            notes.push(format!("Type `{}` has no fields", describe(table, ty)));
            None
        }
    }
}

/// Look up the value type reached by indexing `ty` with a `key`-typed
/// subscript. The first index whose key type accepts the subscript wins.
pub fn index_of(
    table: &TypeTable,
    ty: &Type,
    key: &Type,
    notes: &mut Vec<String>,
) -> Option<Type> {
    match ty {
        Type::Any => Some(Type::Any),
        Type::Table(tbl) => tbl
            .indexes
            .iter()
            .find(|index| is_assignable(table, &index.key, key).yes)
            .map(|index| index.val.clone()),
        Type::Sum(sum) => {
            let mut found: Option<Type> = None;
            for member in &sum.types {
                match index_of(table, member, key, notes) {
                    Some(ty) => {
                        found = Some(match found {
                            Some(existing) => union(table, &existing, &ty),
                            None => ty,
                        });
                    }
                    None => {
                        notes.push(format!(
                            "Cannot find index `{}` in `{}`",
                            describe(table, key),
                            describe(table, member)
                        ));
                    }
                }
            }
            found
        }
        Type::Deferred(deferred) => index_of(table, &table.resolve(deferred), key, notes),
        Type::Nominal(id) => index_of(table, &table.get(*id), key, notes),
        _ => {
            notes.push(format!("Type `{}` has no indexes", describe(table, ty)));
            None
        }
    }
}

/// The type a call of `ty` produces, ignoring arguments.
pub fn return_of(table: &TypeTable, ty: &Type, notes: &mut Vec<String>) -> Option<Type> {
    match ty {
        Type::Any => Some(Type::Any),
        Type::Function(function) => Some((*function.ret).clone()),
        Type::Sum(sum) => {
            let mut found: Option<Type> = None;
            for member in &sum.types {
                match return_of(table, member, notes) {
                    Some(ty) => {
                        found = Some(match found {
                            Some(existing) => union(table, &existing, &ty),
                            None => ty,
                        });
                    }
                    None => {
                        notes.push(format!(
                            "Type `{}` has no return type",
                            describe(table, member)
                        ));
                    }
                }
            }
            found
        }
        Type::Product(product) => {
            let mut found: Option<Type> = None;
            for component in &product.types {
                if let Some(ty) = return_of(table, component, notes) {
                    found = Some(match found {
                        Some(existing) => union(table, &existing, &ty),
                        None => ty,
                    });
                }
            }
            found
        }
        Type::Deferred(deferred) => return_of(table, &table.resolve(deferred), notes),
        _ => {
            notes.push(format!(
                "Type `{}` has no return type",
                describe(table, ty)
            ));
            None
        }
    }
}

/// Check one argument against one parameter position, inferring generic
/// parameter bindings along the way. `nominals[i]` is the deferred id
/// marking occurrences of `genparams[i]`; `inferred[i]` is its binding so
/// far.
pub fn check_param(
    table: &TypeTable,
    param: &Type,
    arg: &Type,
    genparams: &[NameType],
    nominals: &[DeferId],
    inferred: &mut Vec<Option<Type>>,
) -> AssignResult {
    match param {
        Type::Nominal(id) => {
            if let Some(position) = nominals.iter().position(|nominal| nominal == id) {
                if let Some(bound) = inferred[position].clone() {
                    let mut result = is_assignable(table, &bound, arg);
                    if !result.yes {
                        result.push(format!(
                            "At generic parameter '{}'",
                            genparams[position].name
                        ));
                    }
                    return result;
                }

                let bound = genparams[position].ty.clone();
                let mut result = check_param(table, &bound, arg, genparams, nominals, inferred);
                if result.yes {
                    inferred[position] = Some(arg.clone());
                } else {
                    result.push(format!(
                        "At generic parameter '{}'",
                        genparams[position].name
                    ));
                }
                return result;
            }

            substituted_assignable(table, param, arg, nominals, inferred)
        }
        Type::Table(expected) => {
            let target = match arg {
                Type::Deferred(deferred) => table.resolve(deferred),
                other => other.clone(),
            };
            let Type::Table(actual) = target else {
                return substituted_assignable(table, param, arg, nominals, inferred);
            };

            for index in &expected.indexes {
                for value in &actual.indexes {
                    if is_assignable(table, &index.key, &value.key).yes {
                        let mut result = check_param(
                            table, &index.val, &value.val, genparams, nominals, inferred,
                        );
                        if !result.yes {
                            result.push(format!(
                                "At index `{}`",
                                describe(table, &value.key)
                            ));
                            return result;
                        }
                    }
                }
            }

            let nil = Type::Primitive(Primitive::Nil);
            for field in &expected.fields {
                match actual.field(&field.name) {
                    Some(value) => {
                        let mut result = check_param(
                            table, &field.ty, &value.ty, genparams, nominals, inferred,
                        );
                        if !result.yes {
                            result.push(format!("At field '{}'", field.name));
                            return result;
                        }
                    }
                    None => {
                        if !is_assignable(table, &field.ty, &nil).yes {
                            return AssignResult::fail(format!(
                                "Missing field '{}'",
                                field.name
                            ));
                        }
                    }
                }
            }

            AssignResult::pass()
        }
        Type::Sum(sum) => {
            let mut collected = Vec::new();
            for member in &sum.types {
                let mut tentative = inferred.clone();
                let result = check_param(table, member, arg, genparams, nominals, &mut tentative);
                if result.yes {
                    *inferred = tentative;
                    return result;
                }
                collected.extend(result.messages);
            }
            collected.push(format!(
                "Cannot assign `{}` to `{}`",
                describe(table, arg),
                describe(table, param)
            ));
            AssignResult::fail_all(collected)
        }
        Type::Deferred(deferred) => check_param(
            table,
            &table.resolve(deferred),
            arg,
            genparams,
            nominals,
            inferred,
        ),
        _ => substituted_assignable(table, param, arg, nominals, inferred),
    }
}

fn substituted_assignable(
    table: &TypeTable,
    param: &Type,
    arg: &Type,
    nominals: &[DeferId],
    inferred: &[Option<Type>],
) -> AssignResult {
    let substituted = apply_genparams(table, inferred, nominals, None, param);
    is_assignable(table, &substituted, arg)
}

/// Substitute inferred generic bindings through an arbitrary type shape.
/// Unresolved bindings default to `any`. `$require` markers resolve
/// through the package callback when their substituted basis is a string
/// literal.
pub fn apply_genparams(
    table: &TypeTable,
    inferred: &[Option<Type>],
    nominals: &[DeferId],
    resolver: Option<&PackageTypeFn>,
    ty: &Type,
) -> Type {
    if inferred.is_empty() {
        return ty.clone();
    }

    match ty {
        Type::Nominal(id) => {
            for (i, nominal) in nominals.iter().enumerate() {
                if nominal == id {
                    return inferred[i].clone().unwrap_or(Type::Any);
                }
            }
            ty.clone()
        }
        Type::Table(tbl) => {
            let indexes = tbl
                .indexes
                .iter()
                .map(|index| KeyValPair {
                    key: apply_genparams(table, inferred, nominals, resolver, &index.key),
                    val: apply_genparams(table, inferred, nominals, resolver, &index.val),
                })
                .collect();
            let fields = tbl
                .fields
                .iter()
                .map(|field| NameType {
                    name: field.name.clone(),
                    ty: apply_genparams(table, inferred, nominals, resolver, &field.ty),
                })
                .collect();
            Type::Table(TableType { indexes, fields })
        }
        Type::Sum(sum) => sum
            .types
            .iter()
            .map(|member| apply_genparams(table, inferred, nominals, resolver, member))
            .fold(Type::Void, |acc, member| union(table, &acc, &member)),
        Type::Product(product) => Type::Product(ProductType {
            types: product
                .types
                .iter()
                .map(|component| apply_genparams(table, inferred, nominals, resolver, component))
                .collect(),
        }),
        Type::Tuple(tuple) => Type::Tuple(TupleType {
            types: tuple
                .types
                .iter()
                .map(|member| apply_genparams(table, inferred, nominals, resolver, member))
                .collect(),
            variadic: tuple.variadic,
        }),
        Type::Function(function) => {
            let genparams = function
                .genparams
                .iter()
                .map(|genparam| NameType {
                    name: genparam.name.clone(),
                    ty: apply_genparams(table, inferred, nominals, resolver, &genparam.ty),
                })
                .collect();
            let params = function
                .params
                .iter()
                .map(|param| apply_genparams(table, inferred, nominals, resolver, param))
                .collect();
            let ret = apply_genparams(table, inferred, nominals, resolver, &function.ret);
            Type::Function(FunctionType {
                genparams,
                nominals: function.nominals.clone(),
                params,
                ret: Box::new(ret),
                variadic: function.variadic,
            })
        }
        Type::Require(basis) => {
            let inner = apply_genparams(table, inferred, nominals, resolver, basis);
            if let (Some(resolver), Type::Literal(LiteralValue::String(name))) = (resolver, &inner)
            {
                return resolver(name);
            }
            Type::Any
        }
        _ => ty.clone(),
    }
}

/// Resolve a call of `ty` with the given argument types. Overloaded
/// functions (products) try each component in order; the first component
/// that accepts the arguments wins. Returns the applied return type, or
/// `None` with the collected notes explaining every rejection.
pub fn resolve_overload(
    table: &TypeTable,
    resolver: Option<&PackageTypeFn>,
    ty: &Type,
    args: &[Type],
    notes: &mut Vec<String>,
) -> Option<Type> {
    match ty {
        Type::Any => Some(Type::Any),
        Type::Function(function) => {
            if args.len() > function.params.len() && !function.variadic {
                notes.push("Too many arguments for non-variadic function".to_string());
                return None;
            }

            let mut inferred: Vec<Option<Type>> = vec![None; function.genparams.len()];
            let nil = Type::Primitive(Primitive::Nil);

            for (i, param) in function.params.iter().enumerate() {
                let arg = args.get(i).unwrap_or(&nil);
                let mut result = check_param(
                    table,
                    param,
                    arg,
                    &function.genparams,
                    &function.nominals,
                    &mut inferred,
                );
                if !result.yes {
                    result.push(format!("Invalid parameter {i}"));
                    notes.push(result.to_string());
                    return None;
                } else if !result.messages.is_empty() {
                    notes.push(result.to_string());
                }
            }

            Some(apply_genparams(
                table,
                &inferred,
                &function.nominals,
                resolver,
                &function.ret,
            ))
        }
        Type::Product(product) => {
            let mut all_notes = Vec::new();
            for component in &product.types {
                let mut current = Vec::new();
                if let Some(ret) = resolve_overload(table, resolver, component, args, &mut current)
                {
                    notes.append(&mut current);
                    return Some(ret);
                }
                all_notes.append(&mut current);
            }
            notes.append(&mut all_notes);
            None
        }
        Type::Deferred(deferred) => {
            resolve_overload(table, resolver, &table.resolve(deferred), args, notes)
        }
        _ => {
            notes.push(format!("Type `{}` cannot be called", describe(table, ty)));
            None
        }
    }
}
