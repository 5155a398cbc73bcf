use std::rc::Rc;

use crate::access::{field_of, index_of, resolve_overload};
use crate::assign::is_assignable;
use crate::ast::*;
use crate::diagnostics::Diagnostics;
use crate::scope::ScopeStack;
use crate::types::{
    describe, difference, narrow_field, narrow_index, union, DeferId, FunctionType, KeyValPair,
    NameType, Primitive, TableType, Type, TypeTable,
};

/// Recursive pass over the parsed tree. Threads the scope stack through
/// blocks, records narrowings in the deferred type table, and accumulates
/// diagnostics; checking never stops at the first error.
pub struct Checker<'a> {
    scopes: &'a mut ScopeStack,
    table: Rc<TypeTable>,
    diagnostics: Diagnostics,
}

impl<'a> Checker<'a> {
    pub fn new(scopes: &'a mut ScopeStack, table: Rc<TypeTable>) -> Self {
        Self {
            scopes,
            table,
            diagnostics: Diagnostics::new(),
        }
    }

    pub fn into_diagnostics(self) -> Diagnostics {
        self.diagnostics
    }

    /// Check one compilation unit and return its deduced top-level
    /// return type (the module's export type).
    pub fn check_chunk(&mut self, block: &Block) -> Type {
        self.scopes.push();
        self.scopes.deduce_return();
        for statement in &block.statements {
            self.check_statement(statement);
        }
        let return_type = self.scopes.deduced_return().unwrap_or(Type::Void);
        self.scopes.pop();
        return_type
    }

    /// Join a note chain into one message, outermost context first.
    fn join_notes(notes: &[String]) -> String {
        let mut message = String::new();
        for note in notes {
            if message.is_empty() {
                message = note.clone();
            } else {
                message = format!("{note}\n{message}");
            }
        }
        message
    }

    fn check_block(&mut self, block: &Block) {
        self.scopes.push();
        for statement in &block.statements {
            self.check_statement(statement);
        }
        self.scopes.pop();
    }

    fn check_statement(&mut self, statement: &Statement) {
        match statement {
            Statement::Empty | Statement::Break | Statement::Goto(_) | Statement::Label(_) => {}
            Statement::Assign(assign) => self.check_assign(assign),
            Statement::Call(expr) => {
                self.check_expression(expr);
            }
            Statement::Do(block) => self.check_block(block),
            Statement::While(stmt) => {
                self.check_expression(&stmt.condition);
                self.check_block(&stmt.body);
            }
            Statement::Repeat(stmt) => {
                self.check_block(&stmt.body);
                self.check_expression(&stmt.until);
            }
            Statement::If(stmt) => {
                self.check_expression(&stmt.condition);
                self.check_block(&stmt.body);
                for elseif in &stmt.elseifs {
                    self.check_expression(&elseif.condition);
                    self.check_block(&elseif.body);
                }
                if let Some(else_body) = &stmt.else_body {
                    self.check_block(else_body);
                }
            }
            Statement::NumericFor(stmt) => self.check_numeric_for(stmt),
            Statement::GenericFor(stmt) => self.check_generic_for(stmt),
            Statement::Function(stmt) => self.check_function_statement(stmt),
            Statement::LocalFunction(stmt) => self.check_local_function(stmt),
            Statement::Local(stmt) => self.check_local(stmt),
            Statement::Global(stmt) => self.check_global(stmt),
            Statement::Interface(stmt) => self.check_interface(stmt),
            Statement::Return(stmt) => self.check_return(stmt),
        }
    }

    fn check_assign(&mut self, assign: &AssignStatement) {
        let mut rhs = Vec::with_capacity(assign.values.len());
        for value in &assign.values {
            rhs.push(self.check_expression(value));
        }

        // A trailing multi-value expression spreads over the remaining
        // targets. Pairing uses the spliced values; the final judgment
        // keeps the original list so a variadic tail survives into the
        // tuple comparison.
        let mut values = rhs.clone();
        if let Some(Type::Tuple(tuple)) = values.last() {
            let tuple = tuple.clone();
            values.pop();
            values.extend(tuple.types);
        }

        let mut lhs = Vec::with_capacity(assign.targets.len());
        for (i, target) in assign.targets.iter().enumerate() {
            let ty = if let Some(value_type) = values.get(i) {
                let value_type = value_type.clone();
                self.check_expect(target, &value_type)
            } else {
                self.check_expression(target)
            };
            lhs.push(ty);
        }

        let lhs_type = Type::reduced_tuple(lhs);
        let rhs_type = Type::reduced_tuple(rhs);
        let result = is_assignable(&self.table, &lhs_type, &rhs_type);
        if !result.yes {
            self.diagnostics.error(result.to_string(), assign.span);
        } else if !result.messages.is_empty() {
            self.diagnostics.warning(result.to_string(), assign.span);
        }
    }

    fn check_numeric_for(&mut self, stmt: &NumericForStatement) {
        self.check_expression(&stmt.start);
        self.check_expression(&stmt.limit);
        if let Some(step) = &stmt.step {
            self.check_expression(step);
        }

        if self.scopes.lookup(&stmt.name).is_some() {
            self.diagnostics.warning(
                format!("For-loop variable shadows name `{}`", stmt.name),
                stmt.name_span,
            );
        }

        self.scopes.push();
        self.scopes
            .bind(&stmt.name, Type::Primitive(Primitive::Number));
        self.check_block(&stmt.body);
        self.scopes.pop();
    }

    fn check_generic_for(&mut self, stmt: &GenericForStatement) {
        for name in &stmt.names {
            if self.scopes.lookup(&name.name).is_some() {
                self.diagnostics.warning(
                    format!("For-loop variable shadows name `{}`", name.name),
                    name.span,
                );
            }
        }

        for expr in &stmt.exprs {
            self.check_expression(expr);
        }

        let mut bindings = Vec::with_capacity(stmt.names.len());
        for name in &stmt.names {
            let ty = match &name.annotation {
                Some(annotation) => self.type_from_expr(annotation),
                None => Type::Any,
            };
            bindings.push((name.name.clone(), ty));
        }

        self.scopes.push();
        for (name, ty) in bindings {
            self.scopes.bind(name, ty);
        }
        self.check_block(&stmt.body);
        self.scopes.pop();
    }

    fn check_local(&mut self, stmt: &LocalStatement) {
        for name in &stmt.names {
            if self.scopes.lookup(&name.name).is_some() {
                self.diagnostics.warning(
                    format!("Local variable shadows name `{}`", name.name),
                    name.span,
                );
            }
        }

        let mut expr_types = Vec::with_capacity(stmt.exprs.len());
        for expr in &stmt.exprs {
            expr_types.push(self.check_expression(expr));
        }

        // A trailing multi-value expression spreads over the remaining
        // names.
        if let Some(Type::Tuple(tuple)) = expr_types.last() {
            let tuple = tuple.clone();
            expr_types.pop();
            expr_types.extend(tuple.types);
        }

        for (i, name) in stmt.names.iter().enumerate() {
            let ty = if let Some(annotation) = &name.annotation {
                let declared = self.type_from_expr(annotation);
                if let Some(expr_type) = expr_types.get(i) {
                    let result = is_assignable(&self.table, &declared, expr_type);
                    if !result.yes {
                        self.diagnostics.error(result.to_string(), name.span);
                    } else if !result.messages.is_empty() {
                        self.diagnostics.warning(result.to_string(), name.span);
                    }
                }
                declared
            } else if let Some(expr_type) = expr_types.get(i) {
                match expr_type {
                    // Literal initializers stay provisional: later
                    // assignments widen the local's type.
                    Type::Literal(_) => {
                        let id = self
                            .table
                            .reserve_narrowing(format!("@{}", name.span.line));
                        self.table.set(id, expr_type.clone());
                        Type::deferred(id)
                    }
                    other => other.clone(),
                }
            } else {
                Type::Any
            };
            self.scopes.bind(&name.name, ty);
        }
    }

    fn check_global(&mut self, stmt: &GlobalStatement) {
        for expr in &stmt.exprs {
            self.check_expression(expr);
        }

        for name in &stmt.names {
            let declared = match &name.annotation {
                Some(annotation) => self.type_from_expr(annotation),
                None => Type::Any,
            };
            if let Some(existing) = self.scopes.lookup(&name.name) {
                let result = is_assignable(&self.table, &existing, &declared);
                if !result.yes {
                    self.diagnostics.error(
                        format!("Global variable conflict: {result}"),
                        name.span,
                    );
                }
            } else {
                self.scopes.bind_global(&name.name, declared);
            }
        }
    }

    fn check_interface(&mut self, stmt: &InterfaceStatement) {
        if self.scopes.lookup_alias(&stmt.name).is_some() {
            self.diagnostics.warning(
                format!("Interface `{}` shadows existing type", stmt.name),
                stmt.span,
            );
        }

        let id = self.table.reserve(&stmt.name);
        self.scopes.bind_alias(&stmt.name, Type::deferred(id));

        if stmt.genparams.is_empty() {
            let ty = self.type_from_expr(&stmt.ty);
            self.table.set(id, ty);
            return;
        }

        self.scopes.push();
        let mut nominals = Vec::with_capacity(stmt.genparams.len());
        for genparam in &stmt.genparams {
            let genparam_id = self.table.reserve(&genparam.name);
            let bound = match &genparam.annotation {
                Some(annotation) => self.type_from_expr(annotation),
                None => Type::Any,
            };
            self.table.set(genparam_id, bound);
            self.scopes
                .bind_alias(&genparam.name, Type::Nominal(genparam_id));
            nominals.push(genparam_id);
        }
        let ty = self.type_from_expr(&stmt.ty);
        self.scopes.pop();

        self.table.set(id, ty);
        self.table.set_nominals(id, nominals);
    }

    fn check_return(&mut self, stmt: &ReturnStatement) {
        let mut types = Vec::with_capacity(stmt.exprs.len());
        for expr in &stmt.exprs {
            types.push(self.check_expression(expr));
        }
        let ty = Type::reduced_tuple(types);

        if let Some(expected) = self.scopes.fixed_return_type() {
            let result = is_assignable(&self.table, &expected, &ty);
            if !result.yes {
                self.diagnostics.error(result.to_string(), stmt.span);
            }
        } else {
            self.scopes.add_return(&self.table, ty);
        }
    }

    fn check_local_function(&mut self, stmt: &LocalFunctionStatement) {
        // With a declared return type the signature is known up front,
        // which lets the body recurse through its own name.
        let prebound = stmt.body.ret.is_some() && self.scopes.lookup(&stmt.name).is_none();
        if prebound {
            let signature = self.signature_of(&stmt.body);
            self.scopes.bind(&stmt.name, signature);
        }

        let function_type = self.check_function_body(&stmt.body, None);

        if prebound {
            self.scopes.bind(&stmt.name, function_type);
            return;
        }

        if let Some(existing) = self.scopes.lookup(&stmt.name) {
            let result = is_assignable(&self.table, &existing, &function_type);
            if !result.yes {
                self.diagnostics.error(result.to_string(), stmt.span);
            } else if !result.messages.is_empty() {
                self.diagnostics.warning(result.to_string(), stmt.span);
            }
        } else {
            self.scopes.bind(&stmt.name, function_type);
        }
    }

    fn check_function_statement(&mut self, stmt: &FunctionStatement) {
        match &stmt.method {
            Some((method, method_span)) => {
                let self_type = self.check_expression(&stmt.target);

                self.scopes.push();
                self.scopes.bind("self", self_type.clone());
                let function_type = self.check_function_body(&stmt.body, Some(&self_type));
                self.scopes.pop();

                // Method definitions narrow the receiver's table type.
                if let Type::Deferred(deferred) = &self_type {
                    if self.table.is_narrowing(deferred.id) {
                        if let Type::Table(tbl) = self.table.get(deferred.id) {
                            let narrowed =
                                narrow_field(&self.table, &tbl, method, &function_type);
                            self.table.set(deferred.id, narrowed);
                        }
                    }
                }

                let mut notes = Vec::new();
                let field = field_of(
                    &self.table,
                    self.scopes.metatables(),
                    &self_type,
                    method,
                    &mut notes,
                );
                match field {
                    Some(field_type) => {
                        let result = is_assignable(&self.table, &field_type, &function_type);
                        if !result.yes {
                            self.diagnostics.error(result.to_string(), *method_span);
                        } else if !result.messages.is_empty() {
                            self.diagnostics.warning(result.to_string(), *method_span);
                        }
                    }
                    None => {
                        notes.push("Failed to deduce field type".to_string());
                        let message = Self::join_notes(&notes);
                        self.diagnostics.error(message, *method_span);
                    }
                }
            }
            None => {
                let function_type = self.check_function_body(&stmt.body, None);
                self.check_expect(&stmt.target, &function_type);
            }
        }
    }

    /// The function's declared signature, without checking its body.
    /// Deduced-return functions get an `any` return here.
    fn signature_of(&mut self, body: &FunctionBody) -> Type {
        self.scopes.push();
        let mut genparams = Vec::new();
        let mut nominals = Vec::new();
        self.bind_genparams(&body.genparams, &mut genparams, &mut nominals);
        let params: Vec<Type> = body
            .params
            .iter()
            .map(|param| match &param.annotation {
                Some(annotation) => self.type_from_expr(annotation),
                None => Type::Any,
            })
            .collect();
        let ret = match &body.ret {
            Some(ret) => self.type_from_expr(ret),
            None => Type::Any,
        };
        self.scopes.pop();

        Type::Function(FunctionType {
            genparams,
            nominals,
            params,
            ret: Box::new(ret),
            variadic: body.variadic,
        })
    }

    fn bind_genparams(
        &mut self,
        decls: &[NameDecl],
        genparams: &mut Vec<NameType>,
        nominals: &mut Vec<DeferId>,
    ) {
        for decl in decls {
            let id = self.table.reserve(&decl.name);
            let bound = match &decl.annotation {
                Some(annotation) => self.type_from_expr(annotation),
                None => Type::Any,
            };
            self.table.set(id, bound.clone());
            self.scopes.bind_alias(&decl.name, Type::Nominal(id));
            genparams.push(NameType {
                name: decl.name.clone(),
                ty: bound,
            });
            nominals.push(id);
        }
    }

    /// Check a function definition and produce its type. `self_type`
    /// prepends a receiver parameter for method definitions.
    fn check_function_body(&mut self, body: &FunctionBody, self_type: Option<&Type>) -> Type {
        self.scopes.push();

        let mut genparams = Vec::new();
        let mut nominals = Vec::new();
        self.bind_genparams(&body.genparams, &mut genparams, &mut nominals);

        let mut params = Vec::with_capacity(body.params.len());
        for param in &body.params {
            if self.scopes.lookup(&param.name).is_some() {
                self.diagnostics.warning(
                    format!("Function parameter shadows name `{}`", param.name),
                    param.span,
                );
            }
            let ty = match &param.annotation {
                Some(annotation) => self.type_from_expr(annotation),
                None => Type::Any,
            };
            self.scopes.bind(&param.name, ty.clone());
            params.push(ty);
        }

        if body.variadic {
            self.scopes.set_dots(Type::tuple(Vec::new(), true));
        } else {
            self.scopes.disable_dots();
        }

        let ret = match &body.ret {
            Some(ret) => {
                let ty = self.type_from_expr(ret);
                self.scopes.set_fixed_return(ty.clone());
                self.check_block(&body.block);
                ty
            }
            None => {
                self.scopes.deduce_return();
                self.check_block(&body.block);
                self.scopes
                    .deduced_return()
                    .unwrap_or_else(|| Type::tuple(Vec::new(), false))
            }
        };

        self.scopes.pop();

        let mut all_params = params;
        if let Some(self_type) = self_type {
            all_params.insert(0, self_type.clone());
        }

        Type::Function(FunctionType {
            genparams,
            nominals,
            params: all_params,
            ret: Box::new(ret),
            variadic: body.variadic,
        })
    }

    // Expressions.

    fn check_expression(&mut self, expr: &Expression) -> Type {
        match &expr.kind {
            ExpressionKind::Nil => Type::Primitive(Primitive::Nil),
            ExpressionKind::True => Type::literal_bool(true),
            ExpressionKind::False => Type::literal_bool(false),
            ExpressionKind::Number(literal) => Type::literal_number(literal.value),
            ExpressionKind::String(literal) => Type::literal_string(literal.value.clone()),
            ExpressionKind::Dots => {
                if self.scopes.dots_type().is_none() {
                    self.diagnostics.error("Scope does not contain `...`", expr.span);
                }
                Type::Any
            }
            ExpressionKind::Name(name) => match self.scopes.lookup(name) {
                Some(ty) => ty,
                None => {
                    self.fail_name(name, expr.span);
                    Type::Any
                }
            },
            ExpressionKind::Field { prefix, name } => {
                let prefix_type = self.check_expression(prefix);
                self.field_common(&prefix_type, name, expr.span)
            }
            ExpressionKind::Index { prefix, key } => {
                let prefix_type = self.check_expression(prefix);
                let key_type = self.check_expression(key);
                self.index_common(&prefix_type, &key_type, expr.span)
            }
            ExpressionKind::Call { prefix, args } => {
                let prefix_type = self.check_expression(prefix);
                let arg_types: Vec<Type> =
                    args.iter().map(|arg| self.check_expression(arg)).collect();
                self.call_common(&prefix_type, &arg_types, expr.span)
            }
            ExpressionKind::MethodCall { prefix, name, args } => {
                let prefix_type = self.check_expression(prefix);
                let mut arg_types = Vec::with_capacity(args.len() + 1);
                arg_types.push(prefix_type.clone());
                for arg in args {
                    arg_types.push(self.check_expression(arg));
                }

                let mut notes = Vec::new();
                let method = field_of(
                    &self.table,
                    self.scopes.metatables(),
                    &prefix_type,
                    name,
                    &mut notes,
                );
                match method {
                    Some(method_type) => self.call_common(&method_type, &arg_types, expr.span),
                    None => {
                        notes.push(format!(
                            "Could not find method '{}' in `{}`",
                            name,
                            describe(&self.table, &prefix_type)
                        ));
                        self.diagnostics.error(Self::join_notes(&notes), expr.span);
                        Type::Any
                    }
                }
            }
            ExpressionKind::Function(body) => self.check_function_body(body, None),
            ExpressionKind::Table(fields) => self.check_table_constructor(fields, expr.span),
            ExpressionKind::Binary { op, left, right } => {
                self.check_binary(*op, left, right, expr.span)
            }
            ExpressionKind::Unary { op, operand } => self.check_unary(*op, operand, expr.span),
        }
    }

    /// Narrowing-aware checking for a location about to receive a value
    /// of type `expected`. Returns the location's type for the enclosing
    /// assignability judgment.
    fn check_expect(&mut self, expr: &Expression, expected: &Type) -> Type {
        match &expr.kind {
            ExpressionKind::Name(name) => match self.scopes.lookup(name) {
                Some(ty) => {
                    if let Type::Deferred(deferred) = &ty {
                        if self.table.is_narrowing(deferred.id) {
                            let current = self.table.get(deferred.id);
                            let widened = union(&self.table, &current, expected);
                            self.table.set(deferred.id, widened);
                        }
                    }
                    ty
                }
                None => {
                    self.fail_name(name, expr.span);
                    Type::Any
                }
            },
            ExpressionKind::Field { prefix, name } => {
                let prefix_type = self.check_expression(prefix);
                if let Type::Deferred(deferred) = &prefix_type {
                    if self.table.is_narrowing(deferred.id) {
                        if let Type::Table(tbl) = self.table.get(deferred.id) {
                            let narrowed = narrow_field(&self.table, &tbl, name, expected);
                            self.table.set(deferred.id, narrowed);
                            return Type::Any;
                        }
                    }
                }
                self.field_common(&prefix_type, name, expr.span)
            }
            ExpressionKind::Index { prefix, key } => {
                let prefix_type = self.check_expression(prefix);
                let key_type = self.check_expression(key);
                if let Type::Deferred(deferred) = &prefix_type {
                    if self.table.is_narrowing(deferred.id) {
                        if let Type::Table(tbl) = self.table.get(deferred.id) {
                            let narrowed =
                                narrow_index(&self.table, &tbl, &key_type, expected);
                            self.table.set(deferred.id, narrowed);
                            return Type::Any;
                        }
                    }
                }
                self.index_common(&prefix_type, &key_type, expr.span)
            }
            _ => self.check_expression(expr),
        }
    }

    fn fail_name(&mut self, name: &str, span: SourceSpan) {
        self.diagnostics.error(format!("Name `{name}` is not in scope"), span);
        // Rebind so dependent expressions produce at most one error.
        self.scopes.bind(name, Type::Any);
    }

    fn field_common(&mut self, prefix_type: &Type, name: &str, span: SourceSpan) -> Type {
        let mut notes = Vec::new();
        let result = field_of(
            &self.table,
            self.scopes.metatables(),
            prefix_type,
            name,
            &mut notes,
        );
        match result {
            Some(ty) => ty,
            None => {
                notes.push(format!(
                    "Could not find field '{}' in `{}`",
                    name,
                    describe(&self.table, prefix_type)
                ));
                self.diagnostics.error(Self::join_notes(&notes), span);
                Type::Any
            }
        }
    }

    fn index_common(&mut self, prefix_type: &Type, key_type: &Type, span: SourceSpan) -> Type {
        let mut notes = Vec::new();
        let result = index_of(&self.table, prefix_type, key_type, &mut notes);
        match result {
            Some(ty) => ty,
            None => {
                notes.push(format!(
                    "Could not find index `{}` in `{}`",
                    describe(&self.table, key_type),
                    describe(&self.table, prefix_type)
                ));
                self.diagnostics.error(Self::join_notes(&notes), span);
                Type::Any
            }
        }
    }

    fn call_common(&mut self, callee: &Type, args: &[Type], span: SourceSpan) -> Type {
        let resolver = self.scopes.package_resolver();
        let mut notes = Vec::new();
        let result = resolve_overload(
            &self.table,
            resolver.as_deref(),
            callee,
            args,
            &mut notes,
        );
        match result {
            Some(ty) => {
                if !notes.is_empty() {
                    self.diagnostics.warning(Self::join_notes(&notes), span);
                }
                ty
            }
            None => {
                self.diagnostics.error(Self::join_notes(&notes), span);
                Type::Any
            }
        }
    }

    fn check_table_constructor(&mut self, fields: &[TableField], span: SourceSpan) -> Type {
        // Empty constructors stay provisional so later writes can grow
        // the table's shape.
        if fields.is_empty() {
            let id = self.table.reserve_narrowing(format!("@{}", span.line));
            self.table.set(id, Type::table(Vec::new(), Vec::new()));
            return Type::deferred(id);
        }

        let mut indexes: Vec<KeyValPair> = Vec::new();
        let mut named: Vec<NameType> = Vec::new();
        let number = Type::Primitive(Primitive::Number);

        for field in fields {
            match field {
                TableField::Item(value) => {
                    let value_type = self.check_expression(value);
                    self.merge_index(&mut indexes, number.clone(), value_type);
                }
                TableField::Named { key, span, value } => {
                    let value_type = self.check_expression(value);
                    if let Some(existing) = named.iter_mut().find(|field| &field.name == key) {
                        self.diagnostics
                            .error(format!("Duplicate table key '{key}'"), *span);
                        existing.ty = union(&self.table, &existing.ty, &value_type);
                    } else {
                        named.push(NameType {
                            name: key.clone(),
                            ty: value_type,
                        });
                    }
                }
                TableField::Keyed { key, value } => {
                    let key_type = self.check_expression(key);
                    let value_type = self.check_expression(value);
                    self.merge_index(&mut indexes, key_type, value_type);
                }
            }
        }

        Type::Table(TableType {
            indexes,
            fields: named,
        })
    }

    fn merge_index(&mut self, indexes: &mut Vec<KeyValPair>, key: Type, val: Type) {
        for index in indexes.iter_mut() {
            if is_assignable(&self.table, &index.key, &key).yes {
                index.val = union(&self.table, &index.val, &val);
                return;
            }
        }
        indexes.push(KeyValPair { key, val });
    }

    fn check_binary(
        &mut self,
        op: BinaryOp,
        left: &Expression,
        right: &Expression,
        span: SourceSpan,
    ) -> Type {
        let lhs = self.check_expression(left);
        let rhs = self.check_expression(right);

        let number = Type::Primitive(Primitive::Number);
        let string = Type::Primitive(Primitive::String);
        let boolean = Type::Primitive(Primitive::Boolean);

        match op {
            BinaryOp::Or => {
                let falsy = Type::literal_bool(false);
                let truthy = difference(&self.table, &lhs, &falsy);
                union(&self.table, &truthy, &rhs)
            }
            BinaryOp::And => union(&self.table, &Type::literal_bool(false), &rhs),
            BinaryOp::Less | BinaryOp::Greater | BinaryOp::LessEq | BinaryOp::GreaterEq => {
                let comparable = [&number, &string].iter().any(|expected| {
                    is_assignable(&self.table, expected, &lhs).yes
                        && is_assignable(&self.table, expected, &rhs).yes
                });
                if !comparable {
                    self.diagnostics.error(
                        format!(
                            "Cannot compare `{}` to `{}`",
                            describe(&self.table, &lhs),
                            describe(&self.table, &rhs)
                        ),
                        span,
                    );
                }
                boolean
            }
            BinaryOp::Eq | BinaryOp::NotEq => {
                let forward = is_assignable(&self.table, &lhs, &rhs);
                let backward = is_assignable(&self.table, &rhs, &lhs);
                if !forward.yes && !backward.yes {
                    self.diagnostics.error(
                        format!(
                            "Cannot compare `{}` to `{}`",
                            describe(&self.table, &lhs),
                            describe(&self.table, &rhs)
                        ),
                        span,
                    );
                }
                boolean
            }
            BinaryOp::BitOr
            | BinaryOp::BitXor
            | BinaryOp::BitAnd
            | BinaryOp::Shl
            | BinaryOp::Shr => {
                self.require_operand(&number, &lhs, "In bitwise operation", span);
                self.require_operand(&number, &rhs, "In bitwise operation", span);
                number
            }
            BinaryOp::Concat => {
                self.require_operand(&string, &lhs, "In concat operation", span);
                self.require_operand(&string, &rhs, "In concat operation", span);
                string
            }
            BinaryOp::Add
            | BinaryOp::Sub
            | BinaryOp::Mul
            | BinaryOp::Div
            | BinaryOp::IDiv
            | BinaryOp::Mod
            | BinaryOp::Pow => {
                self.require_operand(&number, &lhs, "In arithmetic operation", span);
                self.require_operand(&number, &rhs, "In arithmetic operation", span);
                number
            }
        }
    }

    fn require_operand(&mut self, expected: &Type, actual: &Type, context: &str, span: SourceSpan) {
        let mut result = is_assignable(&self.table, expected, actual);
        if !result.yes {
            result.push(context);
            self.diagnostics.error(result.to_string(), span);
        }
    }

    fn check_unary(&mut self, op: UnaryOp, operand: &Expression, span: SourceSpan) -> Type {
        let ty = self.check_expression(operand);
        let number = Type::Primitive(Primitive::Number);

        match op {
            UnaryOp::Not => Type::Primitive(Primitive::Boolean),
            UnaryOp::Len => {
                let string = Type::Primitive(Primitive::String);
                let indexable = Type::table(
                    vec![KeyValPair {
                        key: number.clone(),
                        val: Type::Any,
                    }],
                    Vec::new(),
                );
                let expected = union(&self.table, &string, &indexable);
                self.require_operand(&expected, &ty, "In length operator", span);
                number
            }
            UnaryOp::Neg | UnaryOp::BitNot => {
                self.require_operand(&number, &ty, "In unary operator", span);
                number
            }
        }
    }

    // Type expressions.

    /// Evaluate a type annotation to a type, reporting unknown names and
    /// malformed applications.
    fn type_from_expr(&mut self, expr: &TypeExpr) -> Type {
        match &expr.kind {
            TypeExprKind::Name { name, args } => {
                let Some(alias) = self.scopes.lookup_alias(name) else {
                    self.diagnostics.error(format!("Type `{name}` not in scope"), expr.span);
                    return Type::Any;
                };

                if args.is_empty() {
                    return alias;
                }

                let Type::Deferred(deferred) = &alias else {
                    self.diagnostics.error(
                        format!("Type `{name}` does not take type arguments"),
                        expr.span,
                    );
                    return Type::Any;
                };

                let expected = self.table.nominals(deferred.id).len();
                if expected != args.len() {
                    self.diagnostics.error(
                        format!(
                            "Type `{}` expects {} type arguments but {} were given",
                            name,
                            expected,
                            args.len()
                        ),
                        expr.span,
                    );
                    return Type::Any;
                }

                let args: Vec<Type> = args.iter().map(|arg| self.type_from_expr(arg)).collect();
                Type::Deferred(crate::types::DeferredType {
                    id: deferred.id,
                    args,
                })
            }
            TypeExprKind::LiteralBoolean(value) => Type::literal_bool(*value),
            TypeExprKind::LiteralNumber(value) => Type::literal_number(*value),
            TypeExprKind::LiteralString(value) => Type::literal_string(value.clone()),
            TypeExprKind::Function(function) => {
                self.scopes.push();
                let mut genparams = Vec::new();
                let mut nominals = Vec::new();
                self.bind_genparams(&function.genparams, &mut genparams, &mut nominals);
                let params: Vec<Type> = function
                    .params
                    .iter()
                    .map(|param| self.type_from_expr(&param.ty))
                    .collect();
                let ret = self.type_from_expr(&function.ret);
                self.scopes.pop();

                Type::Function(FunctionType {
                    genparams,
                    nominals,
                    params,
                    ret: Box::new(ret),
                    variadic: function.variadic,
                })
            }
            TypeExprKind::Tuple { elems, variadic } => {
                let types: Vec<Type> = elems
                    .iter()
                    .map(|elem| self.type_from_expr(&elem.ty))
                    .collect();
                Type::tuple(types, *variadic)
            }
            TypeExprKind::Table { indexes, fields } => {
                let nil = Type::Primitive(Primitive::Nil);
                let mut index_types = Vec::with_capacity(indexes.len());
                for (key, val) in indexes {
                    let key_type = self.type_from_expr(key);
                    if is_assignable(&self.table, &key_type, &nil).yes {
                        self.diagnostics.error("Key type must not be compatible with `nil`", key.span);
                    }
                    let val_type = self.type_from_expr(val);
                    index_types.push(KeyValPair {
                        key: key_type,
                        val: val_type,
                    });
                }

                let mut field_types: Vec<NameType> = Vec::new();
                for field in fields {
                    let ty = self.type_from_expr(&field.ty);
                    if let Some(existing) =
                        field_types.iter_mut().find(|f| f.name == field.name)
                    {
                        self.diagnostics
                            .error(format!("Duplicate table key '{}'", field.name), field.span);
                        existing.ty = union(&self.table, &existing.ty, &ty);
                    } else {
                        field_types.push(NameType {
                            name: field.name.clone(),
                            ty,
                        });
                    }
                }

                Type::Table(TableType {
                    indexes: index_types,
                    fields: field_types,
                })
            }
            TypeExprKind::Sum(left, right) => {
                let lhs = self.type_from_expr(left);
                let rhs = self.type_from_expr(right);
                union(&self.table, &lhs, &rhs)
            }
            TypeExprKind::Product(left, right) => {
                let lhs = self.type_from_expr(left);
                let rhs = self.type_from_expr(right);
                crate::types::intersect(&self.table, &lhs, &rhs)
            }
            TypeExprKind::Require(inner) => {
                let basis = self.type_from_expr(inner);
                Type::Require(Box::new(basis))
            }
        }
    }
}
