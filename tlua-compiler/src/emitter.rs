use crate::ast::*;

/// Serialize a checked tree back to plain Lua. Annotations, interface
/// declarations, bare global declarations, and generic clauses are
/// erased; comments and original formatting are not preserved.
pub fn emit(block: &Block) -> String {
    let mut emitter = Emitter {
        out: String::new(),
        indent: 0,
    };
    emitter.block(block);
    emitter.out
}

struct Emitter {
    out: String,
    indent: usize,
}

impl Emitter {
    fn line_start(&mut self) {
        for _ in 0..self.indent {
            self.out.push_str("  ");
        }
    }

    fn line_end(&mut self) {
        self.out.push('\n');
    }

    fn block(&mut self, block: &Block) {
        for statement in &block.statements {
            self.statement(statement);
        }
    }

    fn statement(&mut self, statement: &Statement) {
        match statement {
            Statement::Empty => {}
            Statement::Interface(_) => {}
            Statement::Break => {
                self.line_start();
                self.out.push_str("break");
                self.line_end();
            }
            Statement::Goto(name) => {
                self.line_start();
                self.out.push_str("goto ");
                self.out.push_str(name);
                self.line_end();
            }
            Statement::Label(name) => {
                self.line_start();
                self.out.push_str("::");
                self.out.push_str(name);
                self.out.push_str("::");
                self.line_end();
            }
            Statement::Assign(assign) => {
                self.line_start();
                self.expression_list(&assign.targets);
                self.out.push_str(" = ");
                self.expression_list(&assign.values);
                self.line_end();
            }
            Statement::Call(expr) => {
                self.line_start();
                self.expression(expr);
                self.line_end();
            }
            Statement::Do(body) => {
                self.line_start();
                self.out.push_str("do");
                self.line_end();
                self.indented(body);
                self.line_start();
                self.out.push_str("end");
                self.line_end();
            }
            Statement::While(stmt) => {
                self.line_start();
                self.out.push_str("while ");
                self.expression(&stmt.condition);
                self.out.push_str(" do");
                self.line_end();
                self.indented(&stmt.body);
                self.line_start();
                self.out.push_str("end");
                self.line_end();
            }
            Statement::Repeat(stmt) => {
                self.line_start();
                self.out.push_str("repeat");
                self.line_end();
                self.indented(&stmt.body);
                self.line_start();
                self.out.push_str("until ");
                self.expression(&stmt.until);
                self.line_end();
            }
            Statement::If(stmt) => {
                self.line_start();
                self.out.push_str("if ");
                self.expression(&stmt.condition);
                self.out.push_str(" then");
                self.line_end();
                self.indented(&stmt.body);
                for elseif in &stmt.elseifs {
                    self.line_start();
                    self.out.push_str("elseif ");
                    self.expression(&elseif.condition);
                    self.out.push_str(" then");
                    self.line_end();
                    self.indented(&elseif.body);
                }
                if let Some(else_body) = &stmt.else_body {
                    self.line_start();
                    self.out.push_str("else");
                    self.line_end();
                    self.indented(else_body);
                }
                self.line_start();
                self.out.push_str("end");
                self.line_end();
            }
            Statement::NumericFor(stmt) => {
                self.line_start();
                self.out.push_str("for ");
                self.out.push_str(&stmt.name);
                self.out.push_str(" = ");
                self.expression(&stmt.start);
                self.out.push_str(", ");
                self.expression(&stmt.limit);
                if let Some(step) = &stmt.step {
                    self.out.push_str(", ");
                    self.expression(step);
                }
                self.out.push_str(" do");
                self.line_end();
                self.indented(&stmt.body);
                self.line_start();
                self.out.push_str("end");
                self.line_end();
            }
            Statement::GenericFor(stmt) => {
                self.line_start();
                self.out.push_str("for ");
                for (i, name) in stmt.names.iter().enumerate() {
                    if i > 0 {
                        self.out.push_str(", ");
                    }
                    self.out.push_str(&name.name);
                }
                self.out.push_str(" in ");
                self.expression_list(&stmt.exprs);
                self.out.push_str(" do");
                self.line_end();
                self.indented(&stmt.body);
                self.line_start();
                self.out.push_str("end");
                self.line_end();
            }
            Statement::Function(stmt) => {
                self.line_start();
                self.out.push_str("function ");
                self.expression(&stmt.target);
                if let Some((method, _)) = &stmt.method {
                    self.out.push(':');
                    self.out.push_str(method);
                }
                self.function_tail(&stmt.body);
            }
            Statement::LocalFunction(stmt) => {
                self.line_start();
                self.out.push_str("local function ");
                self.out.push_str(&stmt.name);
                self.function_tail(&stmt.body);
            }
            Statement::Local(stmt) => {
                self.line_start();
                self.out.push_str("local ");
                for (i, name) in stmt.names.iter().enumerate() {
                    if i > 0 {
                        self.out.push_str(", ");
                    }
                    self.out.push_str(&name.name);
                }
                if !stmt.exprs.is_empty() {
                    self.out.push_str(" = ");
                    self.expression_list(&stmt.exprs);
                }
                self.line_end();
            }
            Statement::Global(stmt) => {
                // A bare declaration only affects the type environment.
                if stmt.exprs.is_empty() {
                    return;
                }
                self.line_start();
                for (i, name) in stmt.names.iter().enumerate() {
                    if i > 0 {
                        self.out.push_str(", ");
                    }
                    self.out.push_str(&name.name);
                }
                self.out.push_str(" = ");
                self.expression_list(&stmt.exprs);
                self.line_end();
            }
            Statement::Return(stmt) => {
                self.line_start();
                self.out.push_str("return");
                if !stmt.exprs.is_empty() {
                    self.out.push(' ');
                    self.expression_list(&stmt.exprs);
                }
                self.line_end();
            }
        }
    }

    fn indented(&mut self, block: &Block) {
        self.indent += 1;
        self.block(block);
        self.indent -= 1;
    }

    fn function_tail(&mut self, body: &FunctionBody) {
        self.out.push('(');
        for (i, param) in body.params.iter().enumerate() {
            if i > 0 {
                self.out.push_str(", ");
            }
            self.out.push_str(&param.name);
        }
        if body.variadic {
            if !body.params.is_empty() {
                self.out.push_str(", ");
            }
            self.out.push_str("...");
        }
        self.out.push(')');
        self.line_end();
        self.indented(&body.block);
        self.line_start();
        self.out.push_str("end");
        self.line_end();
    }

    fn expression_list(&mut self, exprs: &[Expression]) {
        for (i, expr) in exprs.iter().enumerate() {
            if i > 0 {
                self.out.push_str(", ");
            }
            self.expression(expr);
        }
    }

    fn expression(&mut self, expr: &Expression) {
        match &expr.kind {
            ExpressionKind::Nil => self.out.push_str("nil"),
            ExpressionKind::True => self.out.push_str("true"),
            ExpressionKind::False => self.out.push_str("false"),
            ExpressionKind::Number(literal) => self.out.push_str(&literal.lexeme),
            ExpressionKind::String(literal) => self.out.push_str(&literal.lexeme),
            ExpressionKind::Dots => self.out.push_str("..."),
            ExpressionKind::Name(name) => self.out.push_str(name),
            ExpressionKind::Field { prefix, name } => {
                self.prefix_expression(prefix);
                self.out.push('.');
                self.out.push_str(name);
            }
            ExpressionKind::Index { prefix, key } => {
                self.prefix_expression(prefix);
                self.out.push('[');
                self.expression(key);
                self.out.push(']');
            }
            ExpressionKind::Call { prefix, args } => {
                self.prefix_expression(prefix);
                self.out.push('(');
                self.expression_list(args);
                self.out.push(')');
            }
            ExpressionKind::MethodCall { prefix, name, args } => {
                self.prefix_expression(prefix);
                self.out.push(':');
                self.out.push_str(name);
                self.out.push('(');
                self.expression_list(args);
                self.out.push(')');
            }
            ExpressionKind::Function(body) => {
                self.out.push_str("function(");
                for (i, param) in body.params.iter().enumerate() {
                    if i > 0 {
                        self.out.push_str(", ");
                    }
                    self.out.push_str(&param.name);
                }
                if body.variadic {
                    if !body.params.is_empty() {
                        self.out.push_str(", ");
                    }
                    self.out.push_str("...");
                }
                self.out.push(')');
                self.line_end();
                self.indented(&body.block);
                self.line_start();
                self.out.push_str("end");
            }
            ExpressionKind::Table(fields) => {
                self.out.push('{');
                for (i, field) in fields.iter().enumerate() {
                    if i > 0 {
                        self.out.push_str(", ");
                    }
                    match field {
                        TableField::Item(value) => self.expression(value),
                        TableField::Named { key, value, .. } => {
                            self.out.push_str(key);
                            self.out.push_str(" = ");
                            self.expression(value);
                        }
                        TableField::Keyed { key, value } => {
                            self.out.push('[');
                            self.expression(key);
                            self.out.push_str("] = ");
                            self.expression(value);
                        }
                    }
                }
                self.out.push('}');
            }
            ExpressionKind::Binary { op, left, right } => {
                self.out.push('(');
                self.expression(left);
                self.out.push(' ');
                self.out.push_str(binary_op_token(*op));
                self.out.push(' ');
                self.expression(right);
                self.out.push(')');
            }
            ExpressionKind::Unary { op, operand } => {
                self.out.push('(');
                self.out.push_str(unary_op_token(*op));
                self.out.push(' ');
                self.expression(operand);
                self.out.push(')');
            }
        }
    }

    /// Call and index prefixes that are not plain names need parentheses
    /// to stay syntactically valid.
    fn prefix_expression(&mut self, expr: &Expression) {
        match &expr.kind {
            ExpressionKind::Name(_)
            | ExpressionKind::Field { .. }
            | ExpressionKind::Index { .. }
            | ExpressionKind::Call { .. }
            | ExpressionKind::MethodCall { .. } => self.expression(expr),
            _ => {
                self.out.push('(');
                self.expression(expr);
                self.out.push(')');
            }
        }
    }
}

fn binary_op_token(op: BinaryOp) -> &'static str {
    match op {
        BinaryOp::Or => "or",
        BinaryOp::And => "and",
        BinaryOp::Less => "<",
        BinaryOp::Greater => ">",
        BinaryOp::LessEq => "<=",
        BinaryOp::GreaterEq => ">=",
        BinaryOp::NotEq => "~=",
        BinaryOp::Eq => "==",
        BinaryOp::BitOr => "|",
        BinaryOp::BitXor => "~",
        BinaryOp::BitAnd => "&",
        BinaryOp::Shl => "<<",
        BinaryOp::Shr => ">>",
        BinaryOp::Concat => "..",
        BinaryOp::Add => "+",
        BinaryOp::Sub => "-",
        BinaryOp::Mul => "*",
        BinaryOp::Div => "/",
        BinaryOp::IDiv => "//",
        BinaryOp::Mod => "%",
        BinaryOp::Pow => "^",
    }
}

fn unary_op_token(op: UnaryOp) -> &'static str {
    match op {
        UnaryOp::Not => "not",
        UnaryOp::Len => "#",
        UnaryOp::Neg => "-",
        UnaryOp::BitNot => "~",
    }
}
