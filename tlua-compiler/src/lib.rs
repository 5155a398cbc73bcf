mod access;
mod assign;
mod ast;
mod checker;
mod compiler;
mod diagnostics;
mod emitter;
mod lexer;
mod modules;
mod parser;
mod scope;
mod source;
mod stdlib;
mod types;

pub use crate::access::{
    apply_genparams, check_param, field_of, index_of, resolve_overload, return_of, PackageTypeFn,
};
pub use crate::assign::{is_assignable, AssignResult};
pub use crate::ast::{
    AssignStatement, BinaryOp, Block, ElseIf, Expression, ExpressionKind, FunctionBody,
    FunctionStatement, FunctionTypeExpr, GenericForStatement, GlobalStatement, IfStatement,
    InterfaceStatement, LocalFunctionStatement, LocalStatement, NameDecl, NumberLiteral,
    NumericForStatement, RepeatStatement, ReturnStatement, SourceSpan, Statement, StringLiteral,
    TableField, TypeExpr, TypeExprKind, TypeField, TypeParam, UnaryOp, WhileStatement,
};
pub use crate::checker::Checker;
pub use crate::compiler::{Compilation, CompileOptions, Compiler};
pub use crate::diagnostics::{Diagnostic, Diagnostics, Severity};
pub use crate::emitter::emit;
pub use crate::lexer::{Keyword, Lexer, LexerError, Token, TokenKind};
pub use crate::modules::ModuleResolver;
pub use crate::parser::Parser;
pub use crate::scope::{DotsState, ReturnState, ScopeStack};
pub use crate::source::SourceFile;
pub use crate::stdlib::{
    import_all, import_basic, import_io, import_math, import_package, import_string, import_table,
};
pub use crate::types::{
    describe, difference, intersect, narrow_field, narrow_index, normalize_quotes, union, DeferId,
    DeferredType, FunctionType, KeyValPair, LiteralValue, NameType, NumberRep, Primitive,
    ProductType, SumType, TableType, TupleType, Type, TypeTable,
};
