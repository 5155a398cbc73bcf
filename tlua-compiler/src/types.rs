use std::cell::RefCell;
use std::collections::HashSet;

use crate::access::apply_genparams;
use crate::assign::is_assignable;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Primitive {
    Nil,
    Number,
    String,
    Boolean,
    Thread,
}

/// Integer and float payloads stay distinct: the literal `3` and the
/// literal `3.0` are different types.
#[derive(Debug, Clone, Copy)]
pub enum NumberRep {
    Integer(i64),
    Float(f64),
}

impl PartialEq for NumberRep {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (NumberRep::Integer(a), NumberRep::Integer(b)) => a == b,
            (NumberRep::Float(a), NumberRep::Float(b)) => a == b,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum LiteralValue {
    Boolean(bool),
    Number(NumberRep),
    String(String),
}

impl LiteralValue {
    pub fn primitive(&self) -> Primitive {
        match self {
            LiteralValue::Boolean(_) => Primitive::Boolean,
            LiteralValue::Number(_) => Primitive::Number,
            LiteralValue::String(_) => Primitive::String,
        }
    }
}

/// Index into the deferred type table. Ids are never re-used and entries
/// are never relocated, so a `DeferId` stays valid for the table's
/// lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeferId(pub usize);

#[derive(Debug, Clone, PartialEq)]
pub struct NameType {
    pub name: String,
    pub ty: Type,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionType {
    pub genparams: Vec<NameType>,
    pub nominals: Vec<DeferId>,
    pub params: Vec<Type>,
    pub ret: Box<Type>,
    pub variadic: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TupleType {
    pub types: Vec<Type>,
    pub variadic: bool,
}

#[derive(Debug, Clone)]
pub struct SumType {
    pub types: Vec<Type>,
}

impl PartialEq for SumType {
    // Members are an unordered set.
    fn eq(&self, other: &Self) -> bool {
        self.types.len() == other.types.len()
            && self
                .types
                .iter()
                .all(|member| other.types.iter().any(|candidate| candidate == member))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProductType {
    pub types: Vec<Type>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct KeyValPair {
    pub key: Type,
    pub val: Type,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TableType {
    pub indexes: Vec<KeyValPair>,
    pub fields: Vec<NameType>,
}

impl TableType {
    pub fn field(&self, name: &str) -> Option<&NameType> {
        self.fields.iter().find(|field| field.name == name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeferredType {
    pub id: DeferId,
    pub args: Vec<Type>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Type {
    Void,
    Any,
    Primitive(Primitive),
    Literal(LiteralValue),
    Function(FunctionType),
    Tuple(TupleType),
    Sum(SumType),
    Product(ProductType),
    Table(TableType),
    Deferred(DeferredType),
    Nominal(DeferId),
    Require(Box<Type>),
}

impl Type {
    pub fn literal_bool(value: bool) -> Type {
        Type::Literal(LiteralValue::Boolean(value))
    }

    pub fn literal_number(value: NumberRep) -> Type {
        Type::Literal(LiteralValue::Number(value))
    }

    pub fn literal_string<S: Into<String>>(value: S) -> Type {
        Type::Literal(LiteralValue::String(value.into()))
    }

    pub fn deferred(id: DeferId) -> Type {
        Type::Deferred(DeferredType {
            id,
            args: Vec::new(),
        })
    }

    pub fn tuple(types: Vec<Type>, variadic: bool) -> Type {
        Type::Tuple(TupleType { types, variadic })
    }

    /// Collapse a multi-value result: one value is just that value, any
    /// other count is a tuple.
    pub fn reduced_tuple(mut types: Vec<Type>) -> Type {
        if types.len() == 1 {
            types.pop().unwrap_or(Type::Void)
        } else {
            Type::tuple(types, false)
        }
    }

    pub fn table(indexes: Vec<KeyValPair>, fields: Vec<NameType>) -> Type {
        Type::Table(TableType { indexes, fields })
    }
}

#[derive(Debug, Clone)]
struct Entry {
    name: String,
    ty: Type,
    nominals: Vec<DeferId>,
    narrowing: bool,
}

/// Append-only table of named, lazily-resolved types. Entries back
/// interface declarations, generic parameter nominals, and the
/// provisional types of inferred locals. The table is shared by every
/// session of a checking run, so lookups go through `&self` and entry
/// types may be rewritten in place while narrowing.
#[derive(Debug, Default)]
pub struct TypeTable {
    entries: RefCell<Vec<Entry>>,
}

impl TypeTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reserve<S: Into<String>>(&self, name: S) -> DeferId {
        self.reserve_entry(name.into(), false)
    }

    pub fn reserve_narrowing<S: Into<String>>(&self, name: S) -> DeferId {
        self.reserve_entry(name.into(), true)
    }

    fn reserve_entry(&self, name: String, narrowing: bool) -> DeferId {
        let mut entries = self.entries.borrow_mut();
        entries.push(Entry {
            name,
            ty: Type::Void,
            nominals: Vec::new(),
            narrowing,
        });
        DeferId(entries.len() - 1)
    }

    pub fn set(&self, id: DeferId, ty: Type) {
        self.entries.borrow_mut()[id.0].ty = ty;
    }

    pub fn set_nominals(&self, id: DeferId, nominals: Vec<DeferId>) {
        self.entries.borrow_mut()[id.0].nominals = nominals;
    }

    pub fn get(&self, id: DeferId) -> Type {
        self.entries.borrow()[id.0].ty.clone()
    }

    pub fn name(&self, id: DeferId) -> String {
        self.entries.borrow()[id.0].name.clone()
    }

    pub fn nominals(&self, id: DeferId) -> Vec<DeferId> {
        self.entries.borrow()[id.0].nominals.clone()
    }

    pub fn is_narrowing(&self, id: DeferId) -> bool {
        self.entries.borrow()[id.0].narrowing
    }

    /// Resolve a deferred reference, substituting type arguments through
    /// the entry's nominal ids when present.
    pub fn resolve(&self, deferred: &DeferredType) -> Type {
        let ty = self.get(deferred.id);
        if deferred.args.is_empty() {
            return ty;
        }
        let nominals = self.nominals(deferred.id);
        let inferred: Vec<Option<Type>> = deferred.args.iter().cloned().map(Some).collect();
        apply_genparams(self, &inferred, &nominals, None, &ty)
    }
}

/// Union `A | B`: the smallest sum covering both sides.
pub fn union(table: &TypeTable, lhs: &Type, rhs: &Type) -> Type {
    if matches!(lhs, Type::Any) || matches!(rhs, Type::Any) {
        return Type::Any;
    }
    if is_assignable(table, lhs, rhs).yes {
        return lhs.clone();
    }

    let mut members = flatten_sum(lhs);
    for member in flatten_sum(rhs) {
        if members
            .iter()
            .any(|existing| is_assignable(table, existing, &member).yes)
        {
            continue;
        }
        members.retain(|existing| !is_assignable(table, &member, existing).yes);
        members.push(member);
    }

    match members.len() {
        0 => Type::Void,
        1 => members.pop().unwrap_or(Type::Void),
        _ => Type::Sum(SumType { types: members }),
    }
}

fn flatten_sum(ty: &Type) -> Vec<Type> {
    match ty {
        Type::Void => Vec::new(),
        Type::Sum(sum) => sum.types.clone(),
        other => vec![other.clone()],
    }
}

/// Intersection `A & B`: a narrowed type when one side subsumes the
/// other, otherwise a product of both sides' components.
pub fn intersect(table: &TypeTable, lhs: &Type, rhs: &Type) -> Type {
    if is_assignable(table, lhs, rhs).yes {
        return rhs.clone();
    }
    if is_assignable(table, rhs, lhs).yes {
        return lhs.clone();
    }

    if let Type::Sum(sum) = lhs {
        return sum
            .types
            .iter()
            .map(|member| intersect(table, member, rhs))
            .fold(Type::Void, |acc, ty| union(table, &acc, &ty));
    }
    if let Type::Sum(sum) = rhs {
        return sum
            .types
            .iter()
            .map(|member| intersect(table, lhs, member))
            .fold(Type::Void, |acc, ty| union(table, &acc, &ty));
    }

    let mut types = flatten_product(lhs);
    types.extend(flatten_product(rhs));
    Type::Product(ProductType { types })
}

fn flatten_product(ty: &Type) -> Vec<Type> {
    match ty {
        Type::Product(product) => product.types.clone(),
        other => vec![other.clone()],
    }
}

/// Difference `A - B`: the narrowing operator.
pub fn difference(table: &TypeTable, lhs: &Type, rhs: &Type) -> Type {
    if let Type::Sum(sum) = lhs {
        let mut members: Vec<Type> = Vec::new();
        for member in &sum.types {
            match difference(table, member, rhs) {
                Type::Void => {}
                reduced => members.push(reduced),
            }
        }
        return match members.len() {
            0 => Type::Void,
            1 => members.pop().unwrap_or(Type::Void),
            _ => Type::Sum(SumType { types: members }),
        };
    }

    if let Type::Sum(sum) = rhs {
        let mut reduced = lhs.clone();
        for member in &sum.types {
            reduced = difference(table, &reduced, member);
        }
        return reduced;
    }

    // Subtracting a covering type leaves nothing. `any` is only covered
    // by `any` itself, not by the types it happens to flow into.
    match (lhs, rhs) {
        (Type::Any, Type::Any) => return Type::Void,
        (Type::Any, _) => return Type::Any,
        _ => {
            if is_assignable(table, rhs, lhs).yes {
                return Type::Void;
            }
        }
    }

    match (lhs, rhs) {
        (Type::Primitive(Primitive::Boolean), Type::Literal(LiteralValue::Boolean(value))) => {
            Type::literal_bool(!value)
        }
        _ => lhs.clone(),
    }
}

/// Replace or append a table field whose value widens to `old | ty`.
pub fn narrow_field(table: &TypeTable, tbl: &TableType, name: &str, ty: &Type) -> Type {
    let mut fields = tbl.fields.clone();
    if let Some(field) = fields.iter_mut().find(|field| field.name == name) {
        field.ty = union(table, &field.ty, ty);
    } else {
        fields.push(NameType {
            name: name.to_string(),
            ty: ty.clone(),
        });
    }
    Type::Table(TableType {
        indexes: tbl.indexes.clone(),
        fields,
    })
}

/// Replace or append a table index whose value widens to `old | ty`.
pub fn narrow_index(table: &TypeTable, tbl: &TableType, key: &Type, ty: &Type) -> Type {
    let mut indexes = tbl.indexes.clone();
    if let Some(index) = indexes
        .iter_mut()
        .find(|index| is_assignable(table, &index.key, key).yes)
    {
        index.val = union(table, &index.val, ty);
    } else {
        indexes.push(KeyValPair {
            key: key.clone(),
            val: ty.clone(),
        });
    }
    Type::Table(TableType {
        indexes,
        fields: tbl.fields.clone(),
    })
}

struct TypePrinter<'a> {
    table: &'a TypeTable,
    queue: Vec<DeferId>,
    seen: HashSet<DeferId>,
}

impl<'a> TypePrinter<'a> {
    fn print(&mut self, ty: &Type) -> String {
        match ty {
            Type::Void => "void".to_string(),
            Type::Any => "any".to_string(),
            Type::Primitive(primitive) => print_primitive(*primitive).to_string(),
            Type::Literal(value) => self.print_literal(value),
            Type::Function(function) => self.print_function(function),
            Type::Tuple(tuple) => self.print_tuple(tuple),
            Type::Sum(sum) => self.print_joined(&sum.types, "|"),
            Type::Product(product) => self.print_joined(&product.types, "&"),
            Type::Table(tbl) => self.print_table(tbl),
            Type::Deferred(deferred) => self.print_deferred(deferred),
            Type::Nominal(id) => self.table.name(*id),
            Type::Require(basis) => format!("$require({})", self.print(basis)),
        }
    }

    fn print_literal(&mut self, value: &LiteralValue) -> String {
        match value {
            LiteralValue::Boolean(true) => "true".to_string(),
            LiteralValue::Boolean(false) => "false".to_string(),
            LiteralValue::Number(NumberRep::Integer(value)) => value.to_string(),
            LiteralValue::Number(NumberRep::Float(value)) => value.to_string(),
            LiteralValue::String(value) => format!("'{value}'"),
        }
    }

    fn print_function(&mut self, function: &FunctionType) -> String {
        let mut out = String::new();
        if !function.genparams.is_empty() {
            out.push('<');
            for (i, genparam) in function.genparams.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&genparam.name);
                out.push(':');
                out.push_str(&self.print(&genparam.ty));
            }
            out.push('>');
        }
        out.push('(');
        for (i, param) in function.params.iter().enumerate() {
            if i > 0 {
                out.push(',');
            }
            out.push(':');
            out.push_str(&self.print(param));
        }
        if function.variadic {
            if !function.params.is_empty() {
                out.push(',');
            }
            out.push_str("...");
        }
        out.push_str("):");
        out.push_str(&self.print(&function.ret));
        out
    }

    fn print_tuple(&mut self, tuple: &TupleType) -> String {
        let mut out = String::from("[");
        for (i, ty) in tuple.types.iter().enumerate() {
            if i > 0 {
                out.push(',');
            }
            out.push_str(&self.print(ty));
        }
        if tuple.variadic {
            if !tuple.types.is_empty() {
                out.push(',');
            }
            out.push_str("...");
        }
        out.push(']');
        out
    }

    fn print_joined(&mut self, types: &[Type], separator: &str) -> String {
        let mut out = String::new();
        for (i, ty) in types.iter().enumerate() {
            if i > 0 {
                out.push_str(separator);
            }
            out.push_str(&self.print(ty));
        }
        out
    }

    fn print_table(&mut self, tbl: &TableType) -> String {
        let mut out = String::from("{");
        let mut first = true;
        for index in &tbl.indexes {
            if !first {
                out.push(';');
            }
            out.push('[');
            out.push_str(&self.print(&index.key));
            out.push_str("]:");
            out.push_str(&self.print(&index.val));
            first = false;
        }
        for field in &tbl.fields {
            if !first {
                out.push(';');
            }
            out.push_str(&field.name);
            out.push(':');
            out.push_str(&self.print(&field.ty));
            first = false;
        }
        out.push('}');
        out
    }

    fn print_deferred(&mut self, deferred: &DeferredType) -> String {
        if !self.seen.contains(&deferred.id) && !self.queue.contains(&deferred.id) {
            self.queue.push(deferred.id);
        }
        let mut out = self.table.name(deferred.id);
        if !deferred.args.is_empty() {
            out.push('<');
            for (i, arg) in deferred.args.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&self.print(arg));
            }
            out.push('>');
        }
        out
    }
}

fn print_primitive(primitive: Primitive) -> &'static str {
    match primitive {
        Primitive::Nil => "nil",
        Primitive::Number => "number",
        Primitive::String => "string",
        Primitive::Boolean => "boolean",
        Primitive::Thread => "thread",
    }
}

/// Render a type for diagnostics. Deferred types print by name, followed
/// by a `with name:body` trailer for each distinct entry encountered.
pub fn describe(table: &TypeTable, ty: &Type) -> String {
    let mut printer = TypePrinter {
        table,
        queue: Vec::new(),
        seen: HashSet::new(),
    };

    let mut result = printer.print(ty);

    while let Some(id) = printer.queue.pop() {
        printer.seen.insert(id);
        let body = table.get(id);
        result += &format!(" with {}:{}", table.name(id), printer.print(&body));
    }

    result
}

/// Normalize a quoted string lexeme to canonical single-quote contents,
/// so `"a"` and `'a'` denote the same literal string type.
pub fn normalize_quotes(lexeme: &str) -> String {
    let bytes = lexeme.as_bytes();
    if bytes.len() < 2 {
        return String::new();
    }

    let escape_quotes = bytes[0] == b'"';
    let mut out: Vec<u8> = Vec::with_capacity(bytes.len() - 2);

    let mut i = 1;
    while i < bytes.len() - 1 {
        let c = bytes[i];
        if escape_quotes {
            match c {
                b'\'' => out.extend_from_slice(b"\\'"),
                b'\\' => {
                    i += 1;
                    let c = bytes[i];
                    match c {
                        b'"' => out.push(b'"'),
                        _ => {
                            out.push(b'\\');
                            out.push(c);
                        }
                    }
                }
                _ => out.push(c),
            }
        } else {
            match c {
                b'\\' => {
                    i += 1;
                    let c = bytes[i];
                    match c {
                        b'"' => out.push(c),
                        _ => {
                            out.push(b'\\');
                            out.push(c);
                        }
                    }
                }
                _ => out.push(c),
            }
        }
        i += 1;
    }

    String::from_utf8_lossy(&out).into_owned()
}
