use std::collections::HashMap;
use std::rc::Rc;

use crate::access::PackageTypeFn;
use crate::types::{union, Primitive, Type, TypeTable};

/// Whether `...` is usable in a scope: inherited from the enclosing
/// scope, disabled by a non-variadic function, or owned with a type.
#[derive(Debug, Clone, Default)]
pub enum DotsState {
    #[default]
    Inherit,
    None,
    Own(Type),
}

/// How `return` statements are judged: inherited, checked against a
/// declared type, or accumulated by union for deduction.
#[derive(Debug, Clone, Default)]
pub enum ReturnState {
    #[default]
    Inherit,
    Fixed(Type),
    Deduce(Option<Type>),
}

#[derive(Debug, Default)]
struct ScopeFrame {
    names: HashMap<String, Type>,
    aliases: HashMap<String, Type>,
    dots: DotsState,
    returns: ReturnState,
}

/// Lexically nested environment binding names to types and names to type
/// aliases. Frames form a stack matching lexical blocks; the bottom frame
/// is the root scope, which additionally owns the primitive metatable map
/// and the `require` type resolver.
pub struct ScopeStack {
    frames: Vec<ScopeFrame>,
    metatables: HashMap<Primitive, Type>,
    package_resolver: Option<Rc<PackageTypeFn>>,
}

impl ScopeStack {
    pub fn new() -> Self {
        let root = ScopeFrame {
            // The main chunk of a program is variadic.
            dots: DotsState::Own(Type::tuple(Vec::new(), true)),
            ..ScopeFrame::default()
        };
        Self {
            frames: vec![root],
            metatables: HashMap::new(),
            package_resolver: None,
        }
    }

    pub fn push(&mut self) {
        self.frames.push(ScopeFrame::default());
    }

    pub fn pop(&mut self) {
        if self.frames.len() > 1 {
            self.frames.pop();
        }
    }

    pub fn lookup(&self, name: &str) -> Option<Type> {
        self.frames
            .iter()
            .rev()
            .find_map(|frame| frame.names.get(name).cloned())
    }

    pub fn bind<S: Into<String>>(&mut self, name: S, ty: Type) {
        if let Some(frame) = self.frames.last_mut() {
            frame.names.insert(name.into(), ty);
        }
    }

    pub fn bind_global<S: Into<String>>(&mut self, name: S, ty: Type) {
        if let Some(frame) = self.frames.first_mut() {
            frame.names.insert(name.into(), ty);
        }
    }

    pub fn lookup_alias(&self, name: &str) -> Option<Type> {
        self.frames
            .iter()
            .rev()
            .find_map(|frame| frame.aliases.get(name).cloned())
    }

    pub fn bind_alias<S: Into<String>>(&mut self, name: S, ty: Type) {
        if let Some(frame) = self.frames.last_mut() {
            frame.aliases.insert(name.into(), ty);
        }
    }

    /// Seed the alias map with the built-in type names.
    pub fn enable_basic_types(&mut self) {
        self.bind_alias("void", Type::Void);
        self.bind_alias("any", Type::Any);
        self.bind_alias("nil", Type::Primitive(Primitive::Nil));
        self.bind_alias("number", Type::Primitive(Primitive::Number));
        self.bind_alias("string", Type::Primitive(Primitive::String));
        self.bind_alias("boolean", Type::Primitive(Primitive::Boolean));
        self.bind_alias("thread", Type::Primitive(Primitive::Thread));
    }

    pub fn dots_type(&self) -> Option<Type> {
        for frame in self.frames.iter().rev() {
            match &frame.dots {
                DotsState::Inherit => continue,
                DotsState::None => return None,
                DotsState::Own(ty) => return Some(ty.clone()),
            }
        }
        None
    }

    pub fn set_dots(&mut self, ty: Type) {
        if let Some(frame) = self.frames.last_mut() {
            frame.dots = DotsState::Own(ty);
        }
    }

    pub fn disable_dots(&mut self) {
        if let Some(frame) = self.frames.last_mut() {
            frame.dots = DotsState::None;
        }
    }

    /// The declared return type to check against, if the nearest
    /// return-owning scope is fixed rather than deducing.
    pub fn fixed_return_type(&self) -> Option<Type> {
        for frame in self.frames.iter().rev() {
            match &frame.returns {
                ReturnState::Inherit => continue,
                ReturnState::Fixed(ty) => return Some(ty.clone()),
                ReturnState::Deduce(_) => return None,
            }
        }
        None
    }

    /// Widen the nearest deducing scope's return type by union.
    pub fn add_return(&mut self, table: &TypeTable, ty: Type) {
        for frame in self.frames.iter_mut().rev() {
            match &mut frame.returns {
                ReturnState::Inherit => continue,
                ReturnState::Fixed(_) => return,
                ReturnState::Deduce(current) => {
                    *current = Some(match current.take() {
                        Some(existing) => union(table, &existing, &ty),
                        None => ty,
                    });
                    return;
                }
            }
        }
    }

    pub fn set_fixed_return(&mut self, ty: Type) {
        if let Some(frame) = self.frames.last_mut() {
            frame.returns = ReturnState::Fixed(ty);
        }
    }

    pub fn deduce_return(&mut self) {
        if let Some(frame) = self.frames.last_mut() {
            frame.returns = ReturnState::Deduce(None);
        }
    }

    /// The return type deduced by the current frame, if any.
    pub fn deduced_return(&self) -> Option<Type> {
        match self.frames.last().map(|frame| &frame.returns) {
            Some(ReturnState::Deduce(ty)) => ty.clone(),
            _ => None,
        }
    }

    pub fn set_metatable(&mut self, primitive: Primitive, ty: Type) {
        self.metatables.insert(primitive, ty);
    }

    pub fn metatables(&self) -> &HashMap<Primitive, Type> {
        &self.metatables
    }

    pub fn set_package_resolver(&mut self, resolver: Rc<PackageTypeFn>) {
        self.package_resolver = Some(resolver);
    }

    pub fn package_resolver(&self) -> Option<Rc<PackageTypeFn>> {
        self.package_resolver.clone()
    }
}

impl Default for ScopeStack {
    fn default() -> Self {
        Self::new()
    }
}
