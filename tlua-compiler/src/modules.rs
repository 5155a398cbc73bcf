use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::PathBuf;
use std::rc::Rc;

use crate::access::PackageTypeFn;
use crate::checker::Checker;
use crate::lexer::Lexer;
use crate::parser::Parser;
use crate::scope::ScopeStack;
use crate::source::SourceFile;
use crate::stdlib;
use crate::types::{Type, TypeTable};

/// Resolves `require("name")` call sites to module export types. A
/// module checks in a subordinate session that shares the deferred type
/// table but owns a fresh scope tree, so resolution never touches the
/// requesting session's scopes. Failures of any kind resolve to `any`.
pub struct ModuleResolver {
    roots: Vec<PathBuf>,
    stdlib: bool,
    in_progress: RefCell<HashSet<String>>,
    cache: RefCell<HashMap<String, Type>>,
}

impl ModuleResolver {
    pub fn new(roots: Vec<PathBuf>, stdlib: bool) -> Rc<Self> {
        Rc::new(Self {
            roots,
            stdlib,
            in_progress: RefCell::new(HashSet::new()),
            cache: RefCell::new(HashMap::new()),
        })
    }

    /// Package the resolver as the root-scope callback.
    pub fn as_package_type_fn(self: &Rc<Self>, table: &Rc<TypeTable>) -> Rc<PackageTypeFn> {
        let resolver = Rc::clone(self);
        let table = Rc::clone(table);
        Rc::new(move |name: &str| resolver.module_type(&table, name))
    }

    fn module_type(self: &Rc<Self>, table: &Rc<TypeTable>, name: &str) -> Type {
        if let Some(cached) = self.cache.borrow().get(name) {
            return cached.clone();
        }

        // Cyclic requires bottom out at `any`.
        if !self.in_progress.borrow_mut().insert(name.to_string()) {
            return Type::Any;
        }

        let result = self.check_module(table, name).unwrap_or(Type::Any);

        self.in_progress.borrow_mut().remove(name);
        self.cache
            .borrow_mut()
            .insert(name.to_string(), result.clone());
        result
    }

    fn check_module(self: &Rc<Self>, table: &Rc<TypeTable>, name: &str) -> Option<Type> {
        let relative = PathBuf::from(name.replace('.', "/") + ".tlua");
        let path = self
            .roots
            .iter()
            .map(|root| root.join(&relative))
            .find(|candidate| candidate.is_file())?;
        let contents = fs::read_to_string(&path).ok()?;
        let file = SourceFile::from_path(&path, contents);

        let tokens = Lexer::new(&file).tokenize().ok()?;
        let mut parser = Parser::new(&file, tokens);
        let parse_result = parser.parse();
        if parser.into_diagnostics().has_errors() {
            return None;
        }
        let chunk = parse_result.ok()?;

        let mut scopes = ScopeStack::new();
        scopes.enable_basic_types();
        if self.stdlib {
            stdlib::import_all(&mut scopes, table).ok()?;
        }
        scopes.set_package_resolver(self.as_package_type_fn(table));

        let mut checker = Checker::new(&mut scopes, Rc::clone(table));
        let return_type = checker.check_chunk(&chunk);
        if checker.into_diagnostics().has_errors() {
            return None;
        }

        Some(return_type)
    }
}
