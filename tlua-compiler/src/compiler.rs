use std::path::PathBuf;
use std::rc::Rc;

use anyhow::{bail, Result};

use crate::ast::{Block, SourceSpan};
use crate::checker::Checker;
use crate::diagnostics::Diagnostics;
use crate::emitter::emit;
use crate::lexer::Lexer;
use crate::modules::ModuleResolver;
use crate::parser::Parser;
use crate::scope::ScopeStack;
use crate::source::SourceFile;
use crate::stdlib;
use crate::types::{Type, TypeTable};

#[derive(Debug, Clone)]
pub struct CompileOptions {
    /// Seed the root scope with the base library declarations.
    pub stdlib: bool,
    /// Directories searched for `require`d module sources.
    pub module_roots: Vec<PathBuf>,
    /// Print the token stream before parsing.
    pub dump_tokens: bool,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            stdlib: true,
            module_roots: Vec::new(),
            dump_tokens: false,
        }
    }
}

pub struct Compilation {
    pub chunk: Block,
    pub new_source: String,
    /// The chunk's deduced top-level return type.
    pub return_type: Type,
}

/// The compile driver: lexer, parser, checker, and emitter wired in
/// sequence. The root scope and deferred type table persist across
/// `compile` calls, so globals declared by one unit stay visible to the
/// next.
pub struct Compiler {
    table: Rc<TypeTable>,
    scopes: ScopeStack,
    diagnostics: Diagnostics,
    dump_tokens: bool,
}

impl Compiler {
    pub fn new(options: CompileOptions) -> Result<Self> {
        let table = Rc::new(TypeTable::new());

        let mut scopes = ScopeStack::new();
        scopes.enable_basic_types();
        if options.stdlib {
            stdlib::import_all(&mut scopes, &table)?;
        }
        if !options.module_roots.is_empty() {
            let resolver = ModuleResolver::new(options.module_roots.clone(), options.stdlib);
            scopes.set_package_resolver(resolver.as_package_type_fn(&table));
        }

        Ok(Self {
            table,
            scopes,
            diagnostics: Diagnostics::new(),
            dump_tokens: options.dump_tokens,
        })
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    pub fn compile(&mut self, source: &SourceFile) -> Result<Compilation> {
        let tokens = match Lexer::new(source).tokenize() {
            Ok(tokens) => tokens,
            Err(err) => {
                let span = SourceSpan::single_point(err.line(), err.column());
                self.diagnostics.error(err.to_string(), span);
                bail!("Lexing failed");
            }
        };

        if self.dump_tokens {
            for token in &tokens {
                println!("{token:?}");
            }
        }

        let mut parser = Parser::new(source, tokens);
        let parse_result = parser.parse();
        self.diagnostics.extend(parser.into_diagnostics());
        let chunk = match parse_result {
            Ok(chunk) => chunk,
            Err(err) => return Err(err),
        };

        let mut checker = Checker::new(&mut self.scopes, Rc::clone(&self.table));
        let return_type = checker.check_chunk(&chunk);
        let type_diagnostics = checker.into_diagnostics();
        let type_errors = type_diagnostics.has_errors();
        self.diagnostics.extend(type_diagnostics);
        if type_errors {
            bail!("Type checking failed");
        }

        let new_source = emit(&chunk);
        Ok(Compilation {
            chunk,
            new_source,
            return_type,
        })
    }
}
