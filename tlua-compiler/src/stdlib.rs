use std::rc::Rc;

use anyhow::{anyhow, bail, Result};

use crate::checker::Checker;
use crate::lexer::Lexer;
use crate::parser::Parser;
use crate::scope::ScopeStack;
use crate::source::SourceFile;
use crate::types::{Primitive, TypeTable};

/// The base library surface is declared in the annotated dialect itself
/// and pushed through the regular parse+check pipeline into the root
/// scope. A failure here is a bug in the declarations, not user error.
fn import_source(
    scopes: &mut ScopeStack,
    table: &Rc<TypeTable>,
    name: &str,
    source: &str,
) -> Result<()> {
    let file = SourceFile::inline(name, source);
    let tokens = Lexer::new(&file)
        .tokenize()
        .map_err(|err| anyhow!("{name}: {err}"))?;
    let mut parser = Parser::new(&file, tokens);
    let block = parser
        .parse()
        .map_err(|err| anyhow!("{name}: {err}"))?;
    if parser.into_diagnostics().has_errors() {
        bail!("{name}: declarations failed to parse");
    }

    let mut checker = Checker::new(scopes, Rc::clone(table));
    checker.check_chunk(&block);
    let diagnostics = checker.into_diagnostics();
    if diagnostics.has_errors() {
        let messages: Vec<String> = diagnostics
            .entries()
            .iter()
            .map(|diagnostic| diagnostic.message.clone())
            .collect();
        bail!("{name}: {}", messages.join("; "));
    }

    Ok(())
}

pub fn import_all(scopes: &mut ScopeStack, table: &Rc<TypeTable>) -> Result<()> {
    import_basic(scopes, table)?;
    import_math(scopes, table)?;
    import_string(scopes, table)?;
    import_table(scopes, table)?;
    import_io(scopes, table)?;
    import_package(scopes, table)?;
    Ok(())
}

pub fn import_basic(scopes: &mut ScopeStack, table: &Rc<TypeTable>) -> Result<()> {
    import_source(
        scopes,
        table,
        "basic",
        r#"
        global assert: <T,U>(v: T, message: U): [v: T, message: U]

        global collectgarbage: (
            opt: nil
                |'collect'
                |'stop'
                |'restart'
                |'count'
                |'step'
                |'setpause'
                |'setstepmul'
                |'isrunning',
            arg: nil|number): nil|number|boolean

        global dofile: (filename: nil|string): [...]

        global error: <T>(message: T, level: nil|number): void

        global _G: { [string]: any }

        global getmetatable: (object: any): any

        global ipairs: <V, T: {[number]: V}>(t: T): [
            f: (:T, :number):[:number, :V],
            s: T,
            var: number]

        global load: (
            chunk: string|(():string|nil),
            chunkname: nil|string,
            mode: nil|'b'|'t'|'bt',
            env: any): (...): [...]

        global loadfile: (
            filename: nil|string,
            mode: nil|'b'|'t'|'bt',
            env: any): (...): [...]

        global next: (table: any, index: nil|number): [index: number, value: any]

        global pairs: <T>(t: T): [
            f: (:T, :number):[:number, :any],
            s: T,
            var: any]

        global pcall: (f: any, ...): [:boolean, ...]

        global print: (...): void

        global rawequal: (v1: any, v2: any): boolean

        global rawget: (table: any, index: number): any

        global rawlen: (v: any): number

        global rawset: <T>(table: T, index: any, value: any): T

        global select: (index: '#'|number, ...): number|[...]

        global setmetatable: <T>(table: T, metatable: any): T

        global tonumber: (e: any, base: nil|number): nil|number

        global tostring: (v: any): string

        global type: (v: any):
            'nil'
            |'number'
            |'string'
            |'boolean'
            |'table'
            |'function'
            |'thread'
            |'userdata'

        global _VERSION: string

        global xpcall: (f: any, msgh: any, ...): [...]
        "#,
    )
}

pub fn import_math(scopes: &mut ScopeStack, table: &Rc<TypeTable>) -> Result<()> {
    import_source(
        scopes,
        table,
        "math",
        r#"
        global math: {
            abs: (x: number): number
            acos: (x: number): number
            asin: (x: number): number
            atan: (y: number, x: nil|number): number
            ceil: (x: number): number
            cos: (x: number): number
            deg: (x: number): number
            exp: (x: number): number
            floor: (x: number): number
            fmod: (x: number, y: number): number
            huge: number
            log: (x: number, base: number): number
            max: (x: number, ...): number
            maxinteger: number
            min: (x: number, ...): number
            mininteger: number
            modf: (x: number): [integral: number, fractional: number]
            pi: number
            rad: (x: number): number
            random: (m: nil|number, n: nil|number): number
            randomseed: (x: number): void
            sin: (x: number): number
            sqrt: (x: number): number
            tan: (x: number): number
            tointeger: (x: number): nil|number
            type: (x: number): nil|'integer'|'float'
            ult: (m: number, n: number): boolean
        }
        "#,
    )
}

pub fn import_string(scopes: &mut ScopeStack, table: &Rc<TypeTable>) -> Result<()> {
    import_source(
        scopes,
        table,
        "string",
        r#"
        global string: {
            byte: (s: string, i: nil|number, j: nil|number): [...]
            char: (...): string
            dump: (funct: any, strip: boolean): string
            find: (s: string, pattern: string, init: nil|number, plain: boolean): [s: number, e: number, ...]
            format: (formatstring: string, ...): string
            gmatch: (s: string, pattern: string): [
                f: (:string, :any):[:any, ...],
                s: string,
                var: any]
            gsub: (s: string, pattern: string, repl: any, n: nil|number): [s: string, n: number]
            len: (s: string): number
            lower: (s: string): string
            match: (s: string, pattern: string, init: nil|number): [...]
            pack: (fmt: string, ...): string
            packsize: (fmt: string): number
            rep: (s: string, n: number, sep: string): string
            reverse: (s: string): string
            sub: (s: string, i: number, j: nil|number): string
            unpack: (fmt: string, s: string, pos: nil|number): [...]
            upper: (s: string): string
        }
        "#,
    )?;

    // String values resolve methods through this table.
    let string_type = scopes
        .lookup("string")
        .ok_or_else(|| anyhow!("string: string table missing after import"))?;
    scopes.set_metatable(Primitive::String, string_type);

    Ok(())
}

pub fn import_table(scopes: &mut ScopeStack, table: &Rc<TypeTable>) -> Result<()> {
    import_source(
        scopes,
        table,
        "table",
        r#"
        interface list: { [number]: string | number }

        global table: {
            concat: (list: list, sep: string | nil, i: number | nil, j: number | nil): string
            insert: ((list: list, value: any): void) & ((list: list, pos: number, value: any): void)
            remove: (list: list, pos: number | nil): string | number | nil
            unpack: (list: list, i: number | nil, j: number | nil): [...]
        }
        "#,
    )
}

pub fn import_io(scopes: &mut ScopeStack, table: &Rc<TypeTable>) -> Result<()> {
    import_source(
        scopes,
        table,
        "io",
        r#"
        interface file: {
            close: (): void
            flush: (): void
            lines: (...): [:(:any, :any): string, :any, :any]
            read: (...): [...]
            seek:
                ((): number) &
                ((whence: 'set' | 'cur' | 'end'): number) &
                ((whence: 'set' | 'cur' | 'end', offset: number): number)
            setvbuf:
                ((mode: 'no'): void) &
                ((mode: 'full' | 'line'): void) &
                ((mode: 'full' | 'line', size: number): void)
            write: (...): file
        }

        interface open_mode: 'r' | 'rb' | 'w' | 'wb' | 'a' | 'ab' | 'r+' | 'r+b' | 'w+' | 'w+b' | 'a+' | 'a+b';

        global io: {
            close: (file: file | nil): void
            flush: (): void
            input:
                ((): file) &
                ((file: string | file): void)
            lines:
                ((): [:(:any, :any): string, :any, :any]) &
                ((filename: string): [:(:any, :any): string, :any, :any])
            open: (filename: string, mode: open_mode | nil): file
            output:
                ((): file) &
                ((file: string | file): void)
            popen: (prog: string, mode: 'r' | 'w' | nil): file
            read: (...): [...]
            tmpfile: (): file
            type: (obj: file): 'file' | 'closed file'
            write: (...): file | [:nil, error: string]
        }
        "#,
    )
}

pub fn import_package(scopes: &mut ScopeStack, table: &Rc<TypeTable>) -> Result<()> {
    import_source(
        scopes,
        table,
        "package",
        r#"
        global require: <T: string>(modname: T): $require(T)

        global package: {
            config: string
            cpath: string
            loaded: { [string]: any }
            loadlib: (libname: string, funcname: string): any
            path: string
            preload: {
                [string]: (modname: string): [loader: (arg: any): any, arg: any] | string | nil
            }
            searchers: {
                [string]: (modname: string): [loader: (arg: any): any, arg: any] | string | nil
            }
            searchpath: (name: string, path: string, sep: string | nil, rep: string | nil): string | [:nil, error: string]
        }
        "#,
    )
}
