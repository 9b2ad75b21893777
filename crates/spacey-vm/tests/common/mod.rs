//! Shared test harness
//!
//! `ScriptedEngine` stands in for a real script engine. It understands one
//! statement per line, which is enough to drive the loader end to end:
//!
//! ```text
//! import "x"                       import * as ns from "x"
//! import def from "x"              import { a, b as c } from "x"
//! const n = await import("x")      const x = require("x")
//! const n = EXPR                   export const n = EXPR
//! export default EXPR              exports.n = EXPR
//! module.exports = EXPR            globalThis.n = EXPR
//! globalThis.n += EXPR             throw "message"
//! if (!EXPR) STATEMENT
//! ```
//!
//! Expressions are number or string literals, `import.meta.url`,
//! `globalThis.n`, a binding, or `binding.property`.

#![allow(dead_code)]

use async_trait::async_trait;
use spacey_vm::error::{Result, VmError};
use spacey_vm::{
    BuiltinRegistry, CommonJsEvaluator, CommonJsLoader, CommonJsModule, CompileOptions,
    CompiledModule, ExecutionContext, Linker, ModuleEnvironment, Namespace, Object, ScriptEngine,
    Value,
};
use indexmap::IndexMap;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

/// Install a test subscriber honoring `RUST_LOG`
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Absolute path of a fixture
pub fn fixture(relative: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(relative)
}

/// Linker and legacy loader wired to the scripted engine
pub struct Harness {
    pub linker: Linker,
    pub legacy: Arc<CommonJsLoader>,
}

pub fn harness() -> Harness {
    init_tracing();
    let engine = Arc::new(ScriptedEngine);
    let builtins = BuiltinRegistry::with_defaults("node:");
    let legacy = Arc::new(CommonJsLoader::new(engine.clone(), builtins.clone()));
    let linker = Linker::builder(engine, legacy.clone())
        .builtins(builtins)
        .build();
    Harness { linker, legacy }
}

#[derive(Debug, Clone)]
enum Expr {
    Number(f64),
    Str(String),
    MetaUrl,
    Global(String),
    Binding(String),
    Member(String, String),
}

#[derive(Debug, Clone)]
enum Stmt {
    ImportSideEffect(String),
    ImportAll { name: String, from: String },
    ImportDefault { name: String, from: String },
    ImportNamed { bindings: Vec<(String, String)>, from: String },
    DynamicImport { name: String, from: String },
    Require { name: String, from: String },
    Const { name: String, value: Expr, export: bool },
    ExportDefault(Expr),
    SetExport { name: String, value: Expr },
    SetModuleExports(Expr),
    SetGlobal { name: String, value: Expr },
    AddGlobal { name: String, value: Expr },
    Throw(String),
    Unless { guard: Expr, body: Box<Stmt> },
}

fn unquote(s: &str) -> Result<String> {
    let s = s.trim();
    s.strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .map(str::to_string)
        .ok_or_else(|| VmError::engine(format!("SyntaxError: expected string literal, got {}", s)))
}

fn parse_expr(s: &str) -> Result<Expr> {
    let s = s.trim();
    if s.starts_with('"') {
        return Ok(Expr::Str(unquote(s)?));
    }
    if let Ok(n) = s.parse::<f64>() {
        return Ok(Expr::Number(n));
    }
    if s == "import.meta.url" {
        return Ok(Expr::MetaUrl);
    }
    if let Some(name) = s.strip_prefix("globalThis.") {
        return Ok(Expr::Global(name.to_string()));
    }
    match s.split_once('.') {
        Some((obj, prop)) => Ok(Expr::Member(obj.to_string(), prop.to_string())),
        None => Ok(Expr::Binding(s.to_string())),
    }
}

fn parse_import(rest: &str) -> Result<Stmt> {
    let rest = rest.trim();
    if rest.starts_with('"') {
        return Ok(Stmt::ImportSideEffect(unquote(rest)?));
    }
    let (clause, from) = rest
        .rsplit_once(" from ")
        .ok_or_else(|| VmError::engine(format!("SyntaxError: bad import {}", rest)))?;
    let from = unquote(from)?;
    let clause = clause.trim();

    if let Some(name) = clause.strip_prefix("* as ") {
        return Ok(Stmt::ImportAll { name: name.trim().to_string(), from });
    }
    if let Some(inner) = clause.strip_prefix('{').and_then(|c| c.strip_suffix('}')) {
        let bindings = inner
            .split(',')
            .map(str::trim)
            .filter(|b| !b.is_empty())
            .map(|b| match b.split_once(" as ") {
                Some((export, local)) => (export.trim().to_string(), local.trim().to_string()),
                None => (b.to_string(), b.to_string()),
            })
            .collect();
        return Ok(Stmt::ImportNamed { bindings, from });
    }
    Ok(Stmt::ImportDefault { name: clause.to_string(), from })
}

fn parse_const(rest: &str, export: bool) -> Result<Stmt> {
    let (name, value) = rest
        .split_once('=')
        .ok_or_else(|| VmError::engine(format!("SyntaxError: bad declaration {}", rest)))?;
    let name = name.trim().to_string();
    let value = value.trim();

    if let Some(specifier) = value
        .strip_prefix("await import(")
        .and_then(|v| v.strip_suffix(')'))
    {
        return Ok(Stmt::DynamicImport { name, from: unquote(specifier)? });
    }
    if let Some(specifier) = value.strip_prefix("require(").and_then(|v| v.strip_suffix(')')) {
        return Ok(Stmt::Require { name, from: unquote(specifier)? });
    }
    Ok(Stmt::Const { name, value: parse_expr(value)?, export })
}

fn parse(source: &str) -> Result<Vec<Stmt>> {
    let mut statements = Vec::new();
    for line in source.lines() {
        let line = line.trim().trim_end_matches(';');
        if line.is_empty() || line.starts_with("//") {
            continue;
        }
        statements.push(parse_statement(line)?);
    }
    Ok(statements)
}

fn parse_statement(line: &str) -> Result<Stmt> {
    Ok(if let Some(rest) = line.strip_prefix("if (!") {
        let (guard, body) = rest
            .split_once(") ")
            .ok_or_else(|| VmError::engine(format!("SyntaxError: {}", line)))?;
        Stmt::Unless {
            guard: parse_expr(guard)?,
            body: Box::new(parse_statement(body.trim())?),
        }
    } else if let Some(rest) = line.strip_prefix("import ") {
        parse_import(rest)?
    } else if let Some(rest) = line.strip_prefix("export const ") {
        parse_const(rest, true)?
    } else if let Some(rest) = line.strip_prefix("const ") {
        parse_const(rest, false)?
    } else if let Some(rest) = line.strip_prefix("export default ") {
        Stmt::ExportDefault(parse_expr(rest)?)
    } else if let Some(rest) = line.strip_prefix("module.exports = ") {
        Stmt::SetModuleExports(parse_expr(rest)?)
    } else if let Some(rest) = line.strip_prefix("exports.") {
        let (name, value) = rest
            .split_once('=')
            .ok_or_else(|| VmError::engine(format!("SyntaxError: {}", line)))?;
        Stmt::SetExport { name: name.trim().to_string(), value: parse_expr(value)? }
    } else if let Some(rest) = line.strip_prefix("globalThis.") {
        if let Some((name, value)) = rest.split_once("+=") {
            Stmt::AddGlobal { name: name.trim().to_string(), value: parse_expr(value)? }
        } else if let Some((name, value)) = rest.split_once('=') {
            Stmt::SetGlobal { name: name.trim().to_string(), value: parse_expr(value)? }
        } else {
            return Err(VmError::engine(format!("SyntaxError: {}", line)));
        }
    } else if let Some(rest) = line.strip_prefix("throw ") {
        Stmt::Throw(unquote(rest)?)
    } else {
        return Err(VmError::engine(format!("SyntaxError: unsupported statement {}", line)));
    })
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Undefined | Value::Null => false,
        Value::Boolean(b) => *b,
        Value::Number(n) => *n != 0.0 && !n.is_nan(),
        Value::String(s) => !s.is_empty(),
        _ => true,
    }
}

/// Evaluation state of one module body
struct Scope<'a> {
    context: &'a ExecutionContext,
    url: String,
    bindings: HashMap<String, Value>,
}

impl Scope<'_> {
    fn eval(&self, expr: &Expr) -> Result<Value> {
        Ok(match expr {
            Expr::Number(n) => Value::Number(*n),
            Expr::Str(s) => Value::String(s.clone()),
            Expr::MetaUrl => Value::String(self.url.clone()),
            Expr::Global(name) => self.context.get_global(name),
            Expr::Binding(name) => self.lookup(name)?,
            Expr::Member(obj, prop) => self.lookup(obj)?.get(prop),
        })
    }

    fn lookup(&self, name: &str) -> Result<Value> {
        self.bindings
            .get(name)
            .cloned()
            .ok_or_else(|| VmError::engine(format!("ReferenceError: {} is not defined", name)))
    }

    fn set_global(&self, name: &str, value: Value) {
        self.context.set_global(name, value);
    }

    fn add_global(&self, name: &str, value: Value) {
        let current = self.context.get_global(name);
        let next = match (current, value) {
            (Value::Undefined, Value::Number(n)) => Value::Number(n),
            (Value::Number(a), Value::Number(b)) => Value::Number(a + b),
            (Value::Undefined, Value::String(s)) => Value::String(s),
            (a, b) => Value::String(format!("{}{}", a, b)),
        };
        self.context.set_global(name, next);
    }
}

/// Line-oriented stand-in for a script engine, implementing both engine seams
pub struct ScriptedEngine;

struct ScriptedModule {
    statements: Vec<Stmt>,
    url: String,
}

impl ScriptEngine for ScriptedEngine {
    fn compile_module(
        &self,
        source: &str,
        options: &CompileOptions,
    ) -> Result<Arc<dyn CompiledModule>> {
        Ok(Arc::new(ScriptedModule {
            statements: parse(source)?,
            url: options.url.to_string(),
        }))
    }
}

#[async_trait]
impl CompiledModule for ScriptedModule {
    fn requested_modules(&self) -> Vec<String> {
        self.statements
            .iter()
            .filter_map(|stmt| match stmt {
                Stmt::ImportSideEffect(from)
                | Stmt::ImportAll { from, .. }
                | Stmt::ImportDefault { from, .. }
                | Stmt::ImportNamed { from, .. } => Some(from.clone()),
                _ => None,
            })
            .collect()
    }

    async fn evaluate(&self, env: ModuleEnvironment) -> Result<Namespace> {
        assert_eq!(env.import_meta.url, self.url);

        let mut scope = Scope {
            context: &env.context,
            url: env.import_meta.url.clone(),
            bindings: HashMap::new(),
        };
        let mut exports = IndexMap::new();

        for stmt in &self.statements {
            let stmt = match stmt {
                Stmt::Unless { guard, body } => {
                    if truthy(&scope.eval(guard)?) {
                        continue;
                    }
                    body.as_ref()
                }
                other => other,
            };
            match stmt {
                Stmt::Unless { .. } => {
                    return Err(VmError::engine("SyntaxError: nested if is not supported"));
                }
                Stmt::ImportSideEffect(_) => {}
                Stmt::ImportAll { name, from } => {
                    let ns = imported(&env, from)?;
                    scope.bindings.insert(name.clone(), Value::Namespace(ns));
                }
                Stmt::ImportDefault { name, from } => {
                    let ns = imported(&env, from)?;
                    let value = ns.default_export().cloned().ok_or_else(|| {
                        VmError::engine(format!("SyntaxError: '{}' has no default export", from))
                    })?;
                    scope.bindings.insert(name.clone(), value);
                }
                Stmt::ImportNamed { bindings, from } => {
                    let ns = imported(&env, from)?;
                    for (export, local) in bindings {
                        let value = ns.get(export).cloned().ok_or_else(|| {
                            VmError::engine(format!(
                                "SyntaxError: '{}' does not provide an export named '{}'",
                                from, export
                            ))
                        })?;
                        scope.bindings.insert(local.clone(), value);
                    }
                }
                Stmt::DynamicImport { name, from } => {
                    let ns = env.dynamic.import(from).await?;
                    scope.bindings.insert(name.clone(), Value::Namespace(ns));
                }
                Stmt::Const { name, value, export } => {
                    let value = scope.eval(value)?;
                    if *export {
                        exports.insert(name.clone(), value.clone());
                    }
                    scope.bindings.insert(name.clone(), value);
                }
                Stmt::ExportDefault(value) => {
                    exports.insert("default".to_string(), scope.eval(value)?);
                }
                Stmt::SetGlobal { name, value } => scope.set_global(name, scope.eval(value)?),
                Stmt::AddGlobal { name, value } => scope.add_global(name, scope.eval(value)?),
                Stmt::Throw(message) => return Err(VmError::engine(message.clone())),
                Stmt::Require { .. }
                | Stmt::SetExport { .. }
                | Stmt::SetModuleExports(_) => {
                    return Err(VmError::engine("ReferenceError: require is not defined"));
                }
            }
        }

        Ok(Namespace::new(exports))
    }
}

fn imported(env: &ModuleEnvironment, from: &str) -> Result<Namespace> {
    env.import(from)
        .cloned()
        .ok_or_else(|| VmError::engine(format!("dependency '{}' was not evaluated", from)))
}

impl CommonJsEvaluator for ScriptedEngine {
    fn evaluate_commonjs(&self, source: &str, module: &mut CommonJsModule<'_>) -> Result<()> {
        let statements = parse(source)?;
        let mut scope = Scope {
            context: module.context,
            url: format!("file://{}", module.filename.display()),
            bindings: HashMap::new(),
        };

        for stmt in &statements {
            let stmt = match stmt {
                Stmt::Unless { guard, body } => {
                    if truthy(&scope.eval(guard)?) {
                        continue;
                    }
                    body.as_ref()
                }
                other => other,
            };
            match stmt {
                Stmt::Require { name, from } => {
                    let value = module.require(from)?;
                    scope.bindings.insert(name.clone(), value);
                }
                Stmt::Const { name, value, .. } => {
                    let value = scope.eval(value)?;
                    scope.bindings.insert(name.clone(), value);
                }
                Stmt::SetExport { name, value } => {
                    let value = scope.eval(value)?;
                    match &module.exports {
                        Value::Object(obj) => obj.set(name.clone(), value),
                        _ => {
                            let obj = Object::new();
                            obj.set(name.clone(), value);
                            module.exports = Value::Object(obj);
                        }
                    }
                }
                Stmt::SetModuleExports(value) => module.exports = scope.eval(value)?,
                Stmt::SetGlobal { name, value } => scope.set_global(name, scope.eval(value)?),
                Stmt::AddGlobal { name, value } => scope.add_global(name, scope.eval(value)?),
                Stmt::Throw(message) => return Err(VmError::engine(message.clone())),
                _ => {
                    return Err(VmError::engine(
                        "SyntaxError: Cannot use import statement outside a module",
                    ));
                }
            }
        }
        Ok(())
    }
}
