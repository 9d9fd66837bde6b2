use std::{collections::BTreeSet, fmt, fs, path::Path, sync::Arc};

use rhai::{AST, Dynamic, Engine, FnPtr, Map, Scope};
use serde::{Serialize, de::DeserializeOwned};
use tracing::debug;

use crate::{
    annotations::is_valid_identifier,
    config::HostConfig,
    engine::build_engine,
    enums::EnumCache,
    error::{ScriptError, ScriptResult, join_path},
    sink::{SharedSink, default_sink},
    table::{Table, share_in_place},
};

/// Name of the array through which a chunk receives invocation arguments.
pub const CHUNK_ARGS: &str = "args";

/// Origin recorded for chunks compiled from inline source.
pub const STRING_ORIGIN: &str = "<string>";

/// API surface that an embedding application exposes to scripts.
pub trait ScriptApi {
    /// Register functions, types, and modules on the engine.
    fn register(&self, engine: &mut Engine);
}

/// Source that has been compiled but not run.
///
/// A chunk can be invoked any number of times; every run executes against the
/// globals of the host it is invoked on.
#[derive(Clone)]
pub struct Chunk {
    ast: AST,
    origin: String,
}

impl Chunk {
    /// Where the source came from: a file path, or `<string>`.
    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// Wrap the chunk as an engine value so it can be stored in globals and
    /// passed to [`ScriptHost::invoke`].
    pub fn into_dynamic(self) -> Dynamic {
        Dynamic::from(self)
    }
}

impl fmt::Debug for Chunk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Chunk")
            .field("origin", &self.origin)
            .finish_non_exhaustive()
    }
}

impl From<Chunk> for Dynamic {
    fn from(chunk: Chunk) -> Self {
        chunk.into_dynamic()
    }
}

/// Builder for [`ScriptHost`].
#[derive(Default)]
pub struct ScriptHostBuilder {
    config: HostConfig,
    sink: Option<SharedSink>,
    enums: Option<Arc<EnumCache>>,
    apis: Vec<Box<dyn ScriptApi>>,
}

impl ScriptHostBuilder {
    /// Engine limits and behaviour.
    pub fn config(mut self, config: HostConfig) -> Self {
        self.config = config;
        self
    }

    /// The sink failures are reported to. Defaults to [`PanicSink`](crate::PanicSink).
    pub fn sink(mut self, sink: SharedSink) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Enum cache attached when the host is built and by
    /// [`ScriptHost::attach_enums`].
    pub fn enums(mut self, cache: Arc<EnumCache>) -> Self {
        self.enums = Some(cache);
        self
    }

    /// Register host functions on the engine before any script runs.
    pub fn api(mut self, api: impl ScriptApi + 'static) -> Self {
        self.apis.push(Box::new(api));
        self
    }

    /// Create the host.
    pub fn build(self) -> ScriptHost {
        let published = Dynamic::from_map(Map::new()).into_shared();
        let mut engine = build_engine(&self.config, published.clone());
        for api in &self.apis {
            api.register(&mut engine);
        }

        let mut host = ScriptHost {
            engine,
            scope: Scope::new(),
            lib: AST::empty(),
            published,
            sink: self.sink.unwrap_or_else(default_sink),
            enums: self.enums,
            config: self.config,
        };
        if let Err(err) = host.attach_enums() {
            debug!(error = %err, "enum attach failed while building host");
        }
        host
    }
}

/// Failure-safe surface over one engine instance and its global namespace.
///
/// Every fallible operation reports its failure to the host's sink exactly
/// once and then returns `Err`. Nothing raised by the engine propagates past
/// these methods in any other form.
pub struct ScriptHost {
    engine: Engine,
    /// Global namespace.
    scope: Scope<'static>,
    /// Every script function from chunks that ran successfully.
    lib: AST,
    /// Globals as seen from script function bodies.
    published: Dynamic,
    sink: SharedSink,
    enums: Option<Arc<EnumCache>>,
    config: HostConfig,
}

impl Default for ScriptHost {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ScriptHost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScriptHost")
            .field("globals", &self.scope.len())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl ScriptHost {
    /// A host with default configuration, the panicking sink and no enums.
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Start building a host.
    pub fn builder() -> ScriptHostBuilder {
        ScriptHostBuilder::default()
    }

    /// The sink this host reports to.
    pub fn sink(&self) -> &SharedSink {
        &self.sink
    }

    /// The configuration the engine was built with.
    pub fn config(&self) -> &HostConfig {
        &self.config
    }

    /// The wrapped engine, for registering additional host functions.
    pub fn engine_mut(&mut self) -> &mut Engine {
        &mut self.engine
    }

    /// Create an empty table and bind it as global `name`.
    pub fn create_global_table(&mut self, name: &str) -> ScriptResult<Table> {
        let table = Table::new();
        let result = self.bind(name, table.clone().into_dynamic()).map(|()| table);
        self.reported(result)
    }

    /// Assign `value` to global `key`.
    pub fn set_global(&mut self, key: &str, value: impl Into<Dynamic>) -> ScriptResult<()> {
        let result = self.bind(key, value.into());
        self.reported(result)
    }

    /// Bind a read-only global. Later [`set_global`](Self::set_global) calls on
    /// `key` fail with a bind failure.
    ///
    /// A constant table can still be edited from the host through
    /// [`get_global_table`](Self::get_global_table).
    pub fn set_constant(&mut self, key: &str, value: impl Into<Dynamic>) -> ScriptResult<()> {
        let result = self.check_bindable(key).map(|()| {
            let mut value = value.into();
            share_in_place(&mut value);
            self.scope.push_constant_dynamic(key, value);
        });
        self.reported(result)
    }

    /// Convert `value` through serde and assign it to global `key`.
    pub fn set_global_serialized<T: Serialize>(&mut self, key: &str, value: &T) -> ScriptResult<()> {
        let result = rhai::serde::to_dynamic(value)
            .map_err(|err| ScriptError::bind(key, err.to_string()))
            .and_then(|value| self.bind(key, value));
        self.reported(result)
    }

    /// Resolve a single global.
    ///
    /// Script functions compiled in this host resolve to function pointers.
    pub fn get_global(&self, key: &str) -> ScriptResult<Dynamic> {
        let result = self
            .lookup_global(key)
            .ok_or_else(|| ScriptError::lookup(&[key]));
        self.reported(result)
    }

    /// Resolve a nested path such as `["config", "window", "width"]`.
    ///
    /// Each key after the first is looked up in the table produced by the
    /// previous one. Resolution stops at the first nil, non-table or missing
    /// segment with a single lookup failure naming the whole path.
    pub fn get_global_path<S: AsRef<str>>(&self, keys: &[S]) -> ScriptResult<Dynamic> {
        let result = self.resolve_path(keys);
        self.reported(result)
    }

    /// Resolve a global that must hold a table.
    pub fn get_global_table(&mut self, key: &str) -> ScriptResult<Table> {
        self.get_global_table_path(&[key])
    }

    /// Resolve a nested path that must end at a table.
    ///
    /// The returned handle aliases the table stored in the globals. Tables
    /// declared with `const` inside a script are the exception: the handle
    /// holds a copy.
    pub fn get_global_table_path<S: AsRef<str>>(&mut self, keys: &[S]) -> ScriptResult<Table> {
        let result = self.resolve_table(keys);
        self.reported(result)
    }

    /// Convert global `key` through serde into `T`.
    pub fn get_global_as<T: DeserializeOwned>(&self, key: &str) -> ScriptResult<T> {
        let result = self
            .lookup_global(key)
            .ok_or_else(|| ScriptError::lookup(&[key]))
            .and_then(|value| {
                let value = value.flatten_clone();
                rhai::serde::from_dynamic::<T>(&value).map_err(|_| ScriptError::TypeMismatch {
                    key: key.to_string(),
                    expected: std::any::type_name::<T>().to_string(),
                    found: self.type_name(&value),
                })
            });
        self.reported(result)
    }

    /// Whether `key` resolves to anything. Never reports.
    pub fn contains_global(&self, key: &str) -> bool {
        self.lookup_global(key).is_some()
    }

    /// Names of every bound global, sorted.
    pub fn global_names(&self) -> Vec<String> {
        self.scope
            .iter_raw()
            .map(|(name, _, _)| name.to_string())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// A snapshot of the global namespace as a table.
    pub fn globals(&self) -> Map {
        self.scope
            .iter()
            .map(|(name, _, value)| (name.into(), value))
            .collect()
    }

    /// Compile and immediately run `source`.
    pub fn execute_source(&mut self, source: &str) -> ScriptResult<Dynamic> {
        let result = self
            .compile(source, STRING_ORIGIN)
            .and_then(|chunk| self.run_chunk(&chunk, Vec::new()));
        self.reported(result)
    }

    /// Read, compile and immediately run the file at `path`.
    pub fn execute_file(&mut self, path: impl AsRef<Path>) -> ScriptResult<Dynamic> {
        let result = self
            .compile_file(path.as_ref())
            .and_then(|chunk| self.run_chunk(&chunk, Vec::new()));
        self.reported(result)
    }

    /// Compile `source` without running it.
    pub fn load_source(&self, source: &str) -> ScriptResult<Chunk> {
        let result = self.compile(source, STRING_ORIGIN);
        self.reported(result)
    }

    /// Read and compile the file at `path` without running it.
    pub fn load_file(&self, path: impl AsRef<Path>) -> ScriptResult<Chunk> {
        let result = self.compile_file(path.as_ref());
        self.reported(result)
    }

    /// Invoke a function pointer, closure or chunk with positional arguments.
    pub fn invoke(&mut self, target: &Dynamic, args: Vec<Dynamic>) -> ScriptResult<Dynamic> {
        let result = self.call_value(target, "<handle>", args);
        self.reported(result)
    }

    /// Run a compiled chunk. Arguments are visible to the chunk as the
    /// [`CHUNK_ARGS`] array while it runs.
    pub fn invoke_chunk(&mut self, chunk: &Chunk, args: Vec<Dynamic>) -> ScriptResult<Dynamic> {
        let result = self.run_chunk(chunk, args);
        self.reported(result)
    }

    /// Look up global `name` and invoke it.
    pub fn invoke_by_name(&mut self, name: &str, args: Vec<Dynamic>) -> ScriptResult<Dynamic> {
        let result = self
            .lookup_global(name)
            .ok_or_else(|| ScriptError::lookup(&[name]))
            .and_then(|target| self.call_value(&target, name, args));
        self.reported(result)
    }

    /// Copy the injected enum cache into this host's globals.
    ///
    /// Returns the number of enumerations bound; `Ok(0)` when the host has no
    /// cache.
    pub fn attach_enums(&mut self) -> ScriptResult<usize> {
        let Some(cache) = self.enums.clone() else {
            return Ok(0);
        };
        cache.attach_to(self)
    }

    /// Whether `value` can be passed to [`invoke`](Self::invoke).
    pub fn is_callable(value: &Dynamic) -> bool {
        let value = value.flatten_clone();
        value.is::<FnPtr>() || value.is::<Chunk>()
    }

    fn reported<T>(&self, result: ScriptResult<T>) -> ScriptResult<T> {
        if let Err(err) = &result {
            debug!(kind = %err.kind(), "reporting script failure");
            self.sink.report(err);
        }
        result
    }

    fn check_bindable(&self, key: &str) -> ScriptResult<()> {
        if !is_valid_identifier(key) {
            return Err(ScriptError::bind(key, "not a valid script identifier"));
        }
        if self.scope.is_constant(key) == Some(true) {
            return Err(ScriptError::bind(key, "global is read-only"));
        }
        Ok(())
    }

    fn bind(&mut self, key: &str, value: Dynamic) -> ScriptResult<()> {
        self.check_bindable(key)?;
        match self.scope.get_mut(key) {
            Some(slot) => *slot = value,
            None => {
                self.scope.push_dynamic(key, value);
            }
        }
        debug!(key, "bound script global");
        Ok(())
    }

    fn has_script_function(&self, name: &str) -> bool {
        self.lib.iter_functions().any(|f| f.name == name)
    }

    fn lookup_global(&self, key: &str) -> Option<Dynamic> {
        if let Some(value) = self.scope.get(key) {
            return Some(value.clone());
        }
        if self.has_script_function(key) {
            return FnPtr::new(key).ok().map(Dynamic::from);
        }
        None
    }

    fn resolve_path<S: AsRef<str>>(&self, keys: &[S]) -> ScriptResult<Dynamic> {
        let fail = || ScriptError::lookup(keys);
        let (first, rest) = keys.split_first().ok_or_else(fail)?;
        let mut current = self.lookup_global(first.as_ref()).ok_or_else(fail)?;
        for key in rest {
            let next = current
                .read_lock::<Map>()
                .and_then(|map| map.get(key.as_ref()).cloned());
            current = next.ok_or_else(fail)?;
        }
        Ok(current)
    }

    fn resolve_table<S: AsRef<str>>(&mut self, keys: &[S]) -> ScriptResult<Table> {
        let fail = || ScriptError::lookup(keys);
        let (first, rest) = keys.split_first().ok_or_else(fail)?;
        let mut current = match self.scope.get_mut(first.as_ref()) {
            Some(slot) => {
                share_in_place(slot);
                slot.clone()
            }
            None => self.lookup_global(first.as_ref()).ok_or_else(fail)?,
        };
        for key in rest {
            let next = {
                let Some(mut map) = current.write_lock::<Map>() else {
                    return Err(fail());
                };
                let Some(entry) = map.get_mut(key.as_ref()) else {
                    return Err(fail());
                };
                share_in_place(entry);
                entry.clone()
            };
            current = next;
        }

        let found = self.type_name(&current);
        Table::from_dynamic(current).ok_or_else(|| ScriptError::TypeMismatch {
            key: join_path(keys),
            expected: "table".to_string(),
            found,
        })
    }

    fn compile(&self, source: &str, origin: &str) -> ScriptResult<Chunk> {
        let mut ast = self
            .engine
            .compile_with_scope(&self.scope, source)
            .map_err(|err| ScriptError::from_parse(origin, &err))?;
        if origin != STRING_ORIGIN {
            ast.set_source(origin);
        }
        debug!(origin, "compiled chunk");
        Ok(Chunk {
            ast,
            origin: origin.to_string(),
        })
    }

    fn compile_file(&self, path: &Path) -> ScriptResult<Chunk> {
        let origin = path.display().to_string();
        let source = fs::read_to_string(path).map_err(|err| ScriptError::Load {
            origin: origin.clone(),
            message: err.to_string(),
            line: None,
        })?;
        self.compile(&source, &origin)
    }

    /// Share the current globals with script function bodies.
    ///
    /// Tables are shared in place so function bodies see later edits; other
    /// values are copied as of this call. Constants are always copied.
    fn publish_globals(&mut self) {
        let names: BTreeSet<String> = self
            .scope
            .iter_raw()
            .map(|(name, _, _)| name.to_string())
            .collect();
        let mut visible = Map::new();
        for name in names {
            let value = if self.scope.is_constant(&name) == Some(true) {
                self.scope.get(&name).map(Dynamic::flatten_clone)
            } else {
                self.scope.get_mut(&name).map(|slot| {
                    share_in_place(slot);
                    slot.clone()
                })
            };
            if let Some(value) = value {
                visible.insert(name.as_str().into(), value);
            }
        }
        if let Some(mut published) = self.published.write_lock::<Map>() {
            *published = visible;
        }
    }

    fn run_chunk(&mut self, chunk: &Chunk, args: Vec<Dynamic>) -> ScriptResult<Dynamic> {
        self.publish_globals();
        let runnable = self.lib.merge(&chunk.ast);

        let args_index = (!args.is_empty()).then(|| {
            self.scope.push_dynamic(CHUNK_ARGS, Dynamic::from_array(args));
            self.scope.len() - 1
        });
        debug!(origin = %chunk.origin, "running chunk");
        let result = self
            .engine
            .eval_ast_with_scope::<Dynamic>(&mut self.scope, &runnable);
        if let Some(index) = args_index {
            self.remove_entry(index);
        }

        let value = result.map_err(|err| ScriptError::from_eval(&chunk.origin, &err))?;
        self.lib.combine(chunk.ast.clone_functions_only());
        Ok(value)
    }

    /// Remove the scope entry at `index`, keeping every entry after it.
    fn remove_entry(&mut self, index: usize) {
        let later: Vec<(String, bool, Dynamic)> = self
            .scope
            .iter_raw()
            .skip(index + 1)
            .map(|(name, constant, value)| (name.to_string(), constant, value.clone()))
            .collect();
        self.scope.rewind(index);
        for (name, constant, value) in later {
            if constant {
                self.scope.push_constant_dynamic(name, value);
            } else {
                self.scope.push_dynamic(name, value);
            }
        }
    }

    fn call_value(&mut self, target: &Dynamic, label: &str, args: Vec<Dynamic>) -> ScriptResult<Dynamic> {
        let value = target.flatten_clone();
        if let Some(fn_ptr) = value.clone().try_cast::<FnPtr>() {
            debug!(function = fn_ptr.fn_name(), "invoking script function");
            self.publish_globals();
            return fn_ptr
                .call::<Dynamic>(&self.engine, &self.lib, args)
                .map_err(|err| ScriptError::from_eval(fn_ptr.fn_name(), &err));
        }
        if let Some(chunk) = value.clone().try_cast::<Chunk>() {
            return self.run_chunk(&chunk, args);
        }
        Err(ScriptError::NotCallable {
            target: label.to_string(),
            found: self.type_name(&value),
        })
    }

    fn type_name(&self, value: &Dynamic) -> String {
        let value = value.flatten_clone();
        self.engine.map_type_name(value.type_name()).to_string()
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::{FailureKind, testutils::recording_host};

    #[test]
    fn set_then_get_scalars() {
        let (mut host, sink) = recording_host();
        host.set_global("flag", true).unwrap();
        host.set_global("count", 42_i64).unwrap();
        host.set_global("ratio", 0.5_f64).unwrap();
        host.set_global("name", Dynamic::from("crate".to_string()))
            .unwrap();

        assert!(host.get_global("flag").unwrap().as_bool().unwrap());
        assert_eq!(host.get_global("count").unwrap().as_int().unwrap(), 42);
        assert_eq!(host.get_global("ratio").unwrap().as_float().unwrap(), 0.5);
        assert_eq!(
            host.get_global("name").unwrap().into_string().unwrap(),
            "crate"
        );
        assert_eq!(sink.count(), 0);
    }

    #[test]
    fn invalid_key_is_bind_failure() {
        let (mut host, sink) = recording_host();
        let err = host.set_global("not valid", 1_i64).unwrap_err();
        assert_eq!(err.kind(), FailureKind::BindFailure);
        assert_eq!(sink.kinds(), vec![FailureKind::BindFailure]);
    }

    #[test]
    fn constant_rejects_overwrite() {
        let (mut host, sink) = recording_host();
        host.set_constant("VERSION", 3_i64).unwrap();
        assert!(host.set_global("VERSION", 4_i64).is_err());
        assert_eq!(host.get_global("VERSION").unwrap().as_int().unwrap(), 3);
        assert_eq!(sink.kinds(), vec![FailureKind::BindFailure]);
    }

    #[test]
    fn created_table_aliases_global() {
        let (mut host, _sink) = recording_host();
        let table = host.create_global_table("settings").unwrap();
        table.set("volume", 7_i64);

        let seen = host.execute_source("settings.volume + 1").unwrap();
        assert_eq!(seen.as_int().unwrap(), 8);

        host.execute_source("settings.muted = true;").unwrap();
        assert!(table.get("muted").as_bool().unwrap());
    }

    #[test]
    fn script_functions_resolve_as_globals() {
        let (mut host, _sink) = recording_host();
        host.execute_source("fn double(x) { x * 2 }").unwrap();
        assert!(host.contains_global("double"));
        let f = host.get_global("double").unwrap();
        assert!(ScriptHost::is_callable(&f));
    }

    #[test]
    fn globals_snapshot() {
        let (mut host, _sink) = recording_host();
        host.set_global("a", 1_i64).unwrap();
        host.execute_source("let b = 2;").unwrap();
        assert_eq!(host.global_names(), vec!["a".to_string(), "b".to_string()]);
        assert_eq!(host.globals().len(), 2);
    }
}
