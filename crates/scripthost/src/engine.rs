use rhai::{
    Dynamic, Engine, Map,
    default_limits::MAX_STRINGS_INTERNED,
    packages::{Package, StandardPackage},
};

use crate::{config::HostConfig, host::Chunk};

/// `tracing` target used for script `print` and `debug` output.
pub const SCRIPT_LOG_TARGET: &str = "scripthost::script";

/// Build an engine for one host.
///
/// `globals` is a shared table of the host's published globals. Names that
/// are not bound in the running scope resolve against it, which is how
/// script function bodies see host globals.
pub(crate) fn build_engine(config: &HostConfig, globals: Dynamic) -> Engine {
    let mut engine = Engine::new_raw();
    engine.register_global_module(StandardPackage::new().as_shared_module());
    engine.register_type_with_name::<Chunk>("chunk");

    engine.set_max_strings_interned(MAX_STRINGS_INTERNED);
    engine.set_strict_variables(config.strict_variables);
    engine.set_fail_on_invalid_map_property(config.fail_on_invalid_map_property);

    engine.set_max_operations(config.max_operations);
    engine.set_max_call_levels(config.max_call_levels);
    engine.set_max_expr_depths(config.max_expr_depth, config.max_function_expr_depth);
    engine.set_max_string_size(config.max_string_size);
    engine.set_max_array_size(config.max_array_size);
    engine.set_max_map_size(config.max_map_size);
    engine.set_max_variables(config.max_variables);
    engine.set_max_functions(config.max_functions);
    engine.set_max_modules(config.max_modules);

    engine.on_var(move |name, _index, context| {
        if context.scope().contains(name) {
            return Ok(None);
        }
        Ok(globals
            .read_lock::<Map>()
            .and_then(|map| map.get(name).cloned()))
    });

    engine.on_print(|text| tracing::info!(target: SCRIPT_LOG_TARGET, "{text}"));
    engine.on_debug(|text, source, pos| {
        tracing::debug!(
            target: SCRIPT_LOG_TARGET,
            source = source.unwrap_or("<string>"),
            line = ?pos.line(),
            "{text}"
        )
    });

    engine
}
