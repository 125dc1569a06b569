//! Built-in function library.
//!
//! Built-ins are the last stop of function resolution: a script function or
//! a function registered on the VM with the same name wins.

mod arrays;
mod db;
mod strings;
mod types;

use crate::error::VmResult;
use crate::vm::CallContext;
use quarry_codec::Value;

pub(crate) type Builtin = fn(&mut CallContext<'_>, &[Value]) -> VmResult<Value>;

/// Largest array or string a single built-in call will build.
const SIZE_LIMIT: usize = 1 << 24;

/// Finds a built-in by name.
pub(crate) fn lookup(name: &str) -> Option<Builtin> {
    let builtin: Builtin = match name {
        "gettype" => types::gettype,
        "is_null" => types::is_null,
        "is_bool" => types::is_bool,
        "is_int" => types::is_int,
        "is_float" => types::is_float,
        "is_string" => types::is_string,
        "is_array" => types::is_array,
        "is_numeric" => types::is_numeric,
        "is_scalar" => types::is_scalar,
        "is_resource" => types::is_resource,
        "intval" => types::intval,
        "floatval" => types::floatval,
        "strval" => types::strval,
        "boolval" => types::boolval,
        "var_dump" => types::var_dump,
        "json_encode" => types::json_encode,
        "json_decode" => types::json_decode,

        "strlen" => strings::strlen,
        "strtolower" => strings::strtolower,
        "strtoupper" => strings::strtoupper,
        "substr" => strings::substr,
        "trim" => strings::trim,
        "explode" => strings::explode,
        "implode" => strings::implode,
        "str_replace" => strings::str_replace,
        "str_repeat" => strings::str_repeat,
        "strpos" => strings::strpos,

        "count" => arrays::count,
        "array_keys" => arrays::array_keys,
        "array_values" => arrays::array_values,
        "array_merge" => arrays::array_merge,
        "in_array" => arrays::in_array,
        "array_key_exists" => arrays::array_key_exists,
        "range" => arrays::range,
        "array_reverse" => arrays::array_reverse,
        "abs" => arrays::abs,
        "min" => arrays::min,
        "max" => arrays::max,
        "floor" => arrays::floor,
        "ceil" => arrays::ceil,
        "round" => arrays::round,
        "sqrt" => arrays::sqrt,
        "pow" => arrays::pow,

        "db_version" => db::db_version,
        "db_create" => db::db_create,
        "db_exists" => db::db_exists,
        "db_drop_collection" => db::db_drop_collection,
        "db_store" => db::db_store,
        "db_fetch" => db::db_fetch,
        "db_fetch_by_id" => db::db_fetch_by_id,
        "db_fetch_all" => db::db_fetch_all,
        "db_update_record" => db::db_update_record,
        "db_drop_record" => db::db_drop_record,
        "db_total_records" => db::db_total_records,
        "db_last_record_id" => db::db_last_record_id,
        "db_current_record_id" => db::db_current_record_id,
        "db_reset_record_cursor" => db::db_reset_record_cursor,
        "db_begin" => db::db_begin,
        "db_commit" => db::db_commit,
        "db_rollback" => db::db_rollback,
        "kv_store" => db::kv_store,
        "kv_append" => db::kv_append,
        "kv_fetch" => db::kv_fetch,
        "kv_delete" => db::kv_delete,
        "kv_exists" => db::kv_exists,
        _ => return None,
    };
    Some(builtin)
}

static NULL: Value = Value::Null;

/// Argument `index`, or null when the caller passed fewer.
fn arg(args: &[Value], index: usize) -> &Value {
    args.get(index).unwrap_or(&NULL)
}

fn expect_args(ctx: &CallContext<'_>, args: &[Value], min: usize) -> VmResult<()> {
    if args.len() < min {
        let noun = if min == 1 { "argument" } else { "arguments" };
        return Err(ctx.error(format!(
            "expects at least {min} {noun}, {} given",
            args.len()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    /// Calls a built-in outside a script; returns the value and the output.
    pub(crate) fn call(name: &str, args: &[Value]) -> VmResult<(Value, String)> {
        let mut output = Vec::new();
        let mut records = HashMap::new();
        let mut ctx = CallContext::new(name, &mut output, None, &mut records);
        let builtin = lookup(name).unwrap_or_else(|| panic!("no builtin {name}"));
        let value = builtin(&mut ctx, args)?;
        Ok((value, String::from_utf8(output).unwrap()))
    }

    #[test]
    fn unknown_names_are_not_builtins() {
        assert!(lookup("no_such_function").is_none());
        assert!(lookup("strlen").is_some());
    }

    #[test]
    fn arity_is_checked() {
        let err = call("strlen", &[]).unwrap_err();
        assert_eq!(
            err.message(),
            "strlen(): expects at least 1 argument, 0 given"
        );
    }
}
