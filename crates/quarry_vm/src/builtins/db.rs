//! Database built-ins: collections, transactions and raw key/value access.
//!
//! Collection functions answer `false` when the collection does not exist;
//! every other engine failure aborts the script.

use super::{arg, expect_args};
use crate::error::VmResult;
use crate::vm::CallContext;
use quarry_codec::Value;
use quarry_core::{Collection, CoreError, CoreResult, Database};

fn collection<'a>(ctx: &CallContext<'a>, args: &[Value]) -> VmResult<Collection<'a>> {
    expect_args(ctx, args, 1)?;
    let db = ctx.require_database()?;
    let name = args[0].to_bytes();
    db.collection(&String::from_utf8_lossy(&name))
        .map_err(|e| ctx.error(e))
}

fn collection_name(args: &[Value]) -> String {
    String::from_utf8_lossy(&arg(args, 0).to_bytes()).into_owned()
}

fn outcome(ctx: &CallContext<'_>, result: CoreResult<Value>) -> VmResult<Value> {
    match result {
        Ok(value) => Ok(value),
        Err(CoreError::CollectionNotFound { .. }) => Ok(Value::Bool(false)),
        Err(err) => Err(ctx.error(err)),
    }
}

fn id_value(id: u64) -> Value {
    Value::Int(id as i64)
}

/// Record id argument; `None` for negative ids, which never exist.
fn record_id(ctx: &CallContext<'_>, args: &[Value]) -> VmResult<Option<u64>> {
    expect_args(ctx, args, 2)?;
    Ok(u64::try_from(args[1].to_int()).ok())
}

pub(super) fn db_version(_ctx: &mut CallContext<'_>, _args: &[Value]) -> VmResult<Value> {
    Ok(Value::str(quarry_core::version()))
}

pub(super) fn db_create(ctx: &mut CallContext<'_>, args: &[Value]) -> VmResult<Value> {
    let coll = collection(ctx, args)?;
    outcome(ctx, coll.create().map(Value::Bool))
}

pub(super) fn db_exists(ctx: &mut CallContext<'_>, args: &[Value]) -> VmResult<Value> {
    let coll = collection(ctx, args)?;
    outcome(ctx, coll.exists().map(Value::Bool))
}

pub(super) fn db_drop_collection(ctx: &mut CallContext<'_>, args: &[Value]) -> VmResult<Value> {
    let coll = collection(ctx, args)?;
    let dropped = outcome(ctx, coll.drop().map(Value::Bool))?;
    ctx.forget_record_cursor(coll.name());
    Ok(dropped)
}

/// `db_store($collection, $document)`; a list of documents stores each.
pub(super) fn db_store(ctx: &mut CallContext<'_>, args: &[Value]) -> VmResult<Value> {
    expect_args(ctx, args, 2)?;
    let coll = collection(ctx, args)?;
    outcome(ctx, coll.store(&args[1]).map(|_| Value::Bool(true)))
}

/// Returns the record after the one this VM last fetched from the
/// collection, or null once the collection is exhausted.
pub(super) fn db_fetch(ctx: &mut CallContext<'_>, args: &[Value]) -> VmResult<Value> {
    let coll = collection(ctx, args)?;
    let after = *ctx.record_cursor(coll.name());
    match coll.fetch_next(after) {
        Ok(Some((id, doc))) => {
            *ctx.record_cursor(coll.name()) = Some(id);
            Ok(doc)
        }
        Ok(None) => Ok(Value::Null),
        Err(err) => outcome(ctx, Err(err)),
    }
}

pub(super) fn db_fetch_by_id(ctx: &mut CallContext<'_>, args: &[Value]) -> VmResult<Value> {
    let coll = collection(ctx, args)?;
    let Some(id) = record_id(ctx, args)? else {
        return Ok(Value::Null);
    };
    outcome(ctx, coll.fetch_by_id(id).map(Option::unwrap_or_default))
}

pub(super) fn db_fetch_all(ctx: &mut CallContext<'_>, args: &[Value]) -> VmResult<Value> {
    let coll = collection(ctx, args)?;
    outcome(ctx, coll.fetch_all().map(Value::list))
}

/// `db_update_record($collection, $id, $document)`.
pub(super) fn db_update_record(ctx: &mut CallContext<'_>, args: &[Value]) -> VmResult<Value> {
    expect_args(ctx, args, 3)?;
    let coll = collection(ctx, args)?;
    let Some(id) = record_id(ctx, args)? else {
        return Ok(Value::Bool(false));
    };
    outcome(ctx, coll.update_record(id, &args[2]).map(Value::Bool))
}

pub(super) fn db_drop_record(ctx: &mut CallContext<'_>, args: &[Value]) -> VmResult<Value> {
    let coll = collection(ctx, args)?;
    let Some(id) = record_id(ctx, args)? else {
        return Ok(Value::Bool(false));
    };
    outcome(ctx, coll.drop_record(id).map(Value::Bool))
}

pub(super) fn db_total_records(ctx: &mut CallContext<'_>, args: &[Value]) -> VmResult<Value> {
    let coll = collection(ctx, args)?;
    outcome(ctx, coll.total_records().map(id_value))
}

pub(super) fn db_last_record_id(ctx: &mut CallContext<'_>, args: &[Value]) -> VmResult<Value> {
    let coll = collection(ctx, args)?;
    outcome(
        ctx,
        coll.last_record_id().map(|id| id.map_or(Value::Null, id_value)),
    )
}

/// Id of the record the next `db_fetch` would return, or null.
pub(super) fn db_current_record_id(ctx: &mut CallContext<'_>, args: &[Value]) -> VmResult<Value> {
    let coll = collection(ctx, args)?;
    let after = *ctx.record_cursor(coll.name());
    outcome(
        ctx,
        coll.fetch_next(after)
            .map(|next| next.map_or(Value::Null, |(id, _)| id_value(id))),
    )
}

pub(super) fn db_reset_record_cursor(ctx: &mut CallContext<'_>, args: &[Value]) -> VmResult<Value> {
    expect_args(ctx, args, 1)?;
    ctx.require_database()?;
    ctx.forget_record_cursor(&collection_name(args));
    Ok(Value::Bool(true))
}

fn transaction(
    ctx: &mut CallContext<'_>,
    op: impl FnOnce(&Database) -> CoreResult<()>,
) -> VmResult<Value> {
    let db = ctx.require_database()?;
    op(db).map_err(|e| ctx.error(e))?;
    Ok(Value::Bool(true))
}

pub(super) fn db_begin(ctx: &mut CallContext<'_>, _args: &[Value]) -> VmResult<Value> {
    transaction(ctx, |db| db.begin().map(|_| ()))
}

pub(super) fn db_commit(ctx: &mut CallContext<'_>, _args: &[Value]) -> VmResult<Value> {
    transaction(ctx, Database::commit)
}

pub(super) fn db_rollback(ctx: &mut CallContext<'_>, _args: &[Value]) -> VmResult<Value> {
    transaction(ctx, Database::rollback)
}

fn kv<T>(
    ctx: &mut CallContext<'_>,
    args: &[Value],
    min: usize,
    op: impl FnOnce(&Database, &[u8]) -> CoreResult<T>,
) -> VmResult<T> {
    expect_args(ctx, args, min)?;
    let db = ctx.require_database()?;
    op(db, &args[0].to_bytes()).map_err(|e| ctx.error(e))
}

/// `kv_store($key, $value)`; the value is stored in its print form.
pub(super) fn kv_store(ctx: &mut CallContext<'_>, args: &[Value]) -> VmResult<Value> {
    kv(ctx, args, 2, |db, key| db.store(key, &args[1].to_bytes()))?;
    Ok(Value::Bool(true))
}

pub(super) fn kv_append(ctx: &mut CallContext<'_>, args: &[Value]) -> VmResult<Value> {
    kv(ctx, args, 2, |db, key| db.append(key, &args[1].to_bytes()))?;
    Ok(Value::Bool(true))
}

pub(super) fn kv_fetch(ctx: &mut CallContext<'_>, args: &[Value]) -> VmResult<Value> {
    let value = kv(ctx, args, 1, Database::fetch)?;
    Ok(value.map_or(Value::Null, Value::from))
}

pub(super) fn kv_delete(ctx: &mut CallContext<'_>, args: &[Value]) -> VmResult<Value> {
    kv(ctx, args, 1, Database::delete).map(Value::Bool)
}

pub(super) fn kv_exists(ctx: &mut CallContext<'_>, args: &[Value]) -> VmResult<Value> {
    kv(ctx, args, 1, Database::exists).map(Value::Bool)
}

#[cfg(test)]
mod tests {
    use super::super::{lookup, tests::call};
    use crate::error::VmResult;
    use crate::vm::CallContext;
    use quarry_codec::{ArrayMap, Value};
    use quarry_core::Database;
    use std::collections::HashMap;

    struct Session {
        db: Database,
        records: HashMap<String, Option<u64>>,
    }

    impl Session {
        fn new() -> Self {
            Self {
                db: Database::open_in_memory().unwrap(),
                records: HashMap::new(),
            }
        }

        fn call(&mut self, name: &str, args: &[Value]) -> VmResult<Value> {
            let mut output = Vec::new();
            let mut ctx = CallContext::new(name, &mut output, Some(&self.db), &mut self.records);
            lookup(name).unwrap()(&mut ctx, args)
        }

        fn ok(&mut self, name: &str, args: &[Value]) -> Value {
            self.call(name, args).unwrap()
        }
    }

    fn doc(name: &str) -> Value {
        let mut map = ArrayMap::new();
        map.insert("name".into(), Value::str(name));
        Value::array(map)
    }

    fn users() -> Value {
        Value::str("users")
    }

    #[test]
    fn collection_lifecycle() {
        let mut s = Session::new();
        assert_eq!(s.ok("db_exists", &[users()]), Value::Bool(false));
        assert_eq!(s.ok("db_create", &[users()]), Value::Bool(true));
        assert_eq!(s.ok("db_create", &[users()]), Value::Bool(false));
        assert_eq!(s.ok("db_store", &[users(), doc("ann")]), Value::Bool(true));
        assert_eq!(s.ok("db_store", &[users(), doc("bob")]), Value::Bool(true));
        assert_eq!(s.ok("db_total_records", &[users()]), Value::Int(2));
        assert_eq!(s.ok("db_last_record_id", &[users()]), Value::Int(1));

        let bob = s.ok("db_fetch_by_id", &[users(), Value::Int(1)]);
        assert_eq!(bob.as_array().unwrap().get_str("name"), Some(&Value::str("bob")));
        assert_eq!(s.ok("db_fetch_by_id", &[users(), Value::Int(-1)]), Value::Null);

        assert_eq!(
            s.ok("db_update_record", &[users(), Value::Int(0), doc("amy")]),
            Value::Bool(true)
        );
        assert_eq!(s.ok("db_drop_record", &[users(), Value::Int(1)]), Value::Bool(true));
        assert_eq!(s.ok("db_drop_record", &[users(), Value::Int(1)]), Value::Bool(false));
        let all = s.ok("db_fetch_all", &[users()]);
        assert_eq!(all.as_array().unwrap().len(), 1);

        assert_eq!(s.ok("db_drop_collection", &[users()]), Value::Bool(true));
        assert_eq!(s.ok("db_total_records", &[users()]), Value::Bool(false));
        assert_eq!(s.ok("db_store", &[users(), doc("x")]), Value::Bool(false));
    }

    #[test]
    fn record_cursor_walks_and_resets() {
        let mut s = Session::new();
        s.ok("db_create", &[users()]);
        s.ok("db_store", &[users(), Value::list([doc("a"), doc("b")])]);

        assert_eq!(s.ok("db_current_record_id", &[users()]), Value::Int(0));
        let first = s.ok("db_fetch", &[users()]);
        assert_eq!(first.as_array().unwrap().get_str("name"), Some(&Value::str("a")));
        assert_eq!(s.ok("db_current_record_id", &[users()]), Value::Int(1));
        s.ok("db_fetch", &[users()]);
        assert_eq!(s.ok("db_fetch", &[users()]), Value::Null);
        assert_eq!(s.ok("db_current_record_id", &[users()]), Value::Null);

        assert_eq!(s.ok("db_reset_record_cursor", &[users()]), Value::Bool(true));
        assert_eq!(s.ok("db_current_record_id", &[users()]), Value::Int(0));
    }

    #[test]
    fn documents_must_be_arrays() {
        let mut s = Session::new();
        s.ok("db_create", &[users()]);
        let err = s.call("db_store", &[users(), Value::Int(3)]).unwrap_err();
        assert!(err.message().starts_with("db_store(): "), "{}", err.message());
    }

    #[test]
    fn raw_key_values() {
        let mut s = Session::new();
        let key = Value::str("k");
        assert_eq!(s.ok("kv_exists", &[key.clone()]), Value::Bool(false));
        assert_eq!(s.ok("kv_fetch", &[key.clone()]), Value::Null);
        s.ok("kv_store", &[key.clone(), Value::Int(12)]);
        s.ok("kv_append", &[key.clone(), Value::str("ab")]);
        assert_eq!(s.ok("kv_fetch", &[key.clone()]), Value::str("12ab"));
        assert_eq!(s.ok("kv_delete", &[key.clone()]), Value::Bool(true));
        assert_eq!(s.ok("kv_delete", &[key]), Value::Bool(false));
    }

    #[test]
    fn transactions_roll_back() {
        let mut s = Session::new();
        assert_eq!(s.ok("db_begin", &[]), Value::Bool(true));
        s.ok("kv_store", &[Value::str("k"), Value::str("v")]);
        assert_eq!(s.ok("db_rollback", &[]), Value::Bool(true));
        assert_eq!(s.ok("kv_exists", &[Value::str("k")]), Value::Bool(false));
        assert!(s.call("db_commit", &[]).is_err());
    }

    #[test]
    fn requires_a_database() {
        let err = call("kv_fetch", &[Value::str("k")]).unwrap_err();
        assert_eq!(
            err.message(),
            "kv_fetch(): no database is attached to this VM"
        );
        let (version, _) = call("db_version", &[]).unwrap();
        assert_eq!(version, Value::str(quarry_core::version()));
    }
}
