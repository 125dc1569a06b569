//! Dynamic script value type.

use bytes::Bytes;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// A dynamically typed value as seen by scripts and stored in documents.
///
/// `Array` is a single construct that acts as both list and map: it keeps
/// insertion order for positional access and a key index for object access.
/// Arrays are shared copy-on-write through an `Arc`, so cloning a value is
/// cheap and mutation clones the backing map only when it is shared.
#[derive(Debug, Clone, Default)]
pub enum Value {
    /// Null value.
    #[default]
    Null,
    /// Boolean value.
    Bool(bool),
    /// Signed 64-bit integer.
    Int(i64),
    /// Double precision float.
    Real(f64),
    /// Byte string. Not required to be UTF-8.
    String(Bytes),
    /// Ordered associative array.
    Array(Arc<ArrayMap>),
    /// Opaque handle owned by the host.
    Resource(u64),
}

/// A number extracted from a value by numeric coercion.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Number {
    /// Integral number.
    Int(i64),
    /// Floating point number.
    Real(f64),
}

impl Number {
    /// Returns the number as a float.
    #[must_use]
    pub fn as_f64(self) -> f64 {
        match self {
            Number::Int(i) => i as f64,
            Number::Real(r) => r,
        }
    }

    /// Converts the number back into a value.
    #[must_use]
    pub fn into_value(self) -> Value {
        match self {
            Number::Int(i) => Value::Int(i),
            Number::Real(r) => Value::Real(r),
        }
    }

    fn compare(self, other: Number) -> Ordering {
        match (self, other) {
            (Number::Int(a), Number::Int(b)) => a.cmp(&b),
            (a, b) => cmp_f64(a.as_f64(), b.as_f64()),
        }
    }
}

/// Key of an [`ArrayMap`] entry.
///
/// String keys that spell a canonical decimal integer (`"7"`, `"-3"`, but not
/// `"07"` or `"+3"`) are normalized to integer keys, so `$a["1"]` and `$a[1]`
/// address the same slot.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ArrayKey {
    /// Integer key.
    Int(i64),
    /// Byte string key.
    Str(Bytes),
}

impl ArrayKey {
    /// Builds a key from a string, normalizing canonical integers.
    pub fn from_bytes(bytes: impl Into<Bytes>) -> Self {
        let bytes = bytes.into();
        match canonical_int(&bytes) {
            Some(i) => ArrayKey::Int(i),
            None => ArrayKey::Str(bytes),
        }
    }

    /// Builds a key from an arbitrary value.
    ///
    /// Booleans map to 0/1, floats truncate toward zero, null maps to the
    /// empty string.
    #[must_use]
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::Null => ArrayKey::Str(Bytes::new()),
            Value::Bool(b) => ArrayKey::Int(i64::from(*b)),
            Value::Int(i) => ArrayKey::Int(*i),
            Value::Real(r) => ArrayKey::Int(*r as i64),
            Value::String(s) => ArrayKey::from_bytes(s.clone()),
            Value::Array(a) => ArrayKey::Int(a.len() as i64),
            Value::Resource(id) => ArrayKey::Int(*id as i64),
        }
    }

    /// Converts the key into a script value.
    #[must_use]
    pub fn to_value(&self) -> Value {
        match self {
            ArrayKey::Int(i) => Value::Int(*i),
            ArrayKey::Str(s) => Value::String(s.clone()),
        }
    }

    /// Renders the key as bytes.
    #[must_use]
    pub fn to_bytes(&self) -> Bytes {
        match self {
            ArrayKey::Int(i) => Bytes::from(i.to_string()),
            ArrayKey::Str(s) => s.clone(),
        }
    }
}

impl From<i64> for ArrayKey {
    fn from(i: i64) -> Self {
        ArrayKey::Int(i)
    }
}

impl From<&str> for ArrayKey {
    fn from(s: &str) -> Self {
        ArrayKey::from_bytes(Bytes::copy_from_slice(s.as_bytes()))
    }
}

impl fmt::Display for ArrayKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArrayKey::Int(i) => write!(f, "{i}"),
            ArrayKey::Str(s) => write!(f, "{}", String::from_utf8_lossy(s)),
        }
    }
}

/// Ordered associative array backing [`Value::Array`].
#[derive(Debug, Clone, Default)]
pub struct ArrayMap {
    entries: Vec<(ArrayKey, Value)>,
    index: HashMap<ArrayKey, usize>,
    next_index: i64,
}

impl ArrayMap {
    /// Creates an empty array.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a list with keys `0..n`.
    #[must_use]
    pub fn from_list(values: impl IntoIterator<Item = Value>) -> Self {
        let mut map = Self::new();
        for value in values {
            map.push(value);
        }
        map
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if there are no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Looks up a key.
    #[must_use]
    pub fn get(&self, key: &ArrayKey) -> Option<&Value> {
        self.index.get(key).map(|&i| &self.entries[i].1)
    }

    /// Looks up a string key.
    #[must_use]
    pub fn get_str(&self, key: &str) -> Option<&Value> {
        self.get(&ArrayKey::from(key))
    }

    /// Mutable lookup.
    pub fn get_mut(&mut self, key: &ArrayKey) -> Option<&mut Value> {
        match self.index.get(key) {
            Some(&i) => Some(&mut self.entries[i].1),
            None => None,
        }
    }

    /// Returns `true` if the key is present.
    #[must_use]
    pub fn contains_key(&self, key: &ArrayKey) -> bool {
        self.index.contains_key(key)
    }

    /// Inserts or overwrites an entry. Overwrites keep the original position.
    pub fn insert(&mut self, key: ArrayKey, value: Value) -> Option<Value> {
        if let Some(&i) = self.index.get(&key) {
            return Some(std::mem::replace(&mut self.entries[i].1, value));
        }
        if let ArrayKey::Int(i) = key {
            if i >= self.next_index {
                self.next_index = i.saturating_add(1);
            }
        }
        self.index.insert(key.clone(), self.entries.len());
        self.entries.push((key, value));
        None
    }

    /// Appends a value under the next free integer key and returns that key.
    pub fn push(&mut self, value: Value) -> i64 {
        let key = self.next_index;
        self.insert(ArrayKey::Int(key), value);
        key
    }

    /// Returns a mutable reference to the entry for `key`, inserting null
    /// if it is missing.
    pub fn entry_or_null(&mut self, key: ArrayKey) -> &mut Value {
        let pos = match self.index.get(&key) {
            Some(&i) => i,
            None => {
                self.insert(key, Value::Null);
                self.entries.len() - 1
            }
        };
        &mut self.entries[pos].1
    }

    /// Removes an entry, preserving the order of the rest.
    pub fn remove(&mut self, key: &ArrayKey) -> Option<Value> {
        let pos = self.index.remove(key)?;
        let (_, value) = self.entries.remove(pos);
        for (k, _) in &self.entries[pos..] {
            if let Some(slot) = self.index.get_mut(k) {
                *slot -= 1;
            }
        }
        Some(value)
    }

    /// The key `push` would use next.
    #[must_use]
    pub fn next_index(&self) -> i64 {
        self.next_index
    }

    /// Iterates entries in insertion order.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = (&ArrayKey, &Value)> + '_ {
        self.entries.iter().map(|(k, v)| (k, v))
    }

    /// Iterates keys in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &ArrayKey> + '_ {
        self.entries.iter().map(|(k, _)| k)
    }

    /// Iterates values in insertion order.
    pub fn values(&self) -> impl Iterator<Item = &Value> + '_ {
        self.entries.iter().map(|(_, v)| v)
    }

    /// Entry at a position in insertion order.
    #[must_use]
    pub fn entry_at(&self, pos: usize) -> Option<(&ArrayKey, &Value)> {
        self.entries.get(pos).map(|(k, v)| (k, v))
    }

    /// Returns `true` if the keys are exactly `0..len` in order.
    #[must_use]
    pub fn is_list(&self) -> bool {
        self.entries
            .iter()
            .enumerate()
            .all(|(i, (k, _))| *k == ArrayKey::Int(i as i64))
    }
}

impl PartialEq for ArrayMap {
    fn eq(&self, other: &Self) -> bool {
        self.entries == other.entries
    }
}

impl FromIterator<(ArrayKey, Value)> for ArrayMap {
    fn from_iter<T: IntoIterator<Item = (ArrayKey, Value)>>(iter: T) -> Self {
        let mut map = ArrayMap::new();
        for (k, v) in iter {
            map.insert(k, v);
        }
        map
    }
}

impl PartialEq for Value {
    /// Structural equality: same tag and same contents.
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Real(a), Value::Real(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => Arc::ptr_eq(a, b) || a == b,
            (Value::Resource(a), Value::Resource(b)) => a == b,
            _ => false,
        }
    }
}

impl Value {
    /// Builds a string value from UTF-8 text.
    pub fn str(s: &str) -> Self {
        Value::String(Bytes::copy_from_slice(s.as_bytes()))
    }

    /// Builds a string value from bytes.
    pub fn bytes(b: impl Into<Bytes>) -> Self {
        Value::String(b.into())
    }

    /// Wraps an array map.
    #[must_use]
    pub fn array(map: ArrayMap) -> Self {
        Value::Array(Arc::new(map))
    }

    /// Builds a list from values.
    pub fn list(values: impl IntoIterator<Item = Value>) -> Self {
        Value::array(ArrayMap::from_list(values))
    }

    /// Builds an empty array.
    #[must_use]
    pub fn empty_array() -> Self {
        Value::array(ArrayMap::new())
    }

    /// Name of the value's type as reported by `gettype`.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Real(_) => "float",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Resource(_) => "resource",
        }
    }

    fn tag_rank(&self) -> u8 {
        match self {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Int(_) => 2,
            Value::Real(_) => 3,
            Value::String(_) => 4,
            Value::Array(_) => 5,
            Value::Resource(_) => 6,
        }
    }

    /// Returns `true` for `Null`.
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Borrows the array map, if this is an array.
    #[must_use]
    pub fn as_array(&self) -> Option<&ArrayMap> {
        match self {
            Value::Array(a) => Some(a),
            _ => None,
        }
    }

    /// Mutably borrows the array map, cloning it first if shared.
    pub fn as_array_mut(&mut self) -> Option<&mut ArrayMap> {
        match self {
            Value::Array(a) => Some(Arc::make_mut(a)),
            _ => None,
        }
    }

    /// Borrows the raw bytes of a string value.
    #[must_use]
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Truthiness used by conditions and `boolval`.
    #[must_use]
    pub fn to_bool(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Real(r) => *r != 0.0,
            Value::String(s) => !(s.is_empty() || &s[..] == b"0"),
            Value::Array(a) => !a.is_empty(),
            Value::Resource(_) => true,
        }
    }

    /// Numeric coercion. Strings contribute their leading numeric prefix.
    #[must_use]
    pub fn to_number(&self) -> Number {
        match self {
            Value::Null => Number::Int(0),
            Value::Bool(b) => Number::Int(i64::from(*b)),
            Value::Int(i) => Number::Int(*i),
            Value::Real(r) => Number::Real(*r),
            Value::String(s) => numeric_prefix(s),
            Value::Array(a) => Number::Int(i64::from(!a.is_empty())),
            Value::Resource(id) => Number::Int(*id as i64),
        }
    }

    /// Integer coercion used by `intval`.
    #[must_use]
    pub fn to_int(&self) -> i64 {
        match self.to_number() {
            Number::Int(i) => i,
            Number::Real(r) => real_to_int(r),
        }
    }

    /// Float coercion used by `floatval`.
    #[must_use]
    pub fn to_real(&self) -> f64 {
        self.to_number().as_f64()
    }

    /// Returns the number if the value is numeric or a numeric-looking string.
    #[must_use]
    pub fn as_numeric(&self) -> Option<Number> {
        match self {
            Value::Int(i) => Some(Number::Int(*i)),
            Value::Real(r) => Some(Number::Real(*r)),
            Value::String(s) => parse_numeric(s),
            _ => None,
        }
    }

    /// String conversion used by `print`, concatenation and `strval`.
    #[must_use]
    pub fn to_bytes(&self) -> Bytes {
        match self {
            Value::Null | Value::Bool(false) => Bytes::new(),
            Value::Bool(true) => Bytes::from_static(b"1"),
            Value::Int(i) => Bytes::from(i.to_string()),
            Value::Real(r) => Bytes::from(format_real(*r)),
            Value::String(s) => s.clone(),
            Value::Array(_) => Bytes::from(crate::json::to_json_string(self)),
            Value::Resource(id) => Bytes::from(format!("resource(#{id})")),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&String::from_utf8_lossy(&self.to_bytes()))
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<f64> for Value {
    fn from(r: f64) -> Self {
        Value::Real(r)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::str(s)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(Bytes::from(s))
    }
}

impl From<Vec<u8>> for Value {
    fn from(b: Vec<u8>) -> Self {
        Value::String(Bytes::from(b))
    }
}

impl From<ArrayMap> for Value {
    fn from(map: ArrayMap) -> Self {
        Value::array(map)
    }
}

/// Formats a float in its shortest form; integral values print without a
/// fractional part.
#[must_use]
pub fn format_real(r: f64) -> String {
    if r.is_nan() {
        return "NAN".to_string();
    }
    if r.is_infinite() {
        return if r > 0.0 { "INF" } else { "-INF" }.to_string();
    }
    if r == r.trunc() && r.abs() < 1e15 {
        return format!("{}", r as i64);
    }
    format!("{r}")
}

/// Compares two values.
///
/// With `strict`, values of different types are never equal and are ordered
/// by type. Without it, numeric-looking strings are coerced to numbers,
/// booleans compare by truthiness and null equals the empty string.
#[must_use]
pub fn compare(a: &Value, b: &Value, strict: bool) -> Ordering {
    if strict {
        return compare_strict(a, b);
    }
    match (a, b) {
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Null, Value::String(s)) => 0.cmp(&s.len()),
        (Value::String(s), Value::Null) => s.len().cmp(&0),
        (Value::Bool(_) | Value::Null, _) | (_, Value::Bool(_) | Value::Null) => {
            a.to_bool().cmp(&b.to_bool())
        }
        (Value::String(x), Value::String(y)) => match (parse_numeric(x), parse_numeric(y)) {
            (Some(nx), Some(ny)) => nx.compare(ny),
            _ => x.cmp(y),
        },
        (Value::Array(x), Value::Array(y)) => compare_arrays(x, y, false),
        (Value::Array(_), _) => Ordering::Greater,
        (_, Value::Array(_)) => Ordering::Less,
        (Value::String(s), other) => match parse_numeric(s) {
            Some(n) => n.compare(other.to_number()),
            None => s.cmp(&other.to_bytes()),
        },
        (other, Value::String(s)) => match parse_numeric(s) {
            Some(n) => other.to_number().compare(n),
            None => other.to_bytes().cmp(s),
        },
        _ => a.to_number().compare(b.to_number()),
    }
}

fn compare_strict(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Int(x), Value::Int(y)) => x.cmp(y),
        (Value::Real(x), Value::Real(y)) => cmp_f64(*x, *y),
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Array(x), Value::Array(y)) => compare_arrays(x, y, true),
        (Value::Resource(x), Value::Resource(y)) => x.cmp(y),
        _ => a.tag_rank().cmp(&b.tag_rank()),
    }
}

fn compare_arrays(a: &ArrayMap, b: &ArrayMap, strict: bool) -> Ordering {
    match a.len().cmp(&b.len()) {
        Ordering::Equal => {}
        ord => return ord,
    }
    if strict {
        for ((ka, va), (kb, vb)) in a.iter().zip(b.iter()) {
            if ka != kb {
                return Ordering::Greater;
            }
            let ord = compare_strict(va, vb);
            if ord != Ordering::Equal {
                return ord;
            }
        }
        return Ordering::Equal;
    }
    for (key, va) in a.iter() {
        let Some(vb) = b.get(key) else {
            return Ordering::Greater;
        };
        let ord = compare(va, vb, false);
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}

/// Loose equality (`==`).
#[must_use]
pub fn loose_eq(a: &Value, b: &Value) -> bool {
    compare(a, b, false) == Ordering::Equal && !is_nan(a) && !is_nan(b)
}

/// Strict equality (`===`).
#[must_use]
pub fn strict_eq(a: &Value, b: &Value) -> bool {
    compare(a, b, true) == Ordering::Equal && !is_nan(a) && !is_nan(b)
}

fn is_nan(v: &Value) -> bool {
    matches!(v, Value::Real(r) if r.is_nan())
}

fn cmp_f64(a: f64, b: f64) -> Ordering {
    a.partial_cmp(&b).unwrap_or(Ordering::Less)
}

fn real_to_int(r: f64) -> i64 {
    if r.is_nan() {
        0
    } else {
        r as i64
    }
}

/// Parses a whole string (surrounding ASCII whitespace allowed) as a number.
#[must_use]
pub fn parse_numeric(bytes: &[u8]) -> Option<Number> {
    let text = std::str::from_utf8(bytes).ok()?.trim();
    if text.is_empty() {
        return None;
    }
    let body = text.strip_prefix(['+', '-']).unwrap_or(text);
    if !body.bytes().next()?.is_ascii_digit() && !body.starts_with('.') {
        return None;
    }
    if body.bytes().all(|b| b.is_ascii_digit()) {
        if let Ok(i) = text.parse::<i64>() {
            return Some(Number::Int(i));
        }
    }
    let valid = body
        .bytes()
        .all(|b| b.is_ascii_digit() || matches!(b, b'.' | b'e' | b'E' | b'+' | b'-'));
    if !valid {
        return None;
    }
    text.parse::<f64>().ok().map(Number::Real)
}

fn numeric_prefix(bytes: &[u8]) -> Number {
    let start = bytes
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(bytes.len());
    let rest = &bytes[start..];
    let mut end = 0;
    if matches!(rest.first(), Some(b'+' | b'-')) {
        end = 1;
    }
    let digits_start = end;
    while end < rest.len() && rest[end].is_ascii_digit() {
        end += 1;
    }
    let int_end = end;
    if end < rest.len() && rest[end] == b'.' {
        end += 1;
        while end < rest.len() && rest[end].is_ascii_digit() {
            end += 1;
        }
    }
    if end > digits_start && end < rest.len() && matches!(rest[end], b'e' | b'E') {
        let mut exp_end = end + 1;
        if matches!(rest.get(exp_end), Some(b'+' | b'-')) {
            exp_end += 1;
        }
        let digits = exp_end;
        while exp_end < rest.len() && rest[exp_end].is_ascii_digit() {
            exp_end += 1;
        }
        if exp_end > digits {
            end = exp_end;
        }
    }
    let text = std::str::from_utf8(&rest[..end]).unwrap_or("");
    if end == int_end {
        if int_end == digits_start {
            return Number::Int(0);
        }
        return match text.parse::<i64>() {
            Ok(i) => Number::Int(i),
            Err(_) => Number::Real(text.parse::<f64>().unwrap_or(0.0)),
        };
    }
    Number::Real(text.parse::<f64>().unwrap_or(0.0))
}

fn canonical_int(bytes: &[u8]) -> Option<i64> {
    let digits = bytes.strip_prefix(b"-").unwrap_or(bytes);
    if digits.is_empty() || !digits.iter().all(u8::is_ascii_digit) {
        return None;
    }
    if digits.len() > 1 && digits[0] == b'0' {
        return None;
    }
    if bytes == b"-0" {
        return None;
    }
    std::str::from_utf8(bytes).ok()?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn array_key_normalizes_canonical_integers() {
        assert_eq!(ArrayKey::from("12"), ArrayKey::Int(12));
        assert_eq!(ArrayKey::from("-3"), ArrayKey::Int(-3));
        assert_eq!(ArrayKey::from("07"), ArrayKey::Str(Bytes::from_static(b"07")));
        assert_eq!(ArrayKey::from("-0"), ArrayKey::Str(Bytes::from_static(b"-0")));
        assert_eq!(ArrayKey::from("1.5"), ArrayKey::Str(Bytes::from_static(b"1.5")));
        assert_eq!(ArrayKey::from_value(&Value::Real(2.9)), ArrayKey::Int(2));
        assert_eq!(ArrayKey::from_value(&Value::Bool(true)), ArrayKey::Int(1));
    }

    #[test]
    fn array_map_preserves_insertion_order() {
        let mut map = ArrayMap::new();
        map.insert("b".into(), Value::Int(1));
        map.insert("a".into(), Value::Int(2));
        map.push(Value::Int(3));
        map.insert("b".into(), Value::Int(9));

        let keys: Vec<String> = map.keys().map(ToString::to_string).collect();
        assert_eq!(keys, vec!["b", "a", "0"]);
        assert_eq!(map.get_str("b"), Some(&Value::Int(9)));
    }

    #[test]
    fn array_map_push_follows_highest_int_key() {
        let mut map = ArrayMap::new();
        map.insert(ArrayKey::Int(5), Value::Null);
        assert_eq!(map.push(Value::Null), 6);
        map.insert(ArrayKey::Int(2), Value::Null);
        assert_eq!(map.push(Value::Null), 7);
    }

    #[test]
    fn array_map_remove_reindexes() {
        let mut map = ArrayMap::from_list([Value::Int(10), Value::Int(20), Value::Int(30)]);
        assert_eq!(map.remove(&ArrayKey::Int(0)), Some(Value::Int(10)));
        assert_eq!(map.get(&ArrayKey::Int(2)), Some(&Value::Int(30)));
        assert_eq!(map.entry_at(0).map(|(k, _)| k.clone()), Some(ArrayKey::Int(1)));
        assert!(!map.is_list());
        assert_eq!(map.push(Value::Int(40)), 3);
    }

    #[test]
    fn array_values_are_copy_on_write() {
        let original = Value::list([Value::Int(1)]);
        let mut copy = original.clone();
        copy.as_array_mut().unwrap().push(Value::Int(2));
        assert_eq!(original.as_array().unwrap().len(), 1);
        assert_eq!(copy.as_array().unwrap().len(), 2);
    }

    #[test]
    fn is_list_detects_dense_keys() {
        assert!(ArrayMap::from_list([Value::Null, Value::Null]).is_list());
        assert!(ArrayMap::new().is_list());
        let mut map = ArrayMap::new();
        map.insert(ArrayKey::Int(1), Value::Null);
        assert!(!map.is_list());
    }

    #[test]
    fn truthiness() {
        assert!(!Value::Null.to_bool());
        assert!(!Value::str("").to_bool());
        assert!(!Value::str("0").to_bool());
        assert!(Value::str("0.0").to_bool());
        assert!(!Value::empty_array().to_bool());
        assert!(Value::list([Value::Null]).to_bool());
        assert!(!Value::Real(0.0).to_bool());
    }

    #[test]
    fn numeric_coercion_uses_leading_prefix() {
        assert_eq!(Value::str("42abc").to_number(), Number::Int(42));
        assert_eq!(Value::str("  -7").to_number(), Number::Int(-7));
        assert_eq!(Value::str("3.5kg").to_number(), Number::Real(3.5));
        assert_eq!(Value::str("1e3").to_number(), Number::Real(1000.0));
        assert_eq!(Value::str("abc").to_number(), Number::Int(0));
        assert_eq!(Value::Real(3.99).to_int(), 3);
    }

    #[test]
    fn parse_numeric_requires_whole_string() {
        assert_eq!(parse_numeric(b"42"), Some(Number::Int(42)));
        assert_eq!(parse_numeric(b" 4.5 "), Some(Number::Real(4.5)));
        assert_eq!(parse_numeric(b"42abc"), None);
        assert_eq!(parse_numeric(b""), None);
        assert_eq!(parse_numeric(b"inf"), None);
        assert_eq!(parse_numeric(b"nan"), None);
    }

    #[test]
    fn string_conversion() {
        assert_eq!(Value::Int(42).to_string(), "42");
        assert_eq!(Value::Real(3.0).to_string(), "3");
        assert_eq!(Value::Real(3.5).to_string(), "3.5");
        assert_eq!(Value::Bool(true).to_string(), "1");
        assert_eq!(Value::Bool(false).to_string(), "");
        assert_eq!(Value::Null.to_string(), "");
        assert_eq!(Value::list([Value::Int(1), Value::str("a")]).to_string(), "[1,\"a\"]");
    }

    #[test]
    fn loose_comparison_coerces_numeric_strings() {
        assert!(loose_eq(&Value::str("10"), &Value::Int(10)));
        assert!(loose_eq(&Value::str("1e1"), &Value::str("10")));
        assert!(loose_eq(&Value::Int(1), &Value::Real(1.0)));
        assert!(loose_eq(&Value::Null, &Value::str("")));
        assert!(loose_eq(&Value::Bool(true), &Value::str("yes")));
        assert!(!loose_eq(&Value::str("abc"), &Value::Int(0)));
        assert_eq!(compare(&Value::str("9"), &Value::str("10"), false), Ordering::Less);
        assert_eq!(compare(&Value::str("b"), &Value::str("a"), false), Ordering::Greater);
    }

    #[test]
    fn strict_comparison_requires_same_tag() {
        assert!(!strict_eq(&Value::str("10"), &Value::Int(10)));
        assert!(!strict_eq(&Value::Int(1), &Value::Real(1.0)));
        assert!(strict_eq(&Value::Int(1), &Value::Int(1)));
        assert!(strict_eq(
            &Value::list([Value::str("x")]),
            &Value::list([Value::str("x")])
        ));
    }

    #[test]
    fn nan_is_never_equal() {
        let nan = Value::Real(f64::NAN);
        assert!(!loose_eq(&nan, &nan));
        assert!(!strict_eq(&nan, &nan));
    }

    #[test]
    fn array_loose_comparison_by_key() {
        let mut a = ArrayMap::new();
        a.insert("x".into(), Value::Int(1));
        a.insert("y".into(), Value::Int(2));
        let mut b = ArrayMap::new();
        b.insert("y".into(), Value::str("2"));
        b.insert("x".into(), Value::str("1"));
        assert!(loose_eq(&Value::array(a.clone()), &Value::array(b.clone())));
        assert!(!strict_eq(&Value::array(a), &Value::array(b)));
    }
}
