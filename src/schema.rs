use std::cmp::Ordering;

use base64::Engine as _;
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, TimeZone, Utc};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::node::{NumberFormat, Scalar, ScalarValue};
use crate::{
    BINARY_TAG, BOOL_TAG, FLOAT_TAG, INT_TAG, MAP_TAG, MERGE_TAG, NULL_TAG, OMAP_TAG, PAIRS_TAG,
    SEQ_TAG, SET_TAG, STR_TAG, TIMESTAMP_TAG,
};

/// The built-in schema presets.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
#[non_exhaustive]
pub enum SchemaId {
    /// Maps, sequences and strings only.
    Failsafe,
    /// Adds the JSON scalar types with strict patterns.
    Json,
    /// The YAML 1.2 core schema.
    #[default]
    Core,
    /// The YAML 1.1 tag set: expanded bool/null/int patterns, timestamps,
    /// binary, `!!merge`, `!!omap`, `!!pairs`, `!!set`.
    Yaml11,
}

/// Ordering applied to mapping entries on mutation and serialization.
#[derive(Copy, Clone)]
pub enum SortEntries {
    /// Lexicographic by key representation.
    Lexicographic,
    /// A caller-supplied comparator over key representations.
    By(fn(&str, &str) -> Ordering),
}

impl SortEntries {
    pub fn compare(&self, a: &str, b: &str) -> Ordering {
        match self {
            SortEntries::Lexicographic => a.cmp(b),
            SortEntries::By(f) => f(a, b),
        }
    }
}

impl std::fmt::Debug for SortEntries {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SortEntries::Lexicographic => f.write_str("Lexicographic"),
            SortEntries::By(_) => f.write_str("By(..)"),
        }
    }
}

/// A tag definition.
///
/// `pattern` drives implicit resolution of plain scalars; patterns are
/// tried in registration order and the first match wins. `resolve` turns
/// matched (or explicitly tagged) source text into a native value;
/// `identify` answers whether a native value belongs to this tag when
/// building nodes from values; `stringify` overrides the generic scalar
/// rendering where the tag needs one.
#[derive(Clone)]
pub struct Tag {
    /// The absolute tag URI.
    pub tag: &'static str,
    /// Implicit match pattern for plain scalars.
    pub pattern: Option<&'static Lazy<Regex>>,
    pub resolve: fn(&str) -> Option<ScalarValue>,
    pub identify: fn(&ScalarValue) -> bool,
    /// Custom scalar rendering, e.g. base64 for `!!binary`.
    pub stringify: Option<fn(&Scalar) -> String>,
    /// Custom node construction for tags whose inputs are not plain
    /// scalars; consulted by [`Document::create_node`](crate::Document).
    pub create_node: Option<fn(&mut crate::Document, &crate::Value) -> crate::NodeId>,
    /// Number format implied by the pattern, e.g. hex integers.
    pub format: Option<NumberFormat>,
    /// Tags for collection kinds resolve structurally, not from text.
    pub collection: bool,
}

impl std::fmt::Debug for Tag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tag").field("tag", &self.tag).finish()
    }
}

impl Tag {
    fn collection(tag: &'static str) -> Tag {
        Tag {
            tag,
            pattern: None,
            resolve: |_| None,
            identify: |_| false,
            stringify: None,
            create_node: None,
            format: None,
            collection: true,
        }
    }

    fn scalar(
        tag: &'static str,
        pattern: Option<&'static Lazy<Regex>>,
        resolve: fn(&str) -> Option<ScalarValue>,
        identify: fn(&ScalarValue) -> bool,
    ) -> Tag {
        Tag {
            tag,
            pattern,
            resolve,
            identify,
            stringify: None,
            create_node: None,
            format: None,
            collection: false,
        }
    }

    fn with_format(mut self, format: NumberFormat) -> Tag {
        self.format = Some(format);
        self
    }

    fn with_stringify(mut self, f: fn(&Scalar) -> String) -> Tag {
        self.stringify = Some(f);
        self
    }
}

/// The active tag set of a document.
#[derive(Clone, Debug)]
pub struct Schema {
    pub id: SchemaId,
    pub tags: Vec<Tag>,
    /// Whether `<<` merge keys are resolved (YAML 1.1 only).
    pub merge: bool,
    /// Mapping entry ordering, honored by `set`/`add` and the stringifier.
    pub sort_map_entries: Option<SortEntries>,
}

impl Default for Schema {
    fn default() -> Self {
        Schema::new(SchemaId::Core)
    }
}

impl Schema {
    pub fn new(id: SchemaId) -> Schema {
        let tags = match id {
            SchemaId::Failsafe => failsafe_tags(),
            SchemaId::Json => json_tags(),
            SchemaId::Core => core_tags(),
            SchemaId::Yaml11 => yaml11_tags(),
        };
        Schema {
            id,
            tags,
            merge: id == SchemaId::Yaml11,
            sort_map_entries: None,
        }
    }

    /// Append caller-supplied tags; they win lookups by URI but implicit
    /// patterns still run in registration order.
    #[must_use]
    pub fn with_custom_tags(mut self, tags: Vec<Tag>) -> Schema {
        self.tags.extend(tags);
        self
    }

    pub fn find_tag(&self, uri: &str) -> Option<&Tag> {
        self.tags.iter().rev().find(|t| t.tag == uri)
    }

    /// Implicitly resolve a plain scalar, in tag registration order.
    pub fn resolve_scalar(&self, src: &str) -> Option<(&Tag, ScalarValue)> {
        for tag in &self.tags {
            let Some(pattern) = tag.pattern else { continue };
            if pattern.is_match(src) {
                if let Some(value) = (tag.resolve)(src) {
                    return Some((tag, value));
                }
            }
        }
        None
    }

    /// The tag a native scalar value belongs to.
    pub fn tag_for_scalar(&self, value: &ScalarValue) -> &'static str {
        for tag in &self.tags {
            if (tag.identify)(value) {
                return tag.tag;
            }
        }
        STR_TAG
    }

    /// Would this string resolve to something other than `!!str`?
    ///
    /// The stringifier refuses plain style for such strings, so `"true"`
    /// stays a string on re-parse.
    pub fn is_implicitly_typed(&self, src: &str) -> bool {
        self.resolve_scalar(src).is_some()
    }
}

fn identify_null(v: &ScalarValue) -> bool {
    matches!(v, ScalarValue::Null)
}
fn identify_bool(v: &ScalarValue) -> bool {
    matches!(v, ScalarValue::Bool(_))
}
fn identify_int(v: &ScalarValue) -> bool {
    matches!(v, ScalarValue::Int(_))
}
fn identify_float(v: &ScalarValue) -> bool {
    matches!(v, ScalarValue::Float(_))
}
fn identify_str(v: &ScalarValue) -> bool {
    matches!(v, ScalarValue::Str(_))
}
fn identify_bytes(v: &ScalarValue) -> bool {
    matches!(v, ScalarValue::Bytes(_))
}
fn identify_timestamp(v: &ScalarValue) -> bool {
    matches!(v, ScalarValue::Timestamp(_))
}

fn resolve_str(src: &str) -> Option<ScalarValue> {
    Some(ScalarValue::Str(String::from(src)))
}

fn resolve_null(_: &str) -> Option<ScalarValue> {
    Some(ScalarValue::Null)
}

fn resolve_bool_strict(src: &str) -> Option<ScalarValue> {
    match src {
        "true" => Some(ScalarValue::Bool(true)),
        "false" => Some(ScalarValue::Bool(false)),
        _ => None,
    }
}

fn resolve_bool_core(src: &str) -> Option<ScalarValue> {
    match src {
        "true" | "True" | "TRUE" => Some(ScalarValue::Bool(true)),
        "false" | "False" | "FALSE" => Some(ScalarValue::Bool(false)),
        _ => None,
    }
}

fn resolve_bool_11(src: &str) -> Option<ScalarValue> {
    match src {
        "y" | "Y" | "yes" | "Yes" | "YES" | "true" | "True" | "TRUE" | "on" | "On" | "ON" => {
            Some(ScalarValue::Bool(true))
        }
        "n" | "N" | "no" | "No" | "NO" | "false" | "False" | "FALSE" | "off" | "Off" | "OFF" => {
            Some(ScalarValue::Bool(false))
        }
        _ => None,
    }
}

/// Parse an integer, falling back to a float when it overflows `i64`.
fn int_or_overflow(digits: &str, radix: u32, negative: bool) -> ScalarValue {
    match i64::from_str_radix(digits, radix) {
        Ok(i) => ScalarValue::Int(if negative { -i } else { i }),
        Err(_) => {
            let f = digits
                .chars()
                .fold(0f64, |acc, c| acc * f64::from(radix) + f64::from(c.to_digit(radix).unwrap_or(0)));
            ScalarValue::Float(if negative { -f } else { f })
        }
    }
}

fn resolve_int_decimal(src: &str) -> Option<ScalarValue> {
    let cleaned: String = src.chars().filter(|&c| c != '_').collect();
    let (negative, digits) = match cleaned.strip_prefix('-') {
        Some(d) => (true, d),
        None => (false, cleaned.strip_prefix('+').unwrap_or(&cleaned)),
    };
    Some(int_or_overflow(digits, 10, negative))
}

fn resolve_int_hex(src: &str) -> Option<ScalarValue> {
    let cleaned: String = src.chars().filter(|&c| c != '_').collect();
    let (negative, rest) = match cleaned.strip_prefix('-') {
        Some(d) => (true, d),
        None => (false, cleaned.strip_prefix('+').unwrap_or(&cleaned)),
    };
    let digits = rest.strip_prefix("0x").or_else(|| rest.strip_prefix("0X"))?;
    Some(int_or_overflow(digits, 16, negative))
}

fn resolve_int_oct_12(src: &str) -> Option<ScalarValue> {
    let digits = src.strip_prefix("0o")?;
    Some(int_or_overflow(digits, 8, false))
}

fn resolve_int_oct_11(src: &str) -> Option<ScalarValue> {
    let cleaned: String = src.chars().filter(|&c| c != '_').collect();
    let (negative, rest) = match cleaned.strip_prefix('-') {
        Some(d) => (true, d),
        None => (false, cleaned.strip_prefix('+').unwrap_or(&cleaned)),
    };
    let digits = rest.strip_prefix('0')?;
    Some(int_or_overflow(digits, 8, negative))
}

fn resolve_int_bin(src: &str) -> Option<ScalarValue> {
    let cleaned: String = src.chars().filter(|&c| c != '_').collect();
    let (negative, rest) = match cleaned.strip_prefix('-') {
        Some(d) => (true, d),
        None => (false, cleaned.strip_prefix('+').unwrap_or(&cleaned)),
    };
    let digits = rest.strip_prefix("0b")?;
    Some(int_or_overflow(digits, 2, negative))
}

fn resolve_float(src: &str) -> Option<ScalarValue> {
    let cleaned: String = src.chars().filter(|&c| c != '_').collect();
    match cleaned.as_str() {
        ".inf" | ".Inf" | ".INF" | "+.inf" | "+.Inf" | "+.INF" => {
            Some(ScalarValue::Float(f64::INFINITY))
        }
        "-.inf" | "-.Inf" | "-.INF" => Some(ScalarValue::Float(f64::NEG_INFINITY)),
        ".nan" | ".NaN" | ".NAN" => Some(ScalarValue::Float(f64::NAN)),
        other => other.parse::<f64>().ok().map(ScalarValue::Float),
    }
}

fn resolve_binary(src: &str) -> Option<ScalarValue> {
    let cleaned: String = src.chars().filter(|c| !c.is_whitespace()).collect();
    base64::engine::general_purpose::STANDARD
        .decode(cleaned)
        .ok()
        .map(ScalarValue::Bytes)
}

pub(crate) fn format_binary(bytes: &[u8]) -> String {
    base64::engine::general_purpose::STANDARD.encode(bytes)
}

fn stringify_binary(scalar: &Scalar) -> String {
    match &scalar.value {
        ScalarValue::Bytes(bytes) => format_binary(bytes),
        other => other.key_repr(),
    }
}

fn resolve_timestamp(src: &str) -> Option<ScalarValue> {
    if let Ok(date) = NaiveDate::parse_from_str(src, "%Y-%m-%d") {
        let dt = Utc
            .from_utc_datetime(&date.and_hms_opt(0, 0, 0)?)
            .fixed_offset();
        return Some(ScalarValue::Timestamp(dt));
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(src) {
        return Some(ScalarValue::Timestamp(dt));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(src, format) {
            return Some(ScalarValue::Timestamp(
                Utc.from_utc_datetime(&naive).fixed_offset(),
            ));
        }
    }
    None
}

fn stringify_timestamp(scalar: &Scalar) -> String {
    match &scalar.value {
        ScalarValue::Timestamp(ts) => format_timestamp(ts),
        other => other.key_repr(),
    }
}

pub(crate) fn format_timestamp(ts: &DateTime<FixedOffset>) -> String {
    use chrono::Timelike;
    let midnight_utc = ts.offset().local_minus_utc() == 0
        && ts.hour() == 0
        && ts.minute() == 0
        && ts.second() == 0
        && ts.nanosecond() == 0;
    if midnight_utc {
        ts.format("%Y-%m-%d").to_string()
    } else {
        ts.to_rfc3339()
    }
}

static JSON_NULL: Lazy<Regex> = Lazy::new(|| Regex::new(r"^null$").unwrap());
static JSON_BOOL: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(?:true|false)$").unwrap());
static JSON_INT: Lazy<Regex> = Lazy::new(|| Regex::new(r"^-?(?:0|[1-9][0-9]*)$").unwrap());
static JSON_FLOAT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^-?(?:0|[1-9][0-9]*)(?:\.[0-9]*)?(?:[eE][-+]?[0-9]+)?$").unwrap());

static CORE_NULL: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(?:~|null|Null|NULL|)$").unwrap());
static CORE_BOOL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:true|True|TRUE|false|False|FALSE)$").unwrap());
static CORE_INT: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[-+]?[0-9]+$").unwrap());
static CORE_INT_OCT: Lazy<Regex> = Lazy::new(|| Regex::new(r"^0o[0-7]+$").unwrap());
static CORE_INT_HEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^0x[0-9a-fA-F]+$").unwrap());
static CORE_FLOAT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:[-+]?(?:\.[0-9]+|[0-9]+(?:\.[0-9]*)?)(?:[eE][-+]?[0-9]+)?|[-+]?\.(?:inf|Inf|INF)|\.(?:nan|NaN|NAN))$")
        .unwrap()
});

static Y11_NULL: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(?:~|null|Null|NULL|)$").unwrap());
static Y11_BOOL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:y|Y|yes|Yes|YES|n|N|no|No|NO|true|True|TRUE|false|False|FALSE|on|On|ON|off|Off|OFF)$")
        .unwrap()
});
static Y11_INT_BIN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[-+]?0b[0-1_]+$").unwrap());
static Y11_INT_HEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[-+]?0x[0-9a-fA-F_]+$").unwrap());
static Y11_INT_OCT: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[-+]?0[0-7_]+$").unwrap());
static Y11_INT: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[-+]?(?:0|[1-9][0-9_]*)$").unwrap());
static Y11_FLOAT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:[-+]?(?:\.[0-9_]+|[0-9][0-9_]*(?:\.[0-9_]*)?)(?:[eE][-+]?[0-9]+)?|[-+]?\.(?:inf|Inf|INF)|\.(?:nan|NaN|NAN))$")
        .unwrap()
});
static Y11_TIMESTAMP: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:[0-9]{4}-[0-9]{2}-[0-9]{2}|[0-9]{4}-[0-9]{1,2}-[0-9]{1,2}(?:[Tt]|[ \t]+)[0-9]{1,2}:[0-9]{2}:[0-9]{2}(?:\.[0-9]*)?(?:[ \t]*(?:Z|[-+][0-9]{1,2}(?::[0-9]{2})?))?)$")
        .unwrap()
});
static Y11_MERGE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^<<$").unwrap());

fn resolve_merge(_: &str) -> Option<ScalarValue> {
    Some(ScalarValue::Str(String::from("<<")))
}

fn string_tag() -> Tag {
    Tag::scalar(STR_TAG, None, resolve_str, identify_str)
}

fn failsafe_tags() -> Vec<Tag> {
    vec![
        Tag::collection(MAP_TAG),
        Tag::collection(SEQ_TAG),
        string_tag(),
    ]
}

fn json_tags() -> Vec<Tag> {
    let mut tags = vec![
        Tag::collection(MAP_TAG),
        Tag::collection(SEQ_TAG),
        Tag::scalar(NULL_TAG, Some(&JSON_NULL), resolve_null, identify_null),
        Tag::scalar(BOOL_TAG, Some(&JSON_BOOL), resolve_bool_strict, identify_bool),
        Tag::scalar(INT_TAG, Some(&JSON_INT), resolve_int_decimal, identify_int),
        Tag::scalar(FLOAT_TAG, Some(&JSON_FLOAT), resolve_float, identify_float),
    ];
    tags.push(string_tag());
    tags
}

fn core_tags() -> Vec<Tag> {
    vec![
        Tag::collection(MAP_TAG),
        Tag::collection(SEQ_TAG),
        Tag::scalar(NULL_TAG, Some(&CORE_NULL), resolve_null, identify_null),
        Tag::scalar(BOOL_TAG, Some(&CORE_BOOL), resolve_bool_core, identify_bool),
        Tag::scalar(INT_TAG, Some(&CORE_INT), resolve_int_decimal, identify_int),
        Tag::scalar(INT_TAG, Some(&CORE_INT_OCT), resolve_int_oct_12, identify_int)
            .with_format(NumberFormat::Oct),
        Tag::scalar(INT_TAG, Some(&CORE_INT_HEX), resolve_int_hex, identify_int)
            .with_format(NumberFormat::Hex),
        Tag::scalar(FLOAT_TAG, Some(&CORE_FLOAT), resolve_float, identify_float),
        string_tag(),
    ]
}

fn yaml11_tags() -> Vec<Tag> {
    vec![
        Tag::collection(MAP_TAG),
        Tag::collection(SEQ_TAG),
        Tag::collection(OMAP_TAG),
        Tag::collection(PAIRS_TAG),
        Tag::collection(SET_TAG),
        Tag::scalar(MERGE_TAG, Some(&Y11_MERGE), resolve_merge, |_| false),
        Tag::scalar(NULL_TAG, Some(&Y11_NULL), resolve_null, identify_null),
        Tag::scalar(BOOL_TAG, Some(&Y11_BOOL), resolve_bool_11, identify_bool),
        Tag::scalar(INT_TAG, Some(&Y11_INT_BIN), resolve_int_bin, identify_int),
        Tag::scalar(INT_TAG, Some(&Y11_INT_HEX), resolve_int_hex, identify_int)
            .with_format(NumberFormat::Hex),
        Tag::scalar(INT_TAG, Some(&Y11_INT_OCT), resolve_int_oct_11, identify_int)
            .with_format(NumberFormat::Oct),
        Tag::scalar(INT_TAG, Some(&Y11_INT), resolve_int_decimal, identify_int),
        Tag::scalar(FLOAT_TAG, Some(&Y11_FLOAT), resolve_float, identify_float),
        Tag::scalar(
            TIMESTAMP_TAG,
            Some(&Y11_TIMESTAMP),
            resolve_timestamp,
            identify_timestamp,
        )
        .with_stringify(stringify_timestamp),
        Tag::scalar(BINARY_TAG, None, resolve_binary, identify_bytes)
            .with_stringify(stringify_binary),
        string_tag(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolved(schema: &Schema, src: &str) -> Option<ScalarValue> {
        schema.resolve_scalar(src).map(|(_, v)| v)
    }

    #[test]
    fn core_schema_scalars() {
        let schema = Schema::new(SchemaId::Core);
        assert_eq!(resolved(&schema, "null"), Some(ScalarValue::Null));
        assert_eq!(resolved(&schema, "~"), Some(ScalarValue::Null));
        assert_eq!(resolved(&schema, ""), Some(ScalarValue::Null));
        assert_eq!(resolved(&schema, "true"), Some(ScalarValue::Bool(true)));
        assert_eq!(resolved(&schema, "42"), Some(ScalarValue::Int(42)));
        assert_eq!(resolved(&schema, "-7"), Some(ScalarValue::Int(-7)));
        assert_eq!(resolved(&schema, "0x1F"), Some(ScalarValue::Int(31)));
        assert_eq!(resolved(&schema, "0o17"), Some(ScalarValue::Int(15)));
        assert_eq!(resolved(&schema, "1.5"), Some(ScalarValue::Float(1.5)));
        assert_eq!(
            resolved(&schema, "-.inf"),
            Some(ScalarValue::Float(f64::NEG_INFINITY))
        );
        assert_eq!(resolved(&schema, "plain words"), None);
        // 1.1-only forms stay strings in core.
        assert_eq!(resolved(&schema, "yes"), None);
        assert_eq!(resolved(&schema, "0777"), Some(ScalarValue::Int(777)));
    }

    #[test]
    fn yaml11_schema_scalars() {
        let schema = Schema::new(SchemaId::Yaml11);
        for s in ["y", "Y", "yes", "on", "true"] {
            assert_eq!(resolved(&schema, s), Some(ScalarValue::Bool(true)), "{s}");
        }
        for s in ["n", "N", "no", "off", "false"] {
            assert_eq!(resolved(&schema, s), Some(ScalarValue::Bool(false)), "{s}");
        }
        assert_eq!(resolved(&schema, "0777"), Some(ScalarValue::Int(511)));
        assert_eq!(resolved(&schema, "0b1010"), Some(ScalarValue::Int(10)));
        assert_eq!(resolved(&schema, "12_345"), Some(ScalarValue::Int(12345)));
        assert!(matches!(
            resolved(&schema, "2001-12-15"),
            Some(ScalarValue::Timestamp(_))
        ));
        assert!(matches!(
            resolved(&schema, "2001-12-14 21:59:43.10"),
            Some(ScalarValue::Timestamp(_))
        ));
    }

    #[test]
    fn json_schema_is_strict() {
        let schema = Schema::new(SchemaId::Json);
        assert_eq!(resolved(&schema, "True"), None);
        assert_eq!(resolved(&schema, "~"), None);
        assert_eq!(resolved(&schema, "1.5"), Some(ScalarValue::Float(1.5)));
        assert_eq!(resolved(&schema, "01"), None);
    }

    #[test]
    fn failsafe_resolves_nothing() {
        let schema = Schema::new(SchemaId::Failsafe);
        assert_eq!(resolved(&schema, "true"), None);
        assert_eq!(resolved(&schema, "42"), None);
    }

    #[test]
    fn int_overflow_falls_back_to_float() {
        let schema = Schema::new(SchemaId::Core);
        let v = resolved(&schema, "123456789012345678901234567890");
        assert!(matches!(v, Some(ScalarValue::Float(_))));
    }

    #[test]
    fn binary_round_trip() {
        let v = resolve_binary("aGVsbG8=").unwrap();
        assert_eq!(v, ScalarValue::Bytes(b"hello".to_vec()));
        let s = Scalar::new(v);
        assert_eq!(stringify_binary(&s), "aGVsbG8=");
    }

    #[test]
    fn tag_for_scalar_picks_first_identify() {
        let schema = Schema::new(SchemaId::Core);
        assert_eq!(schema.tag_for_scalar(&ScalarValue::Int(3)), INT_TAG);
        assert_eq!(schema.tag_for_scalar(&ScalarValue::Null), NULL_TAG);
        assert_eq!(
            schema.tag_for_scalar(&ScalarValue::Str(String::new())),
            STR_TAG
        );
    }

    #[test]
    fn timestamp_formats_date_only_at_midnight() {
        let ScalarValue::Timestamp(ts) = resolve_timestamp("2001-12-15").unwrap() else {
            panic!("expected timestamp");
        };
        assert_eq!(format_timestamp(&ts), "2001-12-15");
    }
}
