//! A YAML 1.1/1.2 processor.
//!
//! Source text is lexed into tokens, grouped into a token tree, and
//! composed into [`Document`]s whose typed node trees can be queried,
//! edited, resolved to native [`Value`]s, and serialized back to YAML that
//! any conforming loader reads the same way. Style choices survive the
//! round trip: block vs. flow layout, scalar quoting, comments, anchors
//! and aliases.
//!
//! ```
//! use yamlet::{parse, stringify, ParseOptions, StringifyOptions, Value};
//!
//! let value = parse("plot: [twist, twist]\n", &ParseOptions::default()).unwrap();
//! let text = stringify(&value, None, &StringifyOptions::default()).unwrap();
//! assert_eq!(parse(&text, &ParseOptions::default()).unwrap(), value);
//! ```

#![warn(clippy::pedantic)]
#![allow(
    clippy::fn_params_excessive_bools,
    clippy::manual_range_contains,
    clippy::match_wildcard_for_single_variants,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::struct_excessive_bools,
    clippy::too_many_lines
)]
#![deny(unsafe_code)]

mod composer;
mod document;
mod error;
mod lexer;
mod node;
mod options;
mod parser;
mod schema;
mod stringify;
mod token;
mod value;

pub use crate::composer::compose;
pub use crate::document::{Directives, Document, Replacer, TagDirective};
pub use crate::error::{
    Error, ErrorCode, LineCounter, Mark, ResolveError, StringifyError, YamlError,
};
pub use crate::lexer::Lexer;
pub use crate::node::{
    Mapping, Node, NodeData, NodeId, NumberFormat, Pair, Scalar, ScalarValue, Sequence,
};
pub use crate::options::{LogLevel, ParseOptions, StringifyOptions, YamlVersion};
pub use crate::parser::Parser;
pub use crate::schema::{Schema, SchemaId, SortEntries, Tag};
pub use crate::stringify::stringify_document;
pub use crate::token::{
    BlockMapNode, BlockScalarNode, BlockSeqNode, CollectionItem, DocumentNode, FlowCollectionNode,
    FlowKind, FlowScalarNode, FlowScalarStyle, SourceToken, TokenKind, TokenNode,
};
pub use crate::value::Value;

/// The tag `!!null` with the only possible value: `null`.
pub const NULL_TAG: &str = "tag:yaml.org,2002:null";
/// The tag `!!bool` with the values: `true` and `false`.
pub const BOOL_TAG: &str = "tag:yaml.org,2002:bool";
/// The tag `!!str` for string values.
pub const STR_TAG: &str = "tag:yaml.org,2002:str";
/// The tag `!!int` for integer values.
pub const INT_TAG: &str = "tag:yaml.org,2002:int";
/// The tag `!!float` for float values.
pub const FLOAT_TAG: &str = "tag:yaml.org,2002:float";
/// The tag `!!timestamp` for date and time values.
pub const TIMESTAMP_TAG: &str = "tag:yaml.org,2002:timestamp";
/// The tag `!!binary` for base64-encoded binary data.
pub const BINARY_TAG: &str = "tag:yaml.org,2002:binary";
/// The tag `!!merge` for `<<` merge keys.
pub const MERGE_TAG: &str = "tag:yaml.org,2002:merge";

/// The tag `!!seq` is used to denote sequences.
pub const SEQ_TAG: &str = "tag:yaml.org,2002:seq";
/// The tag `!!map` is used to denote mapping.
pub const MAP_TAG: &str = "tag:yaml.org,2002:map";
/// The tag `!!omap` for ordered mappings.
pub const OMAP_TAG: &str = "tag:yaml.org,2002:omap";
/// The tag `!!pairs` for key/value pair lists.
pub const PAIRS_TAG: &str = "tag:yaml.org,2002:pairs";
/// The tag `!!set` for mappings with null values.
pub const SET_TAG: &str = "tag:yaml.org,2002:set";

/// The default scalar tag is `!!str`.
pub const DEFAULT_SCALAR_TAG: &str = STR_TAG;
/// The default sequence tag is `!!seq`.
pub const DEFAULT_SEQUENCE_TAG: &str = SEQ_TAG;
/// The default mapping tag is `!!map`.
pub const DEFAULT_MAPPING_TAG: &str = MAP_TAG;

/// Scalar styles.
#[derive(Copy, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
#[non_exhaustive]
pub enum ScalarStyle {
    /// Let the stringifier choose the style.
    #[default]
    Any,
    /// The plain scalar style.
    Plain,
    /// The single-quoted scalar style.
    SingleQuoted,
    /// The double-quoted scalar style.
    DoubleQuoted,
    /// The literal scalar style.
    Literal,
    /// The folded scalar style.
    Folded,
}

/// Parse a single document and resolve it to a native value.
///
/// The first document error is escalated to an `Err` unless `log_level` is
/// [`LogLevel::Silent`].
pub fn parse(source: &str, options: &ParseOptions) -> Result<Value, Error> {
    let doc = parse_document(source, options);
    if options.log_level != LogLevel::Silent {
        if let Some(err) = doc.errors.first() {
            return Err(Error::Parse(err.clone()));
        }
    }
    Ok(doc.to_value(options.max_alias_count)?)
}

/// Parse exactly one document.
///
/// Empty input yields an empty document; additional documents append a
/// `MULTIPLE_DOCS` error to the first.
pub fn parse_document(source: &str, options: &ParseOptions) -> Document {
    let mut docs = compose(source, options);
    if docs.is_empty() {
        let schema = Schema::new(options.schema_id()).with_custom_tags(options.custom_tags.clone());
        return Document::new(schema);
    }
    let mut doc = docs.remove(0);
    if let Some(extra) = docs.first() {
        let span = extra.range.unwrap_or([source.len(), source.len()]);
        doc.errors.push(YamlError::new(
            ErrorCode::MultipleDocs,
            span,
            "source contains multiple documents; please use parse_all_documents",
        ));
    }
    doc
}

/// Parse a stream of documents. Empty input returns an empty collection.
pub fn parse_all_documents(source: &str, options: &ParseOptions) -> Vec<Document> {
    compose(source, options)
}

/// Serialize a native value to YAML text.
///
/// An optional [`Replacer`] filters or transforms entries while the node
/// tree is built, analogous to the JSON replacer contract.
pub fn stringify(
    value: &Value,
    replacer: Option<&Replacer<'_>>,
    options: &StringifyOptions,
) -> Result<String, StringifyError> {
    let mut schema = Schema::new(options.schema_id());
    schema.sort_map_entries = options.sort_map_entries;
    let doc = Document::from_value_with(value, replacer, None, schema);
    doc.to_yaml_string(options)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn parse_default(src: &str) -> Value {
        parse(src, &ParseOptions::default()).unwrap()
    }

    fn stringify_default(value: &Value) -> String {
        stringify(value, None, &StringifyOptions::default()).unwrap()
    }

    fn map(entries: Vec<(Value, Value)>) -> Value {
        Value::Map(entries.into_iter().collect())
    }

    #[test]
    fn round_trip_structured_value() {
        let v = map(vec![
            (Value::from("name"), Value::from("test")),
            (
                Value::from("items"),
                Value::Seq(vec![Value::from(1), Value::from(2), Value::from(3)]),
            ),
            (Value::from("none"), Value::Null),
            (Value::from("ok"), Value::Bool(true)),
            (Value::from("pi"), Value::from(3.25)),
            (
                Value::from("nested"),
                map(vec![(Value::from("deep"), Value::from("value"))]),
            ),
        ]);
        let text = stringify_default(&v);
        assert_eq!(parse_default(&text), v);
    }

    #[test]
    fn stringify_is_idempotent() {
        let v = map(vec![
            (Value::from("text"), Value::from("a\nb\n")),
            (Value::from("list"), Value::Seq(vec![Value::from("x")])),
        ]);
        let once = stringify_default(&v);
        let twice = stringify_default(&parse_default(&once));
        assert_eq!(once, twice);
    }

    #[test]
    fn output_ends_with_single_newline() {
        for v in [
            Value::Null,
            Value::from(1),
            Value::from("text"),
            Value::Seq(vec![Value::from(1)]),
        ] {
            let text = stringify_default(&v);
            assert!(text.ends_with('\n'));
            assert!(!text.ends_with("\n\n"), "got {text:?}");
        }
    }

    #[test]
    fn plain_strings_survive_untyped() {
        for s in ["hello", "two words", "x2", "-dash", "a:b"] {
            let text = stringify_default(&Value::from(s));
            assert_eq!(parse_default(&text), Value::from(s), "via {text:?}");
        }
    }

    #[test]
    fn yaml_11_scalars_scenario() {
        let opts = ParseOptions {
            schema: Some(SchemaId::Yaml11),
            ..ParseOptions::default()
        };
        let v = parse("[ n, Y, on, off ]", &opts).unwrap();
        assert_eq!(
            v,
            Value::Seq(vec![
                Value::Bool(false),
                Value::Bool(true),
                Value::Bool(true),
                Value::Bool(false),
            ])
        );
    }

    #[test]
    fn colon_value_scenario() {
        let v = map(vec![(Value::from("key"), Value::from(":"))]);
        assert_eq!(stringify_default(&v), "key: \":\"\n");
    }

    #[test]
    fn document_marker_scenario() {
        assert_eq!(stringify_default(&Value::from("---")), "|-\n  ---\n");
    }

    #[test]
    fn null_key_scenario() {
        let doc = parse_document("? ~", &ParseOptions::default());
        assert!(doc.errors.is_empty(), "{:?}", doc.errors);
        let opts = StringifyOptions {
            simple_keys: true,
            ..StringifyOptions::default()
        };
        assert_eq!(doc.to_yaml_string(&opts).unwrap(), "~: null\n");
    }

    #[test]
    fn multiple_docs_error_on_parse_document() {
        let doc = parse_document("a: 1\n---\nb: 2\n", &ParseOptions::default());
        assert!(doc
            .errors
            .iter()
            .any(|e| e.code == ErrorCode::MultipleDocs));
        let docs = parse_all_documents("a: 1\n---\nb: 2\n", &ParseOptions::default());
        assert_eq!(docs.len(), 2);
    }

    #[test]
    fn empty_input() {
        assert_eq!(parse_default(""), Value::Null);
        assert!(parse_all_documents("", &ParseOptions::default()).is_empty());
        let doc = parse_document("", &ParseOptions::default());
        assert!(doc.contents.is_none());
        assert_eq!(
            doc.to_yaml_string(&StringifyOptions::default()).unwrap(),
            ""
        );
    }

    #[test]
    fn parse_escalates_first_error() {
        let result = parse("[a, b", &ParseOptions::default());
        assert!(matches!(result, Err(Error::Parse(_))));
        let silent = ParseOptions {
            log_level: LogLevel::Silent,
            ..ParseOptions::default()
        };
        assert!(parse("[a, b", &silent).is_ok());
    }

    #[test]
    fn replacer_filters_stringify() {
        let v = map(vec![
            (Value::from("keep"), Value::from(1)),
            (Value::from("drop"), Value::from(2)),
        ]);
        let text = stringify(
            &v,
            Some(&Replacer::Keys(&["keep"])),
            &StringifyOptions::default(),
        )
        .unwrap();
        assert_eq!(text, "keep: 1\n");
    }

    #[test]
    fn alias_expansion_guard() {
        let src = "\
a: &a [x, x]
b: &b [*a, *a]
c: &c [*b, *b]
d: [*c, *c]
";
        let tight = ParseOptions {
            max_alias_count: 2,
            ..ParseOptions::default()
        };
        assert!(matches!(
            parse(src, &tight),
            Err(Error::Resolve(ResolveError::ExcessiveAliasCount { .. }))
        ));
        // The default budget accepts this small expansion.
        assert!(parse(src, &ParseOptions::default()).is_ok());
        // A zero budget still allows plain aliases.
        let zero = ParseOptions {
            max_alias_count: 0,
            ..ParseOptions::default()
        };
        assert!(parse("x: &x 1\ny: *x\n", &zero).is_ok());
        // A negative budget disables the guard.
        let off = ParseOptions {
            max_alias_count: -1,
            ..ParseOptions::default()
        };
        assert!(parse(src, &off).is_ok());
    }

    #[test]
    fn binary_and_timestamp_via_facade() {
        let opts = StringifyOptions {
            schema: Some(SchemaId::Yaml11),
            ..StringifyOptions::default()
        };
        let popts = ParseOptions {
            schema: Some(SchemaId::Yaml11),
            ..ParseOptions::default()
        };

        let bytes = Value::Bytes(b"hello".to_vec());
        let out = stringify(&bytes, None, &opts).unwrap();
        assert_eq!(out, "!!binary aGVsbG8=\n");
        assert_eq!(parse(&out, &popts).unwrap(), bytes);

        let ts = parse("2001-12-15", &popts).unwrap();
        assert!(matches!(ts, Value::Timestamp(_)));
        let out = stringify(&ts, None, &opts).unwrap();
        assert_eq!(out, "2001-12-15\n");
        assert_eq!(parse(&out, &popts).unwrap(), ts);
    }

    #[test]
    fn stringify_version_option_governs_quoting() {
        // Timestamp-shaped and 1.1-boolean strings must be quoted under
        // 1.1 so they do not reparse as other types.
        let v11 = StringifyOptions {
            version: YamlVersion::V1_1,
            ..StringifyOptions::default()
        };
        assert_eq!(
            stringify(&Value::from("2001-12-15"), None, &v11).unwrap(),
            "\"2001-12-15\"\n"
        );
        assert_eq!(
            stringify(&Value::from("yes"), None, &v11).unwrap(),
            "\"yes\"\n"
        );
        assert_eq!(
            stringify(&Value::from("2001-12-15"), None, &StringifyOptions::default()).unwrap(),
            "2001-12-15\n"
        );
    }

    #[test]
    fn simple_key_length_boundary() {
        let opts = StringifyOptions {
            simple_keys: true,
            ..StringifyOptions::default()
        };
        let at_limit = map(vec![(Value::from("k".repeat(1024)), Value::from(1))]);
        assert!(stringify(&at_limit, None, &opts).is_ok());
        let over = map(vec![(Value::from("k".repeat(1025)), Value::from(1))]);
        assert!(matches!(
            stringify(&over, None, &opts),
            Err(StringifyError::ForbiddenSimpleKey(_))
        ));

        let src = format!("{}: 1\n", "k".repeat(1025));
        let doc = parse_document(&src, &ParseOptions::default());
        assert!(doc
            .errors
            .iter()
            .any(|e| e.code == ErrorCode::KeyOver1024Chars));
    }

    #[test]
    fn comment_round_trip() {
        let src = "# leading\nkey: value\n";
        let doc = parse_document(src, &ParseOptions::default());
        let out = doc.to_yaml_string(&StringifyOptions::default()).unwrap();
        assert!(out.contains("# leading"));
        assert!(out.contains("key: value"));
    }

    #[test]
    fn style_round_trip_preserves_quoting() {
        let src = "plain: word\nsingle: 'sq'\ndouble: \"dq\"\nliteral: |\n  text\n";
        let doc = parse_document(src, &ParseOptions::default());
        assert!(doc.errors.is_empty(), "{:?}", doc.errors);
        let out = doc.to_yaml_string(&StringifyOptions::default()).unwrap();
        assert_eq!(out, src);
    }

    #[test]
    fn anchors_round_trip_through_documents() {
        let src = "base: &b\n  x: 1\ncopy: *b\n";
        let doc = parse_document(src, &ParseOptions::default());
        assert!(doc.errors.is_empty(), "{:?}", doc.errors);
        let out = doc.to_yaml_string(&StringifyOptions::default()).unwrap();
        assert_eq!(out, src);
        let v = parse_default(&out);
        let m = v.as_map().unwrap();
        assert_eq!(m[&Value::from("base")], m[&Value::from("copy")]);
    }

    #[test]
    fn flow_style_round_trip() {
        let src = "inline: [ 1, 2 ]\npairs: { a: 1 }\n";
        let doc = parse_document(src, &ParseOptions::default());
        assert!(doc.errors.is_empty(), "{:?}", doc.errors);
        let out = doc.to_yaml_string(&StringifyOptions::default()).unwrap();
        assert_eq!(out, src);
    }

    #[test]
    fn version_11_numbers_round_trip() {
        let opts = ParseOptions {
            version: YamlVersion::V1_1,
            ..ParseOptions::default()
        };
        let doc = parse_document("a: 0x1F\nb: 0755\nc: yes\n", &opts);
        assert!(doc.errors.is_empty(), "{:?}", doc.errors);
        let out = doc.to_yaml_string(&StringifyOptions::default()).unwrap();
        assert_eq!(out, "a: 0x1F\nb: 0755\nc: yes\n");
        let v = doc.to_value(100).unwrap();
        let m = v.as_map().unwrap();
        assert_eq!(m[&Value::from("a")], Value::Int(31));
        assert_eq!(m[&Value::from("b")], Value::Int(493));
        assert_eq!(m[&Value::from("c")], Value::Bool(true));
    }
}
