use crate::schema::{SchemaId, SortEntries, Tag};
use crate::ScalarStyle;

/// The YAML specification version in effect.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
#[non_exhaustive]
pub enum YamlVersion {
    V1_1,
    #[default]
    V1_2,
}

impl YamlVersion {
    pub fn as_str(self) -> &'static str {
        match self {
            YamlVersion::V1_1 => "1.1",
            YamlVersion::V1_2 => "1.2",
        }
    }
}

/// How loud the processor is about recoverable problems.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
#[non_exhaustive]
pub enum LogLevel {
    /// Swallow warnings and do not escalate errors in `parse`.
    Silent,
    /// Forward warnings through `log::warn!`.
    #[default]
    Warn,
    /// Errors only.
    Error,
}

/// Options for parsing and composing.
#[derive(Debug)]
#[non_exhaustive]
pub struct ParseOptions {
    /// Tag schema; defaults to `core`, or the 1.1 set when `version` is 1.1.
    pub schema: Option<SchemaId>,
    /// YAML version assumed when the source has no `%YAML` directive.
    pub version: YamlVersion,
    /// Extra tags appended to the schema.
    pub custom_tags: Vec<Tag>,
    /// Attach line/column positions to errors.
    pub pretty_errors: bool,
    /// Build a [`LineCounter`](crate::LineCounter) on the document.
    pub line_counter: bool,
    pub log_level: LogLevel,
    /// Report non-standard constructs such as missing comment spacing.
    pub strict: bool,
    /// Bound on alias expansion during native conversion; `100` by default,
    /// negative disables the guard.
    pub max_alias_count: i64,
}

impl Default for ParseOptions {
    fn default() -> Self {
        ParseOptions {
            schema: None,
            version: YamlVersion::default(),
            custom_tags: Vec::new(),
            pretty_errors: true,
            line_counter: false,
            log_level: LogLevel::default(),
            strict: true,
            max_alias_count: 100,
        }
    }
}

impl ParseOptions {
    /// The schema preset implied by the options.
    pub fn schema_id(&self) -> SchemaId {
        self.schema.unwrap_or(match self.version {
            YamlVersion::V1_1 => SchemaId::Yaml11,
            YamlVersion::V1_2 => SchemaId::Core,
        })
    }
}

/// Options controlling serialization.
///
/// Serialization takes the parse-side `schema` and `version` knobs plus
/// the formatting ones; the schema governs which strings must be quoted
/// to avoid reading back as another type, and the version picks number
/// spellings such as the octal prefix.
#[derive(Debug)]
#[non_exhaustive]
pub struct StringifyOptions {
    /// Tag schema; defaults to `core`, or the 1.1 set when `version` is 1.1.
    pub schema: Option<SchemaId>,
    /// YAML version assumed when the document has no `%YAML` directive.
    pub version: YamlVersion,
    /// Spaces per nesting level, `1..=9`.
    pub indent: usize,
    /// Whether block sequence items inside a mapping take their own
    /// indentation step; `false` aligns the `-` with the parent key.
    pub indent_seq: bool,
    /// Preferred maximum line width; `0` disables folding.
    pub line_width: usize,
    /// Minimum content width per folded line.
    pub min_content_width: usize,
    /// Restrict double-quoted escapes to the JSON repertoire.
    pub double_quoted_as_json: bool,
    /// Minimum length before a double-quoted string may fold.
    pub double_quoted_min_multi_line_length: usize,
    /// Longest flow collection rendered on a single line.
    pub max_flow_string_single_line_length: usize,
    pub null_str: String,
    pub true_str: String,
    pub false_str: String,
    /// Style used for strings with no explicit style.
    pub default_string_type: ScalarStyle,
    /// Style used for keys; falls back to `default_string_type`.
    pub default_key_type: Option<ScalarStyle>,
    /// Prefer single quotes over double when both are legal. `None` picks
    /// whichever needs fewer escapes.
    pub single_quote: Option<bool>,
    /// Fail instead of emitting any key that is not a simple one-liner.
    pub simple_keys: bool,
    /// Emit mapping entries in sorted order.
    pub sort_map_entries: Option<SortEntries>,
    /// Prefix for generated anchor labels.
    pub anchor_prefix: String,
    /// Always emit the `---` marker.
    pub directives_end_marker: bool,
    /// Verify that every alias follows a matching anchor.
    pub verify_alias_order: bool,
}

impl StringifyOptions {
    /// The schema preset implied by the options.
    pub fn schema_id(&self) -> SchemaId {
        self.schema.unwrap_or(match self.version {
            YamlVersion::V1_1 => SchemaId::Yaml11,
            YamlVersion::V1_2 => SchemaId::Core,
        })
    }
}

impl Default for StringifyOptions {
    fn default() -> Self {
        StringifyOptions {
            schema: None,
            version: YamlVersion::default(),
            indent: 2,
            indent_seq: true,
            line_width: 80,
            min_content_width: 20,
            double_quoted_as_json: false,
            double_quoted_min_multi_line_length: 40,
            max_flow_string_single_line_length: 60,
            null_str: String::from("null"),
            true_str: String::from("true"),
            false_str: String::from("false"),
            default_string_type: ScalarStyle::Plain,
            default_key_type: None,
            single_quote: None,
            simple_keys: false,
            sort_map_entries: None,
            anchor_prefix: String::from("a"),
            directives_end_marker: false,
            verify_alias_order: true,
        }
    }
}
