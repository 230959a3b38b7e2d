//! The fragment: one stage's contribution to a generated program.
//!
//! A fragment is created once by the stage that describes the operation,
//! serialized once, and from then on only relayed verbatim by downstream
//! stages until the assembler consumes it. Fields are private so nothing
//! downstream can mutate a relayed fragment.

use serde::{Deserialize, Deserializer, Serialize};

/// Symbol bound to the data source when no initial fragment names one.
pub const DEFAULT_SOURCE: &str = "records";

/// Structural role of a fragment in the assembled chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FragmentKind {
    /// Creates the first data source.
    #[serde(alias = "init")]
    Initial,
    /// Consumes one input and produces one output.
    #[serde(alias = "stmt")]
    Transform,
    /// Consumes input and produces nothing further (a sink).
    #[serde(alias = "final")]
    Terminal,
}

impl FragmentKind {
    pub fn name(&self) -> &'static str {
        match self {
            FragmentKind::Initial => "initial",
            FragmentKind::Transform => "transform",
            FragmentKind::Terminal => "terminal",
        }
    }
}

/// Serializable description of one pipeline stage's operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Fragment {
    #[serde(alias = "type")]
    kind: FragmentKind,
    #[serde(default, alias = "var")]
    output_name: String,
    #[serde(default, alias = "input")]
    input_name: String,
    #[serde(default, alias = "code")]
    body: String,
    #[serde(default, rename = "imports", deserialize_with = "null_as_empty")]
    required_imports: Vec<String>,
    #[serde(default, alias = "command")]
    origin_command: String,
    /// Function value applied to the input, when the emitter knows it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    callee: Option<String>,
}

impl Fragment {
    /// First fragment in a chain: binds `output_name` to a new data source.
    pub fn initial(
        output_name: impl Into<String>,
        body: impl Into<String>,
        imports: Vec<String>,
        origin_command: impl Into<String>,
    ) -> Self {
        Self {
            kind: FragmentKind::Initial,
            output_name: output_name.into(),
            input_name: String::new(),
            body: body.into(),
            required_imports: imports,
            origin_command: origin_command.into(),
            callee: None,
        }
    }

    /// A statement mapping `input_name` to `output_name`.
    pub fn transform(
        output_name: impl Into<String>,
        input_name: impl Into<String>,
        body: impl Into<String>,
        imports: Vec<String>,
        origin_command: impl Into<String>,
    ) -> Self {
        Self {
            kind: FragmentKind::Transform,
            output_name: output_name.into(),
            input_name: input_name.into(),
            body: body.into(),
            required_imports: imports,
            origin_command: origin_command.into(),
            callee: None,
        }
    }

    /// A sink consuming `input_name`; it binds no output.
    pub fn terminal(
        input_name: impl Into<String>,
        body: impl Into<String>,
        imports: Vec<String>,
        origin_command: impl Into<String>,
    ) -> Self {
        Self {
            kind: FragmentKind::Terminal,
            output_name: String::new(),
            input_name: input_name.into(),
            body: body.into(),
            required_imports: imports,
            origin_command: origin_command.into(),
            callee: None,
        }
    }

    /// Attach the structured applicable expression of a transform.
    pub fn with_callee(mut self, callee: impl Into<String>) -> Self {
        self.callee = Some(callee.into());
        self
    }

    pub fn kind(&self) -> FragmentKind {
        self.kind
    }

    pub fn output_name(&self) -> &str {
        &self.output_name
    }

    pub fn input_name(&self) -> &str {
        &self.input_name
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn required_imports(&self) -> &[String] {
        &self.required_imports
    }

    pub fn origin_command(&self) -> &str {
        &self.origin_command
    }

    pub fn callee(&self) -> Option<&str> {
        self.callee.as_deref()
    }

    pub fn is_terminal(&self) -> bool {
        self.kind == FragmentKind::Terminal
    }
}

/// Older emitters write `"imports": null` for an empty list.
fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<String>>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_keys() {
        let frag = Fragment::transform(
            "filtered",
            "records",
            "filtered := whereOp(records)",
            vec!["strings".to_string()],
            "pipegen where -m age gt 18",
        );
        let json = serde_json::to_string(&frag).unwrap();
        assert!(json.contains(r#""kind":"transform""#));
        assert!(json.contains(r#""outputName":"filtered""#));
        assert!(json.contains(r#""inputName":"records""#));
        assert!(json.contains(r#""imports":["strings"]"#));
        assert!(json.contains(r#""originCommand":"pipegen where -m age gt 18""#));
        assert!(!json.contains("callee"));
    }

    #[test]
    fn test_callee_is_serialized_when_present() {
        let frag = Fragment::transform("limited", "records", "", vec![], "")
            .with_callee("ssql.Limit[ssql.Record](5)");
        let json = serde_json::to_string(&frag).unwrap();
        assert!(json.contains(r#""callee":"ssql.Limit[ssql.Record](5)""#));
        let back: Fragment = serde_json::from_str(&json).unwrap();
        assert_eq!(back, frag);
    }

    #[test]
    fn test_decodes_legacy_field_names() {
        let line = r#"{"type":"stmt","var":"filtered","input":"records","code":"x","imports":null,"command":"ssql where"}"#;
        let frag: Fragment = serde_json::from_str(line).unwrap();
        assert_eq!(frag.kind(), FragmentKind::Transform);
        assert_eq!(frag.output_name(), "filtered");
        assert_eq!(frag.input_name(), "records");
        assert_eq!(frag.body(), "x");
        assert!(frag.required_imports().is_empty());
        assert_eq!(frag.origin_command(), "ssql where");
    }

    #[test]
    fn test_missing_fields_default_to_empty() {
        let frag: Fragment = serde_json::from_str(r#"{"type":"init","var":"records"}"#).unwrap();
        assert_eq!(frag.kind(), FragmentKind::Initial);
        assert_eq!(frag.output_name(), "records");
        assert_eq!(frag.body(), "");
        assert!(frag.callee().is_none());
    }

    #[test]
    fn test_unknown_kind_is_rejected() {
        let result: Result<Fragment, _> = serde_json::from_str(r#"{"kind":"sideways"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_terminal_has_no_output() {
        let frag = Fragment::terminal("sorted", "ssql.DisplayTable(sorted, 50)", vec![], "");
        assert!(frag.is_terminal());
        assert_eq!(frag.output_name(), "");
        assert_eq!(frag.kind().name(), "terminal");
    }
}
