use serde::{Serialize, Serializer};
use serde_json::{Map, Value};

/// Subset of the renderer's data-driven expression language that paint
/// compilation emits.
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    Literal(Value),
    /// `["get", key]`
    Get(String),
    /// `["coalesce", a, b, ...]`
    Coalesce(Vec<Expression>),
    /// `["match", input, label, output, ..., fallback]`
    Match {
        input: Box<Expression>,
        arms: Vec<(Value, Expression)>,
        fallback: Box<Expression>,
    },
}

impl Expression {
    pub fn literal(value: impl Into<Value>) -> Self {
        Self::Literal(value.into())
    }

    pub fn get(key: impl Into<String>) -> Self {
        Self::Get(key.into())
    }

    /// JSON form as handed to the renderer.
    pub fn to_json(&self) -> Value {
        match self {
            Self::Literal(v) => v.clone(),
            Self::Get(key) => Value::Array(vec!["get".into(), Value::String(key.clone())]),
            Self::Coalesce(items) => {
                let mut out = Vec::with_capacity(items.len() + 1);
                out.push(Value::from("coalesce"));
                out.extend(items.iter().map(Expression::to_json));
                Value::Array(out)
            }
            Self::Match {
                input,
                arms,
                fallback,
            } => {
                let mut out = Vec::with_capacity(arms.len() * 2 + 3);
                out.push(Value::from("match"));
                out.push(input.to_json());
                for (label, output) in arms {
                    out.push(label.clone());
                    out.push(output.to_json());
                }
                out.push(fallback.to_json());
                Value::Array(out)
            }
        }
    }

    /// Evaluate against a render feature's property bag. `None` stands for
    /// the renderer's null.
    pub fn evaluate(&self, props: &Map<String, Value>) -> Option<Value> {
        match self {
            Self::Literal(v) => Some(v.clone()),
            Self::Get(key) => props.get(key).filter(|v| !v.is_null()).cloned(),
            Self::Coalesce(items) => items.iter().find_map(|e| e.evaluate(props)),
            Self::Match {
                input,
                arms,
                fallback,
            } => {
                let value = input.evaluate(props);
                arms.iter()
                    .find(|(label, _)| Some(label) == value.as_ref())
                    .map(|(_, output)| output)
                    .unwrap_or(fallback.as_ref())
                    .evaluate(props)
            }
        }
    }

    /// Labels of a `match`, empty for any other expression.
    pub fn match_labels(&self) -> Vec<&Value> {
        match self {
            Self::Match { arms, .. } => arms.iter().map(|(label, _)| label).collect(),
            _ => Vec::new(),
        }
    }
}

impl Serialize for Expression {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}
