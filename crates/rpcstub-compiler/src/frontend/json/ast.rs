//! Raw shapes of the JSON syntax tree, as written by the IDL parser.
//!
//! These mirror the interchange format field-for-field; validation of the
//! shapes happens in `to_ir`.

use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct RawDocument {
    pub modules: Vec<RawModule>,
}

#[derive(Debug, Deserialize)]
pub struct RawModule {
    pub name: String,
    #[serde(default)]
    pub comment: String,
    #[serde(default)]
    pub authentication: Option<String>,
    #[serde(default)]
    pub declarations: Vec<RawDeclaration>,
}

/// A declaration of any kind (`typedef`, `funcdef`, or something the
/// compiler does not care about).
#[derive(Debug, Deserialize)]
pub struct RawDeclaration {
    pub kind: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub comment: String,
    #[serde(default)]
    pub authentication: Option<String>,
    #[serde(default, rename = "type")]
    pub typ: Option<RawType>,
    #[serde(default)]
    pub params: Vec<RawParam>,
    #[serde(default)]
    pub returns: Vec<RawParam>,
}

#[derive(Debug, Deserialize)]
pub struct RawParam {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub typ: RawType,
}

#[derive(Debug, Deserialize)]
pub struct RawField {
    pub name: String,
    #[serde(rename = "type")]
    pub typ: RawType,
}

/// A type node. Which of the optional members are present depends on `kind`.
#[derive(Debug, Deserialize)]
pub struct RawType {
    pub kind: String,
    /// `list`
    #[serde(default)]
    pub element: Option<Box<RawType>>,
    /// `mapping`
    #[serde(default)]
    pub key: Option<Box<RawType>>,
    #[serde(default)]
    pub value: Option<Box<RawType>>,
    /// `tuple`
    #[serde(default)]
    pub elements: Option<Vec<RawParam>>,
    /// `structure`
    #[serde(default)]
    pub fields: Option<Vec<RawField>>,
    /// `typedef` reference
    #[serde(default)]
    pub module: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}
