/********************************************************************************
 * Copyright (c) 2026 Contributors to the Eclipse Foundation
 *
 * See the NOTICE file(s) distributed with this work for additional
 * information regarding copyright ownership.
 *
 * This program and the accompanying materials are made available under the
 * terms of the Apache License Version 2.0 which is available at
 * https://www.apache.org/licenses/LICENSE-2.0
 *
 * SPDX-License-Identifier: Apache-2.0
 ********************************************************************************/

//! Path expressions addressing configuration and telemetry subtrees.
//!
//! Grammar: `"/"` is the root (no elements); otherwise one or more segments of the form
//! `/name` or `/name[key1=val1,key2=val2]`.
//!
//! ```
//! use devctl_session::Path;
//!
//! let path: Path = "/interfaces/interface[name=1/1/1]/state".parse().unwrap();
//! assert_eq!(path.len(), 3);
//! assert_eq!(path.elements()[1].qualifier("name"), Some("1/1/1"));
//! assert_eq!(path.to_string(), "/interfaces/interface[name=1/1/1]/state");
//! ```
//!
//! Known limitation: there is no escaping. Names and keys cannot contain `/`, `[`, `]`,
//! `=` or `,`; values cannot contain `[`, `]`, `=` or `,` (they may contain `/`).

use crate::error::MalformedPathError;
use lazy_static::lazy_static;
use regex::Regex;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

lazy_static! {
    // Anchored: matched against the unconsumed tail, one segment at a time.
    static ref SEGMENT: Regex =
        Regex::new(r"^/([^/\[\]]+)(?:\[([^\[\]]*)\])?").expect("segment pattern compiles");
}

const FORBIDDEN_IN_NAME: &[char] = &['/', '[', ']'];
const FORBIDDEN_IN_KEY: &[char] = &['/', '[', ']', '=', ','];
const FORBIDDEN_IN_VALUE: &[char] = &['[', ']', '=', ','];

#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct PathElement {
    name: String,
    qualifiers: BTreeMap<String, String>,
}

impl PathElement {
    pub fn new(name: impl Into<String>) -> Result<Self, MalformedPathError> {
        let name = name.into();
        if name.is_empty() {
            return Err(MalformedPathError::new(&name, 0, "empty segment name"));
        }
        if let Some(offset) = name.find(FORBIDDEN_IN_NAME) {
            return Err(MalformedPathError::new(
                &name,
                offset,
                "reserved character in segment name",
            ));
        }
        Ok(Self {
            name,
            qualifiers: BTreeMap::new(),
        })
    }

    /// Adds a qualifier, replacing any earlier value for the same key.
    pub fn with_qualifier(
        mut self,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<Self, MalformedPathError> {
        let key = key.into();
        let value = value.into();
        check_qualifier(&key, &value, 0)?;
        self.qualifiers.insert(key, value);
        Ok(self)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn qualifiers(&self) -> &BTreeMap<String, String> {
        &self.qualifiers
    }

    pub fn qualifier(&self, key: &str) -> Option<&str> {
        self.qualifiers.get(key).map(String::as_str)
    }
}

impl Display for PathElement {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "/{}", self.name)?;
        if self.qualifiers.is_empty() {
            return Ok(());
        }
        write!(f, "[")?;
        for (index, (key, value)) in self.qualifiers.iter().enumerate() {
            if index > 0 {
                write!(f, ",")?;
            }
            write!(f, "{key}={value}")?;
        }
        write!(f, "]")
    }
}

/// Ordered sequence of path elements. The empty sequence is the root.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Path {
    elements: Vec<PathElement>,
}

impl Path {
    pub fn root() -> Self {
        Self::default()
    }

    pub fn from_elements(elements: Vec<PathElement>) -> Self {
        Self { elements }
    }

    pub fn parse(text: &str) -> Result<Self, MalformedPathError> {
        parse(text)
    }

    pub fn is_root(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn elements(&self) -> &[PathElement] {
        &self.elements
    }

    pub fn iter(&self) -> std::slice::Iter<'_, PathElement> {
        self.elements.iter()
    }
}

impl Display for Path {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if self.elements.is_empty() {
            return write!(f, "/");
        }
        for element in &self.elements {
            write!(f, "{element}")?;
        }
        Ok(())
    }
}

impl FromStr for Path {
    type Err = MalformedPathError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        parse(text)
    }
}

impl<'a> IntoIterator for &'a Path {
    type Item = &'a PathElement;
    type IntoIter = std::slice::Iter<'a, PathElement>;

    fn into_iter(self) -> Self::IntoIter {
        self.elements.iter()
    }
}

impl Serialize for Path {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Path {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        parse(&text).map_err(D::Error::custom)
    }
}

/// Parses a path expression left to right, one anchored segment match at a time.
pub fn parse(text: &str) -> Result<Path, MalformedPathError> {
    if text == "/" {
        return Ok(Path::root());
    }
    if text.is_empty() {
        return Err(MalformedPathError::new(text, 0, "empty path"));
    }

    let mut elements = Vec::new();
    let mut offset = 0;
    while offset < text.len() {
        let rest = &text[offset..];
        let Some(captures) = SEGMENT.captures(rest) else {
            return Err(MalformedPathError::new(text, offset, unmatched_reason(rest)));
        };

        let mut element = PathElement {
            name: captures[1].to_string(),
            qualifiers: BTreeMap::new(),
        };
        if let Some(block) = captures.get(2) {
            parse_qualifiers(text, offset + block.start(), block.as_str(), &mut element)?;
        }

        offset += captures[0].len();
        elements.push(element);
    }

    Ok(Path { elements })
}

fn unmatched_reason(rest: &str) -> &'static str {
    match rest.chars().next() {
        Some('[') => "unbalanced or repeated '['",
        Some(']') => "unbalanced ']'",
        Some('/') => match rest.chars().nth(1) {
            None | Some('/') => "empty segment name",
            Some('[') | Some(']') => "segment name starts with a bracket",
            Some(_) => "unbalanced '[' in qualifier block",
        },
        _ => "expected '/'",
    }
}

fn parse_qualifiers(
    text: &str,
    block_offset: usize,
    block: &str,
    element: &mut PathElement,
) -> Result<(), MalformedPathError> {
    if block.is_empty() {
        return Err(MalformedPathError::new(
            text,
            block_offset,
            "empty qualifier block",
        ));
    }

    let mut pair_offset = block_offset;
    for pair in block.split(',') {
        let Some((key, value)) = pair.split_once('=') else {
            return Err(MalformedPathError::new(
                text,
                pair_offset,
                "qualifier missing '='",
            ));
        };
        check_qualifier(key, value, pair_offset).map_err(|err| MalformedPathError {
            text: text.to_string(),
            ..err
        })?;
        element
            .qualifiers
            .insert(key.to_string(), value.to_string());
        pair_offset += pair.len() + 1;
    }
    Ok(())
}

fn check_qualifier(key: &str, value: &str, offset: usize) -> Result<(), MalformedPathError> {
    let pair = format!("{key}={value}");
    if key.is_empty() {
        return Err(MalformedPathError::new(&pair, offset, "empty qualifier key"));
    }
    if let Some(at) = key.find(FORBIDDEN_IN_KEY) {
        return Err(MalformedPathError::new(
            &pair,
            offset + at,
            "reserved character in qualifier key",
        ));
    }
    if value.is_empty() {
        return Err(MalformedPathError::new(
            &pair,
            offset + key.len() + 1,
            "empty qualifier value",
        ));
    }
    if let Some(at) = value.find(FORBIDDEN_IN_VALUE) {
        return Err(MalformedPathError::new(
            &pair,
            offset + key.len() + 1 + at,
            "unescaped reserved character in qualifier value",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{parse, Path, PathElement};
    use proptest::prelude::*;

    fn arb_element() -> impl Strategy<Value = String> {
        let qualifier = ("[a-zA-Z0-9_:.-]{1,8}", "[a-zA-Z0-9_:./-]{1,12}")
            .prop_map(|(key, value)| format!("{key}={value}"));
        ("[a-zA-Z0-9_:.-]{1,12}", prop::collection::vec(qualifier, 0..4)).prop_map(
            |(name, qualifiers)| {
                if qualifiers.is_empty() {
                    format!("/{name}")
                } else {
                    format!("/{name}[{}]", qualifiers.join(","))
                }
            },
        )
    }

    fn arb_elements(min: usize) -> impl Strategy<Value = Vec<String>> {
        prop::collection::vec(arb_element(), min..6)
    }

    fn arb_path_text() -> impl Strategy<Value = String> {
        arb_elements(0).prop_map(|elements| {
            if elements.is_empty() {
                "/".to_string()
            } else {
                elements.concat()
            }
        })
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(256))]

        #[test]
        fn prop_serialized_path_reparses_to_same_sequence(text in arb_path_text()) {
            let first = parse(&text).expect("generated path parses");
            let second = parse(&first.to_string()).expect("serialized path parses");
            prop_assert_eq!(&first, &second);
            prop_assert_eq!(first.to_string(), second.to_string());
        }

        #[test]
        fn prop_element_count_matches_segments(elements in arb_elements(1)) {
            let path = parse(&elements.concat()).expect("generated path parses");
            prop_assert_eq!(path.len(), elements.len());
        }
    }

    #[test]
    fn root_parses_to_empty_sequence() {
        let path = parse("/").expect("root parses");
        assert!(path.is_root());
        assert_eq!(path.to_string(), "/");
    }

    #[test]
    fn qualifier_value_may_contain_slashes() {
        let path = parse("/interfaces/interface[name=1/1/1]").expect("valid path");

        assert_eq!(path.len(), 2);
        assert_eq!(path.elements()[0].name(), "interfaces");
        assert!(path.elements()[0].qualifiers().is_empty());
        assert_eq!(path.elements()[1].name(), "interface");
        assert_eq!(path.elements()[1].qualifier("name"), Some("1/1/1"));
    }

    #[test]
    fn multiple_qualifiers_and_trailing_segments() {
        let path =
            parse("/qos/queues/queue[name=BE1,id=3]/state/transmit-pkts").expect("valid path");

        let names: Vec<&str> = path.iter().map(PathElement::name).collect();
        assert_eq!(
            names,
            vec!["qos", "queues", "queue", "state", "transmit-pkts"]
        );
        assert_eq!(path.elements()[2].qualifier("name"), Some("BE1"));
        assert_eq!(path.elements()[2].qualifier("id"), Some("3"));
    }

    #[test]
    fn repeated_qualifier_key_is_last_wins() {
        let path = parse("/a[x=1,x=2]").expect("valid path");
        assert_eq!(path.elements()[0].qualifiers().len(), 1);
        assert_eq!(path.elements()[0].qualifier("x"), Some("2"));
    }

    #[test]
    fn unbalanced_open_bracket_is_rejected() {
        let err = parse("/a[x=1").expect_err("unbalanced bracket");
        assert_eq!(err.offset, 2);
        assert_eq!(err.text, "/a[x=1");
    }

    #[test]
    fn malformed_inputs_are_rejected() {
        for text in [
            "",
            "a",
            "/a/",
            "//a",
            "/a]",
            "/a[x=1]]",
            "/a[x=1][y=2]",
            "/a[]",
            "/a[x]",
            "/a[=1]",
            "/a[x=]",
            "/a[x=1=2]",
            "/a[x=1,]",
            "/a[x=[1]]",
            "/[x=1]",
        ] {
            assert!(parse(text).is_err(), "{text:?} should be rejected");
        }
    }

    #[test]
    fn serialization_is_canonical_and_idempotent() {
        for text in [
            "/",
            "/interfaces",
            "/interfaces/interface[name=1/1/1]/state/oper-status",
            "/a[z=1,b=2,m=3]/b",
            "/components/component[name=:lc-1]/config",
            "/a[x=1,x=2]",
        ] {
            let first = parse(text).expect("valid path");
            let second = parse(&first.to_string()).expect("serialized path parses");
            assert_eq!(first, second, "round trip of {text:?}");
        }

        let path = parse("/a[z=1,b=2]").expect("valid path");
        assert_eq!(path.to_string(), "/a[b=2,z=1]");
    }

    #[test]
    fn built_elements_enforce_name_rules() {
        assert!(PathElement::new("").is_err());
        assert!(PathElement::new("a/b").is_err());
        assert!(PathElement::new("interface")
            .and_then(|element| element.with_qualifier("name", "a,b"))
            .is_err());

        let element = PathElement::new("interface")
            .and_then(|element| element.with_qualifier("name", "eth0"))
            .expect("valid element");
        let path = Path::from_elements(vec![element]);
        assert_eq!(path.to_string(), "/interface[name=eth0]");
    }

    #[test]
    fn path_serializes_as_expression_string() {
        let path: Path = "/system/state[x=1]".parse().expect("valid path");
        let json = serde_json::to_string(&path).expect("serialize path");
        assert_eq!(json, "\"/system/state[x=1]\"");

        let back: Path = serde_json::from_str(&json).expect("deserialize path");
        assert_eq!(back, path);
        assert!(serde_json::from_str::<Path>("\"/a[\"").is_err());
    }
}
