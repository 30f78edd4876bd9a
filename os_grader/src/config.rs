//! Test-suite definitions.
//!
//! A suite is an ordered mapping from group name to `{weight, in, out}`:
//!
//! ```yaml
//! simple_commands:
//!   weight: 2
//!   in: ["echo foo\n", "pwd\n"]
//!   out: ["foo\n", "/tmp\n"]
//! ```
//!
//! YAML is the default format, JSON is accepted when the file ends in `.json`.

use crate::error::GraderError;
use serde::{
    Deserialize, Serialize,
    de::{self, MapAccess, Visitor},
    ser::SerializeMap,
};
use std::{collections::HashSet, ffi::OsStr, fmt, fs, path::Path};

mod test_group;

pub use test_group::TestCaseGroup;

/// Immutable for the whole run. Group order is the order of the definition file.
#[derive(Debug, PartialEq, Clone)]
pub struct TestSuite {
    groups: Vec<TestCaseGroup>,
}

impl TestSuite {
    pub fn build(groups: Vec<TestCaseGroup>) -> Result<Self, &'static str> {
        if groups.is_empty() {
            return Err("at least one test case group is expected");
        }
        let mut names = HashSet::with_capacity(groups.len());
        for g in &groups {
            if !names.insert(g.name()) {
                return Err("duplicated test case group name");
            }
        }
        Ok(Self { groups })
    }

    pub fn load(path: &Path) -> Result<Self, GraderError> {
        let content = fs::read_to_string(path).map_err(|source| GraderError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let suite = match path.extension().and_then(OsStr::to_str) {
            Some("json") => serde_json::from_str(&content)?,
            _ => serde_yaml::from_str(&content)?,
        };
        log::info!("Loaded test suite from '{}'", path.display());
        Ok(suite)
    }

    pub fn groups(&self) -> &[TestCaseGroup] {
        &self.groups
    }
}

impl Serialize for TestSuite {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.groups.len()))?;
        for g in &self.groups {
            map.serialize_entry(g.name(), g)?;
        }
        map.end()
    }
}

struct TestSuiteVisitor;

impl<'de> Visitor<'de> for TestSuiteVisitor {
    type Value = TestSuite;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a mapping from test case group name to its definition")
    }

    fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
    where
        A: MapAccess<'de>,
    {
        let mut groups = Vec::with_capacity(map.size_hint().unwrap_or(1));
        while let Some((name, group)) = map.next_entry::<String, TestCaseGroup>()? {
            groups.push(group.with_name(name));
        }

        TestSuite::build(groups).map_err(de::Error::custom)
    }
}

impl<'de> Deserialize<'de> for TestSuite {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        deserializer.deserialize_map(TestSuiteVisitor)
    }
}
