use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, PartialEq)]
#[serde(deny_unknown_fields)]
struct TestCaseGroupUnchecked {
    weight: f64,
    #[serde(rename = "in")]
    inputs: Vec<String>,
    #[serde(rename = "out")]
    outputs: Vec<String>,
}

/// A named, weighted bundle of (input, expected output) pairs, paired by position.
///
/// The name is the key of the group in the suite mapping, so it is not part of the
/// serialized group itself.
#[derive(Serialize, Deserialize, Debug, PartialEq, Clone)]
#[serde(try_from = "TestCaseGroupUnchecked")]
pub struct TestCaseGroup {
    #[serde(skip)]
    name: String,
    weight: f64,
    #[serde(rename = "in")]
    inputs: Vec<String>,
    #[serde(rename = "out")]
    outputs: Vec<String>,
}

impl TestCaseGroup {
    pub fn build(
        weight: f64,
        inputs: Vec<String>,
        outputs: Vec<String>,
    ) -> Result<Self, &'static str> {
        if !weight.is_finite() || weight < 0.0 {
            return Err("weight must be a non-negative number");
        }
        if inputs.len() != outputs.len() {
            return Err("`in` and `out` must have the same number of entries");
        }
        Ok(Self {
            name: String::new(),
            weight,
            inputs,
            outputs,
        })
    }

    pub fn with_name(mut self, name: String) -> Self {
        self.name = name;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn weight(&self) -> f64 {
        self.weight
    }

    pub fn len(&self) -> usize {
        self.inputs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inputs.is_empty()
    }

    /// (input, expected output) pairs in definition order.
    pub fn cases(&self) -> impl Iterator<Item = (&str, &str)> {
        self.inputs
            .iter()
            .map(String::as_str)
            .zip(self.outputs.iter().map(String::as_str))
    }
}

impl TryFrom<TestCaseGroupUnchecked> for TestCaseGroup {
    type Error = &'static str;

    fn try_from(value: TestCaseGroupUnchecked) -> Result<Self, Self::Error> {
        let TestCaseGroupUnchecked {
            weight,
            inputs,
            outputs,
        } = value;

        TestCaseGroup::build(weight, inputs, outputs)
    }
}
