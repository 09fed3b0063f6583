//! Compiled executor command

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;

const REDACTED: &str = "REDACTED";

/// Flag values kept out of the argument list and logs
///
/// `Debug` and `Serialize` print only the flag names.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct SensitiveArgs(BTreeMap<String, String>);

impl SensitiveArgs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, flag: impl Into<String>, value: impl Into<String>) {
        self.0.insert(flag.into(), value.into());
    }

    pub fn extend(&mut self, other: SensitiveArgs) {
        self.0.extend(other.0);
    }

    pub fn get(&self, flag: &str) -> Option<&str> {
        self.0.get(flag).map(String::as_str)
    }

    pub fn contains(&self, flag: &str) -> bool {
        self.0.contains_key(flag)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// `flag value` pairs, in flag order
    pub fn to_args(&self) -> Vec<String> {
        self.0
            .iter()
            .flat_map(|(k, v)| [k.clone(), v.clone()])
            .collect()
    }
}

impl fmt::Debug for SensitiveArgs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.0.keys().map(|k| (k, REDACTED)))
            .finish()
    }
}

impl Serialize for SensitiveArgs {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for key in self.0.keys() {
            map.serialize_entry(key, REDACTED)?;
        }
        map.end()
    }
}

/// Fully resolved command for the provisioning executor
///
/// `args` is framed as `[cloud, --region, <region>, <cloud args>, instance,
/// <operation>, <operation args>, <node name>]`.
#[derive(Debug, Clone, Serialize)]
pub struct CompiledCommand {
    pub args: Vec<String>,

    pub env: BTreeMap<String, String>,

    pub sensitive: SensitiveArgs,
}

impl CompiledCommand {
    /// Whether `flag` appears in the argument list
    pub fn has_flag(&self, flag: &str) -> bool {
        self.args.iter().any(|a| a == flag)
    }

    /// Value following the first occurrence of `flag`
    pub fn flag_value(&self, flag: &str) -> Option<&str> {
        self.args
            .iter()
            .position(|a| a == flag)
            .and_then(|i| self.args.get(i + 1))
            .map(String::as_str)
    }

    /// Values following every occurrence of `flag`
    pub fn flag_values(&self, flag: &str) -> Vec<&str> {
        self.args
            .iter()
            .enumerate()
            .filter(|(_, a)| *a == flag)
            .filter_map(|(i, _)| self.args.get(i + 1))
            .map(String::as_str)
            .collect()
    }

    /// Trailing positional node name
    pub fn node_name(&self) -> Option<&str> {
        self.args.last().map(String::as_str)
    }

    /// Arguments with sensitive pairs appended, for the spawned process only
    pub(crate) fn process_args(&self) -> Vec<String> {
        let mut args = self.args.clone();
        args.extend(self.sensitive.to_args());
        args
    }
}

impl fmt::Display for CompiledCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.args.join(" "))?;
        for key in self.sensitive.0.keys() {
            write!(f, " {} {}", key, REDACTED)?;
        }
        Ok(())
    }
}
