// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Typed views over property list dictionaries.

Property lists are decoded by the `plist` crate into a generic
[plist::Dictionary]. The types in this module project the keys we care about
out of that dictionary. Keys we don't recognize are ignored. Optional keys
that are absent stay `None`; nothing is filled in with a default value.
*/

use {
    crate::error::IpaValidateError,
    chrono::{DateTime, Utc},
    plist::{Dictionary, Value},
    serde::Serialize,
    std::{collections::BTreeSet, path::Path, time::SystemTime},
};

/// Read a property list file whose root is a dictionary.
///
/// Both XML and binary property lists are accepted.
pub fn read_plist_dictionary(path: impl AsRef<Path>) -> Result<Dictionary, IpaValidateError> {
    let path = path.as_ref();

    let data = std::fs::read(path)?;
    let cursor = std::io::Cursor::new(data);
    let value = Value::from_reader(cursor)?;

    value
        .into_dictionary()
        .ok_or_else(|| IpaValidateError::PlistNotDictionary(path.to_path_buf()))
}

/// Typed accessors over a dictionary that report errors by key name.
pub(crate) struct DictionaryFields<'a> {
    dict: &'a Dictionary,
    context: Option<&'a str>,
}

impl<'a> DictionaryFields<'a> {
    pub(crate) fn new(dict: &'a Dictionary) -> Self {
        Self {
            dict,
            context: None,
        }
    }

    /// Accessors for a dictionary nested under `context`.
    ///
    /// Error messages name keys as `context.key`.
    pub(crate) fn nested(dict: &'a Dictionary, context: &'a str) -> Self {
        Self {
            dict,
            context: Some(context),
        }
    }

    fn key_name(&self, key: &str) -> String {
        match self.context {
            Some(context) => format!("{}.{}", context, key),
            None => key.to_string(),
        }
    }

    fn wrong_type(&self, key: &str, expected: &'static str) -> IpaValidateError {
        IpaValidateError::FieldType {
            key: self.key_name(key),
            expected,
        }
    }

    fn get(&self, key: &str) -> Result<&'a Value, IpaValidateError> {
        self.dict
            .get(key)
            .ok_or_else(|| IpaValidateError::MissingField(self.key_name(key)))
    }

    pub(crate) fn optional_string(&self, key: &str) -> Result<Option<String>, IpaValidateError> {
        match self.dict.get(key) {
            Some(value) => Ok(Some(
                value
                    .as_string()
                    .ok_or_else(|| self.wrong_type(key, "a string"))?
                    .to_string(),
            )),
            None => Ok(None),
        }
    }

    pub(crate) fn string(&self, key: &str) -> Result<String, IpaValidateError> {
        self.optional_string(key)?
            .ok_or_else(|| IpaValidateError::MissingField(self.key_name(key)))
    }

    fn string_array(&self, key: &str, value: &Value) -> Result<Vec<String>, IpaValidateError> {
        value
            .as_array()
            .ok_or_else(|| self.wrong_type(key, "an array of strings"))?
            .iter()
            .map(|x| {
                Ok(x.as_string()
                    .ok_or_else(|| self.wrong_type(key, "an array of strings"))?
                    .to_string())
            })
            .collect::<Result<Vec<_>, IpaValidateError>>()
    }

    pub(crate) fn optional_string_list(
        &self,
        key: &str,
    ) -> Result<Option<Vec<String>>, IpaValidateError> {
        match self.dict.get(key) {
            Some(value) => Ok(Some(self.string_array(key, value)?)),
            None => Ok(None),
        }
    }

    pub(crate) fn string_list(&self, key: &str) -> Result<Vec<String>, IpaValidateError> {
        self.string_array(key, self.get(key)?)
    }

    /// Like [Self::optional_string_list] but a bare string is a list of one.
    pub(crate) fn optional_string_or_list(
        &self,
        key: &str,
    ) -> Result<Option<Vec<String>>, IpaValidateError> {
        match self.dict.get(key) {
            Some(Value::String(s)) => Ok(Some(vec![s.clone()])),
            Some(value) => Ok(Some(self.string_array(key, value)?)),
            None => Ok(None),
        }
    }

    pub(crate) fn optional_bool(&self, key: &str) -> Result<Option<bool>, IpaValidateError> {
        match self.dict.get(key) {
            Some(value) => Ok(Some(
                value
                    .as_boolean()
                    .ok_or_else(|| self.wrong_type(key, "a boolean"))?,
            )),
            None => Ok(None),
        }
    }

    pub(crate) fn date(&self, key: &str) -> Result<DateTime<Utc>, IpaValidateError> {
        let date = self
            .get(key)?
            .as_date()
            .ok_or_else(|| self.wrong_type(key, "a date"))?;

        Ok(DateTime::<Utc>::from(SystemTime::from(date)))
    }

    pub(crate) fn dictionary(&self, key: &str) -> Result<&'a Dictionary, IpaValidateError> {
        self.get(key)?
            .as_dictionary()
            .ok_or_else(|| self.wrong_type(key, "a dictionary"))
    }

    /// A set of strings from either an array or a dictionary of booleans.
    ///
    /// `UIRequiredDeviceCapabilities` may use either form. For the dictionary
    /// form, keys mapped to `true` are taken.
    pub(crate) fn optional_capability_set(
        &self,
        key: &str,
    ) -> Result<Option<BTreeSet<String>>, IpaValidateError> {
        match self.dict.get(key) {
            Some(Value::Dictionary(d)) => Ok(Some(
                d.iter()
                    .filter(|(_, v)| matches!(v, Value::Boolean(true)))
                    .map(|(k, _)| k.to_string())
                    .collect(),
            )),
            Some(value) => Ok(Some(self.string_array(key, value)?.into_iter().collect())),
            None => Ok(None),
        }
    }
}

/// Application metadata from a bundle's `Info.plist`.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct AppMetadata {
    /// `CFBundleIdentifier`.
    pub bundle_identifier: String,

    /// `MinimumOSVersion`.
    pub minimum_os_version: String,

    /// `UISupportedInterfaceOrientations`.
    pub supported_orientations: BTreeSet<String>,

    /// `DTSDKName`.
    pub sdk_name: String,

    /// `UIRequiredDeviceCapabilities`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required_device_capabilities: Option<BTreeSet<String>>,

    /// `CFBundleVersion`.
    pub bundle_version: String,

    /// `CFBundleShortVersionString`.
    pub short_version: String,

    /// `CFBundleDisplayName`.
    pub display_name: String,

    /// `CFBundleExecutable`.
    pub executable_file_name: String,
}

impl AppMetadata {
    /// Project app metadata out of a decoded `Info.plist` dictionary.
    pub fn from_dictionary(dict: &Dictionary) -> Result<Self, IpaValidateError> {
        let fields = DictionaryFields::new(dict);

        Ok(Self {
            bundle_identifier: fields.string("CFBundleIdentifier")?,
            minimum_os_version: fields.string("MinimumOSVersion")?,
            supported_orientations: fields
                .string_list("UISupportedInterfaceOrientations")?
                .into_iter()
                .collect(),
            sdk_name: fields.string("DTSDKName")?,
            required_device_capabilities: fields
                .optional_capability_set("UIRequiredDeviceCapabilities")?,
            bundle_version: fields.string("CFBundleVersion")?,
            short_version: fields.string("CFBundleShortVersionString")?,
            display_name: fields.string("CFBundleDisplayName")?,
            executable_file_name: fields.string("CFBundleExecutable")?,
        })
    }

    /// Read and project an `Info.plist` file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, IpaValidateError> {
        Self::from_dictionary(&read_plist_dictionary(path)?)
    }
}
