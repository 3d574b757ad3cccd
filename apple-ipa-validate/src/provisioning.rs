// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Provisioning profile metadata.

An `embedded.mobileprovision` file is a CMS `SignedData` message whose
encapsulated content is an XML property list. Once that plist has been
unwrapped (see [crate::verifier]), the types here project the parts of it
that matter for distribution checks.
*/

use {
    crate::{
        error::IpaValidateError,
        info_plist::{read_plist_dictionary, DictionaryFields},
    },
    chrono::{DateTime, Utc},
    plist::Dictionary,
    serde::Serialize,
    std::{collections::BTreeSet, path::Path},
};

/// The `Entitlements` dictionary of a provisioning profile.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct EntitlementsView {
    /// `application-identifier`, e.g. `ABCDE12345.com.acme.*`.
    pub application_identifier: String,

    /// `get-task-allow`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub get_task_allow: Option<bool>,

    /// `keychain-access-groups`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keychain_access_groups: Option<Vec<String>>,
}

impl EntitlementsView {
    pub fn from_dictionary(dict: &Dictionary) -> Result<Self, IpaValidateError> {
        let fields = DictionaryFields::nested(dict, "Entitlements");

        Ok(Self {
            application_identifier: fields.string("application-identifier")?,
            get_task_allow: fields.optional_bool("get-task-allow")?,
            keychain_access_groups: fields.optional_string_list("keychain-access-groups")?,
        })
    }

    /// Split the application identifier into its team prefix and app id.
    ///
    /// The split happens at the first `.`. Without one, the whole value is
    /// the prefix and the app id is empty.
    pub fn split_application_identifier(&self) -> (&str, &str) {
        split_application_identifier(&self.application_identifier)
    }
}

/// Split `PREFIX.app.id` at the first `.`.
pub fn split_application_identifier(value: &str) -> (&str, &str) {
    value.split_once('.').unwrap_or((value, ""))
}

/// Metadata from the property list inside a provisioning profile.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct ProvisioningMetadata {
    /// `AppIDName`.
    pub app_id_name: String,

    /// `ApplicationIdentifierPrefix`.
    pub application_identifier_prefixes: BTreeSet<String>,

    /// `CreationDate`.
    pub creation_date: DateTime<Utc>,

    /// `ExpirationDate`.
    pub expiration_date: DateTime<Utc>,

    /// `Name`.
    pub name: String,

    /// `Platform`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub platforms: Option<Vec<String>>,

    /// `ProvisionsAllDevices`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provisions_all_devices: Option<bool>,

    /// `TeamIdentifier`.
    pub team_identifiers: Vec<String>,

    /// `TeamName`.
    pub team_name: String,

    /// `UUID`.
    pub uuid: String,

    /// `Entitlements`.
    pub entitlements: EntitlementsView,
}

impl ProvisioningMetadata {
    /// Project provisioning metadata out of a decoded profile dictionary.
    pub fn from_dictionary(dict: &Dictionary) -> Result<Self, IpaValidateError> {
        let fields = DictionaryFields::new(dict);

        let team_identifiers = fields
            .optional_string_or_list("TeamIdentifier")?
            .ok_or_else(|| IpaValidateError::MissingField("TeamIdentifier".into()))?;

        Ok(Self {
            app_id_name: fields.string("AppIDName")?,
            application_identifier_prefixes: fields
                .string_list("ApplicationIdentifierPrefix")?
                .into_iter()
                .collect(),
            creation_date: fields.date("CreationDate")?,
            expiration_date: fields.date("ExpirationDate")?,
            name: fields.string("Name")?,
            platforms: fields.optional_string_or_list("Platform")?,
            provisions_all_devices: fields.optional_bool("ProvisionsAllDevices")?,
            team_identifiers,
            team_name: fields.string("TeamName")?,
            uuid: fields.string("UUID")?,
            entitlements: EntitlementsView::from_dictionary(fields.dictionary("Entitlements")?)?,
        })
    }

    /// Read and project an unwrapped provisioning plist file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, IpaValidateError> {
        Self::from_dictionary(&read_plist_dictionary(path)?)
    }

    /// Whether the profile has expired as of `now`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expiration_date < now
    }
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        chrono::TimeZone,
        indoc::indoc,
        plist::Value,
    };

    const PROFILE_PLIST: &str = indoc! {r#"
        <?xml version="1.0" encoding="UTF-8"?>
        <!DOCTYPE plist PUBLIC "-//Apple//DTD PLIST 1.0//EN" "http://www.apple.com/DTDs/PropertyList-1.0.dtd">
        <plist version="1.0">
        <dict>
          <key>AppIDName</key>
          <string>Acme Wildcard</string>
          <key>ApplicationIdentifierPrefix</key>
          <array>
            <string>ABCDE12345</string>
          </array>
          <key>CreationDate</key>
          <date>2022-01-01T00:00:00Z</date>
          <key>ExpirationDate</key>
          <date>2023-01-01T00:00:00Z</date>
          <key>Name</key>
          <string>Acme Distribution</string>
          <key>Platform</key>
          <array>
            <string>iOS</string>
          </array>
          <key>TeamIdentifier</key>
          <array>
            <string>ABCDE12345</string>
          </array>
          <key>TeamName</key>
          <string>Acme Corp</string>
          <key>UUID</key>
          <string>6f1c2b0e-0000-4000-8000-000000000001</string>
          <key>Entitlements</key>
          <dict>
            <key>application-identifier</key>
            <string>ABCDE12345.com.acme.*</string>
            <key>get-task-allow</key>
            <false/>
            <key>keychain-access-groups</key>
            <array>
              <string>ABCDE12345.*</string>
              <string>com.apple.token</string>
            </array>
          </dict>
          <key>DeveloperCertificates</key>
          <array/>
        </dict>
        </plist>
    "#};

    fn parse(xml: &str) -> Dictionary {
        Value::from_reader_xml(xml.as_bytes())
            .unwrap()
            .into_dictionary()
            .unwrap()
    }

    #[test]
    fn profile() -> Result<(), IpaValidateError> {
        let profile = ProvisioningMetadata::from_dictionary(&parse(PROFILE_PLIST))?;

        assert_eq!(profile.app_id_name, "Acme Wildcard");
        assert!(profile.application_identifier_prefixes.contains("ABCDE12345"));
        assert_eq!(
            profile.creation_date,
            Utc.with_ymd_and_hms(2022, 1, 1, 0, 0, 0).unwrap()
        );
        assert_eq!(
            profile.expiration_date,
            Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap()
        );
        assert_eq!(profile.name, "Acme Distribution");
        assert_eq!(profile.platforms, Some(vec!["iOS".to_string()]));
        assert_eq!(profile.provisions_all_devices, None);
        assert_eq!(profile.team_identifiers, vec!["ABCDE12345".to_string()]);
        assert_eq!(profile.team_name, "Acme Corp");
        assert_eq!(profile.entitlements.application_identifier, "ABCDE12345.com.acme.*");
        assert_eq!(profile.entitlements.get_task_allow, Some(false));
        assert_eq!(
            profile.entitlements.keychain_access_groups,
            Some(vec!["ABCDE12345.*".to_string(), "com.apple.token".to_string()])
        );

        Ok(())
    }

    #[test]
    fn expiration_uses_supplied_clock() -> Result<(), IpaValidateError> {
        let profile = ProvisioningMetadata::from_dictionary(&parse(PROFILE_PLIST))?;

        assert!(!profile.is_expired(Utc.with_ymd_and_hms(2022, 6, 1, 0, 0, 0).unwrap()));
        assert!(!profile.is_expired(profile.expiration_date));
        assert!(profile.is_expired(Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 1).unwrap()));

        Ok(())
    }

    #[test]
    fn dates_serialize_as_rfc3339() -> Result<(), IpaValidateError> {
        let profile = ProvisioningMetadata::from_dictionary(&parse(PROFILE_PLIST))?;
        let json = serde_json::to_value(&profile)?;

        assert_eq!(json["expiration_date"], "2023-01-01T00:00:00Z");
        assert!(json.get("provisions_all_devices").is_none());

        Ok(())
    }

    #[test]
    fn scalar_team_identifier() -> Result<(), IpaValidateError> {
        let mut dict = parse(PROFILE_PLIST);
        dict.insert("TeamIdentifier".into(), Value::String("ZZZ".into()));
        dict.insert("ProvisionsAllDevices".into(), Value::Boolean(true));

        let profile = ProvisioningMetadata::from_dictionary(&dict)?;
        assert_eq!(profile.team_identifiers, vec!["ZZZ".to_string()]);
        assert_eq!(profile.provisions_all_devices, Some(true));

        Ok(())
    }

    #[test]
    fn missing_expiration() {
        let mut dict = parse(PROFILE_PLIST);
        dict.remove("ExpirationDate");

        match ProvisioningMetadata::from_dictionary(&dict) {
            Err(IpaValidateError::MissingField(key)) => assert_eq!(key, "ExpirationDate"),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn missing_application_identifier() {
        let mut dict = parse(PROFILE_PLIST);
        dict.insert("Entitlements".into(), Value::Dictionary(Dictionary::new()));

        match ProvisioningMetadata::from_dictionary(&dict) {
            Err(IpaValidateError::MissingField(key)) => {
                assert_eq!(key, "Entitlements.application-identifier")
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn split() {
        assert_eq!(
            split_application_identifier("ABCDE.com.acme.app1"),
            ("ABCDE", "com.acme.app1")
        );
        assert_eq!(split_application_identifier("ABCDE.*"), ("ABCDE", "*"));
        assert_eq!(split_application_identifier("ABCDE"), ("ABCDE", ""));
        assert_eq!(split_application_identifier(""), ("", ""));
    }
}
