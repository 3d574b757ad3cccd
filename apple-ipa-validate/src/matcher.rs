// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Cross checks between a provisioning profile and a bundle identifier.

use {
    crate::{
        error::IpaValidateError,
        provisioning::{EntitlementsView, ProvisioningMetadata},
    },
    chrono::{DateTime, Utc},
    log::{debug, warn},
};

/// A non-fatal issue found during validation.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ValidationWarning {
    /// The provisioning profile expired before the evaluation time.
    ProfileExpired(DateTime<Utc>),

    /// No slice of the main executable targets an ARM CPU.
    NoArmArchitecture(String),
}

impl std::fmt::Display for ValidationWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ProfileExpired(when) => {
                write!(f, "profile expired on {}", when.to_rfc3339())
            }
            Self::NoArmArchitecture(binary) => {
                write!(f, "executable {} has no ARM architecture slice", binary)
            }
        }
    }
}

/// Whether a bundle identifier is covered by a provisioning app id.
///
/// An app id containing `*` matches every bundle identifier that starts with
/// the text before the first `*`. Anything after that `*` is ignored, so
/// `*` alone matches everything. Without a `*` the values must be equal.
pub fn app_id_matches(bundle_id: &str, app_id: &str) -> bool {
    match app_id.split_once('*') {
        Some((prefix, _)) => bundle_id.starts_with(prefix),
        None => bundle_id == app_id,
    }
}

/// Verify a provisioning profile authorizes a bundle identifier.
///
/// The entitlement prefix must be one of the profile's authorized prefixes and
/// the entitlement app id must cover `bundle_id`. An expired profile is
/// reported as a warning and checking continues.
pub fn check_provisioning(
    profile: &ProvisioningMetadata,
    entitlements: &EntitlementsView,
    bundle_id: &str,
    now: DateTime<Utc>,
) -> Result<Vec<ValidationWarning>, IpaValidateError> {
    let mut warnings = vec![];

    let (prefix, app_id) = entitlements.split_application_identifier();
    debug!(
        "entitlements application-identifier prefix={} app_id={}",
        prefix, app_id
    );

    if !profile.application_identifier_prefixes.contains(prefix) {
        return Err(IpaValidateError::PrefixNotAuthorized(prefix.to_string()));
    }

    if profile.is_expired(now) {
        let warning = ValidationWarning::ProfileExpired(profile.expiration_date);
        warn!("{}", warning);
        warnings.push(warning);
    }

    if !app_id_matches(bundle_id, app_id) {
        return Err(IpaValidateError::BundleIdMismatch {
            bundle_id: bundle_id.to_string(),
            app_id: app_id.to_string(),
        });
    }

    Ok(warnings)
}

#[cfg(test)]
mod tests {
    use {super::*, chrono::TimeZone, std::collections::BTreeSet};

    fn profile(application_identifier: &str, expiration: DateTime<Utc>) -> ProvisioningMetadata {
        ProvisioningMetadata {
            app_id_name: "Acme".into(),
            application_identifier_prefixes: ["ABCDE12345".to_string()]
                .into_iter()
                .collect::<BTreeSet<_>>(),
            creation_date: Utc.with_ymd_and_hms(2022, 1, 1, 0, 0, 0).unwrap(),
            expiration_date: expiration,
            name: "Acme Distribution".into(),
            platforms: None,
            provisions_all_devices: None,
            team_identifiers: vec!["ABCDE12345".into()],
            team_name: "Acme Corp".into(),
            uuid: "6f1c2b0e-0000-4000-8000-000000000001".into(),
            entitlements: EntitlementsView {
                application_identifier: application_identifier.into(),
                get_task_allow: None,
                keychain_access_groups: None,
            },
        }
    }

    fn june_2022() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2022, 6, 1, 0, 0, 0).unwrap()
    }

    fn next_year() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn matching_table() {
        assert!(app_id_matches("com.acme.app1", "com.acme.app1"));
        assert!(!app_id_matches("com.acme.app1", "com.acme.app2"));
        assert!(app_id_matches("com.acme.app1", "com.acme.*"));
        assert!(app_id_matches("com.acme.app1", "*"));
        assert!(!app_id_matches("com.acme.app1", "com.acme2.*"));
    }

    #[test]
    fn wildcard_edges() {
        // Only the text before the first `*` constrains the match.
        assert!(app_id_matches("com.acme.app1", "com.*.other"));
        assert!(app_id_matches("com.acme.app1", "com.acme.app*"));
        assert!(app_id_matches("com.acme.application", "com.acme.app*"));
        assert!(app_id_matches("com.acme.app1", "com.ac**"));
        assert!(!app_id_matches("com", "com.acme.*"));
        assert!(!app_id_matches("com.acme.app1", ""));
        assert!(app_id_matches("", "*"));
    }

    #[test]
    fn exact_match() -> Result<(), IpaValidateError> {
        let p = profile("ABCDE12345.com.acme.app1", next_year());
        let warnings = check_provisioning(&p, &p.entitlements, "com.acme.app1", june_2022())?;
        assert!(warnings.is_empty());

        Ok(())
    }

    #[test]
    fn wildcard_match() -> Result<(), IpaValidateError> {
        let p = profile("ABCDE12345.*", next_year());
        let warnings = check_provisioning(&p, &p.entitlements, "com.acme.app1", june_2022())?;
        assert!(warnings.is_empty());

        Ok(())
    }

    #[test]
    fn unauthorized_prefix() {
        let p = profile("ZZZZZ.com.acme.app1", next_year());

        match check_provisioning(&p, &p.entitlements, "com.acme.app1", june_2022()) {
            Err(IpaValidateError::PrefixNotAuthorized(prefix)) => assert_eq!(prefix, "ZZZZZ"),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn no_dot_means_empty_app_id() {
        let p = profile("ABCDE12345", next_year());

        match check_provisioning(&p, &p.entitlements, "com.acme.app1", june_2022()) {
            Err(IpaValidateError::BundleIdMismatch { app_id, .. }) => assert_eq!(app_id, ""),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn mismatch() {
        let p = profile("ABCDE12345.com.acme2.*", next_year());

        match check_provisioning(&p, &p.entitlements, "com.acme.app1", june_2022()) {
            Err(e @ IpaValidateError::BundleIdMismatch { .. }) => {
                assert!(e.to_string().contains("com.acme2.*"));
                assert!(e.to_string().contains("com.acme.app1"));
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn expired_is_warning() -> Result<(), IpaValidateError> {
        let expiration = Utc.with_ymd_and_hms(2022, 3, 1, 0, 0, 0).unwrap();
        let p = profile("ABCDE12345.com.acme.*", expiration);

        let warnings = check_provisioning(&p, &p.entitlements, "com.acme.app1", june_2022())?;
        assert_eq!(warnings, vec![ValidationWarning::ProfileExpired(expiration)]);
        assert_eq!(
            warnings[0].to_string(),
            "profile expired on 2022-03-01T00:00:00+00:00"
        );

        Ok(())
    }

    #[test]
    fn expired_still_checks_app_id() {
        let expiration = Utc.with_ymd_and_hms(2022, 3, 1, 0, 0, 0).unwrap();
        let p = profile("ABCDE12345.com.other.app", expiration);

        assert!(matches!(
            check_provisioning(&p, &p.entitlements, "com.acme.app1", june_2022()),
            Err(IpaValidateError::BundleIdMismatch { .. })
        ));
    }
}
