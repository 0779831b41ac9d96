/// Caller and input policy checks
///
/// Every check here is a plain predicate. The registry decides which error a
/// failed check becomes, which keeps these trivially testable.
use crate::config::{AccessConfig, NamingConfig};
use std::collections::{BTreeMap, BTreeSet};
use std::net::IpAddr;

/// Who is making a request
#[derive(Debug, Clone)]
pub struct CallerContext {
    pub ip: IpAddr,
    /// Raw value of the `Authorization` header, if any
    pub api_key: Option<String>,
    pub referer: Option<String>,
}

impl CallerContext {
    pub fn new(ip: IpAddr) -> Self {
        Self {
            ip,
            api_key: None,
            referer: None,
        }
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn with_referer(mut self, referer: impl Into<String>) -> Self {
        self.referer = Some(referer.into());
        self
    }
}

/// True if trusted-IP gating is off or the caller is on the list
pub fn is_trusted_caller(ip: &IpAddr, trusted: &[IpAddr]) -> bool {
    trusted.is_empty() || trusted.contains(ip)
}

/// True if key gating is off or the presented key is configured
pub fn is_authorized_key(presented: Option<&str>, keys: &[String]) -> bool {
    if keys.is_empty() {
        return true;
    }
    presented.is_some_and(|key| keys.iter().any(|k| k == key))
}

pub fn is_allowed_shoulder(shoulder: &str, allowed: &BTreeSet<String>) -> bool {
    allowed.contains(shoulder)
}

pub fn is_allowed_naan(naan: &str, allowed: &BTreeSet<String>) -> bool {
    allowed.contains(naan)
}

/// True if the shoulder is public or the caller is registered for it
pub fn is_private_shoulder_accessible(
    shoulder: &str,
    ip: &IpAddr,
    private_shoulders: &BTreeMap<String, Vec<IpAddr>>,
) -> bool {
    match private_shoulders.get(shoulder) {
        Some(addresses) => addresses.contains(ip),
        None => true,
    }
}

/// Policy predicates bound to the loaded configuration
#[derive(Debug, Clone)]
pub struct PolicyValidator {
    access: AccessConfig,
    naming: NamingConfig,
}

impl PolicyValidator {
    pub fn new(access: AccessConfig, naming: NamingConfig) -> Self {
        Self { access, naming }
    }

    /// Trusted address and valid key, both required for mutating calls
    pub fn authorize(&self, caller: &CallerContext) -> bool {
        is_trusted_caller(&caller.ip, &self.access.trusted_ips)
            && is_authorized_key(caller.api_key.as_deref(), &self.access.api_keys)
    }

    pub fn shoulder_allowed(&self, shoulder: &str) -> bool {
        is_allowed_shoulder(shoulder, &self.naming.allowed_shoulders)
    }

    pub fn naan_allowed(&self, naan: &str) -> bool {
        is_allowed_naan(naan, &self.naming.allowed_naans)
    }

    pub fn is_private(&self, shoulder: &str) -> bool {
        self.access.private_shoulders.contains_key(shoulder)
    }

    pub fn can_resolve(&self, shoulder: &str, caller: &CallerContext) -> bool {
        is_private_shoulder_accessible(shoulder, &caller.ip, &self.access.private_shoulders)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    #[test]
    fn test_trusted_caller() {
        assert!(is_trusted_caller(&ip("10.0.0.1"), &[]));
        assert!(is_trusted_caller(&ip("10.0.0.1"), &[ip("10.0.0.1")]));
        assert!(!is_trusted_caller(&ip("10.0.0.2"), &[ip("10.0.0.1")]));
    }

    #[test]
    fn test_authorized_key() {
        let keys = vec!["myapikey".to_string()];
        assert!(is_authorized_key(None, &[]));
        assert!(is_authorized_key(Some("anything"), &[]));
        assert!(is_authorized_key(Some("myapikey"), &keys));
        assert!(!is_authorized_key(Some("wrong"), &keys));
        assert!(!is_authorized_key(None, &keys));
    }

    #[test]
    fn test_allow_lists() {
        let allowed: BTreeSet<String> = ["s1".to_string(), "x9".to_string()].into();
        assert!(is_allowed_shoulder("x9", &allowed));
        assert!(!is_allowed_shoulder("zz", &allowed));
        let naans: BTreeSet<String> = ["99999".to_string()].into();
        assert!(is_allowed_naan("99999", &naans));
        assert!(!is_allowed_naan("12345", &naans));
    }

    #[test]
    fn test_private_shoulder() {
        let mut private = BTreeMap::new();
        private.insert("p1".to_string(), vec![ip("192.168.1.10")]);

        assert!(is_private_shoulder_accessible("s1", &ip("127.0.0.1"), &private));
        assert!(is_private_shoulder_accessible("p1", &ip("192.168.1.10"), &private));
        assert!(!is_private_shoulder_accessible("p1", &ip("127.0.0.1"), &private));
    }

    #[test]
    fn test_authorize_requires_both_gates() {
        let access = AccessConfig {
            trusted_ips: vec![ip("127.0.0.1")],
            api_keys: vec!["myapikey".to_string()],
            private_shoulders: BTreeMap::new(),
        };
        let naming = NamingConfig {
            default_naan: "99999".to_string(),
            default_shoulder: "s1".to_string(),
            allowed_naans: ["99999".to_string()].into(),
            allowed_shoulders: ["s1".to_string()].into(),
            shoulder_length: 2,
        };
        let validator = PolicyValidator::new(access, naming);

        let local = CallerContext::new(ip("127.0.0.1"));
        assert!(!validator.authorize(&local));
        assert!(validator.authorize(&local.clone().with_api_key("myapikey")));
        assert!(!validator.authorize(&CallerContext::new(ip("10.0.0.1")).with_api_key("myapikey")));
    }
}
