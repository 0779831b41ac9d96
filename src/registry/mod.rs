/// ARK Registry
///
/// The only component that changes ARK records. Every operation checks
/// authorization and input before touching storage, then performs a single
/// storage write so an interrupted request leaves nothing half done.

pub mod models;
pub mod store;

pub use models::{
    ArkChanges, ArkPatch, ArkRecord, ErcDocument, MintRequest, MintedArk, Resolution, ResolverUrls,
};
pub use store::{ArkStore, SqliteArkStore};

use crate::{
    ark::{self, codec, ArkParts},
    audit,
    config::LarkmConfig,
    error::{ConflictKind, LarkmError, LarkmResult},
    policy::{CallerContext, PolicyValidator},
};
use chrono::Utc;
use std::sync::Arc;

const NOT_FOUND: &str = "ARK not found";

/// Registry service
pub struct ArkRegistry {
    store: Arc<dyn ArkStore>,
    config: Arc<LarkmConfig>,
    policy: PolicyValidator,
}

/// Treat missing and blank values alike
fn provided(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

impl ArkRegistry {
    /// Create a new registry
    pub fn new(store: Arc<dyn ArkStore>, config: Arc<LarkmConfig>) -> Self {
        let policy = PolicyValidator::new(config.access.clone(), config.naming.clone());
        Self {
            store,
            config,
            policy,
        }
    }

    pub fn store(&self) -> Arc<dyn ArkStore> {
        Arc::clone(&self.store)
    }

    pub fn config(&self) -> &LarkmConfig {
        &self.config
    }

    /// Reject callers that are not trusted or present a bad key
    pub fn authorize(&self, caller: &CallerContext) -> LarkmResult<()> {
        if self.policy.authorize(caller) {
            Ok(())
        } else {
            tracing::warn!(ip = %caller.ip, "rejected unauthorized caller");
            Err(LarkmError::Forbidden(
                "Unauthorized request.".to_string(),
            ))
        }
    }

    /// Parse and normalize an ARK string with the configured shoulder width
    pub fn normalize(&self, ark_string: &str) -> LarkmResult<ArkParts> {
        ark::parse_normalized(ark_string, self.config.naming.shoulder_length)
            .map_err(|e| LarkmError::InvalidFormat(e.0))
    }

    /// Mint a new ARK
    pub async fn create(&self, request: MintRequest, caller: &CallerContext) -> LarkmResult<MintedArk> {
        self.authorize(caller)?;

        let target = provided(&request.target)
            .ok_or_else(|| LarkmError::MissingField("Field 'target' is required.".to_string()))?
            .to_string();

        let shoulder = match provided(&request.shoulder) {
            Some(shoulder) if !self.policy.shoulder_allowed(shoulder) => {
                return Err(LarkmError::InvalidShoulder(shoulder.to_string()));
            }
            Some(shoulder) => shoulder.to_string(),
            None => self.config.naming.default_shoulder.clone(),
        };

        let naan = match provided(&request.naan) {
            Some(naan) if !self.policy.naan_allowed(naan) => {
                return Err(LarkmError::InvalidNaan(naan.to_string()));
            }
            Some(naan) => naan.to_string(),
            None => self.config.naming.default_naan.clone(),
        };

        let identifier = match provided(&request.identifier) {
            Some(id) if codec::is_full_uuid(id) => codec::derive_from_uuid(id),
            Some(id) if codec::is_short_identifier(id) => id.to_string(),
            Some(id) => return Err(LarkmError::InvalidIdentifier(id.to_string())),
            None => codec::generate(),
        };

        if request.erc_where.is_some() {
            tracing::debug!("ignoring client-supplied 'where' on mint");
        }

        // Fast path for the common case; the UNIQUE constraints are what
        // actually decide a race between concurrent mints.
        if self.store.identifier_exists(&identifier).await? {
            return Err(LarkmError::Conflict(ConflictKind::Identifier(identifier)));
        }
        if self.store.target_exists(&target).await? {
            return Err(LarkmError::Conflict(ConflictKind::Target(target)));
        }

        let defaults = &self.config.metadata.erc_defaults;
        let policy = provided(&request.policy)
            .map(str::to_string)
            .unwrap_or_else(|| self.config.metadata.statement_for(&shoulder).to_string());

        let ark_string = ark::assemble(&naan, &shoulder, &identifier);
        let now = Utc::now();
        let record = ArkRecord {
            naan,
            shoulder,
            identifier,
            ark_string: ark_string.clone(),
            target,
            who: provided(&request.who).unwrap_or(&defaults.who).to_string(),
            what: provided(&request.what).unwrap_or(&defaults.what).to_string(),
            when: provided(&request.when).unwrap_or(&defaults.when).to_string(),
            erc_where: ark_string,
            policy,
            date_created: now,
            date_modified: now,
        };

        self.store.insert(&record).await?;
        audit::ark_created(&record, caller);

        let urls = self.resolver_urls(&record.ark_string);
        Ok(MintedArk { ark: record, urls })
    }

    /// Resolver links for an ARK, one per configured host
    pub fn resolver_urls(&self, ark_string: &str) -> ResolverUrls {
        let hosts = &self.config.resolver_hosts;
        let link = |host: &str| (!host.is_empty()).then(|| format!("{}/{}", host, ark_string));
        ResolverUrls {
            local: link(&hosts.local),
            global: link(&hosts.global),
        }
    }

    /// Resolve an ARK to a redirect target or its ERC document
    pub async fn resolve(
        &self,
        naan: &str,
        raw_suffix: &str,
        info: bool,
        caller: &CallerContext,
    ) -> LarkmResult<Resolution> {
        let result = self.resolve_inner(naan, raw_suffix, info, caller).await;
        let requested = format!("{}{}/{}", ark::ark_string::ARK_SCHEME, naan, raw_suffix);
        audit::resolution(&requested, caller, &result);
        result
    }

    async fn resolve_inner(
        &self,
        naan: &str,
        raw_suffix: &str,
        info: bool,
        caller: &CallerContext,
    ) -> LarkmResult<Resolution> {
        let normalized = codec::normalize_resolution_path(raw_suffix, self.config.naming.shoulder_length)
            .map_err(|e| LarkmError::InvalidFormat(e.0))?;

        // Checked before existence so a private shoulder does not reveal which ARKs exist
        if self.policy.is_private(&normalized.shoulder)
            && !self.policy.can_resolve(&normalized.shoulder, caller)
        {
            return Err(LarkmError::Forbidden(format!(
                "ARKs with shoulder {} are not publicly resolvable.",
                normalized.shoulder
            )));
        }

        let ark_string = ark::assemble(naan, &normalized.shoulder, &normalized.identifier);
        let record = self
            .store
            .get(&ark_string)
            .await?
            .ok_or_else(|| LarkmError::NotFound(NOT_FOUND.to_string()))?;

        let redirectable = record.target.starts_with("http://") || record.target.starts_with("https://");

        if !info && redirectable {
            return Ok(Resolution::Redirect(record.target));
        }

        let policy = if record.policy.is_empty() {
            self.config.metadata.statement_for(&record.shoulder).to_string()
        } else {
            record.policy.clone()
        };

        Ok(Resolution::Info(ErcDocument {
            who: record.who,
            what: record.what,
            when: record.when,
            erc_where: record.erc_where,
            policy,
            target: (!redirectable).then_some(record.target),
        }))
    }

    /// Apply a partial update to an existing ARK
    pub async fn update(
        &self,
        path_ark: &str,
        patch: ArkPatch,
        caller: &CallerContext,
    ) -> LarkmResult<ArkRecord> {
        self.authorize(caller)?;

        if patch.erc_where.is_some() {
            return Err(LarkmError::Conflict(ConflictKind::Where));
        }

        let ark_string = self.normalize(path_ark)?.ark_string();

        let body_ark = patch
            .ark_string
            .as_deref()
            .ok_or_else(|| LarkmError::MissingField("Field 'ark_string' is required.".to_string()))?;
        let matches = self
            .normalize(body_ark)
            .map(|parts| parts.ark_string() == ark_string)
            .unwrap_or(false);
        if !matches {
            return Err(LarkmError::Conflict(ConflictKind::ArkString(
                "NAAN/identifier combination and ark_string do not match.".to_string(),
            )));
        }

        let existing = self
            .store
            .get(&ark_string)
            .await?
            .ok_or_else(|| LarkmError::NotFound(NOT_FOUND.to_string()))?;

        if let Some(target) = &patch.target {
            if target.trim().is_empty() {
                return Err(LarkmError::MissingField("Field 'target' cannot be empty.".to_string()));
            }
        }

        let changes = ArkChanges {
            target: patch.target.map(|t| t.trim().to_string()),
            who: patch.who,
            what: patch.what,
            when: patch.when,
            policy: patch.policy,
        };
        let updated = self
            .store
            .update(&ark_string, &changes, Utc::now())
            .await?
            .ok_or_else(|| LarkmError::NotFound(NOT_FOUND.to_string()))?;
        audit::ark_updated(&existing, &updated, caller);

        Ok(updated)
    }

    /// Remove an ARK; its identifier and target become free immediately
    pub async fn delete(&self, path_ark: &str, caller: &CallerContext) -> LarkmResult<()> {
        self.authorize(caller)?;

        let ark_string = self.normalize(path_ark)?.ark_string();
        if !self.store.delete(&ark_string).await? {
            return Err(LarkmError::NotFound(NOT_FOUND.to_string()));
        }
        audit::ark_deleted(&ark_string, caller);

        Ok(())
    }

    /// Find an ARK by its ARK string or by its target
    pub async fn lookup(
        &self,
        ark_string: Option<&str>,
        target: Option<&str>,
        caller: &CallerContext,
    ) -> LarkmResult<ArkRecord> {
        self.authorize(caller)?;

        let ark_string = ark_string.map(str::trim).filter(|s| !s.is_empty());
        let target = target.map(str::trim).filter(|s| !s.is_empty());

        let found = match (ark_string, target) {
            (Some(ark), _) => {
                let canonical = self.normalize(ark)?.ark_string();
                self.store.get(&canonical).await?
            }
            (None, Some(target)) => self.store.get_by_target(target).await?,
            (None, None) => {
                return Err(LarkmError::MissingField(
                    "Either 'ark' or 'target' is required.".to_string(),
                ))
            }
        };

        found.ok_or_else(|| LarkmError::NotFound(NOT_FOUND.to_string()))
    }
}
